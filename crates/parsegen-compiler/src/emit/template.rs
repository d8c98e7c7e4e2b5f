//! The two small hand-rolled scanners the emitter runs over the prototype
//! skeleton: a line-scanner recognising the
//! directive vocabulary at the start of a line, and a char-scanner inside
//! copied/captured text recognising `TAG(` / `TAG2(` substitutions. Neither
//! reaches for the `regex` crate — both are plain cursor-driven `match`
//! loops, in the spirit of the front-end's own `bump`/`current`/`currently_is`
//! scanners (`crate::frontend::lexer::Lexer`).

use indexmap::IndexMap;
use parsegen_core::diag::{FailureKind, Result};
use parsegen_core::gen_error;
use parsegen_core::pos::FilePos;

/// One recognised skeleton directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    Enter(String),
    Leave(String),
    Segment(String),
    Include(String),
    /// `TARGET:SOURCE` — the only target switch the skeleton uses.
    Target(String),
}

struct LineCursor<'a> {
    line: &'a str,
    idx: usize,
}

impl<'a> LineCursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, idx: 0 }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.line[self.idx..].starts_with(kw) {
            self.idx += kw.len();
            true
        } else {
            false
        }
    }

    fn rest_trimmed(&self) -> String {
        self.line[self.idx..].trim().to_string()
    }
}

/// Recognise a directive at the start of `line`, or `None` if the line is
/// ordinary skeleton text to be copied (and tag-expanded) verbatim.
pub fn scan_directive(line: &str) -> Option<Directive> {
    let trimmed = line.trim_start();
    let mut cur = LineCursor::new(trimmed);
    if cur.eat_keyword("ENTER:") {
        return Some(Directive::Enter(cur.rest_trimmed()));
    }
    if cur.eat_keyword("LEAVE:") {
        return Some(Directive::Leave(cur.rest_trimmed()));
    }
    if cur.eat_keyword("SEGMENT:") {
        return Some(Directive::Segment(cur.rest_trimmed()));
    }
    if cur.eat_keyword("INCLUDE:") {
        return Some(Directive::Include(cur.rest_trimmed()));
    }
    if cur.eat_keyword("TARGET:") {
        return Some(Directive::Target(cur.rest_trimmed()));
    }
    None
}

/// Substitute every `TAG(key)` / `TAG2(key, suffix)` occurrence in `text`
/// from `tags`, passing everything else through verbatim. An unresolved
/// key substitutes the empty string, matching the reference emitter's own
/// "silently empty, never a dangling literal" tag behaviour.
pub fn expand_tags(text: &str, tags: &IndexMap<&str, String>) -> Result<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if matches_literal(&chars, i, "TAG2(") {
            let open = i + "TAG2(".chars().count();
            let close = find_matching_paren(&chars, open)?;
            let inner: String = chars[open..close].iter().collect();
            let (key, suffix) = inner.split_once(',').unwrap_or((inner.as_str(), ""));
            out.push_str(tags.get(key.trim()).map(String::as_str).unwrap_or(""));
            out.push_str(suffix.trim());
            i = close + 1;
        } else if matches_literal(&chars, i, "TAG(") {
            let open = i + "TAG(".chars().count();
            let close = find_matching_paren(&chars, open)?;
            let key: String = chars[open..close].iter().collect();
            out.push_str(tags.get(key.trim()).map(String::as_str).unwrap_or(""));
            i = close + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn matches_literal(chars: &[char], at: usize, lit: &str) -> bool {
    let lit: Vec<char> = lit.chars().collect();
    chars.len() >= at + lit.len() && chars[at..at + lit.len()] == lit[..]
}

fn find_matching_paren(chars: &[char], start: usize) -> Result<usize> {
    let mut depth = 1i32;
    let mut j = start;
    while j < chars.len() {
        match chars[j] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    Err(gen_error!(
        FailureKind::UnknownSegment,
        &FilePos::default(),
        "unterminated TAG(...) in template"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_each_directive_kind() {
        assert_eq!(scan_directive("SEGMENT:astNodeDecls"), Some(Directive::Segment("astNodeDecls".into())));
        assert_eq!(scan_directive("ENTER:repl"), Some(Directive::Enter("repl".into())));
        assert_eq!(scan_directive("LEAVE:repl"), Some(Directive::Leave("repl".into())));
        assert_eq!(scan_directive("INCLUDE:walker_iface"), Some(Directive::Include("walker_iface".into())));
        assert_eq!(scan_directive("TARGET:SOURCE"), Some(Directive::Target("SOURCE".into())));
        assert_eq!(scan_directive("    let x = 1;"), None);
    }

    #[test]
    fn expands_tag_and_tag2() {
        let mut tags = IndexMap::new();
        tags.insert("CLSNAME", "Foo".to_string());
        let out = expand_tags("struct TAG(CLSNAME)TAG2(CLSNAME, _Iter) { }", &tags).unwrap();
        assert_eq!(out, "struct FooFoo_Iter { }");
    }

    #[test]
    fn unresolved_tag_becomes_empty() {
        let tags = IndexMap::new();
        let out = expand_tags("x = TAG(NOPE);", &tags).unwrap();
        assert_eq!(out, "x = ;");
    }
}
