//! Regex-subgrammar parser: disjunction → sequence → closure →
//! group → class → primitive, lowest binding first. Runs over the raw string
//! body [`super::lexer::Lexer`] already captured between quotes, with its
//! own small char cursor — the body is self-contained text, so there is no
//! need to thread the file-level lexer's mode machinery through it.

use parsegen_core::diag::{FailureKind, Result};
use parsegen_core::gen_error;
use parsegen_core::grammar::{Atom, EscapeClass, Primitive};
use parsegen_core::pos::FilePos;

struct Cursor<'a> {
    chars: Vec<char>,
    idx: usize,
    pos: FilePos,
    _body: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(body: &'a str, pos: FilePos) -> Self {
        Self {
            chars: body.chars().collect(),
            idx: 0,
            pos,
            _body: body,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.idx + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.current()?;
        self.idx += 1;
        self.pos.advance(c);
        Some(c)
    }

    fn currently_is(&self, c: char) -> bool {
        self.current() == Some(c)
    }

    fn at_end(&self) -> bool {
        self.current().is_none()
    }
}

pub fn parse_regex(body: &str, pos: &FilePos) -> Result<Atom> {
    let mut cur = Cursor::new(body, pos.clone());
    let atom = parse_disjunction(&mut cur)?;
    if !cur.at_end() {
        return Err(gen_error!(
            FailureKind::InvalidInput,
            &cur.pos,
            "trailing characters in regex literal"
        ));
    }
    Ok(atom)
}

fn parse_disjunction(cur: &mut Cursor) -> Result<Atom> {
    let mut left = parse_sequence(cur)?;
    while cur.currently_is('|') {
        cur.bump();
        let right = parse_sequence(cur)?;
        left = Atom::Disjunct(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn starts_atom(c: char) -> bool {
    !matches!(c, '|' | ')')
}

fn parse_sequence(cur: &mut Cursor) -> Result<Atom> {
    let mut atoms = Vec::new();
    while let Some(c) = cur.current() {
        if !starts_atom(c) {
            break;
        }
        atoms.push(parse_closure(cur)?);
    }
    if atoms.is_empty() {
        return Err(gen_error!(
            FailureKind::InvalidInput,
            &cur.pos,
            "empty regex alternative"
        ));
    }
    let mut iter = atoms.into_iter();
    let mut acc = iter.next().unwrap();
    for next in iter {
        acc = Atom::Sequence(Box::new(acc), Box::new(next));
    }
    Ok(acc)
}

fn parse_closure(cur: &mut Cursor) -> Result<Atom> {
    let inner = parse_group(cur)?;
    match cur.current() {
        Some('*') => {
            cur.bump();
            Ok(Atom::Closure {
                inner: Box::new(inner),
                min: 0,
                max: u32::MAX,
            })
        }
        Some('+') => {
            cur.bump();
            Ok(Atom::Closure {
                inner: Box::new(inner),
                min: 1,
                max: u32::MAX,
            })
        }
        Some('?') => {
            cur.bump();
            Ok(Atom::Closure {
                inner: Box::new(inner),
                min: 0,
                max: 1,
            })
        }
        Some('{') => {
            cur.bump();
            let min = parse_repeat_count(cur)?;
            let max = if cur.currently_is(',') {
                cur.bump();
                if cur.currently_is('}') {
                    u32::MAX
                } else {
                    parse_repeat_count(cur)?
                }
            } else {
                min
            };
            if !cur.currently_is('}') {
                return Err(gen_error!(
                    FailureKind::InvalidRange,
                    &cur.pos,
                    "expected '}}' to close counted repetition"
                ));
            }
            cur.bump();
            Ok(Atom::Closure {
                inner: Box::new(inner),
                min,
                max,
            })
        }
        _ => Ok(inner),
    }
}

fn parse_repeat_count(cur: &mut Cursor) -> Result<u32> {
    let mut s = String::new();
    while cur.current().is_some_and(|c| c.is_ascii_digit()) {
        s.push(cur.bump().unwrap());
    }
    s.parse().map_err(|_| {
        gen_error!(
            FailureKind::InvalidRange,
            &cur.pos,
            "expected a repetition count"
        )
    })
}

fn parse_group(cur: &mut Cursor) -> Result<Atom> {
    if cur.currently_is('(') {
        cur.bump();
        let inner = parse_disjunction(cur)?;
        if !cur.currently_is(')') {
            return Err(gen_error!(
                FailureKind::InvalidInput,
                &cur.pos,
                "unterminated group"
            ));
        }
        cur.bump();
        let capture = if cur.currently_is('!') {
            cur.bump();
            false
        } else {
            true
        };
        return Ok(Atom::Group {
            capture,
            inner: Box::new(inner),
        });
    }
    parse_class_or_primitive(cur)
}

fn parse_class_or_primitive(cur: &mut Cursor) -> Result<Atom> {
    if cur.currently_is('[') {
        cur.bump();
        let negated = if cur.currently_is('^') {
            cur.bump();
            true
        } else {
            false
        };
        let mut members = Vec::new();
        while !cur.currently_is(']') {
            if cur.at_end() {
                return Err(gen_error!(
                    FailureKind::InvalidInput,
                    &cur.pos,
                    "unterminated character class"
                ));
            }
            members.push(parse_class_member(cur)?);
        }
        cur.bump();
        return Ok(Atom::Class { negated, members });
    }
    if cur.currently_is('.') {
        cur.bump();
        return Ok(Atom::Wildcard);
    }
    Ok(Atom::Primitive(parse_primitive_char(cur)?))
}

fn parse_class_member(cur: &mut Cursor) -> Result<Primitive> {
    let first = parse_primitive_char(cur)?;
    if let Primitive::Char(lo) = first {
        if cur.currently_is('-') && cur.peek_at(1).is_some_and(|c| c != ']') {
            cur.bump();
            let hi = parse_primitive_char(cur)?;
            if let Primitive::Char(hi) = hi {
                if hi < lo {
                    return Err(gen_error!(
                        FailureKind::InvalidRange,
                        &cur.pos,
                        "character range out of order: {lo}-{hi}"
                    ));
                }
                return Ok(Primitive::Range(lo, hi));
            }
            return Err(gen_error!(
                FailureKind::InvalidRange,
                &cur.pos,
                "invalid range upper bound"
            ));
        }
    }
    Ok(first)
}

fn parse_primitive_char(cur: &mut Cursor) -> Result<Primitive> {
    match cur.bump() {
        Some('\\') => parse_escape(cur),
        Some(c) => Ok(Primitive::Char(c)),
        None => Err(gen_error!(
            FailureKind::InvalidInput,
            &cur.pos,
            "unexpected end of regex literal"
        )),
    }
}

fn parse_escape(cur: &mut Cursor) -> Result<Primitive> {
    match cur.bump() {
        Some('d') => Ok(Primitive::Escape(EscapeClass::Digit)),
        Some('D') => Ok(Primitive::Escape(EscapeClass::NotDigit)),
        Some('l') => Ok(Primitive::Escape(EscapeClass::Lower)),
        Some('L') => Ok(Primitive::Escape(EscapeClass::NotLower)),
        Some('w') => Ok(Primitive::Escape(EscapeClass::Word)),
        Some('W') => Ok(Primitive::Escape(EscapeClass::NotWord)),
        Some('s') => Ok(Primitive::Escape(EscapeClass::Space)),
        Some('S') => Ok(Primitive::Escape(EscapeClass::NotSpace)),
        Some('b') => Ok(Primitive::Escape(EscapeClass::WordBoundary)),
        Some('B') => Ok(Primitive::Escape(EscapeClass::NotWordBoundary)),
        Some('x') => {
            let mut v = 0u32;
            for _ in 0..2 {
                let d = cur.bump().and_then(|c| c.to_digit(16)).ok_or_else(|| {
                    gen_error!(
                        FailureKind::InvalidRegexHexChar,
                        &cur.pos,
                        "expected two hex digits after \\x"
                    )
                })?;
                v = v * 16 + d;
            }
            char::from_u32(v).map(Primitive::Char).ok_or_else(|| {
                gen_error!(FailureKind::InvalidRegexHexChar, &cur.pos, "invalid codepoint \\x{v:x}")
            })
        }
        Some('u') => {
            if !cur.currently_is('{') {
                return Err(gen_error!(
                    FailureKind::InvalidRegexHexChar,
                    &cur.pos,
                    "expected '{{' after \\u"
                ));
            }
            cur.bump();
            let mut v = 0u32;
            while !cur.currently_is('}') {
                let d = cur.bump().and_then(|c| c.to_digit(16)).ok_or_else(|| {
                    gen_error!(
                        FailureKind::InvalidRegexHexChar,
                        &cur.pos,
                        "expected hex digit in \\u{{...}}"
                    )
                })?;
                v = v * 16 + d;
            }
            cur.bump();
            char::from_u32(v).map(Primitive::Char).ok_or_else(|| {
                gen_error!(FailureKind::InvalidRegexHexChar, &cur.pos, "invalid codepoint \\u{{{v:x}}}")
            })
        }
        Some(lit @ ('\\' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '-' | '^' | '"')) => {
            Ok(Primitive::Char(lit))
        }
        Some('n') => Ok(Primitive::Char('\n')),
        Some('t') => Ok(Primitive::Char('\t')),
        Some('r') => Ok(Primitive::Char('\r')),
        Some(other) => Err(gen_error!(
            FailureKind::InvalidRegexEscChar,
            &cur.pos,
            "unrecognised regex escape '\\{other}'"
        )),
        None => Err(gen_error!(
            FailureKind::InvalidRegexEscChar,
            &cur.pos,
            "unterminated escape"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> FilePos {
        FilePos::new("t.pgen")
    }

    #[test]
    fn parses_plain_sequence() {
        let atom = parse_regex("ab", &pos()).unwrap();
        assert!(matches!(atom, Atom::Sequence(..)));
    }

    #[test]
    fn parses_disjunction_of_sequences() {
        let atom = parse_regex("ab|cd", &pos()).unwrap();
        assert!(matches!(atom, Atom::Disjunct(..)));
    }

    #[test]
    fn parses_range_class() {
        let atom = parse_regex("[a-z0-9]", &pos()).unwrap();
        match atom {
            Atom::Class { negated, members } => {
                assert!(!negated);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0], Primitive::Range('a', 'z'));
            }
            other => panic!("expected a class, got {other:?}"),
        }
    }

    #[test]
    fn parses_negated_class_with_escape() {
        let atom = parse_regex(r"[^\d]", &pos()).unwrap();
        match atom {
            Atom::Class { negated, members } => {
                assert!(negated);
                assert_eq!(members, vec![Primitive::Escape(EscapeClass::Digit)]);
            }
            other => panic!("expected a class, got {other:?}"),
        }
    }

    #[test]
    fn parses_counted_repetition() {
        let atom = parse_regex("a{2,4}", &pos()).unwrap();
        match atom {
            Atom::Closure { min, max, .. } => {
                assert_eq!(min, 2);
                assert_eq!(max, 4);
            }
            other => panic!("expected a closure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_backwards_range() {
        let err = parse_regex("[z-a]", &pos()).unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidRange);
    }

    #[test]
    fn non_capturing_group_trailing_bang() {
        let atom = parse_regex("(ab)!", &pos()).unwrap();
        match atom {
            Atom::Group { capture, .. } => assert!(!capture),
            other => panic!("expected a group, got {other:?}"),
        }
    }
}
