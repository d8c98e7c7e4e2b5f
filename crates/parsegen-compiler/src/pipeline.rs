//! Wires the four phases into the single batch pipeline the spec describes
//! (§5: front-end → lexer build → parser build → emit, each running to
//! completion before the next, no suspension or asynchrony).

use indexmap::IndexMap;

use parsegen_core::diag::Result;
use parsegen_core::grammar::Charset;

use crate::dump::GrammarPrinter;
use crate::emit::{self, EmitOptions};
use crate::frontend::{parse_grammar, FrontendOptions};
use crate::lexer_builder::build_lexer;
use crate::parser_builder::build_parser;
use crate::progress::Progress;

/// Process-level configuration resolved once at CLI startup:
/// distinct from `Grammar`'s own pragma state, and threaded explicitly into
/// the pipeline stages that need it.
#[derive(Debug, Clone)]
pub struct Options {
    pub default_charset: Charset,
    pub amalgamated: bool,
    pub suppress_line_directives: bool,
    pub log_lexer: bool,
    pub log_parser: bool,
    /// Populate [`GeneratedOutput::grammar_dump`] (the `-g` flag).
    pub dump_grammar: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_charset: Charset::Utf8,
            amalgamated: false,
            suppress_line_directives: false,
            log_lexer: false,
            log_parser: false,
            dump_grammar: false,
        }
    }
}

/// Everything a successful run produces: the generated program (split or
/// amalgamated), one interface file per walker, non-fatal `%warn_resolve`
/// diagnostics, and (when requested) the Markdown grammar dump.
#[derive(Debug, Clone, Default)]
pub struct GeneratedOutput {
    pub header: String,
    pub source: Option<String>,
    pub walker_files: IndexMap<String, String>,
    pub warnings: Vec<String>,
    pub grammar_dump: Option<String>,
}

/// Run the whole pipeline over `source`, reporting milestones to `progress`
/// as each phase starts.
pub fn generate(source: &str, file_name: &str, options: &Options, progress: &mut Progress) -> Result<GeneratedOutput> {
    progress.step("parsing grammar");
    let frontend_opts = FrontendOptions {
        default_charset: options.default_charset,
    };
    let mut grammar = parse_grammar(source, file_name, &frontend_opts)?;

    progress.step("building lexer");
    build_lexer(&mut grammar)?;

    progress.step("building parser");
    build_parser(&mut grammar)?;

    let grammar_dump = options.dump_grammar.then(|| GrammarPrinter::new(&grammar).dump());

    progress.step("emitting");
    let emit_opts = EmitOptions {
        amalgamated: options.amalgamated,
        suppress_line_directives: options.suppress_line_directives,
        log_lexer: options.log_lexer,
        log_parser: options.log_parser,
    };
    let emitted = emit::generate(&grammar, &emit_opts)?;

    Ok(GeneratedOutput {
        header: emitted.header,
        source: emitted.source,
        walker_files: emitted.walker_files,
        warnings: grammar.warnings,
        grammar_dump,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_grammar_produces_emitted_output() {
        let mut progress = Progress::Null;
        let out = generate(
            r#"
            %start start;
            NUM := "[0-9]+";
            PLUS := "\+";
            start := expr;
            expr := expr PLUS term | term;
            term := NUM;
            "#,
            "calc.pgen",
            &Options::default(),
            &mut progress,
        )
        .unwrap();
        assert!(out.source.is_some());
        assert!(out.header.contains("pub enum Start") || out.source.as_ref().unwrap().contains("pub enum Start"));
    }

    #[test]
    fn dump_grammar_flag_populates_the_markdown_dump() {
        let mut progress = Progress::Null;
        let options = Options {
            dump_grammar: true,
            ..Options::default()
        };
        let out = generate(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
            "t.pgen",
            &options,
            &mut progress,
        )
        .unwrap();
        assert!(out.grammar_dump.unwrap().contains("## Tokens"));
    }

    #[test]
    fn invalid_grammar_reports_its_failure_kind() {
        let mut progress = Progress::Null;
        let err = generate("%start nope;\nA := \"a\";\ns := A;\n", "t.pgen", &Options::default(), &mut progress).unwrap_err();
        assert_eq!(err.kind, parsegen_core::diag::FailureKind::UnknownStartRule);
    }
}
