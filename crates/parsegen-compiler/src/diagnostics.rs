//! Human-facing diagnostic rendering: a builder over
//! `annotate-snippets`, mirroring the reference `DiagnosticsPrinter`
//! (`plotnik-lib::diagnostics::printer`) but keyed off a line/column
//! [`FilePos`] rather than a pre-computed `TextRange` — this generator's
//! source positions are tracked as `(row, col)` by the front-end's lexer, so
//! rendering re-scans the source to find the matching byte offset instead of
//! converting an existing span.

use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet};

use parsegen_core::diag::GeneratorError;
use parsegen_core::pos::FilePos;

/// Builder for rendering a [`GeneratorError`] against its source text.
pub struct DiagnosticsPrinter<'s> {
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'s> Default for DiagnosticsPrinter<'s> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> DiagnosticsPrinter<'s> {
    pub fn new() -> Self {
        Self {
            source: None,
            path: None,
            colored: false,
        }
    }

    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn path(mut self, path: &'s str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    /// Render one error. Falls back to the error's own `Display` wire format
    /// (`"{file}({row:03},{col:03}):{msg}"`) when no source text was given —
    /// the non-interactive case (log files, `-l -`).
    pub fn render(&self, err: &GeneratorError) -> String {
        let Some(source) = self.source else {
            return err.to_string();
        };

        let renderer = if self.colored { Renderer::styled() } else { Renderer::plain() };
        let start = pos_to_byte_offset(source, &err.pos);
        let end = (start + 1).min(source.len().max(start));

        let mut snippet = Snippet::source(source)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(start..end).label(&err.message));
        if let Some(p) = self.path {
            snippet = snippet.path(p);
        }

        let group = Level::ERROR.primary_title(&err.message).element(snippet);
        renderer.render(&[group]).to_string()
    }
}

/// Re-scan `source` to find the byte offset of `pos`'s `(row, col)` — this
/// generator's positions are line/column pairs, not a rope offset, so there
/// is no cheaper conversion (adapted from the reference printer's
/// `adjust_range` zero-width-span handling).
fn pos_to_byte_offset(source: &str, pos: &FilePos) -> usize {
    let mut offset = 0;
    let mut row = 1usize;
    for line in source.split_inclusive('\n') {
        if row == pos.row {
            let col_bytes: usize = line.chars().take(pos.col.saturating_sub(1)).map(char::len_utf8).sum();
            return offset + col_bytes;
        }
        offset += line.len();
        row += 1;
    }
    offset.min(source.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsegen_core::diag::FailureKind;

    #[test]
    fn falls_back_to_wire_format_without_source() {
        let err = GeneratorError::new(FailureKind::UnknownRuleset, FilePos::new("g.y"), "oops", file!(), line!());
        let rendered = DiagnosticsPrinter::new().render(&err);
        assert_eq!(rendered, err.to_string());
    }

    #[test]
    fn renders_a_snippet_when_source_is_given() {
        let pos = FilePos { file: "g.y".into(), row: 2, col: 5 };
        let err = GeneratorError::new(FailureKind::UnknownRuleset, pos, "unknown ruleset 'foo'", file!(), line!());
        let rendered = DiagnosticsPrinter::new().source("start := a;\nfoo bar baz;\n").path("g.y").render(&err);
        assert!(rendered.contains("unknown ruleset 'foo'"));
    }
}
