//! The generator's single uniform failure type and its closed kind vocabulary.
//!
//! Every phase (front-end, lexer builder, parser builder, emitter) fails through
//! [`GeneratorError`], never a bare `String` or `anyhow::Error`. The `kind` is a
//! closed `thiserror` enum so callers (tests, the CLI's exit-code mapping) can
//! match on it rather than parse a message.

use crate::pos::FilePos;
use thiserror::Error;

/// The closed vocabulary of failure kinds across every phase of generation.
///
/// Every validation point in the front-end, lexer builder, parser builder, and
/// emitter fails with one of these exact kinds, never a free-form string, so
/// callers can match on `ShiftReduceConflict` and friends instead of parsing
/// a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    // --- front-end: input-syntactic ---
    #[error("invalid input")]
    InvalidInput,
    #[error("invalid regex escape character")]
    InvalidRegexEscChar,
    #[error("invalid character range")]
    InvalidRange,
    #[error("invalid regex hex escape")]
    InvalidRegexHexChar,
    #[error("duplicate codeblock")]
    DuplicateCodeblock,
    #[error("duplicate function signature")]
    DuplicateFunction,
    #[error("duplicate lexer mode")]
    DuplicateMode,
    #[error("unknown pragma")]
    UnknownPragma,
    #[error("unknown walker")]
    UnknownWalker,
    #[error("unknown function")]
    UnknownFunction,
    #[error("unknown lexer mode")]
    UnknownMode,
    #[error("multiple empty rules in one ruleset")]
    MultipleEmptyRules,
    #[error("unknown ruleset")]
    UnknownRuleset,
    #[error("invalid rule name")]
    InvalidRuleName,
    #[error("invalid or unknown token")]
    InvalidToken,

    // --- lexer builder: structural ---
    #[error("token produces no states")]
    EmptyToken,

    // --- parser builder: analytic ---
    #[error("shift/reduce conflict")]
    ShiftReduceConflict,
    #[error("reduce/reduce conflict")]
    ReduceReduceConflict,
    #[error("shift/shift conflict")]
    ShiftShiftConflict,
    #[error("goto conflict")]
    GotoConflict,
    #[error("invalid item set")]
    InvalidItemSet,
    #[error("unknown shift action")]
    UnknownShift,
    #[error("unknown reduce action")]
    UnknownReduce,
    #[error("unused token")]
    UnusedTokens,
    #[error("unknown start rule")]
    UnknownStartRule,

    // --- emitter ---
    #[error("unknown template segment")]
    UnknownSegment,
    #[error("unknown template include")]
    UnknownInclude,
    #[error("unknown enter/leave block")]
    UnknownEBlock,
    #[error("could not open output file")]
    ErrorOpeningSrc,
}

/// The single failure type every phase raises: a `FailureKind` plus the exact
/// source position and human-readable message, and (for bugs in this generator,
/// not the user's grammar) the originating Rust source location.
#[derive(Error, Debug, Clone)]
#[error("{pos}:{message} ({source_file}:{source_line})")]
pub struct GeneratorError {
    pub kind: FailureKind,
    pub pos: FilePos,
    pub message: String,
    pub source_file: &'static str,
    pub source_line: u32,
}

impl GeneratorError {
    pub fn new(
        kind: FailureKind,
        pos: FilePos,
        message: impl Into<String>,
        source_file: &'static str,
        source_line: u32,
    ) -> Self {
        Self {
            kind,
            pos,
            message: message.into(),
            source_file,
            source_line,
        }
    }
}

/// Raise a [`GeneratorError`] capturing the call site, matching the reference
/// implementation's `GeneratorError(__LINE__, __FILE__, pos, msg)` construction.
#[macro_export]
macro_rules! gen_error {
    ($kind:expr, $pos:expr, $($arg:tt)*) => {
        $crate::diag::GeneratorError::new(
            $kind,
            $pos.clone(),
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_reference_wire_format() {
        let err = gen_error!(
            FailureKind::UnknownRuleset,
            FilePos::new("g.y"),
            "no such ruleset {}",
            "foo"
        );
        assert!(err.to_string().starts_with("g.y(001,001):no such ruleset foo"));
    }
}
