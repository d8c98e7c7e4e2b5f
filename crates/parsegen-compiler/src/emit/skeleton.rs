//! The prototype source skeleton: a fixed scaffold of
//! directive-laden text the emitter scans line by line. Kept as a single
//! embedded constant, the way the reference implementation ships its own
//! skeleton as a compiled-in resource string.

pub const SKELETON: &str = r#"
ENTER:stdHeaders
use std::collections::HashMap;
LEAVE:stdHeaders
ENTER:IF_HAS_NS
pub mod TAG(NSNAME) {
LEAVE:IF_HAS_NS

pub type TAG(TOKEN) = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexAction {
    Advance { next: u32, capture: bool },
    Accept { regex: u32 },
    Eof,
    Error,
}

SEGMENT:astNodeDecls

SEGMENT:astNodeItems

SEGMENT:astNodeDefns

SEGMENT:createASTNodesDefns

ENTER:IF_LOG_LEXER
fn log_lexer_step(state: u32, c: Option<char>) {
    eprintln!("lexer: state={state} input={c:?}");
}
LEAVE:IF_LOG_LEXER

SEGMENT:lexerStates

ENTER:IF_LOG_PARSER
fn log_parser_step(state: u32, token_id: u32) {
    eprintln!("parser: state={state} token={token_id}");
}
LEAVE:IF_LOG_PARSER

SEGMENT:parserTransitions

SEGMENT:walkers

ENTER:throwError
fn error_at(row: usize, col: usize, src: &str, msg: &str) -> TAG(CLSNAME)Error {
    TAG(CLSNAME)Error { row, col, src: src.to_string(), msg: msg.to_string() }
}
LEAVE:throwError

ENTER:repl
ENTER:fmain
fn main() {
    repl_loop();
}
LEAVE:fmain
LEAVE:repl

TARGET:SOURCE

INCLUDE:walker_iface

ENTER:IF_HAS_NS
}
LEAVE:IF_HAS_NS
"#;
