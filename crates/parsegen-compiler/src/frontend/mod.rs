//! The grammar front-end: a hand-written recursive-descent
//! reader that drives [`lexer::Lexer`] and [`regex::parse_regex`] to build a
//! [`parsegen_core::Grammar`] directly, with no intermediate CST.

pub mod lexer;
pub mod parser;
pub mod regex;

pub use parser::{parse_grammar, FrontendOptions};
