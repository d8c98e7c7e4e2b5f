//! The parsegen compilation pipeline: grammar front-end, lexer synthesiser,
//! parser synthesiser, and code emitter.
//!
//! - `frontend` — hand-written recursive-descent reader for `.pgen` grammar
//!   files; builds a [`parsegen_core::Grammar`] directly rather than an
//!   intermediate CST.
//! - `lexer_builder` — threads each token's regex tree into a shared NFA-like
//!   state graph, then runs the superset/shadow optimiser pass.
//! - `parser_builder` — FIRST/FOLLOW/NULLABLE fixpoint followed by canonical
//!   LALR(1) item-set construction and SHIFT/REDUCE/GOTO conflict resolution.
//! - `emit` — expands the embedded prototype skeleton against the built
//!   grammar to produce a self-contained lexer+parser+AST+walker program.
//!
//! [`pipeline::generate`] drives all four phases in order, mirroring the
//! reference implementation's `processInput`/`processInputEx` driver.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod diagnostics;
pub mod dump;
pub mod emit;
pub mod frontend;
pub mod lexer_builder;
pub mod parser_builder;
pub mod pipeline;
pub mod progress;

pub use pipeline::{generate, GeneratedOutput, Options};
