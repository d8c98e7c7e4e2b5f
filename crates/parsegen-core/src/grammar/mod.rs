//! The Grammar Model: the single aggregate every phase reads and
//! (until emission) mutates. See [`types`] for the owned entities and
//! [`builder`] for the management methods (`create_*` / `add_*` / `get_*`)
//! that enforce its invariants.

pub mod ids;
pub mod types;

mod builder;

pub use builder::ConfigSet;
pub use ids::{ItemSetId, ModeId, RegexId, RegexSetId, RuleId, RuleSetId, StateId, WalkerId};
pub use types::*;

use crate::interner::Interner;
use indexmap::IndexMap;

/// Root aggregate of every grammar entity.
///
/// Exclusively owns all entities below it; every cross-reference elsewhere in
/// the crate is a back-reference (an id, looked up here), never a second
/// owner.
#[derive(Debug)]
pub struct Grammar {
    pub interner: Interner,

    // --- pragma-controlled configuration ---
    pub namespace: Option<String>,
    pub class_name: String,
    pub start: String,
    pub charset: Charset,
    pub pch_header: Option<String>,
    pub hdr_header: Option<String>,
    pub src_header: Option<String>,
    pub class_members: Vec<(String, String)>,
    pub default_walker: Option<WalkerId>,
    pub token_class: String,
    pub ast_class: String,
    pub token_type: String,
    pub list_type: String,
    pub end_name: String,
    pub empty_name: String,
    pub has_repl: bool,
    pub check_unused_tokens: bool,
    pub auto_resolve: bool,
    pub warn_resolve: bool,
    pub std_headers_enabled: bool,
    pub small_range_size: u32,
    pub max_rep_count: u32,
    pub prologue: Option<types::CodeBlock>,
    pub epilogue: Option<types::CodeBlock>,
    pub error_block: Option<types::CodeBlock>,

    // --- owned arenas ---
    pub states: Vec<types::State>,
    pub regexes: Vec<types::Regex>,
    pub regex_sets: Vec<types::RegexSet>,
    pub modes: Vec<types::LexerMode>,
    pub rules: Vec<types::Rule>,
    pub rule_sets: Vec<types::RuleSet>,
    pub walkers: Vec<types::Walker>,
    pub item_sets: Vec<types::ItemSet>,

    // --- name -> id lookup tables (insertion-ordered) ---
    pub regex_set_by_name: IndexMap<String, RegexSetId>,
    pub rule_set_by_name: IndexMap<String, RuleSetId>,
    pub mode_by_name: IndexMap<String, ModeId>,
    pub walker_by_name: IndexMap<String, WalkerId>,

    /// `%fallback TOK alt1 alt2 …;` — alternates accepted in place of `TOK`.
    pub fallbacks: IndexMap<RegexSetId, Vec<RegexSetId>>,

    /// Set once the parser builder's Phase 4 linking completes.
    pub initial_item_set: Option<ItemSetId>,

    pub next_precedence: u32,

    /// Non-fatal diagnostics accumulated by `%warn_resolve`.
    pub warnings: Vec<String>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}
