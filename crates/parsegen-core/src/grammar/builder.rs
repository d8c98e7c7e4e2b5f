//! Management methods on [`Grammar`]: the `create_*` / `add_*` / `get_*`
//! family that enforces the invariants of spec §3 and raises the exact
//! failure kind the reference implementation's equivalent method throws.
//!
//! Every arena reserves index 0 for the `NIL` sentinel (see
//! [`super::ids`]) — a dummy entity is pushed at construction so real ids
//! always start at 1 and `ids[i].index()` never needs an off-by-one.

use crate::diag::{FailureKind, GeneratorError, Result};
use crate::gen_error;
use crate::grammar::ids::{ItemSetId, ModeId, RegexId, RegexSetId, RuleId, RuleSetId, StateId, WalkerId};
use crate::grammar::types::*;
use crate::grammar::Grammar;
use crate::interner::Interner;
use crate::pos::FilePos;
use indexmap::IndexMap;

impl Grammar {
    pub fn new() -> Self {
        let mut g = Self {
            interner: Interner::new(),
            namespace: None,
            class_name: "GeneratedModule".to_string(),
            start: "start".to_string(),
            charset: Charset::Utf8,
            pch_header: None,
            hdr_header: None,
            src_header: None,
            class_members: Vec::new(),
            default_walker: None,
            token_class: "Token".to_string(),
            ast_class: "AbSynTree".to_string(),
            token_type: "String".to_string(),
            list_type: "Vec".to_string(),
            end_name: "_tEND".to_string(),
            empty_name: "_tEMPTY".to_string(),
            has_repl: true,
            check_unused_tokens: true,
            auto_resolve: true,
            warn_resolve: true,
            std_headers_enabled: true,
            small_range_size: 16,
            max_rep_count: 65535,
            prologue: None,
            epilogue: None,
            error_block: None,
            states: vec![State::new(StateId::NIL)],
            regexes: vec![dummy_regex()],
            regex_sets: vec![dummy_regex_set()],
            modes: vec![dummy_mode()],
            rules: vec![dummy_rule()],
            rule_sets: vec![dummy_rule_set()],
            walkers: vec![dummy_walker()],
            item_sets: Vec::new(),
            regex_set_by_name: IndexMap::new(),
            rule_set_by_name: IndexMap::new(),
            mode_by_name: IndexMap::new(),
            walker_by_name: IndexMap::new(),
            fallbacks: IndexMap::new(),
            initial_item_set: None,
            next_precedence: 1,
            warnings: Vec::new(),
        };
        let root = g.create_mode_unchecked("ROOT");
        g.modes[root.index()].root_state = g.create_state();
        g
    }

    // ---------------------------------------------------------------- states

    pub fn create_state(&mut self) -> StateId {
        let id = StateId::new(self.states.len() as u32);
        self.states.push(State::new(id));
        id
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.index()]
    }

    // ----------------------------------------------------------------- modes

    fn create_mode_unchecked(&mut self, name: &str) -> ModeId {
        let id = ModeId::new(self.modes.len() as u32);
        let sym = self.interner.intern(name);
        self.modes.push(LexerMode {
            id,
            name: sym,
            root_state: StateId::NIL,
        });
        self.mode_by_name.insert(name.to_string(), id);
        id
    }

    pub fn root_mode(&self) -> ModeId {
        ModeId::new(1)
    }

    pub fn create_mode(&mut self, name: &str, pos: &FilePos) -> Result<ModeId> {
        if self.mode_by_name.contains_key(name) {
            return Err(gen_error!(
                FailureKind::DuplicateMode,
                pos,
                "lexer mode '{name}' already declared"
            ));
        }
        let id = self.create_mode_unchecked(name);
        let root_state = self.create_state();
        self.modes[id.index()].root_state = root_state;
        Ok(id)
    }

    pub fn get_mode(&self, name: &str, pos: &FilePos) -> Result<ModeId> {
        self.mode_by_name.get(name).copied().ok_or_else(|| {
            gen_error!(FailureKind::UnknownMode, pos, "unknown lexer mode '{name}'")
        })
    }

    pub fn mode(&self, id: ModeId) -> &LexerMode {
        &self.modes[id.index()]
    }

    // ------------------------------------------------------------ regex sets

    /// Get the named RegexSet, or create it with the next unique positive
    /// precedence (spec invariant: assigned in first-seen order).
    pub fn get_or_create_regex_set(&mut self, name: &str, assoc: Associativity) -> RegexSetId {
        if let Some(&id) = self.regex_set_by_name.get(name) {
            return id;
        }
        let id = RegexSetId::new(self.regex_sets.len() as u32);
        let sym = self.interner.intern(name);
        let precedence = self.next_precedence;
        self.next_precedence += 1;
        self.regex_sets.push(RegexSet {
            id,
            name: sym,
            precedence,
            assoc,
            regexes: Vec::new(),
            mode_directive: None,
        });
        self.regex_set_by_name.insert(name.to_string(), id);
        id
    }

    pub fn get_regex_set_by_name(&self, name: &str, pos: &FilePos) -> Result<RegexSetId> {
        self.regex_set_by_name.get(name).copied().ok_or_else(|| {
            gen_error!(FailureKind::InvalidToken, pos, "unknown token '{name}'")
        })
    }

    pub fn regex_set(&self, id: RegexSetId) -> &RegexSet {
        &self.regex_sets[id.index()]
    }

    pub fn regex_set_mut(&mut self, id: RegexSetId) -> &mut RegexSet {
        &mut self.regex_sets[id.index()]
    }

    pub fn add_regex(
        &mut self,
        set: RegexSetId,
        mode: ModeId,
        atom: Atom,
        pos: FilePos,
        allow_unused: bool,
    ) -> RegexId {
        let id = RegexId::new(self.regexes.len() as u32);
        self.regexes.push(Regex {
            id,
            set,
            mode,
            atom,
            pos,
            allow_unused,
            usage_count: 0,
            states: Vec::new(),
        });
        self.regex_sets[set.index()].regexes.push(id);
        id
    }

    pub fn regex(&self, id: RegexId) -> &Regex {
        &self.regexes[id.index()]
    }

    pub fn regex_mut(&mut self, id: RegexId) -> &mut Regex {
        &mut self.regexes[id.index()]
    }

    // ------------------------------------------------------------ rule sets

    pub fn get_or_create_rule_set(&mut self, name: &str) -> RuleSetId {
        if let Some(&id) = self.rule_set_by_name.get(name) {
            return id;
        }
        let id = RuleSetId::new(self.rule_sets.len() as u32);
        let sym = self.interner.intern(name);
        self.rule_sets.push(RuleSet {
            id,
            name: sym,
            rules: Vec::new(),
            has_epsilon: false,
            nullable: false,
            first: Vec::new(),
            follow: Vec::new(),
        });
        self.rule_set_by_name.insert(name.to_string(), id);
        id
    }

    pub fn get_rule_set_by_name(&self, name: &str, pos: &FilePos) -> Result<RuleSetId> {
        self.rule_set_by_name.get(name).copied().ok_or_else(|| {
            gen_error!(FailureKind::UnknownRuleset, pos, "unknown ruleset '{name}'")
        })
    }

    pub fn rule_set(&self, id: RuleSetId) -> &RuleSet {
        &self.rule_sets[id.index()]
    }

    pub fn rule_set_mut(&mut self, id: RuleSetId) -> &mut RuleSet {
        &mut self.rule_sets[id.index()]
    }

    pub fn create_rule(
        &mut self,
        rule_set: RuleSetId,
        rule_name: Option<String>,
        nodes: Vec<Node>,
        anchor: usize,
        precedence: Option<RegexSetId>,
        pos: FilePos,
    ) -> Result<RuleId> {
        let is_epsilon = nodes.is_empty();
        if is_epsilon && self.rule_sets[rule_set.index()].has_epsilon {
            return Err(gen_error!(
                FailureKind::MultipleEmptyRules,
                &pos,
                "ruleset already has an empty rule"
            ));
        }
        let id = RuleId::new(self.rules.len() as u32);
        let rule_name_sym = rule_name.map(|n| self.interner.intern(&n));
        self.rules.push(Rule {
            id,
            rule_set,
            rule_name: rule_name_sym,
            nodes,
            anchor,
            precedence,
            pos,
            code_blocks: Vec::new(),
        });
        let rs = &mut self.rule_sets[rule_set.index()];
        rs.rules.push(id);
        if is_epsilon {
            rs.has_epsilon = true;
        }
        Ok(id)
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.index()]
    }

    pub fn add_code_block(
        &mut self,
        rule: RuleId,
        walker: WalkerId,
        block: CodeBlock,
        pos: &FilePos,
    ) -> Result<()> {
        let r = &mut self.rules[rule.index()];
        if r.code_blocks.iter().any(|(w, _)| *w == walker) {
            return Err(gen_error!(
                FailureKind::DuplicateCodeblock,
                pos,
                "duplicate codeblock for this rule/walker pair"
            ));
        }
        r.code_blocks.push((walker, block));
        Ok(())
    }

    // -------------------------------------------------------------- walkers

    pub fn get_or_create_walker(&mut self, name: &str, base: Option<WalkerId>) -> WalkerId {
        if let Some(&id) = self.walker_by_name.get(name) {
            return id;
        }
        let id = WalkerId::new(self.walkers.len() as u32);
        let sym = self.interner.intern(name);
        self.walkers.push(Walker {
            id,
            name: sym,
            base,
            traversal: TraversalMode::Manual,
            output: OutputType::None,
            functions: Vec::new(),
            members: None,
        });
        self.walker_by_name.insert(name.to_string(), id);
        id
    }

    pub fn get_walker_by_name(&self, name: &str, pos: &FilePos) -> Result<WalkerId> {
        self.walker_by_name.get(name).copied().ok_or_else(|| {
            gen_error!(FailureKind::UnknownWalker, pos, "unknown walker '{name}'")
        })
    }

    pub fn walker(&self, id: WalkerId) -> &Walker {
        &self.walkers[id.index()]
    }

    pub fn walker_mut(&mut self, id: WalkerId) -> &mut Walker {
        &mut self.walkers[id.index()]
    }

    /// Walk a walker's `base` chain leaf-first, looking for a function
    /// signature for `rule_set`. Stops at the first match.
    pub fn resolve_function(&self, walker: WalkerId, rule_set: RuleSetId) -> Option<&FunctionSig> {
        let mut current = Some(walker);
        while let Some(w) = current {
            let walker_ref = self.walker(w);
            if let Some(sig) = walker_ref.functions.iter().find(|f| f.rule_set == rule_set) {
                return Some(sig);
            }
            current = walker_ref.base;
        }
        None
    }

    pub fn add_function_sig(&mut self, sig: FunctionSig) -> Result<()> {
        let walker = &mut self.walkers[sig.walker.index()];
        if walker.functions.iter().any(|f| f.rule_set == sig.rule_set) {
            return Err(gen_error!(
                FailureKind::DuplicateFunction,
                &sig.pos,
                "duplicate function signature for this ruleset"
            ));
        }
        walker.functions.push(sig);
        Ok(())
    }

    // ------------------------------------------------------------ fallbacks

    pub fn add_fallback(&mut self, primary: RegexSetId, alt: RegexSetId) {
        self.fallbacks.entry(primary).or_default().push(alt);
    }

    // ------------------------------------------------------------- item sets

    /// Find an existing `ItemSet` whose config vector matches `configs`
    /// elementwise, or create a new canonical one.
    pub fn find_or_create_item_set(&mut self, configs: Vec<Config>) -> ItemSetId {
        if let Some(existing) = self.item_sets.iter().find(|s| s.configs == configs) {
            return existing.id;
        }
        let id = ItemSetId::new(self.item_sets.len() as u32);
        self.item_sets.push(ItemSet::new(id, configs));
        id
    }

    pub fn item_set(&self, id: ItemSetId) -> &ItemSet {
        &self.item_sets[id.index()]
    }

    pub fn item_set_mut(&mut self, id: ItemSetId) -> &mut ItemSet {
        &mut self.item_sets[id.index()]
    }

    pub fn get_start_rule_set(&self, pos: &FilePos) -> Result<RuleSetId> {
        self.rule_set_by_name.get(&self.start).copied().ok_or_else(|| {
            gen_error!(
                FailureKind::UnknownStartRule,
                pos,
                "unknown start rule '{}'",
                self.start
            )
        })
    }
}

/// Transient per-`ItemSet` action accumulator used only during parser
/// construction. Kept distinct from the
/// canonical [`ItemSet`] because, before Phase 4 linking, a shift/goto target
/// is a *set of configs* (not yet an interned `ItemSetId`).
#[derive(Debug, Default, Clone)]
pub struct ConfigSet {
    pub shifts: IndexMap<RegexSetId, Vec<Config>>,
    pub reduces: IndexMap<RegexSetId, RuleId>,
    pub gotos: IndexMap<RuleSetId, Vec<Config>>,
}

fn dummy_regex() -> Regex {
    Regex {
        id: RegexId::NIL,
        set: RegexSetId::NIL,
        mode: ModeId::NIL,
        atom: Atom::Wildcard,
        pos: FilePos::default(),
        allow_unused: true,
        usage_count: 0,
        states: Vec::new(),
    }
}

fn dummy_regex_set() -> RegexSet {
    RegexSet {
        id: RegexSetId::NIL,
        name: nil_symbol(),
        precedence: 0,
        assoc: Associativity::None,
        regexes: Vec::new(),
        mode_directive: None,
    }
}

fn dummy_mode() -> LexerMode {
    LexerMode {
        id: ModeId::NIL,
        name: nil_symbol(),
        root_state: StateId::NIL,
    }
}

fn dummy_rule() -> Rule {
    Rule {
        id: RuleId::NIL,
        rule_set: RuleSetId::NIL,
        rule_name: None,
        nodes: Vec::new(),
        anchor: 0,
        precedence: None,
        pos: FilePos::default(),
        code_blocks: Vec::new(),
    }
}

fn dummy_rule_set() -> RuleSet {
    RuleSet {
        id: RuleSetId::NIL,
        name: nil_symbol(),
        rules: Vec::new(),
        has_epsilon: false,
        nullable: false,
        first: Vec::new(),
        follow: Vec::new(),
    }
}

fn dummy_walker() -> Walker {
    Walker {
        id: WalkerId::NIL,
        name: nil_symbol(),
        base: None,
        traversal: TraversalMode::Manual,
        output: OutputType::None,
        functions: Vec::new(),
        members: None,
    }
}

/// Placeholder symbol for the dummy/NIL entities pushed into each arena's
/// slot 0 — never resolved, since nothing ever looks up a NIL id's name.
fn nil_symbol() -> crate::interner::Symbol {
    crate::interner::Symbol::from_raw(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_grammar_has_root_mode() {
        let g = Grammar::new();
        assert_eq!(g.mode_by_name.get("ROOT"), Some(&g.root_mode()));
        assert!(!g.mode(g.root_mode()).root_state.is_nil());
    }

    #[test]
    fn regex_set_precedence_assigned_in_first_seen_order() {
        let mut g = Grammar::new();
        let a = g.get_or_create_regex_set("A", Associativity::None);
        let b = g.get_or_create_regex_set("B", Associativity::None);
        assert!(g.regex_set(a).precedence < g.regex_set(b).precedence);
        // idempotent: re-fetching the same name does not bump precedence
        let a_again = g.get_or_create_regex_set("A", Associativity::None);
        assert_eq!(a, a_again);
    }

    #[test]
    fn duplicate_mode_fails() {
        let mut g = Grammar::new();
        let pos = FilePos::new("g.y");
        g.create_mode("ML", &pos).unwrap();
        let err = g.create_mode("ML", &pos).unwrap_err();
        assert_eq!(err.kind, FailureKind::DuplicateMode);
    }

    #[test]
    fn unknown_mode_fails() {
        let g = Grammar::new();
        let pos = FilePos::new("g.y");
        let err = g.get_mode("NOPE", &pos).unwrap_err();
        assert_eq!(err.kind, FailureKind::UnknownMode);
    }

    #[test]
    fn multiple_empty_rules_rejected() {
        let mut g = Grammar::new();
        let pos = FilePos::new("g.y");
        let rs = g.get_or_create_rule_set("expr");
        g.create_rule(rs, None, Vec::new(), 0, None, pos.clone())
            .unwrap();
        let err = g
            .create_rule(rs, None, Vec::new(), 0, None, pos)
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::MultipleEmptyRules);
    }

    #[test]
    fn item_set_dedup_by_config_vector() {
        let mut g = Grammar::new();
        let r = RuleId::new(7);
        let a = g.find_or_create_item_set(vec![Config { rule: r, dot: 0 }]);
        let b = g.find_or_create_item_set(vec![Config { rule: r, dot: 0 }]);
        assert_eq!(a, b);
        let c = g.find_or_create_item_set(vec![Config { rule: r, dot: 1 }]);
        assert_ne!(a, c);
    }

    #[test]
    fn walker_inheritance_walks_base_chain() {
        let mut g = Grammar::new();
        let base = g.get_or_create_walker("base", None);
        let derived = g.get_or_create_walker("derived", Some(base));
        let rs = g.get_or_create_rule_set("expr");
        g.add_function_sig(FunctionSig {
            rule_set: rs,
            walker: base,
            args: String::new(),
            return_type: "i64".into(),
            autowalk: false,
            pos: FilePos::new("g.y"),
        })
        .unwrap();
        assert!(g.resolve_function(derived, rs).is_some());
    }
}
