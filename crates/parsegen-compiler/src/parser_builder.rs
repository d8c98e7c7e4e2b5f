//! LALR(1)-style parser synthesiser: FIRST/FOLLOW/NULLABLE
//! fixpoint, canonical item-set construction, and SHIFT/REDUCE conflict
//! resolution by precedence/associativity.
//!
//! Grounded on the reference `ParserBuilder` (`parser_builder.cpp`): the same
//! three phases (set computation, canonical collection, conflict resolution),
//! the same naive nested-pass fixpoint for phase 1 rather than a worklist
//! (the spec's determinism property only requires *a* fixpoint, not a
//! specific convergence order), and the same config-vector dedup key for the
//! canonical collection. The reference's fourth "linking" pass is folded into
//! [`build_canonical_collection`] here: `find_or_create_item_set` interns
//! directly, so there is no separate concretisation step to run afterwards.

use std::collections::HashSet;

use parsegen_core::diag::{FailureKind, Result};
use parsegen_core::gen_error;
use parsegen_core::grammar::{
    Associativity, Config, ConfigSet, Grammar, ItemSetId, Node, NodeTarget, RegexSetId, RuleId,
};
use parsegen_core::pos::FilePos;
use indexmap::IndexMap;

/// Run both phases in order. Call once, after [`crate::lexer_builder::build_lexer`]
/// (lexer build order doesn't matter relative to this phase, but the
/// pipeline runs them in the spec §2 diagram's order for clarity).
pub fn build_parser(grammar: &mut Grammar) -> Result<()> {
    compute_first_follow_nullable(grammar)?;
    build_canonical_collection(grammar)?;
    Ok(())
}

// ---------------------------------------------------------- Phase 1: sets

fn compute_first_follow_nullable(grammar: &mut Grammar) -> Result<()> {
    let pos = FilePos::default();
    let start_rs = grammar.get_start_rule_set(&pos)?;
    let end_set = {
        let end_name = grammar.end_name.clone();
        grammar.get_regex_set_by_name(&end_name, &pos)?
    };
    union_follow(grammar, start_rs, &[end_set]);

    loop {
        let mut changed = false;
        for i in 1..grammar.rules.len() {
            changed |= propagate_rule(grammar, RuleId::new(i as u32));
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

fn node_nullable(grammar: &Grammar, node: &Node) -> bool {
    match node.target {
        NodeTarget::Terminal(_) => false,
        NodeTarget::NonTerminal(rs) => grammar.rule_set(rs).nullable,
    }
}

fn node_first(grammar: &Grammar, node: &Node) -> Vec<RegexSetId> {
    match node.target {
        NodeTarget::Terminal(t) => vec![t],
        NodeTarget::NonTerminal(rs) => grammar.rule_set(rs).first.clone(),
    }
}

/// FIRST and nullability of a node sequence: accumulate each node's FIRST set
/// until one is found that isn't nullable (inclusive), matching the spec §4.3
/// rule 4 equations read as a sequence fold rather than a single-node lookup.
fn seq_first(grammar: &Grammar, nodes: &[Node]) -> (Vec<RegexSetId>, bool) {
    let mut out = Vec::new();
    for node in nodes {
        for t in node_first(grammar, node) {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        if !node_nullable(grammar, node) {
            return (out, false);
        }
    }
    (out, true)
}

fn set_nullable(grammar: &mut Grammar, rs: parsegen_core::grammar::RuleSetId, value: bool) -> bool {
    let entry = &mut grammar.rule_set_mut(rs).nullable;
    if *entry != value && value {
        *entry = true;
        true
    } else {
        false
    }
}

fn union_first(grammar: &mut Grammar, rs: parsegen_core::grammar::RuleSetId, items: &[RegexSetId]) -> bool {
    let set = &mut grammar.rule_set_mut(rs).first;
    let mut changed = false;
    for &t in items {
        if !set.contains(&t) {
            set.push(t);
            changed = true;
        }
    }
    changed
}

fn union_follow(grammar: &mut Grammar, rs: parsegen_core::grammar::RuleSetId, items: &[RegexSetId]) -> bool {
    let set = &mut grammar.rule_set_mut(rs).follow;
    let mut changed = false;
    for &t in items {
        if !set.contains(&t) {
            set.push(t);
            changed = true;
        }
    }
    changed
}

fn propagate_rule(grammar: &mut Grammar, rid: RuleId) -> bool {
    let rule = grammar.rule(rid).clone();
    let rs = rule.rule_set;
    let mut changed = false;

    if rule.is_epsilon() {
        changed |= set_nullable(grammar, rs, true);
    } else if rule.nodes.iter().all(|n| node_nullable(grammar, n)) {
        changed |= set_nullable(grammar, rs, true);
    }

    for i in 0..rule.nodes.len() {
        let alpha_nullable = rule.nodes[..i].iter().all(|n| node_nullable(grammar, n));
        if alpha_nullable {
            let first_i = node_first(grammar, &rule.nodes[i]);
            changed |= union_first(grammar, rs, &first_i);
        }

        if let NodeTarget::NonTerminal(target_rs) = rule.nodes[i].target {
            let (beta_first, beta_nullable) = seq_first(grammar, &rule.nodes[i + 1..]);
            changed |= union_follow(grammar, target_rs, &beta_first);
            if beta_nullable {
                let rs_follow = grammar.rule_set(rs).follow.clone();
                changed |= union_follow(grammar, target_rs, &rs_follow);
            }
        }
    }
    changed
}

// ---------------------------------------- Phase 2/3: canonical collection

/// Closure expansion: sorts the kernel first so that two
/// candidate sets reaching the same configs via different shift/goto paths
/// always produce identical vectors, then repeatedly augments with `(r, 0)`
/// for every rule `r` whose left side sits immediately after some config's
/// dot, never duplicating a rule.
fn closure(grammar: &Grammar, configs: &mut Vec<Config>) {
    configs.sort();
    configs.dedup();
    let mut present: HashSet<Config> = configs.iter().copied().collect();
    let mut i = 0;
    while i < configs.len() {
        let cfg = configs[i];
        let rule = grammar.rule(cfg.rule);
        if cfg.dot < rule.nodes.len() {
            if let NodeTarget::NonTerminal(n) = rule.nodes[cfg.dot].target {
                for &r in &grammar.rule_set(n).rules {
                    let new_cfg = Config { rule: r, dot: 0 };
                    if present.insert(new_cfg) {
                        configs.push(new_cfg);
                    }
                }
            }
        }
        i += 1;
    }
}

fn rule_precedence(grammar: &Grammar, rule: RuleId) -> Option<RegexSetId> {
    let r = grammar.rule(rule);
    if let Some(p) = r.precedence {
        return Some(p);
    }
    r.nodes.iter().rev().find_map(|n| match n.target {
        NodeTarget::Terminal(t) => Some(t),
        NodeTarget::NonTerminal(_) => None,
    })
}

/// Accumulate SHIFT/REDUCE/GOTO contributions of a single config into the
/// item set under construction. When the
/// symbol at the dot is a nullable non-terminal, recurses past it in the same
/// rule ("continue scanning past N in the same config") so later positions of
/// the same rule still contribute their own actions from this config.
fn accumulate_at(grammar: &Grammar, cs: &mut ConfigSet, rule: RuleId, dot: usize) -> Result<()> {
    let r = grammar.rule(rule);
    if dot >= r.nodes.len() {
        let rs = grammar.rule_set(r.rule_set);
        for &t in &rs.follow {
            match cs.reduces.get(&t) {
                Some(&existing) if existing != rule => {
                    return Err(gen_error!(
                        FailureKind::ReduceReduceConflict,
                        &r.pos,
                        "reduce/reduce conflict on token '{}'",
                        grammar.interner.resolve(grammar.regex_set(t).name)
                    ));
                }
                Some(_) => {}
                None => {
                    cs.reduces.insert(t, rule);
                }
            }
        }
        return Ok(());
    }

    let node = &r.nodes[dot];
    match node.target {
        NodeTarget::Terminal(t) => {
            cs.shifts.entry(t).or_default().push(Config { rule, dot: dot + 1 });
        }
        NodeTarget::NonTerminal(n) => {
            cs.gotos.entry(n).or_default().push(Config { rule, dot: dot + 1 });
            if grammar.rule_set(n).nullable {
                accumulate_at(grammar, cs, rule, dot + 1)?;
            }
        }
    }
    Ok(())
}

enum Resolution {
    Shift,
    Reduce,
}

/// Phase 3: for every terminal carrying both a SHIFT and a REDUCE action,
/// resolve by precedence/associativity. REDUCE against
/// END always wins; with no precedence information on either side, the
/// conflict is silently shifted when `auto_resolve` is on (the reference's
/// own default-on behaviour) and fatal otherwise.
fn resolve_conflicts(grammar: &mut Grammar, cs: &mut ConfigSet) -> Result<()> {
    let end_set = {
        let end_name = grammar.end_name.clone();
        grammar.get_regex_set_by_name(&end_name, &FilePos::default())?
    };
    let contested: Vec<RegexSetId> = cs
        .reduces
        .keys()
        .copied()
        .filter(|t| cs.shifts.contains_key(t))
        .collect();

    for t in contested {
        let rule = cs.reduces[&t];
        if t == end_set {
            cs.shifts.shift_remove(&t);
            continue;
        }

        let term_prec = grammar.regex_set(t).precedence;
        let resolution = match rule_precedence(grammar, rule) {
            Some(rp) => {
                let rp_prec = grammar.regex_set(rp).precedence;
                if rp_prec == term_prec {
                    match grammar.regex_set(rp).assoc {
                        Associativity::Left => Resolution::Reduce,
                        Associativity::Right | Associativity::None => Resolution::Shift,
                    }
                } else if rp_prec > term_prec {
                    Resolution::Reduce
                } else {
                    Resolution::Shift
                }
            }
            None if grammar.auto_resolve => Resolution::Shift,
            None => {
                return Err(gen_error!(
                    FailureKind::ShiftReduceConflict,
                    &grammar.rule(rule).pos,
                    "shift/reduce conflict on token '{}' with no precedence declared",
                    grammar.interner.resolve(grammar.regex_set(t).name)
                ));
            }
        };

        if grammar.warn_resolve {
            let term_name = grammar.interner.resolve(grammar.regex_set(t).name).to_string();
            let verb = match resolution {
                Resolution::Shift => "shift",
                Resolution::Reduce => "reduce",
            };
            grammar
                .warnings
                .push(format!("resolved shift/reduce conflict on '{term_name}' by choosing to {verb}"));
        }

        match resolution {
            Resolution::Reduce => {
                cs.shifts.shift_remove(&t);
            }
            Resolution::Shift => {
                cs.reduces.shift_remove(&t);
            }
        }
    }
    Ok(())
}

/// Phase 2 + 3 driver: BFS over candidate item sets from the start
/// production's kernel, materialising each one's resolved SHIFT/REDUCE/GOTO
/// maps as it's discovered.
fn build_canonical_collection(grammar: &mut Grammar) -> Result<()> {
    let pos = FilePos::default();
    let start_rs = grammar.get_start_rule_set(&pos)?;
    let mut kernel: Vec<Config> = grammar
        .rule_set(start_rs)
        .rules
        .iter()
        .map(|&rule| Config { rule, dot: 0 })
        .collect();
    closure(grammar, &mut kernel);

    let initial_id = grammar.find_or_create_item_set(kernel);
    grammar.initial_item_set = Some(initial_id);

    let mut worklist = vec![initial_id];
    let mut processed: HashSet<ItemSetId> = HashSet::new();
    while let Some(iid) = worklist.pop() {
        if !processed.insert(iid) {
            continue;
        }
        process_item_set(grammar, iid, &mut worklist)?;
    }
    Ok(())
}

fn process_item_set(grammar: &mut Grammar, iid: ItemSetId, worklist: &mut Vec<ItemSetId>) -> Result<()> {
    let configs = grammar.item_set(iid).configs.clone();

    let mut cs = ConfigSet::default();
    for cfg in &configs {
        accumulate_at(grammar, &mut cs, cfg.rule, cfg.dot)?;
    }
    resolve_conflicts(grammar, &mut cs)?;

    let mut shifts = IndexMap::new();
    for (t, mut cfgs) in cs.shifts {
        closure(grammar, &mut cfgs);
        let target = grammar.find_or_create_item_set(cfgs);
        shifts.insert(t, target);
        worklist.push(target);
    }

    let mut gotos = IndexMap::new();
    for (n, mut cfgs) in cs.gotos {
        closure(grammar, &mut cfgs);
        let target = grammar.find_or_create_item_set(cfgs);
        gotos.insert(n, target);
        worklist.push(target);
    }

    let item_set = grammar.item_set_mut(iid);
    item_set.shifts = shifts;
    item_set.reduces = cs.reduces;
    item_set.gotos = gotos;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_grammar, FrontendOptions};
    use crate::lexer_builder::build_lexer;

    fn build(src: &str) -> Result<Grammar> {
        let mut g = parse_grammar(src, "t.pgen", &FrontendOptions::default())?;
        build_lexer(&mut g)?;
        build_parser(&mut g)?;
        Ok(g)
    }

    #[test]
    fn simple_expr_grammar_builds_without_conflict() {
        let g = build(
            r#"
            %start start;
            PLUS := "\+";
            NUM := "[0-9]+";
            start := expr;
            expr := expr PLUS term | term;
            term := NUM;
            "#,
        )
        .unwrap();
        assert!(g.initial_item_set.is_some());
        assert!(!g.item_sets.is_empty());
    }

    #[test]
    fn every_item_set_has_at_most_one_action_per_terminal() {
        let g = build(
            r#"
            %start start;
            PLUS := "\+";
            NUM := "[0-9]+";
            start := expr;
            expr := expr PLUS term | term;
            term := NUM;
            "#,
        )
        .unwrap();
        for item_set in &g.item_sets {
            for t in item_set.reduces.keys() {
                assert!(
                    !item_set.shifts.contains_key(t),
                    "terminal has both shift and reduce after resolution"
                );
            }
        }
    }

    #[test]
    fn ambiguous_grammar_without_precedence_is_fatal() {
        let err = build(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := expr expr | NUM;
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::ShiftReduceConflict);
    }

    #[test]
    fn precedence_and_associativity_resolve_the_same_grammar() {
        let g = build(
            r#"
            %start start;
            %left CONCAT;
            NUM := "[0-9]+";
            start := expr;
            expr := expr expr [CONCAT] | NUM;
            "#,
        )
        .unwrap();
        assert!(g.initial_item_set.is_some());
    }

    #[test]
    fn left_associative_plus_and_star_both_reduce_over_shift() {
        let g = build(
            r#"
            %start start;
            %left PLUS;
            %left STAR;
            NUM := "[0-9]+";
            PLUS := "\+";
            STAR := "\*";
            start := e;
            e := e PLUS e | e STAR e | NUM;
            "#,
        )
        .unwrap();
        assert!(g.initial_item_set.is_some());
        for item_set in &g.item_sets {
            for t in item_set.reduces.keys() {
                assert!(!item_set.shifts.contains_key(t));
            }
        }
    }

    #[test]
    fn unknown_start_rule_is_reported() {
        let err = build(
            r#"
            %start nope;
            A := "a";
            s := A;
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::UnknownStartRule);
    }

    #[test]
    fn nullable_ruleset_is_detected() {
        let g = build(
            r#"
            %start start;
            A := "a";
            start := opt A;
            opt := A_ |;
            A_ := A;
            "#,
        )
        .unwrap();
        let rs = g.get_rule_set_by_name("opt", &FilePos::new("t.pgen")).unwrap();
        assert!(g.rule_set(rs).nullable);
    }
}
