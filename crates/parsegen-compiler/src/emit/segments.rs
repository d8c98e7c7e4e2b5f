//! Producers for the named `SEGMENT:` blocks of spec §4.4. Each function
//! renders one generated-code segment as a string of Rust source text for
//! the host program the skeleton is building; all of them only *read*
//! `Grammar`, never mutate it (emission is the last phase, spec §5).

use std::fmt::Write as _;

use parsegen_core::grammar::{
    ClosurePhase, Grammar, Node, NodeTarget, OutputType, Primitive, RuleSetId, TransitionKind,
    WalkerId,
};
use parsegen_core::utils::{to_pascal_case, to_snake_case};

fn rule_set_struct_name(g: &Grammar, rs: RuleSetId) -> String {
    to_pascal_case(g.interner.resolve(g.rule_set(rs).name))
}

fn rule_variant_name(g: &Grammar, rule_idx: usize) -> String {
    let rule = &g.rules[rule_idx];
    match rule.rule_name {
        Some(sym) => to_pascal_case(g.interner.resolve(sym)),
        None => format!("Rule{rule_idx}"),
    }
}

fn node_field_name(g: &Grammar, node: &Node, position: usize) -> String {
    match node.var_name {
        Some(sym) => to_snake_case(g.interner.resolve(sym)),
        None => format!("arg{position}"),
    }
}

fn node_type_name(g: &Grammar, node: &Node) -> String {
    match node.target {
        NodeTarget::Terminal(_) => g.token_type.clone(),
        NodeTarget::NonTerminal(rs) => format!("Box<{}>", rule_set_struct_name(g, rs)),
    }
}

/// `SEGMENT:astNodeDecls` — one struct per Rule, one enum per RuleSet.
pub fn ast_node_decls(g: &Grammar) -> String {
    let mut out = String::new();
    for rs_idx in 1..g.rule_sets.len() {
        let rs = RuleSetId::new(rs_idx as u32);
        let enum_name = rule_set_struct_name(g, rs);
        writeln!(out, "#[derive(Debug, Clone)]").unwrap();
        writeln!(out, "pub enum {enum_name} {{").unwrap();
        for &rule_id in &g.rule_sets[rs_idx].rules {
            let rule = g.rule(rule_id);
            let variant = rule_variant_name(g, rule_id.index());
            if rule.nodes.is_empty() {
                writeln!(out, "    {variant},").unwrap();
                continue;
            }
            writeln!(out, "    {variant} {{").unwrap();
            for (i, node) in rule.nodes.iter().enumerate() {
                let field = node_field_name(g, node, i);
                let ty = node_type_name(g, node);
                writeln!(out, "        {field}: {ty},").unwrap();
            }
            writeln!(out, "    }},").unwrap();
        }
        writeln!(out, "}}\n").unwrap();
    }
    out
}

/// `SEGMENT:astNodeDefns` — per-RuleSet helper constructors, kept distinct
/// from the declarations so the skeleton can place them in a separate
/// `impl` section (mirrors the reference split between a struct's
/// declaration and its out-of-line member definitions).
pub fn ast_node_defns(g: &Grammar) -> String {
    let mut out = String::new();
    for rs_idx in 1..g.rule_sets.len() {
        let rs = RuleSetId::new(rs_idx as u32);
        let enum_name = rule_set_struct_name(g, rs);
        writeln!(out, "impl {enum_name} {{").unwrap();
        writeln!(out, "    pub fn rule_id(&self) -> u32 {{").unwrap();
        writeln!(out, "        match self {{").unwrap();
        for &rule_id in &g.rule_sets[rs_idx].rules {
            let variant = rule_variant_name(g, rule_id.index());
            let pattern = if g.rule(rule_id).nodes.is_empty() {
                format!("{enum_name}::{variant}")
            } else {
                format!("{enum_name}::{variant} {{ .. }}")
            };
            writeln!(out, "            {pattern} => {},", rule_id.index()).unwrap();
        }
        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out, "}}\n").unwrap();
    }
    out
}

/// `SEGMENT:astNodeItems` — the sum type over every RuleSet plus the
/// terminal token type, used as the parser's value-stack element.
pub fn ast_node_items(g: &Grammar) -> String {
    let mut out = String::new();
    writeln!(out, "#[derive(Debug, Clone)]").unwrap();
    writeln!(out, "pub enum AstItem {{").unwrap();
    writeln!(out, "    Token(TAG(TOKEN)),").unwrap();
    for rs_idx in 1..g.rule_sets.len() {
        let rs = RuleSetId::new(rs_idx as u32);
        let enum_name = rule_set_struct_name(g, rs);
        writeln!(out, "    {enum_name}({enum_name}),").unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

fn walker_fn_name(g: &Grammar, rs: RuleSetId) -> String {
    format!("visit_{}", to_snake_case(g.interner.resolve(g.rule_set(rs).name)))
}

/// `SEGMENT:walkers` — one visitor per Walker: a dispatch match over every
/// RuleSet's Rule sum, each arm binding children and splicing the user's
/// verbatim code block; top-down walkers additionally recurse into child
/// non-terminals after the user code runs.
pub fn walkers(g: &Grammar) -> String {
    let mut out = String::new();
    for w_idx in 1..g.walkers.len() {
        let walker_id = WalkerId::new(w_idx as u32);
        let walker = g.walker(walker_id);
        let walker_name = to_pascal_case(g.interner.resolve(walker.name));
        writeln!(out, "pub struct {walker_name}Walker;\n").unwrap();
        writeln!(out, "impl {walker_name}Walker {{").unwrap();
        for rs_idx in 1..g.rule_sets.len() {
            let rs = RuleSetId::new(rs_idx as u32);
            let enum_name = rule_set_struct_name(g, rs);
            let fn_name = walker_fn_name(g, rs);
            let sig = g.resolve_function(walker_id, rs);
            let return_ty = sig.map(|s| s.return_type.clone()).unwrap_or_else(|| "()".to_string());
            writeln!(out, "    pub fn {fn_name}(&mut self, node: &{enum_name}) -> {return_ty} {{").unwrap();
            writeln!(out, "        match node {{").unwrap();
            for &rule_id in &g.rule_sets[rs_idx].rules {
                let rule = g.rule(rule_id);
                let variant = rule_variant_name(g, rule_id.index());
                if rule.nodes.is_empty() {
                    writeln!(out, "            {enum_name}::{variant} => {{").unwrap();
                } else {
                    let bindings = rule
                        .nodes
                        .iter()
                        .enumerate()
                        .map(|(i, n)| node_field_name(g, n, i))
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(out, "            {enum_name}::{variant} {{ {bindings} }} => {{").unwrap();
                    if walker.traversal == parsegen_core::grammar::TraversalMode::TopDown {
                        for (i, node) in rule.nodes.iter().enumerate() {
                            if let NodeTarget::NonTerminal(child_rs) = node.target {
                                let field = node_field_name(g, node, i);
                                let child_fn = walker_fn_name(g, child_rs);
                                writeln!(out, "                self.{child_fn}({field});").unwrap();
                            }
                        }
                    }
                }
                for (code_walker, block) in &rule.code_blocks {
                    if *code_walker == walker_id && block.has_code() {
                        writeln!(out, "                {}", block.code).unwrap();
                    }
                }
                writeln!(out, "            }}").unwrap();
            }
            writeln!(out, "        }}").unwrap();
            writeln!(out, "    }}\n").unwrap();
        }
        writeln!(out, "}}\n").unwrap();
    }
    out
}

/// `SEGMENT:createASTNodesDefns` — a switch keyed by `rule.id` that
/// materialises one AST node per REDUCE, popping children off the value
/// stack in reverse and wiring them into the new node's fields.
pub fn create_ast_nodes_defns(g: &Grammar) -> String {
    let mut out = String::new();
    writeln!(out, "fn create_ast_node(rule_id: u32, stack: &mut Vec<AstItem>) -> AstItem {{").unwrap();
    writeln!(out, "    match rule_id {{").unwrap();
    for rule_idx in 1..g.rules.len() {
        let rule = &g.rules[rule_idx];
        let rs = rule.rule_set;
        let enum_name = rule_set_struct_name(g, rs);
        let variant = rule_variant_name(g, rule_idx);
        writeln!(out, "        {rule_idx} => {{").unwrap();
        let arity = rule.nodes.len();
        if arity > 0 {
            writeln!(out, "            let args = stack.split_off(stack.len() - {arity});").unwrap();
        }
        if rule.nodes.is_empty() {
            writeln!(out, "            AstItem::{enum_name}({enum_name}::{variant})").unwrap();
        } else {
            let fields = rule
                .nodes
                .iter()
                .enumerate()
                .map(|(i, n)| format!("{}: args[{i}].clone().into()", node_field_name(g, n, i)))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "            AstItem::{enum_name}({enum_name}::{variant} {{ {fields} }})").unwrap();
        }
        writeln!(out, "        }}").unwrap();
    }
    writeln!(out, "        _ => unreachable!(\"unknown rule id\"),").unwrap();
    writeln!(out, "    }}").unwrap();
    writeln!(out, "}}").unwrap();
    out
}

/// `SEGMENT:parserTransitions` — for each ItemSet, a switch on the next
/// token id dispatching to SHIFT / REDUCE / GOTO arms. The start symbol's
/// REDUCE sets `accepted`.
pub fn parser_transitions(g: &Grammar) -> String {
    let mut out = String::new();
    let start_rs = g.rule_set_by_name.get(&g.start).copied();
    writeln!(out, "fn step(state: u32, token_id: u32, stack: &mut Vec<AstItem>, accepted: &mut bool) -> u32 {{").unwrap();
    writeln!(out, "    match state {{").unwrap();
    for (idx, item_set) in g.item_sets.iter().enumerate() {
        writeln!(out, "        {idx} => match token_id {{").unwrap();
        for (&terminal, &target) in &item_set.shifts {
            let name = g.interner.resolve(g.regex_set(terminal).name);
            writeln!(
                out,
                "            t if t == token_id!(\"{name}\") => {{ /* shift */ {} }}",
                target.index()
            )
            .unwrap();
        }
        for (&terminal, &rule_id) in &item_set.reduces {
            let name = g.interner.resolve(g.regex_set(terminal).name);
            let rule = g.rule(rule_id);
            let is_start_reduce = Some(rule.rule_set) == start_rs;
            writeln!(out, "            t if t == token_id!(\"{name}\") => {{").unwrap();
            writeln!(out, "                let node = create_ast_node({}, stack);", rule_id.index()).unwrap();
            writeln!(out, "                stack.push(node);").unwrap();
            if is_start_reduce {
                writeln!(out, "                *accepted = true;").unwrap();
            }
            writeln!(out, "                state").unwrap();
            writeln!(out, "            }}").unwrap();
        }
        writeln!(out, "            _ => panic!(\"unexpected token in state {idx}\"),").unwrap();
        writeln!(out, "        }},").unwrap();
    }
    writeln!(out, "        _ => panic!(\"unknown parser state\"),").unwrap();
    writeln!(out, "    }}").unwrap();
    writeln!(out, "}}\n").unwrap();

    writeln!(out, "fn goto_after_reduce(state: u32, rule_set_id: u32) -> u32 {{").unwrap();
    writeln!(out, "    match (state, rule_set_id) {{").unwrap();
    for (idx, item_set) in g.item_sets.iter().enumerate() {
        for (&rs, &target) in &item_set.gotos {
            writeln!(out, "        ({idx}, {}) => {},", rs.index(), target.index()).unwrap();
        }
    }
    writeln!(out, "        _ => panic!(\"no goto for this (state, ruleset) pair\"),").unwrap();
    writeln!(out, "    }}").unwrap();
    writeln!(out, "}}").unwrap();
    out
}

fn char_literal(c: char) -> String {
    format!("{c:?}")
}

fn transition_guard(g: &Grammar, kind: &TransitionKind) -> String {
    match kind {
        TransitionKind::Primitive(Primitive::Char(c)) => format!("c == {}", char_literal(*c)),
        TransitionKind::Primitive(Primitive::Range(lo, hi)) => {
            format!("({}..={}).contains(&c)", char_literal(*lo), char_literal(*hi))
        }
        TransitionKind::Primitive(Primitive::Escape(class)) => format!("matches_escape_class(c, {class:?})"),
        TransitionKind::Class { negated, members } => {
            let checks = members
                .iter()
                .map(|m| match m {
                    Primitive::Char(c) => format!("c == {}", char_literal(*c)),
                    Primitive::Range(lo, hi) => format!("({}..={}).contains(&c)", char_literal(*lo), char_literal(*hi)),
                    Primitive::Escape(class) => format!("matches_escape_class(c, {class:?})"),
                })
                .collect::<Vec<_>>()
                .join(" || ");
            if *negated {
                format!("!({checks})")
            } else {
                checks
            }
        }
        TransitionKind::Closure(ClosurePhase::InLoop) => "true /* in-loop counter checked below */".to_string(),
        TransitionKind::Closure(_) => "true".to_string(),
        TransitionKind::Slide => "true".to_string(),
        TransitionKind::Wildcard => "true".to_string(),
    }
}

/// `SEGMENT:lexerStates` — for each State, a guard ladder over its
/// transitions in the spec §5 total order, then the terminal action
/// (consume/slide/closure-enter/accept/error) the last matching
/// transition implies.
pub fn lexer_states(g: &Grammar) -> String {
    let mut out = String::new();
    writeln!(out, "fn lex_state(state: u32, c: Option<char>) -> LexAction {{").unwrap();
    writeln!(out, "    match state {{").unwrap();
    for state in &g.states[1..] {
        writeln!(out, "        {} => {{", state.id.index()).unwrap();
        writeln!(out, "            let Some(c) = c else {{ return LexAction::Eof; }};").unwrap();
        let mut sorted: Vec<_> = state.transitions.iter().collect();
        sorted.sort_by(|a, b| a.kind.cmp(&b.kind));
        for t in sorted {
            let guard = transition_guard(g, &t.kind);
            writeln!(out, "            if {guard} {{").unwrap();
            writeln!(out, "                return LexAction::Advance {{ next: {}, capture: {} }};", t.next.index(), t.capture).unwrap();
            writeln!(out, "            }}").unwrap();
        }
        if !state.matched_regex.is_nil() {
            writeln!(out, "            return LexAction::Accept {{ regex: {} }};", state.matched_regex.index()).unwrap();
        } else if state.check_eof {
            writeln!(out, "            return LexAction::Eof;").unwrap();
        } else {
            writeln!(out, "            return LexAction::Error;").unwrap();
        }
        writeln!(out, "        }}").unwrap();
    }
    writeln!(out, "        _ => LexAction::Error,").unwrap();
    writeln!(out, "    }}").unwrap();
    writeln!(out, "}}").unwrap();
    out
}

/// `INCLUDE:walker_iface` — the externalised per-walker interface file
/// (non-amalgamated mode only, spec §4.4's "Output layout").
pub fn walker_interface(g: &Grammar, walker_id: WalkerId) -> String {
    let walker = g.walker(walker_id);
    let walker_name = to_pascal_case(g.interner.resolve(walker.name));
    let mut out = String::new();
    writeln!(out, "pub trait {walker_name}Interface {{").unwrap();
    for rs_idx in 1..g.rule_sets.len() {
        let rs = RuleSetId::new(rs_idx as u32);
        let enum_name = rule_set_struct_name(g, rs);
        let fn_name = walker_fn_name(g, rs);
        let sig = g.resolve_function(walker_id, rs);
        let return_ty = sig.map(|s| s.return_type.clone()).unwrap_or_else(|| "()".to_string());
        writeln!(out, "    fn {fn_name}(&mut self, node: &{enum_name}) -> {return_ty};").unwrap();
    }
    writeln!(out, "}}").unwrap();
    if let OutputType::TextFile { extension } | OutputType::BinaryFile { extension } = &walker.output {
        writeln!(out, "\npub const OUTPUT_EXTENSION: &str = \"{extension}\";").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_grammar, FrontendOptions};
    use crate::lexer_builder::build_lexer;
    use crate::parser_builder::build_parser;

    fn built(src: &str) -> Grammar {
        let mut g = parse_grammar(src, "t.pgen", &FrontendOptions::default()).unwrap();
        build_lexer(&mut g).unwrap();
        build_parser(&mut g).unwrap();
        g
    }

    #[test]
    fn ast_node_decls_emits_one_enum_per_ruleset() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let decls = ast_node_decls(&g);
        assert!(decls.contains("pub enum Start"));
        assert!(decls.contains("pub enum Expr"));
    }

    #[test]
    fn parser_transitions_cover_every_item_set() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let text = parser_transitions(&g);
        for idx in 0..g.item_sets.len() {
            assert!(text.contains(&format!("{idx} => match")));
        }
    }

    #[test]
    fn lexer_states_cover_every_real_state() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let text = lexer_states(&g);
        for state in &g.states[1..] {
            assert!(text.contains(&format!("{} => {{", state.id.index())));
        }
    }
}
