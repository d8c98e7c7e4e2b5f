//! The code emitter: scans the embedded prototype skeleton
//! ([`skeleton::SKELETON`]) with the two scanners in [`template`], filling
//! `SEGMENT:` blocks from the per-segment producers in [`segments`] and
//! resolving `ENTER:`/`LEAVE:` conditional blocks, `INCLUDE:` splices, and
//! the `TARGET:SOURCE` output switch.

pub mod segments;
pub mod skeleton;
pub mod template;

use indexmap::IndexMap;
use parsegen_core::diag::{FailureKind, Result};
use parsegen_core::gen_error;
use parsegen_core::grammar::{Grammar, WalkerId};
use parsegen_core::pos::FilePos;
use parsegen_core::utils::to_snake_case;

use template::Directive;

/// Flags resolved once at CLI startup and threaded into the emitter (spec
/// §11's Grammar-vs-CLI configuration split: these never touch `Grammar`).
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub amalgamated: bool,
    pub suppress_line_directives: bool,
    pub log_lexer: bool,
    pub log_parser: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            amalgamated: false,
            suppress_line_directives: false,
            log_lexer: false,
            log_parser: false,
        }
    }
}

/// The emitter's result: one amalgamated file,
/// or a header/source split plus one externalised interface file per walker.
#[derive(Debug, Clone, Default)]
pub struct GeneratedOutput {
    pub header: String,
    pub source: Option<String>,
    pub walker_files: IndexMap<String, String>,
}

fn conditional_active(name: &str, grammar: &Grammar, opts: &EmitOptions) -> Result<bool> {
    Ok(match name {
        "stdHeaders" => grammar.std_headers_enabled,
        "repl" => grammar.has_repl,
        "fmain" => opts.amalgamated,
        "IF_HAS_NS" => grammar.namespace.is_some(),
        "IF_LOG_LEXER" => opts.log_lexer,
        "IF_LOG_PARSER" => opts.log_parser,
        "throwError" => true,
        "astNodeDeclsBlock" => true,
        other => {
            return Err(gen_error!(
                FailureKind::UnknownEBlock,
                &FilePos::default(),
                "unknown enter/leave block '{other}'"
            ));
        }
    })
}

fn tag_dictionary(grammar: &Grammar) -> IndexMap<&'static str, String> {
    let mut tags = IndexMap::new();
    tags.insert("NSNAME", grammar.namespace.clone().unwrap_or_default());
    tags.insert(
        "Q_NSNAME",
        grammar.namespace.clone().map(|n| format!("{n}::")).unwrap_or_default(),
    );
    tags.insert("CLSNAME", grammar.class_name.clone());
    tags.insert(
        "Q_CLSNAME",
        match &grammar.namespace {
            Some(ns) => format!("{ns}::{}", grammar.class_name),
            None => grammar.class_name.clone(),
        },
    );
    tags.insert("Q_ASTNS", grammar.ast_class.clone());
    tags.insert("TOKEN", grammar.token_type.clone());
    tags.insert(
        "WALKER",
        grammar
            .default_walker
            .map(|w| grammar.interner.resolve(grammar.walker(w).name).to_string())
            .unwrap_or_default(),
    );
    tags.insert("START_RULE", grammar.start.clone());
    tags.insert("START_RULE_NAME", grammar.start.clone());
    tags.insert("MAX_REPEAT_COUNT", grammar.max_rep_count.to_string());
    tags.insert("AST", grammar.ast_class.clone());
    tags
}

fn render_segment(name: &str, grammar: &Grammar) -> Result<String> {
    match name {
        "astNodeDecls" => Ok(segments::ast_node_decls(grammar)),
        "astNodeDefns" => Ok(segments::ast_node_defns(grammar)),
        "astNodeItems" => Ok(segments::ast_node_items(grammar)),
        "walkers" => Ok(segments::walkers(grammar)),
        "createASTNodesDefns" => Ok(segments::create_ast_nodes_defns(grammar)),
        "parserTransitions" => Ok(segments::parser_transitions(grammar)),
        "lexerStates" => Ok(segments::lexer_states(grammar)),
        other => Err(gen_error!(
            FailureKind::UnknownSegment,
            &FilePos::default(),
            "unknown template segment '{other}'"
        )),
    }
}

fn push_line(header: &mut String, source: &mut String, in_source: bool, text: &str) {
    let buf = if in_source { source } else { header };
    buf.push_str(text);
    buf.push('\n');
}

/// Expand [`skeleton::SKELETON`] against `grammar`, producing the final
/// generated program text (or, in split mode, its header/source halves plus
/// one interface file per walker).
pub fn generate(grammar: &Grammar, opts: &EmitOptions) -> Result<GeneratedOutput> {
    let tags = tag_dictionary(grammar);
    let mut header = String::new();
    let mut source = String::new();
    let mut in_source = false;
    let mut active_stack: Vec<bool> = Vec::new();
    let mut walker_files = IndexMap::new();

    for line in skeleton::SKELETON.lines() {
        let active = active_stack.iter().all(|&a| a);
        match template::scan_directive(line) {
            Some(Directive::Enter(name)) => {
                active_stack.push(active && conditional_active(&name, grammar, opts)?);
            }
            Some(Directive::Leave(_)) => {
                active_stack.pop();
            }
            Some(Directive::Segment(name)) => {
                if !active {
                    continue;
                }
                let text = render_segment(&name, grammar)?;
                let expanded = template::expand_tags(&text, &tags)?;
                push_line(&mut header, &mut source, in_source, &expanded);
            }
            Some(Directive::Include(name)) => {
                if !active {
                    continue;
                }
                match name.as_str() {
                    "walker_iface" => {
                        for idx in 1..grammar.walkers.len() {
                            let wid = WalkerId::new(idx as u32);
                            let text = segments::walker_interface(grammar, wid);
                            let expanded = template::expand_tags(&text, &tags)?;
                            if opts.amalgamated {
                                push_line(&mut header, &mut source, in_source, &expanded);
                            } else {
                                let file_name =
                                    format!("walker_{}.rs", to_snake_case(grammar.interner.resolve(grammar.walker(wid).name)));
                                walker_files.insert(file_name, expanded);
                            }
                        }
                    }
                    other => {
                        return Err(gen_error!(
                            FailureKind::UnknownInclude,
                            &FilePos::default(),
                            "unknown template include '{other}'"
                        ));
                    }
                }
            }
            Some(Directive::Target(name)) => {
                if name == "SOURCE" && !opts.amalgamated {
                    in_source = true;
                }
            }
            None => {
                if !active {
                    continue;
                }
                let expanded = template::expand_tags(line, &tags)?;
                push_line(&mut header, &mut source, in_source, &expanded);
            }
        }
    }

    Ok(GeneratedOutput {
        header,
        source: if opts.amalgamated { None } else { Some(source) },
        walker_files,
    })
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
    fn amalgamated_mode_produces_a_single_file_with_main() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let opts = EmitOptions { amalgamated: true, ..EmitOptions::default() };
        let out = generate(&g, &opts).unwrap();
        assert!(out.source.is_none());
        assert!(out.header.contains("fn main()"));
        assert!(out.header.contains("pub enum Start"));
    }

    #[test]
    fn split_mode_sends_main_to_source_and_skips_it_entirely_if_amalgamated_is_off() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let opts = EmitOptions::default();
        let out = generate(&g, &opts).unwrap();
        assert!(out.source.is_some());
        assert!(!out.header.contains("fn main()"));
        assert!(!out.source.unwrap().contains("fn main()"));
    }

    #[test]
    fn namespace_pragma_wraps_output_in_a_module() {
        let g = built(
            r#"
            %namespace mygrammar;
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let out = generate(&g, &EmitOptions::default()).unwrap();
        assert!(out.header.contains("pub mod mygrammar"));
    }

    #[test]
    fn unknown_segment_name_is_reported() {
        let g = built(
            r#"
            %start start;
            NUM := "[0-9]+";
            start := expr;
            expr := NUM;
            "#,
        );
        let err = render_segment("nope", &g).unwrap_err();
        assert_eq!(err.kind, FailureKind::UnknownSegment);
    }
}
