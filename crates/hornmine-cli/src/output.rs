//! Output formatting utilities

use std::fmt::Write;

use hornmine_core::{Bounded, RuleResult, SurroundingGraph};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Format output based on format type, using `table` for the table form
pub fn format_output<T: Serialize>(
    data: &T,
    format: OutputFormat,
    table: impl FnOnce(&T) -> String,
) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => table(data),
    }
}

/// Discovered rules, best first
pub fn rules_table(result: &RuleResult) -> String {
    let mut out = String::new();
    if result.results.is_empty() {
        let _ = writeln!(
            out,
            "No {} rules found for {}",
            result.kind, result.target_predicate
        );
    } else {
        let _ = writeln!(
            out,
            "{} rules for {} ({} found):",
            capitalize(result.kind.as_str()),
            result.target_predicate,
            result.results.len()
        );
        for rule in &result.results {
            let score = rule
                .score
                .map(|s| format!("{:>7.4}", s))
                .unwrap_or_else(|| "      -".to_string());
            let _ = writeln!(out, "  {}  {}", score, rule.rule);
        }
    }
    push_partial_note(&mut out, result.complete);
    out
}

/// Instantiations of each rule, with surrounding graph sizes
pub fn instantiations_table(result: &RuleResult) -> String {
    let mut out = String::new();
    for rule in &result.results {
        let _ = writeln!(out, "{}", rule.rule);
        if rule.instantiations.is_empty() {
            let _ = writeln!(out, "  No instantiations");
        }
        for inst in &rule.instantiations {
            let _ = writeln!(
                out,
                "  {}({}, {})",
                result.target_predicate, inst.subject, inst.object
            );
            for fact in &inst.supporting_facts {
                let _ = writeln!(out, "    because {}", fact);
            }
        }
        if let Some(graph) = &rule.surrounding_graph {
            let _ = writeln!(
                out,
                "  surrounding graph: {} nodes, {} edges",
                graph.node_count(),
                graph.edge_count()
            );
        }
    }
    push_partial_note(&mut out, result.complete);
    out
}

pub fn graph_table(graph: &Bounded<SurroundingGraph>) -> String {
    let mut out = String::new();
    let graph_value = &graph.value;
    let _ = writeln!(
        out,
        "Graph ({} nodes, {} edges):",
        graph_value.node_count(),
        graph_value.edge_count()
    );
    for node in &graph_value.nodes {
        let _ = writeln!(out, "  {}", node);
        for edge in graph_value.edges_of(node).filter(|e| &e.subject == node) {
            let _ = writeln!(out, "    -[{}]-> {}", edge.predicate, edge.object);
        }
    }
    push_partial_note(&mut out, graph.complete);
    out
}

fn push_partial_note(out: &mut String, complete: bool) {
    if !complete {
        out.push_str("(partial result: timeout reached)\n");
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
