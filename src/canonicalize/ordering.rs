//! Line reordering and argument-order canonicalization

use super::CanonicalizeOptions;
use crate::graph::DependencyGraph;
use crate::parser::FunctionDef;

fn graph_of(function: &FunctionDef, options: &CanonicalizeOptions) -> DependencyGraph {
    DependencyGraph::build_with(&function.body, function.params(), options.preserve_call_order)
}

/// Drops dead statements and sorts the rest level by level
pub fn reorder_lines(function: &mut FunctionDef, options: &CanonicalizeOptions) {
    let graph = graph_of(function, options);
    let live = graph.reachable_subgraph(&graph.sinks(), true);
    function.body = live.canonical_sort();
}

/// Keeps only the parameters the output depends on, in the order they are
/// first required
pub fn canonicalize_argument_order(function: &mut FunctionDef, options: &CanonicalizeOptions) {
    let required = graph_of(function, options).required_parameters();
    if required.as_slice() != function.params() {
        tracing::trace!(function = %function.name, ?required, "parameter order");
        function.args.params = required;
    }
}
