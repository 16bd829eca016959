// dot.rs — Graphviz DOT output for dataflow graphs
//
// Renders a Dataflow as DOT suitable for `dot` or other Graphviz layout
// engines. Operation nodes are boxes; value nodes are ellipses shaded by
// kind. Provenance trace edges are drawn dashed from the traced argument to
// the operation's output value.
//
// Preconditions: `graph` came from `build_graph`.
// Postconditions: returns a DOT string; node order follows the node table.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::graph::{Dataflow, NodeKind};

/// Emit the dataflow graph as a Graphviz DOT string.
pub fn emit_dot(graph: &Dataflow) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph dataflow {{").unwrap();
    writeln!(buf, "    rankdir=BT;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();
    writeln!(buf).unwrap();

    for (key, node) in &graph.nodes {
        let label = match &node.value {
            Some(value) => format!("{}\\n{}", escape(&node.label), escape(value)),
            None => escape(&node.label),
        };
        writeln!(buf, "    {key} [label=\"{label}\", {}];", node_style(node.kind)).unwrap();
    }

    if !graph.edges.is_empty() {
        writeln!(buf).unwrap();
    }
    for edge in &graph.edges {
        match &edge.label {
            Some(label) => writeln!(
                buf,
                "    {} -> {} [label=\"{}\"];",
                edge.start,
                edge.end,
                escape(label)
            )
            .unwrap(),
            None => writeln!(buf, "    {} -> {};", edge.start, edge.end).unwrap(),
        }
    }

    if !graph.trace_edges.is_empty() {
        writeln!(buf).unwrap();
        writeln!(buf, "    // Provenance").unwrap();
    }
    for (target, edges) in &graph.trace_edges {
        for edge in edges {
            let color = if edge.is_value_wise { "gray60" } else { "royalblue" };
            writeln!(
                buf,
                "    {} -> {target} [style=dashed, color={color}, constraint=false, tooltip=\"{}\"];",
                edge.start,
                escape(&edge.provenance),
            )
            .unwrap();
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn node_style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Operation => "shape=box, style=rounded",
        NodeKind::Input => "shape=ellipse, style=filled, fillcolor=lightblue",
        NodeKind::Constant => "shape=ellipse, style=filled, fillcolor=lightyellow",
        NodeKind::Intermediate => "shape=ellipse",
    }
}

/// Escape text for a double-quoted DOT string.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::graph::{build_graph, GraphOptions};
    use crate::value::{value_from_text, Bindings};

    fn build_and_emit(text: &str, inputs: &[&str]) -> String {
        let mut bindings = Bindings::new();
        for input in inputs {
            bindings.assign(input).unwrap();
        }
        let catalog = Catalog::standard();
        let value = value_from_text(text, &bindings, catalog).unwrap();
        let graph = build_graph(&value, catalog, GraphOptions::default()).unwrap();
        emit_dot(&graph)
    }

    #[test]
    fn simple_operation() {
        let dot = build_and_emit("tf.add(in1, 1)", &["in1=[1, 2]"]);
        assert!(dot.starts_with("digraph dataflow {"));
        assert!(dot.contains("p0 [label=\"tf.add(x, y)\", shape=box"));
        assert!(dot.contains("n1 [label=\"in1\\n[1, 2]\""), "{dot}");
        assert!(dot.contains("n1 -> p0 [label=\"x\"];"));
        assert!(dot.contains("p0 -> n0;"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn provenance_edges_are_dashed() {
        let dot = build_and_emit("tf.add(in1, 1)", &["in1=[1, 2]"]);
        assert!(dot.contains("// Provenance"));
        assert!(dot.contains("n1 -> n0 [style=dashed"));
    }

    #[test]
    fn quotes_are_escaped() {
        let dot = build_and_emit("tf.sort(in1, axis=0, direction='DESCENDING')", &["in1=[2, 1]"]);
        assert!(dot.contains("direction='DESCENDING'"));
        assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
    }

    #[test]
    fn deterministic_output() {
        let text = "tf.add(tf.add(in1, in2), tf.add(in1, in2))";
        let inputs = ["in1=[1, 2]", "in2=[3, 4]"];
        assert_eq!(build_and_emit(text, &inputs), build_and_emit(text, &inputs));
    }
}
