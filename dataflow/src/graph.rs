// graph.rs — Dataflow graph construction from value trees
//
// Walks a value tree once, top-down, emitting a value node per visited
// value, an operation node per application, an output edge from each
// operation to its value, labelled argument edges into each operation, and
// provenance trace edges keyed by the operation's value node.
//
// Preconditions: `root` was built or re-bound against `catalog`.
// Postconditions: node keys are allocated in traversal order; value nodes
//   precede operation nodes in the node table.
// Failure modes: tracer inconsistencies produce `TraceError`.
// Side effects: none.

use std::collections::{BTreeMap, HashMap};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::TraceError;
use crate::id::{NodeKey, NodeKeyAllocator};
use crate::trace::trace;
use crate::value::{OperationValue, Value};

// ── Configuration ───────────────────────────────────────────────────────────

/// When visits of the same expression share one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// An input or constant reached again under a different parent reuses
    /// its node; repeats under the same parent and all intermediates get
    /// fresh nodes. This gives `tf.add(tf.add(in1, in2), tf.add(in1, in2))`
    /// eight nodes and nine edges.
    #[default]
    SharedLeaves,
    /// One node per visit.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    pub merge: MergePolicy,
    /// Float rounding in value strings.
    pub decimals: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        GraphOptions {
            merge: MergePolicy::default(),
            decimals: 2,
        }
    }
}

// ── Graph shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Constant,
    Intermediate,
    Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Value string; absent on operation nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub start: NodeKey,
    pub end: NodeKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEdge {
    pub start: NodeKey,
    pub is_value_wise: bool,
    pub description: String,
    /// Python-style list text, or `None` for value-shape arguments.
    pub provenance: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataflow {
    #[serde(serialize_with = "serialize_nodes")]
    pub nodes: Vec<(NodeKey, Node)>,
    pub edges: Vec<Edge>,
    pub trace_edges: BTreeMap<NodeKey, Vec<TraceEdge>>,
}

fn serialize_nodes<S: Serializer>(nodes: &[(NodeKey, Node)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(nodes.len()))?;
    for (key, node) in nodes {
        map.serialize_entry(key, node)?;
    }
    map.end()
}

impl Dataflow {
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.iter().find(|(k, _)| *k == key).map(|(_, n)| n)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Value nodes only.
    pub fn value_nodes(&self) -> impl Iterator<Item = &(NodeKey, Node)> {
        self.nodes.iter().filter(|(k, _)| !k.is_operation())
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

struct Builder<'a> {
    catalog: &'a Catalog,
    options: GraphOptions,
    ids: NodeKeyAllocator,
    value_nodes: Vec<(NodeKey, Node)>,
    operation_nodes: Vec<(NodeKey, Node)>,
    edges: Vec<Edge>,
    trace_edges: BTreeMap<NodeKey, Vec<TraceEdge>>,
    /// Leaf expression to the node each parent reached it through.
    leaves: HashMap<String, Vec<(Option<NodeKey>, NodeKey)>>,
}

/// Build the dataflow graph of `root`.
pub fn build_graph(root: &Value, catalog: &Catalog, options: GraphOptions) -> Result<Dataflow, TraceError> {
    let mut builder = Builder {
        catalog,
        options,
        ids: NodeKeyAllocator::new(),
        value_nodes: Vec::new(),
        operation_nodes: Vec::new(),
        edges: Vec::new(),
        trace_edges: BTreeMap::new(),
        leaves: HashMap::new(),
    };
    builder.visit(root, None)?;

    let mut nodes = builder.value_nodes;
    nodes.extend(builder.operation_nodes);
    let graph = Dataflow {
        nodes,
        edges: builder.edges,
        trace_edges: builder.trace_edges,
    };
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        traced = graph.trace_edges.len(),
        "built dataflow graph"
    );
    Ok(graph)
}

impl Builder<'_> {
    /// Add `value` below `parent`; returns its node and expression text.
    ///
    /// Labels are rendered bottom-up from the children's labels, so each
    /// subtree is rendered once.
    fn visit(&mut self, value: &Value, parent: Option<NodeKey>) -> Result<(NodeKey, String), TraceError> {
        let kind = match value {
            Value::Input { .. } => NodeKind::Input,
            Value::Constant { .. } => NodeKind::Constant,
            Value::Operation(_) => NodeKind::Intermediate,
        };
        let leaf_expression = match value {
            Value::Operation(_) => None,
            leaf => Some(leaf.expression()),
        };
        if let Some(expression) = &leaf_expression {
            if let Some(key) = self.shared_leaf(expression, parent) {
                return Ok((key, expression.clone()));
            }
        }

        let key = self.ids.alloc_value();
        let slot = self.value_nodes.len();
        self.value_nodes.push((
            key,
            Node {
                kind,
                value: Some(value.value_string(self.options.decimals)),
                label: String::new(),
                docstring: None,
            },
        ));

        let expression = match value {
            Value::Operation(op) => {
                let labels = self.operation(op, key)?;
                op.operation.render(&labels)
            }
            leaf => {
                let expression = leaf_expression.unwrap_or_else(|| leaf.expression());
                self.leaves
                    .entry(expression.clone())
                    .or_default()
                    .push((parent, key));
                expression
            }
        };
        self.value_nodes[slot].1.label = expression.clone();
        Ok((key, expression))
    }

    fn shared_leaf(&self, expression: &str, parent: Option<NodeKey>) -> Option<NodeKey> {
        if self.options.merge != MergePolicy::SharedLeaves {
            return None;
        }
        let seen = self.leaves.get(expression)?;
        if seen.iter().any(|(p, _)| *p == parent) {
            return None;
        }
        seen.first().map(|(_, key)| *key)
    }

    /// Add the operation producing `value_key`; returns its argument labels.
    fn operation(&mut self, op: &OperationValue, value_key: NodeKey) -> Result<Vec<String>, TraceError> {
        let op_key = self.ids.alloc_operation();
        self.operation_nodes.push((
            op_key,
            Node {
                kind: NodeKind::Operation,
                value: None,
                label: op.operation.signature().to_string(),
                docstring: Some(op.operation.docstring().to_string()),
            },
        ));
        self.edges.push(Edge {
            start: op_key,
            end: value_key,
            label: None,
        });

        let provenance = match op.operation.descriptor() {
            Some(d) => trace(d, &op.arg_objects(), &op.result, self.catalog)?,
            None => Default::default(),
        };

        let mut labels = Vec::with_capacity(op.args.len());
        for (i, arg) in op.args.iter().enumerate() {
            let (child, label) = self.visit(arg, Some(value_key))?;
            labels.push(label);
            let name = op.operation.arg_names().get(i);
            self.edges.push(Edge {
                start: child,
                end: op_key,
                label: name.cloned(),
            });
            if let Some(result) = name.and_then(|n| provenance.get(n)) {
                self.trace_edges.entry(value_key).or_default().push(TraceEdge {
                    start: child,
                    is_value_wise: result.is_value_wise,
                    description: result.description.clone(),
                    provenance: result.provenance_repr(),
                });
            }
        }
        Ok(labels)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
