// value.rs — Value trees: construction, re-execution and reconstruction
//
// A `Value` is a constant, a named input, or an operation applied to
// argument values together with the result it produced. Trees are built
// from expression text (parse, resolve, execute bottom-up) or mirrored from
// an existing tree against new input bindings.
//
// Preconditions: bindings map input names to their concrete objects.
// Postconditions: every operation node's result is its operation applied to
//   its arguments' objects; `rebind` preserves tree shape exactly.
// Failure modes: syntax, literal, resolution, unbound-reference and
//   execution errors, all returned as `Error`.
// Side effects: none.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use crate::ast::{CallTarget, ParsedCall, Primitive};
use crate::catalog::{Catalog, Descriptor};
use crate::error::{Error, ExecError, LiteralError, ParseError, Result};
use crate::kernels::{apply_primitive, Args};
use crate::object::Object;

// ── Operations ──────────────────────────────────────────────────────────────

/// What an operation node applies.
#[derive(Debug, Clone)]
pub enum Operation {
    Function(Arc<Descriptor>),
    Primitive(Primitive),
}

impl Operation {
    pub fn signature(&self) -> &str {
        match self {
            Operation::Function(d) => &d.signature,
            Operation::Primitive(p) => p.signature(),
        }
    }

    pub fn docstring(&self) -> &str {
        match self {
            Operation::Function(d) => &d.docstring,
            Operation::Primitive(p) => p.docstring(),
        }
    }

    /// Formal names labelling argument edges; primitives have none.
    pub fn arg_names(&self) -> &[String] {
        match self {
            Operation::Function(d) => &d.arg_names,
            Operation::Primitive(_) => &[],
        }
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        match self {
            Operation::Function(d) => Some(d),
            Operation::Primitive(_) => None,
        }
    }

    pub fn render(&self, args: &[String]) -> String {
        match self {
            Operation::Function(d) => d.render(args),
            Operation::Primitive(p) => p.render(args),
        }
    }

    pub fn apply(&self, args: &[Object]) -> Result<Object, ExecError> {
        let outcome = match self {
            Operation::Function(d) => d.kernel.execute(&Args::new(&d.arg_names, args)),
            Operation::Primitive(p) => apply_primitive(*p, args),
        };
        outcome.map_err(|source| ExecError {
            operation: self.signature().to_string(),
            source,
        })
    }
}

// ── Values ──────────────────────────────────────────────────────────────────

/// An operation applied to argument values.
#[derive(Debug, Clone)]
pub struct OperationValue {
    pub operation: Operation,
    pub args: Vec<Value>,
    pub result: Object,
}

impl OperationValue {
    pub fn arg_objects(&self) -> Vec<Object> {
        self.args.iter().map(|a| a.object().clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    /// A literal; its expression is the text it was written as.
    Constant { object: Object, expression: String },
    Input { name: String, object: Object },
    Operation(OperationValue),
}

impl Value {
    pub fn object(&self) -> &Object {
        match self {
            Value::Constant { object, .. } | Value::Input { object, .. } => object,
            Value::Operation(op) => &op.result,
        }
    }

    /// Source text that rebuilds this value.
    pub fn expression(&self) -> String {
        match self {
            Value::Constant { expression, .. } => expression.clone(),
            Value::Input { name, .. } => name.clone(),
            Value::Operation(op) => {
                let args: Vec<String> = op.args.iter().map(Value::expression).collect();
                op.operation.render(&args)
            }
        }
    }

    pub fn value_string(&self, decimals: u32) -> String {
        self.object().to_value_string(decimals)
    }

    /// Number of operation nodes in the tree.
    pub fn operation_count(&self) -> usize {
        match self {
            Value::Operation(op) => 1 + op.args.iter().map(Value::operation_count).sum::<usize>(),
            _ => 0,
        }
    }

    /// Nested JSON dump: `{expression, value, operation?, parent, children?}`.
    pub fn to_tree(&self, decimals: u32) -> serde_json::Value {
        self.tree_node(None, decimals)
    }

    fn tree_node(&self, parent: Option<&str>, decimals: u32) -> serde_json::Value {
        let expression = self.expression();
        let mut node = json!({
            "expression": expression,
            "value": self.value_string(decimals),
            "parent": parent,
        });
        if let Value::Operation(op) = self {
            node["operation"] = json!(op.operation.signature());
            let children: Vec<serde_json::Value> = op
                .args
                .iter()
                .map(|a| a.tree_node(Some(&expression), decimals))
                .collect();
            node["children"] = json!(children);
        }
        node
    }
}

// ── Bindings ────────────────────────────────────────────────────────────────

/// Input name to bound object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(BTreeMap<String, Object>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, object: Object) {
        self.0.insert(name.into(), object.tensorize());
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Positional inputs, named `in1`, `in2`, ….
    pub fn positional(objects: impl IntoIterator<Item = Object>) -> Self {
        let mut bindings = Bindings::new();
        for (i, object) in objects.into_iter().enumerate() {
            bindings.insert(format!("in{}", i + 1), object);
        }
        bindings
    }

    /// A JSON array binds `in1`, `in2`, …; a JSON object binds its keys.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let convert = |v: &serde_json::Value| {
            Object::from_json(v).map_err(|e| Error::Bindings(e.to_string()))
        };
        match value {
            serde_json::Value::Array(items) => Ok(Bindings::positional(
                items.iter().map(convert).collect::<Result<Vec<_>>>()?,
            )),
            serde_json::Value::Object(map) => {
                let mut bindings = Bindings::new();
                for (name, v) in map {
                    bindings.insert(name.clone(), convert(v)?);
                }
                Ok(bindings)
            }
            other => Err(Error::Bindings(format!(
                "expected a JSON array or object of inputs, got {other}"
            ))),
        }
    }

    /// Add one `NAME=LITERAL` assignment.
    pub fn assign(&mut self, assignment: &str) -> Result<()> {
        let Some((name, literal)) = assignment.split_once('=') else {
            return Err(Error::Bindings(format!(
                "`{assignment}` is not of the form NAME=LITERAL"
            )));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Bindings(format!("`{assignment}` names no input")));
        }
        let object = crate::literal::evaluate(literal.trim())?;
        self.insert(name, object);
        Ok(())
    }
}

// ── Construction ────────────────────────────────────────────────────────────

/// Parse, resolve and execute `expression`.
pub fn value_from_text(expression: &str, bindings: &Bindings, catalog: &Catalog) -> Result<Value> {
    let call = crate::parser::parse(expression)?;
    tracing::trace!(expression, target = ?call.target, "parsed expression");
    build_from_parsed(&call, bindings, catalog)
}

/// Build the value of an already parsed expression.
pub fn build_from_parsed(call: &ParsedCall, bindings: &Bindings, catalog: &Catalog) -> Result<Value> {
    let (operation, arg_texts) = match &call.target {
        CallTarget::Leaf => {
            let text = call.args.first().map(String::as_str).unwrap_or_default();
            let value = leaf(text, bindings);
            // A list of non-literals, e.g. the `values` of `tf.stack([in1, in2], 0)`.
            if matches!(value, Err(Error::Unbound { .. } | Error::Literal(_))) {
                match crate::parser::parse_list_display(text) {
                    Ok(Some(items)) => return build_from_parsed(&items, bindings, catalog),
                    Err(e @ ParseError::TupleArity(_)) => return Err(e.into()),
                    _ => {}
                }
            }
            return value;
        }
        CallTarget::Primitive(p) => (Operation::Primitive(*p), call.args.clone()),
        CallTarget::Function(_) => {
            let resolved = crate::resolve::resolve(call, catalog)?;
            (Operation::Function(resolved.descriptor), resolved.args)
        }
    };
    let args = arg_texts
        .iter()
        .map(|text| value_from_text(text, bindings, catalog))
        .collect::<Result<Vec<_>>>()?;
    apply(operation, args)
}

fn leaf(text: &str, bindings: &Bindings) -> Result<Value> {
    if let Some(object) = bindings.get(text) {
        return Ok(Value::Input {
            name: text.to_string(),
            object: object.clone(),
        });
    }
    match crate::literal::evaluate(text) {
        Ok(object) => Ok(Value::Constant {
            object,
            expression: text.to_string(),
        }),
        Err(LiteralError::UnknownName(name)) => Err(Error::Unbound { name }),
        Err(e) => Err(e.into()),
    }
}

fn apply(operation: Operation, args: Vec<Value>) -> Result<Value> {
    let objects: Vec<Object> = args.iter().map(|a| a.object().clone()).collect();
    let result = operation.apply(&objects)?;
    tracing::trace!(operation = operation.signature(), "applied operation");
    Ok(Value::Operation(OperationValue {
        operation,
        args,
        result,
    }))
}

/// Mirror `value` with every input re-bound from `bindings`, re-executing
/// each operation bottom-up.
pub fn rebind(value: &Value, bindings: &Bindings) -> Result<Value> {
    match value {
        Value::Constant { .. } => Ok(value.clone()),
        Value::Input { name, .. } => match bindings.get(name) {
            Some(object) => Ok(Value::Input {
                name: name.clone(),
                object: object.clone(),
            }),
            None => Err(Error::Unbound { name: name.clone() }),
        },
        Value::Operation(op) => {
            let args = op
                .args
                .iter()
                .map(|a| rebind(a, bindings))
                .collect::<Result<Vec<_>>>()?;
            apply(op.operation.clone(), args)
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
