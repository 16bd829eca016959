// pipeline.rs — End-to-end entry points and fingerprints
//
// Text → value → graph, and externally built value → re-bound value →
// graph, plus per-operation provenance listings and SHA-256 fingerprints
// usable as cache keys by the owning system.
//
// Preconditions: bindings hold every input the expression names.
// Postconditions: a returned `Traced` pairs the executed value tree with
//   the graph built from exactly that tree.
// Failure modes: parse, resolution, unbound-name and execution errors are
//   returned structured; tracer inconsistencies surface as `Error::Trace`.
// Side effects: none.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::catalog::Catalog;
use crate::error::{Result, TraceError};
use crate::graph::{build_graph, Dataflow, GraphOptions};
use crate::trace::{trace, Provenance};
use crate::value::{rebind, value_from_text, Bindings, Value};

// ── Fingerprints ────────────────────────────────────────────────────────────

/// Content hashes identifying one reconstruction request.
///
/// `expression_hash`: SHA-256 of the raw expression text.
/// `catalog_fingerprint`: SHA-256 of `Catalog::canonical_json()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub expression_hash: [u8; 32],
    pub catalog_fingerprint: [u8; 32],
    pub version: &'static str,
}

impl Fingerprint {
    pub fn expression_hash_hex(&self) -> String {
        bytes_to_hex(&self.expression_hash)
    }

    pub fn catalog_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.catalog_fingerprint)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "expression_hash": self.expression_hash_hex(),
            "catalog_fingerprint": self.catalog_fingerprint_hex(),
            "version": self.version,
        })
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

pub fn compute_fingerprint(expression: &str, catalog: &Catalog) -> Fingerprint {
    Fingerprint {
        expression_hash: sha256(expression.as_bytes()),
        catalog_fingerprint: sha256(catalog.canonical_json().as_bytes()),
        version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Reconstruction ──────────────────────────────────────────────────────────

/// An executed value tree and its dataflow graph.
#[derive(Debug, Clone)]
pub struct Traced {
    pub value: Value,
    pub graph: Dataflow,
}

/// Parse, resolve, execute and graph `expression`.
pub fn trace_text(
    expression: &str,
    bindings: &Bindings,
    catalog: &Catalog,
    options: GraphOptions,
) -> Result<Traced> {
    tracing::debug!(expression, inputs = bindings.len(), "reconstructing expression");
    let value = value_from_text(expression, bindings, catalog)?;
    let graph = build_graph(&value, catalog, options)?;
    Ok(Traced { value, graph })
}

/// Re-bind an existing value tree to `bindings` and graph the result.
pub fn trace_value(
    value: &Value,
    bindings: &Bindings,
    catalog: &Catalog,
    options: GraphOptions,
) -> Result<Traced> {
    tracing::debug!(operations = value.operation_count(), "re-binding value tree");
    let value = rebind(value, bindings)?;
    let graph = build_graph(&value, catalog, options)?;
    Ok(Traced { value, graph })
}

// ── Provenance listing ──────────────────────────────────────────────────────

/// Provenance of one operation application in a value tree.
#[derive(Debug, Clone, Serialize)]
pub struct OperationTrace {
    pub expression: String,
    pub operation: String,
    pub arguments: Provenance,
}

/// Trace every catalog operation in `value`, children before parents.
pub fn trace_operations(value: &Value, catalog: &Catalog) -> Result<Vec<OperationTrace>, TraceError> {
    let mut out = Vec::new();
    collect_traces(value, catalog, &mut out)?;
    Ok(out)
}

fn collect_traces(value: &Value, catalog: &Catalog, out: &mut Vec<OperationTrace>) -> Result<(), TraceError> {
    let Value::Operation(op) = value else {
        return Ok(());
    };
    for arg in &op.args {
        collect_traces(arg, catalog, out)?;
    }
    if let Some(descriptor) = op.operation.descriptor() {
        out.push(OperationTrace {
            expression: value.expression(),
            operation: descriptor.signature.clone(),
            arguments: trace(descriptor, &op.arg_objects(), &op.result, catalog)?,
        });
    }
    Ok(())
}
