// trace.rs — Provenance tracer
//
// For one operation application, computes per argument which flattened
// argument elements each flattened output element depends on. Dispatch is
// by argument role first (value-shape, full-breadth, elementwise,
// dependency propagation) and by family for arguments whose contribution
// is discrete (segment ids, gather indices, masks, stacked sequences).
//
// Preconditions: `args` and `output` come from executing `descriptor` with
//   those arguments, in formal order.
// Postconditions: traced operations yield exactly one result per formal
//   argument; untraced operations yield an empty map.
// Failure modes: internal inconsistencies produce `TraceError`.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::catalog::{ArgRole, Catalog, Descriptor, Family};
use crate::error::{ExecError, TraceError};
use crate::kernels::{Args, Kernel};
use crate::lift::{dependency_lists, lift, DepSet};
use crate::object::Object;
use crate::tensor::{broadcast_shapes, num_elements, Tensor, TensorError};

// ── Results ─────────────────────────────────────────────────────────────────

/// Provenance of one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceResult {
    /// For each flattened output element, the argument positions it depends
    /// on. `None` for value-shape arguments.
    pub provenance: Option<Vec<Vec<usize>>>,
    pub description: String,
    pub is_value_wise: bool,
}

impl ProvenanceResult {
    fn value_wise(description: &str) -> Self {
        ProvenanceResult {
            provenance: None,
            description: description.to_string(),
            is_value_wise: true,
        }
    }

    fn element_wise(provenance: Vec<Vec<usize>>, description: &str) -> Self {
        ProvenanceResult {
            provenance: Some(provenance),
            description: description.to_string(),
            is_value_wise: false,
        }
    }

    /// Python-style text of the payload, e.g. `[[0, 1], [], [2]]` or `None`.
    pub fn provenance_repr(&self) -> String {
        ProvenanceRepr(self.provenance.as_deref()).to_string()
    }
}

struct ProvenanceRepr<'a>(Option<&'a [Vec<usize>]>);

impl fmt::Display for ProvenanceRepr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(lists) = self.0 else {
            return f.write_str("None");
        };
        f.write_str("[")?;
        for (i, list) in lists.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("[")?;
            for (j, p) in list.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str("]")?;
        }
        f.write_str("]")
    }
}

/// Results keyed by formal argument name.
pub type Provenance = BTreeMap<String, ProvenanceResult>;

// ── Representatives ─────────────────────────────────────────────────────────

const BROADCAST_REPRESENTATIVE: &str = "tf.add(x, y)";
const AXIS_REPRESENTATIVE: &str = "tf.reduce_sum(input_tensor, axis)";
const SEGMENT_REPRESENTATIVE: &str = "tf.math.segment_sum(data, segment_ids)";
const UNSORTED_SEGMENT_REPRESENTATIVE: &str =
    "tf.math.unsorted_segment_sum(data, segment_ids, num_segments)";
const SORT_REPRESENTATIVE: &str = "tf.sort(values, axis)";
const DESCENDING_SORT_REPRESENTATIVE: &str = "tf.sort(values, axis, direction='DESCENDING')";

// ── Tracer ──────────────────────────────────────────────────────────────────

struct Tracer<'a> {
    descriptor: &'a Descriptor,
    args: &'a [Object],
    output_shape: Vec<usize>,
    catalog: &'a Catalog,
}

/// Provenance of every argument of one application of `descriptor`.
pub fn trace(
    descriptor: &Descriptor,
    args: &[Object],
    output: &Object,
    catalog: &Catalog,
) -> Result<Provenance, TraceError> {
    let Some(profile) = &descriptor.profile else {
        return Ok(Provenance::new());
    };
    if args.len() != descriptor.num_args() {
        return Err(TraceError::ArgumentCount {
            operation: descriptor.signature.clone(),
            expected: descriptor.num_args(),
            found: args.len(),
        });
    }

    let tracer = Tracer {
        descriptor,
        args,
        output_shape: output.shape(),
        catalog,
    };
    let mut results = Provenance::new();
    for (position, (name, role)) in descriptor.arg_names.iter().zip(&profile.roles).enumerate() {
        let result = tracer.argument(position, *role)?;
        results.insert(name.clone(), result);
    }

    if results.len() != descriptor.num_args() {
        return Err(TraceError::ArgumentCount {
            operation: descriptor.signature.clone(),
            expected: descriptor.num_args(),
            found: results.len(),
        });
    }
    tracing::debug!(
        operation = %descriptor.signature,
        family = %profile.family,
        arguments = results.len(),
        "traced provenance"
    );
    Ok(results)
}

impl Tracer<'_> {
    fn output_len(&self) -> usize {
        num_elements(&self.output_shape)
    }

    fn propagation_error(&self, source: TensorError) -> TraceError {
        TraceError::Propagation(ExecError {
            operation: self.descriptor.signature.clone(),
            source,
        })
    }

    fn argument(&self, position: usize, role: ArgRole) -> Result<ProvenanceResult, TraceError> {
        let description = self.descriptor.description(position);
        let provenance = match role {
            ArgRole::ValueShape => return Ok(ProvenanceResult::value_wise(description)),
            ArgRole::FullBreadth => self.full_breadth(position),
            ArgRole::Elementwise => self.elementwise(position)?,
            ArgRole::Differentiable => self.lifted(self.descriptor, position)?,
            ArgRole::Other => self.closed_form(position)?,
        };
        Ok(ProvenanceResult::element_wise(provenance, description))
    }

    /// Every output element depends on every argument element.
    fn full_breadth(&self, position: usize) -> Vec<Vec<usize>> {
        let size = match &self.args[position] {
            Object::Str(_) | Object::DType(_) => 1,
            other => num_elements(&other.shape()),
        };
        vec![(0..size).collect(); self.output_len()]
    }

    /// Diagonal map, through broadcasting when the argument is smaller.
    fn elementwise(&self, position: usize) -> Result<Vec<Vec<usize>>, TraceError> {
        let shape = self.args[position].shape();
        if shape == self.output_shape {
            return Ok((0..self.output_len()).map(|i| vec![i]).collect());
        }
        let broadcastable = broadcast_shapes(&shape, &self.output_shape)
            .is_ok_and(|b| b == self.output_shape);
        if !broadcastable {
            return Err(TraceError::NotElementwise {
                operation: self.descriptor.signature.clone(),
                argument: self.descriptor.arg_names[position].clone(),
                expected: self.output_shape.clone(),
                found: shape,
            });
        }
        let diagonal = Tensor::from_fn(shape, DepSet::single);
        let spread = diagonal
            .broadcast_to(&self.output_shape)
            .map_err(|e| self.propagation_error(e))?;
        Ok(dependency_lists(spread))
    }

    /// Propagate dependencies through `through`'s kernel, with this
    /// application's arguments bound to its formals.
    fn lifted(&self, through: &Descriptor, position: usize) -> Result<Vec<Vec<usize>>, TraceError> {
        let args = Args::new(&through.arg_names, self.args);
        lift(through.kernel, &args, position)
            .map(dependency_lists)
            .map_err(|e| self.propagation_error(e))
    }

    fn representative(&self, signature: &str) -> Result<&Descriptor, TraceError> {
        self.catalog
            .lookup_by_signature(signature)
            .map(|d| d.as_ref())
            .ok_or_else(|| TraceError::MissingRepresentative(signature.to_string()))
    }

    fn closed_form(&self, position: usize) -> Result<Vec<Vec<usize>>, TraceError> {
        let family = self.descriptor.family();
        let kernel = self.descriptor.kernel;
        if !family.covers(kernel, position) {
            return Err(TraceError::Uncovered {
                operation: self.descriptor.signature.clone(),
                argument: self.descriptor.arg_names[position].clone(),
                family: family.to_string(),
            });
        }
        match family {
            Family::Broadcast => {
                let rep = self.representative(BROADCAST_REPRESENTATIVE)?;
                self.lifted(rep, position)
            }
            Family::AlongAxis => {
                let rep = self.representative(AXIS_REPRESENTATIVE)?;
                self.lifted(rep, position)
            }
            Family::AlongSegment if position == 0 => {
                let signature = if self.args.len() == 3 {
                    UNSORTED_SEGMENT_REPRESENTATIVE
                } else {
                    SEGMENT_REPRESENTATIVE
                };
                let rep = self.representative(signature)?;
                self.lifted(rep, position)
            }
            Family::AlongSegment => self.segment_ids(),
            Family::ArgSort => {
                let signature = match kernel {
                    Kernel::ArgSort { descending: true } => DESCENDING_SORT_REPRESENTATIVE,
                    _ => SORT_REPRESENTATIVE,
                };
                let rep = self.representative(signature)?;
                self.lifted(rep, position)
            }
            Family::Gather => Ok(self.gather_indices()),
            Family::StackLike => self.lifted(self.descriptor, position),
            Family::Condition if kernel == Kernel::BooleanMask => self.mask(),
            Family::Condition => self.where_condition(),
            Family::Preprocess | Family::Other => Err(TraceError::Uncovered {
                operation: self.descriptor.signature.clone(),
                argument: self.descriptor.arg_names[position].clone(),
                family: family.to_string(),
            }),
        }
    }

    fn indices(&self, position: usize) -> Result<Tensor<i64>, TraceError> {
        self.args[position]
            .to_tensor()
            .and_then(|t| t.to_indices())
            .map_err(|e| self.propagation_error(e))
    }

    fn bools(&self, position: usize) -> Result<Tensor<bool>, TraceError> {
        self.args[position]
            .to_tensor()
            .map(|t| t.to_bools())
            .map_err(|e| self.propagation_error(e))
    }

    /// Output segment `s` depends on exactly the ids equal to `s`.
    fn segment_ids(&self) -> Result<Vec<Vec<usize>>, TraceError> {
        let ids = self.indices(1)?;
        let segments = self.output_shape.first().copied().unwrap_or(0);
        let total = self.output_len();
        let inner = if segments == 0 { 0 } else { total / segments };
        Ok((0..total)
            .map(|o| {
                let s = (o / inner) as i64;
                ids.data()
                    .iter()
                    .enumerate()
                    .filter(|(_, &id)| id == s)
                    .map(|(p, _)| p)
                    .collect()
            })
            .collect())
    }

    /// Output element `k` comes from the index element that selected its
    /// row.
    fn gather_indices(&self) -> Vec<Vec<usize>> {
        let total = self.output_len();
        if self.output_shape.is_empty() {
            return vec![vec![0]];
        }
        let rows = num_elements(&self.args[1].shape()).max(1);
        let block = (total / rows).max(1);
        (0..total).map(|k| vec![k / block]).collect()
    }

    /// Each selected mask position, once per element of the row it selects.
    fn mask(&self) -> Result<Vec<Vec<usize>>, TraceError> {
        let mask = self.bools(1)?;
        let data_shape = self.args[0].shape();
        let inner = num_elements(data_shape.get(mask.rank()..).unwrap_or(&[]));
        Ok(selected(&mask)
            .flat_map(|p| std::iter::repeat(vec![p]).take(inner))
            .collect())
    }

    /// Each true position, once per coordinate of its output row.
    fn where_condition(&self) -> Result<Vec<Vec<usize>>, TraceError> {
        let condition = self.bools(0)?;
        let rank = condition.rank();
        Ok(selected(&condition)
            .flat_map(|p| std::iter::repeat(vec![p]).take(rank))
            .collect())
    }
}

fn selected(mask: &Tensor<bool>) -> impl Iterator<Item = usize> + '_ {
    mask.data()
        .iter()
        .enumerate()
        .filter(|(_, &keep)| keep)
        .map(|(p, _)| p)
}

// ── Tests ───────────────────────────────────────────────────────────────────
