// lift.rs — Dependency propagation through kernels
//
// Re-runs an operation's data movement on dependency sets instead of
// numbers. The traced argument contributes one singleton set per flattened
// element; every other argument contributes empty sets, and its concrete
// values still drive shape and data-dependent choices (sort order, mask,
// gather indices, extremum winners). Output element `k` of the result holds
// the argument positions it depends on.
//
// Preconditions: `args` are the concrete arguments the operation was
//   executed with, in formal order.
// Postconditions: the result has the operation's output shape.
// Failure modes: kernels without a propagation rule and argument
//   violations produce `TensorError`.
// Side effects: none.

use crate::kernels::{
    contraction_axes, dims, paddings, reduction_axes, segment_slots, sequence, Args, Kernel,
    ReduceFn,
};
use crate::object::Object;
use crate::tensor::{self, bail, normalize_axis, Accumulate, Tensor, TensorResult};

// ── Dependency sets ─────────────────────────────────────────────────────────

/// Sorted, duplicate-free set of flattened argument positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepSet(Vec<usize>);

impl DepSet {
    pub fn empty() -> Self {
        DepSet(Vec::new())
    }

    pub fn single(position: usize) -> Self {
        DepSet(vec![position])
    }

    pub fn union(&self, other: &DepSet) -> DepSet {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        DepSet(out)
    }

    pub fn positions(&self) -> &[usize] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }
}

impl FromIterator<usize> for DepSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut v: Vec<usize> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        DepSet(v)
    }
}

/// A concrete value with the dependencies of its first-order sensitivity.
///
/// A product only keeps a factor's dependencies when the other factor is
/// non-zero, so contractions drop terms multiplied by zero.
#[derive(Debug, Clone)]
struct Sensitivity {
    value: f64,
    deps: DepSet,
}

impl Accumulate for Sensitivity {
    fn zero() -> Self {
        Sensitivity {
            value: 0.0,
            deps: DepSet::empty(),
        }
    }
    fn plus(&self, other: &Self) -> Self {
        Sensitivity {
            value: self.value + other.value,
            deps: self.deps.union(&other.deps),
        }
    }
    fn times(&self, other: &Self) -> Self {
        let through = |d: &DepSet, partner: f64| if partner != 0.0 { d.clone() } else { DepSet::empty() };
        Sensitivity {
            value: self.value * other.value,
            deps: through(&self.deps, other.value).union(&through(&other.deps, self.value)),
        }
    }
}

fn sensitivities(obj: &Object, traced: bool) -> TensorResult<Tensor<Sensitivity>> {
    let values = obj.to_tensor()?;
    values.values().zip_with(&dependencies(obj, traced)?, |v, d| Sensitivity {
        value: *v,
        deps: d.clone(),
    })
}

fn union_all<'a>(sets: impl IntoIterator<Item = &'a DepSet>) -> DepSet {
    sets.into_iter()
        .fold(DepSet::empty(), |acc, s| acc.union(s))
}

// ── Argument surrogates ─────────────────────────────────────────────────────

fn dependencies(obj: &Object, traced: bool) -> TensorResult<Tensor<DepSet>> {
    let shape = obj.to_tensor()?.shape().to_vec();
    Ok(if traced {
        Tensor::from_fn(shape, DepSet::single)
    } else {
        Tensor::filled(shape, DepSet::empty())
    })
}

/// Surrogates for a sequence argument; positions run through the items in
/// order.
fn sequence_dependencies(obj: &Object, traced: bool) -> TensorResult<Vec<Tensor<DepSet>>> {
    let (items, _) = sequence(obj)?;
    let mut offset = 0;
    Ok(items
        .iter()
        .map(|t| {
            let start = offset;
            offset += t.len();
            let shape = t.shape().to_vec();
            if traced {
                Tensor::from_fn(shape, |i| DepSet::single(start + i))
            } else {
                Tensor::filled(shape, DepSet::empty())
            }
        })
        .collect())
}

/// Extremum winners of a lane, ties included.
fn winners(lane: &[&(f64, DepSet)], max: bool) -> DepSet {
    let best = lane.iter().map(|(v, _)| *v).fold(None, |acc: Option<f64>, v| {
        Some(match acc {
            None => v,
            Some(b) if max => b.max(v),
            Some(b) => b.min(v),
        })
    });
    match best {
        None => DepSet::empty(),
        Some(best) => union_all(lane.iter().filter(|(v, _)| *v == best).map(|(_, d)| d)),
    }
}

// ── Propagation ─────────────────────────────────────────────────────────────

impl Kernel {
    /// Whether `lift` has a propagation rule for this kernel.
    pub fn liftable(self) -> bool {
        matches!(
            self,
            Kernel::Unary(_)
                | Kernel::Binary(_)
                | Kernel::AddN
                | Kernel::BooleanMask
                | Kernel::BroadcastTo
                | Kernel::Cast
                | Kernel::ClipByValue
                | Kernel::Concat
                | Kernel::Constant
                | Kernel::CumSum { .. }
                | Kernel::ExpandDims
                | Kernel::Gather
                | Kernel::MatMul
                | Kernel::Pad(_)
                | Kernel::Reduce(_)
                | Kernel::Reshape
                | Kernel::Reverse
                | Kernel::Roll
                | Kernel::Segment(_)
                | Kernel::Sort { .. }
                | Kernel::Squeeze
                | Kernel::Stack
                | Kernel::TensorDot
                | Kernel::Tile
                | Kernel::Transpose
                | Kernel::UnsortedSegment(_)
                | Kernel::Where
        )
    }
}

/// Dependencies of each output element on argument `target`.
pub fn lift(kernel: Kernel, args: &Args<'_>, target: usize) -> TensorResult<Tensor<DepSet>> {
    let deps = |i: usize| dependencies(args.at(i)?, i == target);
    Ok(match kernel {
        Kernel::Unary(_) | Kernel::Cast | Kernel::Constant => deps(0)?,
        Kernel::Binary(_) => deps(0)?.zip_with(&deps(1)?, DepSet::union)?,
        Kernel::ClipByValue => deps(0)?
            .zip_with(&deps(1)?, DepSet::union)?
            .zip_with(&deps(2)?, DepSet::union)?,
        Kernel::BroadcastTo => deps(0)?.broadcast_to(&dims(&args.ints(1)?)?)?,
        Kernel::ExpandDims => deps(0)?.expand_dims(args.int(1)?)?,
        Kernel::Reshape => deps(0)?.reshape(&args.ints(1)?)?,
        Kernel::Reverse => deps(0)?.reverse(&args.ints(1)?)?,
        Kernel::Roll => deps(0)?.roll(&args.ints(1)?, &args.ints(2)?)?,
        Kernel::Squeeze => deps(0)?.squeeze(args.opt_ints("axis")?.as_deref())?,
        Kernel::Tile => deps(0)?.tile(&args.ints(1)?)?,
        Kernel::Transpose => deps(0)?.transpose(args.opt_ints("perm")?.as_deref())?,
        Kernel::Pad(mode) => {
            let data = deps(0)?;
            let p = paddings(&args.tensor(1)?, data.rank())?;
            data.pad(&p, mode, &DepSet::empty())?
        }
        Kernel::Gather => {
            let indices = args.tensor(1)?.to_indices()?;
            let axis = args.opt_int("axis")?.unwrap_or(0);
            let batch_dims = args.opt_int("batch_dims")?.unwrap_or(0);
            deps(0)?.gather(&indices, axis, batch_dims)?
        }
        Kernel::BooleanMask => deps(0)?.boolean_mask(&args.tensor(1)?.require_bool()?)?,
        Kernel::CumSum { exclusive } => {
            let data = deps(0)?;
            let axis = normalize_axis(args.int(1)?, data.rank())?;
            data.scan_lanes(axis, |lane| {
                let mut acc = DepSet::empty();
                lane.iter()
                    .map(|d| {
                        let before = acc.clone();
                        acc = acc.union(d);
                        if exclusive {
                            before
                        } else {
                            acc.clone()
                        }
                    })
                    .collect()
            })?
        }
        Kernel::MatMul | Kernel::TensorDot => {
            let a = sensitivities(args.at(0)?, target == 0)?;
            let b = sensitivities(args.at(1)?, target == 1)?;
            let product = if kernel == Kernel::MatMul {
                tensor::matmul(&a, &b)?
            } else {
                let (axes_a, axes_b) = contraction_axes(args.at(2)?, a.rank(), b.rank())?;
                tensor::tensordot(&a, &b, &axes_a, &axes_b)?
            };
            product.map(|s| s.deps.clone())
        }
        Kernel::Reduce(f) => {
            let data = deps(0)?;
            let axes = reduction_axes(args.get("axis"), data.rank())?;
            match f {
                ReduceFn::Max | ReduceFn::Min => {
                    let values = args.tensor(0)?;
                    let pairs = values.values().zip_with(&data, |v, d| (*v, d.clone()))?;
                    pairs.reduce_axes(&axes, |lane| winners(lane, f == ReduceFn::Max))
                }
                ReduceFn::Sum | ReduceFn::Mean | ReduceFn::Prod => {
                    data.reduce_axes(&axes, |lane| union_all(lane.iter().copied()))
                }
            }
        }
        Kernel::Sort { descending } => {
            let values = args.tensor(0)?;
            let axis = normalize_axis(args.int(1)?, values.rank())?;
            deps(0)?.sort_lanes_by(values.values(), axis, descending)?
        }
        Kernel::Segment(_) | Kernel::UnsortedSegment(_) => {
            let unsorted = matches!(kernel, Kernel::UnsortedSegment(_));
            let (slots, num) = segment_slots(args, unsorted)?;
            deps(0)?.segments(&slots, num, |lane| union_all(lane.iter().copied()))?
        }
        Kernel::Where => {
            if args.len() != 3 {
                bail!("single-argument where has no propagation rule");
            }
            let condition = args.tensor(0)?.require_bool()?;
            let chosen = Tensor::select(&condition, &deps(1)?, &deps(2)?)?;
            // The condition decides every output element.
            chosen.zip_with(&deps(0)?, DepSet::union)?
        }
        Kernel::Stack | Kernel::Concat => {
            let items = sequence_dependencies(args.at(0)?, target == 0)?;
            let axis = args.int(1)?;
            if kernel == Kernel::Stack {
                Tensor::stack(&items, axis)?
            } else {
                Tensor::concat(&items, axis)?
            }
        }
        Kernel::AddN => {
            let items = sequence_dependencies(args.at(0)?, target == 0)?;
            let Some((first, rest)) = items.split_first() else {
                bail!("add_n needs at least one tensor");
            };
            rest.iter()
                .try_fold(first.clone(), |acc, t| acc.zip_with(t, DepSet::union))?
        }
        other => bail!("{other:?} has no dependency propagation rule"),
    })
}

/// Output-major dependency lists.
pub fn dependency_lists(deps: Tensor<DepSet>) -> Vec<Vec<usize>> {
    deps.into_data().into_iter().map(DepSet::into_vec).collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::UnaryFn;
    use crate::literal::evaluate;
    use crate::tensor::PadMode;

    fn lift_ok(kernel: Kernel, names: &[&str], values: &[&str], target: usize) -> Vec<Vec<usize>> {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let values: Vec<Object> = values
            .iter()
            .map(|v| evaluate(v).unwrap().tensorize())
            .collect();
        let deps = lift(kernel, &Args::new(&names, &values), target)
            .unwrap_or_else(|e| panic!("lift failed: {e}"));
        dependency_lists(deps)
    }

    #[test]
    fn union_is_sorted_and_unique() {
        let a: DepSet = [3, 1].into_iter().collect();
        let b: DepSet = [2, 3].into_iter().collect();
        assert_eq!(a.union(&b).positions(), &[1, 2, 3]);
    }

    #[test]
    fn unary_is_diagonal() {
        let got = lift_ok(Kernel::Unary(UnaryFn::Abs), &["x"], &["[[1, 2], [3, 4]]"], 0);
        assert_eq!(got, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn reduce_sum_over_everything() {
        let got = lift_ok(Kernel::Reduce(ReduceFn::Sum), &["input_tensor"], &["[[1, 2], [3, 4]]"], 0);
        assert_eq!(got, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn reduce_max_keeps_ties() {
        let got = lift_ok(Kernel::Reduce(ReduceFn::Max), &["input_tensor"], &["[5, 1, 5, 2]"], 0);
        assert_eq!(got, vec![vec![0, 2]]);
    }

    #[test]
    fn transpose_permutes() {
        let got = lift_ok(Kernel::Transpose, &["a"], &["[[1, 2, 3], [4, 5, 6]]"], 0);
        assert_eq!(got, vec![vec![0], vec![3], vec![1], vec![4], vec![2], vec![5]]);
    }

    #[test]
    fn pad_fill_has_no_dependencies() {
        let got = lift_ok(
            Kernel::Pad(PadMode::Constant),
            &["tensor", "paddings"],
            &["[7, 8]", "[[1, 0]]"],
            0,
        );
        assert_eq!(got, vec![vec![], vec![0], vec![1]]);
    }

    #[test]
    fn matmul_rows_and_columns() {
        let names = ["a", "b"];
        let values = ["[[1, 2], [3, 4]]", "[[1, 0], [0, 1]]"];
        let a = lift_ok(Kernel::MatMul, &names, &values, 0);
        assert_eq!(a, vec![vec![0, 1], vec![0, 1], vec![2, 3], vec![2, 3]]);
        let b = lift_ok(Kernel::MatMul, &names, &values, 1);
        assert_eq!(b, vec![vec![0, 2], vec![1, 3], vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn matmul_skips_zero_partners() {
        let names = ["a", "b"];
        let values = ["[[1, 2], [3, 4]]", "[[1, 0], [0, 1]]"];
        // d out[i, j] / d a[i, k] = b[k, j], which is zero off the diagonal.
        let a = lift_ok(Kernel::MatMul, &names, &values, 0);
        assert_eq!(a, vec![vec![0], vec![1], vec![2], vec![3]]);
        let b = lift_ok(Kernel::MatMul, &names, &values, 1);
        assert_eq!(b, vec![vec![0, 2], vec![1, 3], vec![0, 2], vec![1, 3]]);

        let identity = ["[[1, 0], [0, 1]]", "[[1, 0], [0, 1]]"];
        assert_eq!(lift_ok(Kernel::MatMul, &names, &identity, 0), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn tensordot_skips_zero_partners() {
        let names = ["a", "b", "axes"];
        let values = ["[1, 0, 2]", "[3, 4, 0]", "1"];
        assert_eq!(lift_ok(Kernel::TensorDot, &names, &values, 0), vec![vec![0, 1]]);
        assert_eq!(lift_ok(Kernel::TensorDot, &names, &values, 1), vec![vec![0, 2]]);
    }

    #[test]
    fn exclusive_cumsum_shifts() {
        let got = lift_ok(Kernel::CumSum { exclusive: true }, &["x", "axis"], &["[1, 2, 3]", "0"], 0);
        assert_eq!(got, vec![vec![], vec![0], vec![0, 1]]);
    }

    #[test]
    fn sort_follows_values() {
        let got = lift_ok(Kernel::Sort { descending: false }, &["values", "axis"], &["[3, 1, 2]", "0"], 0);
        assert_eq!(got, vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn gather_follows_indices() {
        let got = lift_ok(Kernel::Gather, &["params", "indices"], &["[10, 20, 30]", "[2, 2, 0]"], 0);
        assert_eq!(got, vec![vec![2], vec![2], vec![0]]);
        let none = lift_ok(Kernel::Gather, &["params", "indices"], &["[10, 20, 30]", "[2, 2, 0]"], 1);
        assert_eq!(none, vec![Vec::<usize>::new(); 3]);
    }

    #[test]
    fn where_selects_branch() {
        let names = ["condition", "x", "y"];
        let values = ["[True, False, True]", "[1, 2, 3]", "[4, 5, 6]"];
        assert_eq!(lift_ok(Kernel::Where, &names, &values, 1), vec![vec![0], vec![], vec![2]]);
        assert_eq!(lift_ok(Kernel::Where, &names, &values, 2), vec![vec![], vec![1], vec![]]);
    }

    #[test]
    fn concat_offsets_run_through_items() {
        let got = lift_ok(
            Kernel::Concat,
            &["values", "axis"],
            &["[[[1, 2]], [[3, 4, 5]]]", "1"],
            0,
        );
        assert_eq!(got, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn argmax_has_no_rule() {
        assert!(!Kernel::ArgMax.liftable());
        let names = vec!["input".to_string(), "axis".to_string()];
        let values = vec![evaluate("[1, 2]").unwrap().tensorize(), Object::Int(0)];
        assert!(lift(Kernel::ArgMax, &Args::new(&names, &values), 0).is_err());
    }
}
