// kernels.rs — Numeric execution of catalog operations and primitives
//
// Each catalog entry names a `Kernel`. Kernels read their arguments in
// formal order through `Args`, validate dtypes and shapes the way the
// corresponding TensorFlow operation does, and produce an `Object`.
//
// Preconditions: arguments arrive in formal-argument order (resolution
//   promotes keyword arguments before execution).
// Postconditions: results carry a dtype and elements coerced to it.
// Failure modes: dtype, shape, axis and index violations produce
//   `TensorError`; the caller wraps them with the operation name.
// Side effects: none.

use crate::ast::Primitive;
use crate::object::{DType, DenseTensor, Object};
use crate::tensor::{
    self, bail, normalize_axis, normalize_index, slice_bounds, stable_order, unravel, PadMode,
    Tensor, TensorError, TensorResult,
};

// ── Kernel table types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryFn {
    Abs,
    Ceil,
    Exp,
    Floor,
    Negative,
    Reciprocal,
    ReciprocalNoNan,
    Round,
    Sign,
    Sqrt,
    Square,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFn {
    Add,
    Subtract,
    Multiply,
    Divide,
    DivideNoNan,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Maximum,
    Minimum,
    SquaredDifference,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceFn {
    Sum,
    Mean,
    Min,
    Max,
    Prod,
}

/// How an operation computes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Unary(UnaryFn),
    Binary(BinaryFn),
    AddN,
    ArgMax,
    ArgMin,
    ArgSort { descending: bool },
    BinCount,
    BooleanMask,
    BroadcastTo,
    Cast,
    ClipByValue,
    Concat,
    Constant,
    CountNonzero,
    CumSum { exclusive: bool },
    ExpandDims,
    Eye,
    Fill,
    Gather,
    GatherNd,
    MatMul,
    OneHot,
    Ones,
    OnesLike,
    Pad(PadMode),
    Range,
    Reduce(ReduceFn),
    ReduceAll,
    ReduceAny,
    Reshape,
    Reverse,
    Roll,
    SearchSorted { right: bool },
    Segment(ReduceFn),
    SequenceMask,
    Shape,
    Sort { descending: bool },
    Squeeze,
    Stack,
    TensorDot,
    Tile,
    TopK,
    Transpose,
    UnsortedSegment(ReduceFn),
    Unstack,
    Where,
    Zeros,
    ZerosLike,
}

// ── Arguments ───────────────────────────────────────────────────────────────

/// Arguments of one application, in formal order, addressable by position
/// or by formal name.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    names: &'a [String],
    values: &'a [Object],
}

impl<'a> Args<'a> {
    pub fn new(names: &'a [String], values: &'a [Object]) -> Self {
        Args { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [Object] {
        self.values
    }

    fn label(&self, i: usize) -> String {
        self.names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("#{i}"))
    }

    pub fn at(&self, i: usize) -> TensorResult<&'a Object> {
        self.values
            .get(i)
            .ok_or_else(|| TensorError::new(format!("missing argument `{}`", self.label(i))))
    }

    pub fn get(&self, name: &str) -> Option<&'a Object> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn tensor(&self, i: usize) -> TensorResult<DenseTensor> {
        self.at(i)?
            .to_tensor()
            .map_err(|e| TensorError::new(format!("argument `{}`: {e}", self.label(i))))
    }

    pub fn int(&self, i: usize) -> TensorResult<i64> {
        let obj = self.at(i)?;
        obj.as_int()
            .ok_or_else(|| expected(&self.label(i), "an integer", obj))
    }

    pub fn ints(&self, i: usize) -> TensorResult<Vec<i64>> {
        let obj = self.at(i)?;
        obj.as_int_list()
            .ok_or_else(|| expected(&self.label(i), "a list of integers", obj))
    }

    pub fn dtype(&self, i: usize) -> TensorResult<DType> {
        let obj = self.at(i)?;
        obj.as_dtype()
            .ok_or_else(|| expected(&self.label(i), "a dtype", obj))
    }

    pub fn opt_int(&self, name: &str) -> TensorResult<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(obj) => obj
                .as_int()
                .map(Some)
                .ok_or_else(|| expected(name, "an integer", obj)),
        }
    }

    pub fn opt_ints(&self, name: &str) -> TensorResult<Option<Vec<i64>>> {
        match self.get(name) {
            None => Ok(None),
            Some(obj) => obj
                .as_int_list()
                .map(Some)
                .ok_or_else(|| expected(name, "a list of integers", obj)),
        }
    }
}

fn expected(label: &str, what: &str, got: &Object) -> TensorError {
    TensorError::new(format!(
        "argument `{label}` must be {what}, got {}",
        got.kind_name()
    ))
}

// ── Shared helpers ──────────────────────────────────────────────────────────

fn bool_f(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn non_bool(t: &DenseTensor) -> TensorResult<()> {
    if t.dtype() == DType::Bool {
        bail!("operation is not defined on bool tensors");
    }
    Ok(())
}

pub(crate) fn dims(values: &[i64]) -> TensorResult<Vec<usize>> {
    values
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| TensorError::new(format!("dimension {d} is negative")))
        })
        .collect()
}

/// Convert a Python-level object to `dtype` the way TensorFlow converts a
/// scalar operand next to a tensor.
fn convert_python(obj: &Object, dtype: DType) -> TensorResult<DenseTensor> {
    let t = obj.to_tensor()?;
    let from = t.dtype();
    let compatible = from == dtype
        || (from.is_integer() && (dtype.is_integer() || dtype.is_float()))
        || (from.is_float() && dtype.is_float());
    if !compatible {
        bail!(
            "cannot convert {} to a tensor of dtype {}",
            obj.python_repr(),
            dtype.name()
        );
    }
    Ok(t.cast(dtype))
}

/// An operand that must match `dtype`: tensors exactly, Python values by
/// conversion.
fn operand_like(obj: &Object, dtype: DType) -> TensorResult<DenseTensor> {
    match obj {
        Object::Tensor(t) if t.dtype() == dtype => Ok(t.clone()),
        Object::Tensor(t) => bail!(
            "expected a tensor of dtype {}, got {}",
            dtype.name(),
            t.dtype().name()
        ),
        other => convert_python(other, dtype),
    }
}

/// Two operands of one dtype.
pub(crate) fn operands(x: &Object, y: &Object) -> TensorResult<(DenseTensor, DenseTensor)> {
    match (x.as_tensor(), y.as_tensor()) {
        (Some(a), _) => Ok((a.clone(), operand_like(y, a.dtype())?)),
        (None, Some(b)) => Ok((convert_python(x, b.dtype())?, b.clone())),
        (None, None) => {
            let a = x.to_tensor()?;
            let b = convert_python(y, a.dtype())?;
            Ok((a, b))
        }
    }
}

fn python_dtype(parts: &[DenseTensor]) -> TensorResult<DType> {
    let all_bool = parts.iter().all(|p| p.dtype() == DType::Bool);
    let any_bool = parts.iter().any(|p| p.dtype() == DType::Bool);
    if any_bool && !all_bool {
        bail!("cannot mix booleans and numbers in one sequence");
    }
    Ok(if all_bool {
        DType::Bool
    } else if parts.iter().any(|p| p.dtype().is_float()) {
        DType::Float32
    } else if parts.iter().any(|p| p.dtype() == DType::Int64) {
        DType::Int64
    } else {
        DType::Int32
    })
}

/// Elements of a stack-like argument: a sequence of tensor-like objects, or
/// a tensor split along its first axis.
pub(crate) fn sequence(obj: &Object) -> TensorResult<(Vec<Tensor<f64>>, DType)> {
    match obj {
        Object::Tensor(t) => Ok((t.values().unstack(0)?, t.dtype())),
        Object::List(items) | Object::Tuple(items) => {
            if items.is_empty() {
                bail!("expected a non-empty sequence of tensors");
            }
            let dtype = match items.iter().find_map(Object::as_tensor) {
                Some(t) => t.dtype(),
                None => {
                    let parts = items
                        .iter()
                        .map(Object::to_tensor)
                        .collect::<TensorResult<Vec<_>>>()?;
                    python_dtype(&parts)?
                }
            };
            let tensors = items
                .iter()
                .map(|item| operand_like(item, dtype).map(|t| t.values().clone()))
                .collect::<TensorResult<Vec<_>>>()?;
            Ok((tensors, dtype))
        }
        other => bail!("expected a sequence of tensors, got {}", other.kind_name()),
    }
}

/// Axes named by an optional `axis` argument; all axes when absent.
pub(crate) fn reduction_axes(axis: Option<&Object>, rank: usize) -> TensorResult<Vec<usize>> {
    let Some(obj) = axis else {
        return Ok((0..rank).collect());
    };
    let list = obj
        .as_int_list()
        .ok_or_else(|| expected("axis", "an integer or list of integers", obj))?;
    let mut axes = list
        .iter()
        .map(|&a| normalize_axis(a, rank))
        .collect::<TensorResult<Vec<_>>>()?;
    axes.sort_unstable();
    axes.dedup();
    Ok(axes)
}

/// Axes contracted by `tf.tensordot`.
pub(crate) fn contraction_axes(
    axes: &Object,
    rank_a: usize,
    rank_b: usize,
) -> TensorResult<(Vec<usize>, Vec<usize>)> {
    if let Object::Int(n) = axes {
        let n = usize::try_from(*n)
            .map_err(|_| TensorError::new(format!("axes {n} must be non-negative")))?;
        if n > rank_a || n > rank_b {
            bail!("cannot contract {n} axes of tensors with ranks {rank_a} and {rank_b}");
        }
        return Ok(((rank_a - n..rank_a).collect(), (0..n).collect()));
    }
    let pairs = axes.items().filter(|items| items.len() == 2);
    let lists = pairs.and_then(|items| Some((items[0].as_int_list()?, items[1].as_int_list()?)));
    let Some((a, b)) = lists else {
        bail!("axes must be an integer or a pair of axis lists");
    };
    let a = a
        .iter()
        .map(|&x| normalize_axis(x, rank_a))
        .collect::<TensorResult<Vec<_>>>()?;
    let b = b
        .iter()
        .map(|&x| normalize_axis(x, rank_b))
        .collect::<TensorResult<Vec<_>>>()?;
    Ok((a, b))
}

pub(crate) fn reduce_values(f: ReduceFn, lane: &[&f64], dtype: DType) -> f64 {
    match f {
        ReduceFn::Sum => lane.iter().map(|v| **v).sum(),
        ReduceFn::Prod => lane.iter().map(|v| **v).product(),
        ReduceFn::Max => lane.iter().fold(dtype.lowest(), |acc, v| acc.max(**v)),
        ReduceFn::Min => lane.iter().fold(dtype.highest(), |acc, v| acc.min(**v)),
        ReduceFn::Mean => {
            if lane.is_empty() {
                return if dtype.is_float() { f64::NAN } else { 0.0 };
            }
            let mean = lane.iter().map(|v| **v).sum::<f64>() / lane.len() as f64;
            if dtype.is_integer() {
                mean.trunc()
            } else {
                mean
            }
        }
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

impl Kernel {
    /// Apply to concrete arguments.
    pub fn execute(self, args: &Args<'_>) -> TensorResult<Object> {
        match self {
            Kernel::Unstack => {
                let t = args.tensor(0)?;
                let axis = args.opt_int("axis")?.unwrap_or(0);
                let parts = t.values().unstack(axis)?;
                Ok(Object::List(
                    parts
                        .into_iter()
                        .map(|p| Object::Tensor(DenseTensor::new(t.dtype(), p)))
                        .collect(),
                ))
            }
            Kernel::TopK => top_k(args),
            other => other.execute_tensor(args).map(Object::Tensor),
        }
    }

    fn execute_tensor(self, args: &Args<'_>) -> TensorResult<DenseTensor> {
        Ok(match self {
            Kernel::Unary(f) => unary(f, &args.tensor(0)?)?,
            Kernel::Binary(f) => binary(f, args.at(0)?, args.at(1)?)?,
            Kernel::AddN => add_n(args.at(0)?)?,
            Kernel::ArgMax => arg_extreme(&args.tensor(0)?, args.int(1)?, true)?,
            Kernel::ArgMin => arg_extreme(&args.tensor(0)?, args.int(1)?, false)?,
            Kernel::ArgSort { descending } => {
                let t = args.tensor(0)?;
                let axis = normalize_axis(args.int(1)?, t.rank())?;
                let order = t.values().scan_lanes(axis, |lane| {
                    stable_order(lane.iter().map(|v| **v), descending)
                        .into_iter()
                        .map(|i| i as f64)
                        .collect()
                })?;
                DenseTensor::new(DType::Int32, order)
            }
            Kernel::BinCount => bincount(&args.tensor(0)?)?,
            Kernel::BooleanMask => {
                let t = args.tensor(0)?;
                let mask = args.tensor(1)?.require_bool()?;
                DenseTensor::new(t.dtype(), t.values().boolean_mask(&mask)?)
            }
            Kernel::BroadcastTo => {
                let t = args.tensor(0)?;
                let shape = dims(&args.ints(1)?)?;
                DenseTensor::new(t.dtype(), t.values().broadcast_to(&shape)?)
            }
            Kernel::Cast => args.tensor(0)?.cast(args.dtype(1)?),
            Kernel::ClipByValue => {
                let t = args.tensor(0)?;
                non_bool(&t)?;
                let lo = operand_like(args.at(1)?, t.dtype())?;
                let hi = operand_like(args.at(2)?, t.dtype())?;
                let raised = t.values().zip_with(lo.values(), |v, l| v.max(*l))?;
                let clipped = raised.zip_with(hi.values(), |v, h| v.min(*h))?;
                if clipped.shape() != t.shape() {
                    bail!("clip bounds must broadcast to the shape {:?}", t.shape());
                }
                DenseTensor::new(t.dtype(), clipped)
            }
            Kernel::Concat => {
                let (items, dtype) = sequence(args.at(0)?)?;
                DenseTensor::new(dtype, Tensor::concat(&items, args.int(1)?)?)
            }
            Kernel::Constant => args.tensor(0)?,
            Kernel::CountNonzero => {
                let t = args.tensor(0)?;
                let axes = reduction_axes(args.get("axis"), t.rank())?;
                let counts = t
                    .values()
                    .reduce_axes(&axes, |lane| lane.iter().filter(|v| ***v != 0.0).count() as f64);
                DenseTensor::new(DType::Int64, counts)
            }
            Kernel::CumSum { exclusive } => {
                let t = args.tensor(0)?;
                non_bool(&t)?;
                let axis = normalize_axis(args.int(1)?, t.rank())?;
                let sums = t.values().scan_lanes(axis, |lane| {
                    let mut acc = 0.0;
                    lane.iter()
                        .map(|v| {
                            let before = acc;
                            acc += **v;
                            if exclusive {
                                before
                            } else {
                                acc
                            }
                        })
                        .collect()
                })?;
                DenseTensor::new(t.dtype(), sums)
            }
            Kernel::ExpandDims => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), t.values().expand_dims(args.int(1)?)?)
            }
            Kernel::Eye => eye(args)?,
            Kernel::Fill => {
                let shape = dims(&args.ints(0)?)?;
                let value = args.tensor(1)?;
                if value.rank() != 0 {
                    bail!("fill value must be a scalar, got shape {:?}", value.shape());
                }
                DenseTensor::new(value.dtype(), Tensor::filled(shape, value.values().data()[0]))
            }
            Kernel::Gather => {
                let params = args.tensor(0)?;
                let indices = args.tensor(1)?.to_indices()?;
                let axis = args.opt_int("axis")?.unwrap_or(0);
                let batch_dims = args.opt_int("batch_dims")?.unwrap_or(0);
                DenseTensor::new(
                    params.dtype(),
                    params.values().gather(&indices, axis, batch_dims)?,
                )
            }
            Kernel::GatherNd => {
                let params = args.tensor(0)?;
                let indices = args.tensor(1)?.to_indices()?;
                DenseTensor::new(params.dtype(), params.values().gather_nd(&indices)?)
            }
            Kernel::MatMul => {
                let a = args.tensor(0)?;
                let b = operand_like(args.at(1)?, a.dtype())?;
                non_bool(&a)?;
                DenseTensor::new(a.dtype(), tensor::matmul(a.values(), b.values())?)
            }
            Kernel::OneHot => {
                let indices = args.tensor(0)?.to_indices()?;
                let depth = dims(&[args.int(1)?])?[0];
                let mut shape = indices.shape().to_vec();
                shape.push(depth);
                let hot = Tensor::from_fn(shape, |i| {
                    bool_f(indices.data()[i / depth] == (i % depth) as i64)
                });
                DenseTensor::new(DType::Float32, hot)
            }
            Kernel::Ones => DenseTensor::new(DType::Float32, Tensor::filled(dims(&args.ints(0)?)?, 1.0)),
            Kernel::Zeros => DenseTensor::new(DType::Float32, Tensor::filled(dims(&args.ints(0)?)?, 0.0)),
            Kernel::OnesLike => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), Tensor::filled(t.shape().to_vec(), 1.0))
            }
            Kernel::ZerosLike => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), Tensor::filled(t.shape().to_vec(), 0.0))
            }
            Kernel::Pad(mode) => {
                let t = args.tensor(0)?;
                let paddings = paddings(&args.tensor(1)?, t.rank())?;
                let fill = match args.get("constant_values") {
                    Some(obj) => {
                        let v = operand_like(obj, t.dtype())?;
                        if v.len() != 1 {
                            bail!("constant_values must be a scalar");
                        }
                        v.values().data()[0]
                    }
                    None => 0.0,
                };
                DenseTensor::new(t.dtype(), t.values().pad(&paddings, mode, &fill)?)
            }
            Kernel::Range => range(args)?,
            Kernel::Reduce(f) => {
                let t = args.tensor(0)?;
                non_bool(&t)?;
                let axes = reduction_axes(args.get("axis"), t.rank())?;
                let dtype = t.dtype();
                DenseTensor::new(dtype, t.values().reduce_axes(&axes, |lane| reduce_values(f, lane, dtype)))
            }
            Kernel::ReduceAll | Kernel::ReduceAny => {
                let t = args.tensor(0)?;
                let bools = t.require_bool()?;
                let axes = reduction_axes(args.get("axis"), t.rank())?;
                let all = self == Kernel::ReduceAll;
                let out = bools.reduce_axes(&axes, |lane| {
                    bool_f(if all {
                        lane.iter().all(|b| **b)
                    } else {
                        lane.iter().any(|b| **b)
                    })
                });
                DenseTensor::new(DType::Bool, out)
            }
            Kernel::Reshape => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), t.values().reshape(&args.ints(1)?)?)
            }
            Kernel::Reverse => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), t.values().reverse(&args.ints(1)?)?)
            }
            Kernel::Roll => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), t.values().roll(&args.ints(1)?, &args.ints(2)?)?)
            }
            Kernel::SearchSorted { right } => search_sorted(args, right)?,
            Kernel::Segment(f) => segment(f, args, false)?,
            Kernel::UnsortedSegment(f) => segment(f, args, true)?,
            Kernel::SequenceMask => {
                let lengths = args.tensor(0)?.to_indices()?;
                let maxlen = match args.opt_int("maxlen")? {
                    Some(m) => m,
                    None => lengths.data().iter().copied().max().unwrap_or(0),
                };
                let m = dims(&[maxlen])?[0];
                let mut shape = lengths.shape().to_vec();
                shape.push(m);
                let mask = Tensor::from_fn(shape, |i| bool_f(((i % m) as i64) < lengths.data()[i / m]));
                DenseTensor::new(DType::Bool, mask)
            }
            Kernel::Shape => {
                let t = args.tensor(0)?;
                let shape: Vec<f64> = t.shape().iter().map(|&d| d as f64).collect();
                DenseTensor::from_vec(DType::Int32, vec![shape.len()], shape)?
            }
            Kernel::Sort { descending } => {
                let t = args.tensor(0)?;
                let axis = normalize_axis(args.int(1)?, t.rank())?;
                let sorted = t.values().scan_lanes(axis, |lane| {
                    stable_order(lane.iter().map(|v| **v), descending)
                        .into_iter()
                        .map(|i| *lane[i])
                        .collect()
                })?;
                DenseTensor::new(t.dtype(), sorted)
            }
            Kernel::Squeeze => {
                let t = args.tensor(0)?;
                let axes = args.opt_ints("axis")?;
                DenseTensor::new(t.dtype(), t.values().squeeze(axes.as_deref())?)
            }
            Kernel::Stack => {
                let (items, dtype) = sequence(args.at(0)?)?;
                DenseTensor::new(dtype, Tensor::stack(&items, args.int(1)?)?)
            }
            Kernel::TensorDot => {
                let a = args.tensor(0)?;
                let b = operand_like(args.at(1)?, a.dtype())?;
                non_bool(&a)?;
                let (axes_a, axes_b) = contraction_axes(args.at(2)?, a.rank(), b.rank())?;
                DenseTensor::new(
                    a.dtype(),
                    tensor::tensordot(a.values(), b.values(), &axes_a, &axes_b)?,
                )
            }
            Kernel::Tile => {
                let t = args.tensor(0)?;
                DenseTensor::new(t.dtype(), t.values().tile(&args.ints(1)?)?)
            }
            Kernel::Transpose => {
                let t = args.tensor(0)?;
                let perm = args.opt_ints("perm")?;
                DenseTensor::new(t.dtype(), t.values().transpose(perm.as_deref())?)
            }
            Kernel::Where => where_op(args)?,
            Kernel::Unstack | Kernel::TopK => {
                bail!("{self:?} does not produce a single tensor")
            }
        })
    }
}

fn unary(f: UnaryFn, t: &DenseTensor) -> TensorResult<DenseTensor> {
    let dtype = t.dtype();
    if f == UnaryFn::LogicalNot {
        let b = t.require_bool()?;
        return Ok(DenseTensor::new(DType::Bool, b.map(|x| bool_f(!x))));
    }
    non_bool(t)?;
    let float_only = matches!(
        f,
        UnaryFn::Ceil
            | UnaryFn::Exp
            | UnaryFn::Floor
            | UnaryFn::Reciprocal
            | UnaryFn::ReciprocalNoNan
            | UnaryFn::Sqrt
    );
    if float_only && !dtype.is_float() {
        bail!("expected a floating-point tensor, got {}", dtype.name());
    }
    let g: fn(f64) -> f64 = match f {
        UnaryFn::Abs => f64::abs,
        UnaryFn::Ceil => f64::ceil,
        UnaryFn::Exp => f64::exp,
        UnaryFn::Floor => f64::floor,
        UnaryFn::Negative => |x| -x,
        UnaryFn::Reciprocal => |x| 1.0 / x,
        UnaryFn::ReciprocalNoNan => |x| if x == 0.0 { 0.0 } else { 1.0 / x },
        UnaryFn::Round => f64::round_ties_even,
        UnaryFn::Sign => |x| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                x
            }
        },
        UnaryFn::Sqrt => f64::sqrt,
        UnaryFn::Square => |x| x * x,
        UnaryFn::LogicalNot => |x| x,
    };
    Ok(DenseTensor::new(dtype, t.values().map(|&x| g(x))))
}

fn binary(f: BinaryFn, x: &Object, y: &Object) -> TensorResult<DenseTensor> {
    let (a, b) = operands(x, y)?;
    let dtype = a.dtype();
    let (out, g): (DType, fn(f64, f64) -> f64) = match f {
        BinaryFn::LogicalAnd | BinaryFn::LogicalOr => {
            if dtype != DType::Bool {
                bail!("logical operations need bool tensors, got {}", dtype.name());
            }
            if f == BinaryFn::LogicalAnd {
                (DType::Bool, |p, q| bool_f(p != 0.0 && q != 0.0))
            } else {
                (DType::Bool, |p, q| bool_f(p != 0.0 || q != 0.0))
            }
        }
        BinaryFn::Equal => (DType::Bool, |p, q| bool_f(p == q)),
        BinaryFn::NotEqual => (DType::Bool, |p, q| bool_f(p != q)),
        _ if dtype == DType::Bool => bail!("arithmetic is not defined on bool tensors"),
        BinaryFn::Greater => (DType::Bool, |p, q| bool_f(p > q)),
        BinaryFn::GreaterEqual => (DType::Bool, |p, q| bool_f(p >= q)),
        BinaryFn::Add => (dtype, |p, q| p + q),
        BinaryFn::Subtract => (dtype, |p, q| p - q),
        BinaryFn::Multiply => (dtype, |p, q| p * q),
        BinaryFn::Divide if dtype.is_integer() => (DType::Float64, |p, q| p / q),
        BinaryFn::Divide => (dtype, |p, q| p / q),
        BinaryFn::DivideNoNan => {
            if !dtype.is_float() {
                bail!("divide_no_nan needs floating-point tensors, got {}", dtype.name());
            }
            (dtype, |p, q| if q == 0.0 { 0.0 } else { p / q })
        }
        BinaryFn::Maximum => (dtype, f64::max),
        BinaryFn::Minimum => (dtype, f64::min),
        BinaryFn::SquaredDifference => (dtype, |p, q| (p - q) * (p - q)),
    };
    Ok(DenseTensor::new(out, a.values().zip_with(b.values(), |&p, &q| g(p, q))?))
}

fn add_n(values: &Object) -> TensorResult<DenseTensor> {
    let (items, dtype) = sequence(values)?;
    if dtype == DType::Bool {
        bail!("add_n is not defined on bool tensors");
    }
    let shape = items[0].shape().to_vec();
    if items.iter().any(|t| t.shape() != shape.as_slice()) {
        bail!("all inputs to add_n must have the same shape");
    }
    let mut acc = items[0].clone();
    for t in &items[1..] {
        acc = acc.zip_with(t, |a, b| a + b)?;
    }
    Ok(DenseTensor::new(dtype, acc))
}

fn arg_extreme(t: &DenseTensor, axis: i64, max: bool) -> TensorResult<DenseTensor> {
    non_bool(t)?;
    let axis = normalize_axis(axis, t.rank())?;
    if t.shape()[axis] == 0 {
        bail!("cannot reduce an empty dimension");
    }
    let out = t.values().reduce_axes(&[axis], |lane| {
        let mut best = 0;
        for (i, v) in lane.iter().enumerate() {
            let better = if max { **v > *lane[best] } else { **v < *lane[best] };
            if better {
                best = i;
            }
        }
        best as f64
    });
    Ok(DenseTensor::new(DType::Int64, out))
}

fn bincount(t: &DenseTensor) -> TensorResult<DenseTensor> {
    let values = t.to_indices()?;
    if values.data().iter().any(|&v| v < 0) {
        bail!("bincount values must be non-negative");
    }
    let len = values.data().iter().max().map_or(0, |&m| m as usize + 1);
    let mut counts = vec![0.0; len];
    for &v in values.data() {
        counts[v as usize] += 1.0;
    }
    DenseTensor::from_vec(DType::Int32, vec![len], counts)
}

fn eye(args: &Args<'_>) -> TensorResult<DenseTensor> {
    let rows = dims(&[args.int(0)?])?[0];
    let cols = match args.opt_int("num_columns")? {
        Some(c) => dims(&[c])?[0],
        None => rows,
    };
    let dtype = match args.get("dtype") {
        Some(obj) => obj
            .as_dtype()
            .ok_or_else(|| expected("dtype", "a dtype", obj))?,
        None => DType::Float32,
    };
    Ok(DenseTensor::new(
        dtype,
        Tensor::from_fn(vec![rows, cols], |i| bool_f(i / cols == i % cols)),
    ))
}

pub(crate) fn paddings(p: &DenseTensor, rank: usize) -> TensorResult<Vec<(usize, usize)>> {
    let p = p.to_indices()?;
    if p.shape() != [rank, 2] {
        bail!("paddings must have shape [{rank}, 2], got {:?}", p.shape());
    }
    p.data()
        .chunks(2)
        .map(|pair| {
            let d = dims(pair)?;
            Ok((d[0], d[1]))
        })
        .collect()
}

fn range(args: &Args<'_>) -> TensorResult<DenseTensor> {
    fn number(obj: &Object) -> TensorResult<(f64, bool)> {
        match obj {
            Object::Int(n) => Ok((*n as f64, false)),
            Object::Float(x) => Ok((*x, true)),
            Object::Tensor(t) if t.rank() == 0 && t.dtype() != DType::Bool => {
                Ok((t.values().data()[0], t.dtype().is_float()))
            }
            other => bail!("range bounds must be numbers, got {}", other.kind_name()),
        }
    }
    let (start, limit, delta) = if args.len() == 1 {
        ((0.0, false), number(args.at(0)?)?, (1.0, false))
    } else {
        (number(args.at(0)?)?, number(args.at(1)?)?, number(args.at(2)?)?)
    };
    if delta.0 == 0.0 {
        bail!("range delta must not be zero");
    }
    let float = start.1 || limit.1 || delta.1;
    let count = ((limit.0 - start.0) / delta.0).ceil().max(0.0) as usize;
    let dtype = if float { DType::Float32 } else { DType::Int32 };
    Ok(DenseTensor::new(
        dtype,
        Tensor::from_fn(vec![count], |i| start.0 + i as f64 * delta.0),
    ))
}

fn search_sorted(args: &Args<'_>, right: bool) -> TensorResult<DenseTensor> {
    let (seq, values) = operands(args.at(0)?, args.at(1)?)?;
    if seq.rank() == 0 || values.rank() == 0 {
        bail!("searchsorted needs tensors of rank at least 1");
    }
    let (sr, vr) = (seq.rank(), values.rank());
    if seq.shape()[..sr - 1] != values.shape()[..vr - 1] {
        bail!(
            "leading dimensions of {:?} and {:?} differ",
            seq.shape(),
            values.shape()
        );
    }
    let n = seq.shape()[sr - 1];
    let m = values.shape()[vr - 1];
    let rows: usize = values.shape()[..vr - 1].iter().product();
    let mut out = Vec::with_capacity(values.len());
    for row in 0..rows {
        let sorted = &seq.values().data()[row * n..(row + 1) * n];
        for &v in &values.values().data()[row * m..(row + 1) * m] {
            let pos = if right {
                sorted.partition_point(|&s| s <= v)
            } else {
                sorted.partition_point(|&s| s < v)
            };
            out.push(pos as f64);
        }
    }
    DenseTensor::from_vec(DType::Int32, values.shape().to_vec(), out)
}

/// Output row of each data row (`usize::MAX` drops the row) and the number
/// of segments.
pub(crate) fn segment_slots(args: &Args<'_>, unsorted: bool) -> TensorResult<(Vec<usize>, usize)> {
    let ids = args.tensor(1)?.to_indices()?;
    if ids.rank() != 1 {
        bail!("segment ids must be a vector, got shape {:?}", ids.shape());
    }
    let ids = ids.into_data();
    let num = if unsorted {
        dims(&[args.int(2)?])?[0]
    } else {
        if ids.iter().any(|&i| i < 0) || ids.windows(2).any(|w| w[0] > w[1]) {
            bail!("segment ids must be sorted and non-negative");
        }
        ids.last().map_or(0, |&m| m as usize + 1)
    };
    if let Some(bad) = ids.iter().find(|&&i| i >= num as i64) {
        bail!("segment id {bad} is out of range [0, {num})");
    }
    // Negative ids drop their rows.
    let slots: Vec<usize> = ids
        .iter()
        .map(|&i| usize::try_from(i).unwrap_or(usize::MAX))
        .collect();
    Ok((slots, num))
}

fn segment(f: ReduceFn, args: &Args<'_>, unsorted: bool) -> TensorResult<DenseTensor> {
    let data = args.tensor(0)?;
    non_bool(&data)?;
    let (slots, num) = segment_slots(args, unsorted)?;
    let dtype = data.dtype();
    let empty = match (unsorted, f) {
        (false, _) | (true, ReduceFn::Sum) | (true, ReduceFn::Mean) => 0.0,
        (true, ReduceFn::Prod) => 1.0,
        (true, ReduceFn::Max) => dtype.lowest(),
        (true, ReduceFn::Min) => dtype.highest(),
    };
    let out = data.values().segments(&slots, num, |lane| {
        if lane.is_empty() {
            empty
        } else {
            reduce_values(f, lane, dtype)
        }
    })?;
    Ok(DenseTensor::new(dtype, out))
}

fn top_k(args: &Args<'_>) -> TensorResult<Object> {
    let t = args.tensor(0)?;
    non_bool(&t)?;
    let k = dims(&[args.int(1)?])?[0];
    let Some(&n) = t.shape().last() else {
        bail!("top_k needs a tensor of rank at least 1");
    };
    if k > n {
        bail!("k = {k} exceeds the last dimension {n}");
    }
    let mut shape = t.shape().to_vec();
    if let Some(last) = shape.last_mut() {
        *last = k;
    }
    let rows: usize = t.shape()[..t.rank() - 1].iter().product();
    let mut values = Vec::with_capacity(rows * k);
    let mut indices = Vec::with_capacity(rows * k);
    for row in 0..rows {
        let lane = &t.values().data()[row * n..(row + 1) * n];
        for &i in stable_order(lane.iter().copied(), true).iter().take(k) {
            values.push(lane[i]);
            indices.push(i as f64);
        }
    }
    Ok(Object::Tuple(vec![
        Object::Tensor(DenseTensor::from_vec(t.dtype(), shape.clone(), values)?),
        Object::Tensor(DenseTensor::from_vec(DType::Int32, shape, indices)?),
    ]))
}

fn where_op(args: &Args<'_>) -> TensorResult<DenseTensor> {
    let condition = args.tensor(0)?;
    if args.len() == 1 {
        let mask = condition.to_bools();
        let mut coords = Vec::new();
        let mut found = 0;
        for (p, _) in mask.data().iter().enumerate().filter(|&(_, &keep)| keep) {
            coords.extend(unravel(p, mask.shape()).into_iter().map(|i| i as f64));
            found += 1;
        }
        return DenseTensor::from_vec(DType::Int64, vec![found, mask.rank()], coords);
    }
    let mask = condition.require_bool()?;
    let (x, y) = operands(args.at(1)?, args.at(2)?)?;
    Ok(DenseTensor::new(
        x.dtype(),
        Tensor::select(&mask, x.values(), y.values())?,
    ))
}

// ── Primitives ──────────────────────────────────────────────────────────────

fn bound(obj: &Object) -> TensorResult<i64> {
    obj.as_int().ok_or_else(|| {
        TensorError::new(format!(
            "indices must be integers, got {}",
            obj.kind_name()
        ))
    })
}

fn index(target: &Object, axis: usize, i: i64) -> TensorResult<Object> {
    match target {
        Object::Tensor(t) => Ok(Object::Tensor(DenseTensor::new(
            t.dtype(),
            t.values().index_axis(axis, i)?,
        ))),
        Object::List(items) | Object::Tuple(items) if axis == 0 => {
            Ok(items[normalize_index(i, items.len())?].clone())
        }
        other => bail!("cannot index a {} along axis {axis}", other.kind_name()),
    }
}

fn slice(target: &Object, axis: usize, start: Option<i64>, end: Option<i64>) -> TensorResult<Object> {
    match target {
        Object::Tensor(t) => Ok(Object::Tensor(DenseTensor::new(
            t.dtype(),
            t.values().slice_axis(axis, start, end)?,
        ))),
        Object::List(items) if axis == 0 => {
            let (from, to) = slice_bounds(items.len(), start, end);
            Ok(Object::List(items[from..to].to_vec()))
        }
        Object::Tuple(items) if axis == 0 => {
            let (from, to) = slice_bounds(items.len(), start, end);
            Ok(Object::Tuple(items[from..to].to_vec()))
        }
        other => bail!("cannot slice a {} along axis {axis}", other.kind_name()),
    }
}

/// Apply an indexing, slicing or tuple-construction primitive.
pub fn apply_primitive(primitive: Primitive, args: &[Object]) -> TensorResult<Object> {
    if args.len() != primitive.arity() {
        bail!(
            "`{}` takes {} arguments, got {}",
            primitive.signature(),
            primitive.arity(),
            args.len()
        );
    }
    match primitive {
        Primitive::Singleton | Primitive::Pair | Primitive::Triple => {
            Ok(Object::Tuple(args.to_vec()))
        }
        Primitive::Index => index(&args[0], 0, bound(&args[1])?),
        Primitive::IndexAxis1 => index(&args[0], 1, bound(&args[1])?),
        Primitive::SliceFrom => slice(&args[0], 0, Some(bound(&args[1])?), None),
        Primitive::SliceTo => slice(&args[0], 0, None, Some(bound(&args[1])?)),
        Primitive::SliceBetween => {
            slice(&args[0], 0, Some(bound(&args[1])?), Some(bound(&args[2])?))
        }
        Primitive::SliceFromAxis1 => slice(&args[0], 1, Some(bound(&args[1])?), None),
        Primitive::SliceToAxis1 => slice(&args[0], 1, None, Some(bound(&args[1])?)),
        Primitive::SliceBetweenAxis1 => {
            slice(&args[0], 1, Some(bound(&args[1])?), Some(bound(&args[2])?))
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
