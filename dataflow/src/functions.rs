// functions.rs — Static operation table
//
// One `Entry` per supported signature. Entries of the same function are
// listed in resolution priority order: a call is bound to the first
// signature of its function that accepts it.
//
// Postconditions: `Catalog::from_entries(ENTRIES)` succeeds; catalog tests
//   check this.

use crate::catalog::ArgRole::{
    self, Differentiable as D, Elementwise as E, FullBreadth as A, Other as O, ValueShape as V,
};
use crate::catalog::Family::{self, *};
use crate::kernels::{BinaryFn, Kernel, ReduceFn, UnaryFn};
use crate::tensor::PadMode;

/// Declaration of one signature.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub signature: &'static str,
    pub kernel: Kernel,
    /// `None` for operations that are executed but not traced.
    pub family: Option<Family>,
    pub roles: &'static [ArgRole],
    /// Per-argument edge descriptions; empty means all blank.
    pub descriptions: &'static [&'static str],
    pub doc: &'static str,
}

const fn traced(
    signature: &'static str,
    kernel: Kernel,
    family: Family,
    roles: &'static [ArgRole],
    doc: &'static str,
) -> Entry {
    described(signature, kernel, family, roles, &[], doc)
}

const fn described(
    signature: &'static str,
    kernel: Kernel,
    family: Family,
    roles: &'static [ArgRole],
    descriptions: &'static [&'static str],
    doc: &'static str,
) -> Entry {
    Entry {
        signature,
        kernel,
        family: Some(family),
        roles,
        descriptions,
        doc,
    }
}

const fn untraced(signature: &'static str, kernel: Kernel, doc: &'static str) -> Entry {
    Entry {
        signature,
        kernel,
        family: None,
        roles: &[],
        descriptions: &[],
        doc,
    }
}

macro_rules! segment_descriptions {
    ($what:literal) => {
        &[
            concat!(
                "One segment of data with the same id in `segment_ids`, from which ",
                $what,
                " are collected to the output tensor."
            ),
            concat!(
                "The index in the output tensor to put the collected ",
                $what,
                " values"
            ),
        ]
    };
}

use Kernel::{Binary as Bin, Reduce as Red, Segment as Seg, Unary as Un, UnsortedSegment as USeg};

const SEGMENT_DOC_MAX: &str = "Computes the maximum along segments of a tensor.";
const SEGMENT_DOC_MEAN: &str = "Computes the mean along segments of a tensor.";
const SEGMENT_DOC_MIN: &str = "Computes the minimum along segments of a tensor.";
const SEGMENT_DOC_PROD: &str = "Computes the product along segments of a tensor.";
const SEGMENT_DOC_SUM: &str = "Computes the sum along segments of a tensor.";

#[rustfmt::skip]
pub static ENTRIES: &[Entry] = &[
    traced("tf.abs(x)", Un(UnaryFn::Abs), Preprocess, &[E],
        "Computes the absolute value of a tensor."),
    traced("tf.add(x, y)", Bin(BinaryFn::Add), Broadcast, &[O, O],
        "Returns x + y element-wise."),
    traced("tf.add_n(inputs)", Kernel::AddN, StackLike, &[O],
        "Adds all input tensors element-wise."),
    traced("tf.argmax(input, axis)", Kernel::ArgMax, AlongAxis, &[O, V],
        "Returns the index with the largest value across axes of a tensor."),
    traced("tf.argmin(input, axis)", Kernel::ArgMin, AlongAxis, &[O, V],
        "Returns the index with the smallest value across axes of a tensor."),
    traced("tf.argsort(values, axis, stable=True)", Kernel::ArgSort { descending: false }, ArgSort, &[O, V],
        "Returns the indices of a tensor that give its sorted order along an axis."),
    traced("tf.argsort(values, axis, direction='DESCENDING', stable=True)", Kernel::ArgSort { descending: true }, ArgSort, &[O, V],
        "Returns the indices of a tensor that give its sorted order along an axis."),
    traced("tf.boolean_mask(tensor, mask)", Kernel::BooleanMask, Condition, &[D, O],
        "Apply boolean mask to tensor."),
    traced("tf.broadcast_to(input, shape)", Kernel::BroadcastTo, Preprocess, &[D, V],
        "Broadcast an array for a compatible shape."),
    traced("tf.cast(x, dtype)", Kernel::Cast, Preprocess, &[E, A],
        "Casts a tensor to a new type."),
    traced("tf.clip_by_value(t, clip_value_min, clip_value_max)", Kernel::ClipByValue, Preprocess, &[E, A, A],
        "Clips tensor values to a specified min and max."),
    traced("tf.concat(values, axis)", Kernel::Concat, StackLike, &[O, V],
        "Concatenates tensors along one dimension."),
    traced("tf.constant(value)", Kernel::Constant, Preprocess, &[E],
        "Creates a constant tensor from a tensor-like object."),
    traced("tf.divide(x, y)", Bin(BinaryFn::Divide), Broadcast, &[O, O],
        "Computes Python style division of `x` by `y`."),
    traced("tf.equal(x, y)", Bin(BinaryFn::Equal), Broadcast, &[O, O],
        "Returns the truth value of (x == y) element-wise."),
    traced("tf.exp(x)", Un(UnaryFn::Exp), Preprocess, &[E],
        "Computes exponential of x element-wise."),
    traced("tf.expand_dims(input, axis)", Kernel::ExpandDims, Preprocess, &[D, V],
        "Returns a tensor with a length 1 axis inserted at index `axis`."),
    traced("tf.eye(num_rows)", Kernel::Eye, Preprocess, &[V],
        "Construct an identity matrix, or a batch of matrices."),
    traced("tf.eye(num_rows, num_columns)", Kernel::Eye, Preprocess, &[V, V],
        "Construct an identity matrix, or a batch of matrices."),
    traced("tf.eye(num_rows, dtype)", Kernel::Eye, Preprocess, &[V, V],
        "Construct an identity matrix, or a batch of matrices."),
    traced("tf.fill(dims, value)", Kernel::Fill, Preprocess, &[V, A],
        "Creates a tensor filled with a scalar value."),
    described("tf.gather(params, indices)", Kernel::Gather, Gather, &[D, O],
        &["the values gathered", "index into `params` to gather values"],
        "Gather slices from params axis `axis` according to indices."),
    traced("tf.gather(params, indices, axis, batch_dims)", Kernel::Gather, Gather, &[D, V, V, V],
        "Gather slices from params axis `axis` according to indices."),
    untraced("tf.gather_nd(params, indices)", Kernel::GatherNd,
        "Gather slices from `params` into a Tensor with shape specified by `indices`."),
    traced("tf.greater(x, y)", Bin(BinaryFn::Greater), Broadcast, &[O, O],
        "Returns the truth value of (x > y) element-wise."),
    traced("tf.greater_equal(x, y)", Bin(BinaryFn::GreaterEqual), Broadcast, &[O, O],
        "Returns the truth value of (x >= y) element-wise."),
    untraced("tf.math.bincount(arr)", Kernel::BinCount,
        "Counts the number of occurrences of each value in an integer array."),
    traced("tf.math.ceil(x)", Un(UnaryFn::Ceil), Preprocess, &[E],
        "Return the ceiling of the input, element-wise."),
    untraced("tf.math.count_nonzero(input)", Kernel::CountNonzero,
        "Computes number of nonzero elements across dimensions of a tensor."),
    untraced("tf.math.count_nonzero(input, axis)", Kernel::CountNonzero,
        "Computes number of nonzero elements across dimensions of a tensor."),
    traced("tf.math.cumsum(x, axis)", Kernel::CumSum { exclusive: false }, Preprocess, &[D, V],
        "Compute the cumulative sum of the tensor `x` along `axis`."),
    traced("tf.math.cumsum(x, axis, exclusive=True)", Kernel::CumSum { exclusive: true }, Preprocess, &[D, V],
        "Compute the cumulative sum of the tensor `x` along `axis`."),
    traced("tf.math.divide_no_nan(x, y)", Bin(BinaryFn::DivideNoNan), Broadcast, &[O, O],
        "Computes a safe divide which returns 0 if `y` (denominator) is zero."),
    traced("tf.math.floor(x)", Un(UnaryFn::Floor), Preprocess, &[E],
        "Returns element-wise largest integer not greater than x."),
    untraced("tf.math.logical_and(x, y)", Bin(BinaryFn::LogicalAnd),
        "Returns the truth value of x AND y element-wise."),
    untraced("tf.math.logical_not(x)", Un(UnaryFn::LogicalNot),
        "Returns the truth value of `NOT x` element-wise."),
    untraced("tf.math.logical_or(x, y)", Bin(BinaryFn::LogicalOr),
        "Returns the truth value of x OR y element-wise."),
    traced("tf.math.negative(x)", Un(UnaryFn::Negative), Preprocess, &[E],
        "Computes numerical negative value element-wise."),
    traced("tf.math.reciprocal(x)", Un(UnaryFn::Reciprocal), Preprocess, &[E],
        "Computes the reciprocal of x element-wise."),
    traced("tf.math.reciprocal_no_nan(x)", Un(UnaryFn::ReciprocalNoNan), Preprocess, &[E],
        "Performs a safe reciprocal operation, element wise."),
    described("tf.math.segment_max(data, segment_ids)", Seg(ReduceFn::Max), AlongSegment, &[O, O],
        segment_descriptions!("max"), SEGMENT_DOC_MAX),
    described("tf.math.segment_mean(data, segment_ids)", Seg(ReduceFn::Mean), AlongSegment, &[O, O],
        segment_descriptions!("mean"), SEGMENT_DOC_MEAN),
    described("tf.math.segment_min(data, segment_ids)", Seg(ReduceFn::Min), AlongSegment, &[O, O],
        segment_descriptions!("min"), SEGMENT_DOC_MIN),
    described("tf.math.segment_prod(data, segment_ids)", Seg(ReduceFn::Prod), AlongSegment, &[O, O],
        segment_descriptions!("production"), SEGMENT_DOC_PROD),
    described("tf.math.segment_sum(data, segment_ids)", Seg(ReduceFn::Sum), AlongSegment, &[O, O],
        segment_descriptions!("summation"), SEGMENT_DOC_SUM),
    traced("tf.math.squared_difference(x, y)", Bin(BinaryFn::SquaredDifference), Preprocess, &[E, E],
        "Returns conj(x - y)(x - y) element-wise."),
    untraced("tf.math.top_k(input, k)", Kernel::TopK,
        "Finds values and indices of the `k` largest entries for the last dimension."),
    traced("tf.math.unsorted_segment_max(data, segment_ids, num_segments)", USeg(ReduceFn::Max), AlongSegment, &[O, O, V],
        SEGMENT_DOC_MAX),
    traced("tf.math.unsorted_segment_mean(data, segment_ids, num_segments)", USeg(ReduceFn::Mean), AlongSegment, &[O, O, V],
        SEGMENT_DOC_MEAN),
    traced("tf.math.unsorted_segment_min(data, segment_ids, num_segments)", USeg(ReduceFn::Min), AlongSegment, &[O, O, V],
        SEGMENT_DOC_MIN),
    traced("tf.math.unsorted_segment_prod(data, segment_ids, num_segments)", USeg(ReduceFn::Prod), AlongSegment, &[O, O, V],
        SEGMENT_DOC_PROD),
    traced("tf.math.unsorted_segment_sum(data, segment_ids, num_segments)", USeg(ReduceFn::Sum), AlongSegment, &[O, O, V],
        SEGMENT_DOC_SUM),
    traced("tf.matmul(a, b)", Kernel::MatMul, Preprocess, &[D, D],
        "Multiplies matrix `a` by matrix `b`, producing `a` * `b`."),
    traced("tf.maximum(x, y)", Bin(BinaryFn::Maximum), Broadcast, &[O, O],
        "Returns the max of x and y (i.e. x > y ? x : y) element-wise."),
    traced("tf.minimum(x, y)", Bin(BinaryFn::Minimum), Broadcast, &[O, O],
        "Returns the min of x and y (i.e. x < y ? x : y) element-wise."),
    traced("tf.multiply(x, y)", Bin(BinaryFn::Multiply), Broadcast, &[O, O],
        "Returns an element-wise x * y."),
    traced("tf.not_equal(x, y)", Bin(BinaryFn::NotEqual), Broadcast, &[O, O],
        "Returns the truth value of (x != y) element-wise."),
    traced("tf.one_hot(indices, depth)", Kernel::OneHot, Preprocess, &[V, V],
        "Returns a one-hot tensor."),
    traced("tf.ones(shape)", Kernel::Ones, Preprocess, &[V],
        "Creates a tensor with all elements set to one (1)."),
    traced("tf.ones_like(input)", Kernel::OnesLike, Preprocess, &[V],
        "Creates a tensor of all ones that has the same shape as the input."),
    traced("tf.pad(tensor, paddings, mode='CONSTANT')", Kernel::Pad(PadMode::Constant), Preprocess, &[D, V],
        "Pads a tensor."),
    traced("tf.pad(tensor, paddings, mode='CONSTANT', constant_values)", Kernel::Pad(PadMode::Constant), Preprocess, &[D, V, V],
        "Pads a tensor."),
    traced("tf.pad(tensor, paddings, mode='REFLECT')", Kernel::Pad(PadMode::Reflect), Preprocess, &[D, V],
        "Pads a tensor."),
    traced("tf.pad(tensor, paddings, mode='SYMMETRIC')", Kernel::Pad(PadMode::Symmetric), Preprocess, &[D, V],
        "Pads a tensor."),
    traced("tf.range(start)", Kernel::Range, Preprocess, &[V],
        "Creates a sequence of numbers."),
    traced("tf.range(start, limit, delta)", Kernel::Range, Preprocess, &[V, V, V],
        "Creates a sequence of numbers."),
    untraced("tf.reduce_all(input_tensor, axis)", Kernel::ReduceAll,
        "Computes `tf.math.logical_and` of elements across dimensions of a tensor."),
    untraced("tf.reduce_any(input_tensor, axis)", Kernel::ReduceAny,
        "Computes `tf.math.logical_or` of elements across dimensions of a tensor."),
    traced("tf.reduce_max(input_tensor)", Red(ReduceFn::Max), Preprocess, &[D],
        "Computes `tf.math.maximum` of elements across dimensions of a tensor."),
    traced("tf.reduce_max(input_tensor, axis)", Red(ReduceFn::Max), AlongAxis, &[O, V],
        "Computes `tf.math.maximum` of elements across dimensions of a tensor."),
    traced("tf.reduce_mean(input_tensor)", Red(ReduceFn::Mean), Preprocess, &[D],
        "Computes the mean of elements across dimensions of a tensor."),
    traced("tf.reduce_mean(input_tensor, axis)", Red(ReduceFn::Mean), AlongAxis, &[O, V],
        "Computes the mean of elements across dimensions of a tensor."),
    traced("tf.reduce_min(input_tensor)", Red(ReduceFn::Min), Preprocess, &[D],
        "Computes the `tf.math.minimum` of elements across dimensions of a tensor."),
    traced("tf.reduce_min(input_tensor, axis)", Red(ReduceFn::Min), AlongAxis, &[O, V],
        "Computes the `tf.math.minimum` of elements across dimensions of a tensor."),
    traced("tf.reduce_prod(input_tensor, axis)", Red(ReduceFn::Prod), AlongAxis, &[O, V],
        "Computes `tf.math.multiply` of elements across dimensions of a tensor."),
    traced("tf.reduce_sum(input_tensor)", Red(ReduceFn::Sum), Preprocess, &[D],
        "Computes the sum of elements across dimensions of a tensor."),
    traced("tf.reduce_sum(input_tensor, axis)", Red(ReduceFn::Sum), AlongAxis, &[O, V],
        "Computes the sum of elements across dimensions of a tensor."),
    traced("tf.reshape(tensor, shape)", Kernel::Reshape, Preprocess, &[D, V],
        "Reshapes a tensor."),
    traced("tf.reverse(tensor, axis)", Kernel::Reverse, Preprocess, &[D, V],
        "Reverses specific dimensions of a tensor."),
    traced("tf.roll(input, shift, axis)", Kernel::Roll, Preprocess, &[D, V, V],
        "Rolls the elements of a tensor along an axis."),
    traced("tf.round(x)", Un(UnaryFn::Round), Preprocess, &[E],
        "Rounds the values of a tensor to the nearest integer, element-wise."),
    untraced("tf.searchsorted(sorted_sequence, values, side='left')", Kernel::SearchSorted { right: false },
        "Searches for where a value would go in a sorted sequence."),
    untraced("tf.searchsorted(sorted_sequence, values, side='right')", Kernel::SearchSorted { right: true },
        "Searches for where a value would go in a sorted sequence."),
    traced("tf.sequence_mask(lengths)", Kernel::SequenceMask, Preprocess, &[V],
        "Returns a mask tensor representing the first N positions of each cell."),
    traced("tf.sequence_mask(lengths, maxlen)", Kernel::SequenceMask, Preprocess, &[V, V],
        "Returns a mask tensor representing the first N positions of each cell."),
    traced("tf.shape(input)", Kernel::Shape, Preprocess, &[V],
        "Returns a tensor containing the shape of the input tensor."),
    traced("tf.sign(x)", Un(UnaryFn::Sign), Preprocess, &[E],
        "Returns an element-wise indication of the sign of a number."),
    traced("tf.sort(values, axis)", Kernel::Sort { descending: false }, Preprocess, &[D, V],
        "Sorts a tensor."),
    traced("tf.sort(values, axis, direction='DESCENDING')", Kernel::Sort { descending: true }, Preprocess, &[D, V],
        "Sorts a tensor."),
    traced("tf.sqrt(x)", Un(UnaryFn::Sqrt), Preprocess, &[E],
        "Computes element-wise square root of the input tensor."),
    traced("tf.square(x)", Un(UnaryFn::Square), Preprocess, &[E],
        "Computes square of x element-wise."),
    traced("tf.squeeze(input)", Kernel::Squeeze, Preprocess, &[D],
        "Removes dimensions of size 1 from the shape of a tensor."),
    traced("tf.squeeze(input, axis)", Kernel::Squeeze, Preprocess, &[D, V],
        "Removes dimensions of size 1 from the shape of a tensor."),
    traced("tf.stack(values, axis)", Kernel::Stack, StackLike, &[O, V],
        "Stacks a list of rank-`R` tensors into one rank-`(R+1)` tensor."),
    traced("tf.subtract(x, y)", Bin(BinaryFn::Subtract), Broadcast, &[O, O],
        "Returns x - y element-wise."),
    traced("tf.tensordot(a, b, axes)", Kernel::TensorDot, Preprocess, &[D, D, V],
        "Tensor contraction of a and b along specified axes and outer product."),
    traced("tf.tile(input, multiples)", Kernel::Tile, Preprocess, &[D, V],
        "Constructs a tensor by tiling a given tensor."),
    traced("tf.transpose(a)", Kernel::Transpose, Preprocess, &[D],
        "Transposes `a`, where `a` is a Tensor."),
    traced("tf.transpose(a, perm)", Kernel::Transpose, Preprocess, &[D, V],
        "Transposes `a`, where `a` is a Tensor."),
    untraced("tf.unstack(value, axis)", Kernel::Unstack,
        "Unpacks the given dimension of a rank-`R` tensor into rank-`(R-1)` tensors."),
    traced("tf.where(condition)", Kernel::Where, Condition, &[O],
        "Return the elements where `condition` is `True` (multiplexing `x` and `y`)."),
    traced("tf.where(condition, x, y)", Kernel::Where, Preprocess, &[E, D, D],
        "Return the elements where `condition` is `True` (multiplexing `x` and `y`)."),
    traced("tf.zeros(shape)", Kernel::Zeros, Preprocess, &[V],
        "Creates a tensor with all elements set to zero."),
    traced("tf.zeros_like(input)", Kernel::ZerosLike, Preprocess, &[V],
        "Creates a tensor with all elements set to zero."),
];
