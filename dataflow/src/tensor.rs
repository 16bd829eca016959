// tensor.rs — Dense n-dimensional container shared by execution and tracing
//
// `Tensor<T>` is a row-major buffer plus a shape. Data-movement operations
// compute an index map from shapes (and numeric arguments) only, then apply
// it to the buffer, so the same code moves numbers during execution and
// dependency sets during provenance tracing.
//
// Preconditions: `data.len()` equals the product of `shape`.
// Postconditions: every constructor and transform upholds the same invariant.
// Failure modes: shape, axis and index violations produce `TensorError`.
// Side effects: none.

use thiserror::Error;

/// Error raised by a shape, axis or index violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TensorError(pub String);

impl TensorError {
    pub fn new(message: impl Into<String>) -> Self {
        TensorError(message.into())
    }
}

pub type TensorResult<T> = Result<T, TensorError>;

macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::tensor::TensorError(format!($($arg)*)))
    };
}
pub(crate) use bail;

// ── Shape arithmetic ────────────────────────────────────────────────────────

pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for `shape`.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * shape[i + 1];
    }
    out
}

/// Multi-index of flat position `flat` in a row-major tensor of `shape`.
pub fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for i in (0..shape.len()).rev() {
        if shape[i] > 0 {
            index[i] = flat % shape[i];
            flat /= shape[i];
        }
    }
    index
}

fn ravel(index: &[usize], strides: &[usize]) -> usize {
    index.iter().zip(strides).map(|(i, s)| i * s).sum()
}

/// Map a possibly negative axis onto `0..rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> TensorResult<usize> {
    let r = rank as i64;
    if axis < -r || axis >= r {
        bail!("axis {axis} is out of bounds for a tensor of rank {rank}");
    }
    Ok(if axis < 0 { (axis + r) as usize } else { axis as usize })
}

/// Map a possibly negative index onto `0..dim`.
pub fn normalize_index(index: i64, dim: usize) -> TensorResult<usize> {
    let d = dim as i64;
    if index < -d || index >= d {
        bail!("index {index} is out of bounds for a dimension of size {dim}");
    }
    Ok(if index < 0 { (index + d) as usize } else { index as usize })
}

/// Result shape of broadcasting `a` against `b`.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> TensorResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i + a.len() >= rank { a[i + a.len() - rank] } else { 1 };
        let db = if i + b.len() >= rank { b[i + b.len() - rank] } else { 1 };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => bail!("incompatible shapes for broadcasting: {a:?} and {b:?}"),
        };
    }
    Ok(out)
}

/// Flat source positions that realise broadcasting `shape` to `target`.
fn broadcast_sources(shape: &[usize], target: &[usize]) -> TensorResult<Vec<usize>> {
    if shape.len() > target.len() {
        bail!("cannot broadcast shape {shape:?} to {target:?}");
    }
    let offset = target.len() - shape.len();
    for (i, &d) in shape.iter().enumerate() {
        if d != 1 && d != target[i + offset] {
            bail!("cannot broadcast shape {shape:?} to {target:?}");
        }
    }
    let in_strides = strides(shape);
    let sources = (0..num_elements(target))
        .map(|o| {
            let out_index = unravel(o, target);
            shape
                .iter()
                .enumerate()
                .map(|(i, &d)| if d == 1 { 0 } else { out_index[i + offset] * in_strides[i] })
                .sum()
        })
        .collect();
    Ok(sources)
}

fn transpose_sources(shape: &[usize], perm: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let in_strides = strides(shape);
    let out_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
    let sources = (0..num_elements(&out_shape))
        .map(|o| {
            let out_index = unravel(o, &out_shape);
            out_index.iter().zip(perm).map(|(i, &p)| i * in_strides[p]).sum()
        })
        .collect();
    (out_shape, sources)
}

/// Padding rule for [`Tensor::pad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    Constant,
    Reflect,
    Symmetric,
}

/// Element type usable in matrix products.
pub trait Accumulate: Clone {
    fn zero() -> Self;
    fn plus(&self, other: &Self) -> Self;
    fn times(&self, other: &Self) -> Self;
}

impl Accumulate for f64 {
    fn zero() -> Self {
        0.0
    }
    fn plus(&self, other: &Self) -> Self {
        self + other
    }
    fn times(&self, other: &Self) -> Self {
        self * other
    }
}

// ── Tensor ──────────────────────────────────────────────────────────────────

/// Row-major n-dimensional buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> TensorResult<Self> {
        if num_elements(&shape) != data.len() {
            bail!(
                "shape {shape:?} needs {} elements, got {}",
                num_elements(&shape),
                data.len()
            );
        }
        Ok(Tensor { shape, data })
    }

    pub fn scalar(value: T) -> Self {
        Tensor {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn from_fn(shape: Vec<usize>, f: impl FnMut(usize) -> T) -> Self {
        let data = (0..num_elements(&shape)).map(f).collect();
        Tensor { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Tensor<U> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.rank() || index.iter().zip(&self.shape).any(|(i, d)| i >= d) {
            return None;
        }
        self.data.get(ravel(index, &strides(&self.shape)))
    }

    /// Same buffer under a new shape with the same element count.
    pub fn with_shape(self, shape: Vec<usize>) -> TensorResult<Self> {
        Tensor::new(shape, self.data)
    }

    /// Apply `f` to groups of elements that share every coordinate except
    /// those in `axes`. The output drops the reduced axes.
    pub fn reduce_axes<U>(&self, axes: &[usize], mut f: impl FnMut(&[&T]) -> U) -> Tensor<U> {
        let kept: Vec<usize> = (0..self.rank()).filter(|a| !axes.contains(a)).collect();
        let mut perm = kept.clone();
        perm.extend(axes.iter().copied());
        let (_, sources) = transpose_sources(&self.shape, &perm);
        let out_shape: Vec<usize> = kept.iter().map(|&a| self.shape[a]).collect();
        let chunk: usize = axes.iter().map(|&a| self.shape[a]).product();
        let data = (0..num_elements(&out_shape))
            .map(|o| {
                let lane: Vec<&T> = sources[o * chunk..(o + 1) * chunk]
                    .iter()
                    .map(|&s| &self.data[s])
                    .collect();
                f(&lane)
            })
            .collect();
        Tensor {
            shape: out_shape,
            data,
        }
    }

    /// Flat positions of every lane along `axis`, in lane order.
    fn lanes(&self, axis: usize) -> Vec<Vec<usize>> {
        let n = self.shape[axis];
        let inner: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();
        let mut lanes = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            for i in 0..inner {
                lanes.push((0..n).map(|j| o * n * inner + j * inner + i).collect());
            }
        }
        lanes
    }

    /// Replace each lane along `axis` with `f(lane)`, which must return a
    /// lane of the same length.
    pub fn scan_lanes<U: Clone>(
        &self,
        axis: usize,
        mut f: impl FnMut(&[&T]) -> Vec<U>,
    ) -> TensorResult<Tensor<U>> {
        let mut out: Vec<Option<U>> = vec![None; self.len()];
        for lane in self.lanes(axis) {
            let items: Vec<&T> = lane.iter().map(|&p| &self.data[p]).collect();
            let mapped = f(&items);
            if mapped.len() != lane.len() {
                bail!("lane transform changed the lane length");
            }
            for (p, v) in lane.into_iter().zip(mapped) {
                out[p] = Some(v);
            }
        }
        let data = out.into_iter().flatten().collect();
        Tensor::new(self.shape.clone(), data)
    }

    /// Group rows (axis 0) by `ids` into `num_segments` segments and apply
    /// `f` to each column of each segment.
    pub fn segments<U>(
        &self,
        ids: &[usize],
        num_segments: usize,
        mut f: impl FnMut(&[&T]) -> U,
    ) -> TensorResult<Tensor<U>> {
        if self.rank() == 0 || self.shape[0] != ids.len() {
            bail!(
                "segment ids of length {} do not match data of shape {:?}",
                ids.len(),
                self.shape
            );
        }
        let inner: usize = self.shape[1..].iter().product();
        let mut shape = self.shape.clone();
        shape[0] = num_segments;
        let mut data = Vec::with_capacity(num_segments * inner);
        for segment in 0..num_segments {
            for k in 0..inner {
                let lane: Vec<&T> = ids
                    .iter()
                    .enumerate()
                    .filter(|(_, &id)| id == segment)
                    .map(|(row, _)| &self.data[row * inner + k])
                    .collect();
                data.push(f(&lane));
            }
        }
        Tensor::new(shape, data)
    }

    /// Combine with `other` elementwise under broadcasting.
    pub fn zip_with<U, V>(
        &self,
        other: &Tensor<U>,
        mut f: impl FnMut(&T, &U) -> V,
    ) -> TensorResult<Tensor<V>> {
        let shape = broadcast_shapes(&self.shape, &other.shape)?;
        let left = broadcast_sources(&self.shape, &shape)?;
        let right = broadcast_sources(&other.shape, &shape)?;
        let data = left
            .iter()
            .zip(&right)
            .map(|(&l, &r)| f(&self.data[l], &other.data[r]))
            .collect();
        Ok(Tensor { shape, data })
    }
}

impl<T: Clone> Tensor<T> {
    pub fn filled(shape: Vec<usize>, value: T) -> Self {
        let data = vec![value; num_elements(&shape)];
        Tensor { shape, data }
    }

    /// Gather flat positions `sources` into a tensor of `shape`.
    pub fn take(&self, shape: Vec<usize>, sources: &[usize]) -> Tensor<T> {
        let data = sources.iter().map(|&s| self.data[s].clone()).collect();
        Tensor { shape, data }
    }

    fn take_or(&self, shape: Vec<usize>, sources: &[Option<usize>], fill: &T) -> Tensor<T> {
        let data = sources
            .iter()
            .map(|s| match s {
                Some(s) => self.data[*s].clone(),
                None => fill.clone(),
            })
            .collect();
        Tensor { shape, data }
    }

    /// Reshape with at most one `-1` dimension inferred.
    pub fn reshape(&self, dims: &[i64]) -> TensorResult<Self> {
        let mut inferred = None;
        let mut known = 1usize;
        for (i, &d) in dims.iter().enumerate() {
            match d {
                -1 if inferred.is_none() => inferred = Some(i),
                -1 => bail!("only one dimension of a reshape may be -1"),
                d if d < 0 => bail!("invalid reshape dimension {d}"),
                d => known *= d as usize,
            }
        }
        let mut shape: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();
        if let Some(i) = inferred {
            if known == 0 || self.len() % known != 0 {
                bail!(
                    "cannot reshape a tensor with {} elements to {dims:?}",
                    self.len()
                );
            }
            shape[i] = self.len() / known;
        }
        if num_elements(&shape) != self.len() {
            bail!(
                "cannot reshape a tensor with {} elements to shape {shape:?}",
                self.len()
            );
        }
        Ok(Tensor {
            shape,
            data: self.data.clone(),
        })
    }

    /// Permute axes; reverses them when `perm` is absent.
    pub fn transpose(&self, perm: Option<&[i64]>) -> TensorResult<Self> {
        let rank = self.rank();
        let perm: Vec<usize> = match perm {
            None => (0..rank).rev().collect(),
            Some(p) => {
                if p.len() != rank {
                    bail!("permutation {p:?} does not match rank {rank}");
                }
                let perm = p
                    .iter()
                    .map(|&a| normalize_axis(a, rank))
                    .collect::<TensorResult<Vec<_>>>()?;
                let mut seen = vec![false; rank];
                for &a in &perm {
                    if std::mem::replace(&mut seen[a], true) {
                        bail!("{p:?} is not a permutation");
                    }
                }
                perm
            }
        };
        let (shape, sources) = transpose_sources(&self.shape, &perm);
        Ok(self.take(shape, &sources))
    }

    pub fn expand_dims(&self, axis: i64) -> TensorResult<Self> {
        let axis = normalize_axis(axis, self.rank() + 1)?;
        let mut shape = self.shape.clone();
        shape.insert(axis, 1);
        Ok(Tensor {
            shape,
            data: self.data.clone(),
        })
    }

    /// Drop size-1 axes: all of them, or exactly the listed ones.
    pub fn squeeze(&self, axes: Option<&[i64]>) -> TensorResult<Self> {
        let shape = match axes {
            None => self.shape.iter().copied().filter(|&d| d != 1).collect(),
            Some(axes) => {
                let axes = axes
                    .iter()
                    .map(|&a| normalize_axis(a, self.rank()))
                    .collect::<TensorResult<Vec<_>>>()?;
                for &a in &axes {
                    if self.shape[a] != 1 {
                        bail!(
                            "cannot squeeze axis {a} of size {} in shape {:?}",
                            self.shape[a],
                            self.shape
                        );
                    }
                }
                self.shape
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !axes.contains(i))
                    .map(|(_, &d)| d)
                    .collect()
            }
        };
        Ok(Tensor {
            shape,
            data: self.data.clone(),
        })
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> TensorResult<Self> {
        let sources = broadcast_sources(&self.shape, shape)?;
        Ok(self.take(shape.to_vec(), &sources))
    }

    pub fn tile(&self, multiples: &[i64]) -> TensorResult<Self> {
        if multiples.len() != self.rank() {
            bail!(
                "tile multiples {multiples:?} do not match rank {}",
                self.rank()
            );
        }
        if multiples.iter().any(|&m| m < 0) {
            bail!("tile multiples must be non-negative, got {multiples:?}");
        }
        let shape: Vec<usize> = self
            .shape
            .iter()
            .zip(multiples)
            .map(|(&d, &m)| d * m as usize)
            .collect();
        let in_strides = strides(&self.shape);
        let sources: Vec<usize> = (0..num_elements(&shape))
            .map(|o| {
                let index = unravel(o, &shape);
                index
                    .iter()
                    .zip(&self.shape)
                    .zip(&in_strides)
                    .map(|((i, d), s)| (i % d) * s)
                    .sum()
            })
            .collect();
        Ok(self.take(shape, &sources))
    }

    pub fn reverse(&self, axes: &[i64]) -> TensorResult<Self> {
        let axes = axes
            .iter()
            .map(|&a| normalize_axis(a, self.rank()))
            .collect::<TensorResult<Vec<_>>>()?;
        let in_strides = strides(&self.shape);
        let sources: Vec<usize> = (0..self.len())
            .map(|o| {
                let mut index = unravel(o, &self.shape);
                for &a in &axes {
                    index[a] = self.shape[a] - 1 - index[a];
                }
                ravel(&index, &in_strides)
            })
            .collect();
        Ok(self.take(self.shape.clone(), &sources))
    }

    pub fn roll(&self, shifts: &[i64], axes: &[i64]) -> TensorResult<Self> {
        if shifts.len() != axes.len() {
            bail!("roll shift {shifts:?} and axis {axes:?} must have the same length");
        }
        let mut total = vec![0i64; self.rank()];
        for (&s, &a) in shifts.iter().zip(axes) {
            total[normalize_axis(a, self.rank())?] += s;
        }
        let in_strides = strides(&self.shape);
        let sources: Vec<usize> = (0..self.len())
            .map(|o| {
                let mut index = unravel(o, &self.shape);
                for (a, &shift) in total.iter().enumerate() {
                    let d = self.shape[a] as i64;
                    index[a] = (index[a] as i64 - shift).rem_euclid(d) as usize;
                }
                ravel(&index, &in_strides)
            })
            .collect();
        Ok(self.take(self.shape.clone(), &sources))
    }

    pub fn pad(&self, paddings: &[(usize, usize)], mode: PadMode, fill: &T) -> TensorResult<Self> {
        if paddings.len() != self.rank() {
            bail!(
                "paddings for {} axes do not match rank {}",
                paddings.len(),
                self.rank()
            );
        }
        for (&(before, after), &d) in paddings.iter().zip(&self.shape) {
            let limit = match mode {
                PadMode::Constant => usize::MAX,
                PadMode::Reflect => d.saturating_sub(1),
                PadMode::Symmetric => d,
            };
            if before > limit || after > limit {
                bail!("paddings ({before}, {after}) are too large for dimension {d} in {mode:?} mode");
            }
        }
        let shape: Vec<usize> = paddings
            .iter()
            .zip(&self.shape)
            .map(|(&(b, a), &d)| b + d + a)
            .collect();
        let in_strides = strides(&self.shape);
        let sources: Vec<Option<usize>> = (0..num_elements(&shape))
            .map(|o| {
                let out_index = unravel(o, &shape);
                let mut flat = 0;
                for (axis, &oi) in out_index.iter().enumerate() {
                    let d = self.shape[axis] as i64;
                    let i = oi as i64 - paddings[axis].0 as i64;
                    let source = match mode {
                        PadMode::Constant if i < 0 || i >= d => return None,
                        PadMode::Constant => i,
                        PadMode::Reflect if i < 0 => -i,
                        PadMode::Reflect if i >= d => 2 * (d - 1) - i,
                        PadMode::Symmetric if i < 0 => -i - 1,
                        PadMode::Symmetric if i >= d => 2 * d - 1 - i,
                        _ => i,
                    };
                    flat += source as usize * in_strides[axis];
                }
                Some(flat)
            })
            .collect();
        Ok(self.take_or(shape, &sources, fill))
    }

    /// Select one position along `axis`, dropping that axis.
    pub fn index_axis(&self, axis: usize, index: i64) -> TensorResult<Self> {
        if axis >= self.rank() {
            bail!("cannot index axis {axis} of a tensor of rank {}", self.rank());
        }
        let index = normalize_index(index, self.shape[axis])?;
        let positions: Vec<usize> = (0..self.shape[axis]).collect();
        let sliced = self.select_along(axis, &positions[index..=index]);
        let mut shape = self.shape.clone();
        shape.remove(axis);
        sliced.with_shape(shape)
    }

    /// Python-style `start:end` slice along `axis`, clamped to the bounds.
    pub fn slice_axis(&self, axis: usize, start: Option<i64>, end: Option<i64>) -> TensorResult<Self> {
        if axis >= self.rank() {
            bail!("cannot slice axis {axis} of a tensor of rank {}", self.rank());
        }
        let d = self.shape[axis];
        let (from, to) = slice_bounds(d, start, end);
        let positions: Vec<usize> = (from..to).collect();
        Ok(self.select_along(axis, &positions))
    }

    /// Keep the listed positions along `axis`, in the listed order.
    fn select_along(&self, axis: usize, positions: &[usize]) -> Self {
        let mut shape = self.shape.clone();
        shape[axis] = positions.len();
        let in_strides = strides(&self.shape);
        let sources: Vec<usize> = (0..num_elements(&shape))
            .map(|o| {
                let mut index = unravel(o, &shape);
                index[axis] = positions[index[axis]];
                ravel(&index, &in_strides)
            })
            .collect();
        self.take(shape, &sources)
    }

    pub fn unstack(&self, axis: i64) -> TensorResult<Vec<Self>> {
        let axis = normalize_axis(axis, self.rank())?;
        (0..self.shape[axis])
            .map(|i| self.index_axis(axis, i as i64))
            .collect()
    }

    pub fn stack(items: &[Self], axis: i64) -> TensorResult<Self> {
        let Some(first) = items.first() else {
            bail!("cannot stack an empty list of tensors");
        };
        let axis = normalize_axis(axis, first.rank() + 1)?;
        if items.iter().any(|t| t.shape != first.shape) {
            bail!("all tensors passed to stack must have the same shape");
        }
        let expanded = items
            .iter()
            .map(|t| t.expand_dims(axis as i64))
            .collect::<TensorResult<Vec<_>>>()?;
        Tensor::concat(&expanded, axis as i64)
    }

    pub fn concat(items: &[Self], axis: i64) -> TensorResult<Self> {
        let Some(first) = items.first() else {
            bail!("cannot concatenate an empty list of tensors");
        };
        if first.rank() == 0 {
            bail!("cannot concatenate scalars");
        }
        let axis = normalize_axis(axis, first.rank())?;
        for t in items {
            let compatible = t.rank() == first.rank()
                && t
                    .shape
                    .iter()
                    .zip(&first.shape)
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                bail!(
                    "shapes {:?} and {:?} cannot be concatenated along axis {axis}",
                    first.shape,
                    t.shape
                );
            }
        }
        let mut shape = first.shape.clone();
        shape[axis] = items.iter().map(|t| t.shape[axis]).sum();
        let mut owners = Vec::with_capacity(shape[axis]);
        for (k, t) in items.iter().enumerate() {
            owners.extend((0..t.shape[axis]).map(|j| (k, j)));
        }
        let all_strides: Vec<Vec<usize>> = items.iter().map(|t| strides(&t.shape)).collect();
        let data = (0..num_elements(&shape))
            .map(|o| {
                let mut index = unravel(o, &shape);
                let (k, j) = owners[index[axis]];
                index[axis] = j;
                items[k].data[ravel(&index, &all_strides[k])].clone()
            })
            .collect();
        Ok(Tensor { shape, data })
    }

    /// `tf.gather` semantics with `axis >= batch_dims`.
    pub fn gather(&self, indices: &Tensor<i64>, axis: i64, batch_dims: i64) -> TensorResult<Self> {
        let rank = self.rank();
        let batch = if batch_dims < 0 {
            batch_dims + indices.rank() as i64
        } else {
            batch_dims
        };
        if batch < 0 || batch as usize > indices.rank() {
            bail!("batch_dims {batch_dims} is out of range for indices of rank {}", indices.rank());
        }
        let batch = batch as usize;
        let axis = normalize_axis(axis, rank)?;
        if axis < batch {
            bail!("axis {axis} must not be less than batch_dims {batch}");
        }
        if self.shape[..batch] != indices.shape[..batch] {
            bail!(
                "batch dimensions of params {:?} and indices {:?} differ",
                self.shape,
                indices.shape
            );
        }
        let index_tail = &indices.shape[batch..];
        let mut shape = self.shape[..axis].to_vec();
        shape.extend_from_slice(index_tail);
        shape.extend_from_slice(&self.shape[axis + 1..]);
        let in_strides = strides(&self.shape);
        let index_strides = strides(&indices.shape);
        let limit = self.shape[axis];
        let mut sources = Vec::with_capacity(num_elements(&shape));
        for o in 0..num_elements(&shape) {
            let out_index = unravel(o, &shape);
            let mut index_pos = out_index[..batch].to_vec();
            index_pos.extend_from_slice(&out_index[axis..axis + index_tail.len()]);
            let picked = indices.data[ravel(&index_pos, &index_strides)];
            if picked < 0 || picked as usize >= limit {
                bail!("index {picked} is not in [0, {limit})");
            }
            let mut source = out_index[..axis].to_vec();
            source.push(picked as usize);
            source.extend_from_slice(&out_index[axis + index_tail.len()..]);
            sources.push(ravel(&source, &in_strides));
        }
        Ok(self.take(shape, &sources))
    }

    pub fn gather_nd(&self, indices: &Tensor<i64>) -> TensorResult<Self> {
        let Some(&depth) = indices.shape.last() else {
            bail!("gather_nd indices must have rank of at least 1");
        };
        if depth > self.rank() {
            bail!(
                "index depth {depth} exceeds params rank {}",
                self.rank()
            );
        }
        let mut shape = indices.shape[..indices.rank() - 1].to_vec();
        shape.extend_from_slice(&self.shape[depth..]);
        let inner: usize = self.shape[depth..].iter().product();
        let in_strides = strides(&self.shape);
        let lookups = num_elements(&indices.shape[..indices.rank() - 1]);
        let mut sources = Vec::with_capacity(num_elements(&shape));
        for t in 0..lookups {
            let tuple = &indices.data[t * depth..(t + 1) * depth];
            let mut base = 0;
            for (axis, &i) in tuple.iter().enumerate() {
                base += normalize_index(i, self.shape[axis])? * in_strides[axis];
            }
            sources.extend(base..base + inner);
        }
        Ok(self.take(shape, &sources))
    }

    pub fn boolean_mask(&self, mask: &Tensor<bool>) -> TensorResult<Self> {
        let m = mask.rank();
        if m == 0 || m > self.rank() || mask.shape[..] != self.shape[..m] {
            bail!(
                "mask of shape {:?} does not match the leading dimensions of {:?}",
                mask.shape,
                self.shape
            );
        }
        let inner: usize = self.shape[m..].iter().product();
        let mut sources = Vec::new();
        let mut kept = 0;
        for (p, _) in mask.data.iter().enumerate().filter(|(_, &keep)| keep) {
            sources.extend(p * inner..(p + 1) * inner);
            kept += 1;
        }
        let mut shape = vec![kept];
        shape.extend_from_slice(&self.shape[m..]);
        Ok(self.take(shape, &sources))
    }

    /// Choose from `x` where `condition` holds and from `y` elsewhere, with
    /// all three broadcast together.
    pub fn select(condition: &Tensor<bool>, x: &Self, y: &Self) -> TensorResult<Self> {
        let shape = broadcast_shapes(&broadcast_shapes(&condition.shape, &x.shape)?, &y.shape)?;
        let c = broadcast_sources(&condition.shape, &shape)?;
        let xs = broadcast_sources(&x.shape, &shape)?;
        let ys = broadcast_sources(&y.shape, &shape)?;
        let data = (0..num_elements(&shape))
            .map(|o| {
                if condition.data[c[o]] {
                    x.data[xs[o]].clone()
                } else {
                    y.data[ys[o]].clone()
                }
            })
            .collect();
        Ok(Tensor { shape, data })
    }

    /// Reorder every lane along `axis` by the permutation that stably sorts
    /// the corresponding lane of `keys`.
    pub fn sort_lanes_by(&self, keys: &Tensor<f64>, axis: usize, descending: bool) -> TensorResult<Self> {
        if keys.shape != self.shape {
            bail!("sort keys {:?} do not match values {:?}", keys.shape, self.shape);
        }
        let mut sources = vec![0; self.len()];
        for lane in keys.lanes(axis) {
            let order = stable_order(lane.iter().map(|&p| keys.data[p]), descending);
            for (slot, &rank) in lane.iter().zip(&order) {
                sources[*slot] = lane[rank];
            }
        }
        Ok(self.take(self.shape.clone(), &sources))
    }
}

/// Positions that stably sort `keys`, NaN last in ascending order.
pub fn stable_order(keys: impl Iterator<Item = f64>, descending: bool) -> Vec<usize> {
    let keys: Vec<f64> = keys.collect();
    let mut order: Vec<usize> = (0..keys.len()).collect();
    if descending {
        order.sort_by(|&a, &b| keys[b].total_cmp(&keys[a]));
    } else {
        order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
    }
    order
}

/// Clamp Python slice bounds onto `0..=dim`.
pub fn slice_bounds(dim: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let d = dim as i64;
    let clamp = |v: i64| -> usize {
        let v = if v < 0 { v + d } else { v };
        v.clamp(0, d) as usize
    };
    let from = start.map_or(0, clamp);
    let to = end.map_or(dim, clamp);
    (from, to.max(from))
}

// ── Products ────────────────────────────────────────────────────────────────

/// Batched matrix product over the last two axes; batch dims must agree.
pub fn matmul<T: Accumulate>(a: &Tensor<T>, b: &Tensor<T>) -> TensorResult<Tensor<T>> {
    if a.rank() < 2 || a.rank() != b.rank() {
        bail!(
            "matmul needs operands of equal rank >= 2, got {:?} and {:?}",
            a.shape,
            b.shape
        );
    }
    let r = a.rank();
    let (m, k) = (a.shape[r - 2], a.shape[r - 1]);
    let (k2, n) = (b.shape[r - 2], b.shape[r - 1]);
    if k != k2 || a.shape[..r - 2] != b.shape[..r - 2] {
        bail!("matmul shapes {:?} and {:?} are incompatible", a.shape, b.shape);
    }
    let batches: usize = a.shape[..r - 2].iter().product();
    let mut data = Vec::with_capacity(batches * m * n);
    for batch in 0..batches {
        let (ao, bo) = (batch * m * k, batch * k * n);
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::zero();
                for l in 0..k {
                    acc = acc.plus(&a.data[ao + i * k + l].times(&b.data[bo + l * n + j]));
                }
                data.push(acc);
            }
        }
    }
    let mut shape = a.shape[..r - 2].to_vec();
    shape.extend([m, n]);
    Tensor::new(shape, data)
}

/// Contract `axes_a` of `a` with `axes_b` of `b`.
pub fn tensordot<T: Accumulate>(
    a: &Tensor<T>,
    b: &Tensor<T>,
    axes_a: &[usize],
    axes_b: &[usize],
) -> TensorResult<Tensor<T>> {
    if axes_a.len() != axes_b.len() {
        bail!("tensordot axes {axes_a:?} and {axes_b:?} differ in length");
    }
    for (&x, &y) in axes_a.iter().zip(axes_b) {
        if x >= a.rank() || y >= b.rank() || a.shape[x] != b.shape[y] {
            bail!(
                "tensordot cannot contract {:?} axis {x} with {:?} axis {y}",
                a.shape,
                b.shape
            );
        }
    }
    let free_a: Vec<usize> = (0..a.rank()).filter(|i| !axes_a.contains(i)).collect();
    let free_b: Vec<usize> = (0..b.rank()).filter(|i| !axes_b.contains(i)).collect();
    let k: usize = axes_a.iter().map(|&i| a.shape[i]).product();
    let rows: usize = free_a.iter().map(|&i| a.shape[i]).product();
    let cols: usize = free_b.iter().map(|&i| b.shape[i]).product();

    let perm_a: Vec<usize> = free_a.iter().chain(axes_a).copied().collect();
    let (_, src_a) = transpose_sources(&a.shape, &perm_a);
    let left = a.take(vec![rows, k], &src_a);
    let perm_b: Vec<usize> = axes_b.iter().chain(&free_b).copied().collect();
    let (_, src_b) = transpose_sources(&b.shape, &perm_b);
    let right = b.take(vec![k, cols], &src_b);

    let product = matmul(&left, &right)?;
    let shape: Vec<usize> = free_a
        .iter()
        .map(|&i| a.shape[i])
        .chain(free_b.iter().map(|&i| b.shape[i]))
        .collect();
    product.with_shape(shape)
}

// ── Tests ───────────────────────────────────────────────────────────────────
