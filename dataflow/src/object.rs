// object.rs — Runtime objects bound to inputs and produced by operations
//
// An `Object` is whatever an expression can evaluate to: a typed dense
// tensor, a Python-level scalar, a string, a dtype, or a sequence of those.
// Tensors keep their elements as `f64` and a `DType` that decides how the
// elements are coerced and printed.
//
// The value string (`to_value_string`) is the equality key used by the
// front end: floats are rounded to a fixed number of decimals, sequences of
// either kind print with parentheses, and tensors print as nested lists.

use std::fmt;

use serde::Serialize;

use crate::tensor::{bail, num_elements, Tensor, TensorError, TensorResult};

// ── Element types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Accepts `tf.int32`, `np.int32` and bare `int32`.
    pub fn from_name(name: &str) -> Option<DType> {
        let bare = name
            .strip_prefix("tf.")
            .or_else(|| name.strip_prefix("np."))
            .unwrap_or(name);
        match bare {
            "bool" => Some(DType::Bool),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "float32" => Some(DType::Float32),
            "float64" => Some(DType::Float64),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }

    /// Convert an element into this type's value set.
    pub fn coerce(self, v: f64) -> f64 {
        match self {
            DType::Bool => {
                if v != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DType::Int32 => (v.trunc() as i64 as i32) as f64,
            DType::Int64 => v.trunc() as i64 as f64,
            DType::Float32 => v as f32 as f64,
            DType::Float64 => v,
        }
    }

    pub fn lowest(self) -> f64 {
        match self {
            DType::Bool => 0.0,
            DType::Int32 => i32::MIN as f64,
            DType::Int64 => i64::MIN as f64,
            DType::Float32 | DType::Float64 => f64::NEG_INFINITY,
        }
    }

    pub fn highest(self) -> f64 {
        match self {
            DType::Bool => 1.0,
            DType::Int32 => i32::MAX as f64,
            DType::Int64 => i64::MAX as f64,
            DType::Float32 | DType::Float64 => f64::INFINITY,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tf.{}", self.name())
    }
}

// ── Dense tensors ───────────────────────────────────────────────────────────

/// A tensor with an element type. Elements are always coerced to `dtype`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    dtype: DType,
    values: Tensor<f64>,
}

impl DenseTensor {
    pub fn new(dtype: DType, values: Tensor<f64>) -> Self {
        let values = values.map(|&v| dtype.coerce(v));
        DenseTensor { dtype, values }
    }

    pub fn from_vec(dtype: DType, shape: Vec<usize>, data: Vec<f64>) -> TensorResult<Self> {
        Ok(DenseTensor::new(dtype, Tensor::new(shape, data)?))
    }

    pub fn scalar(dtype: DType, value: f64) -> Self {
        DenseTensor::new(dtype, Tensor::scalar(value))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &Tensor<f64> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn rank(&self) -> usize {
        self.values.rank()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cast(&self, dtype: DType) -> DenseTensor {
        DenseTensor::new(dtype, self.values.clone())
    }

    pub fn to_bools(&self) -> Tensor<bool> {
        self.values.map(|&v| v != 0.0)
    }

    /// Integer view of an index-like tensor.
    pub fn to_indices(&self) -> TensorResult<Tensor<i64>> {
        if !self.dtype.is_integer() {
            bail!("expected an integer tensor, got dtype {}", self.dtype.name());
        }
        Ok(self.values.map(|&v| v as i64))
    }

    pub fn require_bool(&self) -> TensorResult<Tensor<bool>> {
        if self.dtype != DType::Bool {
            bail!("expected a bool tensor, got dtype {}", self.dtype.name());
        }
        Ok(self.to_bools())
    }

    fn write_nested(&self, out: &mut String, decimals: Option<u32>) {
        fn walk(t: &DenseTensor, axis: usize, offset: usize, out: &mut String, decimals: Option<u32>) {
            if axis == t.rank() {
                out.push_str(&format_element(t.dtype, t.values.data()[offset], decimals));
                return;
            }
            let stride: usize = t.shape()[axis + 1..].iter().product();
            out.push('[');
            for i in 0..t.shape()[axis] {
                if i > 0 {
                    out.push_str(", ");
                }
                walk(t, axis + 1, offset + i * stride, out, decimals);
            }
            out.push(']');
        }
        walk(self, 0, 0, out, decimals);
    }

    /// Nested-list rendering with floats rounded to `decimals`.
    pub fn to_value_string(&self, decimals: u32) -> String {
        let mut out = String::new();
        self.write_nested(&mut out, Some(decimals));
        out
    }

    /// Nested-list rendering without rounding.
    pub fn to_literal_string(&self) -> String {
        let mut out = String::new();
        self.write_nested(&mut out, None);
        out
    }
}

fn format_element(dtype: DType, v: f64, decimals: Option<u32>) -> String {
    match dtype {
        DType::Bool => python_bool(v != 0.0).to_string(),
        DType::Int32 | DType::Int64 => format!("{}", v as i64),
        DType::Float32 | DType::Float64 => match decimals {
            Some(d) => format_float(round_to(v, d)),
            None => format_float(v),
        },
    }
}

fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Round half to even at `decimals` places.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let scale = 10f64.powi(decimals as i32);
    (v * scale).round_ties_even() / scale
}

/// Shortest round-trip float text with a mandatory fractional part.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = format!("{v}");
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

fn python_str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

// ── Objects ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Tensor(DenseTensor),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    DType(DType),
    List(Vec<Object>),
    Tuple(Vec<Object>),
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Tensor(_) => "tensor",
            Object::Int(_) => "int",
            Object::Float(_) => "float",
            Object::Bool(_) => "bool",
            Object::Str(_) => "str",
            Object::DType(_) => "dtype",
            Object::List(_) => "list",
            Object::Tuple(_) => "tuple",
        }
    }

    pub fn items(&self) -> Option<&[Object]> {
        match self {
            Object::List(items) | Object::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&DenseTensor> {
        match self {
            Object::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_dtype(&self) -> Option<DType> {
        match self {
            Object::DType(d) => Some(*d),
            _ => None,
        }
    }

    /// Integer scalar: a Python int or a 0-d/1-element integer tensor.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(n) => Some(*n),
            Object::Tensor(t) if t.dtype().is_integer() && t.len() == 1 && t.rank() <= 1 => {
                Some(t.values().data()[0] as i64)
            }
            _ => None,
        }
    }

    /// Integers given as a scalar, a flat sequence, or a 1-d integer tensor.
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            Object::Int(n) => Some(vec![*n]),
            Object::List(items) | Object::Tuple(items) => {
                items.iter().map(Object::as_int).collect()
            }
            Object::Tensor(t) if t.dtype().is_integer() && t.rank() <= 1 => {
                Some(t.values().data().iter().map(|&v| v as i64).collect())
            }
            _ => None,
        }
    }

    /// Python truthiness for scalar-like objects.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Bool(b) => Some(*b),
            Object::Tensor(t) if t.dtype() == DType::Bool && t.len() == 1 => {
                Some(t.values().data()[0] != 0.0)
            }
            _ => None,
        }
    }

    /// Convert to a dense tensor the way `tf.convert_to_tensor` would.
    pub fn to_tensor(&self) -> TensorResult<DenseTensor> {
        match self {
            Object::Tensor(t) => Ok(t.clone()),
            Object::Int(n) => {
                let dtype = if i32::try_from(*n).is_ok() {
                    DType::Int32
                } else {
                    DType::Int64
                };
                Ok(DenseTensor::scalar(dtype, *n as f64))
            }
            Object::Float(x) => Ok(DenseTensor::scalar(DType::Float32, *x)),
            Object::Bool(b) => Ok(DenseTensor::scalar(DType::Bool, f64::from(u8::from(*b)))),
            Object::List(items) | Object::Tuple(items) => pack(items),
            Object::Str(_) | Object::DType(_) => {
                bail!("cannot convert a {} to a tensor", self.kind_name())
            }
        }
    }

    /// Shape of the tensor this object converts to; non-numeric objects are
    /// treated as scalars.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Object::Str(_) | Object::DType(_) => Vec::new(),
            other => other
                .to_tensor()
                .map(|t| t.shape().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Replace rectangular numeric sequences by tensors, leaving ragged or
    /// non-numeric sequences as sequences of converted items.
    pub fn tensorize(self) -> Object {
        let (items, is_list) = match self {
            Object::List(items) => (items, true),
            Object::Tuple(items) => (items, false),
            other => return other,
        };
        if let Ok(t) = pack(&items) {
            return Object::Tensor(t);
        }
        let items = items.into_iter().map(Object::tensorize).collect();
        if is_list {
            Object::List(items)
        } else {
            Object::Tuple(items)
        }
    }

    /// Value string used to compare results: floats rounded, sequences in
    /// parentheses, tensors as nested lists.
    pub fn to_value_string(&self, decimals: u32) -> String {
        match self {
            Object::Tensor(t) => t.to_value_string(decimals),
            Object::Float(x) => format_float(round_to(*x, decimals)),
            Object::List(items) | Object::Tuple(items) => {
                let parts: Vec<String> =
                    items.iter().map(|o| o.to_value_string(decimals)).collect();
                format!("({})", parts.join(", "))
            }
            other => other.python_repr(),
        }
    }

    /// Source-text rendering, as a constant would be written in an
    /// expression.
    pub fn python_repr(&self) -> String {
        match self {
            Object::Tensor(t) => format!("tf.constant({})", t.to_literal_string()),
            Object::Int(n) => n.to_string(),
            Object::Float(x) => format_float(*x),
            Object::Bool(b) => python_bool(*b).to_string(),
            Object::Str(s) => python_str_repr(s),
            Object::DType(d) => d.to_string(),
            Object::List(items) => {
                let parts: Vec<String> = items.iter().map(Object::python_repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Object::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Object::python_repr).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
        }
    }

    /// Decode a JSON binding. Arrays become tensors when rectangular and
    /// numeric.
    pub fn from_json(value: &serde_json::Value) -> TensorResult<Object> {
        let object = match value {
            serde_json::Value::Bool(b) => Object::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Object::Int(i),
                None => Object::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => match DType::from_name(s) {
                Some(d) if s.starts_with("tf.") => Object::DType(d),
                _ => Object::Str(s.clone()),
            },
            serde_json::Value::Array(items) => Object::List(
                items
                    .iter()
                    .map(Object::from_json)
                    .collect::<TensorResult<Vec<_>>>()?,
            ),
            serde_json::Value::Null | serde_json::Value::Object(_) => {
                bail!("unsupported JSON binding: {value}")
            }
        };
        Ok(object.tensorize())
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value_string(2))
    }
}

impl From<DenseTensor> for Object {
    fn from(t: DenseTensor) -> Self {
        Object::Tensor(t)
    }
}

/// Pack a sequence into one tensor with a leading axis.
fn pack(items: &[Object]) -> TensorResult<DenseTensor> {
    if items.is_empty() {
        return DenseTensor::from_vec(DType::Float32, vec![0], Vec::new());
    }
    let parts = items
        .iter()
        .map(Object::to_tensor)
        .collect::<TensorResult<Vec<_>>>()?;
    let shape = parts[0].shape().to_vec();
    if parts.iter().any(|p| p.shape() != shape.as_slice()) {
        bail!("cannot pack a ragged sequence into a tensor");
    }
    let dtype = unify_dtypes(items, &parts)?;
    let mut out_shape = vec![parts.len()];
    out_shape.extend_from_slice(&shape);
    let mut data = Vec::with_capacity(num_elements(&out_shape));
    for part in &parts {
        data.extend_from_slice(part.values().data());
    }
    DenseTensor::from_vec(dtype, out_shape, data)
}

fn unify_dtypes(items: &[Object], parts: &[DenseTensor]) -> TensorResult<DType> {
    let explicit: Vec<DType> = items
        .iter()
        .zip(parts)
        .filter(|(o, _)| matches!(o, Object::Tensor(_)))
        .map(|(_, p)| p.dtype())
        .collect();
    if let Some(&first) = explicit.first() {
        if explicit.iter().any(|&d| d != first) {
            bail!("cannot pack tensors of different dtypes");
        }
        return Ok(first);
    }
    let dtypes: Vec<DType> = parts.iter().map(DenseTensor::dtype).collect();
    let any_bool = dtypes.contains(&DType::Bool);
    let all_bool = dtypes.iter().all(|&d| d == DType::Bool);
    if any_bool && !all_bool {
        return Err(TensorError::new("cannot pack booleans together with numbers"));
    }
    Ok(if dtypes.iter().any(|d| d.is_float()) {
        DType::Float32
    } else if dtypes.contains(&DType::Int64) {
        DType::Int64
    } else {
        dtypes[0]
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Object {
        Object::List(items.iter().map(|&i| Object::Int(i)).collect())
    }

    #[test]
    fn float_formatting_matches_python_repr() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(-3.5), "-3.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(round_to(0.1 + 0.2, 2)), "0.3");
        assert_eq!(format_float(round_to(-0.001, 2)), "-0.0");
    }

    #[test]
    fn nested_list_packs_to_int32() {
        let obj = Object::List(vec![ints(&[1, 2]), ints(&[3, 4])]).tensorize();
        let t = obj.as_tensor().unwrap();
        assert_eq!(t.dtype(), DType::Int32);
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(obj.to_value_string(2), "[[1, 2], [3, 4]]");
    }

    #[test]
    fn mixed_numbers_pack_to_float32() {
        let obj = Object::List(vec![Object::Int(1), Object::Float(2.5)]).tensorize();
        assert_eq!(obj.as_tensor().unwrap().dtype(), DType::Float32);
        assert_eq!(obj.to_value_string(2), "[1.0, 2.5]");
    }

    #[test]
    fn ragged_lists_stay_sequences() {
        let obj = Object::List(vec![ints(&[1]), ints(&[2, 3])]).tensorize();
        assert!(matches!(obj, Object::List(_)));
        assert_eq!(obj.to_value_string(2), "([1], [2, 3])");
    }

    #[test]
    fn value_strings_round_floats() {
        let t = DenseTensor::from_vec(DType::Float32, vec![2], vec![1.0 / 3.0, 2.0]).unwrap();
        assert_eq!(Object::Tensor(t).to_value_string(2), "[0.33, 2.0]");
        assert_eq!(Object::Float(2.0 / 3.0).to_value_string(2), "0.67");
        assert_eq!(
            Object::Tuple(vec![Object::Int(1), Object::Str("a".into())]).to_value_string(2),
            "(1, 'a')"
        );
        assert_eq!(Object::DType(DType::Int32).to_value_string(2), "tf.int32");
    }

    #[test]
    fn python_repr_of_sequences() {
        assert_eq!(ints(&[1, -2]).python_repr(), "[1, -2]");
        assert_eq!(Object::Tuple(vec![Object::Int(1)]).python_repr(), "(1,)");
        assert_eq!(Object::Bool(true).python_repr(), "True");
        assert_eq!(Object::Str("it's".into()).python_repr(), "\"it's\"");
    }

    #[test]
    fn dtype_coercion() {
        assert_eq!(DType::Int32.coerce(-2.7), -2.0);
        assert_eq!(DType::Bool.coerce(0.5), 1.0);
        assert_eq!(DType::from_name("tf.float64"), Some(DType::Float64));
        assert_eq!(DType::from_name("tf.complex64"), None);
    }

    #[test]
    fn json_bindings_become_tensors() {
        let json: serde_json::Value = serde_json::from_str("[[true, false]]").unwrap();
        let obj = Object::from_json(&json).unwrap();
        assert_eq!(obj.as_tensor().unwrap().dtype(), DType::Bool);
        assert_eq!(obj.to_value_string(2), "[[True, False]]");
        assert!(Object::from_json(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn int_helpers() {
        assert_eq!(Object::Int(3).as_int_list(), Some(vec![3]));
        assert_eq!(ints(&[0, 2]).as_int_list(), Some(vec![0, 2]));
        let t = DenseTensor::scalar(DType::Int32, 4.0);
        assert_eq!(Object::Tensor(t).as_int(), Some(4));
        assert_eq!(Object::Float(1.0).as_int(), None);
    }
}
