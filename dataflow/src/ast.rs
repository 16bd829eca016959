// AST types for tensor expressions and literal argument text.
//
// `ParsedCall` is the one-level view of an expression: what it applies and
// the text of each argument. Arguments stay as text so that resolution can
// work from arity and keyword presence alone; they are parsed recursively
// when the value tree is built.
//
// Failure modes: none (data-only module).
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::LiteralError;
use crate::object::{format_float, DType, Object};

// ── Literals ──

/// A constant written in an expression, e.g. `[[1, 2]]`, `'left'`,
/// `tf.int32`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Qualified constant name such as `tf.float32`.
    Name(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl Literal {
    /// Python equality: `1 == 1.0`, lists never equal tuples.
    pub fn same_value(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Float(b)) | (Literal::Float(b), Literal::Int(a)) => {
                *a as f64 == *b
            }
            (Literal::List(a), Literal::List(b)) | (Literal::Tuple(a), Literal::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => self == other,
        }
    }

    /// Evaluate to a runtime object. Names must denote a dtype.
    pub fn to_object(&self) -> Result<Object, LiteralError> {
        Ok(match self {
            Literal::Int(n) => Object::Int(*n),
            Literal::Float(x) => Object::Float(*x),
            Literal::Bool(b) => Object::Bool(*b),
            Literal::Str(s) => Object::Str(s.clone()),
            Literal::Name(name) => match DType::from_name(name) {
                Some(dtype) if name.starts_with("tf.") || name.starts_with("np.") => {
                    Object::DType(dtype)
                }
                _ => {
                    return Err(LiteralError::UnknownName(name.clone()));
                }
            },
            Literal::List(items) => Object::List(
                items
                    .iter()
                    .map(Literal::to_object)
                    .collect::<Result<_, _>>()?,
            ),
            Literal::Tuple(items) => Object::Tuple(
                items
                    .iter()
                    .map(Literal::to_object)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => f.write_str(&format_float(*x)),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Str(s) => f.write_str(&Object::Str(s.clone()).python_repr()),
            Literal::Name(name) => f.write_str(name),
            Literal::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Literal::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// ── Primitives ──

/// Python-level operations written with syntax rather than a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `a[i]`
    Index,
    /// `a[:, i]`
    IndexAxis1,
    /// `a[i:]`
    SliceFrom,
    /// `a[:j]`
    SliceTo,
    /// `a[i:j]`
    SliceBetween,
    /// `a[:, i:]`
    SliceFromAxis1,
    /// `a[:, :j]`
    SliceToAxis1,
    /// `a[:, i:j]`
    SliceBetweenAxis1,
    /// `(a,)`
    Singleton,
    /// `(a, b)`
    Pair,
    /// `(a, b, c)`
    Triple,
}

impl Primitive {
    pub const ALL: [Primitive; 11] = [
        Primitive::Index,
        Primitive::IndexAxis1,
        Primitive::SliceFrom,
        Primitive::SliceTo,
        Primitive::SliceBetween,
        Primitive::SliceFromAxis1,
        Primitive::SliceToAxis1,
        Primitive::SliceBetweenAxis1,
        Primitive::Singleton,
        Primitive::Pair,
        Primitive::Triple,
    ];

    /// Tuple construction of exactly `n` elements.
    pub fn tuple(n: usize) -> Option<Primitive> {
        match n {
            1 => Some(Primitive::Singleton),
            2 => Some(Primitive::Pair),
            3 => Some(Primitive::Triple),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Primitive::Singleton => 1,
            Primitive::Index
            | Primitive::IndexAxis1
            | Primitive::SliceFrom
            | Primitive::SliceTo
            | Primitive::SliceFromAxis1
            | Primitive::SliceToAxis1
            | Primitive::Pair => 2,
            Primitive::SliceBetween | Primitive::SliceBetweenAxis1 | Primitive::Triple => 3,
        }
    }

    /// Display form used as the operation label.
    pub fn signature(self) -> &'static str {
        match self {
            Primitive::Index => "x[i]",
            Primitive::IndexAxis1 => "x[:, i]",
            Primitive::SliceFrom => "x[start:]",
            Primitive::SliceTo => "x[:stop]",
            Primitive::SliceBetween => "x[start:stop]",
            Primitive::SliceFromAxis1 => "x[:, start:]",
            Primitive::SliceToAxis1 => "x[:, :stop]",
            Primitive::SliceBetweenAxis1 => "x[:, start:stop]",
            Primitive::Singleton => "(a,)",
            Primitive::Pair => "(a, b)",
            Primitive::Triple => "(a, b, c)",
        }
    }

    pub fn docstring(self) -> &'static str {
        match self {
            Primitive::Index => "Indexes into a tensor or sequence along the first axis.",
            Primitive::IndexAxis1 => "Indexes into a tensor along the second axis.",
            Primitive::SliceFrom | Primitive::SliceTo | Primitive::SliceBetween => {
                "Slices a tensor or sequence along the first axis."
            }
            Primitive::SliceFromAxis1 | Primitive::SliceToAxis1 | Primitive::SliceBetweenAxis1 => {
                "Slices a tensor along the second axis."
            }
            Primitive::Singleton | Primitive::Pair | Primitive::Triple => "Creates a tuple.",
        }
    }

    /// Expression text for this primitive applied to `args`.
    pub fn render(self, args: &[String]) -> String {
        let a = |i: usize| args.get(i).map(String::as_str).unwrap_or("");
        match self {
            Primitive::Index => format!("{}[{}]", a(0), a(1)),
            Primitive::IndexAxis1 => format!("{}[:, {}]", a(0), a(1)),
            Primitive::SliceFrom => format!("{}[{}:]", a(0), a(1)),
            Primitive::SliceTo => format!("{}[:{}]", a(0), a(1)),
            Primitive::SliceBetween => format!("{}[{}:{}]", a(0), a(1), a(2)),
            Primitive::SliceFromAxis1 => format!("{}[:, {}:]", a(0), a(1)),
            Primitive::SliceToAxis1 => format!("{}[:, :{}]", a(0), a(1)),
            Primitive::SliceBetweenAxis1 => format!("{}[:, {}:{}]", a(0), a(1), a(2)),
            Primitive::Singleton => format!("({},)", a(0)),
            Primitive::Pair => format!("({}, {})", a(0), a(1)),
            Primitive::Triple => format!("({}, {}, {})", a(0), a(1), a(2)),
        }
    }
}

// ── Signatures ──

/// A catalog signature split into its parts, e.g.
/// `tf.pad(tensor, paddings, mode='CONSTANT', constant_values)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub function: String,
    /// Formal argument names in declaration order.
    pub formals: Vec<String>,
    /// Fixed keyword arguments as `(name, literal text)`.
    pub constants: Vec<(String, String)>,
    /// Formals declared before the first fixed keyword.
    pub leading: usize,
}

// ── Calls ──

/// What an expression applies at its top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// A bare name or literal: nothing is applied. Its text is the single
    /// entry of `args`.
    Leaf,
    /// A named function such as `tf.reduce_sum`.
    Function(String),
    Primitive(Primitive),
}

/// One level of a parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCall {
    pub target: CallTarget,
    /// Positional argument text, in source order.
    pub args: Vec<String>,
    /// Keyword argument text by keyword name.
    pub kwargs: BTreeMap<String, String>,
}

impl ParsedCall {
    pub fn leaf(text: &str) -> Self {
        ParsedCall {
            target: CallTarget::Leaf,
            args: vec![text.to_string()],
            kwargs: BTreeMap::new(),
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match &self.target {
            CallTarget::Function(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ParsedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            CallTarget::Leaf => f.write_str(self.args.first().map(String::as_str).unwrap_or("")),
            CallTarget::Primitive(p) => f.write_str(&p.render(&self.args)),
            CallTarget::Function(name) => {
                let mut parts: Vec<String> = self.args.clone();
                parts.extend(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")));
                write!(f, "{name}({})", parts.join(", "))
            }
        }
    }
}
