// error.rs — Error taxonomy
//
// Syntax, resolution, unbound-reference and execution failures are caused by
// user input and returned as values. Catalog and trace errors indicate a
// defect in the operation table or the tracer; callers must not hide them.

use thiserror::Error;

use crate::tensor::TensorError;

/// Malformed expression structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unbalanced delimiters in `{0}`")]
    Unbalanced(String),
    #[error("mismatched `{found}` in `{expression}`")]
    Mismatched { expression: String, found: char },
    #[error("unterminated string in `{0}`")]
    UnterminatedString(String),
    #[error("`{0}`: tuple creation supports 1 to 3 elements")]
    TupleArity(String),
    #[error("`{0}`: only a[i], a[:, i], a[i:], a[:j], a[i:j] and their a[:, ...] forms are supported")]
    Subscript(String),
    #[error("keyword argument `{name}` repeated in `{expression}`")]
    DuplicateKeyword { expression: String, name: String },
    #[error("positional argument follows keyword argument in `{0}`")]
    PositionalAfterKeyword(String),
    #[error("unsupported expression `{0}`")]
    Unsupported(String),
}

/// Failure to read constant text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("`{text}` is not a literal: {message}")]
    Syntax { text: String, message: String },
    #[error("unknown name `{0}`")]
    UnknownName(String),
}

/// No catalog entry accepts a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("operation `{0}` is not supported")]
    UnknownFunction(String),
    #[error(
        "`{call}` matches no signature of `{function}`; supported usage:\n  {}",
        .candidates.join("\n  ")
    )]
    NoMatchingSignature {
        function: String,
        call: String,
        candidates: Vec<String>,
    },
}

/// An operation raised while being applied to concrete arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation}: {source}")]
pub struct ExecError {
    pub operation: String,
    pub source: TensorError,
}

/// Malformed operation table entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("signature `{signature}` is malformed: {message}")]
    MalformedSignature { signature: String, message: String },
    #[error("`{signature}` is declared twice")]
    DuplicateSignature { signature: String },
    #[error("`{signature}` has {args} arguments but {roles} roles")]
    RoleCount {
        signature: String,
        args: usize,
        roles: usize,
    },
    #[error("`{signature}` has {args} arguments but {descriptions} descriptions")]
    DescriptionCount {
        signature: String,
        args: usize,
        descriptions: usize,
    },
    #[error("`{signature}`: {message}")]
    InvalidProfile { signature: String, message: String },
}

/// Internal consistency failure while computing provenance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("`{operation}` traced {found} arguments, expected {expected}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        found: usize,
    },
    #[error("`{operation}`: argument `{argument}` of shape {found:?} is not elementwise with output {expected:?}")]
    NotElementwise {
        operation: String,
        argument: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("representative `{0}` is missing from the catalog")]
    MissingRepresentative(String),
    #[error("`{operation}`: argument `{argument}` has no closed form in family {family}")]
    Uncovered {
        operation: String,
        argument: String,
        family: String,
    },
    #[error("propagating dependencies failed: {0}")]
    Propagation(#[from] ExecError),
}

/// Any failure of a library entry point.
#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid literal: {0}")]
    Literal(#[from] LiteralError),
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("unbound reference `{name}`: not an input and not a literal")]
    Unbound { name: String },
    #[error("execution error: {0}")]
    Exec(#[from] ExecError),
    #[error("internal error: {0}")]
    Trace(#[from] TraceError),
    #[error("internal error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("invalid bindings: {0}")]
    Bindings(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
