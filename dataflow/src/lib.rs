// tfdataflow — Tensor expression reconstruction and provenance graphs
//
// Library root. Text is parsed and resolved against the operation catalog,
// executed into a value tree, and walked into a dataflow graph whose trace
// edges record which argument elements each output element came from.

pub mod ast;
pub mod catalog;
pub mod dot;
pub mod error;
pub mod functions;
pub mod graph;
pub mod id;
pub mod kernels;
pub mod lexer;
pub mod lift;
pub mod literal;
pub mod object;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod tensor;
pub mod trace;
pub mod value;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use graph::{build_graph, Dataflow, GraphOptions, MergePolicy};
pub use value::{rebind, value_from_text, Bindings, Value};
