// catalog.rs — Operation catalog
//
// Builds the immutable table of supported operations from static entries:
// signature text, kernel, trace family, per-argument roles, descriptions and
// docstrings. Construction validates every entry, so an inconsistent table
// fails at build time rather than while tracing.
//
// Preconditions: entries are declared in resolution priority order.
// Postconditions: descriptors are reachable by signature and, in declaration
//   order, by function name.
// Failure modes: malformed or inconsistent entries produce `CatalogError`.
// Side effects: `Catalog::standard` builds the shared table once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::ast::{Literal, ParsedCall, CallTarget};
use crate::error::CatalogError;
use crate::functions::{Entry, ENTRIES};
use crate::kernels::Kernel;

// ── Classification ──────────────────────────────────────────────────────────

/// How provenance is computed for an operation as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Elementwise arithmetic and comparison under broadcasting.
    Broadcast,
    /// Reductions and arg-reductions along an axis.
    AlongAxis,
    /// Sorted and unsorted segment reductions.
    AlongSegment,
    ArgSort,
    Gather,
    /// Stack, concat and add_n over a sequence of tensors.
    StackLike,
    /// Boolean masking and `where`.
    Condition,
    /// Every argument is handled by its role alone.
    Preprocess,
    /// Not traced.
    Other,
}

impl Family {
    /// Whether the family's closed form handles an `Other`-role argument at
    /// `position` of an operation computed by `kernel`.
    pub fn covers(self, kernel: Kernel, position: usize) -> bool {
        match self {
            Family::Broadcast | Family::AlongSegment => position < 2,
            Family::AlongAxis | Family::ArgSort | Family::StackLike => position == 0,
            Family::Gather => position == 1,
            Family::Condition => match kernel {
                Kernel::BooleanMask => position == 1,
                Kernel::Where => position == 0,
                _ => false,
            },
            Family::Preprocess | Family::Other => false,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Broadcast => "broadcast",
            Family::AlongAxis => "along_axis",
            Family::AlongSegment => "along_segment",
            Family::ArgSort => "argsort",
            Family::Gather => "gather",
            Family::StackLike => "stack_like",
            Family::Condition => "condition",
            Family::Preprocess => "preprocess",
            Family::Other => "other",
        };
        f.write_str(name)
    }
}

/// How provenance is computed for one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRole {
    /// Shapes the output (axis, shape, depth); no element mapping.
    ValueShape,
    /// Every output element depends on every element (fill value, bounds).
    FullBreadth,
    /// Output element `i` depends on argument element `i`.
    Elementwise,
    /// Discovered by dependency propagation through the kernel.
    Differentiable,
    /// Left to the family's closed form.
    Other,
}

/// Trace metadata of a traced operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceProfile {
    pub family: Family,
    pub roles: Vec<ArgRole>,
    pub descriptions: Vec<String>,
}

// ── Descriptors ─────────────────────────────────────────────────────────────

/// One supported operation signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Canonical signature text, e.g. `tf.reduce_sum(input_tensor, axis)`.
    pub signature: String,
    pub function: String,
    pub arg_names: Vec<String>,
    pub constant_kwargs: Vec<(String, Literal)>,
    pub kernel: Kernel,
    pub profile: Option<TraceProfile>,
    pub docstring: String,
    /// Leading arguments rendered positionally when reconstructing an
    /// expression; the rest are rendered as keywords.
    pub positional: usize,
}

impl Descriptor {
    pub fn family(&self) -> Family {
        self.profile.as_ref().map_or(Family::Other, |p| p.family)
    }

    pub fn role(&self, position: usize) -> Option<ArgRole> {
        self.profile.as_ref()?.roles.get(position).copied()
    }

    pub fn description(&self, position: usize) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.descriptions.get(position))
            .map_or("", String::as_str)
    }

    pub fn constant_kwarg(&self, name: &str) -> Option<&Literal> {
        self.constant_kwargs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn num_args(&self) -> usize {
        self.arg_names.len()
    }

    /// Call text applying this operation to argument expressions given in
    /// formal order.
    pub fn render(&self, args: &[String]) -> String {
        let split = self.positional.min(args.len());
        let mut parts: Vec<String> = args[..split].to_vec();
        parts.extend(self.constant_kwargs.iter().map(|(k, v)| format!("{k}={v}")));
        parts.extend(
            self.arg_names[split.min(self.arg_names.len())..]
                .iter()
                .zip(&args[split..])
                .map(|(name, arg)| format!("{name}={arg}")),
        );
        format!("{}({})", self.function, parts.join(", "))
    }

    pub fn summary(&self) -> DescriptorSummary<'_> {
        DescriptorSummary {
            signature: &self.signature,
            family: self.family(),
            roles: self.profile.as_ref().map(|p| p.roles.as_slice()),
            docstring: &self.docstring,
        }
    }
}

/// Serialisable listing of a descriptor.
#[derive(Debug, Serialize)]
pub struct DescriptorSummary<'a> {
    pub signature: &'a str,
    pub family: Family,
    pub roles: Option<&'a [ArgRole]>,
    pub docstring: &'a str,
}

// ── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Catalog {
    descriptors: Vec<Arc<Descriptor>>,
    by_signature: HashMap<String, usize>,
    by_function: HashMap<String, Vec<Arc<Descriptor>>>,
}

impl Catalog {
    /// The built-in operation table, built on first use.
    pub fn standard() -> &'static Catalog {
        static STANDARD: OnceLock<Catalog> = OnceLock::new();
        STANDARD.get_or_init(|| match Catalog::from_entries(ENTRIES) {
            Ok(catalog) => catalog,
            Err(e) => panic!("internal: malformed operation catalog: {e}"),
        })
    }

    pub fn from_entries(entries: &[Entry]) -> Result<Catalog, CatalogError> {
        let mut built: Vec<(Descriptor, usize)> = Vec::with_capacity(entries.len());
        let mut by_signature = HashMap::new();

        for entry in entries {
            let (descriptor, leading) = describe(entry)?;
            if by_signature
                .insert(descriptor.signature.clone(), built.len())
                .is_some()
            {
                return Err(CatalogError::DuplicateSignature {
                    signature: descriptor.signature,
                });
            }
            built.push((descriptor, leading));
        }

        assign_positional(&mut built)?;

        let descriptors: Vec<Arc<Descriptor>> =
            built.into_iter().map(|(d, _)| Arc::new(d)).collect();
        let mut by_function: HashMap<String, Vec<Arc<Descriptor>>> = HashMap::new();
        for d in &descriptors {
            by_function
                .entry(d.function.clone())
                .or_default()
                .push(Arc::clone(d));
        }
        tracing::debug!(
            operations = descriptors.len(),
            functions = by_function.len(),
            "built operation catalog"
        );
        Ok(Catalog {
            descriptors,
            by_signature,
            by_function,
        })
    }

    pub fn lookup_by_signature(&self, signature: &str) -> Option<&Arc<Descriptor>> {
        self.by_signature
            .get(signature)
            .map(|&i| &self.descriptors[i])
    }

    /// Descriptors of `function` in declaration order.
    pub fn candidates(&self, function: &str) -> &[Arc<Descriptor>] {
        self.by_function
            .get(function)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_descriptors(&self) -> &[Arc<Descriptor>] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Compact JSON listing used as fingerprint input.
    pub fn canonical_json(&self) -> String {
        let summaries: Vec<DescriptorSummary<'_>> =
            self.descriptors.iter().map(|d| d.summary()).collect();
        serde_json::to_string(&summaries).unwrap_or_default()
    }
}

// ── Construction ────────────────────────────────────────────────────────────

fn malformed(signature: &str, message: impl fmt::Display) -> CatalogError {
    CatalogError::MalformedSignature {
        signature: signature.to_string(),
        message: message.to_string(),
    }
}

fn invalid(signature: &str, message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidProfile {
        signature: signature.to_string(),
        message: message.into(),
    }
}

/// Descriptor for one entry, plus the count of formals declared before its
/// first fixed keyword.
fn describe(entry: &Entry) -> Result<(Descriptor, usize), CatalogError> {
    let signature = entry.signature;
    let parts = crate::parser::parse_signature(signature).map_err(|e| malformed(signature, e))?;
    let constant_kwargs = parts
        .constants
        .iter()
        .map(|(name, text)| {
            crate::literal::parse(text)
                .map(|lit| (name.clone(), lit))
                .map_err(|e| malformed(signature, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let args = parts.formals.len();
    let profile = match entry.family {
        None => {
            if !entry.roles.is_empty() {
                return Err(invalid(signature, "roles given for an untraced operation"));
            }
            None
        }
        Some(family) => {
            if entry.roles.len() != args {
                return Err(CatalogError::RoleCount {
                    signature: signature.to_string(),
                    args,
                    roles: entry.roles.len(),
                });
            }
            let descriptions: Vec<String> = if entry.descriptions.is_empty() {
                vec![String::new(); args]
            } else if entry.descriptions.len() == args {
                entry.descriptions.iter().map(|d| d.to_string()).collect()
            } else {
                return Err(CatalogError::DescriptionCount {
                    signature: signature.to_string(),
                    args,
                    descriptions: entry.descriptions.len(),
                });
            };
            validate_roles(signature, family, entry.kernel, entry.roles)?;
            Some(TraceProfile {
                family,
                roles: entry.roles.to_vec(),
                descriptions,
            })
        }
    };

    let descriptor = Descriptor {
        signature: signature.to_string(),
        function: parts.function,
        arg_names: parts.formals,
        constant_kwargs,
        kernel: entry.kernel,
        profile,
        docstring: entry.doc.to_string(),
        positional: args,
    };
    Ok((descriptor, parts.leading))
}

fn validate_roles(
    signature: &str,
    family: Family,
    kernel: Kernel,
    roles: &[ArgRole],
) -> Result<(), CatalogError> {
    if family == Family::Other {
        return Err(invalid(signature, "traced operations need a family other than `other`"));
    }
    for (position, role) in roles.iter().enumerate() {
        match role {
            ArgRole::Other if !family.covers(kernel, position) => {
                return Err(invalid(
                    signature,
                    format!("argument {position} has no closed form in family {family}"),
                ));
            }
            ArgRole::Differentiable if !kernel.liftable() => {
                return Err(invalid(
                    signature,
                    format!("argument {position} is differentiable but {kernel:?} cannot propagate dependencies"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Choose, per descriptor, the largest positional prefix whose rendering
/// resolves back to the same descriptor.
fn assign_positional(built: &mut [(Descriptor, usize)]) -> Result<(), CatalogError> {
    let mut chosen = Vec::with_capacity(built.len());
    for (index, (descriptor, leading)) in built.iter().enumerate() {
        let siblings: Vec<(usize, &Descriptor)> = built
            .iter()
            .enumerate()
            .filter(|(_, (d, _))| d.function == descriptor.function)
            .map(|(i, (d, _))| (i, d))
            .collect();
        let positional = (0..=*leading).rev().find(|&k| {
            let call = synthetic_call(descriptor, k);
            siblings
                .iter()
                .find(|(_, candidate)| crate::resolve::matches(&call, candidate))
                .is_some_and(|(i, _)| *i == index)
        });
        match positional {
            Some(k) => chosen.push(k),
            None => {
                return Err(invalid(
                    &descriptor.signature,
                    "no call can select this signature",
                ))
            }
        }
    }
    for ((descriptor, _), k) in built.iter_mut().zip(chosen) {
        descriptor.positional = k;
    }
    Ok(())
}

fn synthetic_call(descriptor: &Descriptor, positional: usize) -> ParsedCall {
    let mut call = ParsedCall {
        target: CallTarget::Function(descriptor.function.clone()),
        args: descriptor.arg_names[..positional].to_vec(),
        kwargs: Default::default(),
    };
    for name in &descriptor.arg_names[positional..] {
        call.kwargs.insert(name.clone(), name.clone());
    }
    for (name, value) in &descriptor.constant_kwargs {
        call.kwargs.insert(name.clone(), value.to_string());
    }
    call
}

// ── Tests ───────────────────────────────────────────────────────────────────
