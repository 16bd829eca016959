// resolve.rs — Call resolution against the operation catalog
//
// Binds a parsed function call to exactly one catalog signature, using only
// the number of positional arguments and the set of keyword names (plus the
// values of fixed keywords such as `direction='DESCENDING'`).
//
// Preconditions: `call` targets a function (leaves and primitives are not
//   resolved here).
// Postconditions: the resolved argument list is in formal order with every
//   formal present; fixed keywords are merged into `kwargs`.
// Failure modes: unknown function names and calls no signature accepts
//   produce `ResolveError`.
// Side effects: none.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::ParsedCall;
use crate::catalog::{Catalog, Descriptor};
use crate::error::ResolveError;

/// A call bound to a catalog signature.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub descriptor: Arc<Descriptor>,
    /// Argument text in formal order.
    pub args: Vec<String>,
    /// Fixed keyword text merged with any supplied keyword text.
    pub kwargs: BTreeMap<String, String>,
}

/// Whether `candidate` accepts `call`.
///
/// The positional prefix must fit the formals and every remaining formal
/// must be given by keyword. Each keyword must name a formal or a fixed
/// keyword, and a supplied fixed keyword must equal the signature's value.
pub(crate) fn matches(call: &ParsedCall, candidate: &Descriptor) -> bool {
    let formals = &candidate.arg_names;
    let given = call.args.len();
    if given > formals.len() {
        return false;
    }
    if !formals[given..].iter().all(|f| call.kwargs.contains_key(f)) {
        return false;
    }
    call.kwargs.iter().all(|(name, text)| {
        if let Some(fixed) = candidate.constant_kwarg(name) {
            return crate::literal::parse(text).is_ok_and(|lit| lit.same_value(fixed));
        }
        formals.contains(name)
    })
}

/// Bind `call` to the first signature of its function that accepts it.
pub fn resolve(call: &ParsedCall, catalog: &Catalog) -> Result<ResolvedCall, ResolveError> {
    let function = call.function_name().unwrap_or_default();
    let candidates = catalog.candidates(function);
    if candidates.is_empty() {
        return Err(ResolveError::UnknownFunction(function.to_string()));
    }

    let Some(descriptor) = candidates.iter().find(|d| matches(call, d)) else {
        tracing::debug!(%call, candidates = candidates.len(), "no signature accepts call");
        return Err(ResolveError::NoMatchingSignature {
            function: function.to_string(),
            call: call.to_string(),
            candidates: candidates.iter().map(|d| d.signature.clone()).collect(),
        });
    };

    let mut args = call.args.clone();
    let mut kwargs = call.kwargs.clone();
    for formal in &descriptor.arg_names[args.len()..] {
        if let Some(text) = kwargs.remove(formal) {
            args.push(text);
        }
    }
    for (name, value) in &descriptor.constant_kwargs {
        kwargs
            .entry(name.clone())
            .or_insert_with(|| value.to_string());
    }
    tracing::trace!(signature = %descriptor.signature, "resolved call");

    Ok(ResolvedCall {
        descriptor: Arc::clone(descriptor),
        args,
        kwargs,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve_ok(text: &str) -> ResolvedCall {
        let call = parse(text).unwrap_or_else(|e| panic!("parse failed for `{text}`: {e}"));
        resolve(&call, Catalog::standard())
            .unwrap_or_else(|e| panic!("resolve failed for `{text}`: {e}"))
    }

    fn resolve_err(text: &str) -> ResolveError {
        let call = parse(text).unwrap();
        resolve(&call, Catalog::standard()).expect_err("expected resolution failure")
    }

    #[test]
    fn arity_selects_overload() {
        let one = resolve_ok("tf.reduce_sum(in1)");
        assert_eq!(one.descriptor.signature, "tf.reduce_sum(input_tensor)");
        let two = resolve_ok("tf.reduce_sum(in1, 0)");
        assert_eq!(two.descriptor.signature, "tf.reduce_sum(input_tensor, axis)");
    }

    #[test]
    fn keyword_promotes_to_positional() {
        let r = resolve_ok("tf.reduce_sum(in1, axis=1)");
        assert_eq!(r.descriptor.signature, "tf.reduce_sum(input_tensor, axis)");
        assert_eq!(r.args, vec!["in1".to_string(), "1".to_string()]);
        assert!(r.kwargs.is_empty());
    }

    #[test]
    fn keyword_name_separates_overloads() {
        let r = resolve_ok("tf.eye(3, dtype=tf.int32)");
        assert_eq!(r.descriptor.signature, "tf.eye(num_rows, dtype)");
        let r = resolve_ok("tf.eye(3, 4)");
        assert_eq!(r.descriptor.signature, "tf.eye(num_rows, num_columns)");
    }

    #[test]
    fn fixed_keyword_value_selects_overload() {
        let r = resolve_ok("tf.sort(in1, 0, direction='DESCENDING')");
        assert_eq!(
            r.descriptor.signature,
            "tf.sort(values, axis, direction='DESCENDING')"
        );
        assert_eq!(r.kwargs["direction"], "'DESCENDING'");
        let r = resolve_ok("tf.pad(in1, [[1, 1]], mode='REFLECT')");
        assert_eq!(r.descriptor.signature, "tf.pad(tensor, paddings, mode='REFLECT')");
    }

    #[test]
    fn fixed_keywords_are_merged_when_omitted() {
        let r = resolve_ok("tf.argsort(in1, 0)");
        assert_eq!(r.descriptor.signature, "tf.argsort(values, axis, stable=True)");
        assert_eq!(r.kwargs["stable"], "True");
    }

    #[test]
    fn constant_values_after_mode() {
        let r = resolve_ok("tf.pad(in1, [[1, 1]], mode='CONSTANT', constant_values=2)");
        assert_eq!(
            r.descriptor.signature,
            "tf.pad(tensor, paddings, mode='CONSTANT', constant_values)"
        );
        assert_eq!(r.args.len(), 3);
        assert_eq!(r.args[2], "2");
    }

    #[test]
    fn unknown_function() {
        assert_eq!(
            resolve_err("tf.foo(in1)"),
            ResolveError::UnknownFunction("tf.foo".to_string())
        );
    }

    #[test]
    fn no_matching_signature_lists_candidates() {
        match resolve_err("tf.reduce_sum(in1, 0, 1)") {
            ResolveError::NoMatchingSignature { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            resolve_err("tf.sort(in1, 0, direction='UP')"),
            ResolveError::NoMatchingSignature { .. }
        ));
    }

    #[test]
    fn keyword_may_repeat_a_positional_formal() {
        let r = resolve_ok("tf.reduce_sum(in1, input_tensor=in1)");
        assert_eq!(r.descriptor.signature, "tf.reduce_sum(input_tensor)");
        assert_eq!(r.args, vec!["in1"]);
        assert!(matches!(
            resolve_err("tf.reduce_sum(in1, keepdims=True)"),
            ResolveError::NoMatchingSignature { .. }
        ));
    }

    #[test]
    fn every_rendering_resolves_to_its_descriptor() {
        let catalog = Catalog::standard();
        for d in catalog.all_descriptors() {
            let args: Vec<String> = (0..d.num_args()).map(|i| format!("in{}", i + 1)).collect();
            let text = d.render(&args);
            let r = resolve_ok(&text);
            assert_eq!(r.descriptor.signature, d.signature, "{text}");
            assert_eq!(r.args, args, "{text}");
        }
    }
}
