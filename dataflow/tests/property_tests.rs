// Property-based tests for reconstruction invariants.
//
// Four categories:
// 1. Parser argument boundaries: generated calls split back into exactly
//    the positional and keyword texts they were built from
// 2. Resolution determinism: resolving one call repeatedly picks one signature
// 3. Elementwise provenance: unary elementwise operations trace diagonally
// 4. Rebind preservation: re-binding to the original inputs reproduces values
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tfdataflow::ast::CallTarget;
use tfdataflow::parser::parse;
use tfdataflow::pipeline::trace_operations;
use tfdataflow::resolve::resolve;
use tfdataflow::{rebind, value_from_text, Bindings, Catalog};

// ── Generators ──────────────────────────────────────────────────────────────

/// Argument text without top-level commas or `=`.
fn arb_leaf() -> impl Strategy<Value = String> + Clone {
    prop_oneof![
        (1u8..=4).prop_map(|i| format!("in{i}")),
        (-50i32..50).prop_map(|n| n.to_string()),
        prop::collection::vec(0i32..10, 1..=3).prop_map(|v| format!("{v:?}")),
        Just("'SAME'".to_string()),
        Just("tf.int32".to_string()),
    ]
}

fn arb_argument() -> impl Strategy<Value = String> {
    let leaf = arb_leaf();
    prop_oneof![
        3 => leaf.clone(),
        1 => (leaf.clone(), leaf.clone()).prop_map(|(a, b)| format!("tf.add({a}, {b})")),
        1 => (leaf.clone(), leaf.clone()).prop_map(|(a, b)| format!("({a}, {b})")),
        1 => (leaf.clone(), 0u8..3).prop_map(|(a, i)| format!("{a}[:, {i}]")),
        1 => (leaf.clone(), leaf).prop_map(|(a, b)| format!("tf.reduce_sum({a}, axis={b})")),
    ]
}

fn arb_call() -> impl Strategy<Value = (Vec<String>, BTreeMap<String, String>)> {
    (
        prop::collection::vec(arb_argument(), 0..=4),
        prop::collection::btree_map(
            prop_oneof![Just("axis".to_string()), Just("dtype".to_string()), Just("k2".to_string())],
            arb_argument(),
            0..=2,
        ),
    )
}

fn render(args: &[String], kwargs: &BTreeMap<String, String>) -> String {
    let mut parts: Vec<String> = args.to_vec();
    parts.extend(kwargs.iter().map(|(k, v)| format!("{k}={v}")));
    format!("tf.func({})", parts.join(", "))
}

fn bindings_from(a: &[i64], b: &[i64]) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.assign(&format!("in1={a:?}")).unwrap();
    bindings.assign(&format!("in2={b:?}")).unwrap();
    bindings
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn parser_keeps_argument_boundaries((args, kwargs) in arb_call()) {
        let text = render(&args, &kwargs);
        let call = parse(&text).map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        prop_assert_eq!(call.target, CallTarget::Function("tf.func".into()));
        prop_assert_eq!(call.args, args);
        prop_assert_eq!(call.kwargs, kwargs);
    }

    #[test]
    fn parser_ignores_padding((args, kwargs) in arb_call(), pad in "[ ]{0,3}") {
        let padded = format!("{pad}{}{pad}", render(&args, &kwargs));
        let call = parse(&padded).map_err(|e| TestCaseError::fail(format!("{padded}: {e}")))?;
        prop_assert_eq!(call.args, args);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn resolution_is_deterministic(
        text in prop_oneof![
            Just("tf.eye(in1)"),
            Just("tf.eye(in1, in2)"),
            Just("tf.eye(in1, num_columns=in2)"),
            Just("tf.eye(in1, dtype=tf.float32)"),
            Just("tf.sort(in1, axis=0, direction='DESCENDING')"),
            Just("tf.pad(in1, in2, mode='REFLECT')"),
            Just("tf.gather(in1, in2, axis=0, batch_dims=0)"),
        ],
    ) {
        let catalog = Catalog::standard();
        let call = parse(text).unwrap();
        let first = resolve(&call, catalog).unwrap().descriptor.signature.clone();
        for _ in 0..4 {
            prop_assert_eq!(&resolve(&call, catalog).unwrap().descriptor.signature, &first);
        }
    }

    #[test]
    fn unary_elementwise_is_diagonal(
        values in prop::collection::vec(-100i32..100, 1..16),
        op in prop_oneof![Just("tf.abs"), Just("tf.math.negative"), Just("tf.square"), Just("tf.sign")],
    ) {
        let mut bindings = Bindings::new();
        bindings.assign(&format!("in1={values:?}")).unwrap();
        let catalog = Catalog::standard();
        let value = value_from_text(&format!("{op}(in1)"), &bindings, catalog).unwrap();
        let traces = trace_operations(&value, catalog).unwrap();
        prop_assert_eq!(traces.len(), 1);
        let provenance = traces[0].arguments["x"].provenance.clone();
        let expected: Vec<Vec<usize>> = (0..values.len()).map(|i| vec![i]).collect();
        prop_assert_eq!(provenance, Some(expected));
    }

    #[test]
    fn rebind_with_original_inputs_preserves_value(
        pairs in prop::collection::vec((-20i64..20, -20i64..20), 1..8),
    ) {
        let (a, b): (Vec<i64>, Vec<i64>) = pairs.into_iter().unzip();
        let bindings = bindings_from(&a, &b);
        let catalog = Catalog::standard();
        let original = value_from_text(
            "tf.reduce_sum(tf.add(in1, tf.multiply(in2, 2)), axis=0)",
            &bindings,
            catalog,
        )
        .unwrap();
        let again = rebind(&original, &bindings).unwrap();
        prop_assert_eq!(again.value_string(2), original.value_string(2));
        prop_assert_eq!(again.expression(), original.expression());
    }
}
