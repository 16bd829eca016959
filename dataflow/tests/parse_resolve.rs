// Integration tests for parsing, overload resolution and execution.
//
// Expressions go through the public entry points only: text is parsed,
// resolved against the standard catalog, executed, and rendered back.

use tfdataflow::ast::{CallTarget, Primitive};
use tfdataflow::error::{Error, ParseError, ResolveError};
use tfdataflow::parser::parse;
use tfdataflow::resolve::resolve;
use tfdataflow::{value_from_text, Bindings, Catalog};

fn bindings() -> Bindings {
    let mut b = Bindings::new();
    for input in ["in1=[[1, 2], [3, 4]]", "in2=[1, 2, 3, 4]", "in3=[0, 0, 1, 1]"] {
        b.assign(input).unwrap();
    }
    b
}

fn eval(text: &str) -> String {
    value_from_text(text, &bindings(), Catalog::standard())
        .unwrap_or_else(|e| panic!("{text}: {e}"))
        .value_string(2)
}

fn eval_err(text: &str) -> Error {
    match value_from_text(text, &bindings(), Catalog::standard()) {
        Ok(v) => panic!("{text} evaluated to {}", v.value_string(2)),
        Err(e) => e,
    }
}

// ── Evaluation ──────────────────────────────────────────────────────────────

#[test]
fn expressions_evaluate() {
    let cases = [
        ("tf.reduce_sum(in1, axis=1)", "[3, 7]"),
        ("tf.reduce_sum(in1)", "10"),
        ("tf.cast(in2, tf.float32)", "[1.0, 2.0, 3.0, 4.0]"),
        ("tf.cast(tf.greater(in2, 2), tf.int32)", "[0, 0, 1, 1]"),
        ("tf.math.segment_sum(in2, in3)", "[3, 7]"),
        ("tf.transpose(in1)", "[[1, 3], [2, 4]]"),
        ("tf.reshape(in2, [2, 2])", "[[1, 2], [3, 4]]"),
        ("tf.eye(2, dtype=tf.int32)", "[[1, 0], [0, 1]]"),
        ("in1[:, 1]", "[2, 4]"),
        ("in1[1]", "[3, 4]"),
        ("in2[1:3]", "[2, 3]"),
        ("in2[:2]", "[1, 2]"),
        ("(in2[0], in2[3])", "(1, 4)"),
        ("tf.sort(in2, axis=0, direction='DESCENDING')", "[4, 3, 2, 1]"),
    ];
    for (text, expected) in cases {
        assert_eq!(eval(text), expected, "{text}");
    }
}

#[test]
fn lists_of_inputs_become_sequences() {
    let mut b = Bindings::new();
    b.assign("in1=[1, 2]").unwrap();
    b.assign("in2=[3, 4]").unwrap();
    let catalog = Catalog::standard();
    let cases = [
        ("tf.stack([in1, in2], 0)", "[[1, 2], [3, 4]]"),
        ("tf.add_n([in1, in2])", "[4, 6]"),
        ("tf.concat([in1, in2], axis=0)", "[1, 2, 3, 4]"),
        ("tf.stack([in1, tf.abs(in2)], axis=1)", "[[1, 3], [2, 4]]"),
    ];
    for (text, expected) in cases {
        let value = value_from_text(text, &b, catalog).unwrap_or_else(|e| panic!("{text}: {e}"));
        assert_eq!(value.value_string(2), expected, "{text}");
        let again = value_from_text(&value.expression(), &b, catalog).unwrap();
        assert_eq!(again.value_string(2), expected, "{text}");
    }

    // Lists of literals stay constants.
    let constant = value_from_text("tf.add_n([[1, 2], [3, 4]])", &b, catalog).unwrap();
    assert_eq!(constant.operation_count(), 1);
    assert_eq!(constant.value_string(2), "[4, 6]");
}

#[test]
fn unbound_name_inside_a_list_is_reported() {
    match eval_err("tf.stack([in1, in9], 0)") {
        Error::Unbound { name } => assert_eq!(name, "in9"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn whitespace_around_delimiters_is_insignificant() {
    assert_eq!(eval("tf.reduce_sum( in1 ,axis = 1 )"), eval("tf.reduce_sum(in1, axis=1)"));
}

#[test]
fn rendered_expressions_evaluate_identically() {
    let catalog = Catalog::standard();
    let b = bindings();
    for text in [
        "tf.reduce_sum(in1, axis=1)",
        "tf.pad(in2, [[1, 1]], mode='CONSTANT', constant_values=9)",
        "tf.argsort(in2, axis=0, direction='DESCENDING', stable=True)",
        "tf.gather(in2, in3)",
        "(in1[:, 0], tf.abs(in2))",
    ] {
        let first = value_from_text(text, &b, catalog).unwrap();
        let rendered = first.expression();
        let second = value_from_text(&rendered, &b, catalog)
            .unwrap_or_else(|e| panic!("{rendered}: {e}"));
        assert_eq!(second.expression(), rendered, "{text}");
        assert_eq!(second.value_string(2), first.value_string(2), "{text}");
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

#[test]
fn parse_shapes() {
    let call = parse("tf.func(in1, in2, in3, in4=in4)").unwrap();
    assert_eq!(call.target, CallTarget::Function("tf.func".into()));
    assert_eq!(call.args, vec!["in1", "in2", "in3"]);
    assert_eq!(call.kwargs.get("in4").map(String::as_str), Some("in4"));

    let cases = [
        ("in1[0]", Primitive::Index),
        ("in1[:, 0]", Primitive::IndexAxis1),
        ("in1[1:]", Primitive::SliceFrom),
        ("in1[:, :2]", Primitive::SliceToAxis1),
        ("(in1, in2)", Primitive::Pair),
    ];
    for (text, primitive) in cases {
        assert_eq!(parse(text).unwrap().target, CallTarget::Primitive(primitive), "{text}");
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[test]
fn syntax_errors() {
    assert!(matches!(eval_err("tf.add(in1, in2"), Error::Parse(ParseError::Unbalanced(_))));
    assert!(matches!(eval_err("tf.add(in1, in2]"), Error::Parse(_)));
    assert!(matches!(eval_err("(in1, in2, in3, in1)"), Error::Parse(_)));
}

#[test]
fn resolution_errors() {
    match eval_err("tf.frobnicate(in1)") {
        Error::Resolve(ResolveError::UnknownFunction(name)) => assert_eq!(name, "tf.frobnicate"),
        other => panic!("unexpected {other}"),
    }
    match eval_err("tf.add(in1)") {
        Error::Resolve(ResolveError::NoMatchingSignature { candidates, .. }) => {
            assert_eq!(candidates, vec!["tf.add(x, y)"]);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn unbound_names_are_reported() {
    match eval_err("tf.add(in1, in9)") {
        Error::Unbound { name } => assert_eq!(name, "in9"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn execution_errors_name_the_operation() {
    match eval_err("tf.matmul(in2, in2)") {
        Error::Exec(e) => assert_eq!(e.operation, "tf.matmul(a, b)"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn resolution_is_deterministic() {
    let catalog = Catalog::standard();
    let call = parse("tf.eye(3, num_columns=2)").unwrap();
    let first = resolve(&call, catalog).unwrap();
    for _ in 0..10 {
        let again = resolve(&call, catalog).unwrap();
        assert_eq!(again.descriptor.signature, first.descriptor.signature);
    }
    assert_eq!(first.descriptor.signature, "tf.eye(num_rows, num_columns)");
}
