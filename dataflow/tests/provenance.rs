// Provenance tables per operation family.
//
// Each case binds named inputs, reconstructs an expression over them, and
// checks the per-argument provenance of its outermost operation. Families
// are checked across every catalog operation that belongs to them.

use std::collections::BTreeMap;

use tfdataflow::catalog::{ArgRole, Family};
use tfdataflow::pipeline::trace_operations;
use tfdataflow::{value_from_text, Bindings, Catalog};

type Table = BTreeMap<String, Option<Vec<Vec<usize>>>>;

// ── Test helpers ────────────────────────────────────────────────────────────

fn provenance(expression: &str, inputs: &[(&str, &str)]) -> Table {
    let mut bindings = Bindings::new();
    for (name, literal) in inputs {
        bindings
            .assign(&format!("{name}={literal}"))
            .unwrap_or_else(|e| panic!("bad input {name}: {e}"));
    }
    let catalog = Catalog::standard();
    let value = value_from_text(expression, &bindings, catalog)
        .unwrap_or_else(|e| panic!("{expression}: {e}"));
    let mut traces = trace_operations(&value, catalog).unwrap_or_else(|e| panic!("{expression}: {e}"));
    let outer = traces.pop().unwrap_or_else(|| panic!("{expression}: nothing traced"));
    outer
        .arguments
        .into_iter()
        .map(|(name, result)| (name, result.provenance))
        .collect()
}

fn table(entries: &[(&str, Option<Vec<Vec<usize>>>)]) -> Table {
    entries
        .iter()
        .map(|(name, p)| (name.to_string(), p.clone()))
        .collect()
}

fn singletons(n: usize) -> Vec<Vec<usize>> {
    (0..n).map(|i| vec![i]).collect()
}

/// Function names of catalog operations matching `pred`.
fn functions_where(pred: impl Fn(Family, &[ArgRole]) -> bool) -> Vec<String> {
    let mut names: Vec<String> = Catalog::standard()
        .all_descriptors()
        .iter()
        .filter(|d| d.profile.as_ref().is_some_and(|p| pred(p.family, p.roles.as_slice())))
        .map(|d| d.function.clone())
        .collect();
    names.dedup();
    names
}

// ── Unary elementwise ───────────────────────────────────────────────────────

#[test]
fn unary_elementwise_is_diagonal() {
    let ops = functions_where(|_, roles| roles == [ArgRole::Elementwise]);
    assert!(ops.len() >= 10, "only {ops:?}");
    let cases = [
        ("[1.0, 2.0]", 2),
        ("[[1.0, 2.0], [3.0, 4.0]]", 4),
        ("[[[1.0, 2.0], [3.0, 4.0]], [[1.0, 2.0], [3.0, 4.0]]]", 8),
    ];
    for op in &ops {
        for (input, n) in cases {
            let got = provenance(&format!("{op}(in1)"), &[("in1", input)]);
            assert_eq!(got.len(), 1, "{op}");
            let only = got.values().next().cloned().flatten();
            assert_eq!(only, Some(singletons(n)), "{op} on {input}");
        }
    }
}

#[test]
fn unary_elementwise_on_a_scalar() {
    let got = provenance("tf.abs(in1)", &[("in1", "0.0")]);
    assert_eq!(got, table(&[("x", Some(vec![vec![0]]))]));
}

// ── Broadcast ───────────────────────────────────────────────────────────────

#[test]
fn broadcast_family_follows_broadcasting() {
    let ops = functions_where(|family, _| family == Family::Broadcast);
    assert!(ops.contains(&"tf.add".to_string()));
    let in1 = "[[1.0, 1.0, 1.0, 1.0], [1.0, 1.0, 1.0, 1.0], [1.0, 1.0, 1.0, 1.0]]";
    let in2 = "[[1.0], [2.0], [4.0]]";
    let expected = table(&[
        ("x", Some(singletons(12))),
        (
            "y",
            Some(vec![
                vec![0], vec![0], vec![0], vec![0],
                vec![1], vec![1], vec![1], vec![1],
                vec![2], vec![2], vec![2], vec![2],
            ]),
        ),
    ]);
    for op in &ops {
        let got = provenance(&format!("{op}(in1, in2)"), &[("in1", in1), ("in2", in2)]);
        assert_eq!(got, expected, "{op}");
    }
}

// ── Along axis ──────────────────────────────────────────────────────────────

const CUBE: &str = "[[[5, 6, 8], [3, 1, 5]], [[7, 9, 1], [5, 2, 1]]]";

#[test]
fn along_axis_folds_the_reduced_axis() {
    let ops = functions_where(|family, _| family == Family::AlongAxis);
    assert!(ops.len() >= 7, "only {ops:?}");
    let cases: [(&str, &str, Vec<Vec<usize>>); 4] = [
        ("[3, 1, 2]", "0", vec![vec![0, 1, 2]]),
        (CUBE, "0", vec![vec![0, 6], vec![1, 7], vec![2, 8], vec![3, 9], vec![4, 10], vec![5, 11]]),
        (CUBE, "1", vec![vec![0, 3], vec![1, 4], vec![2, 5], vec![6, 9], vec![7, 10], vec![8, 11]]),
        (CUBE, "2", vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9, 10, 11]]),
    ];
    for op in &ops {
        for (input, axis, expected) in &cases {
            let got = provenance(&format!("{op}(in1, {axis})"), &[("in1", input)]);
            let data = got
                .iter()
                .find(|(name, _)| name.as_str() != "axis")
                .and_then(|(_, p)| p.clone());
            assert_eq!(data.as_ref(), Some(expected), "{op} axis {axis}");
            assert_eq!(got["axis"], None, "{op}: axis is value-wise");
        }
    }
}

// ── Segments ────────────────────────────────────────────────────────────────

fn sorted_segment_ops() -> Vec<String> {
    functions_where(|family, roles| family == Family::AlongSegment && roles.len() == 2)
}

fn unsorted_segment_ops() -> Vec<String> {
    functions_where(|family, roles| family == Family::AlongSegment && roles.len() == 3)
}

#[test]
fn sorted_segments_on_a_vector() {
    let ops = sorted_segment_ops();
    assert_eq!(ops.len(), 5);
    let expected = table(&[
        ("data", Some(vec![vec![0, 1], vec![], vec![2]])),
        ("segment_ids", Some(vec![vec![0, 1], vec![], vec![2]])),
    ]);
    for op in &ops {
        let got = provenance(&format!("{op}(in1, in2)"), &[("in1", "[1, 2, 3]"), ("in2", "[0, 0, 2]")]);
        assert_eq!(got, expected, "{op}");
    }
}

#[test]
fn sorted_segments_on_rows() {
    let expected = table(&[
        (
            "data",
            Some(vec![
                vec![0, 4], vec![1, 5], vec![2, 6], vec![3, 7],
                vec![], vec![], vec![], vec![],
                vec![8], vec![9], vec![10], vec![11],
            ]),
        ),
        (
            "segment_ids",
            Some(vec![
                vec![0, 1], vec![0, 1], vec![0, 1], vec![0, 1],
                vec![], vec![], vec![], vec![],
                vec![2], vec![2], vec![2], vec![2],
            ]),
        ),
    ]);
    for data in ["[[1, 2, 3, 4], [4, 3, 2, 1], [5, 6, 7, 8]]", "[[[1, 2, 3, 4]], [[4, 3, 2, 1]], [[5, 6, 7, 8]]]"] {
        for op in &sorted_segment_ops() {
            let got = provenance(&format!("{op}(in1, in2)"), &[("in1", data), ("in2", "[0, 0, 2]")]);
            assert_eq!(got, expected, "{op} on {data}");
        }
    }
}

#[test]
fn unsorted_segments() {
    let ops = unsorted_segment_ops();
    assert_eq!(ops.len(), 5);
    for op in &ops {
        let got = provenance(&format!("{op}(in1, in2, 2)"), &[("in1", "[1, 2, 3]"), ("in2", "[0, 1, 0]")]);
        assert_eq!(
            got,
            table(&[
                ("data", Some(vec![vec![0, 2], vec![1]])),
                ("num_segments", None),
                ("segment_ids", Some(vec![vec![0, 2], vec![1]])),
            ]),
            "{op}"
        );

        let got = provenance(
            &format!("{op}(in1, in2, 2)"),
            &[("in1", "[[1, 2, 3, 4], [5, 6, 7, 8], [4, 3, 2, 1]]"), ("in2", "[0, 1, 0]")],
        );
        assert_eq!(
            got["data"],
            Some(vec![vec![0, 8], vec![1, 9], vec![2, 10], vec![3, 11], vec![4], vec![5], vec![6], vec![7]]),
            "{op}"
        );
        assert_eq!(
            got["segment_ids"],
            Some(vec![vec![0, 2], vec![0, 2], vec![0, 2], vec![0, 2], vec![1], vec![1], vec![1], vec![1]]),
            "{op}"
        );
    }
}

#[test]
fn unsorted_segments_beyond_the_ids() {
    let got = provenance(
        "tf.math.unsorted_segment_sum(in1, in2, 5)",
        &[("in1", "[2, 1, 1, 1]"), ("in2", "[0, 0, 0, 0]")],
    );
    let expected = Some(vec![vec![0, 1, 2, 3], vec![], vec![], vec![], vec![]]);
    assert_eq!(got["data"], expected);
    assert_eq!(got["segment_ids"], expected);
}

// ── Stack-like ──────────────────────────────────────────────────────────────

#[test]
fn stack_interleaves_along_the_new_axis() {
    let got = provenance("tf.stack(in1, 0)", &[("in1", "[1, 2]")]);
    assert_eq!(got["values"], Some(vec![vec![0], vec![1]]));

    let got = provenance("tf.stack(in1, 1)", &[("in1", "[[1, 1], [2, 2]]")]);
    assert_eq!(got["values"], Some(vec![vec![0], vec![2], vec![1], vec![3]]));
    assert_eq!(got["axis"], None);

    let got = provenance("tf.stack(in1, axis=1)", &[("in1", "[[[1], [2], [3]], [[1], [2], [3]]]")]);
    assert_eq!(got["values"], Some(vec![vec![0], vec![3], vec![1], vec![4], vec![2], vec![5]]));
}

#[test]
fn concat_offsets_follow_the_items() {
    let got = provenance("tf.concat(in1, 0)", &[("in1", "[[1, 1], [2, 2]]")]);
    assert_eq!(got["values"], Some(singletons(4)));

    let got = provenance("tf.concat(in1, 1)", &[("in1", "[[[1], [2], [3]], [[1], [2], [3]]]")]);
    assert_eq!(got["values"], Some(vec![vec![0], vec![3], vec![1], vec![4], vec![2], vec![5]]));

    let got = provenance(
        "tf.concat(in1, 1)",
        &[("in1", "[[[1, 2], [10, 20]], [[3, 4, 5], [30, 40, 50]]]")],
    );
    assert_eq!(
        got["values"],
        Some(vec![vec![0], vec![1], vec![4], vec![5], vec![6], vec![2], vec![3], vec![7], vec![8], vec![9]])
    );
}

#[test]
fn add_n_sums_across_items() {
    let got = provenance("tf.add_n(in1)", &[("in1", "[1, 3, 1]")]);
    assert_eq!(got["inputs"], Some(vec![vec![0, 1, 2]]));

    let got = provenance("tf.add_n(in1)", &[("in1", "[[3, 5], [1, 6], [3, 5]]")]);
    assert_eq!(got["inputs"], Some(vec![vec![0, 2, 4], vec![1, 3, 5]]));

    let got = provenance("tf.add_n(in1)", &[("in1", "[[[3, 5], [4, 8]], [[1, 6], [2, 9]], [[3, 5], [4, 8]]]")]);
    assert_eq!(
        got["inputs"],
        Some(vec![vec![0, 4, 8], vec![1, 5, 9], vec![2, 6, 10], vec![3, 7, 11]])
    );
}

#[test]
fn stack_of_listed_inputs() {
    let inputs = [("in1", "[1, 2]"), ("in2", "[3, 4]")];
    let got = provenance("tf.stack([in1, in2], 0)", &inputs);
    assert_eq!(got["values"], Some(singletons(4)));
    let got = provenance("tf.stack([in1, in2], axis=1)", &inputs);
    assert_eq!(got["values"], Some(vec![vec![0], vec![2], vec![1], vec![3]]));
}

// ── Argsort ─────────────────────────────────────────────────────────────────

#[test]
fn argsort_follows_the_sorted_order() {
    let got = provenance("tf.argsort(in1, axis=0, stable=True)", &[("in1", "[3, 1, 2]")]);
    assert_eq!(got, table(&[("values", Some(vec![vec![1], vec![2], vec![0]])), ("axis", None)]));

    let got = provenance(
        "tf.argsort(in1, axis=0, direction='DESCENDING', stable=True)",
        &[("in1", "[3, 1, 2]")],
    );
    assert_eq!(got["values"], Some(vec![vec![0], vec![2], vec![1]]));
}

#[test]
fn argsort_sorts_each_lane() {
    let inputs = [("in1", "[[3, 1, 2], [0, 5, 4]]")];
    let rows = provenance("tf.argsort(in1, axis=1, stable=True)", &inputs);
    assert_eq!(rows["values"], Some(vec![vec![1], vec![2], vec![0], vec![3], vec![5], vec![4]]));

    let columns = provenance("tf.argsort(in1, axis=0, stable=True)", &inputs);
    assert_eq!(columns["values"], Some(vec![vec![3], vec![1], vec![2], vec![0], vec![4], vec![5]]));

    let descending = provenance(
        "tf.argsort(in1, axis=-1, direction='DESCENDING', stable=True)",
        &inputs,
    );
    assert_eq!(descending["values"], Some(vec![vec![0], vec![2], vec![1], vec![4], vec![5], vec![3]]));
}

// ── Condition ───────────────────────────────────────────────────────────────

#[test]
fn boolean_mask_keeps_selected_rows() {
    let got = provenance(
        "tf.boolean_mask(in1, in2)",
        &[("in1", "[[1, 2], [3, 4], [5, 6]]"), ("in2", "[True, False, True]")],
    );
    assert_eq!(
        got,
        table(&[
            ("tensor", Some(vec![vec![0], vec![1], vec![4], vec![5]])),
            ("mask", Some(vec![vec![0], vec![0], vec![2], vec![2]])),
        ])
    );

    let got = provenance(
        "tf.boolean_mask(in1, in2)",
        &[("in1", "[[1, 2], [3, 4]]"), ("in2", "[[True, False], [False, True]]")],
    );
    assert_eq!(got["tensor"], Some(vec![vec![0], vec![3]]));
    assert_eq!(got["mask"], Some(vec![vec![0], vec![3]]));
}

#[test]
fn matmul_ignores_zero_partners() {
    let got = provenance("tf.matmul(in1, in1)", &[("in1", "[[1, 0], [0, 1]]")]);
    assert_eq!(got["a"], Some(singletons(4)));
    assert_eq!(got["b"], Some(singletons(4)));

    let got = provenance("tf.matmul(in1, in2)", &[("in1", "[[1, 2], [3, 4]]"), ("in2", "[[1, 1], [1, 1]]")]);
    assert_eq!(got["a"], Some(vec![vec![0, 1], vec![0, 1], vec![2, 3], vec![2, 3]]));
}

#[test]
fn where_without_branches_lists_true_positions() {
    let got = provenance("tf.where(in1)", &[("in1", "[True, False, True]")]);
    assert_eq!(got["condition"], Some(vec![vec![0], vec![2]]));

    let got = provenance("tf.where(in1)", &[("in1", "[[[True, False, True], [False, True, True]]]")]);
    assert_eq!(
        got["condition"],
        Some(vec![
            vec![0], vec![0], vec![0], vec![2], vec![2], vec![2],
            vec![4], vec![4], vec![4], vec![5], vec![5], vec![5],
        ])
    );
}

#[test]
fn where_with_branches_picks_per_element() {
    let got = provenance(
        "tf.where(in1, in2, in3)",
        &[("in1", "[True, False, True]"), ("in2", "[1, 1, 1]"), ("in3", "[2, 2, 2]")],
    );
    assert_eq!(
        got,
        table(&[
            ("condition", Some(singletons(3))),
            ("x", Some(vec![vec![0], vec![], vec![2]])),
            ("y", Some(vec![vec![], vec![1], vec![]])),
        ])
    );

    let got = provenance(
        "tf.where(in1, in2, in3)",
        &[
            ("in1", "[[[True, False, True], [False, True, True]]]"),
            ("in2", "[[[1, 1, 1], [1, 1, 1]]]"),
            ("in3", "[[[2, 2, 2], [2, 2, 2]]]"),
        ],
    );
    assert_eq!(got["condition"], Some(singletons(6)));
    assert_eq!(got["x"], Some(vec![vec![0], vec![], vec![2], vec![], vec![4], vec![5]]));
    assert_eq!(got["y"], Some(vec![vec![], vec![1], vec![], vec![3], vec![], vec![]]));
}

// ── Gather ──────────────────────────────────────────────────────────────────

#[test]
fn gather_indices_never_mix_rows() {
    let got = provenance(
        "tf.gather(in1, in2)",
        &[("in1", "[[1, 2, 3], [4, 5, 6], [7, 8, 9]]"), ("in2", "[2, 1, 0]")],
    );
    let indices = got["indices"].clone().unwrap();
    assert_eq!(indices.len(), 9);
    for (row, block) in indices.chunks(3).enumerate() {
        assert!(block.iter().all(|deps| deps == &vec![row]), "row {row}: {block:?}");
    }
    assert_eq!(got["params"].as_ref().unwrap()[0], vec![6]);
}

// ── Untraced ────────────────────────────────────────────────────────────────

#[test]
fn untraced_operations_are_skipped() {
    let catalog = Catalog::standard();
    let mut bindings = Bindings::new();
    bindings.assign("in1=[0, 1, 1]").unwrap();
    let value = value_from_text("tf.math.bincount(in1)", &bindings, catalog).unwrap();
    assert!(trace_operations(&value, catalog).unwrap().is_empty());
}
