use std::collections::HashMap;

use ypatch::mutate::{self, MutateError, MutationTarget, Operation};
use ypatch::value::Value;

fn mapping(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::mapping(map)
}

#[test]
fn test_set_mapping_value() {
    let mut root = mapping(vec![("name", Value::string("old"))]);
    let target_id = root.get_path(&["name".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Set(Value::string("new")),
        }],
    )
    .unwrap();

    assert_eq!(
        root.get_path(&["name".into()]).unwrap(),
        &Value::string("new")
    );
}

#[test]
fn test_set_nested_value() {
    let inner = mapping(vec![("replicas", Value::integer(1))]);
    let mut root = mapping(vec![("spec", inner)]);
    let target_id = root
        .get_path(&["spec".into(), "replicas".into()])
        .unwrap()
        .id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Set(Value::integer(5)),
        }],
    )
    .unwrap();

    assert_eq!(
        root.get_path(&["spec".into(), "replicas".into()]).unwrap(),
        &Value::integer(5)
    );
}

#[test]
fn test_set_sequence_element() {
    let mut root = mapping(vec![(
        "list",
        Value::sequence(vec![Value::string("a"), Value::string("b")]),
    )]);
    let target_id = root.get_path(&["list".into(), "1".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Set(Value::string("B")),
        }],
    )
    .unwrap();

    let items = root.get_path(&["list".into()]).unwrap();
    assert_eq!(
        items.as_sequence().unwrap(),
        &[Value::string("a"), Value::string("B")]
    );
}

#[test]
fn test_unset_mapping_key() {
    let mut root = mapping(vec![("a", Value::integer(1)), ("b", Value::integer(2))]);
    let target_id = root.get_path(&["b".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Unset,
        }],
    )
    .unwrap();

    assert!(root.get_path(&["b".into()]).is_none());
    assert!(root.get_path(&["a".into()]).is_some());
}

#[test]
fn test_unset_sequence_element() {
    let mut root = mapping(vec![(
        "list",
        Value::sequence(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("c"),
        ]),
    )]);
    let target_id = root.get_path(&["list".into(), "1".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Unset,
        }],
    )
    .unwrap();

    let items = root.get_path(&["list".into()]).unwrap();
    assert_eq!(
        items.as_sequence().unwrap(),
        &[Value::string("a"), Value::string("c")]
    );
}

#[test]
fn test_unknown_target_is_noop() {
    let mut root = mapping(vec![("a", Value::integer(1))]);
    // An id from a detached node matches nothing in the tree
    let stray = Value::string("elsewhere");

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: stray.id(),
            op: Operation::Unset,
        }],
    )
    .unwrap();

    assert_eq!(root.get_path(&["a".into()]).unwrap(), &Value::integer(1));
}

#[test]
fn test_root_set_replaces_document() {
    let mut root = mapping(vec![("a", Value::integer(1))]);
    let root_id = root.id();
    let replacement = mapping(vec![("b", Value::integer(2))]);

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: root_id,
            op: Operation::Set(replacement),
        }],
    )
    .unwrap();

    assert!(root.get_path(&["a".into()]).is_none());
    assert_eq!(root.get_path(&["b".into()]).unwrap(), &Value::integer(2));
}

#[test]
fn test_root_unset_is_an_error() {
    let mut root = mapping(vec![("a", Value::integer(1))]);
    let root_id = root.id();

    let err = mutate::apply(
        &mut root,
        &[MutationTarget {
            id: root_id,
            op: Operation::Unset,
        }],
    )
    .unwrap_err();
    assert!(matches!(err, MutateError::RootTarget));
}

#[test]
fn test_splice_expands_in_place() {
    let mut root = mapping(vec![(
        "list",
        Value::sequence(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("c"),
        ]),
    )]);
    let target_id = root.get_path(&["list".into(), "1".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Splice(vec![Value::string("x"), Value::string("y")]),
        }],
    )
    .unwrap();

    let items = root.get_path(&["list".into()]).unwrap();
    assert_eq!(
        items.as_sequence().unwrap(),
        &[
            Value::string("a"),
            Value::string("x"),
            Value::string("y"),
            Value::string("c"),
        ]
    );
}

#[test]
fn test_splice_with_empty_replacement_removes() {
    let mut root = mapping(vec![(
        "list",
        Value::sequence(vec![Value::string("a"), Value::string("b")]),
    )]);
    let target_id = root.get_path(&["list".into(), "0".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Splice(vec![]),
        }],
    )
    .unwrap();

    let items = root.get_path(&["list".into()]).unwrap();
    assert_eq!(items.as_sequence().unwrap(), &[Value::string("b")]);
}

#[test]
fn test_splice_outside_sequence_is_an_error() {
    let mut root = mapping(vec![("scalar", Value::integer(1))]);
    let target_id = root.get_path(&["scalar".into()]).unwrap().id();

    let err = mutate::apply(
        &mut root,
        &[MutationTarget {
            id: target_id,
            op: Operation::Splice(vec![Value::integer(2)]),
        }],
    )
    .unwrap_err();
    assert!(matches!(err, MutateError::SpliceOutsideSequence));
}

#[test]
fn test_multiple_targets_in_one_pass() {
    let mut root = mapping(vec![
        ("a", Value::integer(1)),
        ("b", Value::integer(2)),
        ("c", Value::integer(3)),
    ]);
    let a_id = root.get_path(&["a".into()]).unwrap().id();
    let c_id = root.get_path(&["c".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[
            MutationTarget {
                id: a_id,
                op: Operation::Set(Value::integer(10)),
            },
            MutationTarget {
                id: c_id,
                op: Operation::Unset,
            },
        ],
    )
    .unwrap();

    assert_eq!(root.get_path(&["a".into()]).unwrap(), &Value::integer(10));
    assert_eq!(root.get_path(&["b".into()]).unwrap(), &Value::integer(2));
    assert!(root.get_path(&["c".into()]).is_none());
}

#[test]
fn test_first_registration_wins_on_duplicate_targets() {
    let mut root = mapping(vec![("a", Value::integer(1))]);
    let a_id = root.get_path(&["a".into()]).unwrap().id();

    mutate::apply(
        &mut root,
        &[
            MutationTarget {
                id: a_id,
                op: Operation::Set(Value::integer(10)),
            },
            MutationTarget {
                id: a_id,
                op: Operation::Set(Value::integer(20)),
            },
        ],
    )
    .unwrap();

    assert_eq!(root.get_path(&["a".into()]).unwrap(), &Value::integer(10));
}
