//! Property tests for the transform dispatcher.
//!
//! Convergence of applied results is covered against the document tree in
//! the model package; these check dispatcher-level guarantees only.

use coedit_ot::{
    registration, transform, ArrayInsert, ArrayMove, ArrayRemove, ArrayReplace, ArraySet,
    DataValue, NumberAdd, NumberSet, ObjectAddProperty, ObjectRemoveProperty, ObjectSet,
    ObjectSetProperty, Operation, OperationKind, Registration, StringInsert, StringRemove,
    StringSet, Unrelated,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn string_op() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (0usize..8, "[a-c]{1,3}")
            .prop_map(|(index, value)| Operation::discrete("s", StringInsert { index, value })),
        (0usize..8, 1usize..4)
            .prop_map(|(index, length)| Operation::discrete("s", StringRemove { index, length })),
        "[x-z]{0,3}".prop_map(|value| Operation::discrete("s", StringSet { value })),
    ]
}

fn array_op() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (0usize..6, 0u32..1000).prop_map(|(index, n)| Operation::discrete(
            "a",
            ArrayInsert { index, value: DataValue::null(format!("i{n}")) }
        )),
        (0usize..6).prop_map(|index| Operation::discrete("a", ArrayRemove { index })),
        (0usize..6, 0u32..1000).prop_map(|(index, n)| Operation::discrete(
            "a",
            ArrayReplace { index, value: DataValue::null(format!("r{n}")) }
        )),
        (0usize..6, 0usize..6).prop_map(|(from_index, to_index)| Operation::discrete(
            "a",
            ArrayMove { from_index, to_index }
        )),
        Just(Operation::discrete("a", ArraySet { value: vec![] })),
    ]
}

fn object_op() -> impl Strategy<Value = Operation> {
    let key = || prop::sample::select(vec!["a", "b"]).prop_map(String::from);
    prop_oneof![
        (key(), 0u32..1000).prop_map(|(key, n)| Operation::discrete(
            "o",
            ObjectAddProperty { key, value: DataValue::null(format!("p{n}")) }
        )),
        (key(), 0u32..1000).prop_map(|(key, n)| Operation::discrete(
            "o",
            ObjectSetProperty { key, value: DataValue::null(format!("p{n}")) }
        )),
        key().prop_map(|key| Operation::discrete("o", ObjectRemoveProperty { key })),
        Just(Operation::discrete("o", ObjectSet { value: BTreeMap::new() })),
    ]
}

fn number_op() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (-5i32..5).prop_map(|v| Operation::discrete("n", NumberAdd { value: v as f64 })),
        (-5i32..5).prop_map(|v| Operation::discrete("n", NumberSet { value: v as f64 })),
    ]
}

fn same_kind_pair() -> impl Strategy<Value = (Operation, Operation)> {
    prop_oneof![
        (string_op(), string_op()),
        (array_op(), array_op()),
        (object_op(), object_op()),
        (number_op(), number_op()),
    ]
}

/// Mixed pairs on one node whose transform is computed through the swapped
/// registration.
fn inverse_pair() -> impl Strategy<Value = (Operation, Operation)> {
    prop_oneof![
        (string_op(), string_op()),
        (array_op(), array_op()),
        (object_op(), object_op()),
    ]
    .prop_filter("inverse registration", |(s, c)| {
        registration(kind_of(s), kind_of(c)) == Some(Registration::Inverse)
    })
}

fn kind_of(op: &Operation) -> OperationKind {
    op.discrete_ops()[0].kind()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn same_node_pairs_always_dispatch((s, c) in same_kind_pair()) {
        prop_assert!(registration(kind_of(&s), kind_of(&c)).is_some());
        prop_assert!(transform(&s, &c, &Unrelated).is_ok());
    }

    #[test]
    fn no_op_client_leaves_server_untouched((s, c) in same_kind_pair()) {
        let pair = transform(&s, &c.as_no_op(), &Unrelated).unwrap();
        prop_assert_eq!(pair.server, s);
        prop_assert!(pair.client.is_no_op());
    }

    #[test]
    fn transformed_ops_keep_their_target((s, c) in same_kind_pair()) {
        let pair = transform(&s, &c, &Unrelated).unwrap();
        prop_assert_eq!(&pair.server.discrete_ops()[0].id, &s.discrete_ops()[0].id);
        prop_assert_eq!(&pair.client.discrete_ops()[0].id, &c.discrete_ops()[0].id);
    }

    #[test]
    fn inverse_pairs_mirror_their_direct_registration((s, c) in inverse_pair()) {
        prop_assert_eq!(registration(kind_of(&c), kind_of(&s)), Some(Registration::Direct));

        let inverse = transform(&s, &c, &Unrelated).unwrap();
        let direct = transform(&c, &s, &Unrelated).unwrap();
        prop_assert_eq!(inverse, direct.swap());
    }

    #[test]
    fn compound_server_equals_sequential_transform(
        first in string_op(),
        second in string_op(),
        client in string_op(),
    ) {
        let compound = Operation::compound(vec![first.clone(), second.clone()]);
        let whole = transform(&compound, &client, &Unrelated).unwrap();

        let step1 = transform(&first, &client, &Unrelated).unwrap();
        let step2 = transform(&second, &step1.client, &Unrelated).unwrap();

        prop_assert_eq!(whole.server, Operation::compound(vec![step1.server, step2.server]));
        prop_assert_eq!(whole.client, step2.client);
    }
}

#[test]
fn test_set_set_is_always_direct() {
    for kind in OperationKind::ALL.into_iter().filter(|k| k.is_value_set()) {
        assert_eq!(registration(kind, kind), Some(Registration::Direct));
    }
}

fn sample(kind: OperationKind) -> Option<Operation> {
    let value = || DataValue::null("v");
    let op = match kind {
        OperationKind::StringInsert => Operation::discrete("n", StringInsert { index: 1, value: "ab".into() }),
        OperationKind::StringRemove => Operation::discrete("n", StringRemove { index: 0, length: 2 }),
        OperationKind::StringSet => Operation::discrete("n", StringSet { value: "z".into() }),
        OperationKind::ArrayInsert => Operation::discrete("n", ArrayInsert { index: 1, value: value() }),
        OperationKind::ArrayRemove => Operation::discrete("n", ArrayRemove { index: 1 }),
        OperationKind::ArrayReplace => Operation::discrete("n", ArrayReplace { index: 1, value: value() }),
        OperationKind::ArrayMove => Operation::discrete("n", ArrayMove { from_index: 1, to_index: 3 }),
        OperationKind::ArraySet => Operation::discrete("n", ArraySet { value: vec![value()] }),
        OperationKind::ObjectAddProperty => {
            Operation::discrete("n", ObjectAddProperty { key: "k".into(), value: value() })
        }
        OperationKind::ObjectSetProperty => {
            Operation::discrete("n", ObjectSetProperty { key: "k".into(), value: value() })
        }
        OperationKind::ObjectRemoveProperty => {
            Operation::discrete("n", ObjectRemoveProperty { key: "k".into() })
        }
        OperationKind::ObjectSet => Operation::discrete("n", ObjectSet { value: BTreeMap::new() }),
        _ => return None,
    };
    Some(op)
}

#[test]
fn test_every_inverse_registration_mirrors_its_direct_one() {
    let mut checked = 0;
    for s_kind in OperationKind::ALL {
        for c_kind in OperationKind::ALL {
            if registration(s_kind, c_kind) != Some(Registration::Inverse) {
                continue;
            }
            let (Some(s), Some(c)) = (sample(s_kind), sample(c_kind)) else {
                continue;
            };
            let inverse = transform(&s, &c, &Unrelated).unwrap();
            let direct = transform(&c, &s, &Unrelated).unwrap();
            assert_eq!(inverse, direct.swap(), "{s_kind:?} against {c_kind:?}");
            checked += 1;
        }
    }
    assert!(checked > 0);
}
