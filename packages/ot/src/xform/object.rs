//! Object transforms. Property operations key on the property name, never on
//! position; operations on different keys are independent.

use super::OperationPair;
use crate::ops::{
    DiscreteOperation, ObjectAddProperty, ObjectRemoveProperty, ObjectSet, ObjectSetProperty,
};

pub fn add_add(
    s: &DiscreteOperation,
    sa: &ObjectAddProperty,
    c: &DiscreteOperation,
    ca: &ObjectAddProperty,
) -> OperationPair {
    if sa.key != ca.key {
        OperationPair::new(s.clone(), c.clone())
    } else if sa.value == ca.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        // The client already added the key, so the server's write lands as a set.
        let overwrite = ObjectSetProperty { key: sa.key.clone(), value: sa.value.clone() };
        OperationPair::new(s.with_change(overwrite), c.as_no_op())
    }
}

pub fn add_set_property(
    s: &DiscreteOperation,
    sa: &ObjectAddProperty,
    c: &DiscreteOperation,
    ct: &ObjectSetProperty,
) -> OperationPair {
    if sa.key != ct.key {
        OperationPair::new(s.clone(), c.clone())
    } else if sa.value == ct.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        let overwrite = ObjectSetProperty { key: sa.key.clone(), value: sa.value.clone() };
        OperationPair::new(s.with_change(overwrite), c.as_no_op())
    }
}

pub fn add_remove_property(
    s: &DiscreteOperation,
    sa: &ObjectAddProperty,
    c: &DiscreteOperation,
    cr: &ObjectRemoveProperty,
) -> OperationPair {
    if sa.key != cr.key {
        OperationPair::new(s.clone(), c.clone())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}

pub fn add_set(
    s: &DiscreteOperation,
    _sa: &ObjectAddProperty,
    c: &DiscreteOperation,
    _cs: &ObjectSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn set_property_set_property(
    s: &DiscreteOperation,
    st: &ObjectSetProperty,
    c: &DiscreteOperation,
    ct: &ObjectSetProperty,
) -> OperationPair {
    if st.key != ct.key {
        OperationPair::new(s.clone(), c.clone())
    } else if st.value == ct.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}

pub fn set_property_remove_property(
    s: &DiscreteOperation,
    st: &ObjectSetProperty,
    c: &DiscreteOperation,
    cr: &ObjectRemoveProperty,
) -> OperationPair {
    if st.key != cr.key {
        OperationPair::new(s.clone(), c.clone())
    } else {
        // The property no longer exists once the removal has been applied.
        let recreate = ObjectAddProperty { key: st.key.clone(), value: st.value.clone() };
        OperationPair::new(s.with_change(recreate), c.as_no_op())
    }
}

pub fn set_property_set(
    s: &DiscreteOperation,
    _st: &ObjectSetProperty,
    c: &DiscreteOperation,
    _cs: &ObjectSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn remove_property_remove_property(
    s: &DiscreteOperation,
    sr: &ObjectRemoveProperty,
    c: &DiscreteOperation,
    cr: &ObjectRemoveProperty,
) -> OperationPair {
    if sr.key == cr.key {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.clone())
    }
}

pub fn remove_property_set(
    s: &DiscreteOperation,
    _sr: &ObjectRemoveProperty,
    c: &DiscreteOperation,
    _cs: &ObjectSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn set_set(
    s: &DiscreteOperation,
    ss: &ObjectSet,
    c: &DiscreteOperation,
    cs: &ObjectSet,
) -> OperationPair {
    if ss.value == cs.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Change;
    use crate::value::DataValue;

    fn set_prop(key: &str, value: DataValue) -> DiscreteOperation {
        DiscreteOperation::new("obj", ObjectSetProperty { key: key.into(), value })
    }

    fn remove_prop(key: &str) -> DiscreteOperation {
        DiscreteOperation::new("obj", ObjectRemoveProperty { key: key.into() })
    }

    fn add_prop(key: &str, value: DataValue) -> DiscreteOperation {
        DiscreteOperation::new("obj", ObjectAddProperty { key: key.into(), value })
    }

    fn tt(s: &DiscreteOperation, c: &DiscreteOperation) -> OperationPair {
        match (&s.change, &c.change) {
            (Change::ObjectSetProperty(a), Change::ObjectSetProperty(b)) => {
                set_property_set_property(s, a, c, b)
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_same_key_equal_values_both_no_op() {
        let value = DataValue::string("t1", "A");
        let pair = tt(&set_prop("title", value.clone()), &set_prop("title", value));
        assert!(pair.server.no_op);
        assert!(pair.client.no_op);
    }

    #[test]
    fn test_same_key_different_values_server_wins() {
        let s = set_prop("title", DataValue::string("t1", "A"));
        let c = set_prop("title", DataValue::string("t2", "B"));
        let pair = tt(&s, &c);
        assert_eq!(pair.server, s);
        assert!(pair.client.no_op);
    }

    #[test]
    fn test_different_keys_are_independent() {
        let s = set_prop("a", DataValue::null("n1"));
        let c = set_prop("b", DataValue::null("n2"));
        let pair = tt(&s, &c);
        assert_eq!(pair.server, s);
        assert_eq!(pair.client, c);
    }

    #[test]
    fn test_set_against_remove_becomes_add() {
        let value = DataValue::number("n", 3.0);
        let s = set_prop("k", value.clone());
        let c = remove_prop("k");
        let pair = match (&s.change, &c.change) {
            (Change::ObjectSetProperty(a), Change::ObjectRemoveProperty(b)) => {
                set_property_remove_property(&s, a, &c, b)
            }
            _ => unreachable!(),
        };
        assert_eq!(pair.server, add_prop("k", value));
        assert!(pair.client.no_op);
    }

    #[test]
    fn test_add_add_conflict_overwrites() {
        let s = add_prop("k", DataValue::boolean("b1", true));
        let c = add_prop("k", DataValue::boolean("b2", false));
        let pair = match (&s.change, &c.change) {
            (Change::ObjectAddProperty(a), Change::ObjectAddProperty(b)) => add_add(&s, a, &c, b),
            _ => unreachable!(),
        };
        assert_eq!(pair.server, set_prop("k", DataValue::boolean("b1", true)));
        assert!(pair.client.no_op);
    }
}
