//! Number transforms. Additions commute, so two concurrent adds both apply.

use super::OperationPair;
use crate::ops::{DiscreteOperation, NumberAdd, NumberSet};

pub fn add_add(
    s: &DiscreteOperation,
    _sa: &NumberAdd,
    c: &DiscreteOperation,
    _ca: &NumberAdd,
) -> OperationPair {
    OperationPair::new(s.clone(), c.clone())
}

pub fn add_set(
    s: &DiscreteOperation,
    _sa: &NumberAdd,
    c: &DiscreteOperation,
    _cs: &NumberSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn set_set(
    s: &DiscreteOperation,
    ss: &NumberSet,
    c: &DiscreteOperation,
    cs: &NumberSet,
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

    #[test]
    fn test_adds_pass_through() {
        let s = DiscreteOperation::new("n", NumberAdd { value: 2.0 });
        let c = DiscreteOperation::new("n", NumberAdd { value: -5.0 });
        let pair = add_add(&s, &NumberAdd { value: 2.0 }, &c, &NumberAdd { value: -5.0 });
        assert_eq!(pair.server, s);
        assert_eq!(pair.client, c);
    }

    #[test]
    fn test_set_discards_concurrent_add() {
        let s = DiscreteOperation::new("n", NumberAdd { value: 2.0 });
        let c = DiscreteOperation::new("n", NumberSet { value: 10.0 });
        let pair = add_set(&s, &NumberAdd { value: 2.0 }, &c, &NumberSet { value: 10.0 });
        assert!(pair.server.no_op);
        assert_eq!(pair.client, c);
    }
}
