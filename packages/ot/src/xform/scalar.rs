//! Boolean and date transforms. Both kinds only support whole-value `Set`.

use super::OperationPair;
use crate::ops::{BooleanSet, DateSet, DiscreteOperation};

pub fn boolean_set_set(
    s: &DiscreteOperation,
    ss: &BooleanSet,
    c: &DiscreteOperation,
    cs: &BooleanSet,
) -> OperationPair {
    if ss.value == cs.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}

pub fn date_set_set(
    s: &DiscreteOperation,
    ss: &DateSet,
    c: &DiscreteOperation,
    cs: &DateSet,
) -> OperationPair {
    if ss.value == cs.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}
