//! String transforms.
//!
//! Offsets count Unicode scalar values (`char`s), matching how the document
//! tree indexes string nodes.

use super::OperationPair;
use crate::ops::{DiscreteOperation, StringInsert, StringRemove, StringSet};

fn char_len(value: &str) -> usize {
    value.chars().count()
}

pub fn insert_insert(
    s: &DiscreteOperation,
    si: &StringInsert,
    c: &DiscreteOperation,
    ci: &StringInsert,
) -> OperationPair {
    if si.index <= ci.index {
        // Server wins the tie: the client insert lands after the server text.
        let shifted = StringInsert { index: ci.index.saturating_add(char_len(&si.value)), value: ci.value.clone() };
        OperationPair::new(s.clone(), c.with_change(shifted))
    } else {
        let shifted = StringInsert { index: si.index.saturating_add(char_len(&ci.value)), value: si.value.clone() };
        OperationPair::new(s.with_change(shifted), c.clone())
    }
}

pub fn insert_remove(
    s: &DiscreteOperation,
    si: &StringInsert,
    c: &DiscreteOperation,
    cr: &StringRemove,
) -> OperationPair {
    let remove_end = cr.index.saturating_add(cr.length);
    let inserted = char_len(&si.value);

    if si.index <= cr.index {
        let shifted = StringRemove { index: cr.index.saturating_add(inserted), length: cr.length };
        OperationPair::new(s.clone(), c.with_change(shifted))
    } else if si.index >= remove_end {
        let shifted = StringInsert { index: si.index - cr.length, value: si.value.clone() };
        OperationPair::new(s.with_change(shifted), c.clone())
    } else {
        // The insert lands inside the removed span: the removal swallows it.
        let widened = StringRemove { index: cr.index, length: cr.length.saturating_add(inserted) };
        OperationPair::new(s.as_no_op(), c.with_change(widened))
    }
}

pub fn insert_set(
    s: &DiscreteOperation,
    _si: &StringInsert,
    c: &DiscreteOperation,
    _cs: &StringSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn remove_remove(
    s: &DiscreteOperation,
    sr: &StringRemove,
    c: &DiscreteOperation,
    cr: &StringRemove,
) -> OperationPair {
    let s_end = sr.index.saturating_add(sr.length);
    let c_end = cr.index.saturating_add(cr.length);
    let overlap = s_end.min(c_end).saturating_sub(sr.index.max(cr.index));

    // Portion of the other removal that sits strictly before this one's start.
    let c_before_s = c_end.min(sr.index).saturating_sub(cr.index);
    let s_before_c = s_end.min(cr.index).saturating_sub(sr.index);

    let s_xf = StringRemove { index: sr.index - c_before_s, length: sr.length - overlap };
    let c_xf = StringRemove { index: cr.index - s_before_c, length: cr.length - overlap };

    OperationPair::new(shrunk(s, s_xf), shrunk(c, c_xf))
}

fn shrunk(op: &DiscreteOperation, remove: StringRemove) -> DiscreteOperation {
    if remove.length == 0 {
        op.with_change(remove).as_no_op()
    } else {
        op.with_change(remove)
    }
}

pub fn remove_set(
    s: &DiscreteOperation,
    _sr: &StringRemove,
    c: &DiscreteOperation,
    _cs: &StringSet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn set_set(
    s: &DiscreteOperation,
    ss: &StringSet,
    c: &DiscreteOperation,
    cs: &StringSet,
) -> OperationPair {
    if ss.value == cs.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}
