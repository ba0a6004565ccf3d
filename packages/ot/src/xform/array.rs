//! Array transforms.
//!
//! ## Moves
//!
//! A move takes the element at `from_index` out of the array and reinserts it
//! so that it ends up at `to_index`. The move transforms work in "gap"
//! coordinates: each moved or inserted element is described by the gap it
//! occupies in the array with every concurrently displaced element taken
//! out. Both sides agree on the final order of the displaced elements, and
//! the transformed indices are read back from that order.
//!
//! Gap ties do not depend on the move's
//! [`MoveDirection`](crate::index::MoveDirection), so the same pair always
//! resolves the same way whichever side computes it: inserts keep their
//! original side of the moved element, and for two moves the server's element
//! goes first.

use super::OperationPair;
use crate::index::reorder_index;
use crate::ops::{
    ArrayInsert, ArrayMove, ArrayRemove, ArrayReplace, ArraySet, DiscreteOperation,
};

pub fn insert_insert(
    s: &DiscreteOperation,
    si: &ArrayInsert,
    c: &DiscreteOperation,
    ci: &ArrayInsert,
) -> OperationPair {
    if si.index <= ci.index {
        let shifted = ArrayInsert { index: ci.index + 1, value: ci.value.clone() };
        OperationPair::new(s.clone(), c.with_change(shifted))
    } else {
        let shifted = ArrayInsert { index: si.index + 1, value: si.value.clone() };
        OperationPair::new(s.with_change(shifted), c.clone())
    }
}

pub fn insert_remove(
    s: &DiscreteOperation,
    si: &ArrayInsert,
    c: &DiscreteOperation,
    cr: &ArrayRemove,
) -> OperationPair {
    if si.index <= cr.index {
        OperationPair::new(s.clone(), c.with_change(ArrayRemove { index: cr.index + 1 }))
    } else {
        let shifted = ArrayInsert { index: si.index - 1, value: si.value.clone() };
        OperationPair::new(s.with_change(shifted), c.clone())
    }
}

pub fn insert_replace(
    s: &DiscreteOperation,
    si: &ArrayInsert,
    c: &DiscreteOperation,
    cp: &ArrayReplace,
) -> OperationPair {
    if si.index <= cp.index {
        let shifted = ArrayReplace { index: cp.index + 1, value: cp.value.clone() };
        OperationPair::new(s.clone(), c.with_change(shifted))
    } else {
        OperationPair::new(s.clone(), c.clone())
    }
}

pub fn insert_move(
    s: &DiscreteOperation,
    si: &ArrayInsert,
    c: &DiscreteOperation,
    cm: &ArrayMove,
) -> OperationPair {
    let (from, to) = (cm.from_index, cm.to_index);
    let inserted_before_moved = si.index <= from;

    // Gap of the inserted element once the moved element is taken out.
    let insert_gap = if inserted_before_moved { si.index } else { si.index - 1 };
    let inserted_first = if insert_gap != to { insert_gap < to } else { inserted_before_moved };

    let from_xf = if inserted_before_moved { from + 1 } else { from };
    let (to_xf, insert_xf) = if inserted_first {
        (to + 1, insert_gap)
    } else {
        (to, insert_gap + 1)
    };

    OperationPair::new(
        s.with_change(ArrayInsert { index: insert_xf, value: si.value.clone() }),
        c.with_change(ArrayMove { from_index: from_xf, to_index: to_xf }),
    )
}

pub fn insert_set(
    s: &DiscreteOperation,
    _si: &ArrayInsert,
    c: &DiscreteOperation,
    _cs: &ArraySet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn remove_remove(
    s: &DiscreteOperation,
    sr: &ArrayRemove,
    c: &DiscreteOperation,
    cr: &ArrayRemove,
) -> OperationPair {
    if sr.index == cr.index {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else if sr.index < cr.index {
        OperationPair::new(s.clone(), c.with_change(ArrayRemove { index: cr.index - 1 }))
    } else {
        OperationPair::new(s.with_change(ArrayRemove { index: sr.index - 1 }), c.clone())
    }
}

pub fn remove_replace(
    s: &DiscreteOperation,
    sr: &ArrayRemove,
    c: &DiscreteOperation,
    cp: &ArrayReplace,
) -> OperationPair {
    if sr.index == cp.index {
        // The replaced slot is gone; keep the client's value as a fresh element.
        let reinserted = ArrayInsert { index: cp.index, value: cp.value.clone() };
        OperationPair::new(s.as_no_op(), c.with_change(reinserted))
    } else if sr.index < cp.index {
        let shifted = ArrayReplace { index: cp.index - 1, value: cp.value.clone() };
        OperationPair::new(s.clone(), c.with_change(shifted))
    } else {
        OperationPair::new(s.clone(), c.clone())
    }
}

pub fn remove_move(
    s: &DiscreteOperation,
    sr: &ArrayRemove,
    c: &DiscreteOperation,
    cm: &ArrayMove,
) -> OperationPair {
    let (from, to) = (cm.from_index, cm.to_index);

    if sr.index == from {
        // The moved element was removed; remove it from where the client put it.
        return OperationPair::new(s.with_change(ArrayRemove { index: to }), c.as_no_op());
    }

    // Index of the removed element once the moved element is taken out.
    let removed_gap = if sr.index < from { sr.index } else { sr.index - 1 };
    let from_xf = if sr.index < from { from - 1 } else { from };
    let to_xf = if to <= removed_gap { to } else { to - 1 };
    let remove_xf = if removed_gap < to { removed_gap } else { removed_gap + 1 };

    OperationPair::new(
        s.with_change(ArrayRemove { index: remove_xf }),
        c.with_change(ArrayMove { from_index: from_xf, to_index: to_xf }),
    )
}

pub fn remove_set(
    s: &DiscreteOperation,
    _sr: &ArrayRemove,
    c: &DiscreteOperation,
    _cs: &ArraySet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn replace_replace(
    s: &DiscreteOperation,
    sp: &ArrayReplace,
    c: &DiscreteOperation,
    cp: &ArrayReplace,
) -> OperationPair {
    if sp.index != cp.index {
        OperationPair::new(s.clone(), c.clone())
    } else if sp.value == cp.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}

pub fn replace_move(
    s: &DiscreteOperation,
    sp: &ArrayReplace,
    c: &DiscreteOperation,
    cm: &ArrayMove,
) -> OperationPair {
    let followed = ArrayReplace {
        index: reorder_index(sp.index, cm.from_index, cm.to_index),
        value: sp.value.clone(),
    };
    OperationPair::new(s.with_change(followed), c.clone())
}

pub fn replace_set(
    s: &DiscreteOperation,
    _sp: &ArrayReplace,
    c: &DiscreteOperation,
    _cs: &ArraySet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn move_move(
    s: &DiscreteOperation,
    sm: &ArrayMove,
    c: &DiscreteOperation,
    cm: &ArrayMove,
) -> OperationPair {
    if sm.from_index == cm.from_index {
        // Both moved the same element; the server's destination wins.
        if sm.to_index == cm.to_index {
            return OperationPair::new(s.as_no_op(), c.as_no_op());
        }
        let relocate = ArrayMove { from_index: cm.to_index, to_index: sm.to_index };
        return OperationPair::new(s.with_change(relocate), c.as_no_op());
    }

    // Positions of each moved element once only the other one is taken out.
    let c_from_wo_s = if sm.from_index < cm.from_index { cm.from_index - 1 } else { cm.from_index };
    let s_from_wo_c = if cm.from_index < sm.from_index { sm.from_index - 1 } else { sm.from_index };

    // Destination gaps with both elements taken out.
    let s_gap = if sm.to_index <= c_from_wo_s { sm.to_index } else { sm.to_index - 1 };
    let c_gap = if cm.to_index <= s_from_wo_c { cm.to_index } else { cm.to_index - 1 };

    let server_first = s_gap <= c_gap;
    let (s_final, c_final) = if server_first {
        (s_gap, c_gap + 1)
    } else {
        (s_gap + 1, c_gap)
    };

    // Where each element sits after the other side's move has been applied.
    let c_from_xf = if sm.to_index <= c_from_wo_s { c_from_wo_s + 1 } else { c_from_wo_s };
    let s_from_xf = if cm.to_index <= s_from_wo_c { s_from_wo_c + 1 } else { s_from_wo_c };

    OperationPair::new(
        s.with_change(ArrayMove { from_index: s_from_xf, to_index: s_final }),
        c.with_change(ArrayMove { from_index: c_from_xf, to_index: c_final }),
    )
}

pub fn move_set(
    s: &DiscreteOperation,
    _sm: &ArrayMove,
    c: &DiscreteOperation,
    _cs: &ArraySet,
) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.clone())
}

pub fn set_set(
    s: &DiscreteOperation,
    ss: &ArraySet,
    c: &DiscreteOperation,
    cs: &ArraySet,
) -> OperationPair {
    if ss.value == cs.value {
        OperationPair::new(s.as_no_op(), c.as_no_op())
    } else {
        OperationPair::new(s.clone(), c.as_no_op())
    }
}
