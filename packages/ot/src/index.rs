//! # Index and Range Transformers
//!
//! Integer algebra shared by array transforms, string offset transforms and
//! reference (cursor/selection) maintenance. Nothing here knows about node
//! types.
//!
//! An index inside a removed range collapses to the removal point. The
//! caller decides whether a collapsed reference is still meaningful.

use serde::{Deserialize, Serialize};

/// Shifts every index at or after `insert_index` forward by `length`.
pub fn handle_insert(indices: &[usize], insert_index: usize, length: usize) -> Vec<usize> {
    indices
        .iter()
        .map(|&index| if index >= insert_index { index.saturating_add(length) } else { index })
        .collect()
}

/// Shifts indices after the removed range back by `length`; indices inside the
/// range clamp to `remove_index`.
pub fn handle_remove(indices: &[usize], remove_index: usize, length: usize) -> Vec<usize> {
    let remove_end = remove_index.saturating_add(length);
    indices
        .iter()
        .map(|&index| {
            if index >= remove_end {
                index - length
            } else if index >= remove_index {
                remove_index
            } else {
                index
            }
        })
        .collect()
}

/// Where each index ends up after the element at `from_index` moves to `to_index`.
pub fn handle_reorder(indices: &[usize], from_index: usize, to_index: usize) -> Vec<usize> {
    indices
        .iter()
        .map(|&index| reorder_index(index, from_index, to_index))
        .collect()
}

/// Single-index form of [`handle_reorder`].
pub fn reorder_index(index: usize, from_index: usize, to_index: usize) -> usize {
    if index == from_index {
        return to_index;
    }

    let range = (from_index.min(to_index), from_index.max(to_index));
    match (MoveDirection::of(from_index, to_index), RangeIndexRelationship::of(range, index)) {
        (MoveDirection::Identity, _) => index,
        (_, RangeIndexRelationship::Before | RangeIndexRelationship::After) => index,
        // `index == from_index` was handled above, so a boundary hit here is `to_index`.
        (MoveDirection::Forward, _) => index - 1,
        (MoveDirection::Backward, _) => index + 1,
    }
}

/// Direction of a move from one index to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    Forward,
    Backward,
    Identity,
}

impl MoveDirection {
    pub fn of(from_index: usize, to_index: usize) -> Self {
        if from_index < to_index {
            MoveDirection::Forward
        } else if from_index > to_index {
            MoveDirection::Backward
        } else {
            MoveDirection::Identity
        }
    }
}

/// Position of an index relative to an inclusive range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeIndexRelationship {
    Before,
    Start,
    Within,
    End,
    After,
}

impl RangeIndexRelationship {
    /// For a single-point range (`min == max`) a matching index reports `Start`.
    pub fn of((min, max): (usize, usize), index: usize) -> Self {
        if index < min {
            RangeIndexRelationship::Before
        } else if index == min {
            RangeIndexRelationship::Start
        } else if index < max {
            RangeIndexRelationship::Within
        } else if index == max {
            RangeIndexRelationship::End
        } else {
            RangeIndexRelationship::After
        }
    }
}

/// A `[start, end]` pair of offsets, such as a text selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn from_tuple(tuple: &[usize]) -> Self {
        Self { start: tuple[0], end: tuple[1] }
    }
}

/// Applies the index transformers to lists of ranges, endpoint by endpoint.
pub struct RangeTransformer;

impl RangeTransformer {
    pub fn handle_insert(ranges: &[IndexRange], insert_index: usize, length: usize) -> Vec<IndexRange> {
        ranges
            .iter()
            .map(|r| IndexRange::from_tuple(&handle_insert(&[r.start, r.end], insert_index, length)))
            .collect()
    }

    pub fn handle_remove(ranges: &[IndexRange], remove_index: usize, length: usize) -> Vec<IndexRange> {
        ranges
            .iter()
            .map(|r| IndexRange::from_tuple(&handle_remove(&[r.start, r.end], remove_index, length)))
            .collect()
    }

    pub fn handle_reorder(ranges: &[IndexRange], from_index: usize, to_index: usize) -> Vec<IndexRange> {
        ranges
            .iter()
            .map(|r| IndexRange::from_tuple(&handle_reorder(&[r.start, r.end], from_index, to_index)))
            .collect()
    }
}
