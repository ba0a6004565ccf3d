//! # References
//!
//! Cursors and selections attached to string or array nodes. A reference is
//! owned by one session and named by a key, and its indices are moved along
//! with every edit of the node it is attached to.

use crate::error::TreeError;
use coedit_ot::{index, IndexRange, RangeTransformer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position data of a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ReferenceValue {
    Index(usize),
    Indices(Vec<usize>),
    Range(IndexRange),
    Ranges(Vec<IndexRange>),
}

impl ReferenceValue {
    pub fn handle_insert(&self, at: usize, length: usize) -> Self {
        match self {
            ReferenceValue::Index(i) => ReferenceValue::Index(index::handle_insert(&[*i], at, length)[0]),
            ReferenceValue::Indices(v) => ReferenceValue::Indices(index::handle_insert(v, at, length)),
            ReferenceValue::Range(r) => {
                ReferenceValue::Range(RangeTransformer::handle_insert(&[*r], at, length)[0])
            }
            ReferenceValue::Ranges(v) => {
                ReferenceValue::Ranges(RangeTransformer::handle_insert(v, at, length))
            }
        }
    }

    pub fn handle_remove(&self, at: usize, length: usize) -> Self {
        match self {
            ReferenceValue::Index(i) => ReferenceValue::Index(index::handle_remove(&[*i], at, length)[0]),
            ReferenceValue::Indices(v) => ReferenceValue::Indices(index::handle_remove(v, at, length)),
            ReferenceValue::Range(r) => {
                ReferenceValue::Range(RangeTransformer::handle_remove(&[*r], at, length)[0])
            }
            ReferenceValue::Ranges(v) => {
                ReferenceValue::Ranges(RangeTransformer::handle_remove(v, at, length))
            }
        }
    }

    pub fn handle_reorder(&self, from: usize, to: usize) -> Self {
        match self {
            ReferenceValue::Index(i) => ReferenceValue::Index(index::reorder_index(*i, from, to)),
            ReferenceValue::Indices(v) => ReferenceValue::Indices(index::handle_reorder(v, from, to)),
            ReferenceValue::Range(r) => {
                ReferenceValue::Range(RangeTransformer::handle_reorder(&[*r], from, to)[0])
            }
            ReferenceValue::Ranges(v) => {
                ReferenceValue::Ranges(RangeTransformer::handle_reorder(v, from, to))
            }
        }
    }
}

/// A named position owned by one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReference {
    pub session_id: String,

    pub key: String,

    pub value: ReferenceValue,
}

impl ModelReference {
    pub fn new(session_id: impl Into<String>, key: impl Into<String>, value: ReferenceValue) -> Self {
        Self {
            session_id: session_id.into(),
            key: key.into(),
            value,
        }
    }
}

/// Narrows [`ReferenceMap::get_all`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceFilter {
    pub session_id: Option<String>,
    pub key: Option<String>,
}

impl ReferenceFilter {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self { session_id: Some(session_id.into()), key: None }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self { session_id: None, key: Some(key.into()) }
    }
}

/// References of one node, stored by session id then key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMap {
    references: BTreeMap<String, BTreeMap<String, ModelReference>>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, reference: ModelReference) -> Result<(), TreeError> {
        let session = self.references.entry(reference.session_id.clone()).or_default();
        if session.contains_key(&reference.key) {
            return Err(TreeError::ReferenceExists {
                session_id: reference.session_id,
                key: reference.key,
            });
        }
        session.insert(reference.key.clone(), reference);
        Ok(())
    }

    pub fn get(&self, session_id: &str, key: &str) -> Option<&ModelReference> {
        self.references.get(session_id)?.get(key)
    }

    pub fn get_all(&self, filter: &ReferenceFilter) -> Vec<&ModelReference> {
        self.references
            .iter()
            .filter(|(session_id, _)| filter.session_id.as_deref().map_or(true, |s| s == session_id.as_str()))
            .flat_map(|(_, refs)| refs.values())
            .filter(|r| filter.key.as_deref().map_or(true, |k| k == r.key))
            .collect()
    }

    pub fn remove(&mut self, session_id: &str, key: &str) -> Option<ModelReference> {
        let session = self.references.get_mut(session_id)?;
        let removed = session.remove(key);
        if session.is_empty() {
            self.references.remove(session_id);
        }
        removed
    }

    pub fn remove_by_session(&mut self, session_id: &str) {
        self.references.remove(session_id);
    }

    pub fn remove_by_key(&mut self, key: &str) {
        for session in self.references.values_mut() {
            session.remove(key);
        }
        self.references.retain(|_, session| !session.is_empty());
    }

    pub fn remove_all(&mut self) {
        self.references.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Rewrites every reference value with `f`.
    pub(crate) fn transform(&mut self, f: impl Fn(&ReferenceValue) -> ReferenceValue) {
        for reference in self.references.values_mut().flat_map(|refs| refs.values_mut()) {
            reference.value = f(&reference.value);
        }
    }
}
