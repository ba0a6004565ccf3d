//! Error types for the document tree

use crate::path::Path;
use coedit_ot::{NodeId, NodeKind};
use thiserror::Error;

/// Structural errors. The operation that caused one was rejected and the
/// tree is unchanged; retrying it without correction fails the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("No node at path {0}")]
    PathNotFound(Path),

    #[error("Node {0} is detached")]
    Detached(NodeId),

    #[error("Index {index} out of bounds for node {id} of length {len}")]
    IndexOutOfBounds { id: NodeId, index: usize, len: usize },

    #[error("Range of {length} at {index} out of bounds for node {id} of length {len}")]
    RangeOutOfBounds {
        id: NodeId,
        index: usize,
        length: usize,
        len: usize,
    },

    #[error("Property {key:?} not found on node {id}")]
    PropertyNotFound { id: NodeId, key: String },

    #[error("Property {key:?} already exists on node {id}")]
    PropertyExists { id: NodeId, key: String },

    #[error("Node {id} is a {found}, expected {expected}")]
    TypeMismatch {
        id: NodeId,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("Node id {0} is already in use")]
    DuplicateNodeId(NodeId),

    #[error("Reference {key:?} of session {session_id} already exists")]
    ReferenceExists { session_id: String, key: String },

    #[error("Document tree is detached")]
    TreeDetached,
}
