//! Error types for transformation

use crate::ops::OperationKind;
use crate::value::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Two operations target the same node but disagree on what kind of node it is.
    #[error("Operations on node {id} disagree on its kind: server {server}, client {client}")]
    NodeKindMismatch {
        id: NodeId,
        server: OperationKind,
        client: OperationKind,
    },
}
