//! Error types for the reconciliation engine

use crate::state::SyncState;
use coedit_model::TreeError;
use coedit_ot::TransformError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A local operation was rejected by the tree. Nothing was queued.
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Remote operation at version {version} could not be applied: {source}")]
    RemoteApply { version: u64, source: TreeError },

    #[error("Out-of-order acknowledgment: expected seq {expected}, received {received}")]
    OutOfOrderAck { expected: u64, received: u64 },

    #[error("Acknowledgment for seq {0} with no pending operation")]
    UnexpectedAck(u64),

    #[error("Version mismatch: expected {expected}, received {received}")]
    VersionMismatch { expected: u64, received: u64 },

    #[error("Cannot resync from version {from} to {to}: {reason}")]
    ResyncUnrecoverable { from: u64, to: u64, reason: String },

    #[error("Cannot {action} while {state}")]
    InvalidState { state: SyncState, action: &'static str },

    #[error("Pending queue is full ({0} operations)")]
    PendingLimitExceeded(usize),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed")]
    SessionClosed,
}

impl EngineError {
    /// The session cannot continue without a resync or a reload.
    pub fn is_fatal(&self) -> bool {
        self.requires_resync() || self.requires_reload()
    }

    /// Histories disagree on order; replaying server history can recover.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            EngineError::OutOfOrderAck { .. }
                | EngineError::UnexpectedAck(_)
                | EngineError::VersionMismatch { .. }
        )
    }

    /// The local document can't be trusted; reload from a fresh snapshot.
    pub fn requires_reload(&self) -> bool {
        matches!(
            self,
            EngineError::ResyncUnrecoverable { .. }
                | EngineError::Transform(_)
                | EngineError::RemoteApply { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_ot::NodeId;

    #[test]
    fn test_classification() {
        let local = EngineError::from(TreeError::NodeNotFound(NodeId::from("x")));
        assert!(!local.is_fatal());

        let order = EngineError::OutOfOrderAck { expected: 1, received: 2 };
        assert!(order.is_fatal());
        assert!(order.requires_resync());
        assert!(!order.requires_reload());

        let gone = EngineError::ResyncUnrecoverable { from: 1, to: 9, reason: "compacted".into() };
        assert!(gone.requires_reload());
        assert!(!gone.requires_resync());
    }
}
