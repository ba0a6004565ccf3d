//! Session-level notifications.

use crate::state::SyncState;
use serde::Serialize;

/// What the engine reports to the outside after each step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged { from: SyncState, to: SyncState },

    /// A remote operation was applied; the document is now at `version + 1`
    RemoteApplied { session_id: String, version: u64 },

    Acknowledged { seq_no: u64, version: u64 },

    Resynced { version: u64 },

    ResyncError { message: String },
}
