//! Engine state machine.
//!
//! ```text
//!  Synchronized ⇄ PendingAck
//!        │            │
//!        ├─ protocol ─┴──> Diverged ─────┐
//!        └─ send failed ──> Disconnected ┤
//!                                        │
//!   (reconnect / resync) ────────────────┴──> Resyncing ──> Synchronized | PendingAck
//!                                      │
//!                                      └──> Unrecoverable (reload required)
//! ```

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncState {
    /// No local operation awaits acknowledgment
    Synchronized,
    /// At least one local operation is in flight
    PendingAck,
    /// Replaying committed history after a gap
    Resyncing,
    /// A protocol-order violation was detected; only a resync is accepted
    Diverged,
    /// A local operation could not be sent; later ones are held for the resync
    Disconnected,
    /// The document must be reloaded from a fresh snapshot
    Unrecoverable,
}

impl SyncState {
    /// Live states exchange operations with the server.
    pub fn is_live(self) -> bool {
        matches!(self, SyncState::Synchronized | SyncState::PendingAck)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Synchronized => "synchronized",
            SyncState::PendingAck => "pending-ack",
            SyncState::Resyncing => "resyncing",
            SyncState::Diverged => "diverged",
            SyncState::Disconnected => "disconnected",
            SyncState::Unrecoverable => "unrecoverable",
        };
        f.write_str(name)
    }
}
