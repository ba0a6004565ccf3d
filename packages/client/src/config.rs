//! Engine configuration.

use serde::Deserialize;

/// Settings for one client session
///
/// ```json
/// { "sessionId": "s1", "maxPending": 256 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Identity of this session. Operations in replayed history carrying this
    /// id are this client's own and count as acknowledgments.
    pub session_id: String,

    /// Deliver change events for operations applied locally
    pub emit_local_events: bool,

    /// Upper bound on unacknowledged operations; 0 means unbounded
    pub max_pending: usize,

    /// Largest version gap a resync will try to replay
    pub max_resync_gap: u64,

    /// Mailbox capacity of the session actor
    pub command_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            emit_local_events: true,
            max_pending: 1024,
            max_resync_gap: 10_000,
            command_buffer: 64,
        }
    }
}

impl EngineConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
