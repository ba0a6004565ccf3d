//! Remote operations as delivered by the server.

use chrono::{DateTime, Utc};
use coedit_ot::Operation;
use serde::{Deserialize, Serialize};

/// An operation the server committed at `version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOperationEvent {
    /// Session that submitted the operation
    pub session_id: String,

    /// Version the operation was committed at. The document is at
    /// `version + 1` after applying it.
    pub version: u64,

    pub timestamp: DateTime<Utc>,

    pub operation: Operation,
}

impl ModelOperationEvent {
    pub fn new(session_id: impl Into<String>, version: u64, operation: Operation) -> Self {
        Self {
            session_id: session_id.into(),
            version,
            timestamp: Utc::now(),
            operation,
        }
    }
}
