//! Messages exchanged with the server.

use chrono::{DateTime, Utc};
use coedit_ot::Operation;
use serde::{Deserialize, Serialize};

pub use coedit_model::ModelOperationEvent;

/// A local operation waiting for the server to commit it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnprocessedOperationEvent {
    pub client_id: String,

    /// Position in this client's submission order, starting at 0
    pub seq_no: u64,

    /// Document version the operation was generated (or last rebased) against
    pub context_version: u64,

    pub timestamp: DateTime<Utc>,

    pub operation: Operation,
}

/// Server confirmation that the operation `seq_no` was committed at `version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationAck {
    pub seq_no: u64,

    pub version: u64,

    pub timestamp: DateTime<Utc>,
}

impl OperationAck {
    pub fn new(seq_no: u64, version: u64) -> Self {
        Self { seq_no, version, timestamp: Utc::now() }
    }
}

/// Inclusive range of committed versions to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub first: u64,
    pub last: u64,
}

impl HistoryRequest {
    /// Range covering versions `from..to`, or `None` when nothing is missing.
    pub fn between(from: u64, to: u64) -> Option<Self> {
        (to > from).then(|| Self { first: from, last: to - 1 })
    }

    pub fn count(&self) -> u64 {
        self.last - self.first + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_request_bounds() {
        let request = HistoryRequest::between(3, 6).unwrap();
        assert_eq!(request, HistoryRequest { first: 3, last: 5 });
        assert_eq!(request.count(), 3);
        assert!(HistoryRequest::between(4, 4).is_none());
        assert!(HistoryRequest::between(0, 0).is_none());
    }
}
