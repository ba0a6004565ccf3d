//! Boundary with the network layer.
//!
//! The transport owns delivery order: remote operations and acknowledgments
//! must reach the engine in the order the server committed them.

use crate::protocol::{HistoryRequest, ModelOperationEvent, UnprocessedOperationEvent};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The server no longer holds part of the requested range.
    #[error("History {first}..={last} is no longer available")]
    Unavailable { first: u64, last: u64 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub trait Transport: Send + 'static {
    /// Hands a local operation to the network. Delivery is fire-and-forget;
    /// the acknowledgment arrives separately.
    fn send_operation(&mut self, op: &UnprocessedOperationEvent) -> Result<(), TransportError>;

    /// Fetches committed operations for an inclusive version range, in order.
    fn request_history(
        &mut self,
        request: HistoryRequest,
    ) -> impl Future<Output = Result<Vec<ModelOperationEvent>, HistoryError>> + Send;
}
