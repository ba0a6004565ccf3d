//! # Reconciliation Engine
//!
//! Keeps the local document, the queue of unacknowledged local operations and
//! the server's version counter consistent with each other.
//!
//! ## Triggers
//!
//! - **Local operation**: applied to the tree at once, queued, handed back for sending
//! - **Remote operation**: transformed against every queued operation in order,
//!   each queued operation replaced by its transformed form, then applied
//! - **Acknowledgment**: pops the head of the queue; any other order is fatal
//!
//! Every trigger runs to completion before the next one is accepted. Nothing
//! here blocks or awaits.
//!
//! ## Versions
//!
//! `version` counts committed operations the client has incorporated. A remote
//! operation or acknowledgment committed at version `v` is accepted only when
//! `v == version`, after which the client is at `v + 1`.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::protocol::{HistoryRequest, ModelOperationEvent, OperationAck, UnprocessedOperationEvent};
use crate::state::SyncState;
use crate::transport::HistoryError;
use chrono::Utc;
use coedit_model::{ChangeEvent, DocumentTree, EventFilter, ModelReference, SubscriptionId};
use coedit_ot::{transform, DataValue, NodeId, Operation, TransformError};
use std::collections::VecDeque;
use tracing::{debug, error, info, instrument, warn};

pub struct ClientEngine {
    config: EngineConfig,

    tree: DocumentTree,

    /// Unacknowledged local operations in submission order
    pending: VecDeque<UnprocessedOperationEvent>,

    next_seq: u64,

    version: u64,

    state: SyncState,

    /// Server version a running resync must reach
    resync_target: u64,

    /// Session events not yet collected by [`ClientEngine::drain_events`]
    outbox: Vec<SessionEvent>,
}

impl ClientEngine {
    /// Starts a session on a tree loaded at `version`.
    pub fn new(config: EngineConfig, mut tree: DocumentTree, version: u64) -> Self {
        tree.set_emit_local_events(config.emit_local_events);
        Self {
            config,
            tree,
            pending: VecDeque::new(),
            next_seq: 0,
            version,
            state: SyncState::Synchronized,
            resync_target: version,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn value(&self) -> serde_json::Value {
        self.tree.value()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pending(&self) -> impl Iterator<Item = &UnprocessedOperationEvent> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn on(
        &mut self,
        filter: EventFilter,
        handler: impl FnMut(&ChangeEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.tree.on(filter, handler)
    }

    pub fn off(&mut self, subscription: SubscriptionId) -> bool {
        self.tree.off(subscription)
    }

    pub fn set_reference(&mut self, node: &NodeId, reference: ModelReference) -> Result<(), EngineError> {
        Ok(self.tree.set_reference(node, reference)?)
    }

    /// Session events produced since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Ends the session; the tree rejects everything afterwards.
    pub fn detach(&mut self) {
        self.tree.detach();
    }

    /// Applies a local operation and queues it for the server.
    ///
    /// The returned event is what the transport sends. A tree error leaves
    /// both the tree and the queue untouched.
    #[instrument(skip(self, operation), fields(session = %self.config.session_id))]
    pub fn submit_local(&mut self, operation: Operation) -> Result<UnprocessedOperationEvent, EngineError> {
        if self.state == SyncState::Unrecoverable {
            return Err(self.invalid("submit a local operation"));
        }
        if self.config.max_pending > 0 && self.pending.len() >= self.config.max_pending {
            warn!(pending = self.pending.len(), "Pending queue is full");
            return Err(EngineError::PendingLimitExceeded(self.pending.len()));
        }

        self.tree.apply_local(&operation)?;

        let event = UnprocessedOperationEvent {
            client_id: self.config.session_id.clone(),
            seq_no: self.next_seq,
            context_version: self.version,
            timestamp: Utc::now(),
            operation,
        };
        self.next_seq += 1;
        self.pending.push_back(event.clone());
        debug!(seq_no = event.seq_no, context_version = event.context_version, "Queued local operation");

        if self.state == SyncState::Synchronized {
            self.transition(SyncState::PendingAck);
        }
        Ok(event)
    }

    /// Takes the session offline after the transport failed to deliver a
    /// queued operation. Sending later operations would let the server see
    /// them out of order, so they are held until a resync resends the queue.
    pub fn transport_failed(&mut self) {
        if self.state.is_live() {
            warn!(pending = self.pending.len(), "Transport failed, holding local operations");
            self.transition(SyncState::Disconnected);
        }
    }

    /// Incorporates an operation the server committed for another session.
    #[instrument(skip(self, event), fields(version = event.version, origin = %event.session_id))]
    pub fn handle_remote(&mut self, event: ModelOperationEvent) -> Result<(), EngineError> {
        if !self.state.is_live() {
            return Err(self.invalid("apply a remote operation"));
        }
        self.process_remote(event)
    }

    /// Confirms the head of the pending queue.
    #[instrument(skip(self, ack), fields(seq_no = ack.seq_no, version = ack.version))]
    pub fn handle_ack(&mut self, ack: OperationAck) -> Result<(), EngineError> {
        if !self.state.is_live() {
            return Err(self.invalid("accept an acknowledgment"));
        }
        self.acknowledge(Some(ack.seq_no), ack.version)
    }

    /// Starts replaying history after a reconnect.
    ///
    /// Returns the range to fetch, or `None` when the client already holds
    /// every committed version. Either way, finish with
    /// [`complete_resync`](Self::complete_resync).
    #[instrument(skip(self), fields(client_version = self.version))]
    pub fn begin_resync(&mut self, server_version: u64) -> Result<Option<HistoryRequest>, EngineError> {
        if self.state == SyncState::Unrecoverable {
            return Err(self.invalid("resync"));
        }

        if server_version < self.version {
            return Err(self.resync_failed(EngineError::ResyncUnrecoverable {
                from: self.version,
                to: server_version,
                reason: "server is behind the client".to_string(),
            }));
        }

        let gap = server_version - self.version;
        if gap > self.config.max_resync_gap {
            return Err(self.resync_failed(EngineError::ResyncUnrecoverable {
                from: self.version,
                to: server_version,
                reason: format!("gap of {gap} versions exceeds limit of {}", self.config.max_resync_gap),
            }));
        }

        self.resync_target = server_version;
        self.transition(SyncState::Resyncing);
        Ok(HistoryRequest::between(self.version, server_version))
    }

    /// Replays fetched history and returns the pending operations to resend,
    /// rebased onto the server's current version.
    ///
    /// Events from this session in the history are the server's copies of
    /// queued operations and acknowledge them in order.
    #[instrument(skip(self, history), fields(client_version = self.version, target = self.resync_target))]
    pub fn complete_resync(
        &mut self,
        history: Result<Vec<ModelOperationEvent>, HistoryError>,
    ) -> Result<Vec<UnprocessedOperationEvent>, EngineError> {
        if self.state != SyncState::Resyncing {
            return Err(self.invalid("complete a resync"));
        }

        let events = match history {
            Ok(events) => events,
            Err(err @ HistoryError::Unavailable { .. }) => {
                return Err(self.resync_failed(EngineError::ResyncUnrecoverable {
                    from: self.version,
                    to: self.resync_target,
                    reason: err.to_string(),
                }));
            }
            Err(HistoryError::Transport(err)) => {
                // Still resyncing: the caller may request the history again.
                warn!(error = %err, "History request failed");
                self.outbox.push(SessionEvent::ResyncError { message: err.to_string() });
                return Err(EngineError::Transport(err.0));
            }
        };

        for event in events {
            if let Err(err) = self.process_remote(event) {
                let err = if err.requires_reload() {
                    err
                } else {
                    EngineError::ResyncUnrecoverable {
                        from: self.version,
                        to: self.resync_target,
                        reason: err.to_string(),
                    }
                };
                return Err(self.resync_failed(err));
            }
        }

        if self.version != self.resync_target {
            return Err(self.resync_failed(EngineError::ResyncUnrecoverable {
                from: self.version,
                to: self.resync_target,
                reason: "history ended early".to_string(),
            }));
        }

        for entry in self.pending.iter_mut() {
            entry.context_version = self.version;
        }

        let next = if self.pending.is_empty() {
            SyncState::Synchronized
        } else {
            SyncState::PendingAck
        };
        self.transition(next);
        info!(version = self.version, resend = self.pending.len(), "Resynchronized");
        self.outbox.push(SessionEvent::Resynced { version: self.version });

        Ok(self.pending.iter().cloned().collect())
    }

    fn process_remote(&mut self, event: ModelOperationEvent) -> Result<(), EngineError> {
        if event.version != self.version {
            return Err(self.diverge(EngineError::VersionMismatch {
                expected: self.version,
                received: event.version,
            }));
        }

        if event.session_id == self.config.session_id {
            return self.acknowledge(None, event.version);
        }

        let (remote, rebased) = match self.rebase_pending(&event.operation) {
            Ok(result) => result,
            Err(err) => return Err(self.fail(err.into())),
        };
        for (entry, operation) in self.pending.iter_mut().zip(rebased) {
            entry.operation = operation;
        }

        self.tree.mark_superseded(superseded_ids(&remote));

        let transformed = ModelOperationEvent { operation: remote, ..event };
        if let Err(source) = self.tree.apply_remote(&transformed) {
            return Err(self.fail(EngineError::RemoteApply { version: transformed.version, source }));
        }

        self.version += 1;
        debug!(version = self.version, pending = self.pending.len(), "Applied remote operation");
        self.outbox.push(SessionEvent::RemoteApplied {
            session_id: transformed.session_id,
            version: transformed.version,
        });
        Ok(())
    }

    /// Transforms `remote` through the pending queue. Returns the remote
    /// operation to apply and the new form of each queued operation.
    fn rebase_pending(&self, remote: &Operation) -> Result<(Operation, Vec<Operation>), TransformError> {
        let mut remote = remote.clone();
        let mut rebased = Vec::with_capacity(self.pending.len());
        for entry in &self.pending {
            let pair = transform(&remote, &entry.operation, &self.tree)?;
            remote = pair.server;
            rebased.push(pair.client);
        }
        Ok((remote, rebased))
    }

    fn acknowledge(&mut self, seq_no: Option<u64>, version: u64) -> Result<(), EngineError> {
        let expected = match self.pending.front() {
            Some(head) => head.seq_no,
            None => {
                let received = seq_no.unwrap_or(self.next_seq);
                return Err(self.diverge(EngineError::UnexpectedAck(received)));
            }
        };
        if let Some(received) = seq_no {
            if received != expected {
                return Err(self.diverge(EngineError::OutOfOrderAck { expected, received }));
            }
        }
        if version != self.version {
            return Err(self.diverge(EngineError::VersionMismatch {
                expected: self.version,
                received: version,
            }));
        }

        self.pending.pop_front();
        self.version += 1;
        debug!(seq_no = expected, version, "Acknowledged local operation");
        self.outbox.push(SessionEvent::Acknowledged { seq_no: expected, version });

        if self.pending.is_empty() && self.state == SyncState::PendingAck {
            self.transition(SyncState::Synchronized);
        }
        Ok(())
    }

    fn transition(&mut self, to: SyncState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!(%from, %to, "Sync state changed");
        self.state = to;
        self.outbox.push(SessionEvent::StateChanged { from, to });
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidState { state: self.state, action }
    }

    /// Protocol-order violation: only a resync is accepted afterwards.
    fn diverge(&mut self, err: EngineError) -> EngineError {
        error!(error = %err, "Session diverged from server");
        if self.state != SyncState::Unrecoverable {
            self.transition(SyncState::Diverged);
        }
        err
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        error!(error = %err, "Session is unrecoverable");
        self.transition(SyncState::Unrecoverable);
        err
    }

    fn resync_failed(&mut self, err: EngineError) -> EngineError {
        self.outbox.push(SessionEvent::ResyncError { message: err.to_string() });
        if self.state == SyncState::Unrecoverable {
            err
        } else {
            self.fail(err)
        }
    }
}

/// Ids created by elements of `op` that were transformed into no-ops.
fn superseded_ids(op: &Operation) -> Vec<NodeId> {
    op.discrete_ops()
        .into_iter()
        .filter(|discrete| discrete.no_op)
        .flat_map(|discrete| discrete.change.created_values())
        .flat_map(DataValue::node_ids)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_model::{DataValueFactory, Path};
    use coedit_ot::{ArrayMove, ArrayRemove, StringInsert, StringRemove, StringSet};
    use serde_json::json;

    fn engine(value: serde_json::Value) -> ClientEngine {
        let mut values = DataValueFactory::new("init");
        let tree = DocumentTree::new(values.from_json(&value)).unwrap();
        ClientEngine::new(EngineConfig::new("me"), tree, 0)
    }

    fn id_at(engine: &ClientEngine, path: Path) -> NodeId {
        engine.tree().node_at(&path).unwrap().id
    }

    #[test]
    fn test_string_set_supersedes_pending_insert() {
        let mut engine = engine(json!({ "s": "abc" }));
        let s = id_at(&engine, Path::root().child("s"));

        engine
            .submit_local(Operation::discrete(s.clone(), StringInsert { index: 0, value: "A".into() }))
            .unwrap();
        assert_eq!(engine.state(), SyncState::PendingAck);

        engine
            .handle_remote(ModelOperationEvent::new(
                "other",
                0,
                Operation::discrete(s, StringSet { value: "XYZ".into() }),
            ))
            .unwrap();

        assert_eq!(engine.value(), json!({ "s": "XYZ" }));
        assert!(engine.pending().all(|entry| entry.operation.is_no_op()));
        assert_eq!(engine.version(), 1);
    }

    #[test]
    fn test_remote_remove_shifts_pending_move() {
        let mut engine = engine(json!({ "a": [0, 1, 2, 3, 4] }));
        let a = id_at(&engine, Path::root().child("a"));

        engine
            .submit_local(Operation::discrete(a.clone(), ArrayMove { from_index: 1, to_index: 4 }))
            .unwrap();
        engine
            .handle_remote(ModelOperationEvent::new("other", 0, Operation::discrete(a.clone(), ArrayRemove { index: 2 })))
            .unwrap();

        let rebased: Vec<_> = engine.pending().map(|entry| entry.operation.clone()).collect();
        assert_eq!(rebased, vec![Operation::discrete(a, ArrayMove { from_index: 1, to_index: 3 })]);
        assert_eq!(engine.value(), json!({ "a": [0.0, 3.0, 4.0, 1.0] }));
    }

    #[test]
    fn test_ack_drains_queue_in_order() {
        let mut engine = engine(json!({ "s": "" }));
        let s = id_at(&engine, Path::root().child("s"));
        for i in 0..2 {
            engine
                .submit_local(Operation::discrete(s.clone(), StringInsert { index: i, value: "x".into() }))
                .unwrap();
        }

        engine.handle_ack(OperationAck::new(0, 0)).unwrap();
        assert_eq!(engine.state(), SyncState::PendingAck);
        engine.handle_ack(OperationAck::new(1, 1)).unwrap();
        assert_eq!(engine.state(), SyncState::Synchronized);
        assert_eq!(engine.version(), 2);

        let events = engine.drain_events();
        assert!(events.contains(&SessionEvent::Acknowledged { seq_no: 1, version: 1 }));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::StateChanged { from: SyncState::PendingAck, to: SyncState::Synchronized })
        );
    }

    #[test]
    fn test_out_of_order_ack_diverges() {
        let mut engine = engine(json!({ "s": "" }));
        let s = id_at(&engine, Path::root().child("s"));
        for _ in 0..2 {
            engine
                .submit_local(Operation::discrete(s.clone(), StringInsert { index: 0, value: "x".into() }))
                .unwrap();
        }

        let err = engine.handle_ack(OperationAck::new(1, 0)).unwrap_err();
        assert_eq!(err, EngineError::OutOfOrderAck { expected: 0, received: 1 });
        assert_eq!(engine.state(), SyncState::Diverged);
        assert_eq!(engine.pending_len(), 2);

        let err = engine.handle_ack(OperationAck::new(0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { state: SyncState::Diverged, .. }));
    }

    #[test]
    fn test_ack_without_pending_is_unexpected() {
        let mut engine = engine(json!({}));
        let err = engine.handle_ack(OperationAck::new(0, 0)).unwrap_err();
        assert_eq!(err, EngineError::UnexpectedAck(0));
        assert!(err.requires_resync());
    }

    #[test]
    fn test_version_gap_diverges() {
        let mut engine = engine(json!({ "s": "" }));
        let s = id_at(&engine, Path::root().child("s"));
        let err = engine
            .handle_remote(ModelOperationEvent::new("other", 3, Operation::discrete(s, StringSet { value: "q".into() })))
            .unwrap_err();
        assert_eq!(err, EngineError::VersionMismatch { expected: 0, received: 3 });
        assert_eq!(engine.state(), SyncState::Diverged);
        assert_eq!(engine.value(), json!({ "s": "" }));
    }

    #[test]
    fn test_rejected_local_op_is_not_queued() {
        let mut engine = engine(json!({ "s": "ab" }));
        let s = id_at(&engine, Path::root().child("s"));
        let err = engine
            .submit_local(Operation::discrete(s, StringInsert { index: 9, value: "x".into() }))
            .unwrap_err();
        assert!(matches!(err, EngineError::Tree(_)));
        assert!(!err.is_fatal());
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.state(), SyncState::Synchronized);
    }

    #[test]
    fn test_pending_limit() {
        let mut values = DataValueFactory::new("init");
        let tree = DocumentTree::new(values.from_json(&json!({ "s": "" }))).unwrap();
        let config = EngineConfig { max_pending: 1, ..EngineConfig::new("me") };
        let mut engine = ClientEngine::new(config, tree, 0);
        let s = id_at(&engine, Path::root().child("s"));

        engine
            .submit_local(Operation::discrete(s.clone(), StringInsert { index: 0, value: "x".into() }))
            .unwrap();
        let err = engine
            .submit_local(Operation::discrete(s, StringInsert { index: 0, value: "y".into() }))
            .unwrap_err();
        assert_eq!(err, EngineError::PendingLimitExceeded(1));
        assert_eq!(engine.value(), json!({ "s": "x" }));
    }

    #[test]
    fn test_transport_failure_holds_queue_until_resync() {
        let mut engine = engine(json!({ "s": "" }));
        let s = id_at(&engine, Path::root().child("s"));

        engine
            .submit_local(Operation::discrete(s.clone(), StringInsert { index: 0, value: "a".into() }))
            .unwrap();
        engine.transport_failed();
        assert_eq!(engine.state(), SyncState::Disconnected);

        engine
            .submit_local(Operation::discrete(s, StringInsert { index: 1, value: "b".into() }))
            .unwrap();
        assert_eq!(engine.state(), SyncState::Disconnected);
        assert!(matches!(
            engine.handle_ack(OperationAck::new(0, 0)).unwrap_err(),
            EngineError::InvalidState { state: SyncState::Disconnected, .. }
        ));

        assert_eq!(engine.begin_resync(0).unwrap(), None);
        let resend = engine.complete_resync(Ok(vec![])).unwrap();
        let seqs: Vec<_> = resend.iter().map(|entry| entry.seq_no).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(engine.state(), SyncState::PendingAck);
    }

    #[test]
    fn test_remote_remove_past_end_is_reported() {
        let mut engine = engine(json!({ "s": "abc" }));
        let s = id_at(&engine, Path::root().child("s"));

        engine
            .submit_local(Operation::discrete(s.clone(), StringInsert { index: 0, value: "x".into() }))
            .unwrap();
        let err = engine
            .handle_remote(ModelOperationEvent::new(
                "other",
                0,
                Operation::discrete(s, StringRemove { index: 1, length: usize::MAX }),
            ))
            .unwrap_err();

        assert!(matches!(err, EngineError::RemoteApply { version: 0, .. }));
        assert_eq!(engine.state(), SyncState::Unrecoverable);
        assert_eq!(engine.value(), json!({ "s": "xabc" }));
    }
}
