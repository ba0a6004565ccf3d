//! # Change Events
//!
//! Every effective mutation of the tree produces one [`ChangeEvent`] for the
//! target node, plus a `Detached` event for each node removed with it.
//! No-op operations produce nothing.

use crate::path::Path;
use coedit_ot::{NodeId, OperationKind};
use serde::{Deserialize, Serialize};

/// What happened to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// An operation of this kind was applied to the node
    Applied(OperationKind),
    /// The node left the tree
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub node_id: NodeId,

    /// Path of the node when the change happened
    pub path: Path,

    pub kind: ChangeKind,

    /// Node value before the change, as plain JSON
    pub old_value: Option<serde_json::Value>,

    /// Node value after the change; `None` once detached
    pub new_value: Option<serde_json::Value>,

    /// True for changes made through `apply_local`
    pub local: bool,

    /// Session that originated a remote change
    pub session_id: Option<String>,
}

/// Selects which events a subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum EventFilter {
    All,
    /// Events on one node
    Node(NodeId),
    /// Events on a node or anywhere below it
    Subtree(Path),
    Kind(ChangeKind),
    /// Remote events only
    Remote,
}

impl EventFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Node(id) => &event.node_id == id,
            EventFilter::Subtree(path) => event.path.starts_with(path),
            EventFilter::Kind(kind) => &event.kind == kind,
            EventFilter::Remote => !event.local,
        }
    }
}

/// Handle returned by [`crate::DocumentTree::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Box<dyn FnMut(&ChangeEvent) + Send>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, EventFilter, Handler)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, filter: EventFilter, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, filter, handler));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn emit(&mut self, event: &ChangeEvent) {
        for (_, filter, handler) in self.entries.iter_mut() {
            if filter.matches(event) {
                handler(event);
            }
        }
    }
}
