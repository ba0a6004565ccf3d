//! # Document Tree
//!
//! Arena of typed nodes addressed by [`NodeId`]. Operations arrive already
//! transformed; the tree only validates and applies them.
//!
//! ## Node lifecycle
//!
//! ```text
//! attached ──(removed, replaced or overwritten by a Set)──> detached
//! ```
//!
//! A detached id stays known so that a late remote operation naming it can be
//! recognised and skipped. Local operations on a detached node fail with
//! [`TreeError::Detached`].
//!
//! ## Atomicity
//!
//! A discrete operation is fully validated before anything is mutated. A
//! compound operation is applied against a checkpoint and rolled back on the
//! first failing element. Change events are delivered only after the whole
//! operation succeeded.

use crate::error::TreeError;
use crate::events::{ChangeEvent, ChangeKind, EventFilter, Listeners, SubscriptionId};
use crate::node::{Node, NodeData, NodeView};
use crate::path::{Path, PathElement};
use crate::protocol::ModelOperationEvent;
use crate::reference::{ModelReference, ReferenceFilter, ReferenceMap, ReferenceValue};
use coedit_ot::{
    date_to_json, number_to_json, Ancestry, Change, DataValue, DiscreteOperation, NodeId,
    NodeKind, Operation,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Who produced the operation being applied
#[derive(Debug, Clone, Copy)]
enum Origin<'a> {
    Local,
    Remote(&'a str),
}

impl Origin<'_> {
    fn event(
        &self,
        node_id: NodeId,
        path: Path,
        kind: ChangeKind,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> ChangeEvent {
        ChangeEvent {
            node_id,
            path,
            kind,
            old_value,
            new_value,
            local: matches!(self, Origin::Local),
            session_id: match self {
                Origin::Local => None,
                Origin::Remote(session) => Some(session.to_string()),
            },
        }
    }
}

/// State restored when a compound operation fails part way
struct Checkpoint {
    nodes: HashMap<NodeId, Node>,
    detached: HashSet<NodeId>,
    references: HashMap<NodeId, ReferenceMap>,
}

pub struct DocumentTree {
    root: NodeId,

    nodes: HashMap<NodeId, Node>,

    /// Ids that left the tree, or that were never created because the
    /// operation creating them was superseded
    detached: HashSet<NodeId>,

    references: HashMap<NodeId, ReferenceMap>,

    listeners: Listeners,

    emit_local_events: bool,

    /// Set by [`DocumentTree::detach`]; every later call fails
    closed: bool,
}

impl fmt::Debug for DocumentTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("detached", &self.detached.len())
            .field("listeners", &self.listeners.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl DocumentTree {
    /// Builds a tree whose root is `value`.
    pub fn new(value: DataValue) -> Result<Self, TreeError> {
        let mut tree = Self {
            root: value.id().clone(),
            nodes: HashMap::new(),
            detached: HashSet::new(),
            references: HashMap::new(),
            listeners: Listeners::default(),
            emit_local_events: true,
            closed: false,
        };
        tree.check_new_ids([&value])?;
        tree.attach_value(&value, None);
        Ok(tree)
    }

    /// Whether subscribers see changes made through [`apply_local`](Self::apply_local).
    pub fn with_local_events(mut self, emit: bool) -> Self {
        self.emit_local_events = emit;
        self
    }

    pub fn set_emit_local_events(&mut self, emit: bool) {
        self.emit_local_events = emit;
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Number of attached nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_detached(&self, id: &NodeId) -> bool {
        self.detached.contains(id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies an operation produced by this client.
    pub fn apply_local(&mut self, op: &Operation) -> Result<(), TreeError> {
        self.apply(op, Origin::Local)
    }

    /// Applies an operation committed by the server on behalf of another
    /// session. Elements targeting a node that is already detached here are
    /// skipped.
    pub fn apply_remote(&mut self, event: &ModelOperationEvent) -> Result<(), TreeError> {
        self.apply(&event.operation, Origin::Remote(&event.session_id))
    }

    /// Records ids that will never be created because the operation creating
    /// them was superseded. Later operations on them are skipped as detached.
    pub fn mark_superseded(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            if !self.nodes.contains_key(&id) {
                self.detached.insert(id);
            }
        }
    }

    /// Closes the tree: subscribers and references are dropped and every
    /// later mutation fails with [`TreeError::TreeDetached`].
    pub fn detach(&mut self) {
        debug!(root = %self.root, "Detaching document tree");
        self.closed = true;
        self.listeners.clear();
        self.references.clear();
    }

    pub fn on(
        &mut self,
        filter: EventFilter,
        handler: impl FnMut(&ChangeEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.listeners.add(filter, Box::new(handler))
    }

    pub fn off(&mut self, subscription: SubscriptionId) -> bool {
        self.listeners.remove(subscription)
    }

    pub fn node(&self, id: &NodeId) -> Result<NodeView, TreeError> {
        let node = self.attached(id)?;
        Ok(NodeView {
            id: id.clone(),
            kind: node.data.kind(),
            parent: node.parent.clone(),
            path: self.path_of(id)?,
            value: self.json(id).unwrap_or(serde_json::Value::Null),
        })
    }

    pub fn node_at(&self, path: &Path) -> Result<NodeView, TreeError> {
        let mut current = &self.root;
        for element in path.elements() {
            let node = self.attached(current)?;
            let next = match (&node.data, element) {
                (NodeData::Object(children), PathElement::Key(key)) => children.get(key),
                (NodeData::Array(children), PathElement::Index(index)) => children.get(*index),
                _ => None,
            };
            current = next.ok_or_else(|| TreeError::PathNotFound(path.clone()))?;
        }
        self.node(current)
    }

    pub fn path_of(&self, id: &NodeId) -> Result<Path, TreeError> {
        let mut elements = Vec::new();
        let mut current = self.attached(id)?;

        while let Some(parent_id) = &current.parent {
            let parent = self.attached(parent_id)?;
            let element = match &parent.data {
                NodeData::Object(children) => children
                    .iter()
                    .find(|(_, child)| **child == current.id)
                    .map(|(key, _)| PathElement::Key(key.clone())),
                NodeData::Array(children) => children
                    .iter()
                    .position(|child| *child == current.id)
                    .map(PathElement::Index),
                _ => None,
            };
            elements.push(element.ok_or_else(|| TreeError::NodeNotFound(current.id.clone()))?);
            current = parent;
        }

        elements.reverse();
        Ok(elements.into_iter().collect())
    }

    /// Deep snapshot of the whole document as plain JSON.
    pub fn value(&self) -> serde_json::Value {
        self.json(&self.root).unwrap_or(serde_json::Value::Null)
    }

    /// Deep snapshot of one node, ids included.
    pub fn data_value(&self, id: &NodeId) -> Result<DataValue, TreeError> {
        let node = self.attached(id)?;
        let id = node.id.clone();
        Ok(match &node.data {
            NodeData::Object(children) => DataValue::Object {
                id,
                children: children
                    .iter()
                    .map(|(key, child)| self.data_value(child).map(|value| (key.clone(), value)))
                    .collect::<Result<BTreeMap<_, _>, TreeError>>()?,
            },
            NodeData::Array(children) => DataValue::Array {
                id,
                children: children
                    .iter()
                    .map(|child| self.data_value(child))
                    .collect::<Result<Vec<_>, TreeError>>()?,
            },
            NodeData::String(value) => DataValue::String { id, value: value.clone() },
            NodeData::Number(value) => DataValue::Number { id, value: *value },
            NodeData::Boolean(value) => DataValue::Boolean { id, value: *value },
            NodeData::Date(value) => DataValue::Date { id, value: *value },
            NodeData::Null => DataValue::Null { id },
        })
    }

    /// Deep snapshot of the root, ids included.
    pub fn snapshot(&self) -> Result<DataValue, TreeError> {
        self.data_value(&self.root)
    }

    pub fn set_reference(&mut self, node: &NodeId, reference: ModelReference) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.attached(node)?;
        self.references.entry(node.clone()).or_default().put(reference)
    }

    pub fn reference(&self, node: &NodeId, session_id: &str, key: &str) -> Option<&ModelReference> {
        self.references.get(node)?.get(session_id, key)
    }

    pub fn references(&self, node: &NodeId, filter: &ReferenceFilter) -> Vec<&ModelReference> {
        self.references
            .get(node)
            .map(|map| map.get_all(filter))
            .unwrap_or_default()
    }

    pub fn remove_reference(&mut self, node: &NodeId, session_id: &str, key: &str) -> Option<ModelReference> {
        self.references.get_mut(node)?.remove(session_id, key)
    }

    /// Drops every reference owned by a session, e.g. when it leaves.
    pub fn remove_session_references(&mut self, session_id: &str) {
        for map in self.references.values_mut() {
            map.remove_by_session(session_id);
        }
    }

    fn ensure_open(&self) -> Result<(), TreeError> {
        if self.closed {
            Err(TreeError::TreeDetached)
        } else {
            Ok(())
        }
    }

    fn attached(&self, id: &NodeId) -> Result<&Node, TreeError> {
        if self.detached.contains(id) {
            return Err(TreeError::Detached(id.clone()));
        }
        self.nodes.get(id).ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    fn apply(&mut self, op: &Operation, origin: Origin<'_>) -> Result<(), TreeError> {
        self.ensure_open()?;
        if op.is_no_op() {
            return Ok(());
        }

        let mut events = Vec::new();
        match op {
            Operation::Discrete(discrete) => self.apply_discrete(discrete, origin, &mut events)?,
            Operation::Compound(_) => {
                let checkpoint = self.checkpoint();
                for discrete in op.discrete_ops() {
                    if discrete.no_op {
                        continue;
                    }
                    if let Err(err) = self.apply_discrete(discrete, origin, &mut events) {
                        debug!(error = %err, "Rolling back compound operation");
                        self.restore(checkpoint);
                        return Err(err);
                    }
                }
            }
        }

        if matches!(origin, Origin::Local) && !self.emit_local_events {
            return Ok(());
        }
        for event in &events {
            self.listeners.emit(event);
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.nodes.clone(),
            detached: self.detached.clone(),
            references: self.references.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.nodes = checkpoint.nodes;
        self.detached = checkpoint.detached;
        self.references = checkpoint.references;
    }

    fn apply_discrete(
        &mut self,
        op: &DiscreteOperation,
        origin: Origin<'_>,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), TreeError> {
        let id = &op.id;

        if self.detached.contains(id) {
            if let Origin::Remote(session) = origin {
                warn!(node = %id, kind = %op.kind(), session = %session, "Skipping remote operation on detached node");
                let created = op.change.created_values().into_iter().flat_map(DataValue::node_ids);
                self.detached.extend(created);
                return Ok(());
            }
            return Err(TreeError::Detached(id.clone()));
        }

        let found = self.attached(id)?.data.kind();
        let expected = op.kind().node_kind();
        if found != expected {
            return Err(TreeError::TypeMismatch { id: id.clone(), expected, found });
        }

        let path = self.path_of(id)?;
        let old_value = self.json(id);

        match &op.change {
            Change::StringInsert(c) => {
                let text = self.string_mut(id)?;
                let len = text.chars().count();
                if c.index > len {
                    return Err(TreeError::IndexOutOfBounds { id: id.clone(), index: c.index, len });
                }
                let at = byte_offset(text, c.index);
                text.insert_str(at, &c.value);
                let inserted = c.value.chars().count();
                self.transform_references(id, |r| r.handle_insert(c.index, inserted));
            }
            Change::StringRemove(c) => {
                let text = self.string_mut(id)?;
                let len = text.chars().count();
                let end = match c.index.checked_add(c.length) {
                    Some(end) if end <= len => end,
                    _ => {
                        return Err(TreeError::RangeOutOfBounds {
                            id: id.clone(),
                            index: c.index,
                            length: c.length,
                            len,
                        })
                    }
                };
                let start = byte_offset(text, c.index);
                let end = byte_offset(text, end);
                text.replace_range(start..end, "");
                self.transform_references(id, |r| r.handle_remove(c.index, c.length));
            }
            Change::StringSet(c) => {
                *self.string_mut(id)? = c.value.clone();
                self.references.remove(id);
            }

            Change::ArrayInsert(c) => {
                let len = self.array_mut(id)?.len();
                if c.index > len {
                    return Err(TreeError::IndexOutOfBounds { id: id.clone(), index: c.index, len });
                }
                self.check_new_ids([&c.value])?;
                let child = self.attach_value(&c.value, Some(id));
                self.array_mut(id)?.insert(c.index, child);
                self.transform_references(id, |r| r.handle_insert(c.index, 1));
            }
            Change::ArrayRemove(c) => {
                let children = self.array_mut(id)?;
                let len = children.len();
                if c.index >= len {
                    return Err(TreeError::IndexOutOfBounds { id: id.clone(), index: c.index, len });
                }
                let child = children.remove(c.index);
                self.detach_subtree(&child, path.child(c.index), origin, events);
                self.transform_references(id, |r| r.handle_remove(c.index, 1));
            }
            Change::ArrayReplace(c) => {
                let len = self.array_mut(id)?.len();
                if c.index >= len {
                    return Err(TreeError::IndexOutOfBounds { id: id.clone(), index: c.index, len });
                }
                self.check_new_ids([&c.value])?;
                let child = self.attach_value(&c.value, Some(id));
                let old = std::mem::replace(&mut self.array_mut(id)?[c.index], child);
                self.detach_subtree(&old, path.child(c.index), origin, events);
            }
            Change::ArrayMove(c) => {
                let children = self.array_mut(id)?;
                let len = children.len();
                for index in [c.from_index, c.to_index] {
                    if index >= len {
                        return Err(TreeError::IndexOutOfBounds { id: id.clone(), index, len });
                    }
                }
                let child = children.remove(c.from_index);
                children.insert(c.to_index, child);
                self.transform_references(id, |r| r.handle_reorder(c.from_index, c.to_index));
            }
            Change::ArraySet(c) => {
                self.array_mut(id)?;
                self.check_new_ids(c.value.iter())?;
                let old = std::mem::take(self.array_mut(id)?);
                for (index, child) in old.iter().enumerate() {
                    self.detach_subtree(child, path.child(index), origin, events);
                }
                let children: Vec<NodeId> =
                    c.value.iter().map(|value| self.attach_value(value, Some(id))).collect();
                *self.array_mut(id)? = children;
                self.references.remove(id);
            }

            Change::ObjectAddProperty(c) => {
                if self.object_mut(id)?.contains_key(&c.key) {
                    return Err(TreeError::PropertyExists { id: id.clone(), key: c.key.clone() });
                }
                self.check_new_ids([&c.value])?;
                let child = self.attach_value(&c.value, Some(id));
                self.object_mut(id)?.insert(c.key.clone(), child);
            }
            Change::ObjectSetProperty(c) => {
                let old = self.object_mut(id)?.get(&c.key).cloned().ok_or_else(|| {
                    TreeError::PropertyNotFound { id: id.clone(), key: c.key.clone() }
                })?;
                self.check_new_ids([&c.value])?;
                self.detach_subtree(&old, path.child(c.key.clone()), origin, events);
                let child = self.attach_value(&c.value, Some(id));
                self.object_mut(id)?.insert(c.key.clone(), child);
            }
            Change::ObjectRemoveProperty(c) => {
                let old = self.object_mut(id)?.remove(&c.key).ok_or_else(|| {
                    TreeError::PropertyNotFound { id: id.clone(), key: c.key.clone() }
                })?;
                self.detach_subtree(&old, path.child(c.key.clone()), origin, events);
            }
            Change::ObjectSet(c) => {
                self.object_mut(id)?;
                self.check_new_ids(c.value.values())?;
                let old = std::mem::take(self.object_mut(id)?);
                for (key, child) in &old {
                    self.detach_subtree(child, path.child(key.clone()), origin, events);
                }
                let children: BTreeMap<String, NodeId> = c
                    .value
                    .iter()
                    .map(|(key, value)| (key.clone(), self.attach_value(value, Some(id))))
                    .collect();
                *self.object_mut(id)? = children;
                self.references.remove(id);
            }

            Change::NumberAdd(c) => {
                if let NodeData::Number(value) = self.data_mut(id)? {
                    *value += c.value;
                }
            }
            Change::NumberSet(c) => {
                if let NodeData::Number(value) = self.data_mut(id)? {
                    *value = c.value;
                }
            }
            Change::BooleanSet(c) => {
                if let NodeData::Boolean(value) = self.data_mut(id)? {
                    *value = c.value;
                }
            }
            Change::DateSet(c) => {
                if let NodeData::Date(value) = self.data_mut(id)? {
                    *value = c.value;
                }
            }
        }

        debug!(node = %id, kind = %op.kind(), local = matches!(origin, Origin::Local), "Applied operation");
        let new_value = self.json(id);
        events.push(origin.event(id.clone(), path, ChangeKind::Applied(op.kind()), old_value, new_value));
        Ok(())
    }

    /// Fails when any id in `values` is already known to the tree or repeats.
    fn check_new_ids<'a>(&self, values: impl IntoIterator<Item = &'a DataValue>) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        for value in values {
            for id in value.node_ids() {
                if self.nodes.contains_key(&id) || self.detached.contains(&id) || !seen.insert(id.clone()) {
                    return Err(TreeError::DuplicateNodeId(id));
                }
            }
        }
        Ok(())
    }

    fn attach_value(&mut self, value: &DataValue, parent: Option<&NodeId>) -> NodeId {
        let id = value.id().clone();
        let data = match value {
            DataValue::Object { children, .. } => NodeData::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), self.attach_value(child, Some(&id))))
                    .collect(),
            ),
            DataValue::Array { children, .. } => NodeData::Array(
                children.iter().map(|child| self.attach_value(child, Some(&id))).collect(),
            ),
            DataValue::String { value, .. } => NodeData::String(value.clone()),
            DataValue::Number { value, .. } => NodeData::Number(*value),
            DataValue::Boolean { value, .. } => NodeData::Boolean(*value),
            DataValue::Date { value, .. } => NodeData::Date(*value),
            DataValue::Null { .. } => NodeData::Null,
        };
        self.nodes.insert(
            id.clone(),
            Node { id: id.clone(), parent: parent.cloned(), data },
        );
        id
    }

    /// Removes a node and its descendants from the arena, leaving their ids
    /// marked detached. The caller has already unlinked it from its parent.
    fn detach_subtree(
        &mut self,
        id: &NodeId,
        path: Path,
        origin: Origin<'_>,
        events: &mut Vec<ChangeEvent>,
    ) {
        let old_value = self.json(id);
        let Some(node) = self.nodes.remove(id) else {
            return;
        };

        match &node.data {
            NodeData::Object(children) => {
                for (key, child) in children {
                    self.detach_subtree(child, path.child(key.clone()), origin, events);
                }
            }
            NodeData::Array(children) => {
                for (index, child) in children.iter().enumerate() {
                    self.detach_subtree(child, path.child(index), origin, events);
                }
            }
            _ => {}
        }

        self.references.remove(id);
        self.detached.insert(id.clone());
        events.push(origin.event(id.clone(), path, ChangeKind::Detached, old_value, None));
    }

    fn transform_references(&mut self, id: &NodeId, f: impl Fn(&ReferenceValue) -> ReferenceValue) {
        if let Some(map) = self.references.get_mut(id) {
            map.transform(f);
        }
    }

    fn data_mut(&mut self, id: &NodeId) -> Result<&mut NodeData, TreeError> {
        self.nodes
            .get_mut(id)
            .map(|node| &mut node.data)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    fn string_mut(&mut self, id: &NodeId) -> Result<&mut String, TreeError> {
        match self.data_mut(id)? {
            NodeData::String(text) => Ok(text),
            other => Err(mismatch(id, NodeKind::String, other.kind())),
        }
    }

    fn array_mut(&mut self, id: &NodeId) -> Result<&mut Vec<NodeId>, TreeError> {
        match self.data_mut(id)? {
            NodeData::Array(children) => Ok(children),
            other => Err(mismatch(id, NodeKind::Array, other.kind())),
        }
    }

    fn object_mut(&mut self, id: &NodeId) -> Result<&mut BTreeMap<String, NodeId>, TreeError> {
        match self.data_mut(id)? {
            NodeData::Object(children) => Ok(children),
            other => Err(mismatch(id, NodeKind::Object, other.kind())),
        }
    }

    fn json(&self, id: &NodeId) -> Option<serde_json::Value> {
        use serde_json::Value;

        let node = self.nodes.get(id)?;
        Some(match &node.data {
            NodeData::Object(children) => Value::Object(
                children
                    .iter()
                    .filter_map(|(key, child)| Some((key.clone(), self.json(child)?)))
                    .collect(),
            ),
            NodeData::Array(children) => {
                Value::Array(children.iter().filter_map(|child| self.json(child)).collect())
            }
            NodeData::String(text) => Value::String(text.clone()),
            NodeData::Number(value) => number_to_json(*value),
            NodeData::Boolean(value) => Value::Bool(*value),
            NodeData::Date(value) => Value::String(date_to_json(value)),
            NodeData::Null => Value::Null,
        })
    }
}

impl Ancestry for DocumentTree {
    fn is_ancestor(&self, ancestor: &NodeId, descendant: &NodeId) -> bool {
        let parent_of = |id: &NodeId| self.nodes.get(id).and_then(|node| node.parent.as_ref());

        let mut current = parent_of(descendant);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = parent_of(parent);
        }
        false
    }
}

fn mismatch(id: &NodeId, expected: NodeKind, found: NodeKind) -> TreeError {
    TreeError::TypeMismatch { id: id.clone(), expected, found }
}

/// Byte offset of the `chars`-th character, or the end of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(offset, _)| offset)
}
