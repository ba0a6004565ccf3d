//! Arena nodes.

use crate::path::Path;
use chrono::{DateTime, Utc};
use coedit_ot::{NodeId, NodeKind};
use std::collections::BTreeMap;

/// A node stored in the tree arena. Containers hold the ids of their
/// children; `parent` is a non-owning back-reference used for paths and
/// ancestry checks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeData {
    Object(BTreeMap<String, NodeId>),
    Array(Vec<NodeId>),
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Null,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Object(_) => NodeKind::Object,
            NodeData::Array(_) => NodeKind::Array,
            NodeData::String(_) => NodeKind::String,
            NodeData::Number(_) => NodeKind::Number,
            NodeData::Boolean(_) => NodeKind::Boolean,
            NodeData::Date(_) => NodeKind::Date,
            NodeData::Null => NodeKind::Null,
        }
    }
}

/// Read-only snapshot of one attached node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,

    pub kind: NodeKind,

    pub parent: Option<NodeId>,

    pub path: Path,

    /// Deep value of the node as plain JSON
    pub value: serde_json::Value,
}
