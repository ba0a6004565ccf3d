//! # Operation Model
//!
//! Immutable descriptions of node mutations.
//!
//! An operation targets one node by id. Transformation never edits an
//! operation in place; it builds a copy with some fields overridden
//! (`with_change`, `as_no_op`). An operation whose `no_op` flag is set keeps
//! its place in a sequence but applies as the identity.
//!
//! Indices are not range-checked here. The document tree validates them when
//! the operation is applied.
//!
//! ## Wire shape
//!
//! ```text
//! { "type": "StringInsert", "id": "s1:4", "noOp": false, "index": 2, "value": "ab" }
//! { "type": "Compound", "ops": [ ... ] }
//! ```

use crate::value::{DataValue, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of discrete operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    StringInsert,
    StringRemove,
    StringSet,
    ArrayInsert,
    ArrayRemove,
    ArrayReplace,
    ArrayMove,
    ArraySet,
    ObjectAddProperty,
    ObjectSetProperty,
    ObjectRemoveProperty,
    ObjectSet,
    NumberAdd,
    NumberSet,
    BooleanSet,
    DateSet,
}

impl OperationKind {
    pub const ALL: [OperationKind; 16] = [
        OperationKind::StringInsert,
        OperationKind::StringRemove,
        OperationKind::StringSet,
        OperationKind::ArrayInsert,
        OperationKind::ArrayRemove,
        OperationKind::ArrayReplace,
        OperationKind::ArrayMove,
        OperationKind::ArraySet,
        OperationKind::ObjectAddProperty,
        OperationKind::ObjectSetProperty,
        OperationKind::ObjectRemoveProperty,
        OperationKind::ObjectSet,
        OperationKind::NumberAdd,
        OperationKind::NumberSet,
        OperationKind::BooleanSet,
        OperationKind::DateSet,
    ];

    /// Kind of node this operation applies to
    pub fn node_kind(self) -> NodeKind {
        match self {
            OperationKind::StringInsert | OperationKind::StringRemove | OperationKind::StringSet => {
                NodeKind::String
            }
            OperationKind::ArrayInsert
            | OperationKind::ArrayRemove
            | OperationKind::ArrayReplace
            | OperationKind::ArrayMove
            | OperationKind::ArraySet => NodeKind::Array,
            OperationKind::ObjectAddProperty
            | OperationKind::ObjectSetProperty
            | OperationKind::ObjectRemoveProperty
            | OperationKind::ObjectSet => NodeKind::Object,
            OperationKind::NumberAdd | OperationKind::NumberSet => NodeKind::Number,
            OperationKind::BooleanSet => NodeKind::Boolean,
            OperationKind::DateSet => NodeKind::Date,
        }
    }

    /// Whole-value replacement of the target node
    pub fn is_value_set(self) -> bool {
        matches!(
            self,
            OperationKind::StringSet
                | OperationKind::ArraySet
                | OperationKind::ObjectSet
                | OperationKind::NumberSet
                | OperationKind::BooleanSet
                | OperationKind::DateSet
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringInsert {
    pub index: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringRemove {
    pub index: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringSet {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayInsert {
    pub index: usize,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRemove {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayReplace {
    pub index: usize,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayMove {
    pub from_index: usize,
    pub to_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySet {
    pub value: Vec<DataValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAddProperty {
    pub key: String,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSetProperty {
    pub key: String,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRemoveProperty {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSet {
    pub value: BTreeMap<String, DataValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberAdd {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberSet {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanSet {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateSet {
    pub value: DateTime<Utc>,
}

/// Variant-specific payload of a discrete operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Change {
    StringInsert(StringInsert),
    StringRemove(StringRemove),
    StringSet(StringSet),
    ArrayInsert(ArrayInsert),
    ArrayRemove(ArrayRemove),
    ArrayReplace(ArrayReplace),
    ArrayMove(ArrayMove),
    ArraySet(ArraySet),
    ObjectAddProperty(ObjectAddProperty),
    ObjectSetProperty(ObjectSetProperty),
    ObjectRemoveProperty(ObjectRemoveProperty),
    ObjectSet(ObjectSet),
    NumberAdd(NumberAdd),
    NumberSet(NumberSet),
    BooleanSet(BooleanSet),
    DateSet(DateSet),
}

macro_rules! change_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Change {
                fn from(change: $variant) -> Self {
                    Change::$variant(change)
                }
            }
        )*
    };
}

change_from!(
    StringInsert,
    StringRemove,
    StringSet,
    ArrayInsert,
    ArrayRemove,
    ArrayReplace,
    ArrayMove,
    ArraySet,
    ObjectAddProperty,
    ObjectSetProperty,
    ObjectRemoveProperty,
    ObjectSet,
    NumberAdd,
    NumberSet,
    BooleanSet,
    DateSet,
);

impl Change {
    pub fn kind(&self) -> OperationKind {
        match self {
            Change::StringInsert(_) => OperationKind::StringInsert,
            Change::StringRemove(_) => OperationKind::StringRemove,
            Change::StringSet(_) => OperationKind::StringSet,
            Change::ArrayInsert(_) => OperationKind::ArrayInsert,
            Change::ArrayRemove(_) => OperationKind::ArrayRemove,
            Change::ArrayReplace(_) => OperationKind::ArrayReplace,
            Change::ArrayMove(_) => OperationKind::ArrayMove,
            Change::ArraySet(_) => OperationKind::ArraySet,
            Change::ObjectAddProperty(_) => OperationKind::ObjectAddProperty,
            Change::ObjectSetProperty(_) => OperationKind::ObjectSetProperty,
            Change::ObjectRemoveProperty(_) => OperationKind::ObjectRemoveProperty,
            Change::ObjectSet(_) => OperationKind::ObjectSet,
            Change::NumberAdd(_) => OperationKind::NumberAdd,
            Change::NumberSet(_) => OperationKind::NumberSet,
            Change::BooleanSet(_) => OperationKind::BooleanSet,
            Change::DateSet(_) => OperationKind::DateSet,
        }
    }

    /// Values whose nodes this change would create
    pub fn created_values(&self) -> Vec<&DataValue> {
        match self {
            Change::ArrayInsert(c) => vec![&c.value],
            Change::ArrayReplace(c) => vec![&c.value],
            Change::ArraySet(c) => c.value.iter().collect(),
            Change::ObjectAddProperty(c) => vec![&c.value],
            Change::ObjectSetProperty(c) => vec![&c.value],
            Change::ObjectSet(c) => c.value.values().collect(),
            _ => Vec::new(),
        }
    }
}

/// One mutation of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteOperation {
    pub id: NodeId,

    #[serde(rename = "noOp", default)]
    pub no_op: bool,

    #[serde(flatten)]
    pub change: Change,
}

impl DiscreteOperation {
    pub fn new(id: impl Into<NodeId>, change: impl Into<Change>) -> Self {
        Self {
            id: id.into(),
            no_op: false,
            change: change.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.change.kind()
    }

    /// Copy of this operation that applies as the identity
    pub fn as_no_op(&self) -> Self {
        Self {
            no_op: true,
            ..self.clone()
        }
    }

    /// Copy of this operation with the payload replaced; id and flag are kept
    pub fn with_change(&self, change: impl Into<Change>) -> Self {
        Self {
            id: self.id.clone(),
            no_op: self.no_op,
            change: change.into(),
        }
    }
}

/// Ordered operations applied and transformed as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Compound")]
pub struct CompoundOperation {
    pub ops: Vec<Operation>,
}

/// A discrete operation or a compound transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operation {
    Discrete(DiscreteOperation),
    Compound(CompoundOperation),
}

impl Operation {
    pub fn discrete(id: impl Into<NodeId>, change: impl Into<Change>) -> Self {
        Operation::Discrete(DiscreteOperation::new(id, change))
    }

    pub fn compound(ops: Vec<Operation>) -> Self {
        Operation::Compound(CompoundOperation { ops })
    }

    /// Removes several properties as one transaction.
    pub fn remove_properties<I, K>(id: impl Into<NodeId>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let id = id.into();
        Operation::compound(
            keys.into_iter()
                .map(|key| Operation::discrete(id.clone(), ObjectRemoveProperty { key: key.into() }))
                .collect(),
        )
    }

    /// Sets several properties as one transaction.
    pub fn set_properties<I, K>(id: impl Into<NodeId>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, DataValue)>,
        K: Into<String>,
    {
        let id = id.into();
        Operation::compound(
            entries
                .into_iter()
                .map(|(key, value)| {
                    Operation::discrete(id.clone(), ObjectSetProperty { key: key.into(), value })
                })
                .collect(),
        )
    }

    /// True when applying this operation changes nothing.
    ///
    /// A compound is a no-op when every element is.
    pub fn is_no_op(&self) -> bool {
        match self {
            Operation::Discrete(op) => op.no_op,
            Operation::Compound(compound) => compound.ops.iter().all(Operation::is_no_op),
        }
    }

    pub fn as_no_op(&self) -> Self {
        match self {
            Operation::Discrete(op) => Operation::Discrete(op.as_no_op()),
            Operation::Compound(compound) => Operation::compound(
                compound.ops.iter().map(Operation::as_no_op).collect(),
            ),
        }
    }

    /// Discrete operations in application order
    pub fn discrete_ops(&self) -> Vec<&DiscreteOperation> {
        let mut out = Vec::new();
        self.collect_discrete(&mut out);
        out
    }

    fn collect_discrete<'a>(&'a self, out: &mut Vec<&'a DiscreteOperation>) {
        match self {
            Operation::Discrete(op) => out.push(op),
            Operation::Compound(compound) => {
                for op in &compound.ops {
                    op.collect_discrete(out);
                }
            }
        }
    }

    /// Ids of every node this operation would create
    pub fn created_node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for op in self.discrete_ops() {
            for value in op.change.created_values() {
                value.collect_ids(&mut ids);
            }
        }
        ids
    }
}

impl From<DiscreteOperation> for Operation {
    fn from(op: DiscreteOperation) -> Self {
        Operation::Discrete(op)
    }
}
