//! # Data Values
//!
//! Typed values carried by operations that create nodes (`Set`, `Insert`,
//! `Replace`, `AddProperty`, `SetProperty`).
//!
//! Every node inside a value carries its own id. Ids are assigned by the
//! session that creates the value and are never reused, so a peer can target
//! a node that another session created.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable, opaque node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of a document node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Date,
    Null,
}

impl NodeKind {
    /// Containers own child nodes; a `Set` on them discards a whole subtree.
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Object | NodeKind::Array)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Date => "date",
            NodeKind::Null => "null",
        };
        f.write_str(name)
    }
}

/// A value tree with a node id at every level
///
/// Equality is structural and includes ids: two values that render the same
/// JSON but were created by different sessions are different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataValue {
    Object {
        id: NodeId,
        children: BTreeMap<String, DataValue>,
    },
    Array {
        id: NodeId,
        children: Vec<DataValue>,
    },
    String {
        id: NodeId,
        value: String,
    },
    Number {
        id: NodeId,
        value: f64,
    },
    Boolean {
        id: NodeId,
        value: bool,
    },
    Date {
        id: NodeId,
        value: DateTime<Utc>,
    },
    Null {
        id: NodeId,
    },
}

impl DataValue {
    pub fn object(id: impl Into<NodeId>, children: BTreeMap<String, DataValue>) -> Self {
        DataValue::Object { id: id.into(), children }
    }

    pub fn array(id: impl Into<NodeId>, children: Vec<DataValue>) -> Self {
        DataValue::Array { id: id.into(), children }
    }

    pub fn string(id: impl Into<NodeId>, value: impl Into<String>) -> Self {
        DataValue::String { id: id.into(), value: value.into() }
    }

    pub fn number(id: impl Into<NodeId>, value: f64) -> Self {
        DataValue::Number { id: id.into(), value }
    }

    pub fn boolean(id: impl Into<NodeId>, value: bool) -> Self {
        DataValue::Boolean { id: id.into(), value }
    }

    pub fn date(id: impl Into<NodeId>, value: DateTime<Utc>) -> Self {
        DataValue::Date { id: id.into(), value }
    }

    pub fn null(id: impl Into<NodeId>) -> Self {
        DataValue::Null { id: id.into() }
    }

    pub fn id(&self) -> &NodeId {
        match self {
            DataValue::Object { id, .. }
            | DataValue::Array { id, .. }
            | DataValue::String { id, .. }
            | DataValue::Number { id, .. }
            | DataValue::Boolean { id, .. }
            | DataValue::Date { id, .. }
            | DataValue::Null { id } => id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            DataValue::Object { .. } => NodeKind::Object,
            DataValue::Array { .. } => NodeKind::Array,
            DataValue::String { .. } => NodeKind::String,
            DataValue::Number { .. } => NodeKind::Number,
            DataValue::Boolean { .. } => NodeKind::Boolean,
            DataValue::Date { .. } => NodeKind::Date,
            DataValue::Null { .. } => NodeKind::Null,
        }
    }

    /// All node ids in this value, depth-first, parent before children.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    pub(crate) fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id().clone());
        match self {
            DataValue::Object { children, .. } => {
                for child in children.values() {
                    child.collect_ids(out);
                }
            }
            DataValue::Array { children, .. } => {
                for child in children {
                    child.collect_ids(out);
                }
            }
            _ => {}
        }
    }

    /// Plain JSON rendering without ids. Dates render as RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            DataValue::Object { children, .. } => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect(),
            ),
            DataValue::Array { children, .. } => {
                Value::Array(children.iter().map(DataValue::to_json).collect())
            }
            DataValue::String { value, .. } => Value::String(value.clone()),
            DataValue::Number { value, .. } => number_to_json(*value),
            DataValue::Boolean { value, .. } => Value::Bool(*value),
            DataValue::Date { value, .. } => Value::String(date_to_json(value)),
            DataValue::Null { .. } => Value::Null,
        }
    }
}

/// Non-finite numbers have no JSON form and render as `null`.
pub fn number_to_json(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

pub fn date_to_json(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DataValue {
        let mut children = BTreeMap::new();
        children.insert("title".to_string(), DataValue::string("t", "Hello"));
        children.insert(
            "tags".to_string(),
            DataValue::array("a", vec![DataValue::number("n1", 1.0), DataValue::null("n2")]),
        );
        DataValue::object("root", children)
    }

    #[test]
    fn test_node_ids_parent_first() {
        let ids = sample().node_ids();
        assert_eq!(ids[0], NodeId::from("root"));
        assert_eq!(ids.len(), 5);
        assert!(ids.contains(&NodeId::from("n2")));
    }

    #[test]
    fn test_to_json_drops_ids() {
        assert_eq!(
            sample().to_json(),
            json!({ "title": "Hello", "tags": [1.0, null] })
        );
    }

    #[test]
    fn test_equality_includes_ids() {
        assert_ne!(DataValue::string("a", "x"), DataValue::string("b", "x"));
        assert_eq!(DataValue::string("a", "x"), DataValue::string("a", "x"));
    }

    #[test]
    fn test_wire_shape_is_tagged() {
        let encoded = serde_json::to_value(DataValue::boolean("b1", true)).unwrap();
        assert_eq!(encoded, json!({ "type": "boolean", "id": "b1", "value": true }));
    }

    #[test]
    fn test_non_finite_number_renders_null() {
        assert_eq!(DataValue::number("x", f64::NAN).to_json(), json!(null));
    }
}
