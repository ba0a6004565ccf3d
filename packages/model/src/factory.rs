//! Node id generation and construction of [`DataValue`]s from plain JSON.

use chrono::{DateTime, Utc};
use coedit_ot::{DataValue, NodeId};
use std::collections::BTreeMap;

/// Issues `"{prefix}:{n}"` ids. Prefixes are unique per session, so ids never
/// collide across peers.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), next: 0 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(format!("{}:{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// Builds id-carrying values for operations that create nodes
#[derive(Debug, Clone)]
pub struct DataValueFactory {
    ids: IdGenerator,
}

impl DataValueFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { ids: IdGenerator::new(prefix) }
    }

    /// Converts JSON into a value tree with a fresh id on every node.
    pub fn from_json(&mut self, value: &serde_json::Value) -> DataValue {
        use serde_json::Value;

        let id = self.ids.next_id();
        match value {
            Value::Null => DataValue::Null { id },
            Value::Bool(b) => DataValue::Boolean { id, value: *b },
            Value::Number(n) => DataValue::Number { id, value: n.as_f64().unwrap_or(0.0) },
            Value::String(s) => DataValue::String { id, value: s.clone() },
            Value::Array(items) => DataValue::Array {
                id,
                children: items.iter().map(|item| self.from_json(item)).collect(),
            },
            Value::Object(map) => DataValue::Object {
                id,
                children: map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.from_json(item)))
                    .collect::<BTreeMap<_, _>>(),
            },
        }
    }

    pub fn date(&mut self, value: DateTime<Utc>) -> DataValue {
        DataValue::Date { id: self.ids.next_id(), value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_are_sequential_and_prefixed() {
        let mut ids = IdGenerator::new("s1");
        assert_eq!(ids.next_id(), NodeId::from("s1:0"));
        assert_eq!(ids.next_id(), NodeId::from("s1:1"));
    }

    #[test]
    fn test_from_json_assigns_unique_ids() {
        let mut factory = DataValueFactory::new("s1");
        let value = factory.from_json(&json!({ "a": [1, "x", null], "b": true }));

        let ids = value.node_ids();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), 6);
        assert_eq!(unique.len(), ids.len());
        assert_eq!(value.to_json(), json!({ "a": [1.0, "x", null], "b": true }));
    }
}
