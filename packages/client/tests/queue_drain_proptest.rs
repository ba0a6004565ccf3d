//! A remote operation arriving over a queue of local edits must leave the
//! client where the server ends up once it commits the rebased queue.

use coedit_client::{ClientEngine, EngineConfig, ModelOperationEvent, OperationAck, SyncState};
use coedit_model::{DataValueFactory, DocumentTree, Path};
use coedit_ot::{
    ArrayInsert, ArrayMove, ArrayRemove, ArrayReplace, DataValue, NodeId, ObjectAddProperty,
    ObjectRemoveProperty, ObjectSetProperty, Operation, StringInsert, StringRemove, StringSet,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

const BASE: &str = "hello world";
const ITEMS: usize = 4;
const KEYS: [&str; 4] = ["a", "b", "c", "d"];

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, String),
    Remove(usize, usize),
    Set(String),
    ItemInsert(usize),
    ItemRemove(usize),
    ItemReplace(usize),
    ItemMove(usize, usize),
    AddProperty(usize),
    SetProperty(usize),
    RemoveProperty(usize),
    Compound(Vec<Edit>),
}

fn leaf() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (any::<usize>(), "[a-z]{1,3}").prop_map(|(at, text)| Edit::Insert(at, text)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(at, len)| Edit::Remove(at, len)),
        1 => "[A-Z]{0,4}".prop_map(Edit::Set),
        2 => any::<usize>().prop_map(Edit::ItemInsert),
        2 => any::<usize>().prop_map(Edit::ItemRemove),
        2 => any::<usize>().prop_map(Edit::ItemReplace),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(from, to)| Edit::ItemMove(from, to)),
        2 => any::<usize>().prop_map(Edit::AddProperty),
        2 => any::<usize>().prop_map(Edit::SetProperty),
        2 => any::<usize>().prop_map(Edit::RemoveProperty),
    ]
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        5 => leaf(),
        1 => prop::collection::vec(leaf(), 2..4).prop_map(Edit::Compound),
    ]
}

/// Issues fresh value ids for one peer.
struct Values {
    prefix: &'static str,
    next: usize,
}

impl Values {
    fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 0 }
    }

    fn fresh(&mut self) -> DataValue {
        let id = format!("{}:{}", self.prefix, self.next);
        self.next += 1;
        DataValue::string(id.clone(), id)
    }
}

struct Nodes {
    text: NodeId,
    items: NodeId,
    props: NodeId,
}

impl Nodes {
    fn of(tree: &DocumentTree) -> Self {
        let at = |key: &str| tree.node_at(&Path::root().child(key)).unwrap().id;
        Self { text: at("s"), items: at("items"), props: at("props") }
    }
}

/// What an edit needs to know about the document to resolve into a valid
/// operation.
#[derive(Debug, Clone)]
struct Shape {
    text: usize,
    items: usize,
    keys: BTreeSet<String>,
}

impl Shape {
    fn base() -> Self {
        Self {
            text: BASE.chars().count(),
            items: ITEMS,
            keys: ["a", "b"].into_iter().map(String::from).collect(),
        }
    }

    fn resolve(&mut self, nodes: &Nodes, values: &mut Values, edit: &Edit) -> Operation {
        let text = nodes.text.clone();
        let items = nodes.items.clone();
        let props = nodes.props.clone();

        match edit {
            Edit::Insert(at, value) => {
                let index = at % (self.text + 1);
                self.text += value.chars().count();
                Operation::discrete(text, StringInsert { index, value: value.clone() })
            }
            Edit::Remove(at, span) if self.text > 0 => {
                let index = at % self.text;
                let length = 1 + span % (self.text - index);
                self.text -= length;
                Operation::discrete(text, StringRemove { index, length })
            }
            Edit::Remove(..) => self.resolve(nodes, values, &Edit::Insert(0, "_".into())),
            Edit::Set(value) => {
                self.text = value.chars().count();
                Operation::discrete(text, StringSet { value: value.clone() })
            }

            Edit::ItemInsert(at) => {
                let index = at % (self.items + 1);
                self.items += 1;
                Operation::discrete(items, ArrayInsert { index, value: values.fresh() })
            }
            Edit::ItemRemove(at) if self.items > 0 => {
                let index = at % self.items;
                self.items -= 1;
                Operation::discrete(items, ArrayRemove { index })
            }
            Edit::ItemReplace(at) if self.items > 0 => {
                let index = at % self.items;
                Operation::discrete(items, ArrayReplace { index, value: values.fresh() })
            }
            Edit::ItemMove(from, to) if self.items > 0 => {
                let (from_index, to_index) = (from % self.items, to % self.items);
                Operation::discrete(items, ArrayMove { from_index, to_index })
            }
            Edit::ItemRemove(at) | Edit::ItemReplace(at) | Edit::ItemMove(at, _) => {
                self.resolve(nodes, values, &Edit::ItemInsert(*at))
            }

            Edit::AddProperty(k) => {
                let absent: Vec<&str> = KEYS.into_iter().filter(|key| !self.keys.contains(*key)).collect();
                if absent.is_empty() {
                    return self.resolve(nodes, values, &Edit::SetProperty(*k));
                }
                let key = absent[k % absent.len()].to_string();
                self.keys.insert(key.clone());
                Operation::discrete(props, ObjectAddProperty { key, value: values.fresh() })
            }
            Edit::SetProperty(k) | Edit::RemoveProperty(k) if self.keys.is_empty() => {
                self.resolve(nodes, values, &Edit::AddProperty(*k))
            }
            Edit::SetProperty(k) => {
                let key = self.keys.iter().nth(k % self.keys.len()).cloned().unwrap_or_default();
                Operation::discrete(props, ObjectSetProperty { key, value: values.fresh() })
            }
            Edit::RemoveProperty(k) => {
                let key = self.keys.iter().nth(k % self.keys.len()).cloned().unwrap_or_default();
                self.keys.remove(&key);
                Operation::discrete(props, ObjectRemoveProperty { key })
            }

            Edit::Compound(edits) => Operation::compound(
                edits.iter().map(|edit| self.resolve(nodes, values, edit)).collect(),
            ),
        }
    }
}

fn tree() -> DocumentTree {
    let mut values = DataValueFactory::new("base");
    let doc = json!({ "s": BASE, "items": ["w", "x", "y", "z"], "props": { "a": 1, "b": 2 } });
    DocumentTree::new(values.from_json(&doc)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn remote_over_local_queue_matches_server(
        local in prop::collection::vec(edit(), 1..8),
        remote in leaf(),
    ) {
        let mut engine = ClientEngine::new(EngineConfig::new("me"), tree(), 0);
        let nodes = Nodes::of(engine.tree());

        let mut shape = Shape::base();
        let mut mine = Values::new("me");
        for edit in &local {
            engine.submit_local(shape.resolve(&nodes, &mut mine, edit)).unwrap();
        }

        let remote = Shape::base().resolve(&nodes, &mut Values::new("peer"), &remote);
        engine.handle_remote(ModelOperationEvent::new("peer", 0, remote.clone())).unwrap();

        // Server: the remote operation first, then the queue as rebased.
        let mut server = tree();
        server.apply_remote(&ModelOperationEvent::new("peer", 0, remote)).unwrap();
        for (version, entry) in engine.pending().enumerate() {
            let event = ModelOperationEvent::new("me", version as u64 + 1, entry.operation.clone());
            server.apply_remote(&event).unwrap();
        }

        prop_assert_eq!(engine.tree().snapshot().unwrap(), server.snapshot().unwrap());

        for seq_no in 0..local.len() as u64 {
            engine.handle_ack(OperationAck::new(seq_no, seq_no + 1)).unwrap();
        }
        prop_assert_eq!(engine.state(), SyncState::Synchronized);
        prop_assert_eq!(engine.version(), local.len() as u64 + 1);
    }
}
