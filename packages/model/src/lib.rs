//! # Coedit Model
//!
//! The client's local copy of a collaborative document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ot: operations + transforms                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ model: DocumentTree                         │
//! │  - node arena with parent back-references   │
//! │  - validated apply (local / remote)         │
//! │  - change events + subscriptions            │
//! │  - references (cursors, selections)         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ client: reconciliation engine               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use coedit_model::{DataValueFactory, DocumentTree, Path};
//! use coedit_ot::{NumberAdd, Operation};
//! use serde_json::json;
//!
//! let mut values = DataValueFactory::new("s1");
//! let mut tree = DocumentTree::new(values.from_json(&json!({ "count": 1 })))?;
//!
//! let count = tree.node_at(&Path::root().child("count"))?.id;
//! tree.apply_local(&Operation::discrete(count, NumberAdd { value: 2.0 }))?;
//!
//! assert_eq!(tree.value(), json!({ "count": 3.0 }));
//! # Ok::<(), coedit_model::TreeError>(())
//! ```

mod error;
mod events;
mod factory;
mod node;
mod path;
mod protocol;
mod reference;
mod tree;

pub use error::TreeError;
pub use events::{ChangeEvent, ChangeKind, EventFilter, Handler, SubscriptionId};
pub use factory::{DataValueFactory, IdGenerator};
pub use node::NodeView;
pub use path::{Path, PathElement};
pub use protocol::ModelOperationEvent;
pub use reference::{ModelReference, ReferenceFilter, ReferenceMap, ReferenceValue};
pub use tree::DocumentTree;
