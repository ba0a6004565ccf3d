//! # Coedit Client
//!
//! Client side of server-ordered collaborative editing: applies local edits
//! optimistically, rebases them over operations the server commits first,
//! and recovers from connection gaps by replaying history.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ SessionHandle (clone per caller)            │
//! └─────────────────────────────────────────────┘
//!                     ↓ commands (mpsc)
//! ┌─────────────────────────────────────────────┐
//! │ actor task                                  │
//! │  - ClientEngine: pending queue + versions   │
//! │  - Transport: send ops, fetch history       │
//! └─────────────────────────────────────────────┘
//!                     ↓ SessionEvent (broadcast)
//! ┌─────────────────────────────────────────────┐
//! │ subscribers: UI, persistence, telemetry     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Server order is truth**: the server's commit order decides every conflict
//! 2. **Local first**: local edits show up before the server has seen them
//! 3. **Fail loudly**: out-of-order input stops the session instead of guessing
//!
//! ## Usage
//!
//! ```rust
//! use coedit_client::{ClientEngine, EngineConfig, ModelOperationEvent, OperationAck};
//! use coedit_model::{DataValueFactory, DocumentTree, Path};
//! use coedit_ot::{Operation, StringInsert};
//! use serde_json::json;
//!
//! let mut values = DataValueFactory::new("me");
//! let tree = DocumentTree::new(values.from_json(&json!({ "title": "ac" })))?;
//! let mut engine = ClientEngine::new(EngineConfig::new("me"), tree, 0);
//! let title = engine.tree().node_at(&Path::root().child("title"))?.id;
//!
//! engine.submit_local(Operation::discrete(title.clone(), StringInsert { index: 1, value: "b".into() }))?;
//! engine.handle_remote(ModelOperationEvent::new(
//!     "peer",
//!     0,
//!     Operation::discrete(title, StringInsert { index: 0, value: ">".into() }),
//! ))?;
//! engine.handle_ack(OperationAck::new(0, 1))?;
//!
//! assert_eq!(engine.value(), json!({ "title": ">abc" }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod actor;
mod config;
mod engine;
mod error;
mod events;
mod protocol;
mod state;
mod transport;

pub use actor::{spawn, EngineStatus, SessionHandle};
pub use config::EngineConfig;
pub use engine::ClientEngine;
pub use error::EngineError;
pub use events::SessionEvent;
pub use protocol::{HistoryRequest, ModelOperationEvent, OperationAck, UnprocessedOperationEvent};
pub use state::SyncState;
pub use transport::{HistoryError, Transport, TransportError};
