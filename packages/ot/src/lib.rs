//! # Coedit OT
//!
//! Operation model and transformation library for server-ordered
//! collaborative editing of a typed JSON-like document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ value: DataValue, NodeId, NodeKind          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ ops: discrete + compound operations         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ xform: transform(server, client) → (s', c') │
//! │  - per node kind transform functions        │
//! │  - index/range algebra (index)              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Server order is truth**: ties resolve in favour of the server operation
//! 2. **Values win over edits**: a whole-value `Set` discards concurrent edits
//! 3. **Operations are immutable**: transforms build new operations
//!
//! ## Usage
//!
//! ```rust
//! use coedit_ot::{transform, Operation, StringInsert, Unrelated};
//!
//! let server = Operation::discrete("s1", StringInsert { index: 0, value: "ab".into() });
//! let client = Operation::discrete("s1", StringInsert { index: 0, value: "x".into() });
//!
//! let pair = transform(&server, &client, &Unrelated).unwrap();
//! assert_eq!(
//!     pair.client,
//!     Operation::discrete("s1", StringInsert { index: 2, value: "x".into() })
//! );
//! ```

mod error;
pub mod index;
mod ops;
mod value;
pub mod xform;

pub use error::TransformError;
pub use index::{IndexRange, MoveDirection, RangeIndexRelationship, RangeTransformer};
pub use ops::{
    ArrayInsert, ArrayMove, ArrayRemove, ArrayReplace, ArraySet, BooleanSet, Change,
    CompoundOperation, DateSet, DiscreteOperation, NumberAdd, NumberSet, ObjectAddProperty,
    ObjectRemoveProperty, ObjectSet, ObjectSetProperty, Operation, OperationKind, StringInsert,
    StringRemove, StringSet,
};
pub use value::{date_to_json, number_to_json, DataValue, NodeId, NodeKind};
pub use xform::{
    registration, transform, transform_discrete, Ancestry, OperationPair, Registration, Unrelated,
};
