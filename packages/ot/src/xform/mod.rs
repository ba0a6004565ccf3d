//! # Transformation
//!
//! Resolves concurrency between a server-ordered operation and a client
//! operation generated against the same document state.
//!
//! ```text
//!            s
//!     D ----------> D·s
//!     |              |
//!   c |              | c'
//!     v              v
//!    D·c ---------> D·s·c'  ==  D·c·s'
//!            s'
//! ```
//!
//! `transform(s, c)` returns `(s', c')`: the client applies `s'` after its own
//! `c`, the server applies `c'` after `s`. Both paths reach the same value.
//!
//! Each node kind has one module with one function per registered pair of
//! operation kinds. Only one direction of a mixed pair is written out; the
//! other direction swaps the arguments and swaps the result back. The pair
//! matches are written without wildcards, so an unhandled pair fails to
//! compile.

pub mod array;
pub mod number;
pub mod object;
pub mod scalar;
pub mod string;

use crate::error::TransformError;
use crate::ops::{
    ArrayInsert, ArrayMove, ArrayRemove, ArrayReplace, ArraySet, BooleanSet, Change, DateSet,
    DiscreteOperation, NumberAdd, NumberSet, ObjectAddProperty, ObjectRemoveProperty, ObjectSet,
    ObjectSetProperty, Operation, OperationKind, StringInsert, StringRemove, StringSet,
};
use crate::value::NodeId;
use tracing::{error, trace};

/// Result of transforming a server operation against a client operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPair<T = DiscreteOperation> {
    /// What the client applies after its own operation
    pub server: T,

    /// What the server applies after its own operation
    pub client: T,
}

impl<T> OperationPair<T> {
    pub fn new(server: T, client: T) -> Self {
        Self { server, client }
    }

    pub fn swap(self) -> Self {
        Self {
            server: self.client,
            client: self.server,
        }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> OperationPair<U> {
        OperationPair {
            server: f(self.server),
            client: f(self.client),
        }
    }
}

/// Tree shape needed to transform operations on different nodes
pub trait Ancestry {
    /// True when `ancestor` is a strict ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: &NodeId, descendant: &NodeId) -> bool;
}

/// Treats every pair of distinct nodes as unrelated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrelated;

impl Ancestry for Unrelated {
    fn is_ancestor(&self, _ancestor: &NodeId, _descendant: &NodeId) -> bool {
        false
    }
}

/// How a pair of operation kinds reaches its transform function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A function exists for this exact order
    Direct,
    /// Only the reverse order has a function; arguments and result are swapped
    Inverse,
}

/// Registration of an ordered pair of operation kinds, or `None` when the
/// kinds target different node kinds.
pub fn registration(server: OperationKind, client: OperationKind) -> Option<Registration> {
    use OperationKind::*;

    if server.node_kind() != client.node_kind() {
        return None;
    }
    let direct = matches!(
        (server, client),
        (StringInsert, StringInsert | StringRemove | StringSet)
            | (StringRemove, StringRemove | StringSet)
            | (StringSet, StringSet)
            | (ArrayInsert, ArrayInsert | ArrayRemove | ArrayReplace | ArrayMove | ArraySet)
            | (ArrayRemove, ArrayRemove | ArrayReplace | ArrayMove | ArraySet)
            | (ArrayReplace, ArrayReplace | ArrayMove | ArraySet)
            | (ArrayMove, ArrayMove | ArraySet)
            | (ArraySet, ArraySet)
            | (
                ObjectAddProperty,
                ObjectAddProperty | ObjectSetProperty | ObjectRemoveProperty | ObjectSet
            )
            | (ObjectSetProperty, ObjectSetProperty | ObjectRemoveProperty | ObjectSet)
            | (ObjectRemoveProperty, ObjectRemoveProperty | ObjectSet)
            | (ObjectSet, ObjectSet)
            | (NumberAdd, NumberAdd | NumberSet)
            | (NumberSet, NumberSet)
            | (BooleanSet, BooleanSet)
            | (DateSet, DateSet)
    );
    Some(if direct { Registration::Direct } else { Registration::Inverse })
}

/// Transforms `server` against `client`.
///
/// Compound operations are transformed element by element: each element of
/// a compound is transformed against the running result of the other side.
/// Operations on different nodes pass through unchanged unless one side is a
/// container `Set` on an ancestor of the other side's target, in which case
/// the descendant operation becomes a no-op.
pub fn transform<A>(
    server: &Operation,
    client: &Operation,
    ancestry: &A,
) -> Result<OperationPair<Operation>, TransformError>
where
    A: Ancestry + ?Sized,
{
    match (server, client) {
        (Operation::Compound(compound), _) => {
            let mut client = client.clone();
            let mut ops = Vec::with_capacity(compound.ops.len());
            for op in &compound.ops {
                let pair = transform(op, &client, ancestry)?;
                ops.push(pair.server);
                client = pair.client;
            }
            Ok(OperationPair::new(Operation::compound(ops), client))
        }
        (_, Operation::Compound(compound)) => {
            let mut server = server.clone();
            let mut ops = Vec::with_capacity(compound.ops.len());
            for op in &compound.ops {
                let pair = transform(&server, op, ancestry)?;
                server = pair.server;
                ops.push(pair.client);
            }
            Ok(OperationPair::new(server, Operation::compound(ops)))
        }
        (Operation::Discrete(s), Operation::Discrete(c)) => {
            Ok(transform_discrete(s, c, ancestry)?.map(Operation::Discrete))
        }
    }
}

/// Transforms two discrete operations.
pub fn transform_discrete<A>(
    s: &DiscreteOperation,
    c: &DiscreteOperation,
    ancestry: &A,
) -> Result<OperationPair, TransformError>
where
    A: Ancestry + ?Sized,
{
    if s.no_op || c.no_op {
        return Ok(OperationPair::new(s.clone(), c.clone()));
    }

    if s.id != c.id {
        if discards_subtree(s) && ancestry.is_ancestor(&s.id, &c.id) {
            trace!(ancestor = %s.id, descendant = %c.id, "Server set discards client operation");
            return Ok(OperationPair::new(s.clone(), c.as_no_op()));
        }
        if discards_subtree(c) && ancestry.is_ancestor(&c.id, &s.id) {
            trace!(ancestor = %c.id, descendant = %s.id, "Client set discards server operation");
            return Ok(OperationPair::new(s.as_no_op(), c.clone()));
        }
        return Ok(OperationPair::new(s.clone(), c.clone()));
    }

    trace!(node = %s.id, server = %s.kind(), client = %c.kind(), "Transforming");

    let pair = match (View::of(&s.change), View::of(&c.change)) {
        (View::String(sv), View::String(cv)) => dispatch_string(s, sv, c, cv),
        (View::Array(sv), View::Array(cv)) => dispatch_array(s, sv, c, cv),
        (View::Object(sv), View::Object(cv)) => dispatch_object(s, sv, c, cv),
        (View::Number(sv), View::Number(cv)) => dispatch_number(s, sv, c, cv),
        (View::Boolean(sv), View::Boolean(cv)) => scalar::boolean_set_set(s, sv, c, cv),
        (View::Date(sv), View::Date(cv)) => scalar::date_set_set(s, sv, c, cv),
        _ => {
            error!(node = %s.id, server = %s.kind(), client = %c.kind(), "Operations disagree on node kind");
            return Err(TransformError::NodeKindMismatch {
                id: s.id.clone(),
                server: s.kind(),
                client: c.kind(),
            });
        }
    };
    Ok(pair)
}

fn discards_subtree(op: &DiscreteOperation) -> bool {
    let kind = op.kind();
    kind.is_value_set() && kind.node_kind().is_container()
}

/// Borrowed view of a change grouped by node kind
enum View<'a> {
    String(StringView<'a>),
    Array(ArrayView<'a>),
    Object(ObjectView<'a>),
    Number(NumberView<'a>),
    Boolean(&'a BooleanSet),
    Date(&'a DateSet),
}

enum StringView<'a> {
    Insert(&'a StringInsert),
    Remove(&'a StringRemove),
    Set(&'a StringSet),
}

enum ArrayView<'a> {
    Insert(&'a ArrayInsert),
    Remove(&'a ArrayRemove),
    Replace(&'a ArrayReplace),
    Move(&'a ArrayMove),
    Set(&'a ArraySet),
}

enum ObjectView<'a> {
    Add(&'a ObjectAddProperty),
    SetProperty(&'a ObjectSetProperty),
    RemoveProperty(&'a ObjectRemoveProperty),
    Set(&'a ObjectSet),
}

enum NumberView<'a> {
    Add(&'a NumberAdd),
    Set(&'a NumberSet),
}

impl<'a> View<'a> {
    fn of(change: &'a Change) -> Self {
        match change {
            Change::StringInsert(c) => View::String(StringView::Insert(c)),
            Change::StringRemove(c) => View::String(StringView::Remove(c)),
            Change::StringSet(c) => View::String(StringView::Set(c)),
            Change::ArrayInsert(c) => View::Array(ArrayView::Insert(c)),
            Change::ArrayRemove(c) => View::Array(ArrayView::Remove(c)),
            Change::ArrayReplace(c) => View::Array(ArrayView::Replace(c)),
            Change::ArrayMove(c) => View::Array(ArrayView::Move(c)),
            Change::ArraySet(c) => View::Array(ArrayView::Set(c)),
            Change::ObjectAddProperty(c) => View::Object(ObjectView::Add(c)),
            Change::ObjectSetProperty(c) => View::Object(ObjectView::SetProperty(c)),
            Change::ObjectRemoveProperty(c) => View::Object(ObjectView::RemoveProperty(c)),
            Change::ObjectSet(c) => View::Object(ObjectView::Set(c)),
            Change::NumberAdd(c) => View::Number(NumberView::Add(c)),
            Change::NumberSet(c) => View::Number(NumberView::Set(c)),
            Change::BooleanSet(c) => View::Boolean(c),
            Change::DateSet(c) => View::Date(c),
        }
    }
}

fn dispatch_string(
    s: &DiscreteOperation,
    sv: StringView<'_>,
    c: &DiscreteOperation,
    cv: StringView<'_>,
) -> OperationPair {
    use StringView::*;

    match (sv, cv) {
        (Insert(a), Insert(b)) => string::insert_insert(s, a, c, b),
        (Insert(a), Remove(b)) => string::insert_remove(s, a, c, b),
        (Insert(a), Set(b)) => string::insert_set(s, a, c, b),
        (Remove(a), Insert(b)) => string::insert_remove(c, b, s, a).swap(),
        (Remove(a), Remove(b)) => string::remove_remove(s, a, c, b),
        (Remove(a), Set(b)) => string::remove_set(s, a, c, b),
        (Set(a), Insert(b)) => string::insert_set(c, b, s, a).swap(),
        (Set(a), Remove(b)) => string::remove_set(c, b, s, a).swap(),
        (Set(a), Set(b)) => string::set_set(s, a, c, b),
    }
}

fn dispatch_array(
    s: &DiscreteOperation,
    sv: ArrayView<'_>,
    c: &DiscreteOperation,
    cv: ArrayView<'_>,
) -> OperationPair {
    use ArrayView::*;

    match (sv, cv) {
        (Insert(a), Insert(b)) => array::insert_insert(s, a, c, b),
        (Insert(a), Remove(b)) => array::insert_remove(s, a, c, b),
        (Insert(a), Replace(b)) => array::insert_replace(s, a, c, b),
        (Insert(a), Move(b)) => array::insert_move(s, a, c, b),
        (Insert(a), Set(b)) => array::insert_set(s, a, c, b),

        (Remove(a), Insert(b)) => array::insert_remove(c, b, s, a).swap(),
        (Remove(a), Remove(b)) => array::remove_remove(s, a, c, b),
        (Remove(a), Replace(b)) => array::remove_replace(s, a, c, b),
        (Remove(a), Move(b)) => array::remove_move(s, a, c, b),
        (Remove(a), Set(b)) => array::remove_set(s, a, c, b),

        (Replace(a), Insert(b)) => array::insert_replace(c, b, s, a).swap(),
        (Replace(a), Remove(b)) => array::remove_replace(c, b, s, a).swap(),
        (Replace(a), Replace(b)) => array::replace_replace(s, a, c, b),
        (Replace(a), Move(b)) => array::replace_move(s, a, c, b),
        (Replace(a), Set(b)) => array::replace_set(s, a, c, b),

        (Move(a), Insert(b)) => array::insert_move(c, b, s, a).swap(),
        (Move(a), Remove(b)) => array::remove_move(c, b, s, a).swap(),
        (Move(a), Replace(b)) => array::replace_move(c, b, s, a).swap(),
        (Move(a), Move(b)) => array::move_move(s, a, c, b),
        (Move(a), Set(b)) => array::move_set(s, a, c, b),

        (Set(a), Insert(b)) => array::insert_set(c, b, s, a).swap(),
        (Set(a), Remove(b)) => array::remove_set(c, b, s, a).swap(),
        (Set(a), Replace(b)) => array::replace_set(c, b, s, a).swap(),
        (Set(a), Move(b)) => array::move_set(c, b, s, a).swap(),
        (Set(a), Set(b)) => array::set_set(s, a, c, b),
    }
}

fn dispatch_object(
    s: &DiscreteOperation,
    sv: ObjectView<'_>,
    c: &DiscreteOperation,
    cv: ObjectView<'_>,
) -> OperationPair {
    use ObjectView::*;

    match (sv, cv) {
        (Add(a), Add(b)) => object::add_add(s, a, c, b),
        (Add(a), SetProperty(b)) => object::add_set_property(s, a, c, b),
        (Add(a), RemoveProperty(b)) => object::add_remove_property(s, a, c, b),
        (Add(a), Set(b)) => object::add_set(s, a, c, b),

        (SetProperty(a), Add(b)) => object::add_set_property(c, b, s, a).swap(),
        (SetProperty(a), SetProperty(b)) => object::set_property_set_property(s, a, c, b),
        (SetProperty(a), RemoveProperty(b)) => object::set_property_remove_property(s, a, c, b),
        (SetProperty(a), Set(b)) => object::set_property_set(s, a, c, b),

        (RemoveProperty(a), Add(b)) => object::add_remove_property(c, b, s, a).swap(),
        (RemoveProperty(a), SetProperty(b)) => {
            object::set_property_remove_property(c, b, s, a).swap()
        }
        (RemoveProperty(a), RemoveProperty(b)) => {
            object::remove_property_remove_property(s, a, c, b)
        }
        (RemoveProperty(a), Set(b)) => object::remove_property_set(s, a, c, b),

        (Set(a), Add(b)) => object::add_set(c, b, s, a).swap(),
        (Set(a), SetProperty(b)) => object::set_property_set(c, b, s, a).swap(),
        (Set(a), RemoveProperty(b)) => object::remove_property_set(c, b, s, a).swap(),
        (Set(a), Set(b)) => object::set_set(s, a, c, b),
    }
}

fn dispatch_number(
    s: &DiscreteOperation,
    sv: NumberView<'_>,
    c: &DiscreteOperation,
    cv: NumberView<'_>,
) -> OperationPair {
    use NumberView::*;

    match (sv, cv) {
        (Add(a), Add(b)) => number::add_add(s, a, c, b),
        (Add(a), Set(b)) => number::add_set(s, a, c, b),
        (Set(a), Add(b)) => number::add_set(c, b, s, a).swap(),
        (Set(a), Set(b)) => number::set_set(s, a, c, b),
    }
}
