//! The central composite type (§3).

use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::cell::Cell;
use crate::scope::Scope;
use crate::span::Span;

/// A process-wide unique tuple identity, used to key the provenance recorder
/// (§4.7) and to name cycle chains (§4.8) independent of any particular key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId(u64);

impl TupleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct TupleData {
    pub id: TupleId,
    /// Order-preserving for deterministic traversal (§3); not semantically significant.
    pub entries: IndexMap<String, Cell>,
    pub own_scope: Scope,
    pub supers: Vec<Tuple>,
    pub origin: Span,
}

/// A reference-counted handle to a [`TupleData`].
///
/// Tuple identity is reference identity: composing never mutates an existing
/// tuple, it produces a new one (§3), so two `Tuple`s are "the same tuple" exactly
/// when their `Rc`s point at the same allocation.
#[derive(Debug, Clone)]
pub struct Tuple(Rc<TupleData>);

impl Tuple {
    /// Builds a tuple whose own scope's `locals` is a `Weak` back-edge to itself.
    ///
    /// `make_entries` receives the partially-built own scope so that deferred
    /// cells declared directly in this tuple can close over it; the own scope's
    /// `locals` only becomes upgradable once this call returns and the `Rc` is
    /// fully constructed; that's fine, nothing forces a cell during construction.
    pub fn new(
        up: Option<Scope>,
        super_: Option<Scope>,
        supers: Vec<Tuple>,
        origin: Span,
        make_entries: impl FnOnce(&Scope) -> IndexMap<String, Cell>,
    ) -> Tuple {
        let rc = Rc::new_cyclic(|weak: &Weak<TupleData>| {
            let own_scope = Scope::new(Some(weak.clone()), up, super_, origin.clone());
            let entries = make_entries(&own_scope);
            TupleData {
                id: TupleId::next(),
                entries,
                own_scope,
                supers,
                origin,
            }
        });
        Tuple(rc)
    }

    /// The empty tuple: composition's identity element (§4.3).
    pub fn empty(origin: Span) -> Tuple {
        Tuple::new(None, None, Vec::new(), origin, |_| IndexMap::new())
    }

    /// Wraps an already-constructed `TupleData`, e.g. one recovered by upgrading a
    /// scope's `Weak<TupleData>` locals back-edge.
    pub fn from_rc(rc: Rc<TupleData>) -> Tuple {
        Tuple(rc)
    }

    pub fn id(&self) -> TupleId {
        self.0.id
    }

    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.contains_key(key)
    }

    pub fn get_cell(&self, key: &str) -> Option<&Cell> {
        self.0.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.entries.keys().map(String::as_str)
    }

    pub fn own_scope(&self) -> &Scope {
        &self.0.own_scope
    }

    pub fn supers(&self) -> &[Tuple] {
        &self.0.supers
    }

    pub fn origin(&self) -> &Span {
        &self.0.origin
    }

    pub fn data(&self) -> &Rc<TupleData> {
        &self.0
    }

    pub fn ptr_eq(a: &Tuple, b: &Tuple) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}
