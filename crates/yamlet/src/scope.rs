//! Dynamic scoping records (§3, §4.2).

use std::rc::{Rc, Weak};

use crate::span::Span;
use crate::tuple::TupleData;

/// `{ locals, up, super }`, shared by cloning the inner `Rc` (cheap, and necessary
/// since a tuple's own entries each carry a clone of its own_scope).
#[derive(Clone, Debug)]
pub struct Scope(pub(crate) Rc<ScopeData>);

#[derive(Debug)]
pub struct ScopeData {
    /// The tuple whose entries are this scope's in-scope identifiers.
    ///
    /// `Weak` because a tuple's own_scope's `locals` points back at the tuple that
    /// owns this very scope: that back-edge must not keep the tuple alive, or no
    /// `Tuple` would ever be dropped. Every other edge here (`up`, `super`, and a
    /// lambda's captured scope) is a strong `Rc`, so the overall reference graph
    /// reduces to a DAG reclaimed by ordinary refcounting.
    pub locals: Option<Weak<TupleData>>,
    pub up: Option<Scope>,
    pub super_: Option<Scope>,
    /// Where this scope was constructed, for provenance (§4.7).
    pub origin: Span,
}

impl Scope {
    pub fn new(locals: Option<Weak<TupleData>>, up: Option<Scope>, super_: Option<Scope>, origin: Span) -> Self {
        Self(Rc::new(ScopeData {
            locals,
            up,
            super_,
            origin,
        }))
    }

    /// A scope with no locals of its own, used as the root for a freshly loaded file
    /// or the captured scope of a host-injected global.
    pub fn root(origin: Span) -> Self {
        Self::new(None, None, None, origin)
    }

    pub fn locals(&self) -> Option<Rc<TupleData>> {
        self.0.locals.as_ref().and_then(Weak::upgrade)
    }

    pub fn up(&self) -> Option<&Scope> {
        self.0.up.as_ref()
    }

    pub fn super_(&self) -> Option<&Scope> {
        self.0.super_.as_ref()
    }

    pub fn origin(&self) -> &Span {
        &self.0.origin
    }
}
