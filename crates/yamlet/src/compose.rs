//! The tuple composition algebra (§4.3).

use indexmap::IndexMap;

use crate::cell::Cell;
use crate::scope::Scope;
use crate::span::Span;
use crate::tuple::Tuple;

/// `compose(a, b) -> c`, purely structural and lazy: no entry of `a` or `b` is
/// forced here, only re-scoped or wrapped in a [`Cell::Merged`] for keys present
/// on both sides (§9 Open Questions: the "both sides are tuples" check happens
/// inside the merged cell's own forcing, not at composition time).
pub fn compose(a: &Tuple, b: &Tuple, origin: Span) -> Tuple {
    tracing::trace!(a = ?a.id(), b = ?b.id(), "composing tuples");
    let a = a.clone();
    let b = b.clone();
    let up = a.own_scope().up().cloned();
    let a_scope_for_super = a.own_scope().clone();
    let supers = vec![a.clone(), b.clone()];

    Tuple::new(up, Some(a_scope_for_super), supers, origin, move |composite_scope| {
        let mut entries = IndexMap::new();
        for key in a.keys() {
            entries.insert(key.to_owned(), ());
        }
        for key in b.keys() {
            entries.entry(key.to_owned()).or_insert(());
        }
        entries
            .into_iter()
            .filter_map(|(key, ())| {
                // The `null` sentinel erases a key at composition time (§3, §4.3):
                // the *overriding* side (b if it has the key, else a) decides.
                let cell = match (a.get_cell(&key), b.get_cell(&key)) {
                    (Some(ac), None) => {
                        if ac.is_literal_null() {
                            return None;
                        }
                        ac.rescoped(composite_scope.clone())
                    }
                    (None, Some(bc)) => {
                        if bc.is_literal_null() {
                            return None;
                        }
                        bc.rescoped(composite_scope.clone())
                    }
                    (Some(ac), Some(bc)) => {
                        if bc.is_literal_null() {
                            return None;
                        }
                        Cell::merged(
                            ac.rescoped(composite_scope.clone()),
                            bc.rescoped(composite_scope.clone()),
                            composite_scope.origin().clone(),
                        )
                    }
                    (None, None) => unreachable!("key came from a or b"),
                };
                Some((key, cell))
            })
            .collect()
    })
}
