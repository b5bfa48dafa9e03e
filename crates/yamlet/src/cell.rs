//! The per-entry memoization state machine (§4.4, §4.8).
//!
//! A cell is one of three shapes:
//! - `Literal` — a value that needed no evaluation (a bare YAML scalar).
//! - `Deferred(ast, scope, memo)` — the common case: an expression awaiting
//!   evaluation in the scope where it was declared.
//! - `Merged(a, b, origin, memo)` — the lazy composition cell (§4.3, §9 Open
//!   Questions): forcing it forces both re-scoped operands and only then decides,
//!   from their runtime types, whether to recurse into `compose` or override.
//!
//! Deferred and Merged cells keep their declaration data for the cell's whole
//! lifetime, even once forced, because composition (§4.3) re-scopes entries by
//! building a *fresh* cell from the same declaration against a new scope — that
//! needs the original declaration to still be around no matter how many times the
//! old cell was forced.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::ExprLoc;
use crate::scope::Scope;
use crate::span::Span;
use crate::value::Value;

#[derive(Debug)]
enum Memo {
    Unforced,
    InProgress,
    Forced(Value),
}

#[derive(Debug)]
pub enum Cell {
    Literal(Value),
    Deferred(Rc<ExprLoc>, Scope, RefCell<Memo>),
    Merged(Box<Cell>, Box<Cell>, Span, RefCell<Memo>),
}

/// What a caller must do to make progress on a [`ForceStep::Pending`] cell.
pub enum PendingWork<'a> {
    Expr(&'a Rc<ExprLoc>, &'a Scope),
    Merge(&'a Cell, &'a Cell, &'a Span),
}

/// The result of [`Cell::begin_force`].
pub enum ForceStep<'a> {
    Done(Value),
    /// Another frame on the current call chain is already forcing this cell.
    InProgress,
    Pending(PendingWork<'a>),
}

impl Cell {
    pub fn literal(value: Value) -> Self {
        Self::Literal(value)
    }

    pub fn deferred(ast: Rc<ExprLoc>, scope: Scope) -> Self {
        Self::Deferred(ast, scope, RefCell::new(Memo::Unforced))
    }

    pub fn merged(a: Cell, b: Cell, origin: Span) -> Self {
        Self::Merged(Box::new(a), Box::new(b), origin, RefCell::new(Memo::Unforced))
    }

    fn memo(&self) -> Option<&RefCell<Memo>> {
        match self {
            Self::Literal(_) => None,
            Self::Deferred(_, _, memo) | Self::Merged(_, _, _, memo) => Some(memo),
        }
    }

    /// Whether this cell is a literal `Null` — the composition-time key-erasure
    /// sentinel (§3, §4.3, §9 Open Questions). Deliberately structural: a cell
    /// that merely *evaluates to* `Null` does not erase its key, since deciding
    /// that would require forcing every overriding entry just to find out whether
    /// it erases, defeating the laziness composition is supposed to preserve.
    pub fn is_literal_null(&self) -> bool {
        matches!(self, Self::Literal(Value::Null))
    }

    pub fn is_forced(&self) -> bool {
        match self.memo() {
            None => true,
            Some(memo) => matches!(&*memo.borrow(), Memo::Forced(_)),
        }
    }

    /// Begins forcing this cell (§4.8). Re-entering a cell already `InProgress` is
    /// how cycles are detected: the caller turns that into a `CycleDetected` error.
    pub fn begin_force(&self) -> ForceStep<'_> {
        match self {
            Self::Literal(value) => ForceStep::Done(value.clone()),
            Self::Deferred(ast, scope, memo) => match &*memo.borrow() {
                Memo::Forced(value) => ForceStep::Done(value.clone()),
                Memo::InProgress => ForceStep::InProgress,
                Memo::Unforced => {
                    *memo.borrow_mut() = Memo::InProgress;
                    ForceStep::Pending(PendingWork::Expr(ast, scope))
                }
            },
            Self::Merged(a, b, origin, memo) => match &*memo.borrow() {
                Memo::Forced(value) => ForceStep::Done(value.clone()),
                Memo::InProgress => ForceStep::InProgress,
                Memo::Unforced => {
                    *memo.borrow_mut() = Memo::InProgress;
                    ForceStep::Pending(PendingWork::Merge(a, b, origin))
                }
            },
        }
    }

    pub fn complete_force(&self, value: Value) -> Value {
        if let Some(memo) = self.memo() {
            *memo.borrow_mut() = Memo::Forced(value.clone());
        }
        value
    }

    /// Evaluation of a pending cell failed: restore `Unforced` so a later, unrelated
    /// access can legitimately retry it.
    pub fn abort_force(&self) {
        if let Some(memo) = self.memo() {
            *memo.borrow_mut() = Memo::Unforced;
        }
    }

    /// Builds a fresh cell from the same declaration against a new scope (§4.3,
    /// §4.4): re-scoping never reuses a stale memoized value, because the whole
    /// point of composition is that the inherited expression may evaluate
    /// differently against the new inputs. `Merged` cells re-scope recursively so a
    /// composed entry that later becomes a "keys only on one side" operand in an
    /// outer composition still threads the new scope all the way down.
    pub fn rescoped(&self, new_scope: Scope) -> Cell {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Deferred(ast, _, _) => Self::deferred(ast.clone(), new_scope),
            Self::Merged(a, b, origin, _) => {
                Self::merged(a.rescoped(new_scope.clone()), b.rescoped(new_scope), origin.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::span::Position;

    fn test_span() -> Span {
        Span::new(std::rc::Rc::from("<test>"), Position::new(1, 1))
    }

    #[test]
    fn literal_cell_is_immediately_forced() {
        let cell = Cell::literal(Value::Int(1));
        assert!(cell.is_forced());
        match cell.begin_force() {
            ForceStep::Done(Value::Int(1)) => {}
            _ => panic!("expected forced literal"),
        }
    }

    #[test]
    fn deferred_cell_transitions_through_in_progress() {
        let span = test_span();
        let ast = Rc::new(ExprLoc::new(span.clone(), Expr::Int(42)));
        let scope = Scope::root(span);
        let cell = Cell::deferred(ast, scope);
        assert!(!cell.is_forced());
        match cell.begin_force() {
            ForceStep::Pending(PendingWork::Expr(_, _)) => {}
            _ => panic!("expected pending"),
        }
        match cell.begin_force() {
            ForceStep::InProgress => {}
            _ => panic!("expected in-progress (re-entrant force)"),
        }
        cell.complete_force(Value::Int(42));
        assert!(cell.is_forced());
    }

    #[test]
    fn rescoping_drops_stale_memo() {
        let span = test_span();
        let ast = Rc::new(ExprLoc::new(span.clone(), Expr::Int(7)));
        let scope = Scope::root(span.clone());
        let cell = Cell::deferred(ast, scope);
        cell.complete_force(Value::Int(7));
        assert!(cell.is_forced());

        let other_scope = Scope::root(span);
        let rescoped = cell.rescoped(other_scope);
        assert!(!rescoped.is_forced());
    }

    #[test]
    fn merged_cell_starts_unforced() {
        let span = test_span();
        let a = Cell::literal(Value::Int(1));
        let b = Cell::literal(Value::Int(2));
        let merged = Cell::merged(a, b, span);
        assert!(!merged.is_forced());
    }
}
