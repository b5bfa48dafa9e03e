//! Evaluation-trace recording backing `explain_value` (§4.7).
//!
//! Evaluation is single-threaded and strictly depth-first (§5), so a stack of the
//! `(tuple, key)` pairs currently being forced is enough to route a resolved
//! identifier or a nested child force to the trace that is actively being built,
//! with no need to thread an explicit "current trace" argument through `Evaluator`.

use std::cell::RefCell;

use ahash::AHashMap;

use crate::span::Span;
use crate::tuple::TupleId;

/// One key's recorded evaluation: the span of the expression that produced it,
/// every free identifier it resolved along the way, and every other `(tuple,
/// key)` it had to force to do so.
#[derive(Debug, Clone)]
pub struct Trace {
    pub expr_span: Span,
    pub resolutions: Vec<(String, Span)>,
    pub children: Vec<(TupleId, String)>,
}

#[derive(Default)]
pub struct ProvenanceRecorder {
    traces: RefCell<AHashMap<(TupleId, String), Trace>>,
    stack: RefCell<Vec<(TupleId, String)>>,
}

impl ProvenanceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or resumes) recording `(tuple, key)`. A cell that was already
    /// forced before this call is a memo hit — `force_cell` never re-enters
    /// `eval` for it — so the existing trace, if any, is left untouched rather
    /// than overwritten with a blank one.
    pub fn begin(&self, tuple: TupleId, key: &str, expr_span: Span) {
        self.stack.borrow_mut().push((tuple, key.to_owned()));
        self.traces.borrow_mut().entry((tuple, key.to_owned())).or_insert_with(|| Trace {
            expr_span,
            resolutions: Vec::new(),
            children: Vec::new(),
        });
    }

    pub fn end(&self) {
        self.stack.borrow_mut().pop();
    }

    /// Records that `name` resolved against a scope constructed at `span`,
    /// attributed to whichever force is currently on top of the stack.
    pub fn record_resolution(&self, name: &str, span: Span) {
        if let Some(current) = self.stack.borrow().last() {
            if let Some(trace) = self.traces.borrow_mut().get_mut(current) {
                trace.resolutions.push((name.to_owned(), span));
            }
        }
    }

    /// Records that the force on top of the stack needed `(child_tuple,
    /// child_key)` to run to completion. Called before the child's own frame is
    /// pushed, so it attributes to the parent rather than to itself.
    pub fn record_child(&self, child_tuple: TupleId, child_key: &str) {
        if let Some(current) = self.stack.borrow().last() {
            if let Some(trace) = self.traces.borrow_mut().get_mut(current) {
                trace.children.push((child_tuple, child_key.to_owned()));
            }
        }
    }

    /// Renders the recorded trace for `(tuple, key)` as an indented tree. A key
    /// that was never forced (so never recorded) renders as a single placeholder
    /// line rather than an error — `explain_value` always returns a `String`.
    pub fn explain(&self, tuple: TupleId, key: &str) -> String {
        let mut out = String::new();
        self.render(tuple, key, 0, &mut out);
        out
    }

    fn render(&self, tuple: TupleId, key: &str, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let entry = self.traces.borrow().get(&(tuple, key.to_owned())).cloned();
        let Some(trace) = entry else {
            out.push_str(&format!("{indent}{key}: <not recorded>\n"));
            return;
        };
        out.push_str(&format!("{indent}{key} <- {}\n", trace.expr_span));
        for (name, span) in &trace.resolutions {
            out.push_str(&format!("{indent}  {name} resolved at {span}\n"));
        }
        for (child_tuple, child_key) in &trace.children {
            self.render(*child_tuple, child_key, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Position, SourceName};
    use crate::tuple::Tuple;

    fn span() -> Span {
        Span::new(SourceName::from("<test>"), Position::new(1, 1))
    }

    #[test]
    fn unrecorded_key_explains_as_not_recorded() {
        let recorder = ProvenanceRecorder::new();
        let id = Tuple::empty(span()).id();
        assert_eq!(recorder.explain(id, "missing"), "missing: <not recorded>\n");
    }

    #[test]
    fn records_resolutions_under_the_active_frame() {
        let recorder = ProvenanceRecorder::new();
        let id = Tuple::empty(span()).id();
        recorder.begin(id, "a", span());
        recorder.record_resolution("b", span());
        recorder.end();
        let rendered = recorder.explain(id, "a");
        assert!(rendered.contains("a <-"));
        assert!(rendered.contains("b resolved at"));
    }
}
