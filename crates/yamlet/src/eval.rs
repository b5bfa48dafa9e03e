//! The expression evaluator (§4.2, §4.5).

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{CmpOperator, CompositePart, Expr, ExprLoc, FormatPart, MapKey, Operator, UnaryOperator};
use crate::cell::{Cell, ForceStep, PendingWork};
use crate::compose::compose;
use crate::error::YamletError;
use crate::format::{stringify, StringifyStyle};
use crate::provenance::ProvenanceRecorder;
use crate::scope::Scope;
use crate::span::Span;
use crate::tuple::Tuple;
use crate::value::{LambdaValue, Value};

/// A host-supplied callable. Receives already-forced positional arguments (§4.5).
pub type HostFunction = Rc<dyn Fn(&[Value], &Span) -> Result<Value, YamletError>>;

/// Resolves and materializes a `!import` target (§4.8, §6.1, §6.3). Implemented
/// by [`crate::loader::Loader`], which owns the import cache and the file
/// system; the evaluator only ever sees this narrow callback, so the core stays
/// free of any direct I/O (§1).
pub trait ImportResolver {
    fn resolve_import(&self, path: &str, span: &Span) -> Result<Value, YamletError>;
}

/// The name→callable and name→constant tables injected at loader construction
/// (§6.3), consulted at step 5 of identifier resolution (§4.2).
#[derive(Default, Clone)]
pub struct HostEnvironment {
    pub functions: AHashMap<String, HostFunction>,
    pub globals: AHashMap<String, Value>,
    pub imports: Option<Rc<dyn ImportResolver>>,
}

/// Drives evaluation and forcing for one loader instance.
///
/// Single-threaded and cooperative per §5: there is no interior synchronization
/// beyond the plain `RefCell`s a single-threaded evaluator needs for its own
/// recursion bookkeeping.
pub struct Evaluator<'env> {
    env: &'env HostEnvironment,
    max_depth: usize,
    depth: RefCell<usize>,
    /// Keys currently being forced, innermost last; used only to render a
    /// human-readable chain in `CycleDetected` (§4.8), the cycle itself is
    /// detected by each cell's own `InProgress` state.
    chain: RefCell<Vec<String>>,
    stringify_style: StringifyStyle,
    recorder: &'env ProvenanceRecorder,
}

struct DepthGuard<'a> {
    depth: &'a RefCell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        *self.depth.borrow_mut() -= 1;
    }
}

impl<'env> Evaluator<'env> {
    pub fn new(
        env: &'env HostEnvironment,
        max_depth: usize,
        stringify_style: StringifyStyle,
        recorder: &'env ProvenanceRecorder,
    ) -> Self {
        Self {
            env,
            max_depth,
            depth: RefCell::new(0),
            chain: RefCell::new(Vec::new()),
            stringify_style,
            recorder,
        }
    }

    fn enter(&self, span: &Span) -> Result<DepthGuard<'_>, YamletError> {
        let mut depth = self.depth.borrow_mut();
        *depth += 1;
        if *depth > self.max_depth {
            return Err(YamletError::RecursionLimit {
                limit: self.max_depth,
                span: span.clone(),
            });
        }
        drop(depth);
        Ok(DepthGuard { depth: &self.depth })
    }

    pub fn stringify_style(&self) -> StringifyStyle {
        self.stringify_style
    }

    /// Forces `tuple[key]`, pushing `key` onto the cycle-chain while it's being
    /// forced and recording the force in the provenance trace (§4.7) of whichever
    /// key's evaluation is asking for it.
    pub fn force_tuple_key(&self, tuple: &Tuple, key: &str, span: &Span) -> Result<Value, YamletError> {
        let cell = tuple.get_cell(key).ok_or_else(|| YamletError::KeyNotFound {
            key: key.to_owned(),
            span: span.clone(),
        })?;
        self.recorder.record_child(tuple.id(), key);
        self.recorder.begin(tuple.id(), key, span.clone());
        self.chain.borrow_mut().push(key.to_owned());
        let result = self.force_cell(cell, span);
        self.chain.borrow_mut().pop();
        self.recorder.end();
        result
    }

    /// Forces any cell: literal, deferred-expression, or the lazy composition merge
    /// cell (§9 Open Questions).
    pub fn force_cell(&self, cell: &Cell, span: &Span) -> Result<Value, YamletError> {
        match cell.begin_force() {
            ForceStep::Done(value) => Ok(value),
            ForceStep::InProgress => Err(YamletError::CycleDetected {
                chain: self.chain.borrow().clone(),
                span: span.clone(),
            }),
            ForceStep::Pending(PendingWork::Expr(ast, scope)) => match self.eval(ast, scope) {
                Ok(value) => Ok(cell.complete_force(value)),
                Err(err) => {
                    cell.abort_force();
                    Err(err)
                }
            },
            ForceStep::Pending(PendingWork::Merge(a, b, origin)) => {
                let outcome = self.force_merge(a, b, origin);
                match outcome {
                    Ok(value) => Ok(cell.complete_force(value)),
                    Err(err) => {
                        cell.abort_force();
                        Err(err)
                    }
                }
            }
        }
    }

    fn force_merge(&self, a: &Cell, b: &Cell, origin: &Span) -> Result<Value, YamletError> {
        let a_value = self.force_cell(a, origin)?;
        let b_value = self.force_cell(b, origin)?;
        match (a_value, b_value) {
            (Value::Tuple(ta), Value::Tuple(tb)) => Ok(Value::Tuple(compose(&ta, &tb, origin.clone()))),
            (_, b_value) => Ok(b_value),
        }
    }

    pub fn eval(&self, expr: &ExprLoc, scope: &Scope) -> Result<Value, YamletError> {
        let _guard = self.enter(&expr.span)?;
        match &expr.expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Name(name) => self.resolve_name(name, scope, &expr.span),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::List(Rc::new(values)))
            }
            Expr::Mapping(entries) => self.eval_mapping(entries, scope, &expr.span),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right, scope, &expr.span),
            Expr::Compare { left, op, right } => self.eval_compare(left, *op, right, scope, &expr.span),
            Expr::And(left, right) => {
                let l = self.eval(left, scope)?;
                if !l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Or(left, right) => {
                let l = self.eval(left, scope)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::IfElse { test, body, orelse } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(body, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            Expr::Cond { test, body, orelse } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(body, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            Expr::Lambda { params, body } => Ok(Value::Lambda(Rc::new(LambdaValue {
                params: params.clone(),
                body: Rc::new((**body).clone()),
                captured: scope.clone(),
            }))),
            Expr::Call { callee, args } => self.eval_call(callee, args, scope, &expr.span),
            Expr::Index { object, index } => self.eval_index(object, index, scope, &expr.span),
            Expr::Attr { object, name } => self.eval_attr(object, name, scope, &expr.span),
            Expr::Extension { object, mapping } => self.eval_extension(object, mapping, scope, &expr.span),
            Expr::Juxtapose(left, right) => self.eval_juxtapose(left, right, scope, &expr.span),
            Expr::Composite(parts) => self.eval_composite(parts, scope, &expr.span),
            Expr::Import(path) => {
                let resolver = self.env.imports.as_ref().ok_or_else(|| YamletError::ImportError {
                    path: path.clone(),
                    cause: "loader has no import resolver configured".to_owned(),
                    span: expr.span.clone(),
                })?;
                resolver.resolve_import(path, &expr.span)
            }
            Expr::Format(template) => {
                let mut force_cell = |cell: &Cell| self.force_cell(cell, &expr.span);
                let mut rendered = String::new();
                for part in &template.parts {
                    match part {
                        FormatPart::Literal(text) => rendered.push_str(text),
                        FormatPart::Slot(slot) => {
                            let value = self.eval(slot, scope)?;
                            rendered.push_str(&stringify(&value, self.stringify_style, &mut force_cell)?);
                        }
                    }
                }
                Ok(Value::from(rendered))
            }
        }
    }

    fn eval_mapping(
        &self,
        entries: &[(MapKey, ExprLoc)],
        scope: &Scope,
        origin: &Span,
    ) -> Result<Value, YamletError> {
        let mut map = IndexMap::new();
        for (key, value_expr) in entries {
            let key_text = match key {
                MapKey::Ident(name) => name.clone(),
                MapKey::Interpolated(template) => {
                    let mut force_cell = |cell: &Cell| self.force_cell(cell, origin);
                    let mut rendered = String::new();
                    for part in &template.parts {
                        match part {
                            FormatPart::Literal(text) => rendered.push_str(text),
                            FormatPart::Slot(slot) => {
                                let value = self.eval(slot, scope)?;
                                rendered.push_str(&stringify(&value, self.stringify_style, &mut force_cell)?);
                            }
                        }
                    }
                    rendered
                }
            };
            map.insert(key_text, Rc::new(value_expr.clone()));
        }
        let tuple = Tuple::new(Some(scope.clone()), None, Vec::new(), origin.clone(), move |own_scope| {
            map.into_iter()
                .map(|(key, ast)| (key, Cell::deferred(ast, own_scope.clone())))
                .collect()
        });
        Ok(Value::Tuple(tuple))
    }

    fn eval_unary(&self, op: UnaryOperator, operand: &ExprLoc, scope: &Scope) -> Result<Value, YamletError> {
        let value = self.eval(operand, scope)?;
        match op {
            UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOperator::Neg => match value {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(n) => Ok(Value::Float(-n)),
                other => Err(YamletError::TypeMismatch {
                    expected: "int or float",
                    got: other.type_name(),
                    span: operand.span.clone(),
                }),
            },
        }
    }

    fn eval_binary(
        &self,
        left: &ExprLoc,
        op: Operator,
        right: &ExprLoc,
        scope: &Scope,
        span: &Span,
    ) -> Result<Value, YamletError> {
        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        use Operator::*;
        match (op, l, r) {
            (Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Add, Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
            (Add, Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + b as f64)),
            (Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(Rc::from(format!("{a}{b}").as_str()))),
            (Add, Value::List(a), Value::List(b)) => {
                let mut items = (*a).clone();
                items.extend((*b).iter().cloned());
                Ok(Value::List(Rc::new(items)))
            }
            (Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (Sub, Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 - b)),
            (Sub, Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - b as f64)),
            (Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (Mul, Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 * b)),
            (Mul, Value::Float(a), Value::Int(b)) => Ok(Value::Float(a * b as f64)),
            (Div, Value::Int(_), Value::Int(0)) => Err(YamletError::ArithmeticError {
                message: "division by zero".to_owned(),
                span: span.clone(),
            }),
            (Div, Value::Int(a), Value::Int(b)) => Ok(Value::Float(a as f64 / b as f64)),
            (Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Div, Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 / b)),
            (Div, Value::Float(a), Value::Int(b)) => Ok(Value::Float(a / b as f64)),
            (Mod, Value::Int(_), Value::Int(0)) => Err(YamletError::ArithmeticError {
                message: "modulo by zero".to_owned(),
                span: span.clone(),
            }),
            (Mod, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.rem_euclid(b))),
            (Mod, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a.rem_euclid(b))),
            (_, a, b) => Err(YamletError::TypeMismatch {
                expected: "matching numeric/string/list operands",
                got: mismatched_operand_type(&a, &b),
                span: span.clone(),
            }),
        }
    }

    fn eval_compare(
        &self,
        left: &ExprLoc,
        op: CmpOperator,
        right: &ExprLoc,
        scope: &Scope,
        span: &Span,
    ) -> Result<Value, YamletError> {
        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        match op {
            CmpOperator::In => Ok(Value::Bool(self.eval_in(&l, &r, span)?)),
            CmpOperator::Is => Ok(Value::Bool(eval_is(&l, &r))),
            CmpOperator::Eq => Ok(Value::Bool(values_equal(&l, &r))),
            CmpOperator::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
            CmpOperator::Lt | CmpOperator::Le | CmpOperator::Gt | CmpOperator::Ge => {
                let ordering = numeric_ordering(&l, &r, span)?;
                Ok(Value::Bool(match op {
                    CmpOperator::Lt => ordering.is_lt(),
                    CmpOperator::Le => ordering.is_le(),
                    CmpOperator::Gt => ordering.is_gt(),
                    CmpOperator::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                }))
            }
        }
    }

    fn eval_in(&self, needle: &Value, haystack: &Value, span: &Span) -> Result<bool, YamletError> {
        match haystack {
            Value::List(items) => Ok(items.iter().any(|item| values_equal(needle, item))),
            Value::Tuple(tuple) => match needle {
                Value::Str(key) => Ok(tuple.contains_key(key)),
                other => Err(YamletError::TypeMismatch {
                    expected: "str (tuple key)",
                    got: other.type_name(),
                    span: span.clone(),
                }),
            },
            other => Err(YamletError::TypeMismatch {
                expected: "list or tuple",
                got: other.type_name(),
                span: span.clone(),
            }),
        }
    }

    fn eval_call(&self, callee: &ExprLoc, args: &[ExprLoc], scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        let callee_value = self.eval(callee, scope)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        match callee_value {
            Value::Lambda(lambda) => self.apply_lambda(&lambda, values, span),
            Value::HostFunction(name) => {
                let f = self.env.functions.get(&*name).ok_or_else(|| YamletError::UndefinedName {
                    name: name.to_string(),
                    span: span.clone(),
                })?;
                f(&values, span)
            }
            other => Err(YamletError::TypeMismatch {
                expected: "lambda or host function",
                got: other.type_name(),
                span: span.clone(),
            }),
        }
    }

    fn apply_lambda(&self, lambda: &LambdaValue, args: Vec<Value>, span: &Span) -> Result<Value, YamletError> {
        if args.len() != lambda.params.len() {
            return Err(YamletError::ArityError {
                expected: lambda.params.len().to_string(),
                got: args.len(),
                span: span.clone(),
            });
        }
        let call_scope = bindings_scope(&lambda.params, &args, &lambda.captured, span);
        self.eval_lambda_body(lambda, call_scope)
    }

    fn eval_index(&self, object: &ExprLoc, index: &ExprLoc, scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        let obj = self.eval(object, scope)?;
        let idx = self.eval(index, scope)?;
        match (&obj, &idx) {
            (Value::List(items), Value::Int(i)) => {
                let len = items.len();
                let resolved = resolve_index(*i, len);
                items
                    .get(resolved)
                    .cloned()
                    .ok_or(YamletError::IndexOutOfRange { index: *i, len, span: span.clone() })
            }
            // Tuple indexing by string key is attribute access (§4.5): same
            // own-entries-then-super-chain search `lookup_attr` does, not a bare
            // `force_tuple_key` (which would miss keys inherited through `super`).
            (Value::Tuple(tuple), Value::Str(key)) => self.lookup_attr(tuple, key, span),
            (Value::Tuple(_), other) => Err(YamletError::TypeMismatch {
                expected: "str (tuple indexing is by key)",
                got: other.type_name(),
                span: span.clone(),
            }),
            (other, _) => Err(YamletError::TypeMismatch {
                expected: "list or tuple",
                got: other.type_name(),
                span: span.clone(),
            }),
        }
    }

    fn eval_attr(&self, object: &ExprLoc, name: &str, scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        let obj = self.eval(object, scope)?;
        let tuple = obj.as_tuple().ok_or_else(|| YamletError::TypeMismatch {
            expected: "tuple",
            got: obj.type_name(),
            span: span.clone(),
        })?;
        if name == "super" || name == "up" {
            return self.reserved_scope_lookup(tuple.own_scope(), name, span);
        }
        self.lookup_attr(tuple, name, span)
    }

    /// `x.super` / `x.up` (§4.5): resolved the same way the bare identifiers
    /// `super`/`up` are (§4.2 step 1), but rooted at `x.own_scope` instead of
    /// the ambient evaluation scope.
    fn reserved_scope_lookup(&self, scope: &Scope, name: &str, span: &Span) -> Result<Value, YamletError> {
        let target = if name == "super" { scope.super_() } else { scope.up() };
        target
            .and_then(|s| s.locals())
            .map(|locals| Value::Tuple(Tuple::from_rc(locals)))
            .ok_or_else(|| YamletError::UndefinedName {
                name: name.to_owned(),
                span: span.clone(),
            })
    }

    /// Attribute lookup (§4.5): searches the tuple's own entries, then its `super`
    /// chain, but never its `up` — unlike general identifier resolution (§4.2).
    fn lookup_attr(&self, tuple: &Tuple, name: &str, span: &Span) -> Result<Value, YamletError> {
        if tuple.contains_key(name) {
            return self.force_tuple_key(tuple, name, span);
        }
        let mut cur = tuple.own_scope().super_().cloned();
        while let Some(s) = cur {
            if let Some(locals) = s.locals() {
                let t = Tuple::from_rc(locals);
                if t.contains_key(name) {
                    return self.force_tuple_key(&t, name, span);
                }
            }
            cur = s.super_().cloned();
        }
        Err(YamletError::KeyNotFound {
            key: name.to_owned(),
            span: span.clone(),
        })
    }

    fn eval_extension(
        &self,
        object: &ExprLoc,
        mapping: &[(MapKey, ExprLoc)],
        scope: &Scope,
        span: &Span,
    ) -> Result<Value, YamletError> {
        let base = self.eval(object, scope)?;
        let base_tuple = base.as_tuple().ok_or_else(|| YamletError::TypeMismatch {
            expected: "tuple",
            got: base.type_name(),
            span: span.clone(),
        })?;
        let extension = self.eval_mapping(mapping, scope, span)?;
        let extension_tuple = extension.as_tuple().expect("eval_mapping always returns a tuple");
        Ok(Value::Tuple(compose(base_tuple, extension_tuple, span.clone())))
    }

    fn eval_juxtapose(&self, left: &ExprLoc, right: &ExprLoc, scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        let lt = l.as_tuple().ok_or_else(|| YamletError::TypeMismatch {
            expected: "tuple",
            got: l.type_name(),
            span: left.span.clone(),
        })?;
        let rt = r.as_tuple().ok_or_else(|| YamletError::TypeMismatch {
            expected: "tuple",
            got: r.type_name(),
            span: right.span.clone(),
        })?;
        Ok(Value::Tuple(compose(lt, rt, span.clone())))
    }

    /// Evaluates a `!composite` sequence (§4.3, §6.1): each part contributes a
    /// tuple, folded left-to-right with [`compose`]. After each fold the running
    /// scope becomes the accumulated composite's own scope, so a later part's
    /// guard or value can see keys contributed by earlier parts — exactly what
    /// §4.3 means by "guards see the surrounding scope including keys contributed
    /// by preceding composite parts".
    fn eval_composite(&self, parts: &[CompositePart], scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        let mut acc: Option<Tuple> = None;
        let mut running = scope.clone();
        for part in parts {
            let part_tuple = match part {
                CompositePart::Value(expr) => {
                    let value = self.eval(expr, &running)?;
                    value
                        .as_tuple()
                        .cloned()
                        .ok_or_else(|| YamletError::TypeMismatch {
                            expected: "tuple",
                            got: value.type_name(),
                            span: expr.span.clone(),
                        })?
                }
                CompositePart::Conditional(branches) => self.eval_conditional_branches(branches, &running, span)?,
            };
            acc = Some(match acc {
                None => part_tuple,
                Some(prev) => compose(&prev, &part_tuple, span.clone()),
            });
            running = acc.as_ref().unwrap().own_scope().clone();
        }
        Ok(Value::Tuple(acc.unwrap_or_else(|| Tuple::empty(span.clone()))))
    }

    /// Picks the first branch whose guard is truthy (or the trailing `!else`,
    /// `guard: None`) and evaluates its body; contributes an empty tuple if none
    /// match (§4.3).
    fn eval_conditional_branches(
        &self,
        branches: &[crate::ast::ConditionalBranch],
        scope: &Scope,
        span: &Span,
    ) -> Result<Tuple, YamletError> {
        for branch in branches {
            let taken = match &branch.guard {
                Some(guard) => self.eval(guard, scope)?.is_truthy(),
                None => true,
            };
            if taken {
                let value = self.eval(&branch.body, scope)?;
                return value.as_tuple().cloned().ok_or_else(|| YamletError::TypeMismatch {
                    expected: "tuple",
                    got: value.type_name(),
                    span: branch.body.span.clone(),
                });
            }
        }
        Ok(Tuple::empty(span.clone()))
    }

    /// Identifier resolution (§4.2): `up`/`super` short-circuit; otherwise search
    /// `scope.locals`, then `scope.super` (one hop at a time), then restart in
    /// `scope.up`; finally fall back to the host environment.
    fn resolve_name(&self, name: &str, scope: &Scope, span: &Span) -> Result<Value, YamletError> {
        if name == "up" {
            return scope
                .up()
                .and_then(|s| s.locals())
                .map(|locals| Value::Tuple(Tuple::from_rc(locals)))
                .ok_or_else(|| YamletError::UndefinedName {
                    name: "up".to_owned(),
                    span: span.clone(),
                });
        }
        if name == "super" {
            return scope
                .super_()
                .and_then(|s| s.locals())
                .map(|locals| Value::Tuple(Tuple::from_rc(locals)))
                .ok_or_else(|| YamletError::UndefinedName {
                    name: "super".to_owned(),
                    span: span.clone(),
                });
        }

        let mut current = Some(scope.clone());
        while let Some(s) = current {
            if let Some(locals) = s.locals() {
                let t = Tuple::from_rc(locals);
                if t.contains_key(name) {
                    self.recorder.record_resolution(name, s.origin().clone());
                    return self.force_tuple_key(&t, name, span);
                }
            }
            let mut predecessor = s.super_().cloned();
            while let Some(p) = predecessor {
                if let Some(locals) = p.locals() {
                    let t = Tuple::from_rc(locals);
                    if t.contains_key(name) {
                        self.recorder.record_resolution(name, p.origin().clone());
                        return self.force_tuple_key(&t, name, span);
                    }
                }
                predecessor = p.super_().cloned();
            }
            current = s.up().cloned();
        }

        if let Some(value) = self.env.globals.get(name) {
            self.recorder.record_resolution(name, Span::synthetic());
            return Ok(value.clone());
        }
        if self.env.functions.contains_key(name) {
            self.recorder.record_resolution(name, Span::synthetic());
            return Ok(Value::HostFunction(Rc::from(name)));
        }
        Err(YamletError::UndefinedName {
            name: name.to_owned(),
            span: span.clone(),
        })
    }

    fn eval_lambda_body(&self, lambda: &LambdaValue, call_scope: Scope) -> Result<Value, YamletError> {
        self.eval(&lambda.body, &call_scope)
    }
}

/// Builds the call scope for a lambda application: a fresh tuple of
/// parameter→argument bindings as `locals`, `up` = the lambda's captured scope,
/// `super` = `None` (§4.5).
fn bindings_scope(params: &[String], args: &[Value], captured: &Scope, span: &Span) -> Scope {
    let mut bindings = IndexMap::new();
    for (param, value) in params.iter().zip(args.iter().cloned()) {
        bindings.insert(param.clone(), value);
    }
    let tuple = Tuple::new(Some(captured.clone()), None, Vec::new(), span.clone(), move |_own_scope| {
        bindings
            .into_iter()
            .map(|(key, value)| (key, Cell::literal(value)))
            .collect()
    });
    tuple.own_scope().clone()
}

fn resolve_index(i: i64, len: usize) -> usize {
    if i < 0 {
        (len as i64 + i).max(0) as usize
    } else {
        i as usize
    }
}

fn mismatched_operand_type(a: &Value, b: &Value) -> &'static str {
    if a.type_name() == b.type_name() {
        a.type_name()
    } else {
        b.type_name()
    }
}

/// `is` (§4.5, §9): identity for `bool`/`null`, value equality for `int`; every
/// other pair is `false` rather than a type error, since `is` is defined total.
fn eval_is(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::List(x), Value::List(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b)),
        (Value::Tuple(x), Value::Tuple(y)) => Tuple::ptr_eq(x, y),
        _ => false,
    }
}

fn numeric_ordering(a: &Value, b: &Value, span: &Span) -> Result<std::cmp::Ordering, YamletError> {
    let as_f64 = |v: &Value| match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    };
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (as_f64(a), as_f64(b));
            match (x, y) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| YamletError::TypeMismatch {
                    expected: "comparable numbers",
                    got: "NaN",
                    span: span.clone(),
                }),
                _ => Err(YamletError::TypeMismatch {
                    expected: "two numbers or two strings",
                    got: b.type_name(),
                    span: span.clone(),
                }),
            }
        }
    }
}
