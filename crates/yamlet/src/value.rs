//! The runtime value model (§3).

use std::fmt;
use std::rc::Rc;

use crate::ast::ExprLoc;
use crate::scope::Scope;
use crate::tuple::Tuple;

/// A fully-forced runtime value.
///
/// This enum owns its heap-shaped variants directly through `Rc`: Yamlet values
/// form a DAG of immutable, shared, possibly cyclic (via `Tuple`'s own-scope
/// back-edge) structures, so ordinary reference counting is the whole story —
/// there is no arena to index into.
#[derive(Debug, Clone)]
pub enum Value {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The structural composition-time erasure sentinel (§3, §4.3).
    Null,
    /// Parsed but otherwise inert, per the source language's own "reserved" framing.
    ExternalSentinel,
    List(Rc<Vec<Value>>),
    Tuple(Tuple),
    Lambda(Rc<LambdaValue>),
    /// A reference to a loader-injected host function by name (§6.3's `functions`
    /// table). Not named in the source spec's closed Value sum, but needed so a
    /// bare identifier naming a host function (step 5 of §4.2) resolves to
    /// *something* rather than requiring special-casing at every call site; only
    /// [`crate::eval::Evaluator::eval_call`] does anything with it besides
    /// formatting and `type_name`.
    HostFunction(Rc<str>),
}

/// A lambda's captured definition: parameters, body, and the scope it closed over.
#[derive(Debug)]
pub struct LambdaValue {
    pub params: Vec<String>,
    pub body: Rc<ExprLoc>,
    pub captured: Scope,
}

impl Value {
    /// The type name used in `TypeMismatch` diagnostics and by the `is`/`in` operators.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::ExternalSentinel => "external",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Lambda(_) => "lambda",
            Self::HostFunction(_) => "host_function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(n) => *n != 0,
            Self::Float(n) => *n != 0.0,
            Self::Bool(b) => *b,
            Self::Null => false,
            Self::ExternalSentinel => true,
            Self::List(items) => !items.is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::Lambda(_) => true,
            Self::HostFunction(_) => true,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s.as_str()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// A terse, non-interpolating rendering used for diagnostics (`TypeMismatch`,
/// `Display` in error chains). The user-facing stringify rules (§4.6) live in
/// [`crate::format`] since they require the configurable stringify style.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
            Self::ExternalSentinel => write!(f, "<external>"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Tuple(t) => write!(f, "<tuple {} keys>", t.len()),
            Self::Lambda(l) => write!(f, "<lambda/{}>", l.params.len()),
            Self::HostFunction(name) => write!(f, "<host fn {name}>"),
        }
    }
}
