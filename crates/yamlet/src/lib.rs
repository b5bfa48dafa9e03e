#![doc = include_str!("../README.md")]

mod ast;
mod cell;
mod compose;
mod error;
mod eval;
mod format;
mod lexer;
mod loader;
mod materialize;
mod parser;
mod preprocess;
mod provenance;
mod scope;
mod span;
mod token;
mod tuple;
mod value;
mod yaml;

pub use crate::error::{Result, YamletError};
pub use crate::eval::{HostEnvironment, HostFunction, ImportResolver};
pub use crate::format::StringifyStyle;
pub use crate::loader::{Document, ImportPathResolver, Loader, LoaderOptions};
pub use crate::span::{Position, Span, SourceName};
pub use crate::tuple::{Tuple, TupleId};
pub use crate::value::{LambdaValue, Value};
