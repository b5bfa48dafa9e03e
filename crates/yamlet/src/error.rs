//! The flat error taxonomy shared by every stage of the pipeline.
//!
//! A hand-rolled enum rather than `thiserror`/`anyhow`: a manual `Display` and
//! `std::error::Error` impl. Every variant carries the primary [`Span`] at which
//! the failure was detected.

use std::fmt;

use crate::span::Span;

/// Everything that can go wrong while lexing, parsing, composing, or evaluating.
#[derive(Debug, Clone)]
pub enum YamletError {
    /// The expression lexer found a character or token it could not classify.
    LexError { message: String, span: Span },
    /// The expression parser found a token it did not expect.
    ParseError { message: String, span: Span },
    /// The YAML collaborator rejected the document.
    YamlError { message: String, span: Span },
    /// Identifier resolution exhausted `locals`, `super`, `up`, and the host environment.
    UndefinedName { name: String, span: Span },
    /// An operator or composition received an operand of the wrong shape.
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
        span: Span,
    },
    /// A lambda or host function call supplied the wrong number of arguments.
    ArityError {
        expected: String,
        got: usize,
        span: Span,
    },
    /// Division or modulo by zero.
    ArithmeticError { message: String, span: Span },
    /// A list or tuple index fell outside the valid range.
    IndexOutOfRange { index: i64, len: usize, span: Span },
    /// Attribute or subscript lookup found no such key.
    KeyNotFound { key: String, span: Span },
    /// Forcing a deferred cell recursively re-entered itself.
    CycleDetected { chain: Vec<String>, span: Span },
    /// `!import` could not read or parse the referenced file.
    ImportError {
        path: String,
        cause: String,
        span: Span,
    },
    /// Evaluation nested deeper than the loader's configured stack-depth limit
    /// (§5) — guards runaway recursive lambda calls that the per-cell cycle guard
    /// cannot see, since each call evaluates a fresh cell rather than re-entering one.
    RecursionLimit { limit: usize, span: Span },
}

impl YamletError {
    /// The span at which this error was first detected, for caret-style reporting.
    pub fn span(&self) -> &Span {
        match self {
            Self::LexError { span, .. }
            | Self::ParseError { span, .. }
            | Self::YamlError { span, .. }
            | Self::UndefinedName { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::ArityError { span, .. }
            | Self::ArithmeticError { span, .. }
            | Self::IndexOutOfRange { span, .. }
            | Self::KeyNotFound { span, .. }
            | Self::CycleDetected { span, .. }
            | Self::ImportError { span, .. }
            | Self::RecursionLimit { span, .. } => span,
        }
    }
}

impl fmt::Display for YamletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LexError { message, span } => write!(f, "{span}: lex error: {message}"),
            Self::ParseError { message, span } => write!(f, "{span}: parse error: {message}"),
            Self::YamlError { message, span } => write!(f, "{span}: yaml error: {message}"),
            Self::UndefinedName { name, span } => write!(f, "{span}: undefined name '{name}'"),
            Self::TypeMismatch { expected, got, span } => {
                write!(f, "{span}: expected {expected}, got {got}")
            }
            Self::ArityError { expected, got, span } => {
                write!(f, "{span}: expected {expected} argument(s), got {got}")
            }
            Self::ArithmeticError { message, span } => write!(f, "{span}: arithmetic error: {message}"),
            Self::IndexOutOfRange { index, len, span } => {
                write!(f, "{span}: index {index} out of range for length {len}")
            }
            Self::KeyNotFound { key, span } => write!(f, "{span}: key not found: '{key}'"),
            Self::CycleDetected { chain, span } => {
                write!(f, "{span}: cycle detected: {}", chain.join(" -> "))
            }
            Self::ImportError { path, cause, span } => {
                write!(f, "{span}: failed to import '{path}': {cause}")
            }
            Self::RecursionLimit { limit, span } => {
                write!(f, "{span}: recursion limit of {limit} exceeded")
            }
        }
    }
}

impl std::error::Error for YamletError {}

pub type Result<T> = std::result::Result<T, YamletError>;
