//! Token kinds produced by the expression [`lexer`](crate::lexer).

use std::fmt;

use crate::span::Span;

/// The expression grammar's reserved words (§4.1), matched against an
/// identifier's text before it's accepted as a plain [`TokenKind::Ident`].
///
/// String-in enum-variant-out, so the lexer defers to `Keyword::from_str`
/// instead of a hand-written `match` over string slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,
    Cond,
    True,
    False,
    Null,
}

impl Keyword {
    pub fn into_token_kind(self) -> TokenKind {
        match self {
            Self::And => TokenKind::And,
            Self::Or => TokenKind::Or,
            Self::Not => TokenKind::Not,
            Self::In => TokenKind::In,
            Self::Is => TokenKind::Is,
            Self::If => TokenKind::If,
            Self::Else => TokenKind::Else,
            Self::For => TokenKind::For,
            Self::Lambda => TokenKind::Lambda,
            Self::Cond => TokenKind::Cond,
            Self::True => TokenKind::True,
            Self::False => TokenKind::False,
            Self::Null => TokenKind::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,
    Cond,
    True,
    False,
    Null,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Int(n) => write!(f, "integer '{n}'"),
            Self::Float(n) => write!(f, "float '{n}'"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::Comma => write!(f, "','"),
            Self::Dot => write!(f, "'.'"),
            Self::Colon => write!(f, "':'"),
            Self::Semicolon => write!(f, "';'"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Percent => write!(f, "'%'"),
            Self::Eq => write!(f, "'=='"),
            Self::Ne => write!(f, "'!='"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::And => write!(f, "'and'"),
            Self::Or => write!(f, "'or'"),
            Self::Not => write!(f, "'not'"),
            Self::In => write!(f, "'in'"),
            Self::Is => write!(f, "'is'"),
            Self::If => write!(f, "'if'"),
            Self::Else => write!(f, "'else'"),
            Self::For => write!(f, "'for'"),
            Self::Lambda => write!(f, "'lambda'"),
            Self::Cond => write!(f, "'cond'"),
            Self::True => write!(f, "'true'"),
            Self::False => write!(f, "'false'"),
            Self::Null => write!(f, "'null'"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// A token together with the span where it began.
///
/// A preceding-whitespace flag is carried alongside the kind rather than folded into
/// a separate token, since the only grammar rule that cares about it (juxtaposition
/// composition, §4.1 rule 6) needs to distinguish `a.b` from `a .b` at a single point
/// in the parser and nowhere else.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Whether this token was preceded by at least one space/tab since the previous token.
    pub preceded_by_space: bool,
}
