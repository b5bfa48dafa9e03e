//! Tokenizer for the Yamlet expression language (§4.1).
//!
//! Shared by `!expr`, the slot contents of `!fmt` strings, `!lambda` bodies, and
//! `!composite` parts — every one of those surfaces hands a plain `&str` plus a
//! starting [`Span`] to [`Lexer::new`] and drains it with [`Lexer::tokenize`].

use std::str::FromStr;

use crate::error::YamletError;
use crate::span::{Position, Span, SourceName};
use crate::token::{Keyword, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    file: SourceName,
    line: u32,
    column: u32,
    line_start_offset: u32,
    base_line: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `source`, whose first character sits at `start` within `file`.
    ///
    /// `start` lets embedded sources (a `!fmt` slot, an expression nested inside a
    /// larger YAML scalar) report spans relative to the whole document rather than
    /// relative to the substring alone.
    pub fn new(source: &'a str, file: SourceName, start: Position) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            file,
            line: start.line,
            column: start.column,
            line_start_offset: 0,
            base_line: start.line,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, YamletError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn here(&self) -> Span {
        Span::new(self.file.clone(), Position::new(self.line, self.column))
    }

    fn advance(&mut self) -> Option<char> {
        let (offset, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_start_offset = offset as u32 + 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek2(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn err(&self, message: impl Into<String>) -> YamletError {
        YamletError::LexError {
            message: message.into(),
            span: self.here(),
        }
    }

    fn next_token(&mut self) -> Result<Token, YamletError> {
        let mut saw_space = false;
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' || c == '\n' {
                saw_space = true;
                self.advance();
            } else if c == '#' {
                saw_space = true;
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }

        let span = self.here();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span,
                preceded_by_space: saw_space,
            });
        };

        let kind = if c.is_ascii_digit() {
            self.lex_number()?
        } else if c == '_' || c.is_alphabetic() {
            self.lex_ident_or_keyword()
        } else if c == '"' || c == '\'' {
            self.lex_string(c)?
        } else {
            self.lex_punct()?
        };

        Ok(Token {
            kind,
            span,
            preceded_by_space: saw_space,
        })
    }

    fn lex_number(&mut self) -> Result<TokenKind, YamletError> {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !is_float && matches!(self.peek2(), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                text.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                is_float = true;
                text.push(c);
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance().unwrap());
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.err(format!("invalid float literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.err(format!("invalid integer literal '{text}'")))
        }
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::from_str(&text) {
            Ok(keyword) => keyword.into_token_kind(),
            Err(_) => TokenKind::Ident(text),
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<TokenKind, YamletError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some(q) if q == quote => text.push(q),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => return Err(self.err("unterminated escape sequence")),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(TokenKind::Str(text))
    }

    fn lex_punct(&mut self) -> Result<TokenKind, YamletError> {
        let c = self.advance().unwrap();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Eq
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Ne
            }
            '<' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Le
            }
            '>' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Ge
            }
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            other => return Err(self.err(format!("unexpected character '{other}'"))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, SourceName::from("<test>"), Position::new(1, 1))
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_arithmetic() {
        assert_eq!(
            tokenize("1 + 2 * foo"),
            vec![
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Int(2),
                TokenKind::Star,
                TokenKind::Ident("foo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_juxtaposition_whitespace_flag() {
        let tokens = Lexer::new("a.b c", SourceName::from("<test>"), Position::new(1, 1))
            .tokenize()
            .unwrap();
        // `c` is preceded by a space, `.b` is not.
        assert!(!tokens[1].preceded_by_space); // '.'
        assert!(tokens[3].preceded_by_space); // 'c'
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            tokenize(r#""hi\n\"there\"""#),
            vec![TokenKind::Str("hi\n\"there\"".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = Lexer::new("\"abc", SourceName::from("<test>"), Position::new(1, 1)).tokenize();
        assert!(err.is_err());
    }
}
