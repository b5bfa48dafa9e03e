//! Recursive-descent parser for the expression grammar (§4.1).

use std::rc::Rc;

use crate::ast::{CmpOperator, Expr, ExprLoc, FormatPart, FormatTemplate, MapKey, Operator, UnaryOperator};
use crate::error::YamletError;
use crate::lexer::Lexer;
use crate::span::{Position, Span, SourceName};
use crate::token::{Token, TokenKind};

/// Parses a full expression (the body of `!expr`, a `!fmt` slot, a `!composite`
/// operand, or a nested sub-expression).
pub fn parse_expr(source: &str, file: SourceName, start: Position) -> Result<ExprLoc, YamletError> {
    let tokens = Lexer::new(source, file, start).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses a `!lambda` scalar: `params ':' body`, with no leading `lambda` keyword.
pub fn parse_lambda_tag(source: &str, file: SourceName, start: Position) -> Result<ExprLoc, YamletError> {
    let span = Span::new(file.clone(), start);
    let tokens = Lexer::new(source, file, start).tokenize()?;
    let mut parser = Parser::new(tokens);
    let params = parser.parse_param_list_until_colon()?;
    parser.expect(TokenKind::Colon)?;
    let body = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(ExprLoc::new(
        span,
        Expr::Lambda {
            params,
            body: Box::new(body),
        },
    ))
}

/// Parses a `!fmt` scalar into a [`FormatTemplate`] of literal runs and `{expr}` slots.
pub fn parse_format_template(source: &str, file: SourceName, start: Position) -> Result<FormatTemplate, YamletError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut line = start.line;
    let mut column = start.column;
    let mut chars = source.char_indices().peekable();

    let advance_pos = |c: char, line: &mut u32, column: &mut u32| {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    };

    while let Some(&(idx, c)) = chars.peek() {
        match c {
            '{' => {
                chars.next();
                advance_pos(c, &mut line, &mut column);
                if chars.peek().map(|&(_, c)| c) == Some('{') {
                    chars.next();
                    advance_pos('{', &mut line, &mut column);
                    literal.push('{');
                    continue;
                }
                if !literal.is_empty() {
                    parts.push(FormatPart::Literal(std::mem::take(&mut literal)));
                }
                let slot_start = Position::new(line, column);
                let mut depth = 1usize;
                let slot_begin_idx = idx + c.len_utf8();
                let mut slot_end_idx = slot_begin_idx;
                for (i, sc) in chars.by_ref() {
                    advance_pos(sc, &mut line, &mut column);
                    slot_end_idx = i + sc.len_utf8();
                    match sc {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                slot_end_idx = i;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if depth != 0 {
                    return Err(YamletError::ParseError {
                        message: "unterminated '{' in format string".to_owned(),
                        span: Span::new(file.clone(), slot_start),
                    });
                }
                let slot_src = &source[slot_begin_idx..slot_end_idx];
                let expr = parse_expr(slot_src, file.clone(), slot_start)?;
                parts.push(FormatPart::Slot(expr));
            }
            '}' => {
                chars.next();
                advance_pos(c, &mut line, &mut column);
                if chars.peek().map(|&(_, c)| c) == Some('}') {
                    chars.next();
                    advance_pos('}', &mut line, &mut column);
                    literal.push('}');
                } else {
                    return Err(YamletError::ParseError {
                        message: "unmatched '}' in format string".to_owned(),
                        span: Span::new(file.clone(), Position::new(line, column)),
                    });
                }
            }
            _ => {
                chars.next();
                advance_pos(c, &mut line, &mut column);
                literal.push(c);
            }
        }
    }
    if !literal.is_empty() {
        parts.push(FormatPart::Literal(literal));
    }
    Ok(FormatTemplate { parts })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, YamletError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(YamletError::ParseError {
                message: format!("expected {kind}, found {}", found.kind),
                span: found.span,
            })
        }
    }

    fn expect_eof(&mut self) -> Result<(), YamletError> {
        if matches!(self.peek().kind, TokenKind::Eof) {
            Ok(())
        } else {
            let found = self.peek().clone();
            Err(YamletError::ParseError {
                message: format!("unexpected trailing {}", found.kind),
                span: found.span,
            })
        }
    }

    fn err(&self, message: impl Into<String>) -> YamletError {
        YamletError::ParseError {
            message: message.into(),
            span: self.peek().span.clone(),
        }
    }

    /// Parses a bare `name, name, ...` list ending right before a `:`, used by
    /// `!lambda` tags which omit the leading `lambda` keyword.
    fn parse_param_list_until_colon(&mut self) -> Result<Vec<String>, YamletError> {
        let mut params = Vec::new();
        if self.check(&TokenKind::Colon) {
            return Ok(params);
        }
        loop {
            let name = self.parse_ident_name()?;
            params.push(name);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(params)
    }

    fn parse_ident_name(&mut self) -> Result<String, YamletError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.err(format!("expected identifier, found {other}"))),
        }
    }

    // level 1: lambda
    fn parse_expr(&mut self) -> Result<ExprLoc, YamletError> {
        if self.check(&TokenKind::Lambda) {
            let span = self.peek().span.clone();
            self.advance();
            let params = self.parse_param_list_until_colon()?;
            self.expect(TokenKind::Colon)?;
            let body = self.parse_expr()?;
            return Ok(ExprLoc::new(
                span,
                Expr::Lambda {
                    params,
                    body: Box::new(body),
                },
            ));
        }
        self.parse_conditional()
    }

    // level 2: a if cond else b
    fn parse_conditional(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let body = self.parse_or()?;
        if self.eat(&TokenKind::If) {
            let test = self.parse_or()?;
            self.expect(TokenKind::Else)?;
            let orelse = self.parse_expr()?;
            return Ok(ExprLoc::new(
                span,
                Expr::IfElse {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
            ));
        }
        Ok(body)
    }

    // level 3: or
    fn parse_or(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = ExprLoc::new(span.clone(), Expr::Or(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    // level 3: and
    fn parse_and(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = ExprLoc::new(span.clone(), Expr::And(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    // level 3: not
    fn parse_not(&mut self) -> Result<ExprLoc, YamletError> {
        if self.check(&TokenKind::Not) {
            let span = self.peek().span.clone();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(ExprLoc::new(
                span,
                Expr::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                },
            ));
        }
        self.parse_comparison()
    }

    // level 4: comparisons (non-associative: at most one)
    fn parse_comparison(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let left = self.parse_additive()?;
        let op = match &self.peek().kind {
            TokenKind::Eq => CmpOperator::Eq,
            TokenKind::Ne => CmpOperator::Ne,
            TokenKind::Lt => CmpOperator::Lt,
            TokenKind::Le => CmpOperator::Le,
            TokenKind::Gt => CmpOperator::Gt,
            TokenKind::Ge => CmpOperator::Ge,
            TokenKind::In => CmpOperator::In,
            TokenKind::Is => CmpOperator::Is,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(ExprLoc::new(
            span,
            Expr::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        ))
    }

    // level 5: + -
    fn parse_additive(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = ExprLoc::new(
                span.clone(),
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    // level 5: * / %
    fn parse_multiplicative(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Star => Operator::Mul,
                TokenKind::Slash => Operator::Div,
                TokenKind::Percent => Operator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = ExprLoc::new(
                span.clone(),
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    // level 5: unary -
    fn parse_unary(&mut self) -> Result<ExprLoc, YamletError> {
        if self.check(&TokenKind::Minus) {
            let span = self.peek().span.clone();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(ExprLoc::new(
                span,
                Expr::Unary {
                    op: UnaryOperator::Neg,
                    operand: Box::new(operand),
                },
            ));
        }
        self.parse_juxtapose()
    }

    /// Does the upcoming token start a new primary expression (for juxtaposition)?
    fn starts_primary(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Cond
        )
    }

    // level 6: juxtaposition composition
    fn parse_juxtapose(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut left = self.parse_postfix()?;
        while self.peek().preceded_by_space && self.starts_primary() {
            let right = self.parse_postfix()?;
            left = ExprLoc::new(span.clone(), Expr::Juxtapose(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    // level 7: call / index / attribute / extension
    fn parse_postfix(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.parse_ident_name()?;
                expr = ExprLoc::new(
                    span.clone(),
                    Expr::Attr {
                        object: Box::new(expr),
                        name,
                    },
                );
            } else if !self.peek().preceded_by_space && self.check(&TokenKind::LParen) {
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                expr = ExprLoc::new(
                    span.clone(),
                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                    },
                );
            } else if !self.peek().preceded_by_space && self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = ExprLoc::new(
                    span.clone(),
                    Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                );
            } else if self.check(&TokenKind::LBrace) {
                // Unlike call/index, extension allows a preceding space (`x { k: v }`,
                // the form the README and GCL sources both use): postfix binds tighter
                // than juxtaposition (§4.1 rule 6 vs rule 7), so a `{...}` following any
                // already-parsed operand is always this operand's extension, never a
                // separate juxtaposed mapping-literal primary. The two readings compose
                // to the same tuple regardless (`compose(x, {k: v})` either way), so
                // resolving the ambiguity this way changes no runtime behavior.
                let mapping = self.parse_mapping_body()?;
                expr = ExprLoc::new(
                    span.clone(),
                    Expr::Extension {
                        object: Box::new(expr),
                        mapping,
                    },
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_mapping_body(&mut self) -> Result<Vec<(MapKey, ExprLoc)>, YamletError> {
        self.expect(TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = match self.peek().kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    MapKey::Ident(name)
                }
                TokenKind::Str(text) => {
                    let span = self.peek().span.clone();
                    self.advance();
                    let template = parse_format_template(&text, span.source, span.position)?;
                    MapKey::Interpolated(Rc::new(template))
                }
                ref other => return Err(self.err(format!("expected mapping key, found {other}"))),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(entries)
    }

    // level 8: primaries
    fn parse_primary(&mut self) -> Result<ExprLoc, YamletError> {
        let span = self.peek().span.clone();
        match self.peek().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Int(n)))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Float(n)))
            }
            TokenKind::Str(text) => {
                self.advance();
                let template = parse_format_template(&text, span.source.clone(), span.position)?;
                Ok(ExprLoc::new(span, Expr::Format(Rc::new(template))))
            }
            TokenKind::True => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Null))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(ExprLoc::new(span, Expr::Name(name)))
            }
            TokenKind::Cond => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(TokenKind::Comma)?;
                let body = self.parse_expr()?;
                self.expect(TokenKind::Comma)?;
                let orelse = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(ExprLoc::new(
                    span,
                    Expr::Cond {
                        test: Box::new(test),
                        body: Box::new(body),
                        orelse: Box::new(orelse),
                    },
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(ExprLoc::new(span, Expr::List(items)))
            }
            TokenKind::LBrace => {
                let entries = self.parse_mapping_body()?;
                Ok(ExprLoc::new(span, Expr::Mapping(entries)))
            }
            other => Err(self.err(format!("unexpected {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        parse_expr(src, SourceName::from("<test>"), Position::new(1, 1))
            .unwrap()
            .expr
    }

    #[test]
    fn parses_precedence() {
        match parse("1 + 2 * 3") {
            Expr::Binary { op: Operator::Add, right, .. } => {
                assert!(matches!(right.expr, Expr::Binary { op: Operator::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_juxtaposition_tighter_than_arithmetic() {
        // `a b + 1` should parse as `(a b) + 1`
        match parse("a b + 1") {
            Expr::Binary { left, op: Operator::Add, .. } => {
                assert!(matches!(left.expr, Expr::Juxtapose(_, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_attribute_tighter_than_juxtaposition() {
        // `a b.c` should parse as `a (b.c)`, per the resolved Open Question in §9.
        match parse("a b.c") {
            Expr::Juxtapose(_, right) => {
                assert!(matches!(right.expr, Expr::Attr { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_lambda() {
        match parse("lambda x, y: x + y") {
            Expr::Lambda { params, .. } => assert_eq!(params, vec!["x", "y"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_lambda_tag_without_keyword() {
        let expr = parse_lambda_tag("x, y: x + y", SourceName::from("<test>"), Position::new(1, 1)).unwrap();
        match expr.expr {
            Expr::Lambda { params, .. } => assert_eq!(params, vec!["x", "y"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_conditional_expr() {
        match parse("1 if true else 2") {
            Expr::IfElse { .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_format_template_with_escaped_braces() {
        let template = parse_format_template("{{literal}} {value}", SourceName::from("<test>"), Position::new(1, 1))
            .unwrap();
        assert_eq!(template.parts.len(), 2);
        match &template.parts[0] {
            FormatPart::Literal(s) => assert_eq!(s, "{literal} "),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(template.parts[1], FormatPart::Slot(_)));
    }

    #[test]
    fn parses_extension() {
        match parse("base { a: 1 }") {
            Expr::Extension { mapping, .. } => assert_eq!(mapping.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
