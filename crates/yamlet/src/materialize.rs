//! Compiles a [`YamlNode`] tree into the expression AST (§6.1, §6.3).
//!
//! There is no separate "compiled IR": a YAML mapping constructs exactly the
//! same kind of tuple a `{...}` expression literal does, so [`compile_expr`]
//! simply lowers untagged mappings/sequences/scalars into [`Expr::Mapping`]/
//! [`Expr::List`]/literal nodes and lets the existing evaluator do the rest.
//! Tagged nodes (`!expr`, `!fmt`, `!lambda`, `!import`, `!composite`) lower to
//! the AST nodes those tags already have a grammar for.

use std::rc::Rc;

use crate::ast::{CompositePart, ConditionalBranch, Expr, ExprLoc, FormatPart, FormatTemplate, MapKey};
use crate::error::YamletError;
use crate::parser::{parse_expr, parse_format_template, parse_lambda_tag};
use crate::yaml::{YamlData, YamlNode};

/// Compiles a whole document's root node. The loader is responsible for
/// checking that the resulting expression evaluates to a tuple (§6.3); this
/// function itself treats the root exactly like any other node.
pub fn compile_document(root: &YamlNode) -> Result<ExprLoc, YamletError> {
    compile_expr(root)
}

/// Lowers one [`YamlNode`] into an [`ExprLoc`], dispatching on its tag (§6.1).
pub fn compile_expr(node: &YamlNode) -> Result<ExprLoc, YamletError> {
    match node.tag.as_deref() {
        Some("expr") => {
            let text = expect_scalar(node, "expr")?;
            parse_expr(text, node.span.source.clone(), node.span.position)
        }
        Some("fmt") => {
            let text = expect_scalar(node, "fmt")?;
            let template = parse_format_template(text, node.span.source.clone(), node.span.position)?;
            Ok(ExprLoc::new(node.span.clone(), Expr::Format(Rc::new(template))))
        }
        Some("lambda") => {
            let text = expect_scalar(node, "lambda")?;
            parse_lambda_tag(text, node.span.source.clone(), node.span.position)
        }
        Some("import") => {
            let text = expect_scalar(node, "import")?;
            Ok(ExprLoc::new(node.span.clone(), Expr::Import(text.to_owned())))
        }
        Some("composite") => {
            let items = expect_sequence(node, "composite")?;
            let parts = compile_composite_parts(items)?;
            Ok(ExprLoc::new(node.span.clone(), Expr::Composite(parts)))
        }
        Some(other) => Err(YamletError::YamlError {
            message: format!("unrecognized tag '!{other}'"),
            span: node.span.clone(),
        }),
        None => compile_untagged(node),
    }
}

fn compile_untagged(node: &YamlNode) -> Result<ExprLoc, YamletError> {
    match &node.data {
        YamlData::Null => Ok(ExprLoc::new(node.span.clone(), Expr::Null)),
        YamlData::Scalar { text, plain } => Ok(ExprLoc::new(node.span.clone(), resolve_scalar(text, *plain))),
        YamlData::Sequence(items) => {
            let mut exprs = Vec::with_capacity(items.len());
            for item in items {
                exprs.push(compile_expr(item)?);
            }
            Ok(ExprLoc::new(node.span.clone(), Expr::List(exprs)))
        }
        YamlData::Mapping(entries) => {
            let mut compiled = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key_text = scalar_key_text(key)?;
                compiled.push((MapKey::Ident(key_text.to_owned()), compile_expr(value)?));
            }
            Ok(ExprLoc::new(node.span.clone(), Expr::Mapping(compiled)))
        }
    }
}

/// YAML 1.1 core schema scalar resolution (§6.1, §9 Open Questions), applied only
/// to *plain*-style scalars: `true`/`false`, `.inf`/`.nan`, integers (decimal, `0x`,
/// `0o`), floats, else `Str`. A non-plain (quoted, literal, folded) scalar is
/// always a string regardless of what its text looks like.
fn resolve_scalar(text: &str, plain: bool) -> Expr {
    if plain {
        match text {
            "true" | "True" | "TRUE" => return Expr::Bool(true),
            "false" | "False" | "FALSE" => return Expr::Bool(false),
            ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Expr::Float(f64::INFINITY),
            "-.inf" | "-.Inf" | "-.INF" => return Expr::Float(f64::NEG_INFINITY),
            ".nan" | ".NaN" | ".NAN" => return Expr::Float(f64::NAN),
            _ => {}
        }
        if let Some(n) = parse_yaml_int(text) {
            return Expr::Int(n);
        }
        if is_plain_float_literal(text) {
            if let Ok(f) = text.parse::<f64>() {
                return Expr::Float(f);
            }
        }
    }
    Expr::Format(Rc::new(FormatTemplate {
        parts: vec![FormatPart::Literal(text.to_owned())],
    }))
}

fn parse_yaml_int(text: &str) -> Option<i64> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() {
        return None;
    }
    if let Some(hex) = digits.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(|n| sign * n);
    }
    if let Some(oct) = digits.strip_prefix("0o") {
        return i64::from_str_radix(oct, 8).ok().map(|n| sign * n);
    }
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        return digits.parse::<i64>().ok().map(|n| sign * n);
    }
    None
}

fn is_plain_float_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    body.contains('.')
        && body.starts_with(|c: char| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

fn expect_scalar<'a>(node: &'a YamlNode, tag: &str) -> Result<&'a str, YamletError> {
    match &node.data {
        YamlData::Scalar { text, .. } => Ok(text.as_str()),
        _ => Err(YamletError::YamlError {
            message: format!("!{tag} requires a scalar value"),
            span: node.span.clone(),
        }),
    }
}

fn expect_sequence<'a>(node: &'a YamlNode, tag: &str) -> Result<&'a [YamlNode], YamletError> {
    match &node.data {
        YamlData::Sequence(items) => Ok(items.as_slice()),
        _ => Err(YamletError::YamlError {
            message: format!("!{tag} requires a sequence"),
            span: node.span.clone(),
        }),
    }
}

fn scalar_key_text(key: &YamlNode) -> Result<&str, YamletError> {
    match &key.data {
        YamlData::Scalar { text, .. } => Ok(text.as_str()),
        _ => Err(YamletError::YamlError {
            message: "mapping keys must be scalars".to_owned(),
            span: key.span.clone(),
        }),
    }
}

/// Lowers the elements of a `!composite` sequence (§4.3, §6.1). Each element is
/// one of: a bare plain-scalar name (a juxtaposition operand, not core-schema
/// resolved — this is the one place a plain scalar is *not* resolved the way
/// [`resolve_scalar`] would), a plain mapping (an ordinary tuple contribution),
/// or a mapping whose every key carries an `!if`/`!elif`/`!else` tag (a
/// conditional chain).
pub fn compile_composite_parts(items: &[YamlNode]) -> Result<Vec<CompositePart>, YamletError> {
    items.iter().map(compile_composite_part).collect()
}

fn compile_composite_part(item: &YamlNode) -> Result<CompositePart, YamletError> {
    if item.tag.is_none() {
        if let YamlData::Scalar { text, plain: true } = &item.data {
            return Ok(CompositePart::Value(ExprLoc::new(item.span.clone(), Expr::Name(text.clone()))));
        }
        if let YamlData::Mapping(entries) = &item.data {
            if !entries.is_empty() && entries.iter().all(|(key, _)| is_conditional_key(key)) {
                return Ok(CompositePart::Conditional(compile_conditional_chain(entries)?));
            }
        }
    }
    Ok(CompositePart::Value(compile_expr(item)?))
}

fn is_conditional_key(key: &YamlNode) -> bool {
    matches!(key.tag.as_deref(), Some("if") | Some("elif") | Some("else"))
}

fn compile_conditional_chain(entries: &[(YamlNode, YamlNode)]) -> Result<Vec<ConditionalBranch>, YamletError> {
    entries
        .iter()
        .map(|(key, value)| {
            let guard = match key.tag.as_deref() {
                Some("if") | Some("elif") => {
                    let text = scalar_key_text(key)?;
                    Some(parse_expr(text, key.span.source.clone(), key.span.position)?)
                }
                Some("else") => None,
                _ => unreachable!("filtered by is_conditional_key"),
            };
            Ok(ConditionalBranch {
                guard,
                body: compile_expr(value)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use crate::span::SourceName;
    use crate::yaml::parse_document;

    fn compile(src: &str) -> ExprLoc {
        let rewritten = preprocess(src);
        let node = parse_document(&rewritten, SourceName::from("<test>")).unwrap();
        compile_document(&node).unwrap()
    }

    #[test]
    fn compiles_untagged_mapping_to_mapping_literal() {
        match compile("a: 1\nb: two\n").expr {
            Expr::Mapping(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolves_core_schema_scalars() {
        match compile("a: true\nb: 3\nc: 2.5\nd: hello\ne: \"3\"\n").expr {
            Expr::Mapping(entries) => {
                let find = |name: &str| entries.iter().find(|(k, _)| matches!(k, MapKey::Ident(n) if n == name)).unwrap();
                assert!(matches!(find("a").1.expr, Expr::Bool(true)));
                assert!(matches!(find("b").1.expr, Expr::Int(3)));
                assert!(matches!(find("c").1.expr, Expr::Float(f) if f == 2.5));
                assert!(matches!(&find("d").1.expr, Expr::Format(t) if t.parts.len() == 1));
                // A quoted "3" stays a string even though it looks numeric.
                assert!(matches!(&find("e").1.expr, Expr::Format(t) if t.parts.len() == 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compiles_expr_tag() {
        match compile("a: !expr \"1 + 2\"\n").expr {
            Expr::Mapping(entries) => {
                let (_, value) = &entries[0];
                assert!(matches!(value.expr, Expr::Binary { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compiles_composite_bare_name_and_mapping() {
        let expr = compile("a: !composite\n  - foo\n  - bar: 1\n");
        match expr.expr {
            Expr::Mapping(entries) => match &entries[0].1.expr {
                Expr::Composite(parts) => {
                    assert_eq!(parts.len(), 2);
                    assert!(matches!(&parts[0], CompositePart::Value(e) if matches!(e.expr, Expr::Name(_))));
                    assert!(matches!(&parts[1], CompositePart::Value(e) if matches!(e.expr, Expr::Mapping(_))));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compiles_conditional_chain_inside_composite() {
        let src = "r: !composite\n  - !if '1 + 1 == 2':\n      b: 11\n    !else:\n      b: 0\n";
        let expr = compile(src);
        match expr.expr {
            Expr::Mapping(entries) => match &entries[0].1.expr {
                Expr::Composite(parts) => {
                    assert_eq!(parts.len(), 1);
                    match &parts[0] {
                        CompositePart::Conditional(branches) => {
                            assert_eq!(branches.len(), 2);
                            assert!(branches[0].guard.is_some());
                            assert!(branches[1].guard.is_none());
                        }
                        other => panic!("unexpected {other:?}"),
                    }
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let rewritten = preprocess("a: !bogus 1\n");
        let node = parse_document(&rewritten, SourceName::from("<test>")).unwrap();
        assert!(compile_document(&node).is_err());
    }
}
