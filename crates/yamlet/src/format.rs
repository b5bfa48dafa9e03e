//! Value stringification rules shared by `!fmt` interpolation and the loader's
//! configurable output style (§4.6, §6.3).

use crate::cell::Cell;
use crate::error::YamletError;
use crate::value::Value;

/// Selects how values render to text. `Terse` implements §4.6's interpolation
/// rules exactly (strings unquoted); `Diagnostic` quotes and escapes strings so
/// the rendering is unambiguous for debugging/`explain_value` output, matching
/// the loader's `with_stringify_style` knob (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringifyStyle {
    Terse,
    Diagnostic,
}

/// Renders `value` to text, forcing any tuple entries it touches via `force_cell`.
///
/// Lists hold already-forced `Value`s (§3: list literals evaluate eagerly), so only
/// the tuple branch needs to force anything; nested tuples reached through a list
/// element still get forced recursively.
pub fn stringify(
    value: &Value,
    style: StringifyStyle,
    force_cell: &mut impl FnMut(&Cell) -> Result<Value, YamletError>,
) -> Result<String, YamletError> {
    match value {
        Value::Str(s) => Ok(match style {
            StringifyStyle::Terse => s.to_string(),
            StringifyStyle::Diagnostic => quote(s),
        }),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(n) => Ok(format_float(*n)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_owned()),
        Value::ExternalSentinel => Ok("<external>".to_owned()),
        Value::List(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items.iter() {
                rendered.push(stringify(item, style, force_cell)?);
            }
            Ok(format!("[{}]", rendered.join(", ")))
        }
        Value::Tuple(tuple) => {
            let mut rendered = Vec::with_capacity(tuple.len());
            for key in tuple.keys() {
                let cell = tuple.get_cell(key).expect("key came from tuple.keys()");
                let forced = force_cell(cell)?;
                let text = stringify(&forced, style, force_cell)?;
                rendered.push(format!("{key}: {text}"));
            }
            Ok(format!("{{{}}}", rendered.join(", ")))
        }
        Value::Lambda(lambda) => Ok(format!("<lambda/{}>", lambda.params.len())),
        Value::HostFunction(name) => Ok(format!("<host fn {name}>")),
    }
}

/// Formats a float with the shortest decimal representation that round-trips,
/// which is exactly what Rust's `Display` impl for `f64` already guarantees.
fn format_float(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_tuples(_: &Cell) -> Result<Value, YamletError> {
        unreachable!("test values contain no tuples")
    }

    #[test]
    fn stringifies_primitives_tersely() {
        let mut force = no_tuples;
        assert_eq!(stringify(&Value::Int(42), StringifyStyle::Terse, &mut force).unwrap(), "42");
        assert_eq!(stringify(&Value::Bool(true), StringifyStyle::Terse, &mut force).unwrap(), "true");
        assert_eq!(stringify(&Value::Null, StringifyStyle::Terse, &mut force).unwrap(), "null");
        assert_eq!(
            stringify(&"hi".into(), StringifyStyle::Terse, &mut force).unwrap(),
            "hi"
        );
    }

    #[test]
    fn diagnostic_style_quotes_strings() {
        let mut force = no_tuples;
        assert_eq!(
            stringify(&"hi".into(), StringifyStyle::Diagnostic, &mut force).unwrap(),
            "\"hi\""
        );
    }

    #[test]
    fn float_with_integral_value_keeps_a_decimal_point() {
        let mut force = no_tuples;
        assert_eq!(stringify(&Value::Float(2.0), StringifyStyle::Terse, &mut force).unwrap(), "2.0");
        assert_eq!(stringify(&Value::Float(2.5), StringifyStyle::Terse, &mut force).unwrap(), "2.5");
    }

    #[test]
    fn stringifies_list_of_ints() {
        let mut force = no_tuples;
        let list = Value::List(std::rc::Rc::new(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(stringify(&list, StringifyStyle::Terse, &mut force).unwrap(), "[1, 2]");
    }
}
