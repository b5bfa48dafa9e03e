//! The textual preprocessor (§6.2, §9).
//!
//! One rewrite, applied before the source ever reaches the YAML collaborator:
//! `!else:` (tag immediately followed by a colon) becomes `!else :`. Without it,
//! the YAML scanner folds the colon into the tag name and produces a tag called
//! `else:` instead of a tag `else` followed by a mapping-value colon.
//!
//! This is intentionally byte-level and unaware of string literals — the source
//! design rewrites unconditionally, including inside quoted scalars, and this
//! port carries that risk forward rather than adding a smarter rewrite the
//! source never had (§9 Open Questions).

const NEEDLE: &str = "!else:";
const REPLACEMENT: &str = "!else :";

pub fn preprocess(source: &str) -> String {
    if !source.contains(NEEDLE) {
        return source.to_owned();
    }
    source.replace(NEEDLE, REPLACEMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_bare_else_tag() {
        assert_eq!(preprocess("!else:\n  a: 1\n"), "!else :\n  a: 1\n");
    }

    #[test]
    fn leaves_spaced_else_tag_untouched() {
        assert_eq!(preprocess("!else :\n  a: 1\n"), "!else :\n  a: 1\n");
    }

    #[test]
    fn rewrites_unconditionally_even_inside_a_string_literal() {
        // Documented limitation (§6.2, §9): the rewrite does not parse string
        // literals, so a scalar that happens to contain the literal substring
        // `!else:` is rewritten too.
        assert_eq!(preprocess("note: \"see !else: below\"\n"), "note: \"see !else : below\"\n");
    }

    #[test]
    fn is_a_no_op_when_the_needle_is_absent() {
        let source = "a: 1\nb: 2\n";
        assert_eq!(preprocess(source), source);
    }
}
