use yamlet::{Loader, LoaderOptions, Value};

fn load(source: &str) -> yamlet::Document {
    // Best-effort: surfaces the crate's tracing::debug!/trace! spans (file loads,
    // tuple composition) when these tests are run with `--nocapture` and
    // `RUST_LOG` set; harmless (and a no-op) otherwise.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Loader::new(LoaderOptions::new()).load_string(source, "<test>").unwrap()
}

fn expect_str(value: &Value) -> &str {
    match value {
        Value::Str(s) => s,
        other => panic!("expected str, got {other:?}"),
    }
}

mod string_concat_with_inheritance {
    use super::*;

    #[test]
    fn override_reevaluates_the_dependent_field() {
        let doc = load(
            "base:\n  greeting: hello\n  message: !fmt \"{greeting}, world!\"\noverride:\n  greeting: hi\nresult: !composite\n  - base\n  - override\n",
        );
        let result = doc.get("result").unwrap();
        let tuple = result.as_tuple().unwrap();
        assert_eq!(expect_str(&doc.force(tuple, "greeting").unwrap()), "hi");
        assert_eq!(expect_str(&doc.force(tuple, "message").unwrap()), "hi, world!");
    }
}

mod order_sensitivity {
    use super::*;

    #[test]
    fn swapping_juxtaposition_operands_flips_the_winner() {
        let doc = load("a:\n  x: 1\n  y: 1\nb:\n  x: 2\nleft_wins: !expr \"b a\"\nright_wins: !expr \"a b\"\n");
        let left_wins = doc.get("left_wins").unwrap();
        let lt = left_wins.as_tuple().unwrap();
        assert!(matches!(doc.force(lt, "x").unwrap(), Value::Int(1)));
        assert!(matches!(doc.force(lt, "y").unwrap(), Value::Int(1)));

        let right_wins = doc.get("right_wins").unwrap();
        let rt = right_wins.as_tuple().unwrap();
        assert!(matches!(doc.force(rt, "x").unwrap(), Value::Int(2)));
        assert!(matches!(doc.force(rt, "y").unwrap(), Value::Int(1)));
    }
}

mod conditional_composite {
    use super::*;

    #[test]
    fn only_the_first_truthy_branch_contributes_keys() {
        let doc = load(
            "shape: fish\nresult: !composite\n  - a: 10\n  - !if \"shape == 'shark'\":\n      b: bad\n    !elif \"shape == 'fish'\":\n      b: 12\n    !else:\n      b: 0\n",
        );
        let result = doc.get("result").unwrap();
        let tuple = result.as_tuple().unwrap();
        assert!(matches!(doc.force(tuple, "a").unwrap(), Value::Int(10)));
        assert!(matches!(doc.force(tuple, "b").unwrap(), Value::Int(12)));
    }

    #[test]
    fn no_truthy_branch_contributes_an_empty_tuple() {
        let doc = load("result: !composite\n  - a: 1\n  - !if \"1 == 2\":\n      b: 1\n");
        let result = doc.get("result").unwrap();
        let tuple = result.as_tuple().unwrap();
        assert!(matches!(doc.force(tuple, "a").unwrap(), Value::Int(1)));
        assert!(!tuple.contains_key("b"));
    }
}

mod indexing_matches_attribute_access {
    use super::*;

    #[test]
    fn string_key_index_sees_keys_inherited_through_super() {
        // §4.5: "tuple indexing by string key = attribute access" — a key only
        // present on a composition predecessor must resolve via `t["k"]` exactly
        // as it does via `t.k`, not just the composite's own entries.
        let doc = load(
            "base:\n  inherited: 1\nresult: !composite\n  - base\n  - extra: 2\noverride: !expr \"result['inherited']\"\n",
        );
        assert!(matches!(doc.get("override").unwrap(), Value::Int(1)));
    }
}

mod super_up_nesting {
    use super::*;

    #[test]
    fn super_and_up_super_resolve_predecessor_tuples() {
        let doc = load(
            "p1:\n  inner:\n    tag: p1\nresult: !composite\n  - p1\n  - inner:\n      tag: !expr \"super.tag\"\n      via_up: !expr \"up.super.tag\"\n",
        );
        let result = doc.get("result").unwrap();
        let tuple = result.as_tuple().unwrap();
        let inner = doc.force(tuple, "inner").unwrap();
        let inner_tuple = inner.as_tuple().unwrap();
        assert_eq!(expect_str(&doc.force(inner_tuple, "tag").unwrap()), "p1");
        assert_eq!(expect_str(&doc.force(inner_tuple, "via_up").unwrap()), "p1");
    }
}

mod lambda {
    use super::*;

    #[test]
    fn callable_with_positional_arguments() {
        let doc = load("add: !lambda \"x, y: x + y\"\nresult: !expr \"add(2, 3)\"\n");
        assert!(matches!(doc.get("result").unwrap(), Value::Int(5)));
    }

    #[test]
    fn wrong_arity_raises_an_error() {
        let doc = load("add: !lambda \"x, y: x + y\"\nresult: !expr \"add(2)\"\n");
        let err = doc.get("result").unwrap_err();
        assert!(matches!(err, yamlet::YamletError::ArityError { .. }));
    }
}

mod cycle {
    use super::*;

    #[test]
    fn self_referential_keys_raise_cycle_detected() {
        let doc = load("a: !expr b\nb: !expr a\nc: 1\n");
        let err = doc.get("a").unwrap_err();
        assert!(matches!(err, yamlet::YamletError::CycleDetected { .. }));
    }

    #[test]
    fn an_unrelated_key_in_the_same_tuple_still_succeeds() {
        let doc = load("a: !expr b\nb: !expr a\nc: 1\n");
        assert!(matches!(doc.get("c").unwrap(), Value::Int(1)));
    }
}
