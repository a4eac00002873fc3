use std::ops::RangeInclusive;

use ypatch::codec;
use ypatch::context::EvalContext;
use ypatch::evaluator::{EvalError, Language};
use ypatch::functions::{Function, Registry};
use ypatch::mutate;
use ypatch::value::Value;

fn doc(yaml: &str) -> Value {
    codec::decode_document(yaml).unwrap()
}

fn ctx_for(yaml: &str) -> EvalContext {
    EvalContext::new(doc(yaml), Value::mapping(Default::default()))
}

fn eval(lang: &Language, input: &str, ctx: &mut EvalContext) -> Result<Value, EvalError> {
    let expr = lang.parse(input).unwrap();
    lang.evaluate(&expr, ctx)
}

/// Evaluate an action and apply its queued mutations, like the pipeline
/// does for each `-e` expression.
fn run_action(input: &str, ctx: &mut EvalContext) -> Result<(), EvalError> {
    let lang = Language::actions();
    eval(&lang, input, ctx)?;
    let targets = std::mem::take(&mut ctx.targets);
    mutate::apply(&mut ctx.root, &targets).unwrap();
    ctx.refresh_current_item();
    Ok(())
}

#[test]
fn test_path_resolution() {
    let mut ctx = ctx_for("metadata:\n  name: web\n  labels:\n    app: api\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "metadata.name", &mut ctx).unwrap(),
        Value::string("web")
    );
    assert_eq!(
        eval(&lang, "metadata.labels.app", &mut ctx).unwrap(),
        Value::string("api")
    );
}

#[test]
fn test_missing_path_reads_as_nil() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(eval(&lang, "does.not.exist", &mut ctx).unwrap().is_null());
}

#[test]
fn test_sequence_index_path() {
    let mut ctx = ctx_for("items:\n  - first\n  - second\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "items.1", &mut ctx).unwrap(),
        Value::string("second")
    );
}

#[test]
fn test_integer_arithmetic_stays_integer() {
    let mut ctx = ctx_for("replicas: 2\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "replicas + 1", &mut ctx).unwrap(),
        Value::integer(3)
    );
    assert_eq!(eval(&lang, "6 / 2", &mut ctx).unwrap(), Value::integer(3));
    assert_eq!(eval(&lang, "7 % 3", &mut ctx).unwrap(), Value::integer(1));
}

#[test]
fn test_inexact_division_goes_float() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert_eq!(eval(&lang, "1 / 2", &mut ctx).unwrap(), Value::float(0.5));
}

#[test]
fn test_mixed_arithmetic() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "2 + 0.5", &mut ctx).unwrap(),
        Value::float(2.5)
    );
    // Whole-number results collapse back to integers
    assert_eq!(
        eval(&lang, "2.5 * 2", &mut ctx).unwrap(),
        Value::integer(5)
    );
}

#[test]
fn test_division_by_zero() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(matches!(
        eval(&lang, "1 / 0", &mut ctx),
        Err(EvalError::DivisionByZero)
    ));
}

#[test]
fn test_string_concat_with_plus() {
    let mut ctx = ctx_for("name: web\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "name + \"-suffix\"", &mut ctx).unwrap(),
        Value::string("web-suffix")
    );
}

#[test]
fn test_comparisons() {
    let mut ctx = ctx_for("n: 5\n");
    let lang = Language::actions();
    assert_eq!(eval(&lang, "n > 3", &mut ctx).unwrap(), Value::boolean(true));
    assert_eq!(
        eval(&lang, "n <= 4", &mut ctx).unwrap(),
        Value::boolean(false)
    );
    assert_eq!(
        eval(&lang, "\"abc\" < \"abd\"", &mut ctx).unwrap(),
        Value::boolean(true)
    );
    // Cross-type numeric equality
    assert_eq!(
        eval(&lang, "5 == 5.0", &mut ctx).unwrap(),
        Value::boolean(true)
    );
}

#[test]
fn test_regex_match() {
    let mut ctx = ctx_for("name: web-frontend\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "name =~ \"^web-\"", &mut ctx).unwrap(),
        Value::boolean(true)
    );
    assert_eq!(
        eval(&lang, "name =~ \"^api-\"", &mut ctx).unwrap(),
        Value::boolean(false)
    );
    assert!(matches!(
        eval(&lang, "name =~ \"[\"", &mut ctx),
        Err(EvalError::InvalidRegex(_))
    ));
}

#[test]
fn test_logical_short_circuit() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    // The right side would be a division by zero if evaluated
    assert_eq!(
        eval(&lang, "false && 1 / 0 == 1", &mut ctx).unwrap(),
        Value::boolean(false)
    );
    assert_eq!(
        eval(&lang, "true || 1 / 0 == 1", &mut ctx).unwrap(),
        Value::boolean(true)
    );
}

#[test]
fn test_selector_dialect_has_no_functions() {
    let mut ctx = ctx_for("name: web\n");
    let lang = Language::selector();
    let expr = lang.parse("unset(name)").unwrap();
    assert!(matches!(
        lang.evaluate(&expr, &mut ctx),
        Err(EvalError::UnknownFunction(_))
    ));
}

#[test]
fn test_assignment_existing_key() {
    let mut ctx = ctx_for("metadata:\n  name: web\n");
    run_action("metadata.name = \"api\"", &mut ctx).unwrap();
    assert_eq!(
        ctx.root.get_path(&["metadata".into(), "name".into()]).unwrap(),
        &Value::string("api")
    );
}

#[test]
fn test_assignment_creates_missing_path() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("metadata.labels.tier = \"backend\"", &mut ctx).unwrap();
    assert_eq!(
        ctx.root
            .get_path(&["metadata".into(), "labels".into(), "tier".into()])
            .unwrap(),
        &Value::string("backend")
    );
    // The original content is untouched
    assert_eq!(ctx.root.get_path(&["a".into()]).unwrap(), &Value::integer(1));
}

#[test]
fn test_assignment_from_other_key() {
    let mut ctx = ctx_for("src: hello\ndst: old\n");
    run_action("dst = src", &mut ctx).unwrap();
    assert_eq!(
        ctx.root.get_path(&["dst".into()]).unwrap(),
        &Value::string("hello")
    );
    assert_eq!(
        ctx.root.get_path(&["src".into()]).unwrap(),
        &Value::string("hello")
    );
}

#[test]
fn test_assigning_missing_rhs_writes_nil() {
    let mut ctx = ctx_for("maptype:\n  x: 1\n");
    run_action("maptype = noexist", &mut ctx).unwrap();
    assert!(ctx.root.get_path(&["maptype".into()]).unwrap().is_null());
}

#[test]
fn test_root_self_assignment_deep_copies() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("backup = @", &mut ctx).unwrap();
    assert_eq!(
        ctx.root.get_path(&["backup".into(), "a".into()]).unwrap(),
        &Value::integer(1)
    );
    assert_eq!(ctx.root.get_path(&["a".into()]).unwrap(), &Value::integer(1));
}

#[test]
fn test_root_replacement_requires_mapping() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    let result = eval(&lang, "@ = 5", &mut ctx);
    assert!(matches!(result, Err(EvalError::TypeError(_))));
}

#[test]
fn test_root_replacement_with_mapping() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("@ = merge(@, yaml_parse(\"b: 2\"))", &mut ctx).unwrap();
    assert_eq!(ctx.root.get_path(&["a".into()]).unwrap(), &Value::integer(1));
    assert_eq!(ctx.root.get_path(&["b".into()]).unwrap(), &Value::integer(2));
}

#[test]
fn test_pipe_rewrites_every_element() {
    let mut ctx = ctx_for("list:\n  - a\n  - b\n  - c\n");
    run_action("list | @ = \"X\"", &mut ctx).unwrap();
    let items = ctx.root.get_path(&["list".into()]).unwrap();
    assert_eq!(
        items.as_sequence().unwrap(),
        &[Value::string("X"), Value::string("X"), Value::string("X")]
    );
}

#[test]
fn test_pipe_collects_results() {
    let mut ctx = ctx_for("nums:\n  - 1\n  - 2\n  - 3\n");
    let lang = Language::actions();
    let result = eval(&lang, "nums | @ + 10", &mut ctx).unwrap();
    assert_eq!(
        result.as_sequence().unwrap(),
        &[Value::integer(11), Value::integer(12), Value::integer(13)]
    );
}

#[test]
fn test_pipe_over_mapping_sorted_keys() {
    let mut ctx = ctx_for("env:\n  ZULU: z\n  ALPHA: a\n  MIKE: m\n");
    let lang = Language::actions();
    let result = eval(&lang, "env | @key", &mut ctx).unwrap();
    assert_eq!(
        result.as_sequence().unwrap(),
        &[
            Value::string("ALPHA"),
            Value::string("MIKE"),
            Value::string("ZULU"),
        ]
    );
}

#[test]
fn test_pipe_over_scalar_is_single_iteration() {
    let mut ctx = ctx_for("name: web\n");
    let lang = Language::actions();
    let result = eval(&lang, "name | @key", &mut ctx).unwrap();
    assert_eq!(result.as_sequence().unwrap(), &[Value::integer(0)]);
}

#[test]
fn test_pipe_swallows_element_errors() {
    let mut ctx = ctx_for("list:\n  - ok\n  - 5\n");
    let lang = Language::actions();
    // Regex match fails on the integer element but the pipe carries on
    let result = eval(&lang, "list | @ =~ \"^o\"", &mut ctx).unwrap();
    assert_eq!(result.as_sequence().unwrap().len(), 1);
}

#[test]
fn test_current_key_outside_pipe_is_nil() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(eval(&lang, "@key", &mut ctx).unwrap().is_null());
}

#[test]
fn test_unset_present_key() {
    let mut ctx = ctx_for("keep: 1\ndrop_me: 2\n");
    run_action("unset(drop_me)", &mut ctx).unwrap();
    assert!(ctx.root.get_path(&["drop_me".into()]).is_none());
    assert!(ctx.root.get_path(&["keep".into()]).is_some());
}

#[test]
fn test_unset_absent_key_is_noop() {
    let mut ctx = ctx_for("keep: 1\n");
    run_action("unset(no.such.key)", &mut ctx).unwrap();
    assert!(ctx.root.get_path(&["keep".into()]).is_some());
}

#[test]
fn test_unset_variadic() {
    let mut ctx = ctx_for("a: 1\nb: 2\nc: 3\n");
    run_action("unset(a, c)", &mut ctx).unwrap();
    assert!(ctx.root.get_path(&["a".into()]).is_none());
    assert!(ctx.root.get_path(&["b".into()]).is_some());
    assert!(ctx.root.get_path(&["c".into()]).is_none());
}

#[test]
fn test_drop_sets_flag() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("drop()", &mut ctx).unwrap();
    assert!(ctx.drop);
}

#[test]
fn test_bare_drop_identifier_calls_function() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("drop", &mut ctx).unwrap();
    assert!(ctx.drop);
}

#[test]
fn test_assigning_to_function_named_key_writes_the_key() {
    let mut ctx = ctx_for("a: 1\n");
    run_action("drop = 1", &mut ctx).unwrap();
    assert!(!ctx.drop);
    assert_eq!(
        ctx.root.get_path(&["drop".into()]).unwrap(),
        &Value::integer(1)
    );
}

#[test]
fn test_document_key_shadows_function_name() {
    let mut ctx = ctx_for("drop: shadowed\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "drop", &mut ctx).unwrap(),
        Value::string("shadowed")
    );
    assert!(!ctx.drop);
}

#[test]
fn test_if_branches() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "if(a == 1, \"yes\", \"no\")", &mut ctx).unwrap(),
        Value::string("yes")
    );
    assert_eq!(
        eval(&lang, "if(a == 2, \"yes\", \"no\")", &mut ctx).unwrap(),
        Value::string("no")
    );
    // Without an else branch the false case is nil
    assert!(eval(&lang, "if(a == 2, \"yes\")", &mut ctx).unwrap().is_null());
}

#[test]
fn test_if_arity_errors() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(matches!(
        eval(&lang, "if(true)", &mut ctx),
        Err(EvalError::Arity(_))
    ));
    assert!(matches!(
        eval(&lang, "if(true, 1, 2, 3)", &mut ctx),
        Err(EvalError::Arity(_))
    ));
}

#[test]
fn test_v_resolves_dynamic_path() {
    let mut ctx = ctx_for("a:\n  b: found\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "v([\"a\", \"b\"])", &mut ctx).unwrap(),
        Value::string("found")
    );
}

#[test]
fn test_v_missing_path_is_an_error() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(matches!(
        eval(&lang, "v([\"no\", \"such\"])", &mut ctx),
        Err(EvalError::KeyNotFound(_))
    ));
}

#[test]
fn test_merge_override() {
    let mut ctx = ctx_for("a:\n  x: 1\n");
    let lang = Language::actions();
    let result = eval(
        &lang,
        "merge(@, yaml_parse(\"a: {x: 2, y: 3}\"))",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(
        result.get_path(&["a".into(), "x".into()]).unwrap(),
        &Value::integer(2)
    );
    assert_eq!(
        result.get_path(&["a".into(), "y".into()]).unwrap(),
        &Value::integer(3)
    );
}

#[test]
fn test_b64_round_trip() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "b64encode(\"hello\")", &mut ctx).unwrap(),
        Value::string("aGVsbG8=")
    );
    assert_eq!(
        eval(&lang, "b64decode(\"aGVsbG8=\")", &mut ctx).unwrap(),
        Value::string("hello")
    );
}

#[test]
fn test_b64_decode_invalid_input() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    assert!(matches!(
        eval(&lang, "b64decode(\"not base64!!\")", &mut ctx),
        Err(EvalError::Function(_))
    ));
}

#[test]
fn test_yaml_dump_and_parse() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    let dumped = eval(&lang, "yaml_dump(@)", &mut ctx).unwrap();
    assert_eq!(dumped, Value::string("a: 1\n"));
    let parsed = eval(&lang, "yaml_parse(\"b: 2\")", &mut ctx).unwrap();
    assert_eq!(parsed.get_path(&["b".into()]).unwrap(), &Value::integer(2));
}

#[test]
fn test_concat_flattens_sequences() {
    let mut ctx = ctx_for("a: 1\n");
    let lang = Language::actions();
    let result = eval(&lang, "concat([1, 2], 3, [4])", &mut ctx).unwrap();
    assert_eq!(
        result.as_sequence().unwrap(),
        &[
            Value::integer(1),
            Value::integer(2),
            Value::integer(3),
            Value::integer(4),
        ]
    );
}

#[test]
fn test_splice_replace() {
    let mut ctx = ctx_for("list:\n  - a\n  - b\n  - c\n");
    run_action("splice_replace(list.1, [\"x\", \"y\"])", &mut ctx).unwrap();
    let items = ctx.root.get_path(&["list".into()]).unwrap();
    assert_eq!(
        items.as_sequence().unwrap(),
        &[
            Value::string("a"),
            Value::string("x"),
            Value::string("y"),
            Value::string("c"),
        ]
    );
}

#[test]
fn test_registering_a_custom_function() {
    struct Upper;
    impl Function for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let s = args[0].as_str().unwrap_or_default();
            Ok(Value::string(s.to_uppercase()))
        }
    }

    let mut registry = Registry::with_builtins();
    registry.register(Upper);
    assert!(registry.contains("upper"));
    assert!(registry.contains("drop"));

    let mut ctx = ctx_for("a: 1\n");
    let f = registry.get("upper").unwrap();
    let result = f.call(&mut ctx, vec![Value::string("web")]).unwrap();
    assert_eq!(result, Value::string("WEB"));
}

#[test]
fn test_params_lookup() {
    let params = doc("env: prod\nregion: eu\n");
    let mut ctx = EvalContext::new(doc("a: 1\n"), params);
    let lang = Language::actions();
    assert_eq!(
        eval(&lang, "$.env", &mut ctx).unwrap(),
        Value::string("prod")
    );
    assert!(eval(&lang, "$.missing", &mut ctx).unwrap().is_null());
}

#[test]
fn test_params_in_assignment() {
    let params = doc("replicas: 7\n");
    let mut ctx = EvalContext::new(doc("spec:\n  replicas: 1\n"), params);
    let lang = Language::actions();
    let expr = lang.parse("spec.replicas = $.replicas").unwrap();
    lang.evaluate(&expr, &mut ctx).unwrap();
    let targets = std::mem::take(&mut ctx.targets);
    mutate::apply(&mut ctx.root, &targets).unwrap();
    assert_eq!(
        ctx.root
            .get_path(&["spec".into(), "replicas".into()])
            .unwrap(),
        &Value::integer(7)
    );
}
