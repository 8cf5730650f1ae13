//! Tests for argument matching through the full call path.

use subset_r_vm::{Engine, EvalError, Expr, Span, SuppliedArg, Value};

/// Helper: bind a function under `name` in the global environment.
fn define_fn(engine: &mut Engine, name: &str, params: Vec<(&str, Option<Expr>)>, body: Expr) {
    engine
        .eval(&Expr::assign(name, Expr::function(params, body)))
        .unwrap();
}

fn pos(e: Expr) -> SuppliedArg {
    SuppliedArg::positional(e)
}

fn named(n: &str, e: Expr) -> SuppliedArg {
    SuppliedArg::named(n, e)
}

// ==================== Positional Matching ====================

#[test]
fn test_positional_zip_equals_direct() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("x", None), ("y", None), ("z", None)],
        Expr::call_named(
            "list",
            vec![pos(Expr::sym("x")), pos(Expr::sym("y")), pos(Expr::sym("z"))],
        ),
    );
    let v = engine
        .eval(&Expr::call_named(
            "f",
            vec![pos(Expr::int(1)), pos(Expr::int(2)), pos(Expr::int(3))],
        ))
        .unwrap();
    assert_eq!(
        v,
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_oversupply_reports_third_argument() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None), ("y", None)], Expr::sym("x"));
    let err = engine
        .eval(&Expr::call_named(
            "f",
            vec![pos(Expr::num(1.0)), pos(Expr::num(2.0)), pos(Expr::num(3.0))],
        ))
        .unwrap_err();
    assert_eq!(err, EvalError::UnusedArgument("3".to_string()));
    assert_eq!(format!("{}", err), "unused argument (3)");
}

#[test]
fn test_multiple_unused_arguments_all_reported() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None)], Expr::sym("x"));
    let err = engine
        .eval(&Expr::call_named(
            "f",
            vec![pos(Expr::int(1)), named("a", Expr::int(2)), pos(Expr::int(4))],
        ))
        .unwrap_err();
    assert_eq!(
        format!("{}", err),
        "unused arguments (a = 2L, 4L)"
    );
}

// ==================== Named Matching ====================

#[test]
fn test_named_then_positional_then_bundle() {
    // f(alpha, beta, ...) called as f(beta = 2, 1, 3)
    // must match alpha = 1, beta = 2, ... = [3].
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("alpha", None), ("beta", None), ("...", None)],
        Expr::call_named(
            "list",
            vec![
                pos(Expr::sym("alpha")),
                pos(Expr::sym("beta")),
                SuppliedArg::dots(),
            ],
        ),
    );
    let v = engine
        .eval(&Expr::call_named(
            "f",
            vec![named("beta", Expr::int(2)), pos(Expr::int(1)), pos(Expr::int(3))],
        ))
        .unwrap();
    assert_eq!(
        v,
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_named_nonprefix_without_variadic_is_unused() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None)], Expr::sym("x"));
    let err = engine
        .eval(&Expr::call_named(
            "f",
            vec![pos(Expr::int(1)), named("zz", Expr::int(2))],
        ))
        .unwrap_err();
    assert_eq!(err, EvalError::UnusedArgument("zz = 2L".to_string()));
}

#[test]
fn test_unique_prefix_matches() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("verbose", None)], Expr::sym("verbose"));
    let v = engine
        .eval(&Expr::call_named("f", vec![named("verb", Expr::logical(true))]))
        .unwrap();
    assert_eq!(v, Value::Logical(true));
}

#[test]
fn test_ambiguous_prefix_is_an_error() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("value", None), ("verbose", None)],
        Expr::sym("value"),
    );
    let err = engine
        .eval(&Expr::call_named("f", vec![named("v", Expr::int(1))]))
        .unwrap_err();
    assert_eq!(err, EvalError::AmbiguousArgumentMatch("1".to_string()));
    assert_eq!(
        format!("{}", err),
        "argument 1 matches multiple formal arguments"
    );
}

#[test]
fn test_formal_matched_by_exact_then_prefix() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("alpha", None)], Expr::sym("alpha"));
    let err = engine
        .eval(&Expr::call_named(
            "f",
            vec![named("alpha", Expr::int(1)), named("al", Expr::int(2))],
        ))
        .unwrap_err();
    assert_eq!(err, EvalError::FormalMatchedMultiple("alpha".to_string()));
}

#[test]
fn test_zero_length_argument_name() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None), ("...", None)], Expr::sym("x"));
    let err = engine
        .eval(&Expr::call_named("f", vec![named("", Expr::int(1))]))
        .unwrap_err();
    assert_eq!(err, EvalError::ZeroLengthName);
}

// ==================== Variadic Collection ====================

#[test]
fn test_dots_forwarding_between_calls() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "g",
        vec![("...", None)],
        Expr::call_named("sum", vec![SuppliedArg::dots()]),
    );
    define_fn(
        &mut engine,
        "f",
        vec![("x", None), ("...", None)],
        Expr::call_named("g", vec![SuppliedArg::dots()]),
    );
    let v = engine
        .eval(&Expr::call_named(
            "f",
            vec![pos(Expr::int(1)), pos(Expr::int(2)), pos(Expr::int(3))],
        ))
        .unwrap();
    assert_eq!(v, Value::Int(5));
}

#[test]
fn test_bundle_preserves_element_names() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("...", None)],
        Expr::call_named("list", vec![SuppliedArg::dots()]),
    );
    let v = engine
        .eval(&Expr::call_named(
            "f",
            vec![named("a", Expr::int(1)), pos(Expr::int(2))],
        ))
        .unwrap();
    match v {
        Value::List(list) => {
            let list = list.borrow();
            assert_eq!(list.names, Some(vec!["a".to_string(), String::new()]));
            assert_eq!(list.elements, vec![Value::Int(1), Value::Int(2)]);
        }
        other => panic!("expected list, got {:?}", other),
    }
}

#[test]
fn test_empty_bundle_has_length_zero() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("x", None), ("...", None)],
        Expr::call_named(
            "length",
            vec![pos(Expr::call_named("list", vec![SuppliedArg::dots()]))],
        ),
    );
    let v = engine
        .eval(&Expr::call_named("f", vec![pos(Expr::int(1))]))
        .unwrap();
    assert_eq!(v, Value::Int(0));
}

// ==================== Defaults ====================

#[test]
fn test_default_expression_used_when_absent() {
    let mut engine = Engine::new();
    define_fn(
        &mut engine,
        "f",
        vec![("x", None), ("y", Some(Expr::int(10)))],
        Expr::call_named("+", vec![pos(Expr::sym("x")), pos(Expr::sym("y"))]),
    );
    let v = engine
        .eval(&Expr::call_named("f", vec![pos(Expr::int(1))]))
        .unwrap();
    assert_eq!(v, Value::Int(11));
    let v = engine
        .eval(&Expr::call_named("f", vec![pos(Expr::int(1)), pos(Expr::int(2))]))
        .unwrap();
    assert_eq!(v, Value::Int(3));
}

#[test]
fn test_matching_error_carries_call_span() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None)], Expr::sym("x"));
    let span = Span::new(0, 7, 1, 1, 1, 8);
    let call = Expr::call_named("f", vec![pos(Expr::num(1.0)), pos(Expr::num(2.0))])
        .with_span(span);
    let err = engine.eval_spanned(&call).unwrap_err();
    assert_eq!(err.span, Some(span));
    assert_eq!(format!("{}", err), "unused argument (2) at line 1:1");
    assert_eq!(engine.last_error_span(), Some(span));
}

#[test]
fn test_missing_argument_reported_on_use() {
    let mut engine = Engine::new();
    define_fn(&mut engine, "f", vec![("x", None), ("y", None)], Expr::sym("y"));
    let err = engine
        .eval(&Expr::call_named("f", vec![pos(Expr::int(1))]))
        .unwrap_err();
    assert_eq!(err, EvalError::MissingArgument("y".to_string()));
    assert_eq!(
        format!("{}", err),
        "argument \"y\" is missing, with no default"
    );
}
