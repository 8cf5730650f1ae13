//! Tests for the per-call-site inline cache and its degradation path.

use subset_r_vm::{CallSiteId, Engine, EngineConfig, Expr, SuppliedArg, Value};

fn pos(e: Expr) -> SuppliedArg {
    SuppliedArg::positional(e)
}

fn site_of(expr: &Expr) -> CallSiteId {
    match expr {
        Expr::Call(call) => call.site,
        _ => panic!("not a call"),
    }
}

// ==================== Monomorphic Sites ====================

#[test]
fn test_repeated_call_reuses_one_entry() {
    let mut engine = Engine::new();
    engine
        .eval(&Expr::assign(
            "f",
            Expr::function(
                vec![("x", None), ("y", None)],
                Expr::call_named("-", vec![pos(Expr::sym("x")), pos(Expr::sym("y"))]),
            ),
        ))
        .unwrap();
    let call = Expr::call_named("f", vec![pos(Expr::int(7)), pos(Expr::int(3))]);
    let site = site_of(&call);
    for _ in 0..10 {
        assert_eq!(engine.eval(&call).unwrap(), Value::Int(4));
    }
    let stats = engine.cache_stats(site).unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.evictions, 0);
    assert!(!stats.megamorphic);
}

#[test]
fn test_named_permutation_cached_and_correct() {
    let mut engine = Engine::new();
    engine
        .eval(&Expr::assign(
            "f",
            Expr::function(
                vec![("x", None), ("y", None)],
                Expr::call_named("-", vec![pos(Expr::sym("x")), pos(Expr::sym("y"))]),
            ),
        ))
        .unwrap();
    let call = Expr::call_named(
        "f",
        vec![SuppliedArg::named("y", Expr::int(3)), pos(Expr::int(7))],
    );
    // Same permutation (y named, x positional) replayed from cache.
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(4));
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(4));
    assert_eq!(engine.cache_stats(site_of(&call)).unwrap().entries, 1);
}

// ==================== Polymorphic Sites ====================

#[test]
fn test_callee_change_adds_entry() {
    let mut engine = Engine::new();
    let call = Expr::call_named("f", vec![pos(Expr::int(1)), pos(Expr::int(2))]);
    let site = site_of(&call);

    engine
        .eval(&Expr::assign(
            "f",
            Expr::function(vec![("a", None), ("b", None)], Expr::sym("a")),
        ))
        .unwrap();
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(1));

    engine
        .eval(&Expr::assign(
            "f",
            Expr::function(vec![("a", None), ("b", None)], Expr::sym("b")),
        ))
        .unwrap();
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(2));

    let stats = engine.cache_stats(site).unwrap();
    assert_eq!(stats.entries, 2);
}

#[test]
fn test_megamorphic_degradation_stays_correct() {
    let mut engine = Engine::with_config(EngineConfig {
        inline_cache_depth: 2,
        megamorphic_after: 3,
        ..EngineConfig::default()
    });
    let call = Expr::call_named("f", vec![pos(Expr::int(0))]);
    let site = site_of(&call);
    for i in 0..20 {
        // A fresh closure identity every round.
        engine
            .eval(&Expr::assign(
                "f",
                Expr::function(
                    vec![("x", None)],
                    Expr::call_named("+", vec![pos(Expr::sym("x")), pos(Expr::int(i))]),
                ),
            ))
            .unwrap();
        assert_eq!(engine.eval(&call).unwrap(), Value::Int(i));
    }
    let stats = engine.cache_stats(site).unwrap();
    assert!(stats.megamorphic);
    assert_eq!(stats.entries, 0);
    // Still correct on the fully dynamic path.
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(19));
}

// ==================== Shape Sensitivity ====================

#[test]
fn test_variadic_expansion_changes_shape() {
    let mut engine = Engine::new();
    engine
        .eval(&Expr::assign(
            "f",
            Expr::function(vec![("...", None)], {
                Expr::call_named("sum", vec![SuppliedArg::dots()])
            }),
        ))
        .unwrap();
    // One shared inner site, reached with different bundle widths.
    let inner = Expr::call_named("f", vec![SuppliedArg::dots()]);
    let inner_site = site_of(&inner);
    engine
        .eval(&Expr::assign(
            "g",
            Expr::function(vec![("...", None)], inner),
        ))
        .unwrap();
    let one = Expr::call_named("g", vec![pos(Expr::int(5))]);
    let two = Expr::call_named("g", vec![pos(Expr::int(5)), pos(Expr::int(6))]);
    assert_eq!(engine.eval(&one).unwrap(), Value::Int(5));
    assert_eq!(engine.eval(&two).unwrap(), Value::Int(11));
    assert_eq!(engine.eval(&one).unwrap(), Value::Int(5));
    // Two shapes, two entries, same callee.
    assert_eq!(engine.cache_stats(inner_site).unwrap().entries, 2);
}

// ==================== Generic Snapshots ====================

#[test]
fn test_dispatch_snapshot_reused_and_refreshed() {
    let mut engine = Engine::new();
    engine.define("m", Value::classed_list(vec![], &["money"]));
    engine
        .eval(&Expr::assign(
            "+.money",
            Expr::function(vec![("e1", None), ("e2", None)], Expr::string("money")),
        ))
        .unwrap();
    let call = Expr::call_named("+", vec![pos(Expr::sym("m")), pos(Expr::int(1))]);
    let site = site_of(&call);
    for _ in 0..5 {
        assert_eq!(
            engine.eval(&call).unwrap(),
            Value::Str("money".to_string())
        );
    }
    assert_eq!(engine.cache_stats(site).unwrap().entries, 1);

    // Rebinding m to a different class re-resolves at the same site.
    engine.define("m", Value::classed_list(vec![], &["points"]));
    engine
        .eval(&Expr::assign(
            "+.points",
            Expr::function(vec![("e1", None), ("e2", None)], Expr::string("points")),
        ))
        .unwrap();
    assert_eq!(
        engine.eval(&call).unwrap(),
        Value::Str("points".to_string())
    );
    // And back to plain numbers: the primitive runs again.
    engine.define("m", Value::Int(41));
    assert_eq!(engine.eval(&call).unwrap(), Value::Int(42));
}
