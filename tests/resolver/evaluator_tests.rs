//! Tests for compiled evaluators over a parameter registry

use sasfit_core::expression::{build_evaluator, EvalContext, ExpressionError, ExpressionMap, SymbolTable};
use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
use sasfit_core::FitError;
use std::f64::consts::PI;

use crate::test_helpers::{approx_eq, params};

fn expressions(pairs: &[(&str, &str)]) -> ExpressionMap {
    pairs
        .iter()
        .map(|(target, expr)| (target.to_string(), expr.to_string()))
        .collect()
}

#[test]
fn test_evaluator_reads_current_values() {
    let mut registry = params(&[("p1", 5.0), ("p2", 0.0)]);
    let table = SymbolTable::from_registry(&registry);
    let evaluator = build_evaluator(&table, &expressions(&[("p2", "p1+3")]), &EvalContext::default()).unwrap();

    evaluator.apply(&mut registry).unwrap();
    assert_eq!(registry.get_param("p2").unwrap(), 8.0);

    registry.set_param("p1", 10.0).unwrap();
    evaluator.apply(&mut registry).unwrap();
    assert_eq!(registry.get_param("p2").unwrap(), 13.0);
}

#[test]
fn test_functions_and_constants() {
    let mut registry = params(&[("p1", 5.0), ("p2", 0.0), ("p3", 6.0)]);
    let table = SymbolTable::from_registry(&registry);
    let evaluator = build_evaluator(
        &table,
        &expressions(&[("p2", "2*pi*sin(p1/0.1875)+p3")]),
        &EvalContext::default(),
    )
    .unwrap();

    evaluator.apply(&mut registry).unwrap();
    let expected = 2.0 * PI * (5.0f64 / 0.1875).sin() + 6.0;
    assert!(approx_eq(registry.get_param("p2").unwrap(), expected, 1e-12));
}

#[test]
fn test_self_reference_is_a_cycle() {
    let registry = params(&[("p4", 1.0)]);
    let table = SymbolTable::from_registry(&registry);
    let err = build_evaluator(&table, &expressions(&[("p4", "p4")]), &EvalContext::default()).unwrap_err();
    assert!(matches!(err, ExpressionError::CyclicDependency { .. }));
    assert!(err.to_string().contains("p4"));
}

#[test]
fn test_two_parameter_cycle_names_both() {
    let registry = params(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
    let table = SymbolTable::from_registry(&registry);
    let err = build_evaluator(
        &table,
        &expressions(&[("a", "b + 1"), ("b", "a * 2"), ("c", "3")]),
        &EvalContext::default(),
    )
    .unwrap_err();

    match err {
        ExpressionError::CyclicDependency { parameters } => {
            assert!(parameters.contains('a'));
            assert!(parameters.contains('b'));
            assert!(!parameters.contains('c'));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn test_dotted_paths_across_models() {
    let mut registry = params(&[("M1.scale", 2.0), ("M2.scale", 0.0), ("M2.radius", 0.0)]);
    let table = SymbolTable::from_registry(&registry);
    let evaluator = build_evaluator(
        &table,
        &expressions(&[("M2.scale", "M1.scale / 4"), ("M2.radius", "sqrt(M2.scale) * 10")]),
        &EvalContext::default(),
    )
    .unwrap();

    assert_eq!(evaluator.order(), vec!["M2.scale", "M2.radius"]);
    evaluator.apply(&mut registry).unwrap();
    assert!(approx_eq(registry.get_param("M2.radius").unwrap(), 0.5f64.sqrt() * 10.0, 1e-12));
}

#[test]
fn test_lookup_is_case_insensitive() {
    let mut registry = params(&[("Radius", 3.0), ("volume", 0.0)]);
    let table = SymbolTable::from_registry(&registry);
    let evaluator = build_evaluator(
        &table,
        &expressions(&[("VOLUME", "4/3 * pi * radius**3")]),
        &EvalContext::default(),
    )
    .unwrap();

    evaluator.apply(&mut registry).unwrap();
    assert!(approx_eq(registry.get_param("volume").unwrap(), 4.0 / 3.0 * PI * 27.0, 1e-9));
}

#[test]
fn test_injected_context() {
    let mut registry = params(&[("a", 2.0), ("b", 0.0)]);
    let table = SymbolTable::from_registry(&registry);
    let context = EvalContext::default().with_constant("avogadro", 6.022e23);
    let evaluator = build_evaluator(&table, &expressions(&[("b", "a * avogadro")]), &context).unwrap();

    evaluator.apply(&mut registry).unwrap();
    assert!(approx_eq(registry.get_param("b").unwrap() / 1.2044e24, 1.0, 1e-12));
}

#[test]
fn test_unknown_name_fails_at_apply() {
    let mut registry = params(&[("a", 2.0), ("b", 0.0)]);
    let table = SymbolTable::from_registry(&registry);
    let evaluator = build_evaluator(&table, &expressions(&[("b", "a * missing")]), &EvalContext::default()).unwrap();

    let err = evaluator.apply(&mut registry).unwrap_err();
    match err {
        FitError::Expression(e) => {
            assert!(matches!(e.root(), ExpressionError::UndefinedName { name } if name == "missing"))
        }
        other => panic!("expected an expression error, got {other:?}"),
    }
    assert_eq!(registry.get_param("b").unwrap(), 0.0);
}

#[test]
fn test_parameter_set_expressions() {
    let mut set = ParameterSet::new();
    set.add_param("p1", 5.0).unwrap();
    set.add_param_with_expr("p2", "p1 + 3").unwrap();
    set.add_param_with_expr("p3", "p2 * 2").unwrap();

    set.update_expressions(&EvalContext::default()).unwrap();
    assert_eq!(set.get_param("p3").unwrap(), 16.0);

    let restored = ParameterSet::from_json(&set.to_json().unwrap()).unwrap();
    assert_eq!(restored.expressions(), set.expressions());
}
