//! Tests for fits run directly through the engine

use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use sasfit_core::fit::{chi_square, model_handle, BaseModel, FitConfig, FitData, FitEngine, FitStatus};
use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
use sasfit_core::FitError;
use std::sync::atomic::AtomicBool;

use crate::test_helpers::{approx_eq, linear_data, linear_handle};

/// `scale * exp(-(q * rg)^2 / 3) + background`
fn guinier_model(scale: f64, rg: f64, background: f64) -> BaseModel {
    let mut params = ParameterSet::new();
    params.add_param_with_bounds("scale", scale, 0.0, 1e4).unwrap();
    params.add_param_with_bounds("rg", rg, 1.0, 500.0).unwrap();
    params.add_param("background", background).unwrap();
    BaseModel::new("guinier", params, |p, q| {
        let scale = p.get_param("scale")?;
        let rg = p.get_param("rg")?;
        let background = p.get_param("background")?;
        Ok(q.mapv(|qi| scale * (-(qi * rg).powi(2) / 3.0).exp() + background))
    })
}

#[test]
fn test_linear_fit_without_noise() {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(1.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(2.5, -1.0, 10), None, None);
    engine.select_problem_for_fit(0, true);

    let result = engine.fit(&()).unwrap();
    assert!(result.is_success());
    assert_eq!(result.status, FitStatus::Converged);
    assert!(approx_eq(result.value("slope").unwrap(), 2.5, 1e-6));
    assert!(approx_eq(result.value("intercept").unwrap(), -1.0, 1e-6));
    assert!(chi_square(&result.residuals).unwrap() < 1e-12);
    assert_eq!(result.residuals.len(), 10);
    assert_eq!(result.stderr.len(), 2);

    let model = engine.get_model(0).unwrap();
    let slope = model.lock().unwrap().get_param("slope").unwrap();
    assert!(approx_eq(slope, 2.5, 1e-6));
}

#[test]
fn test_noisy_guinier_fit() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.01).unwrap();

    let q = Array1::linspace(0.001, 0.05, 60);
    let truth = guinier_model(100.0, 40.0, 0.5);
    let clean = sasfit_core::fit::FitModel::eval(&truth, &q).unwrap();
    let y = clean.mapv(|v| v * (1.0 + noise.sample(&mut rng)));
    let dy = clean.mapv(|v| 0.01 * v);

    let mut engine = FitEngine::new();
    engine
        .set_model(3, model_handle(guinier_model(50.0, 20.0, 0.0)), &["scale", "rg", "background"], &[])
        .unwrap();
    engine.set_data(3, FitData::new(q, y, Some(dy)).unwrap(), None, None);
    engine.select_problem_for_fit(3, true);

    let result = engine.fit(&()).unwrap();
    assert!(approx_eq(result.value("rg").unwrap(), 40.0, 2.0));
    assert!(approx_eq(result.value("scale").unwrap(), 100.0, 5.0));
    assert!(result.error("rg").unwrap() > 0.0);
}

#[test]
fn test_fitted_values_stay_in_bounds() {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(5.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(-3.0, 1.0, 12), None, None);
    engine.select_problem_for_fit(0, true);

    let result = engine.fit(&()).unwrap();
    let slope = result.value("slope").unwrap();
    assert!((0.0..=100.0).contains(&slope));

    let model = engine.get_model(0).unwrap();
    let stored = model.lock().unwrap().get_param("slope").unwrap();
    assert!((0.0..=100.0).contains(&stored));
}

/// `a * x + b` fitted to `y = 3x + 6` with `b` tied to `a` by `constraint`
fn tied_engine(constraint: &str) -> FitEngine {
    let mut params = ParameterSet::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param("b", 0.0).unwrap();
    let model = BaseModel::new("tied", params, |p, x| {
        let a = p.get_param("a")?;
        let b = p.get_param("b")?;
        Ok(x.mapv(|xi| a * xi + b))
    });

    let x = Array1::linspace(0.0, 5.0, 8);
    let y = x.mapv(|xi| 3.0 * xi + 6.0);

    let mut engine = FitEngine::new();
    engine
        .set_model(0, model_handle(model), &["a"], &[("b", constraint)])
        .unwrap();
    engine.set_data(0, FitData::new(x, y, None).unwrap(), None, None);
    engine.select_problem_for_fit(0, true);
    engine
}

#[test]
fn test_constraint_tracks_free_parameter() {
    let engine = tied_engine("2 * a");

    let result = engine.fit(&()).unwrap();
    assert!(approx_eq(result.value("a").unwrap(), 3.0, 1e-6));
    let model = engine.get_model(0).unwrap();
    assert!(approx_eq(model.lock().unwrap().get_param("b").unwrap(), 6.0, 1e-6));
}

#[test]
fn test_constrained_parameter_reported_with_error() {
    let engine = tied_engine("2 * a");

    let result = engine.fit(&()).unwrap();
    assert_eq!(result.param_names, vec!["a".to_string()]);
    assert_eq!(result.constrained_names, vec!["b".to_string()]);
    assert!(approx_eq(result.value("b").unwrap(), 6.0, 1e-6));

    let err_a = result.error("a").unwrap();
    let err_b = result.error("b").unwrap();
    assert!(err_a > 0.0);
    assert!(approx_eq(err_b / err_a, 2.0, 1e-4));
}

#[test]
fn test_undefined_constraint_name_rejected_by_set_model() {
    let mut params = ParameterSet::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param("b", 0.0).unwrap();
    let model = model_handle(BaseModel::new("tied", params, |p, x| {
        let a = p.get_param("a")?;
        Ok(x.mapv(|xi| a * xi))
    }));

    let mut engine = FitEngine::new();
    match engine.set_model(0, model, &["a"], &[("b", "a * missing")]) {
        Err(FitError::InvalidConstraints { errors }) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].to_string().contains("missing"));
        }
        other => panic!("expected invalid constraints, got {other:?}"),
    }
    assert!(engine.registry().is_empty());
}

#[test]
fn test_fit_range_limits_residuals() {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(1.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(2.0, 0.0, 11), Some(2.0), Some(6.0));
    engine.select_problem_for_fit(0, true);

    let result = engine.fit(&()).unwrap();
    assert_eq!(result.residuals.len(), 5);
    assert_eq!(result.theory.len(), 5);
}

#[test]
fn test_two_data_sets_fit_jointly() {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(1.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(4.0, 2.0, 6), None, None);
    engine.set_data(0, linear_data(4.0, 2.0, 9), None, None);
    engine.select_problem_for_fit(0, true);

    let result = engine.fit(&()).unwrap();
    assert_eq!(result.residuals.len(), 15);
    assert!(approx_eq(result.value("slope").unwrap(), 4.0, 1e-6));
}

#[test]
fn test_raised_abort_flag_cancels() {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(1.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(2.0, 0.0, 10), None, None);
    engine.select_problem_for_fit(0, true);

    let abort = AtomicBool::new(true);
    assert!(engine.fit(&abort).unwrap_err().is_cancelled());
}

#[test]
fn test_model_failure_aborts_fit() {
    let mut params = ParameterSet::new();
    params.add_param("a", 1.0).unwrap();
    let model = BaseModel::new("broken", params, |_, _| {
        Err(FitError::ModelEvaluation("form factor undefined".to_string()))
    });

    let mut engine = FitEngine::new();
    engine.set_model(0, model_handle(model), &["a"], &[]).unwrap();
    engine.set_data(0, linear_data(1.0, 0.0, 5), None, None);
    engine.select_problem_for_fit(0, true);

    assert!(matches!(engine.fit(&()), Err(FitError::ModelEvaluation(_))));
}

#[test]
fn test_config_from_json() {
    let config = FitConfig::from_json(r#"{ "penalty": 1e3, "reset_initial": true }"#).unwrap();
    assert_eq!(config.penalty, 1e3);
    assert!(config.reset_initial);
    assert_eq!(config.patience, FitConfig::default().patience);
}
