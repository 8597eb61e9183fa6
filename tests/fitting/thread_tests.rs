//! Tests for fits running on the background worker

use sasfit_core::expression::{build_evaluator, EvalContext, ExpressionMap, SymbolTable};
use sasfit_core::fit::{model_handle, BaseModel, FitEngine, FitResult, FitStatus, FitThread};
use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
use sasfit_core::scheduler::Completion;
use sasfit_core::FitError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::test_helpers::{approx_eq, channel, fast_config, linear_data, linear_handle};

const TIMEOUT: Duration = Duration::from_secs(10);

fn linear_engine() -> FitEngine {
    let mut engine = FitEngine::new();
    engine
        .set_model(0, linear_handle(1.0, 0.0), &["slope", "intercept"], &[])
        .unwrap();
    engine.set_data(0, linear_data(2.0, 3.0, 10), None, None);
    engine.select_problem_for_fit(0, true);
    engine
}

/// A line whose evaluation takes `delay`
fn slow_engine(delay: Duration) -> FitEngine {
    let mut params = ParameterSet::new();
    params.add_param("slope", 1.0).unwrap();
    params.add_param("intercept", 0.0).unwrap();
    let model = BaseModel::new("slow", params, move |p, x| {
        std::thread::sleep(delay);
        let slope = p.get_param("slope")?;
        let intercept = p.get_param("intercept")?;
        Ok(x.mapv(|xi| slope * xi.sin() + intercept))
    });

    let mut engine = FitEngine::new();
    engine.set_model(0, model_handle(model), &["slope", "intercept"], &[]).unwrap();
    engine.set_data(0, linear_data(2.0, 3.0, 10), None, None);
    engine.select_problem_for_fit(0, true);
    engine
}

#[test]
fn test_fit_completes_with_result() {
    let (on_progress, progress) = channel::<FitResult>();
    let (on_complete, completions) = channel();
    let thread = FitThread::new(fast_config(), on_progress, on_complete);

    thread.queue(Arc::new(linear_engine()));
    thread.ready(Duration::ZERO);

    let result = completions.recv_timeout(TIMEOUT).unwrap().into_done().unwrap();
    assert_eq!(result.status, FitStatus::Converged);
    assert!(approx_eq(result.value("slope").unwrap(), 2.0, 1e-6));
    assert!(approx_eq(result.value("intercept").unwrap(), 3.0, 1e-6));

    assert!(thread.wait_idle(TIMEOUT));
    let updates: Vec<FitResult> = progress.try_iter().collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, FitStatus::Running);
}

#[test]
fn test_interrupt_terminates_fit() {
    let (on_complete, completions) = channel();
    let thread = FitThread::new(fast_config(), |_| {}, on_complete);

    thread.queue(Arc::new(slow_engine(Duration::from_millis(20))));
    std::thread::sleep(Duration::from_millis(50));
    assert!(thread.is_running());

    let asked = Instant::now();
    thread.interrupt();

    let completion = completions.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(completion, Completion::Terminated);
    assert!(asked.elapsed() < Duration::from_secs(1));
    assert!(thread.wait_idle(TIMEOUT));
}

#[test]
fn test_failed_fit_reports_error() {
    let mut params = ParameterSet::new();
    params.add_param("a", 1.0).unwrap();
    let model = BaseModel::new("broken", params, |_, _| {
        Err(FitError::ModelEvaluation("form factor undefined".to_string()))
    });
    let mut engine = FitEngine::new();
    engine.set_model(0, model_handle(model), &["a"], &[]).unwrap();
    engine.set_data(0, linear_data(1.0, 0.0, 5), None, None);
    engine.select_problem_for_fit(0, true);

    let (on_complete, completions) = channel();
    let thread = FitThread::new(fast_config(), |_| {}, on_complete);
    thread.queue(Arc::new(engine));

    match completions.recv_timeout(TIMEOUT).unwrap() {
        Completion::Failed(message) => assert!(message.contains("form factor undefined")),
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn test_undefined_constraint_name_fails_fit() {
    let mut params = ParameterSet::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param("b", 0.0).unwrap();
    let model = model_handle(BaseModel::new("tied", params, |p, x| {
        let a = p.get_param("a")?;
        let b = p.get_param("b")?;
        Ok(x.mapv(|xi| a * xi + b))
    }));

    let mut engine = FitEngine::new();
    engine.set_model(0, model.clone(), &["a"], &[]).unwrap();
    engine.set_data(0, linear_data(2.0, 4.0, 8), None, None);
    engine.select_problem_for_fit(0, true);

    // Compiled without the dry run, so the unknown name is only met mid-fit
    let mut constraints = ExpressionMap::new();
    constraints.insert("b".to_string(), "a * missing".to_string());
    let evaluator = {
        let guard = model.lock().unwrap();
        let table = SymbolTable::from_registry(&*guard);
        build_evaluator(&table, &constraints, &EvalContext::default()).unwrap()
    };
    engine.registry_mut().entry(0).set_constraints(constraints, evaluator);

    let (on_complete, completions) = channel();
    let thread = FitThread::new(fast_config(), |_| {}, on_complete);
    thread.queue(Arc::new(engine));

    match completions.recv_timeout(TIMEOUT).unwrap() {
        Completion::Failed(message) => assert!(message.contains("missing"), "{message}"),
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(thread.wait_idle(TIMEOUT));
    assert_eq!(model.lock().unwrap().get_param("b").unwrap(), 0.0);
}

#[test]
fn test_reset_replaces_running_fit() {
    let (on_complete, completions) = channel();
    let thread = FitThread::new(fast_config(), |_| {}, on_complete);

    thread.queue(Arc::new(slow_engine(Duration::from_millis(20))));
    std::thread::sleep(Duration::from_millis(20));
    thread.reset(Arc::new(linear_engine()));
    assert!(thread.wait_idle(TIMEOUT));

    let completions: Vec<Completion<FitResult>> = completions.try_iter().collect();
    assert_eq!(completions.len(), 2);
    assert!(completions[0].is_terminated());
    assert!(completions[1].is_done());
}
