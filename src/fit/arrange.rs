//! Fit problems and the registry holding them
//!
//! A [`FitArrange`] pairs one model with the data sets it is fitted against
//! and records which of its parameters are free. The [`FitRegistry`] keeps
//! the problems by id; the engine fits the one selected problem.

use std::collections::BTreeMap;

use crate::error::{FitError, Result};
use crate::expression::{CompiledEvaluator, ExpressionMap};
use crate::fit::data::FitData;
use crate::fit::model::ModelHandle;

/// Identifier of a fit problem
pub type ProblemId = usize;

/// One model with its data sets
#[derive(Clone, Default)]
pub struct FitArrange {
    model: Option<ModelHandle>,
    data: Vec<FitData>,
    /// Free parameter names
    pars: Vec<String>,
    /// Values of `pars` when the model was set
    initial_values: Vec<f64>,
    constraints: ExpressionMap,
    evaluator: Option<CompiledEvaluator>,
    selected: bool,
}

impl FitArrange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model, its free parameters and their starting values
    pub fn set_model(&mut self, model: ModelHandle, pars: Vec<String>, initial_values: Vec<f64>) {
        self.model = Some(model);
        self.pars = pars;
        self.initial_values = initial_values;
    }

    /// Set the constraint expressions and their compiled form
    pub fn set_constraints(&mut self, constraints: ExpressionMap, evaluator: CompiledEvaluator) {
        self.constraints = constraints;
        self.evaluator = (!evaluator.is_empty()).then_some(evaluator);
    }

    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    pub fn remove_model(&mut self) -> Option<ModelHandle> {
        self.pars.clear();
        self.initial_values.clear();
        self.constraints.clear();
        self.evaluator = None;
        self.model.take()
    }

    /// Add a data set, ignoring an identical one already present
    pub fn add_data(&mut self, data: FitData) {
        if !self.data.contains(&data) {
            self.data.push(data);
        }
    }

    pub fn remove_data(&mut self, index: usize) -> Option<FitData> {
        (index < self.data.len()).then(|| self.data.remove(index))
    }

    pub fn data(&self) -> &[FitData] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [FitData] {
        &mut self.data
    }

    pub fn pars(&self) -> &[String] {
        &self.pars
    }

    pub fn initial_values(&self) -> &[f64] {
        &self.initial_values
    }

    pub fn constraints(&self) -> &ExpressionMap {
        &self.constraints
    }

    pub fn evaluator(&self) -> Option<&CompiledEvaluator> {
        self.evaluator.as_ref()
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// True when a model and at least one data set are present
    pub fn is_ready(&self) -> bool {
        self.model.is_some() && !self.data.is_empty()
    }
}

impl std::fmt::Debug for FitArrange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitArrange")
            .field("has_model", &self.model.is_some())
            .field("data", &self.data.len())
            .field("pars", &self.pars)
            .field("constraints", &self.constraints)
            .field("selected", &self.selected)
            .finish()
    }
}

/// Fit problems by id
#[derive(Debug, Clone, Default)]
pub struct FitRegistry {
    problems: BTreeMap<ProblemId, FitArrange>,
}

impl FitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The problem at `id`, created empty if missing
    pub fn entry(&mut self, id: ProblemId) -> &mut FitArrange {
        self.problems.entry(id).or_default()
    }

    pub fn get(&self, id: ProblemId) -> Option<&FitArrange> {
        self.problems.get(&id)
    }

    pub fn get_mut(&mut self, id: ProblemId) -> Option<&mut FitArrange> {
        self.problems.get_mut(&id)
    }

    pub fn get_model(&self, id: ProblemId) -> Option<ModelHandle> {
        self.get(id).and_then(|p| p.model().cloned())
    }

    pub fn remove_model(&mut self, id: ProblemId) -> Option<ModelHandle> {
        self.get_mut(id).and_then(FitArrange::remove_model)
    }

    pub fn remove_data(&mut self, id: ProblemId, index: usize) -> Option<FitData> {
        self.get_mut(id).and_then(|p| p.remove_data(index))
    }

    pub fn remove_fit_problem(&mut self, id: ProblemId) -> Option<FitArrange> {
        self.problems.remove(&id)
    }

    /// Mark the problem at `id` as (not) taking part in the next fit
    pub fn select_problem_for_fit(&mut self, id: ProblemId, selected: bool) {
        if let Some(problem) = self.get_mut(id) {
            problem.set_selected(selected);
        }
    }

    /// Whether the problem at `id` is selected; `None` if there is no such problem
    pub fn get_problem_to_fit(&self, id: ProblemId) -> Option<bool> {
        self.get(id).map(FitArrange::is_selected)
    }

    /// Ids of the selected problems
    pub fn selected(&self) -> Vec<ProblemId> {
        self.problems
            .iter()
            .filter(|(_, p)| p.is_selected())
            .map(|(&id, _)| id)
            .collect()
    }

    /// The one selected problem
    ///
    /// # Errors
    ///
    /// `FitError::Configuration` when no problem or more than one is selected.
    pub fn single_selected(&self) -> Result<(ProblemId, &FitArrange)> {
        let mut selected = self.problems.iter().filter(|(_, p)| p.is_selected());
        match (selected.next(), selected.next()) {
            (Some((&id, problem)), None) => Ok((id, problem)),
            (None, _) => Err(FitError::Configuration(
                "no fit problem selected for fitting".to_string(),
            )),
            (Some(_), Some(_)) => Err(FitError::Configuration(format!(
                "can't fit more than a single fit problem at a time ({} selected)",
                self.selected().len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProblemId, &FitArrange)> {
        self.problems.iter().map(|(&id, p)| (id, p))
    }
}
