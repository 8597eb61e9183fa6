//! An ordered parameter collection
//!
//! `ParameterSet` is the simplest `ParameterRegistry`: it owns its parameters,
//! keeps them in insertion order and looks them up case-insensitively. Hosts
//! use it for models whose parameters are plain values, and it is the registry
//! the expression tests run against.

use crate::error::Result;
use crate::expression::{build_evaluator, CompiledEvaluator, EvalContext, ExpressionError, SymbolTable};
use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::{Parameter, ParameterError};
use crate::parameters::registry::{canonical, ParameterRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A collection of parameters addressed by dotted path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct ParameterSet {
    /// Parameters in insertion order
    params: Vec<Parameter>,

    /// Lower-cased path to position in `params`
    index: HashMap<String, usize>,
}

impl ParameterSet {
    /// Create a new empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, rejecting duplicate paths
    ///
    /// # Examples
    ///
    /// ```
    /// use sasfit_core::parameters::{Parameter, ParameterSet};
    ///
    /// let mut params = ParameterSet::new();
    /// params.add(Parameter::new("M1.scale", 1.0)).unwrap();
    /// assert!(params.add(Parameter::new("m1.SCALE", 2.0)).is_err());
    /// assert_eq!(params.len(), 1);
    /// ```
    pub fn add(&mut self, param: Parameter) -> std::result::Result<(), ParameterError> {
        let key = canonical(param.path());
        if key.is_empty() {
            return Err(ParameterError::InvalidPath {
                name: param.path().to_string(),
            });
        }
        if self.index.contains_key(&key) {
            return Err(ParameterError::DuplicateParameter {
                name: param.path().to_string(),
            });
        }
        self.index.insert(key, self.params.len());
        self.params.push(param);
        Ok(())
    }

    /// Add an independent, unbounded parameter
    pub fn add_param(&mut self, path: &str, value: f64) -> std::result::Result<(), ParameterError> {
        self.add(Parameter::new(path, value))
    }

    /// Add a bounded parameter
    pub fn add_param_with_bounds(
        &mut self,
        path: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> std::result::Result<(), ParameterError> {
        self.add(Parameter::with_bounds(path, value, min, max)?)
    }

    /// Add a parameter computed from an expression
    pub fn add_param_with_expr(&mut self, path: &str, expression: &str) -> std::result::Result<(), ParameterError> {
        self.add(Parameter::with_expr(path, expression))
    }

    pub fn get(&self, path: &str) -> Option<&Parameter> {
        self.index.get(&canonical(path)).map(|&i| &self.params[i])
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Parameter> {
        match self.index.get(&canonical(path)) {
            Some(&i) => Some(&mut self.params[i]),
            None => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(&canonical(path))
    }

    /// Remove a parameter, keeping the order of the others
    pub fn remove(&mut self, path: &str) -> Option<Parameter> {
        let position = self.index.remove(&canonical(path))?;
        let removed = self.params.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Path to expression for every computed parameter
    pub fn expressions(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter_map(|p| p.expression().map(|e| (p.path().to_string(), e.to_string())))
            .collect()
    }

    /// Compile the expressions of this set into an evaluator
    pub fn compile(&self, context: &EvalContext) -> std::result::Result<CompiledEvaluator, ExpressionError> {
        let table = SymbolTable::from_registry(self);
        build_evaluator(&table, &self.expressions(), context)
    }

    /// Recompute every computed parameter from the current independent values
    pub fn update_expressions(&mut self, context: &EvalContext) -> Result<()> {
        let evaluator = self.compile(context)?;
        evaluator.apply(self)
    }

    /// Serialize the set to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a set from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn lookup(&self, name: &str) -> std::result::Result<&Parameter, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })
    }
}

impl ParameterRegistry for ParameterSet {
    fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.path().to_string()).collect()
    }

    fn get_param(&self, name: &str) -> std::result::Result<f64, ParameterError> {
        self.lookup(name).map(Parameter::value)
    }

    fn set_param(&mut self, name: &str, value: f64) -> std::result::Result<(), ParameterError> {
        let param = self.get_mut(name).ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })?;
        param.set_value(value);
        Ok(())
    }

    fn get_bounds(&self, name: &str) -> std::result::Result<Bounds, ParameterError> {
        self.lookup(name).map(Parameter::bounds)
    }

    fn has_param(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl TryFrom<Vec<Parameter>> for ParameterSet {
    type Error = ParameterError;

    fn try_from(params: Vec<Parameter>) -> std::result::Result<Self, Self::Error> {
        let mut set = ParameterSet::new();
        for param in params {
            set.add(param)?;
        }
        Ok(set)
    }
}

impl From<ParameterSet> for Vec<Parameter> {
    fn from(set: ParameterSet) -> Self {
        set.params
    }
}
