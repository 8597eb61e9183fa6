//! Whitelisted math functions and named constants available to expressions
//!
//! Expressions can only call what is registered here; there is no way to
//! reach anything else from an expression string.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::ast::{EvaluationContext, ExprResult, ExpressionError};

/// A callable math function
#[derive(Debug, Clone, Copy)]
pub enum MathFn {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
    /// One or more arguments
    Variadic(fn(&[f64]) -> f64),
}

impl MathFn {
    /// Apply the function, checking the argument count
    pub fn call(&self, name: &str, args: &[f64]) -> ExprResult<f64> {
        match (self, args) {
            (MathFn::Unary(f), [x]) => Ok(f(*x)),
            (MathFn::Binary(f), [x, y]) => Ok(f(*x, *y)),
            (MathFn::Variadic(f), args) if !args.is_empty() => Ok(f(args)),
            _ => Err(ExpressionError::Arity {
                function: name.to_string(),
                expected: self.arity().to_string(),
                got: args.len(),
            }),
        }
    }

    fn arity(&self) -> &'static str {
        match self {
            MathFn::Unary(_) => "1",
            MathFn::Binary(_) => "2",
            MathFn::Variadic(_) => "at least 1",
        }
    }
}

/// Table of callable functions, by name
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, MathFn>,
}

impl FunctionTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared table of standard math functions
    pub fn standard() -> Arc<FunctionTable> {
        static STANDARD: OnceLock<Arc<FunctionTable>> = OnceLock::new();
        STANDARD.get_or_init(|| Arc::new(Self::build_standard())).clone()
    }

    fn build_standard() -> Self {
        let mut table = Self::new();

        let unary: [(&str, fn(f64) -> f64); 33] = [
            ("sin", f64::sin),
            ("cos", f64::cos),
            ("tan", f64::tan),
            ("asin", f64::asin),
            ("acos", f64::acos),
            ("atan", f64::atan),
            ("arcsin", f64::asin),
            ("arccos", f64::acos),
            ("arctan", f64::atan),
            ("sinh", f64::sinh),
            ("cosh", f64::cosh),
            ("tanh", f64::tanh),
            ("asinh", f64::asinh),
            ("acosh", f64::acosh),
            ("atanh", f64::atanh),
            ("arcsinh", f64::asinh),
            ("arccosh", f64::acosh),
            ("arctanh", f64::atanh),
            ("exp", f64::exp),
            ("expm1", f64::exp_m1),
            ("log", f64::ln),
            ("ln", f64::ln),
            ("log10", f64::log10),
            ("log2", f64::log2),
            ("log1p", f64::ln_1p),
            ("sqrt", f64::sqrt),
            ("abs", f64::abs),
            ("fabs", f64::abs),
            ("ceil", f64::ceil),
            ("floor", f64::floor),
            ("trunc", f64::trunc),
            ("degrees", f64::to_degrees),
            ("radians", f64::to_radians),
        ];
        for (name, f) in unary {
            table.insert(name, MathFn::Unary(f));
        }

        let binary: [(&str, fn(f64, f64) -> f64); 7] = [
            ("atan2", f64::atan2),
            ("arctan2", f64::atan2),
            ("pow", f64::powf),
            ("hypot", f64::hypot),
            ("fmod", |x, y| x % y),
            ("copysign", f64::copysign),
            ("power", f64::powf),
        ];
        for (name, f) in binary {
            table.insert(name, MathFn::Binary(f));
        }

        table.insert("min", MathFn::Variadic(|args| args.iter().copied().fold(f64::INFINITY, f64::min)));
        table.insert("max", MathFn::Variadic(|args| args.iter().copied().fold(f64::NEG_INFINITY, f64::max)));

        table
    }

    /// Register or replace a function
    pub fn insert(&mut self, name: &str, function: MathFn) {
        self.functions.insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<MathFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Names visible to expressions besides the fit parameters
///
/// Holds named constants (`pi`, `e`, `tau`, `inf`, `nan` plus any the host
/// adds) and the function table. Constants may have dotted names, so a host
/// can expose values such as `M2.volume` that are not themselves parameters.
#[derive(Debug, Clone)]
pub struct EvalContext {
    constants: HashMap<String, f64>,
    functions: Arc<FunctionTable>,
}

impl Default for EvalContext {
    fn default() -> Self {
        let constants = [
            ("pi", std::f64::consts::PI),
            ("e", std::f64::consts::E),
            ("tau", std::f64::consts::TAU),
            ("inf", f64::INFINITY),
            ("nan", f64::NAN),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        Self {
            constants,
            functions: FunctionTable::standard(),
        }
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named constant
    pub fn with_constant(mut self, name: &str, value: f64) -> Self {
        self.set_constant(name, value);
        self
    }

    /// Replace the function table
    pub fn with_functions(mut self, functions: Arc<FunctionTable>) -> Self {
        self.functions = functions;
        self
    }

    pub fn set_constant(&mut self, name: &str, value: f64) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

impl EvaluationContext for EvalContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.constant(name).ok_or_else(|| ExpressionError::UndefinedName {
            name: name.to_string(),
        })
    }

    fn get_function(&self, name: &str) -> ExprResult<MathFn> {
        self.functions.get(name).ok_or_else(|| ExpressionError::UndefinedName {
            name: name.to_string(),
        })
    }
}
