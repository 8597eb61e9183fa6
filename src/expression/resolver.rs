//! Dependency analysis and compilation of constraint expressions
//!
//! A set of expressions `{target -> expression}` is compiled into a
//! [`CompiledEvaluator`]: every expression is parsed once, bound to the
//! symbol table, and ordered so that each target is assigned after all of its
//! prerequisites. Applying the evaluator reads the current parameter values
//! from a [`ParameterRegistry`] and writes the computed ones back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::ast::{EvaluationContext, ExprResult, Expression, ExpressionError};
use super::functions::{EvalContext, MathFn};
use super::symbols::{extract_symbols, substitute_with, Symbol, SymbolTable};
use crate::error::Result;
use crate::parameters::registry::ParameterRegistry;
use crate::parameters::ParameterSet;

/// Target path to expression text
pub type ExpressionMap = BTreeMap<String, String>;

/// `dependent` needs `prerequisite` to be evaluated first
///
/// A constant expression has a single edge with no prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    pub dependent: Symbol,
    pub prerequisite: Option<Symbol>,
}

/// One edge per (target, referenced parameter) pair
///
/// Targets with an empty expression are skipped. A target that is not in
/// the symbol table is an error.
pub fn find_dependencies(
    table: &SymbolTable,
    expressions: &ExpressionMap,
) -> std::result::Result<Vec<DependencyEdge>, ExpressionError> {
    let mut edges = Vec::new();
    for (target, expr) in resolve_targets(table, expressions)? {
        let prerequisites = extract_symbols(expr, table);
        if prerequisites.is_empty() {
            edges.push(DependencyEdge {
                dependent: target,
                prerequisite: None,
            });
        } else {
            edges.extend(prerequisites.into_iter().map(|p| DependencyEdge {
                dependent: target.clone(),
                prerequisite: Some(p),
            }));
        }
    }
    Ok(edges)
}

/// Order the dependents of `edges` so every one follows its prerequisites
///
/// Each round takes the prerequisites that are not themselves waiting on
/// anything, drops the edges they satisfy, and emits the dependents left with
/// no outstanding edge. Dependents become ready together within a round and
/// are emitted in symbol order.
///
/// # Errors
///
/// `CyclicDependency` naming the parameters still unresolved when no
/// progress can be made.
pub fn order_dependencies(edges: &[DependencyEdge]) -> std::result::Result<Vec<Symbol>, ExpressionError> {
    let mut pending: Vec<(Symbol, Option<Symbol>)> = edges
        .iter()
        .map(|e| (e.dependent.clone(), e.prerequisite.clone()))
        .collect();
    let mut order = Vec::new();

    while !pending.is_empty() {
        let waiting: BTreeSet<Symbol> = pending.iter().map(|(d, _)| d.clone()).collect();
        let satisfied: BTreeSet<Option<Symbol>> = pending
            .iter()
            .map(|(_, p)| p.clone())
            .filter(|p| p.as_ref().map_or(true, |s| !waiting.contains(s)))
            .collect();

        if satisfied.is_empty() {
            let parameters = waiting.iter().map(Symbol::path).collect::<Vec<_>>().join(", ");
            return Err(ExpressionError::CyclicDependency { parameters });
        }

        let touched: BTreeSet<Symbol> = pending
            .iter()
            .filter(|(_, p)| satisfied.contains(p))
            .map(|(d, _)| d.clone())
            .collect();
        pending.retain(|(_, p)| !satisfied.contains(p));

        let still_waiting: BTreeSet<&Symbol> = pending.iter().map(|(d, _)| d).collect();
        order.extend(touched.into_iter().filter(|d| !still_waiting.contains(d)));
    }

    Ok(order)
}

/// Compile `expressions` into an evaluator over the parameters of `table`
///
/// An empty expression map gives a no-op evaluator.
///
/// # Errors
///
/// - `UnknownParameter` when a target is not registered
/// - `Syntax` naming the parameter whose expression does not parse
/// - `CyclicDependency` when the expressions depend on each other in a loop
///
/// # Examples
///
/// ```
/// use sasfit_core::expression::{build_evaluator, EvalContext, ExpressionMap, SymbolTable};
/// use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
///
/// let mut params = ParameterSet::new();
/// params.add_param("a", 2.0).unwrap();
/// params.add_param("b", 0.0).unwrap();
/// params.add_param("c", 0.0).unwrap();
///
/// let mut exprs = ExpressionMap::new();
/// exprs.insert("c".to_string(), "b * 10".to_string());
/// exprs.insert("b".to_string(), "a + 1".to_string());
///
/// let table = SymbolTable::from_registry(&params);
/// let evaluator = build_evaluator(&table, &exprs, &EvalContext::default()).unwrap();
/// evaluator.apply(&mut params).unwrap();
/// assert_eq!(params.get_param("c").unwrap(), 30.0);
/// ```
pub fn build_evaluator(
    table: &SymbolTable,
    expressions: &ExpressionMap,
    context: &EvalContext,
) -> std::result::Result<CompiledEvaluator, ExpressionError> {
    let edges = find_dependencies(table, expressions)?;
    if edges.is_empty() {
        return Ok(CompiledEvaluator::empty(table.clone(), context.clone()));
    }
    let order = order_dependencies(&edges)?;

    let sources: HashMap<usize, &str> = resolve_targets(table, expressions)?
        .into_iter()
        .map(|(target, expr)| (target.index(), expr))
        .collect();

    let mut assignments = Vec::with_capacity(order.len());
    for target in order {
        let source = sources.get(&target.index()).copied().unwrap_or_default();
        let parsed = Expression::parse(source).map_err(|e| ExpressionError::Syntax {
            parameter: target.path().to_string(),
            message: e.to_string(),
        })?;
        let expression = parsed.bind(&|name: &str| table.lookup(name).map(Symbol::index));
        let prerequisites = edges
            .iter()
            .filter(|e| e.dependent == target)
            .filter_map(|e| e.prerequisite.clone())
            .collect();

        assignments.push(Assignment {
            target,
            source: source.to_string(),
            expression,
            prerequisites,
        });
    }

    log::debug!("compiled {} constraint expression(s)", assignments.len());

    Ok(CompiledEvaluator {
        assignments,
        table: table.clone(),
        context: context.clone(),
    })
}

/// Compile `expressions` for `registry`, reporting every problem at once
///
/// Unknown targets, syntax errors and dependency cycles are collected
/// together. When there are none, the compiled evaluator is run once on a
/// copy of the current values so undefined names and failing functions are
/// caught as well. `registry` is left untouched.
///
/// # Examples
///
/// ```
/// use sasfit_core::expression::{check_constraints, EvalContext, ExpressionMap};
/// use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
///
/// let mut params = ParameterSet::new();
/// params.add_param("a", 2.0).unwrap();
/// params.add_param("b", 0.0).unwrap();
///
/// let mut exprs = ExpressionMap::new();
/// exprs.insert("b".to_string(), "a * missing".to_string());
/// exprs.insert("zz".to_string(), "a".to_string());
/// assert_eq!(check_constraints(&params, &exprs, &EvalContext::default()).unwrap_err().len(), 1);
///
/// exprs.remove("zz");
/// let errors = check_constraints(&params, &exprs, &EvalContext::default()).unwrap_err();
/// assert!(errors[0].to_string().contains("missing"));
/// assert_eq!(params.get_param("b").unwrap(), 0.0);
/// ```
pub fn check_constraints<R: ParameterRegistry + ?Sized>(
    registry: &R,
    expressions: &ExpressionMap,
    context: &EvalContext,
) -> std::result::Result<CompiledEvaluator, Vec<ExpressionError>> {
    let table = SymbolTable::from_registry(registry);
    let mut errors = Vec::new();
    let mut known = ExpressionMap::new();

    for (path, expr) in expressions {
        let source = expr.trim();
        if source.is_empty() {
            continue;
        }
        if table.lookup(path).is_some() {
            known.insert(path.clone(), expr.clone());
        } else {
            errors.push(ExpressionError::UnknownParameter { name: path.clone() });
        }
        if let Err(e) = Expression::parse(source) {
            errors.push(ExpressionError::Syntax {
                parameter: path.clone(),
                message: e.to_string(),
            });
        }
    }

    if let Err(e) = find_dependencies(&table, &known).and_then(|edges| order_dependencies(&edges)) {
        errors.push(e);
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let evaluator = build_evaluator(&table, expressions, context).map_err(|e| vec![e])?;
    let errors = evaluator.dry_run(registry);
    if errors.is_empty() {
        Ok(evaluator)
    } else {
        Err(errors)
    }
}

/// Targets of the non-empty expressions, in symbol order
fn resolve_targets<'a>(
    table: &SymbolTable,
    expressions: &'a ExpressionMap,
) -> std::result::Result<Vec<(Symbol, &'a str)>, ExpressionError> {
    let mut targets = Vec::new();
    for (path, expr) in expressions {
        let expr = expr.trim();
        if expr.is_empty() {
            continue;
        }
        let target = table
            .lookup(path)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownParameter { name: path.clone() })?;
        targets.push((target, expr));
    }
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(targets)
}

/// A single `target = expression` step
#[derive(Debug, Clone)]
pub struct Assignment {
    target: Symbol,
    source: String,
    expression: Expression,
    prerequisites: Vec<Symbol>,
}

impl Assignment {
    pub fn target(&self) -> &Symbol {
        &self.target
    }

    /// The expression as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parameters read by this step
    pub fn prerequisites(&self) -> &[Symbol] {
        &self.prerequisites
    }
}

/// Ordered assignments computing every constrained parameter
#[derive(Debug, Clone)]
pub struct CompiledEvaluator {
    assignments: Vec<Assignment>,
    table: SymbolTable,
    context: EvalContext,
}

impl CompiledEvaluator {
    fn empty(table: SymbolTable, context: EvalContext) -> Self {
        Self {
            assignments: Vec::new(),
            table,
            context,
        }
    }

    /// Evaluate every assignment in order against the current values of
    /// `registry`, writing each result back before the next step runs
    pub fn apply<R: ParameterRegistry + ?Sized>(&self, registry: &mut R) -> Result<()> {
        for step in &self.assignments {
            let value = self.evaluate_step(step, &*registry)?;
            registry.set_param(step.target.path(), value)?;
        }
        Ok(())
    }

    /// Run every assignment on a copy of the values in `registry`
    ///
    /// Unlike [`apply`](Self::apply) this keeps going after a failed step and
    /// returns all the failures; a failed step leaves its target unchanged.
    pub fn dry_run<R: ParameterRegistry + ?Sized>(&self, registry: &R) -> Vec<ExpressionError> {
        let mut snapshot = ParameterSet::new();
        for symbol in self.table.iter() {
            if let Ok(value) = registry.get_param(symbol.path()) {
                // Paths in the table are already unique
                let _ = snapshot.add_param(symbol.path(), value);
            }
        }

        let mut errors = Vec::new();
        for step in &self.assignments {
            match self.evaluate_step(step, &snapshot) {
                Ok(value) => {
                    let _ = snapshot.set_param(step.target.path(), value);
                }
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    fn evaluate_step<R: ParameterRegistry + ?Sized>(
        &self,
        step: &Assignment,
        registry: &R,
    ) -> std::result::Result<f64, ExpressionError> {
        let scope = Scope {
            registry,
            table: &self.table,
            context: &self.context,
        };
        step.expression
            .evaluate(&scope)
            .map_err(|e| ExpressionError::Evaluation {
                parameter: step.target.path().to_string(),
                source: Box::new(e),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Computed parameter paths in evaluation order
    pub fn order(&self) -> Vec<&str> {
        self.assignments.iter().map(|a| a.target.path()).collect()
    }

    /// True if `path` is computed by this evaluator
    pub fn computes(&self, path: &str) -> bool {
        self.table
            .lookup(path)
            .map_or(false, |s| self.assignments.iter().any(|a| &a.target == s))
    }
}

impl fmt::Display for CompiledEvaluator {
    /// Alias legend followed by one aliased assignment per line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in self.table.iter() {
            writeln!(f, "# {} = {}", symbol.alias(), symbol.path())?;
        }
        for step in &self.assignments {
            let code = substitute_with(&step.source, |token| self.table.lookup(token).map(Symbol::alias));
            writeln!(f, "{} = {}", step.target.alias(), code)?;
        }
        Ok(())
    }
}

/// Names visible while evaluating one assignment
struct Scope<'a, R: ?Sized> {
    registry: &'a R,
    table: &'a SymbolTable,
    context: &'a EvalContext,
}

impl<R: ParameterRegistry + ?Sized> EvaluationContext for Scope<'_, R> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.context.get_variable(name)
    }

    fn get_function(&self, name: &str) -> ExprResult<MathFn> {
        self.context.get_function(name)
    }

    fn get_parameter(&self, index: usize) -> ExprResult<f64> {
        let undefined = || ExpressionError::UndefinedName {
            name: format!("P{}", index),
        };
        let symbol = self.table.get(index).ok_or_else(undefined)?;
        self.registry.get_param(symbol.path()).map_err(|_| ExpressionError::UndefinedName {
            name: symbol.path().to_string(),
        })
    }
}
