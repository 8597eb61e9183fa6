//! # Constraint Expressions
//!
//! Parameters may be tied to one another by arithmetic expressions over
//! parameter paths, e.g. `M2.radius = 2*M1.radius + sqrt(M1.length)`. This
//! module turns a set of such expressions into a [`CompiledEvaluator`] that
//! recomputes every constrained parameter, in dependency order, from the
//! current values held by a [`ParameterRegistry`](crate::parameters::ParameterRegistry).
//!
//! The pipeline is:
//!
//! 1. [`extract_symbols`] finds the registered parameters an expression reads
//! 2. [`find_dependencies`] turns the expression set into dependency edges
//! 3. [`order_dependencies`] sorts the targets so prerequisites come first
//! 4. [`build_evaluator`] parses and binds each expression in that order
//!
//! [`check_constraints`] wraps the pipeline for user input: it reports every
//! problem in an expression set at once and dry-runs the result.
//!
//! Expressions are parsed by a small grammar over a whitelist of math
//! functions ([`FunctionTable`]); nothing else can be reached from an
//! expression string.

pub mod ast;
pub mod functions;
pub mod resolver;
pub mod symbols;

pub use ast::{BinaryOp, EvaluationContext, Expression, ExpressionError, UnaryOp};
pub use functions::{EvalContext, FunctionTable, MathFn};
pub use resolver::{
    build_evaluator, check_constraints, find_dependencies, order_dependencies, Assignment, CompiledEvaluator, DependencyEdge,
    ExpressionMap,
};
pub use symbols::{extract_symbols, substitute, substitute_with, Symbol, SymbolTable};
