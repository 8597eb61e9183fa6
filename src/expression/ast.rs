//! Expression parsing and evaluation for parameter constraints
//!
//! Constraint expressions use ordinary infix arithmetic: `+ - * /`, `**` (or
//! `^`) for powers, unary minus, parentheses and calls to whitelisted math
//! functions. Identifiers are dotted paths such as `M1.radius`.
//!
//! Expressions are parsed once into an [`Expression`] tree and evaluated by
//! walking the tree against an [`EvaluationContext`].

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map_res, recognize, value},
    multi::{many0, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair},
    IResult, Parser,
};
use std::collections::HashMap;
use thiserror::Error;

use super::functions::{FunctionTable, MathFn};

/// Error that can occur during expression parsing, compilation or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Syntax error in expression for '{parameter}': {message}")]
    Syntax { parameter: String, message: String },

    #[error("Cyclic dependencies amongst {parameters}")]
    CyclicDependency { parameters: String },

    #[error("Undefined name '{name}'")]
    UndefinedName { name: String },

    #[error("Expression assigned to unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Cannot evaluate expression for '{parameter}': {source}")]
    Evaluation {
        parameter: String,
        source: Box<ExpressionError>,
    },
}

impl ExpressionError {
    /// The innermost error, looking through `Evaluation` wrappers
    pub fn root(&self) -> &ExpressionError {
        match self {
            ExpressionError::Evaluation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for expression evaluation
pub(crate) type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Name that is not a registered parameter: a context constant, or undefined
    Variable(String),

    /// Registered parameter, by symbol table index
    Parameter(usize),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (** or ^)
    Pow,
}

/// Context for expression evaluation, providing names and functions
pub trait EvaluationContext {
    /// Get the value of a non-parameter name
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Get a whitelisted function
    fn get_function(&self, name: &str) -> ExprResult<MathFn>;

    /// Get the current value of a bound parameter
    fn get_parameter(&self, index: usize) -> ExprResult<f64> {
        Err(ExpressionError::UndefinedName {
            name: format!("P{}", index),
        })
    }
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedName {
                name: name.to_string(),
            })
    }

    fn get_function(&self, name: &str) -> ExprResult<MathFn> {
        FunctionTable::standard()
            .get(name)
            .ok_or_else(|| ExpressionError::UndefinedName {
                name: name.to_string(),
            })
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        match additive(input) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder.trim()),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Parameter(index) => context.get_parameter(*index),

            Self::Unary(op, expr) => {
                let value = expr.evaluate(context)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                }
            }

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let function = context.get_function(name)?;
                let evaluated = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                function.call(name, &evaluated)
            }
        }
    }

    /// Replace every variable for which `resolve` returns an index with a
    /// bound parameter node
    pub fn bind<F>(self, resolve: &F) -> Self
    where
        F: Fn(&str) -> Option<usize>,
    {
        match self {
            Self::Variable(name) => match resolve(&name) {
                Some(index) => Self::Parameter(index),
                None => Self::Variable(name),
            },
            Self::Unary(op, expr) => Self::Unary(op, Box::new(expr.bind(resolve))),
            Self::Binary(op, left, right) => {
                Self::Binary(op, Box::new(left.bind(resolve)), Box::new(right.bind(resolve)))
            }
            Self::Function(name, args) => {
                Self::Function(name, args.into_iter().map(|arg| arg.bind(resolve)).collect())
            }
            other => other,
        }
    }

    /// Find all unbound variable names used in the expression
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) | Self::Parameter(_) => {}

            Self::Variable(name) => {
                vars.push(name.clone());
            }

            Self::Unary(_, expr) => {
                expr.collect_variables(vars);
            }

            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }

            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

// Parser functions using nom

/// Wrap a parser so it skips surrounding whitespace
fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse an identifier: a letter or underscore, then letters, digits, `_` or `.`
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag(".")))),
    ))
    .parse(input)
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    map_res(recognize_float, |text: &str| {
        text.parse::<f64>().map(Expression::Number)
    })
    .parse(input)
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), additive),
        ws(char(')')),
    )
    .parse(input)?;

    Ok((input, Expression::Function(name.to_string(), args)))
}

/// Parse a variable reference
fn variable(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    Ok((input, Expression::Variable(name.to_string())))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('(')), additive, ws(char(')'))).parse(input)
}

/// Parse a primary expression (number, function call, variable, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Expression> {
    ws(alt((number, function_call, variable, parens))).parse(input)
}

/// Parse a power expression; right-associative, exponent may carry a sign
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = primary(input)?;

    let op: IResult<&str, &str> = ws(alt((tag("**"), tag("^")))).parse(input);
    match op {
        Ok((after_op, _)) => {
            let (remaining, exponent) = unary(after_op)?;
            Ok((
                remaining,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(nom::Err::Error(_)) => Ok((input, base)),
        Err(e) => Err(e),
    }
}

/// Parse a signed expression; the sign binds looser than `**`
fn unary(input: &str) -> IResult<&str, Expression> {
    let sign: IResult<&str, char> = ws(alt((char('-'), char('+')))).parse(input);
    match sign {
        Ok((remaining, '-')) => {
            let (remaining, expr) = unary(remaining)?;
            Ok((remaining, Expression::Unary(UnaryOp::Neg, Box::new(expr))))
        }
        Ok((remaining, _)) => unary(remaining),
        Err(nom::Err::Error(_)) => power(input),
        Err(e) => Err(e),
    }
}

/// Parse a multiplicative expression, left-associative
fn multiplicative(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut acc) = unary(input)?;

    loop {
        let op: IResult<&str, BinaryOp> = ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
        )))
        .parse(input);

        match op {
            Ok((after_op, op)) => {
                let (remaining, rhs) = unary(after_op)?;
                acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
                input = remaining;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}

/// Parse an additive expression, left-associative
fn additive(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut acc) = multiplicative(input)?;

    loop {
        let op: IResult<&str, BinaryOp> = ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        )))
        .parse(input);

        match op {
            Ok((after_op, op)) => {
                let (remaining, rhs) = multiplicative(after_op)?;
                acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
                input = remaining;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}
