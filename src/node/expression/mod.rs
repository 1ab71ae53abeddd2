//! Sandboxed arithmetic for conditional value changes.
//!
//! Expressions are parsed by a small hand-written parser that only knows
//! numeric literals, the names `trigger_value` and `current_value`, the
//! operators `+ - * / % **`, unary `+`/`-`, and parentheses. Anything else
//! fails closed with [`EvalError::UnsupportedConstruct`]; there is no path
//! from an expression to a general-purpose evaluator.

mod error;
mod lexer;
mod parser;

pub use error::EvalError;
pub use parser::{MAX_NESTING, MAX_TOKENS};

/// Bound input of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// Value of the node that fired the trigger.
    Trigger,
    /// Current value of the node being recomputed.
    Current,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "trigger_value" => Some(Self::Trigger),
            "current_value" => Some(Self::Current),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Plus,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Number(f64),
    Variable(Variable),
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Ast>,
        rhs: Box<Ast>,
    },
}

impl Ast {
    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn evaluate(&self, trigger_value: f64, current_value: f64) -> Result<f64, EvalError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Variable(Variable::Trigger) => Ok(trigger_value),
            Self::Variable(Variable::Current) => Ok(current_value),
            Self::Unary { op, operand } => {
                let value = operand.evaluate(trigger_value, current_value)?;
                Ok(match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Negate => -value,
                })
            }
            Self::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate(trigger_value, current_value)?;
                let right = rhs.evaluate(trigger_value, current_value)?;
                apply(*op, left, right)
            }
        }
    }
}

fn apply(op: BinaryOp, left: f64, right: f64) -> Result<f64, EvalError> {
    let result = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Subtract => left - right,
        BinaryOp::Multiply => left * right,
        BinaryOp::Divide if right == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Divide => left / right,
        BinaryOp::Remainder if right == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Remainder => {
            // Floored modulo: the result takes the sign of the divisor.
            let remainder = left % right;
            if remainder != 0.0 && (remainder < 0.0) != (right < 0.0) {
                remainder + right
            } else {
                remainder
            }
        }
        BinaryOp::Power if left == 0.0 && right < 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Power => left.powf(right),
    };
    if result.is_finite() {
        Ok(result)
    } else {
        Err(EvalError::NonFiniteResult)
    }
}

/// Parsed change expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Ast,
}

impl Expression {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Syntax`] for malformed input,
    /// [`EvalError::UnsupportedConstruct`] for names, operators, or calls
    /// outside the grammar, and [`EvalError::NestingTooDeep`] or
    /// [`EvalError::TooLong`] for oversized input.
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        let root = parser::parse(source)?;
        Ok(Self {
            source: source.to_owned(),
            root,
        })
    }

    /// Evaluates the expression with both inputs bound.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::DivisionByZero`] and
    /// [`EvalError::NonFiniteResult`] for arithmetic failures.
    pub fn evaluate(&self, trigger_value: f64, current_value: f64) -> Result<f64, EvalError> {
        self.root.evaluate(trigger_value, current_value)
    }

    /// Returns the source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parses and evaluates `expression` in one step.
///
/// # Errors
///
/// See [`Expression::parse`] and [`Expression::evaluate`].
pub fn evaluate(expression: &str, trigger_value: f64, current_value: f64) -> Result<f64, EvalError> {
    Expression::parse(expression)?.evaluate(trigger_value, current_value)
}
