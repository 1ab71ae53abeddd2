//! Expression evaluation errors.

use thiserror::Error;

/// Errors returned while parsing or evaluating a change expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    /// The expression is malformed within the supported grammar.
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        position: usize,
        /// Description of what was expected.
        message: String,
    },

    /// The expression uses a name, operator, or construct outside the
    /// supported grammar.
    #[error("unsupported construct at position {position}: '{construct}'")]
    UnsupportedConstruct {
        /// Byte offset of the construct.
        position: usize,
        /// Source text of the construct.
        construct: String,
    },

    /// Parentheses or unary operators are nested too deeply.
    #[error("expression nesting exceeds {limit} levels")]
    NestingTooDeep {
        /// Largest accepted nesting depth.
        limit: usize,
    },

    /// The expression has more tokens than accepted.
    #[error("expression exceeds {limit} tokens")]
    TooLong {
        /// Largest accepted token count.
        limit: usize,
    },

    /// Division, modulo, or a negative power of zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result overflowed or is not a real number.
    #[error("expression result is not a finite number")]
    NonFiniteResult,
}
