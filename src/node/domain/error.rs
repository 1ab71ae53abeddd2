//! Error types for node domain validation and parsing.

use super::{DataType, ValueChangeKind};
use crate::node::expression::EvalError;
use thiserror::Error;

/// Structured reason a raw string does not fit a declared data type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoercionError {
    /// The value is not syntactically valid for the type.
    #[error("invalid {data_type} value '{value}': expected {expected}")]
    InvalidFormat {
        /// Declared data type.
        data_type: DataType,
        /// Rejected raw value.
        value: String,
        /// Human-readable description of the accepted form.
        expected: &'static str,
    },

    /// The value parsed but lies outside the type's inclusive range.
    #[error("{data_type} value '{value}' must be between {min} and {max}")]
    OutOfRange {
        /// Declared data type.
        data_type: DataType,
        /// Rejected raw value.
        value: String,
        /// Inclusive lower bound.
        min: i128,
        /// Inclusive upper bound.
        max: i128,
    },
}

impl CoercionError {
    /// Returns the data type the value was checked against.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::InvalidFormat { data_type, .. } | Self::OutOfRange { data_type, .. } => {
                *data_type
            }
        }
    }
}

/// Errors returned while constructing node domain values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NodeDomainError {
    /// The node name is empty after trimming.
    #[error("node name must not be empty")]
    EmptyNodeName,

    /// The protocol address does not match `(ns=<uint>;)?[isb]=<payload>`.
    #[error("invalid node address '{0}': expected (ns=<index>;)?[i|s|b]=<identifier>")]
    InvalidNodeAddress(String),

    /// The initial value does not fit the declared data type.
    #[error("invalid initial value: {0}")]
    InvalidInitialValue(#[source] CoercionError),

    /// Display precision was set on a non floating-point node.
    #[error("value precision only applies to FLOAT and DOUBLE nodes, not {0}")]
    PrecisionNotApplicable(DataType),

    /// Display precision exceeds the supported range.
    #[error("value precision must be between 0 and {max}, got {value}")]
    PrecisionOutOfRange {
        /// Requested precision.
        value: u8,
        /// Largest accepted precision.
        max: u8,
    },

    /// A generator kind other than `none` was declared without configuration.
    #[error("value change type '{0}' requires a configuration")]
    MissingValueChangeConfig(ValueChangeKind),

    /// A configuration was supplied for the `none` generator.
    #[error("value change type 'none' does not accept a configuration")]
    UnexpectedValueChangeConfig,

    /// The configuration does not match the schema of its generator kind.
    #[error("invalid {kind} configuration: {reason}")]
    InvalidValueChangeConfig {
        /// Generator kind.
        kind: ValueChangeKind,
        /// Schema mismatch description.
        reason: String,
    },

    /// Linear and random generators only apply to numeric types.
    #[error("{kind} value changes require a numeric data type, not {data_type}")]
    NumericGeneratorOnNonNumericType {
        /// Generator kind.
        kind: ValueChangeKind,
        /// Declared data type.
        data_type: DataType,
    },

    /// A literal inside a generator configuration does not fit the node type.
    #[error("invalid {field} in value change configuration: {source}")]
    InvalidGeneratorLiteral {
        /// Configuration field holding the literal.
        field: &'static str,
        /// Coercion failure.
        #[source]
        source: CoercionError,
    },

    /// Generator bounds are inverted or not finite.
    #[error("value change bounds are invalid: min {min} must not exceed max {max}")]
    InvalidBounds {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },

    /// A generator update interval of zero.
    #[error("value change update interval must be positive")]
    InvalidInterval,

    /// A linear step that is zero, negative, or not finite.
    #[error("linear step size must be a positive finite number, got {0}")]
    InvalidStep(f64),

    /// A discrete generator without any values.
    #[error("discrete value changes require at least one value")]
    EmptyDiscreteValues,

    /// The conditional trigger node reference is not a node identifier.
    #[error("invalid trigger node id '{0}'")]
    InvalidTriggerNodeId(String),

    /// The conditional change expression was rejected by the evaluator.
    #[error("invalid change expression: {0}")]
    InvalidChangeExpression(#[source] EvalError),

    /// A batch pattern placeholder is malformed.
    #[error("invalid node pattern '{0}'")]
    InvalidPattern(String),

    /// A batch pattern expands to too many nodes.
    #[error("node pattern expands to {count} nodes, limit is {limit}")]
    PatternTooLarge {
        /// Number of nodes the pattern would create.
        count: u64,
        /// Largest accepted expansion.
        limit: u64,
    },
}

/// Error returned while parsing a data type from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown data type: {0}")]
pub struct ParseDataTypeError(pub String);

/// Error returned while parsing an access mode from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown access mode: {0}")]
pub struct ParseAccessModeError(pub String);

/// Error returned while parsing a value change kind from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown value change type: {0}")]
pub struct ParseValueChangeKindError(pub String);
