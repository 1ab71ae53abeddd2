//! Value-change generator kinds and their configuration schemas.
//!
//! A node's generator is persisted as a kind plus an optional JSON
//! configuration. [`ValueChange::from_parts`] checks that the configuration
//! is present exactly when the kind needs one, that it matches the schema of
//! its kind, and that every literal inside it fits the node's data type.

use super::{DataType, NodeDomainError, NodeId, ParseValueChangeKindError};
use crate::node::expression::Expression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// Characters that mark a conditional change value as an expression.
const EXPRESSION_MARKERS: [char; 8] = ['+', '-', '*', '/', '%', '^', '(', ')'];

/// Generator kind governing automatic value evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueChangeKind {
    /// The value never changes automatically.
    #[default]
    None,
    /// Ramp between two bounds.
    Linear,
    /// Cycle through a list of values.
    Discrete,
    /// Uniform redraw between two bounds.
    Random,
    /// Recompute when a trigger node matches.
    Conditional,
}

impl ValueChangeKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::Discrete => "discrete",
            Self::Random => "random",
            Self::Conditional => "conditional",
        }
    }

    /// Returns whether the kind is driven by an update interval.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::Linear | Self::Discrete | Self::Random)
    }
}

impl fmt::Display for ValueChangeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ValueChangeKind {
    type Error = ParseValueChangeKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "linear" => Ok(Self::Linear),
            "discrete" => Ok(Self::Discrete),
            "random" => Ok(Self::Random),
            "conditional" => Ok(Self::Conditional),
            _ => Err(ParseValueChangeKindError(value.to_owned())),
        }
    }
}

const fn default_reset_on_bounds() -> bool {
    true
}

/// Linear ramp configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Lower bound.
    pub min_value: f64,
    /// Upper bound.
    pub max_value: f64,
    /// Update interval in milliseconds.
    pub update_interval: u64,
    /// Step applied on each update.
    pub step_size: f64,
    /// Randomise the delay between updates.
    #[serde(default)]
    pub random_interval: bool,
    /// Randomise each step in `(0, step_size]`.
    #[serde(default)]
    pub random_step: bool,
    /// Wrap to the opposite bound instead of reversing direction.
    #[serde(default = "default_reset_on_bounds")]
    pub reset_on_bounds: bool,
}

/// Discrete cycle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteConfig {
    /// Values cycled through, in order.
    pub values: Vec<String>,
    /// Update interval in milliseconds.
    pub update_interval: u64,
    /// Pick values at random instead of in order.
    #[serde(default)]
    pub random_interval: bool,
}

/// Uniform random configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomConfig {
    /// Lower bound.
    pub min_value: f64,
    /// Upper bound.
    pub max_value: f64,
    /// Update interval in milliseconds.
    pub update_interval: u64,
    /// Randomise the delay between updates.
    #[serde(default)]
    pub random_interval: bool,
}

/// Conditional trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfig {
    /// Node whose value is compared against `trigger_value`.
    #[serde(deserialize_with = "deserialize_node_reference")]
    pub trigger_node_id: NodeId,
    /// Value the trigger node must hold.
    pub trigger_value: String,
    /// Literal or expression producing the new value.
    pub change_value: String,
}

impl ConditionalConfig {
    /// Returns whether `change_value` is evaluated as an expression for a
    /// node of `data_type`.
    #[must_use]
    pub fn is_expression(&self, data_type: DataType) -> bool {
        data_type.is_numeric() && self.change_value.contains(EXPRESSION_MARKERS)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeReference {
    Number(i64),
    Text(String),
}

fn deserialize_node_reference<'de, D>(deserializer: D) -> Result<NodeId, D::Error>
where
    D: Deserializer<'de>,
{
    match NodeReference::deserialize(deserializer)? {
        NodeReference::Number(value) => Ok(NodeId::new(value)),
        NodeReference::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(NodeId::new)
            .map_err(|_| serde::de::Error::custom(format!("invalid trigger node id '{text}'"))),
    }
}

/// Validated generator of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValueChange {
    /// No automatic change.
    #[default]
    None,
    /// Linear ramp.
    Linear(LinearConfig),
    /// Discrete cycle.
    Discrete(DiscreteConfig),
    /// Uniform random draw.
    Random(RandomConfig),
    /// Conditional recomputation.
    Conditional(ConditionalConfig),
}

impl ValueChange {
    /// Builds a generator from its persisted kind and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NodeDomainError`] when the configuration is missing,
    /// unexpected, malformed, or holds literals that do not fit `data_type`.
    pub fn from_parts(
        kind: ValueChangeKind,
        config: Option<&serde_json::Value>,
        data_type: DataType,
    ) -> Result<Self, NodeDomainError> {
        let present = config.filter(|value| !value.is_null());
        let change = match (kind, present) {
            (ValueChangeKind::None, None) => return Ok(Self::None),
            (ValueChangeKind::None, Some(_)) => {
                return Err(NodeDomainError::UnexpectedValueChangeConfig);
            }
            (_, None) => return Err(NodeDomainError::MissingValueChangeConfig(kind)),
            (ValueChangeKind::Linear, Some(value)) => Self::Linear(parse_config(kind, value)?),
            (ValueChangeKind::Discrete, Some(value)) => Self::Discrete(parse_config(kind, value)?),
            (ValueChangeKind::Random, Some(value)) => Self::Random(parse_config(kind, value)?),
            (ValueChangeKind::Conditional, Some(value)) => {
                Self::Conditional(parse_config(kind, value)?)
            }
        };
        change.validate(data_type)?;
        Ok(change)
    }

    /// Returns the generator kind.
    #[must_use]
    pub const fn kind(&self) -> ValueChangeKind {
        match self {
            Self::None => ValueChangeKind::None,
            Self::Linear(_) => ValueChangeKind::Linear,
            Self::Discrete(_) => ValueChangeKind::Discrete,
            Self::Random(_) => ValueChangeKind::Random,
            Self::Conditional(_) => ValueChangeKind::Conditional,
        }
    }

    /// Returns the configured update interval of timed generators.
    #[must_use]
    pub const fn update_interval(&self) -> Option<Duration> {
        match self {
            Self::Linear(config) => Some(Duration::from_millis(config.update_interval)),
            Self::Discrete(config) => Some(Duration::from_millis(config.update_interval)),
            Self::Random(config) => Some(Duration::from_millis(config.update_interval)),
            Self::None | Self::Conditional(_) => None,
        }
    }

    /// Returns whether the delay between updates is randomised.
    #[must_use]
    pub const fn random_interval(&self) -> bool {
        match self {
            Self::Linear(config) => config.random_interval,
            Self::Discrete(config) => config.random_interval,
            Self::Random(config) => config.random_interval,
            Self::None | Self::Conditional(_) => false,
        }
    }

    /// Serialises the configuration back to its persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialisation fails.
    pub fn config_json(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        match self {
            Self::None => Ok(None),
            Self::Linear(config) => serde_json::to_value(config).map(Some),
            Self::Discrete(config) => serde_json::to_value(config).map(Some),
            Self::Random(config) => serde_json::to_value(config).map(Some),
            Self::Conditional(config) => serde_json::to_value(config).map(Some),
        }
    }

    fn validate(&self, data_type: DataType) -> Result<(), NodeDomainError> {
        match self {
            Self::None => Ok(()),
            Self::Linear(config) => {
                validate_numeric_range(
                    ValueChangeKind::Linear,
                    data_type,
                    config.min_value,
                    config.max_value,
                )?;
                validate_interval(config.update_interval)?;
                if !config.step_size.is_finite() || config.step_size <= 0.0 {
                    return Err(NodeDomainError::InvalidStep(config.step_size));
                }
                Ok(())
            }
            Self::Random(config) => {
                validate_numeric_range(
                    ValueChangeKind::Random,
                    data_type,
                    config.min_value,
                    config.max_value,
                )?;
                validate_interval(config.update_interval)
            }
            Self::Discrete(config) => {
                if config.values.is_empty() {
                    return Err(NodeDomainError::EmptyDiscreteValues);
                }
                for value in &config.values {
                    check_literal("values", data_type, value)?;
                }
                validate_interval(config.update_interval)
            }
            Self::Conditional(config) => {
                check_literal("trigger_value", data_type, &config.trigger_value)?;
                if config.is_expression(data_type) {
                    Expression::parse(&config.change_value)
                        .map(|_| ())
                        .map_err(NodeDomainError::InvalidChangeExpression)
                } else {
                    check_literal("change_value", data_type, &config.change_value)
                }
            }
        }
    }
}

fn parse_config<T: DeserializeOwned>(
    kind: ValueChangeKind,
    value: &serde_json::Value,
) -> Result<T, NodeDomainError> {
    T::deserialize(value).map_err(|err| NodeDomainError::InvalidValueChangeConfig {
        kind,
        reason: err.to_string(),
    })
}

fn validate_numeric_range(
    kind: ValueChangeKind,
    data_type: DataType,
    min: f64,
    max: f64,
) -> Result<(), NodeDomainError> {
    if !data_type.is_numeric() {
        return Err(NodeDomainError::NumericGeneratorOnNonNumericType { kind, data_type });
    }
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(NodeDomainError::InvalidBounds { min, max });
    }
    data_type
        .from_f64(min)
        .map_err(|source| NodeDomainError::InvalidGeneratorLiteral {
            field: "min_value",
            source,
        })?;
    data_type
        .from_f64(max)
        .map_err(|source| NodeDomainError::InvalidGeneratorLiteral {
            field: "max_value",
            source,
        })?;
    Ok(())
}

const fn validate_interval(interval_ms: u64) -> Result<(), NodeDomainError> {
    if interval_ms == 0 {
        return Err(NodeDomainError::InvalidInterval);
    }
    Ok(())
}

fn check_literal(
    field: &'static str,
    data_type: DataType,
    literal: &str,
) -> Result<(), NodeDomainError> {
    data_type
        .coerce_relaxed(literal)
        .map(|_| ())
        .map_err(|source| NodeDomainError::InvalidGeneratorLiteral { field, source })
}
