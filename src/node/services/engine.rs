//! Next-value computation for node generators.
//!
//! The engine computes from a node's stored value, its generator
//! configuration, the optional trigger node, and a random source. The only
//! state it keeps is the ramp direction of linear nodes stepped through
//! [`ValueChangeEngine::next_value`]. Callers persist the values it returns.

use crate::node::domain::{
    CoercionError, ConditionalConfig, DataType, DiscreteConfig, LinearConfig, NodeDescriptor,
    NodeId, RandomConfig, TypedValue, ValueChange,
};
use crate::node::expression::{EvalError, Expression};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while computing a node's next value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValueChangeError {
    /// The node's stored value no longer fits its data type.
    #[error("stored value of node {node_id} is invalid: {source}")]
    InvalidStoredValue {
        /// Node whose value is invalid.
        node_id: NodeId,
        /// Coercion failure.
        #[source]
        source: CoercionError,
    },

    /// An expression input cannot be read as a number.
    #[error("{operand} '{value}' is not numeric")]
    NonNumericOperand {
        /// Name the value would be bound to.
        operand: &'static str,
        /// Offending stored value.
        value: String,
    },

    /// The change expression failed to parse or evaluate.
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The computed value does not fit the node's data type.
    #[error("generated value does not fit the node type: {0}")]
    Coercion(#[from] CoercionError),
}

/// Result type for value-change computations.
pub type ValueChangeResult<T> = Result<T, ValueChangeError>;

/// Travel direction of a linear ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Stepping towards the upper bound.
    #[default]
    Rising,
    /// Stepping towards the lower bound.
    Falling,
}

/// Generator state carried between timed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneratorCursor {
    /// Linear ramp direction; ignored by other generators.
    pub direction: Direction,
}

/// One timed generator step.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueStep {
    /// Value to persist.
    pub value: TypedValue,
    /// State to pass to the following step.
    pub cursor: GeneratorCursor,
    /// Delay before the following step.
    pub delay: Duration,
}

/// Computes next values for linear, discrete, random, and conditional
/// generators.
#[derive(Debug)]
pub struct ValueChangeEngine {
    rng: Mutex<StdRng>,
    cursors: Mutex<HashMap<NodeId, GeneratorCursor>>,
}

impl Default for ValueChangeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueChangeEngine {
    /// Creates an engine seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an engine with a fixed seed for reproducible sequences.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Computes the next value of `node`.
    ///
    /// Timed generators take one step from the stored value; a linear ramp
    /// continues in the direction its previous step left it. Conditional
    /// generators only produce a value when `trigger` is the configured
    /// trigger node and its stored value matches the configured trigger
    /// value. Returns `None` when no change applies.
    ///
    /// # Errors
    ///
    /// Returns [`ValueChangeError`] when stored values cannot be read or the
    /// computed value does not fit the node's type.
    pub fn next_value(
        &self,
        node: &NodeDescriptor,
        trigger: Option<&NodeDescriptor>,
    ) -> ValueChangeResult<Option<TypedValue>> {
        match node.definition().value_change() {
            ValueChange::Conditional(config) => trigger
                .map_or(Ok(None), |trigger_node| {
                    Self::conditional(node, config, trigger_node)
                }),
            ValueChange::None => Ok(None),
            _ => {
                let cursor = self.cursor_for(node.id());
                let Some(step) = self.advance(node, cursor)? else {
                    return Ok(None);
                };
                self.cursors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(node.id(), step.cursor);
                Ok(Some(step.value))
            }
        }
    }

    fn cursor_for(&self, id: NodeId) -> GeneratorCursor {
        self.cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    /// Takes one timed step of a linear, discrete, or random generator.
    ///
    /// Returns `None` for nodes without a timed generator.
    ///
    /// # Errors
    ///
    /// Returns [`ValueChangeError`] when the stored value cannot be read or
    /// the computed value does not fit the node's type.
    pub fn advance(
        &self,
        node: &NodeDescriptor,
        cursor: GeneratorCursor,
    ) -> ValueChangeResult<Option<ValueStep>> {
        let definition = node.definition();
        let change = definition.value_change();
        let Some(interval) = change.update_interval() else {
            return Ok(None);
        };

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let delay = if change.random_interval() {
            interval.mul_f64(rng.random_range(0.5..=1.5))
        } else {
            interval
        };

        let stepped = match change {
            ValueChange::Linear(config) => {
                let current = current_number(node)?;
                let (next, direction) = linear_step(
                    config,
                    definition.data_type(),
                    current,
                    cursor.direction,
                    &mut *rng,
                );
                Some((definition.data_type().from_f64(next)?, direction))
            }
            ValueChange::Random(config) => {
                let drawn = random_draw(config, definition.data_type(), &mut *rng);
                Some((definition.data_type().from_f64(drawn)?, cursor.direction))
            }
            ValueChange::Discrete(config) => {
                discrete_step(node, config, &mut *rng)?.map(|value| (value, cursor.direction))
            }
            ValueChange::None | ValueChange::Conditional(_) => None,
        };

        Ok(stepped.map(|(value, direction)| ValueStep {
            value: apply_precision(node, value),
            cursor: GeneratorCursor { direction },
            delay,
        }))
    }

    fn conditional(
        node: &NodeDescriptor,
        config: &ConditionalConfig,
        trigger: &NodeDescriptor,
    ) -> ValueChangeResult<Option<TypedValue>> {
        if trigger.id() != config.trigger_node_id {
            return Ok(None);
        }
        let Some(observed) = trigger.definition().initial_value() else {
            return Ok(None);
        };
        if !trigger_matches(trigger.definition().data_type(), &config.trigger_value, observed) {
            return Ok(None);
        }

        let data_type = node.definition().data_type();
        let value = if config.is_expression(data_type) {
            let trigger_value = numeric_operand("trigger_value", observed)?;
            let current_value = node
                .definition()
                .initial_value()
                .map_or(Ok(0.0), |stored| numeric_operand("current_value", stored))?;
            let result =
                Expression::parse(&config.change_value)?.evaluate(trigger_value, current_value)?;
            data_type.from_f64(result)?
        } else {
            data_type.coerce_relaxed(&config.change_value)?
        };
        Ok(Some(apply_precision(node, value)))
    }
}

fn trigger_matches(trigger_type: DataType, expected: &str, observed: &str) -> bool {
    let typed_match = match (
        trigger_type.coerce_relaxed(expected),
        trigger_type.coerce_relaxed(observed),
    ) {
        (Ok(expected_value), Ok(observed_value)) => expected_value == observed_value,
        _ => false,
    };
    typed_match || expected.trim() == observed.trim()
}

fn numeric_operand(operand: &'static str, raw: &str) -> ValueChangeResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValueChangeError::NonNumericOperand {
            operand,
            value: raw.to_owned(),
        })
}

fn current_number(node: &NodeDescriptor) -> ValueChangeResult<Option<f64>> {
    let stored = node
        .definition()
        .typed_value()
        .map_err(|source| ValueChangeError::InvalidStoredValue {
            node_id: node.id(),
            source,
        })?;
    Ok(stored.as_ref().and_then(TypedValue::as_f64))
}

fn linear_step(
    config: &LinearConfig,
    data_type: DataType,
    current: Option<f64>,
    direction: Direction,
    rng: &mut impl Rng,
) -> (f64, Direction) {
    let (min, max) = (config.min_value, config.max_value);
    let Some(position) = current.map(|value| value.clamp(min, max)) else {
        return (min, Direction::Rising);
    };

    let mut step = if config.random_step {
        config.step_size - rng.random_range(0.0..config.step_size)
    } else {
        config.step_size
    };
    if data_type.is_integer() {
        step = step.round().max(1.0);
    }

    if config.reset_on_bounds {
        if position >= max {
            return (min, Direction::Rising);
        }
        return ((position + step).min(max), Direction::Rising);
    }

    let heading = if position >= max {
        Direction::Falling
    } else if position <= min {
        Direction::Rising
    } else {
        direction
    };
    match heading {
        Direction::Rising => {
            let next = (position + step).min(max);
            let turn = if next >= max {
                Direction::Falling
            } else {
                Direction::Rising
            };
            (next, turn)
        }
        Direction::Falling => {
            let next = (position - step).max(min);
            let turn = if next <= min {
                Direction::Rising
            } else {
                Direction::Falling
            };
            (next, turn)
        }
    }
}

fn random_draw(config: &RandomConfig, data_type: DataType, rng: &mut impl Rng) -> f64 {
    let drawn = rng.random_range(config.min_value..=config.max_value);
    if data_type.is_integer() {
        drawn.round().clamp(config.min_value, config.max_value)
    } else {
        drawn
    }
}

fn discrete_step(
    node: &NodeDescriptor,
    config: &DiscreteConfig,
    rng: &mut impl Rng,
) -> ValueChangeResult<Option<TypedValue>> {
    let data_type = node.definition().data_type();
    let values = config
        .values
        .iter()
        .map(|raw| data_type.coerce_relaxed(raw))
        .collect::<Result<Vec<_>, _>>()?;

    if config.random_interval {
        return Ok(values.choose(rng).cloned());
    }

    let current = node.definition().typed_value().ok().flatten();
    let position = current.and_then(|value| values.iter().position(|candidate| *candidate == value));
    let next = position.map_or_else(
        || values.first(),
        |index| values.get(index + 1).or_else(|| values.first()),
    );
    Ok(next.cloned())
}

fn apply_precision(node: &NodeDescriptor, value: TypedValue) -> TypedValue {
    let Some(decimals) = node.definition().precision() else {
        return value;
    };
    value.with_precision(decimals)
}
