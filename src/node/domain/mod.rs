//! Domain model for protocol nodes and their value generators.
//!
//! The node domain models typed data points: their scalar data types and
//! string coercion, protocol addresses, validated definitions, and the
//! configuration schemas of the four value-change generators. Persistence
//! and runtime concerns remain outside this boundary.

mod address;
mod data_type;
mod error;
mod ids;
mod node;
mod pattern;
mod value;
mod value_change;

pub use address::{IdentifierKind, NodeAddress};
pub use data_type::{AccessMode, DataType, VariantTag};
pub use error::{
    CoercionError, NodeDomainError, ParseAccessModeError, ParseDataTypeError,
    ParseValueChangeKindError,
};
pub use ids::NodeId;
pub use node::{MAX_VALUE_PRECISION, NodeDefinition, NodeDescriptor, NodeSpec};
pub use pattern::{MAX_BATCH_NODES, expand_pattern, expand_spec};
pub use value::{Leniency, TypedValue};
pub use value_change::{
    ConditionalConfig, DiscreteConfig, LinearConfig, RandomConfig, ValueChange, ValueChangeKind,
};
