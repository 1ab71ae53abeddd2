//! Maps stored nodes onto protocol variables.
//!
//! A node that cannot be provisioned as configured never aborts a start:
//! an unusable stored value is replaced by the type's inert default and a
//! node with no variant mapping, or one the instance refuses, is skipped.
//! Each downgrade is reported as a [`ProvisionWarning`].

use crate::node::domain::{CoercionError, DataType, NodeDescriptor, NodeId};
use crate::server::ports::{ProtocolServer, VariableSpec};
use std::fmt;
use tracing::{debug, warn};

/// A node that was provisioned in degraded form or skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionWarning {
    /// The stored value did not coerce; the type's default was used.
    DefaultSubstituted {
        /// Affected node.
        node_id: NodeId,
        /// Coercion failure.
        reason: CoercionError,
    },
    /// The data type has no protocol variant; the node was skipped.
    UnsupportedDataType {
        /// Affected node.
        node_id: NodeId,
        /// Declared data type.
        data_type: DataType,
    },
    /// The instance refused the variable; the node was skipped.
    VariableRejected {
        /// Affected node.
        node_id: NodeId,
        /// Reason reported by the instance.
        reason: String,
    },
}

impl ProvisionWarning {
    /// Returns the affected node.
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        match self {
            Self::DefaultSubstituted { node_id, .. }
            | Self::UnsupportedDataType { node_id, .. }
            | Self::VariableRejected { node_id, .. } => *node_id,
        }
    }
}

impl fmt::Display for ProvisionWarning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultSubstituted { node_id, reason } => {
                write!(formatter, "node {node_id} uses its default value: {reason}")
            }
            Self::UnsupportedDataType { node_id, data_type } => {
                write!(formatter, "node {node_id} skipped: unsupported data type {data_type}")
            }
            Self::VariableRejected { node_id, reason } => {
                write!(formatter, "node {node_id} skipped: {reason}")
            }
        }
    }
}

/// Adds one variable per node to `instance` under `namespace_index`.
pub(crate) fn provision_nodes<S>(
    instance: &mut S,
    namespace_index: u16,
    nodes: &[NodeDescriptor],
) -> Vec<ProvisionWarning>
where
    S: ProtocolServer,
{
    let mut warnings = Vec::new();
    for node in nodes {
        let definition = node.definition();
        let data_type = definition.data_type();
        if data_type.variant_tag().is_none() {
            warn!(node_id = %node.id(), data_type = %data_type, "skipping node with unsupported data type");
            warnings.push(ProvisionWarning::UnsupportedDataType {
                node_id: node.id(),
                data_type,
            });
            continue;
        }

        let value = match definition.typed_value() {
            Ok(value) => value.unwrap_or_else(|| data_type.default_value()),
            Err(reason) => {
                warn!(node_id = %node.id(), error = %reason, "substituting default value");
                warnings.push(ProvisionWarning::DefaultSubstituted {
                    node_id: node.id(),
                    reason,
                });
                data_type.default_value()
            }
        };

        let variable = VariableSpec {
            namespace_index,
            address: definition.address().clone(),
            browse_name: definition.name().to_owned(),
            value,
            writable: definition.access().writable(),
            description: definition.description().map(str::to_owned),
        };
        match instance.add_variable(variable) {
            Ok(()) => debug!(
                node_id = %node.id(),
                address = %definition.address(),
                access = %definition.access(),
                "node provisioned"
            ),
            Err(err) => {
                warn!(node_id = %node.id(), error = %err, "skipping rejected node");
                warnings.push(ProvisionWarning::VariableRejected {
                    node_id: node.id(),
                    reason: err.to_string(),
                });
            }
        }
    }
    warnings
}
