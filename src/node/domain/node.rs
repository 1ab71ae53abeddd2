//! Node definitions and persisted node descriptors.

use super::{
    AccessMode, CoercionError, DataType, NodeAddress, NodeDomainError, NodeId, TypedValue, ValueChange,
    ValueChangeKind,
};
use crate::server::domain::ServerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest accepted display precision for floating-point nodes.
pub const MAX_VALUE_PRECISION: u8 = 10;

/// Unvalidated node input, as submitted by an operator or read from a seed
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Display name.
    pub name: String,
    /// Protocol address.
    pub node_id: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Client access mode.
    #[serde(default)]
    pub access_level: AccessMode,
    /// Optional description applied to the variable.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial value in its string form.
    #[serde(default)]
    pub initial_value: Option<String>,
    /// Display precision for floating-point nodes.
    #[serde(default)]
    pub value_precision: Option<u8>,
    /// Generator kind.
    #[serde(default)]
    pub value_change_type: ValueChangeKind,
    /// Generator configuration, required unless the kind is `none`.
    #[serde(default)]
    pub value_change_config: Option<serde_json::Value>,
    /// Servers the node is provisioned on.
    #[serde(default, rename = "serverIds", alias = "server_ids")]
    pub server_ids: Vec<ServerId>,
}

impl NodeSpec {
    /// Creates a read-write node input without generator or initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, node_id: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            node_id: node_id.into(),
            data_type,
            access_level: AccessMode::default(),
            description: None,
            initial_value: None,
            value_precision: None,
            value_change_type: ValueChangeKind::None,
            value_change_config: None,
            server_ids: Vec::new(),
        }
    }

    /// Sets the initial value.
    #[must_use]
    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Sets the access mode.
    #[must_use]
    pub const fn with_access(mut self, access: AccessMode) -> Self {
        self.access_level = access;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the display precision.
    #[must_use]
    pub const fn with_precision(mut self, precision: u8) -> Self {
        self.value_precision = Some(precision);
        self
    }

    /// Sets the generator kind and configuration.
    #[must_use]
    pub fn with_value_change(
        mut self,
        kind: ValueChangeKind,
        config: Option<serde_json::Value>,
    ) -> Self {
        self.value_change_type = kind;
        self.value_change_config = config;
        self
    }

    /// Links the node to a server.
    #[must_use]
    pub fn on_server(mut self, server_id: ServerId) -> Self {
        self.server_ids.push(server_id);
        self
    }
}

/// Validated node definition.
///
/// Construction checks the address, the initial value against the data
/// type, the precision, and the generator configuration, so a definition
/// that exists is always consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    name: String,
    address: NodeAddress,
    data_type: DataType,
    access: AccessMode,
    description: Option<String>,
    initial_value: Option<String>,
    precision: Option<u8>,
    value_change: ValueChange,
    server_ids: BTreeSet<ServerId>,
}

impl NodeDefinition {
    /// Validates node input.
    ///
    /// # Errors
    ///
    /// Returns [`NodeDomainError`] describing the first violated rule.
    pub fn new(spec: NodeSpec) -> Result<Self, NodeDomainError> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(NodeDomainError::EmptyNodeName);
        }
        let address = NodeAddress::parse(spec.node_id)?;

        let initial_value = spec.initial_value.filter(|value| !value.is_empty());
        spec.data_type
            .validate(initial_value.as_deref())
            .map_err(NodeDomainError::InvalidInitialValue)?;

        if let Some(precision) = spec.value_precision {
            if !spec.data_type.is_floating() {
                return Err(NodeDomainError::PrecisionNotApplicable(spec.data_type));
            }
            if precision > MAX_VALUE_PRECISION {
                return Err(NodeDomainError::PrecisionOutOfRange {
                    value: precision,
                    max: MAX_VALUE_PRECISION,
                });
            }
        }

        let value_change = ValueChange::from_parts(
            spec.value_change_type,
            spec.value_change_config.as_ref(),
            spec.data_type,
        )?;

        Ok(Self {
            name: name.to_owned(),
            address,
            data_type: spec.data_type,
            access: spec.access_level,
            description: spec.description.filter(|text| !text.trim().is_empty()),
            initial_value,
            precision: spec.value_precision,
            value_change,
            server_ids: spec.server_ids.into_iter().collect(),
        })
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the protocol address.
    #[must_use]
    pub const fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Returns the declared data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the access mode.
    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the stored value string, if any.
    #[must_use]
    pub fn initial_value(&self) -> Option<&str> {
        self.initial_value.as_deref()
    }

    /// Returns the display precision.
    #[must_use]
    pub const fn precision(&self) -> Option<u8> {
        self.precision
    }

    /// Returns the generator.
    #[must_use]
    pub const fn value_change(&self) -> &ValueChange {
        &self.value_change
    }

    /// Returns the linked servers.
    #[must_use]
    pub const fn server_ids(&self) -> &BTreeSet<ServerId> {
        &self.server_ids
    }

    /// Returns whether the node is provisioned on `server_id`.
    #[must_use]
    pub fn is_on_server(&self, server_id: ServerId) -> bool {
        self.server_ids.contains(&server_id)
    }

    /// Coerces the stored value to the data type.
    ///
    /// Returns `None` when no value is stored. Stored values were validated
    /// on creation, but values written later are re-checked here.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] when the stored value does not fit.
    pub fn typed_value(&self) -> Result<Option<TypedValue>, CoercionError> {
        self.initial_value
            .as_deref()
            .map(|raw| self.data_type.coerce(raw))
            .transpose()
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.initial_value = Some(value).filter(|stored| !stored.is_empty());
    }
}

/// Persisted node: identifier plus validated definition.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    id: NodeId,
    definition: NodeDefinition,
}

impl NodeDescriptor {
    /// Pairs a persistence identifier with a definition.
    #[must_use]
    pub const fn new(id: NodeId, definition: NodeDefinition) -> Self {
        Self { id, definition }
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the definition.
    #[must_use]
    pub const fn definition(&self) -> &NodeDefinition {
        &self.definition
    }

    /// Replaces the stored value.
    pub fn set_value(&mut self, value: String) {
        self.definition.set_value(value);
    }
}
