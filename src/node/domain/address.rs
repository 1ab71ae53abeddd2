//! Protocol addresses of nodes.

use super::NodeDomainError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[expect(clippy::expect_used, reason = "the pattern is a compile-time constant")]
static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ns=(\d+);)?([isb])=(.+)$").expect("address pattern compiles")
});

/// Identifier kind of a node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// `i=` numeric identifier.
    Numeric,
    /// `s=` string identifier.
    String,
    /// `b=` opaque identifier.
    Opaque,
}

/// Validated protocol address such as `ns=2;s=Boiler.Temperature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress {
    raw: String,
    namespace: Option<u32>,
    kind: IdentifierKind,
    payload_start: usize,
}

impl NodeAddress {
    /// Parses and validates a node address.
    ///
    /// # Errors
    ///
    /// Returns [`NodeDomainError::InvalidNodeAddress`] when the address does
    /// not match `(ns=<uint>;)?[isb]=<payload>`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, NodeDomainError> {
        let raw_address = raw.into();
        let parsed = ADDRESS_PATTERN.captures(&raw_address).and_then(|captures| {
            let namespace = captures
                .get(1)
                .map(|index| index.as_str().parse::<u32>())
                .transpose()
                .ok()?;
            let kind = match captures.get(2)?.as_str() {
                "i" => IdentifierKind::Numeric,
                "s" => IdentifierKind::String,
                _ => IdentifierKind::Opaque,
            };
            Some((namespace, kind, captures.get(3)?.start()))
        });

        let Some((namespace, kind, payload_start)) = parsed else {
            return Err(NodeDomainError::InvalidNodeAddress(raw_address));
        };
        Ok(Self {
            raw: raw_address,
            namespace,
            kind,
            payload_start,
        })
    }

    /// Returns the namespace index, if one was given.
    #[must_use]
    pub const fn namespace(&self) -> Option<u32> {
        self.namespace
    }

    /// Returns the identifier kind.
    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        self.kind
    }

    /// Returns the identifier payload after the `[isb]=` prefix.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.raw.get(self.payload_start..).unwrap_or_default()
    }

    /// Returns the address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = NodeDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NodeAddress> for String {
    fn from(value: NodeAddress) -> Self {
        value.raw
    }
}
