//! Identifier, name, and port types for protocol servers.

use super::ServerDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a server name, matching `VARCHAR(100)`.
const MAX_SERVER_NAME_LENGTH: usize = 100;

/// Lowest port a server may bind; privileged ports are refused.
pub const MIN_SERVER_PORT: u16 = 1024;

/// Persistence-assigned identifier of a server descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(i64);

impl ServerId {
    /// Wraps a raw persistence identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for ServerId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated server name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName(String);

impl ServerName {
    /// Creates a validated server name.
    ///
    /// The input is trimmed; case and inner whitespace are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::EmptyServerName`] or
    /// [`ServerDomainError::ServerNameTooLong`].
    pub fn new(value: impl Into<String>) -> Result<Self, ServerDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ServerDomainError::EmptyServerName);
        }
        if trimmed.chars().count() > MAX_SERVER_NAME_LENGTH {
            return Err(ServerDomainError::ServerNameTooLong(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the server name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<String> for ServerName {
    type Error = ServerDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerName> for String {
    fn from(value: ServerName) -> Self {
        value.0
    }
}

/// TCP port a server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Creates a validated port.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidPort`] for ports below
    /// [`MIN_SERVER_PORT`].
    pub const fn new(value: u16) -> Result<Self, ServerDomainError> {
        if value < MIN_SERVER_PORT {
            return Err(ServerDomainError::InvalidPort(value));
        }
        Ok(Self(value))
    }

    /// Returns the port number.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Port {
    type Error = ServerDomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(value: Port) -> Self {
        value.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  Line 1 PLC  ", Ok("Line 1 PLC"))]
    #[case("   ", Err(ServerDomainError::EmptyServerName))]
    #[case("", Err(ServerDomainError::EmptyServerName))]
    fn server_names_are_trimmed(
        #[case] input: &str,
        #[case] expected: Result<&str, ServerDomainError>,
    ) {
        let name = ServerName::new(input);
        assert_eq!(name.as_ref().map(ServerName::as_str), expected.as_deref());
    }

    #[test]
    fn server_name_length_is_bounded() {
        assert!(ServerName::new("a".repeat(100)).is_ok());
        assert!(matches!(
            ServerName::new("a".repeat(101)),
            Err(ServerDomainError::ServerNameTooLong(_))
        ));
    }

    #[rstest]
    #[case(1023, false)]
    #[case(1024, true)]
    #[case(4840, true)]
    #[case(65535, true)]
    fn ports_exclude_privileged_range(#[case] value: u16, #[case] valid: bool) {
        assert_eq!(Port::new(value).is_ok(), valid);
    }

    #[test]
    fn names_deserialize_through_validation() {
        let parsed: Result<ServerName, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());
        let port: Port = serde_json::from_str("4840").expect("port should parse");
        assert_eq!(port.value(), 4840);
    }
}
