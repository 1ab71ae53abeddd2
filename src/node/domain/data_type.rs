//! Scalar data types and access modes of protocol nodes.
//!
//! [`DataType`] is the closed set of types a node may declare. Every variant
//! maps to a wire variant tag, an inert default value, and an integer range
//! where one applies; the mapping tables below are exhaustive matches so a
//! new variant cannot be added without deciding all three.

use super::{ParseAccessModeError, ParseDataTypeError, TypedValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared scalar type of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Boolean.
    Bool,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    Uint64,
    /// Single-precision floating point.
    Float,
    /// Double-precision floating point.
    Double,
    /// Single character.
    Char,
    /// UTF-8 string.
    String,
    /// UTC timestamp.
    Datetime,
    /// Opaque byte string.
    Bytestring,
    /// Protocol node identifier.
    Nodeid,
    /// Protocol status code.
    Statuscode,
    /// Protocol localized text.
    Localizedtext,
    /// Protocol qualified name.
    Qualifiedname,
    /// Protocol XML element.
    Xmlelement,
    /// Protocol variant.
    Variant,
    /// Protocol data value.
    Datavalue,
}

/// Wire variant a provisioned variable is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantTag {
    /// Boolean variant.
    Boolean,
    /// 16-bit signed integer variant.
    Int16,
    /// 16-bit unsigned integer variant.
    UInt16,
    /// 32-bit signed integer variant.
    Int32,
    /// 32-bit unsigned integer variant.
    UInt32,
    /// 64-bit signed integer variant.
    Int64,
    /// 64-bit unsigned integer variant.
    UInt64,
    /// Single-precision float variant.
    Float,
    /// Double-precision float variant.
    Double,
    /// Single character carried as a one-character string.
    Char,
    /// String variant.
    String,
    /// Date-time variant.
    DateTime,
    /// Byte-string variant.
    ByteString,
}

impl DataType {
    /// All declared data types in canonical order.
    pub const ALL: [Self; 20] = [
        Self::Bool,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Int64,
        Self::Uint64,
        Self::Float,
        Self::Double,
        Self::Char,
        Self::String,
        Self::Datetime,
        Self::Bytestring,
        Self::Nodeid,
        Self::Statuscode,
        Self::Localizedtext,
        Self::Qualifiedname,
        Self::Xmlelement,
        Self::Variant,
        Self::Datavalue,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int16 => "INT16",
            Self::Uint16 => "UINT16",
            Self::Int32 => "INT32",
            Self::Uint32 => "UINT32",
            Self::Int64 => "INT64",
            Self::Uint64 => "UINT64",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Char => "CHAR",
            Self::String => "STRING",
            Self::Datetime => "DATETIME",
            Self::Bytestring => "BYTESTRING",
            Self::Nodeid => "NODEID",
            Self::Statuscode => "STATUSCODE",
            Self::Localizedtext => "LOCALIZEDTEXT",
            Self::Qualifiedname => "QUALIFIEDNAME",
            Self::Xmlelement => "XMLELEMENT",
            Self::Variant => "VARIANT",
            Self::Datavalue => "DATAVALUE",
        }
    }

    /// Returns the wire variant for this type, or `None` for protocol-specific
    /// types that cannot be provisioned as plain scalar variables.
    #[must_use]
    pub const fn variant_tag(self) -> Option<VariantTag> {
        match self {
            Self::Bool => Some(VariantTag::Boolean),
            Self::Int16 => Some(VariantTag::Int16),
            Self::Uint16 => Some(VariantTag::UInt16),
            Self::Int32 => Some(VariantTag::Int32),
            Self::Uint32 => Some(VariantTag::UInt32),
            Self::Int64 => Some(VariantTag::Int64),
            Self::Uint64 => Some(VariantTag::UInt64),
            Self::Float => Some(VariantTag::Float),
            Self::Double => Some(VariantTag::Double),
            Self::Char => Some(VariantTag::Char),
            Self::String => Some(VariantTag::String),
            Self::Datetime => Some(VariantTag::DateTime),
            Self::Bytestring => Some(VariantTag::ByteString),
            Self::Nodeid
            | Self::Statuscode
            | Self::Localizedtext
            | Self::Qualifiedname
            | Self::Xmlelement
            | Self::Variant
            | Self::Datavalue => None,
        }
    }

    /// Returns the inclusive integer range for integer types.
    #[must_use]
    pub const fn integer_bounds(self) -> Option<(i128, i128)> {
        match self {
            Self::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::Uint16 => Some((0, u16::MAX as i128)),
            Self::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::Uint32 => Some((0, u32::MAX as i128)),
            Self::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::Uint64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Returns whether the type is an integer type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.integer_bounds().is_some()
    }

    /// Returns whether the type is a floating-point type.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Returns whether numeric generators (linear, random) apply to the type.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// Returns the inert value a variable receives when no usable initial
    /// value exists.
    #[must_use]
    pub fn default_value(self) -> TypedValue {
        match self {
            Self::Bool => TypedValue::Bool(false),
            Self::Int16 => TypedValue::Int16(0),
            Self::Uint16 => TypedValue::UInt16(0),
            Self::Int32 => TypedValue::Int32(0),
            Self::Uint32 => TypedValue::UInt32(0),
            Self::Int64 => TypedValue::Int64(0),
            Self::Uint64 => TypedValue::UInt64(0),
            Self::Float => TypedValue::Float(0.0),
            Self::Double => TypedValue::Double(0.0),
            Self::Char => TypedValue::Char('\0'),
            Self::String => TypedValue::String(String::new()),
            Self::Datetime => TypedValue::DateTime(DateTime::<Utc>::UNIX_EPOCH),
            Self::Bytestring => TypedValue::ByteString(Vec::new()),
            Self::Nodeid
            | Self::Statuscode
            | Self::Localizedtext
            | Self::Qualifiedname
            | Self::Xmlelement
            | Self::Variant
            | Self::Datavalue => TypedValue::Opaque(String::new()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DataType {
    type Error = ParseDataTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseDataTypeError(value.to_owned()))
    }
}

/// Client access granted on a provisioned variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessMode {
    /// Clients may only read.
    Read,
    /// Clients may only write.
    Write,
    /// Clients may read and write.
    #[default]
    Readwrite,
}

impl AccessMode {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Readwrite => "READWRITE",
        }
    }

    /// Returns the writable flag the protocol variable is created with.
    ///
    /// `READ` maps to not-writable, `WRITE` to not-read-only, and
    /// `READWRITE` to writable; the latter two are both writable at the
    /// protocol level.
    #[must_use]
    pub const fn writable(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AccessMode {
    type Error = ParseAccessModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "READWRITE" | "READ_WRITE" => Ok(Self::Readwrite),
            _ => Err(ParseAccessModeError(value.to_owned())),
        }
    }
}
