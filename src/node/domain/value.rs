//! Typed node values and string coercion.
//!
//! Node values are persisted as strings. [`DataType::coerce`] turns a stored
//! string into a [`TypedValue`] and reports a structured [`CoercionError`]
//! when it does not fit; coercion never panics.

use super::{CoercionError, DataType, VariantTag};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fmt;
use std::num::IntErrorKind;
use std::sync::LazyLock;

#[expect(clippy::expect_used, reason = "the pattern is a compile-time constant")]
static DATETIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{3})?Z$")
        .expect("datetime pattern compiles")
});

/// Datetime layout used when rendering timestamps back to strings.
const DATETIME_RENDER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// How permissive boolean parsing is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Leniency {
    /// Only `true` and `false` (any case) are booleans.
    #[default]
    Strict,
    /// `1` and `0` are accepted as booleans as well.
    Relaxed,
}

/// A node value coerced to its declared data type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Boolean value.
    Bool(bool),
    /// Signed 16-bit integer value.
    Int16(i16),
    /// Unsigned 16-bit integer value.
    UInt16(u16),
    /// Signed 32-bit integer value.
    Int32(i32),
    /// Unsigned 32-bit integer value.
    UInt32(u32),
    /// Signed 64-bit integer value.
    Int64(i64),
    /// Unsigned 64-bit integer value.
    UInt64(u64),
    /// Single-precision value.
    Float(f32),
    /// Double-precision value.
    Double(f64),
    /// Single character.
    Char(char),
    /// String value.
    String(String),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Raw bytes.
    ByteString(Vec<u8>),
    /// Value of a protocol-specific type kept in its stored form.
    Opaque(String),
}

impl TypedValue {
    /// Returns the wire variant of the value, if it has one.
    #[must_use]
    pub const fn variant_tag(&self) -> Option<VariantTag> {
        match self {
            Self::Bool(_) => Some(VariantTag::Boolean),
            Self::Int16(_) => Some(VariantTag::Int16),
            Self::UInt16(_) => Some(VariantTag::UInt16),
            Self::Int32(_) => Some(VariantTag::Int32),
            Self::UInt32(_) => Some(VariantTag::UInt32),
            Self::Int64(_) => Some(VariantTag::Int64),
            Self::UInt64(_) => Some(VariantTag::UInt64),
            Self::Float(_) => Some(VariantTag::Float),
            Self::Double(_) => Some(VariantTag::Double),
            Self::Char(_) => Some(VariantTag::Char),
            Self::String(_) => Some(VariantTag::String),
            Self::DateTime(_) => Some(VariantTag::DateTime),
            Self::ByteString(_) => Some(VariantTag::ByteString),
            Self::Opaque(_) => None,
        }
    }

    /// Returns the value as a double when it is numeric.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "64-bit integers are bound into double-precision expressions"
    )]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int16(value) => Some(f64::from(value)),
            Self::UInt16(value) => Some(f64::from(value)),
            Self::Int32(value) => Some(f64::from(value)),
            Self::UInt32(value) => Some(f64::from(value)),
            Self::Int64(value) => Some(value as f64),
            Self::UInt64(value) => Some(value as f64),
            Self::Float(value) => Some(f64::from(value)),
            Self::Double(value) => Some(value),
            _ => None,
        }
    }

    /// Rounds floating-point values to `decimals` places; other values are
    /// returned unchanged.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "rounded single-precision values are narrowed back to f32"
    )]
    pub fn with_precision(self, decimals: u8) -> Self {
        let scale = 10_f64.powi(i32::from(decimals));
        match self {
            Self::Double(value) => Self::Double((value * scale).round() / scale),
            Self::Float(value) => {
                Self::Float(((f64::from(value) * scale).round() / scale) as f32)
            }
            other => other,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Int16(value) => write!(formatter, "{value}"),
            Self::UInt16(value) => write!(formatter, "{value}"),
            Self::Int32(value) => write!(formatter, "{value}"),
            Self::UInt32(value) => write!(formatter, "{value}"),
            Self::Int64(value) => write!(formatter, "{value}"),
            Self::UInt64(value) => write!(formatter, "{value}"),
            Self::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(formatter, "{value:.1}")
            }
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Double(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(formatter, "{value:.1}")
            }
            Self::Double(value) => write!(formatter, "{value}"),
            Self::Char(value) => write!(formatter, "{value}"),
            Self::String(value) | Self::Opaque(value) => formatter.write_str(value),
            Self::DateTime(value) => {
                write!(formatter, "{}", value.format(DATETIME_RENDER_FORMAT))
            }
            Self::ByteString(value) => formatter.write_str(&String::from_utf8_lossy(value)),
        }
    }
}

impl DataType {
    /// Validates a stored value against this type.
    ///
    /// A missing or empty value is always valid and means "no value".
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] when a non-empty value does not fit.
    pub fn validate(self, raw: Option<&str>) -> Result<(), CoercionError> {
        match raw {
            None => Ok(()),
            Some(value) if value.is_empty() => Ok(()),
            Some(value) => self.coerce(value).map(|_| ()),
        }
    }

    /// Coerces a raw string using strict boolean syntax.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError::InvalidFormat`] when the value is not
    /// syntactically valid and [`CoercionError::OutOfRange`] when an integer
    /// lies outside the type's range.
    pub fn coerce(self, raw: &str) -> Result<TypedValue, CoercionError> {
        self.coerce_with(raw, Leniency::Strict)
    }

    /// Coerces a raw string, accepting `1`/`0` as booleans.
    ///
    /// # Errors
    ///
    /// See [`DataType::coerce`].
    pub fn coerce_relaxed(self, raw: &str) -> Result<TypedValue, CoercionError> {
        self.coerce_with(raw, Leniency::Relaxed)
    }

    /// Coerces a raw string with the given boolean leniency.
    ///
    /// # Errors
    ///
    /// See [`DataType::coerce`].
    pub fn coerce_with(self, raw: &str, leniency: Leniency) -> Result<TypedValue, CoercionError> {
        match self {
            Self::Bool => self.coerce_bool(raw, leniency),
            Self::Int16 => {
                let value = self.coerce_integer(raw)?;
                i16::try_from(value)
                    .map(TypedValue::Int16)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Uint16 => {
                let value = self.coerce_integer(raw)?;
                u16::try_from(value)
                    .map(TypedValue::UInt16)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Int32 => {
                let value = self.coerce_integer(raw)?;
                i32::try_from(value)
                    .map(TypedValue::Int32)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Uint32 => {
                let value = self.coerce_integer(raw)?;
                u32::try_from(value)
                    .map(TypedValue::UInt32)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Int64 => {
                let value = self.coerce_integer(raw)?;
                i64::try_from(value)
                    .map(TypedValue::Int64)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Uint64 => {
                let value = self.coerce_integer(raw)?;
                u64::try_from(value)
                    .map(TypedValue::UInt64)
                    .map_err(|_| self.out_of_range(raw))
            }
            Self::Float | Self::Double => {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| self.invalid_format(raw, "a floating-point number"))?;
                self.from_f64(value)
            }
            Self::Char => {
                let mut characters = raw.chars();
                match (characters.next(), characters.next()) {
                    (Some(character), None) => Ok(TypedValue::Char(character)),
                    _ => Err(self.invalid_format(raw, "exactly one character")),
                }
            }
            Self::String => Ok(TypedValue::String(raw.to_owned())),
            Self::Datetime => self.coerce_datetime(raw),
            Self::Bytestring => Ok(TypedValue::ByteString(raw.as_bytes().to_vec())),
            Self::Nodeid
            | Self::Statuscode
            | Self::Localizedtext
            | Self::Qualifiedname
            | Self::Xmlelement
            | Self::Variant
            | Self::Datavalue => Ok(TypedValue::Opaque(raw.to_owned())),
        }
    }

    /// Converts a computed double into a value of this type.
    ///
    /// Integer types require an integral value inside their range; floating
    /// types accept any value.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] for non-integral or out-of-range integers and
    /// for non-numeric types.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "integral doubles are range-checked before narrowing"
    )]
    pub fn from_f64(self, value: f64) -> Result<TypedValue, CoercionError> {
        if self == Self::Double {
            return Ok(TypedValue::Double(value));
        }
        if self == Self::Float {
            return Ok(TypedValue::Float(value as f32));
        }

        let Some((min, max)) = self.integer_bounds() else {
            return Err(self.invalid_format(&value.to_string(), "a numeric data type"));
        };
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(self.invalid_format(&value.to_string(), "an integral number"));
        }
        #[expect(
            clippy::cast_precision_loss,
            reason = "bounds are compared approximately and re-checked exactly below"
        )]
        let outside = value < min as f64 || value > max as f64;
        if outside {
            return Err(self.out_of_range(&value.to_string()));
        }
        self.coerce(&format!("{}", value as i128))
    }

    fn coerce_bool(self, raw: &str, leniency: Leniency) -> Result<TypedValue, CoercionError> {
        let normalized = raw.trim().to_ascii_lowercase();
        match (normalized.as_str(), leniency) {
            ("true", _) | ("1", Leniency::Relaxed) => Ok(TypedValue::Bool(true)),
            ("false", _) | ("0", Leniency::Relaxed) => Ok(TypedValue::Bool(false)),
            (_, Leniency::Strict) => Err(self.invalid_format(raw, "true or false")),
            (_, Leniency::Relaxed) => Err(self.invalid_format(raw, "true, false, 1 or 0")),
        }
    }

    fn coerce_integer(self, raw: &str) -> Result<i128, CoercionError> {
        let (min, max) = self
            .integer_bounds()
            .ok_or_else(|| self.invalid_format(raw, "an integer data type"))?;
        match raw.trim().parse::<i128>() {
            Ok(value) if value < min || value > max => Err(self.out_of_range(raw)),
            Ok(value) => Ok(value),
            Err(err)
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                Err(self.out_of_range(raw))
            }
            Err(_) => Err(self.invalid_format(raw, "a base-10 integer")),
        }
    }

    fn coerce_datetime(self, raw: &str) -> Result<TypedValue, CoercionError> {
        const EXPECTED: &str = "YYYY-MM-DDTHH:MM:SS[.mmm]Z";
        if !DATETIME_PATTERN.is_match(raw) {
            return Err(self.invalid_format(raw, EXPECTED));
        }
        let without_zone = raw.strip_suffix('Z').unwrap_or(raw);
        NaiveDateTime::parse_from_str(without_zone, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| TypedValue::DateTime(naive.and_utc()))
            .map_err(|_| self.invalid_format(raw, EXPECTED))
    }

    fn invalid_format(self, raw: &str, expected: &'static str) -> CoercionError {
        CoercionError::InvalidFormat {
            data_type: self,
            value: raw.to_owned(),
            expected,
        }
    }

    fn out_of_range(self, raw: &str) -> CoercionError {
        let (min, max) = self.integer_bounds().unwrap_or((0, 0));
        CoercionError::OutOfRange {
            data_type: self,
            value: raw.to_owned(),
            min,
            max,
        }
    }
}
