//! Raw attribute values as delivered by a connector.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Attribute value before normalization.
///
/// Connectors map whatever their wire format carries onto this closed set
/// once, at the decode boundary. Anything they cannot express lands in
/// `Unsupported` with a short type description.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Absent value
    Null,
    /// Floating point, may be non-finite
    Double(f64),
    /// Any integral number
    Integer(i64),
    /// Text
    Str(String),
    /// Boolean
    Bool(bool),
    /// Point in time
    Date(DateTime<Utc>),
    /// Named fields, flattened by the normalizer
    Composite(BTreeMap<String, RawValue>),
    /// Value of a type the normalizer does not handle
    Unsupported(String),
}

impl RawValue {
    /// Short description of the variant, used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Double(_) => "double",
            Self::Integer(_) => "long",
            Self::Str(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Date(_) => "date",
            Self::Composite(_) => "composite",
            Self::Unsupported(ty) => ty,
        }
    }

    /// Builds a composite from `(key, value)` pairs.
    pub fn composite<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        Self::Composite(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}
