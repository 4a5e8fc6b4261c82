//! Result records returned by the fetch operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of an [`AttributeResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// 64-bit float value
    Double,
    /// 64-bit signed integer value
    Int,
    /// String value
    String,
    /// Boolean value
    Bool,
    /// Soft per-attribute failure, no value attached
    Error,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Double => "DOUBLE",
            Self::Int => "INT",
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::Error => "ERROR",
        };
        f.write_str(tag)
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    /// Finite 64-bit float
    Double(f64),
    /// 64-bit signed integer
    Int(i64),
    /// String
    String(String),
    /// Boolean
    Bool(bool),
}

impl AttributeValue {
    /// Response type tag for this value.
    pub fn response_type(&self) -> ResponseType {
        match self {
            Self::Double(_) => ResponseType::Double,
            Self::Int(_) => ResponseType::Int,
            Self::String(_) => ResponseType::String,
            Self::Bool(_) => ResponseType::Bool,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// One flattened attribute entry.
///
/// `name` is always fully qualified: `<bean>,attr=<attribute>[.<Field>]*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeResponse {
    /// Fully qualified attribute name
    pub name: String,
    /// Type tag, `ERROR` for soft failures
    pub response_type: ResponseType,
    /// Value, absent for `ERROR`
    #[serde(default)]
    pub value: Option<AttributeValue>,
    /// Failure description, empty on success
    #[serde(default)]
    pub status_msg: String,
}

impl AttributeResponse {
    /// Successful entry.
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            response_type: value.response_type(),
            value: Some(value),
            status_msg: String::new(),
        }
    }

    /// Soft failure entry.
    pub fn error(name: impl Into<String>, status_msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_type: ResponseType::Error,
            value: None,
            status_msg: status_msg.into(),
        }
    }

    /// Whether this entry records a failure.
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Float payload, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Some(AttributeValue::Double(v)) => Some(v),
            _ => None,
        }
    }

    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Some(AttributeValue::Int(v)) => Some(v),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(AttributeValue::String(v)) => Some(v),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Some(AttributeValue::Bool(v)) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} ({}): {}", self.name, self.response_type, value),
            None => write!(f, "{} ({}): {}", self.name, self.response_type, self.status_msg),
        }
    }
}

/// Timing and outcome of one management call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalStat {
    /// Kind of call (`queryMBeans`, `getAttributes`, ...)
    pub stat_type: String,
    /// Bean name or pattern the call targeted
    pub mbean: String,
    /// Attributes requested
    pub attrs: Vec<String>,
    /// Number of values returned
    pub response_count: u64,
    /// Elapsed time in milliseconds
    pub milliseconds: f64,
    /// Wall-clock start in epoch milliseconds
    pub start_timestamp: i64,
    /// Whether the call succeeded
    pub successful: bool,
}

impl fmt::Display for InternalStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatType: '{}', MBean: '{}', Attributes: '[{}]', TotalObjCount: {}, StartTimeMs: {}, Duration: {:.3}ms, Successful: {}",
            self.stat_type,
            self.mbean,
            self.attrs.join(","),
            self.response_count,
            self.start_timestamp,
            self.milliseconds,
            self.successful
        )
    }
}
