//! Container types and values as read from a store.

use std::collections::HashMap;
use std::fmt;

/// Container kind of a key, reduced across both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Scalar,
    List,
    Set,
    Map,
    /// The two sides report different recognized types.
    Mismatch,
    /// At least one side reports a type we do not handle.
    Unknown,
}

impl ContainerType {
    /// Map a store type name to a container kind.
    ///
    /// Returns `None` for anything outside the four supported shapes,
    /// including `none` (key absent) and `zset`/`stream`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::Scalar),
            "list" => Some(Self::List),
            "set" => Some(Self::Set),
            "hash" => Some(Self::Map),
            _ => None,
        }
    }

    /// Store-side name of this kind, if it has one.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "hash",
            Self::Mismatch => "mismatch",
            Self::Unknown => "unknown",
        }
    }

}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Raw Redis string payload.
pub type Bytes = Vec<u8>;

/// A full value read from one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(Bytes),
    List(Vec<Bytes>),
    Set(Vec<Bytes>),
    Map(HashMap<Bytes, Bytes>),
    /// The key no longer exists.
    Missing,
    /// The read command failed; the real value is unknown.
    Unreadable,
    /// Stand-in produced for a type mismatch; never equal to anything.
    Mismatched,
}

impl Value {
    pub fn container_type(&self) -> Option<ContainerType> {
        match self {
            Value::Scalar(_) => Some(ContainerType::Scalar),
            Value::List(_) => Some(ContainerType::List),
            Value::Set(_) => Some(ContainerType::Set),
            Value::Map(_) => Some(ContainerType::Map),
            Value::Missing | Value::Unreadable | Value::Mismatched => None,
        }
    }

    /// Short shape name for issue logging.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Missing => "missing",
            Value::Unreadable => "unreadable",
            Value::Mismatched => "mismatched",
        }
    }

    /// Number of elements a copy of this value would write.
    pub fn element_count(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::List(items) | Value::Set(items) => items.len(),
            Value::Map(fields) => fields.len(),
            Value::Missing | Value::Unreadable | Value::Mismatched => 0,
        }
    }
}
