//! Dynamically typed values for defaults and user-supplied input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of value an option expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Treated like a string.
    #[default]
    String,
    /// A boolean switch.
    Bool,
    /// An integer.
    Int,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
        }
    }
}

/// A resolved argument or option value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<String>),
}

impl Value {
    /// The value as a list of strings; scalars become a single-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::List(values) => values.clone(),
            other => vec![other.to_string()],
        }
    }

    /// Whether this is the type an option of `kind` holds.
    pub fn matches(&self, kind: ValueType, repeated: bool) -> bool {
        matches!(
            (self, kind, repeated),
            (Self::Bool(_), ValueType::Bool, false)
                | (Self::Int(_), ValueType::Int, false)
                | (Self::String(_), ValueType::String, false)
                | (Self::List(_), ValueType::String, true)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
            Self::List(values) => write!(f, "{}", values.join(" ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for Value {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(String::from).collect())
    }
}
