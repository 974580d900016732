//! Argument values and declared type signatures
//!
//! Every argument a payload carries is an [`ArgValue`] whose [`ArgKind`]
//! is known statically. Matching a combination of payloads against a unit
//! is a plain equality check between two [`Signature`]s.

use serde::{Deserialize, Serialize};

/// The closed set of argument kinds a unit may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Bool,
    Int64,
    Float64,
    String,
    Bytes,
    StringList,
    Float64List,
    Json,
}

impl ArgKind {
    /// Canonical lowercase name, used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ArgKind::Bool => "bool",
            ArgKind::Int64 => "int64",
            ArgKind::Float64 => "float64",
            ArgKind::String => "string",
            ArgKind::Bytes => "bytes",
            ArgKind::StringList => "string_list",
            ArgKind::Float64List => "float64_list",
            ArgKind::Json => "json",
        }
    }
}

impl std::fmt::Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed argument value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    StringList(Vec<String>),
    Float64List(Vec<f64>),
    Json(serde_json::Value),
}

impl ArgValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            ArgValue::Bool(_) => ArgKind::Bool,
            ArgValue::Int64(_) => ArgKind::Int64,
            ArgValue::Float64(_) => ArgKind::Float64,
            ArgValue::String(_) => ArgKind::String,
            ArgValue::Bytes(_) => ArgKind::Bytes,
            ArgValue::StringList(_) => ArgKind::StringList,
            ArgValue::Float64List(_) => ArgKind::Float64List,
            ArgValue::Json(_) => ArgKind::Json,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether every float in the value is finite. JSON has no encoding
    /// for NaN or infinities, so only finite values can be persisted.
    pub fn is_finite(&self) -> bool {
        match self {
            ArgValue::Float64(v) => v.is_finite(),
            ArgValue::Float64List(values) => values.iter().all(|v| v.is_finite()),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float64(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int64(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

/// Ordered list of argument kinds, excluding the context element.
///
/// Two signatures match only when they have the same length and the same
/// kind at every position. There is no coercion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub Vec<ArgKind>);

impl Signature {
    pub fn new(kinds: Vec<ArgKind>) -> Self {
        Self(kinds)
    }

    /// Signature of an argument list
    pub fn of(args: &[ArgValue]) -> Self {
        Self(args.iter().map(ArgValue::kind).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> &[ArgKind] {
        &self.0
    }

    /// Whether the given arguments, in order, have exactly this signature.
    pub fn matches<'a>(&self, args: impl IntoIterator<Item = &'a ArgValue>) -> bool {
        let mut kinds = self.0.iter();
        for arg in args {
            match kinds.next() {
                Some(kind) if *kind == arg.kind() => {}
                _ => return false,
            }
        }
        kinds.next().is_none()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<ArgKind>> for Signature {
    fn from(kinds: Vec<ArgKind>) -> Self {
        Self(kinds)
    }
}
