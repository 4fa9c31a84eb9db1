//! Bound parameter values and their type tags

use std::fmt::{self, Display};

use crate::{Error, Result};

/// A SQL value that can be bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// String value
    String(String),
    /// Bytes value
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view used when binding with the `i` tag
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::I32(i) => Some(i64::from(*i)),
            Value::I64(i) => Some(*i),
            Value::F32(f) => Some(*f as i64),
            Value::F64(f) => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Null | Value::Bytes(_) => None,
        }
    }

    /// Float view used when binding with the `f` tag
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::I32(i) => Some(f64::from(*i)),
            Value::I64(i) => Some(*i as f64),
            Value::F32(f) => Some(f64::from(*f)),
            Value::F64(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            Value::Null | Value::Bytes(_) => None,
        }
    }

    /// Text view used when binding with the `s` tag
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::I32(i) => Some(i.to_string()),
            Value::I64(i) => Some(i.to_string()),
            Value::F32(f) => Some(f.to_string()),
            Value::F64(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Blob view used when binding with the `b` tag
    pub fn as_blob(&self) -> Option<Vec<u8>> {
        match self {
            Value::Null => None,
            Value::Bytes(b) => Some(b.clone()),
            other => other.as_text().map(String::into_bytes),
        }
    }

    /// Convert to a JSON value, used when deserializing fetched rows
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::I32(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
            Value::I64(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
            Value::F32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::F64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::Array(
                b.iter()
                    .map(|byte| serde_json::Value::Number(serde_json::Number::from(*byte)))
                    .collect(),
            ),
        }
    }
}

// Implement From for common types
impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::I32(val)
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::I64(val)
    }
}

impl From<u32> for Value {
    fn from(val: u32) -> Self {
        Value::I64(i64::from(val))
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Value::F32(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::F64(val)
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::String(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::String(val.to_string())
    }
}

impl From<&String> for Value {
    fn from(val: &String) -> Self {
        Value::String(val.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Value::Bytes(val)
    }
}

impl From<&[u8]> for Value {
    fn from(val: &[u8]) -> Self {
        Value::Bytes(val.to_vec())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Parameter type marker read positionally alongside bound values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `s`
    Text,
    /// `i`
    Integer,
    /// `f`
    Float,
    /// `b`
    Blob,
}

impl TypeTag {
    pub fn as_char(&self) -> char {
        match self {
            TypeTag::Text => 's',
            TypeTag::Integer => 'i',
            TypeTag::Float => 'f',
            TypeTag::Blob => 'b',
        }
    }
}

impl TryFrom<char> for TypeTag {
    type Error = Error;

    fn try_from(tag: char) -> Result<Self> {
        match tag {
            's' => Ok(TypeTag::Text),
            'i' => Ok(TypeTag::Integer),
            'f' => Ok(TypeTag::Float),
            'b' => Ok(TypeTag::Blob),
            other => Err(Error::unknown_param(other)),
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Pair every bound value with its parsed type tag.
///
/// This is the check every `Connection` runs before binding: the tag string
/// must only use the four known characters and must be exactly as long as
/// the value list.
pub fn typed_params<'a>(types: &str, values: &'a [Value]) -> Result<Vec<(TypeTag, &'a Value)>> {
    let tags = types
        .chars()
        .map(TypeTag::try_from)
        .collect::<Result<Vec<_>>>()?;

    if tags.len() != values.len() {
        return Err(Error::argument(format!(
            "The type definitions do not match the input data ({} types, {} values)",
            tags.len(),
            values.len()
        )));
    }

    Ok(tags.into_iter().zip(values.iter()).collect())
}
