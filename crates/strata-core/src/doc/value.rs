use super::{Document, IdKey};
use crate::Result;

use chrono::{DateTime, Utc};

/// A document-store wire value.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    /// Null value
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed 64-bit integer
    I64(i64),

    /// Double-precision float
    F64(f64),

    /// String value
    String(String),

    /// UTC timestamp
    DateTime(DateTime<Utc>),

    /// Regular expression pattern plus option flags
    Regex { pattern: String, options: String },

    /// Binary blob
    Binary(Vec<u8>),

    /// A list of values
    Array(Vec<Value>),

    /// A nested document
    Document(Document),
}

impl Value {
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            Self::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_document(self) -> Result<Document> {
        match self {
            Self::Document(doc) => Ok(doc),
            _ => Err(crate::err!("cannot convert value to document")),
        }
    }

    /// The hashable projection of an identifier value. Identifiers of other
    /// shapes are rejected by the configured identity generator before this
    /// is reached.
    pub fn id_key(&self) -> Option<IdKey> {
        match self {
            Self::String(v) => Some(IdKey::String(v.clone())),
            Self::I64(v) => Some(IdKey::I64(*v)),
            Self::Binary(v) => Some(IdKey::Binary(v.clone())),
            _ => None,
        }
    }

    /// Structural document equality. Unlike `PartialEq`, treats `NaN` as
    /// equal to itself and compares documents by key set rather than
    /// insertion order.
    pub fn doc_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::F64(a), Self::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.doc_eq(y))
            }
            (Self::Document(a), Self::Document(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, x)| match b.get(key) {
                        Some(y) => x.doc_eq(y),
                        None => false,
                    })
            }
            _ => self == other,
        }
    }

    /// Describes the value's shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::I64(_) => "integer",
            Self::F64(_) => "double",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Regex { .. } => "regex",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
            Self::Document(_) => "document",
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<f64> for Value {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(src: DateTime<Utc>) -> Self {
        Self::DateTime(src)
    }
}

impl From<Vec<Value>> for Value {
    fn from(src: Vec<Value>) -> Self {
        Self::Array(src)
    }
}

impl From<Document> for Value {
    fn from(src: Document) -> Self {
        Self::Document(src)
    }
}

impl From<IdKey> for Value {
    fn from(src: IdKey) -> Self {
        match src {
            IdKey::String(v) => Self::String(v),
            IdKey::I64(v) => Self::I64(v),
            IdKey::Binary(v) => Self::Binary(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_doc_equal_to_itself() {
        let nan = Value::F64(f64::NAN);
        assert_ne!(nan, nan.clone());
        assert!(nan.doc_eq(&nan.clone()));
    }

    #[test]
    fn document_equality_ignores_field_order() {
        let mut a = Document::new();
        a.insert("x", 1i64);
        a.insert("y", 2i64);

        let mut b = Document::new();
        b.insert("y", 2i64);
        b.insert("x", 1i64);

        assert!(Value::from(a).doc_eq(&Value::from(b)));
    }

    #[test]
    fn id_key_shapes() {
        assert_eq!(
            Value::from("a1").id_key(),
            Some(IdKey::String("a1".into()))
        );
        assert_eq!(Value::from(7i64).id_key(), Some(IdKey::I64(7)));
        assert_eq!(Value::Null.id_key(), None);
        assert_eq!(Value::from(1.5).id_key(), None);
    }
}
