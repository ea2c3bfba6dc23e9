use super::{ObjectHandle, Reference};

use chrono::{DateTime, Utc};

/// An in-memory domain value, the object-side counterpart of
/// [`doc::Value`].
///
/// [`doc::Value`]: crate::doc::Value
#[derive(Debug, Default, Clone)]
pub enum ObjectValue {
    #[default]
    Null,

    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Regex { pattern: String, options: String },
    Binary(Vec<u8>),

    /// Ordered list
    Array(Vec<ObjectValue>),

    /// Deduplicated, insertion-ordered set
    Set(Vec<ObjectValue>),

    /// A structured object (entity or embeddable)
    Object(ObjectHandle),

    /// An entity that has not been loaded yet
    Reference(Reference),
}

impl ObjectValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Self::Object(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
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
            Self::Set(_) => "set",
            Self::Object(_) => "object",
            Self::Reference(_) => "reference",
        }
    }
}

/// Structural equality, except objects compare by identity and references
/// by target.
impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        use ObjectValue::*;

        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F64(a), F64(b)) => a == b,
            (String(a), String(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (
                Regex {
                    pattern: ap,
                    options: ao,
                },
                Regex {
                    pattern: bp,
                    options: bo,
                },
            ) => ap == bp && ao == bo,
            (Binary(a), Binary(b)) => a == b,
            (Array(a), Array(b)) | (Set(a), Set(b)) => a == b,
            (Object(a), Object(b)) => a.ptr_eq(b),
            (Reference(a), Reference(b)) => a.same_target(b),
            _ => false,
        }
    }
}

impl From<bool> for ObjectValue {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i64> for ObjectValue {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<f64> for ObjectValue {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for ObjectValue {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for ObjectValue {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl From<DateTime<Utc>> for ObjectValue {
    fn from(src: DateTime<Utc>) -> Self {
        Self::DateTime(src)
    }
}

impl From<ObjectHandle> for ObjectValue {
    fn from(src: ObjectHandle) -> Self {
        Self::Object(src)
    }
}

impl From<Reference> for ObjectValue {
    fn from(src: Reference) -> Self {
        Self::Reference(src)
    }
}

impl From<Vec<ObjectValue>> for ObjectValue {
    fn from(src: Vec<ObjectValue>) -> Self {
        Self::Array(src)
    }
}
