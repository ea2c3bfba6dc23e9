use crate::doc::Value;
use crate::object::ObjectValue;

/// A leaf conversion: validates the runtime type and copies the value.
/// Dates and regular expressions are owned values on both sides, so stored
/// and in-memory instances never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    DateTime,
    Regex,
    Binary,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::DateTime => "datetime",
            Primitive::Regex => "regex",
            Primitive::Binary => "binary",
        }
    }

    /// Converts a document value, or `None` if the shape does not match.
    pub(super) fn read(&self, value: &Value) -> Option<ObjectValue> {
        match (self, value) {
            (Primitive::String, Value::String(v)) => Some(ObjectValue::String(v.clone())),
            (Primitive::Integer, Value::I64(v)) => Some(ObjectValue::I64(*v)),
            (Primitive::Number, Value::F64(v)) => Some(ObjectValue::F64(*v)),
            (Primitive::Number, Value::I64(v)) => Some(ObjectValue::F64(*v as f64)),
            (Primitive::Boolean, Value::Bool(v)) => Some(ObjectValue::Bool(*v)),
            (Primitive::DateTime, Value::DateTime(v)) => Some(ObjectValue::DateTime(*v)),
            (Primitive::Regex, Value::Regex { pattern, options }) => Some(ObjectValue::Regex {
                pattern: pattern.clone(),
                options: options.clone(),
            }),
            (Primitive::Binary, Value::Binary(v)) => Some(ObjectValue::Binary(v.clone())),
            _ => None,
        }
    }

    /// Converts an object value, or `None` if the shape does not match.
    pub(super) fn write(&self, value: &ObjectValue) -> Option<Value> {
        match (self, value) {
            (Primitive::String, ObjectValue::String(v)) => Some(Value::String(v.clone())),
            (Primitive::Integer, ObjectValue::I64(v)) => Some(Value::I64(*v)),
            (Primitive::Number, ObjectValue::F64(v)) => Some(Value::F64(*v)),
            (Primitive::Number, ObjectValue::I64(v)) => Some(Value::F64(*v as f64)),
            (Primitive::Boolean, ObjectValue::Bool(v)) => Some(Value::Bool(*v)),
            (Primitive::DateTime, ObjectValue::DateTime(v)) => Some(Value::DateTime(*v)),
            (Primitive::Regex, ObjectValue::Regex { pattern, options }) => Some(Value::Regex {
                pattern: pattern.clone(),
                options: options.clone(),
            }),
            (Primitive::Binary, ObjectValue::Binary(v)) => Some(Value::Binary(v.clone())),
            _ => None,
        }
    }
}
