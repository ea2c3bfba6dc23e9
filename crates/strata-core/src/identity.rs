use crate::doc::Value;
use crate::Result;

use uuid::Uuid;

/// Pluggable identifier strategy for one entity root. Implementations are
/// external to the engine; [`UuidGenerator`] is the built-in default.
pub trait IdentityGenerator {
    /// Produces a fresh identifier.
    fn generate(&self) -> Value;

    /// Parses an identifier from its text form.
    fn from_string(&self, text: &str) -> Result<Value>;

    /// True if the value is a well-formed identifier for this strategy.
    fn validate(&self, value: &Value) -> bool;

    fn are_equal(&self, a: &Value, b: &Value) -> bool {
        a.doc_eq(b)
    }
}

/// Random v4 UUIDs stored as strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdentityGenerator for UuidGenerator {
    fn generate(&self) -> Value {
        Value::String(Uuid::new_v4().to_string())
    }

    fn from_string(&self, text: &str) -> Result<Value> {
        let id = Uuid::parse_str(text)?;
        Ok(Value::String(id.to_string()))
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::String(text) => Uuid::parse_str(text).is_ok(),
            _ => false,
        }
    }
}

/// Caller-assigned string identifiers: any non-empty string is valid.
/// `generate` still hands out UUID strings for objects persisted without an
/// explicit identifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringGenerator;

impl IdentityGenerator for StringGenerator {
    fn generate(&self) -> Value {
        Value::String(Uuid::new_v4().to_string())
    }

    fn from_string(&self, text: &str) -> Result<Value> {
        if text.is_empty() {
            return Err(crate::err!("identifier must not be empty"));
        }
        Ok(Value::String(text.to_string()))
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::String(text) if !text.is_empty())
    }
}
