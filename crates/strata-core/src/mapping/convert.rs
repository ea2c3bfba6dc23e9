use crate::doc::Value;
use crate::object::ObjectValue;
use crate::Result;

use std::rc::Rc;

/// An injected bidirectional conversion between an object member and its
/// stored form.
pub trait PropertyConverter {
    fn to_field(&self, value: &ObjectValue) -> Result<Value>;

    fn to_property(&self, value: &Value) -> Result<ObjectValue>;

    /// Document-level comparison of two converted values. `None` falls back
    /// to structural equality.
    fn are_equal(&self, _a: &Value, _b: &Value) -> Option<bool> {
        None
    }
}

/// Delegates both conversion directions to a [`PropertyConverter`].
#[derive(Clone)]
pub struct ConverterMapping {
    pub name: String,
    pub converter: Rc<dyn PropertyConverter>,
}

impl ConverterMapping {
    pub fn new(name: impl Into<String>, converter: Rc<dyn PropertyConverter>) -> Self {
        ConverterMapping {
            name: name.into(),
            converter,
        }
    }
}

impl core::fmt::Debug for ConverterMapping {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ConverterMapping")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
