use crate::doc::Value;
use crate::object::ObjectValue;

/// An enumerated type. The numeric ordinal is canonical in memory; the
/// stored form is either the ordinal or the member name.
#[derive(Debug, Clone)]
pub struct EnumMapping {
    pub name: String,
    pub members: Vec<(String, i64)>,
    pub repr: EnumRepr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRepr {
    /// Store the numeric ordinal.
    Ordinal,
    /// Store the member name.
    Name { ignore_case: bool },
}

impl EnumMapping {
    pub fn new(name: impl Into<String>, members: Vec<(String, i64)>, repr: EnumRepr) -> Self {
        EnumMapping {
            name: name.into(),
            members,
            repr,
        }
    }

    pub(super) fn member_for_ordinal(&self, ordinal: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, value)| *value == ordinal)
            .map(|(name, _)| name.as_str())
    }

    pub(super) fn ordinal_for_name(&self, name: &str, ignore_case: bool) -> Option<i64> {
        self.members
            .iter()
            .find(|(member, _)| {
                if ignore_case {
                    member.eq_ignore_ascii_case(name)
                } else {
                    member == name
                }
            })
            .map(|(_, value)| *value)
    }

    /// Unknown names and ordinals are errors, never a fallback.
    pub(super) fn read(&self, value: &Value) -> Result<ObjectValue, String> {
        match (self.repr, value) {
            (_, Value::I64(ordinal)) => {
                if self.member_for_ordinal(*ordinal).is_some() {
                    Ok(ObjectValue::I64(*ordinal))
                } else {
                    Err(format!("unknown ordinal {} for enum {}", ordinal, self.name))
                }
            }
            (EnumRepr::Name { ignore_case }, Value::String(name)) => self
                .ordinal_for_name(name, ignore_case)
                .map(ObjectValue::I64)
                .ok_or_else(|| format!("unknown member {:?} for enum {}", name, self.name)),
            _ => Err(format!(
                "expected {} value for enum {}, got {}",
                match self.repr {
                    EnumRepr::Ordinal => "integer",
                    EnumRepr::Name { .. } => "string",
                },
                self.name,
                value.shape()
            )),
        }
    }

    pub(super) fn write(&self, value: &ObjectValue) -> Result<Value, String> {
        let ObjectValue::I64(ordinal) = value else {
            return Err(format!(
                "expected ordinal for enum {}, got {}",
                self.name,
                value.shape()
            ));
        };

        match self.repr {
            EnumRepr::Ordinal => {
                if self.member_for_ordinal(*ordinal).is_some() {
                    Ok(Value::I64(*ordinal))
                } else {
                    Err(format!("unknown ordinal {} for enum {}", ordinal, self.name))
                }
            }
            EnumRepr::Name { .. } => self
                .member_for_ordinal(*ordinal)
                .map(|name| Value::String(name.to_string()))
                .ok_or_else(|| format!("unknown ordinal {} for enum {}", ordinal, self.name)),
        }
    }
}
