use super::{MappingId, MappingKind, Registry};
use crate::doc::{Document, Value};

impl Registry {
    /// Document-level structural equality under this node's conversion
    /// strategy: decides whether a serialized form changed without building
    /// a diff. NaN equals itself; entity-shaped values compare identifiers
    /// only.
    pub fn are_equal(&self, id: MappingId, a: &Value, b: &Value) -> bool {
        match &self.get(id).kind {
            MappingKind::Converter(mapping) => mapping
                .converter
                .are_equal(a, b)
                .unwrap_or_else(|| a.doc_eq(b)),

            MappingKind::Entity(_) => entity_id_of(a).doc_eq(entity_id_of(b)),

            MappingKind::Object(_) | MappingKind::Class(_) => match (a, b) {
                (Value::Document(a), Value::Document(b)) => {
                    self.object_fields_equal(id, a, b, &[])
                }
                _ => a.doc_eq(b),
            },

            MappingKind::Array(mapping) => match (a, b) {
                (Value::Array(a), Value::Array(b)) => {
                    a.len() == b.len()
                        && a.iter()
                            .zip(b)
                            .all(|(x, y)| self.are_equal(mapping.element, x, y))
                }
                _ => a.doc_eq(b),
            },

            // Stored sets are unordered.
            MappingKind::Set(mapping) => match (a, b) {
                (Value::Array(a), Value::Array(b)) => {
                    a.len() == b.len()
                        && a.iter().all(|x| {
                            b.iter().any(|y| self.are_equal(mapping.element, x, y))
                        })
                }
                _ => a.doc_eq(b),
            },

            MappingKind::Tuple(mapping) => match (a, b) {
                (Value::Array(a), Value::Array(b)) => {
                    a.len() == mapping.elements.len()
                        && b.len() == mapping.elements.len()
                        && mapping
                            .elements
                            .iter()
                            .zip(a.iter().zip(b))
                            .all(|(element, (x, y))| self.are_equal(*element, x, y))
                }
                _ => a.doc_eq(b),
            },

            _ => a.doc_eq(b),
        }
    }

    /// Whole-document comparison for a root entity, ignoring the version
    /// field. Used by the persister to skip updates whose serialized form
    /// has not changed.
    pub fn documents_equal(&self, declared: MappingId, a: &Document, b: &Document) -> bool {
        let skip: Vec<&str> = self
            .policy(declared)
            .filter(|policy| policy.versioned)
            .map(|policy| vec![policy.version_field.as_str()])
            .unwrap_or_default();

        // Dispatch on a's discriminator so subtype fields compare under
        // their own mappings.
        let concrete = self.dispatch_read(declared, a).unwrap_or(declared);
        self.object_fields_equal(concrete, a, b, &skip)
    }

    fn object_fields_equal(
        &self,
        id: MappingId,
        a: &Document,
        b: &Document,
        skip: &[&str],
    ) -> bool {
        for (field, x) in a {
            if skip.contains(&field.as_str()) {
                continue;
            }
            let Some(y) = b.get(field) else {
                return false;
            };
            let equal = match self.property_by_field(id, field) {
                Some(property) => self.are_equal(property.mapping, x, y),
                None => x.doc_eq(y),
            };
            if !equal {
                return false;
            }
        }

        // Fields present only in b.
        b.fields()
            .all(|field| skip.contains(&field.as_str()) || a.contains_field(field))
    }

    pub(super) fn property_by_field(
        &self,
        id: MappingId,
        field: &str,
    ) -> Option<&super::Property> {
        self.properties(id).into_iter().find(|p| p.field == field)
    }
}

/// Entity-shaped document values carry either a bare identifier or a full
/// document whose identifier field decides equality.
fn entity_id_of(value: &Value) -> &Value {
    match value {
        Value::Document(doc) => doc.get(super::entity::ID_FIELD).unwrap_or(value),
        value => value,
    }
}
