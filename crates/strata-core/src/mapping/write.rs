use super::{MappingId, MappingKind, Registry, WriteContext};
use crate::doc::{Document, Value};
use crate::object::{ObjectHandle, ObjectValue};
use crate::{Error, Result};

impl Registry {
    /// Serializes a full entity to its root document, dispatching on the
    /// object's runtime type. The version field is stamped by the
    /// persister, not here.
    pub fn write_document(&self, declared: MappingId, handle: &ObjectHandle) -> Result<Document> {
        if self.policy(declared).is_none() {
            return Err(Error::precondition(
                "write_document requires an entity mapping",
            ));
        }

        let tag = handle.type_tag();
        let concrete = match self.mapping_for_tag(&tag) {
            Some(node) if self.descends_from(node, declared) => node,
            Some(_) => {
                return Err(Error::consistency(format!(
                    "type {} is not a subtype of {}",
                    tag,
                    self.get(declared).as_object().unwrap().type_tag
                )))
            }
            None => {
                return Err(Error::consistency(format!("type {} is not mapped", tag)));
            }
        };

        let policy = self.policy(declared).unwrap();
        let id = match id_to_doc(&handle.get(&policy.id_property)) {
            Some(id) => id,
            None => return Err(Error::consistency("entity is missing an identifier")),
        };
        if !policy.generator.validate(&id) {
            return Err(Error::consistency(format!(
                "identifier {:?} failed the configured generator's validation",
                id
            )));
        }

        let mut doc = Document::new();
        doc.insert(super::entity::ID_FIELD, id);

        let class = self.get(concrete).as_class().expect("entity is a class");
        if class.is_polymorphic() {
            doc.insert(
                class.discriminator_field.clone(),
                class.discriminator_value.clone(),
            );
        }

        let mut cx = WriteContext::new();
        self.write_properties(concrete, &mut cx, handle, &mut doc);

        if cx.has_errors() {
            return Err(Error::validation(cx.into_errors()));
        }
        Ok(doc)
    }

    fn write_properties(
        &self,
        id: MappingId,
        cx: &mut WriteContext,
        handle: &ObjectHandle,
        doc: &mut Document,
    ) {
        if !cx.push_visited(handle) {
            cx.error(format!(
                "recursive embedding of {}",
                handle.type_tag()
            ));
            return;
        }

        for property in self.properties(id) {
            if property.ignored
                || property.read_only
                || property.parent_reference
                || property.inverse_of.is_some()
            {
                continue;
            }

            cx.enter(&property.name);

            let value = handle.get(&property.name);
            match value {
                ObjectValue::Null => {
                    // Null is stored only for explicitly nullable
                    // properties; otherwise absence.
                    if property.nullable && handle.has(&property.name) {
                        doc.insert(property.field.clone(), Value::Null);
                    }
                }
                value => {
                    let converted = self.write(property.mapping, cx, &value);
                    doc.insert(property.field.clone(), converted);
                }
            }

            cx.exit();
        }

        cx.pop_visited();
    }

    /// Converts one in-memory value into its stored form. Shape mismatches
    /// are recorded on the context and yield `Null`; every error found in
    /// the pass is accumulated rather than short-circuiting.
    pub fn write(&self, id: MappingId, cx: &mut WriteContext, value: &ObjectValue) -> Value {
        match &self.get(id).kind {
            MappingKind::Primitive(primitive) => match primitive.write(value) {
                Some(converted) => converted,
                None => {
                    cx.error(format!(
                        "expected {}, got {}",
                        primitive.name(),
                        value.shape()
                    ));
                    Value::Null
                }
            }

            MappingKind::Enum(mapping) => match mapping.write(value) {
                Ok(converted) => converted,
                Err(message) => {
                    cx.error(message);
                    Value::Null
                }
            }

            MappingKind::Converter(mapping) => match mapping.converter.to_field(value) {
                Ok(converted) => converted,
                Err(err) => {
                    cx.error(err.to_string());
                    Value::Null
                }
            }

            MappingKind::Object(_) => match value {
                ObjectValue::Object(handle) => {
                    let mut doc = Document::new();
                    self.write_properties(id, cx, handle, &mut doc);
                    Value::Document(doc)
                }
                other => {
                    cx.error(format!("expected object, got {}", other.shape()));
                    Value::Null
                }
            },

            MappingKind::Class(_) => match value {
                ObjectValue::Object(handle) => self.write_class(id, cx, handle),
                other => {
                    cx.error(format!("expected object, got {}", other.shape()));
                    Value::Null
                }
            },

            // Nested entities are stored purely by identifier.
            MappingKind::Entity(_) => match value {
                ObjectValue::Reference(reference) => reference.id().clone(),
                ObjectValue::Object(handle) => {
                    let policy = self.policy(id).expect("entity has a policy");
                    match id_to_doc(&handle.get(&policy.id_property)) {
                        Some(id) => id,
                        None => {
                            cx.error("referenced entity has no identifier");
                            Value::Null
                        }
                    }
                }
                other => {
                    cx.error(format!("expected entity, got {}", other.shape()));
                    Value::Null
                }
            },

            MappingKind::Array(mapping) => match value {
                ObjectValue::Array(items) => {
                    Value::Array(self.write_elements(mapping.element, cx, items))
                }
                other => {
                    cx.error(format!("expected array, got {}", other.shape()));
                    Value::Null
                }
            },

            // A set mapping rejects a plain sequence; the expected-type
            // check is variant-specific.
            MappingKind::Set(mapping) => match value {
                ObjectValue::Set(items) => {
                    Value::Array(self.write_elements(mapping.element, cx, items))
                }
                other => {
                    cx.error(format!("expected set, got {}", other.shape()));
                    Value::Null
                }
            },

            MappingKind::Tuple(mapping) => match value {
                ObjectValue::Array(items) if items.len() == mapping.elements.len() => {
                    let elements = mapping.elements.clone();
                    let mut converted = Vec::with_capacity(items.len());
                    for (index, (element, item)) in elements.iter().zip(items).enumerate() {
                        cx.enter(index.to_string());
                        converted.push(self.write(*element, cx, item));
                        cx.exit();
                    }
                    Value::Array(converted)
                }
                ObjectValue::Array(items) => {
                    cx.error(format!(
                        "expected tuple of {} elements, got {}",
                        mapping.elements.len(),
                        items.len()
                    ));
                    Value::Null
                }
                other => {
                    cx.error(format!("expected array, got {}", other.shape()));
                    Value::Null
                }
            },

            // Never contributes to the written document.
            MappingKind::VirtualId => Value::Null,
        }
    }

    /// Discriminator dispatch on the value's actual runtime type, not the
    /// statically declared property type.
    fn write_class(&self, declared: MappingId, cx: &mut WriteContext, handle: &ObjectHandle) -> Value {
        let tag = handle.type_tag();

        match self.mapping_for_tag(&tag) {
            Some(concrete) if self.descends_from(concrete, declared) => {
                let mut doc = Document::new();
                let class = self.get(concrete).as_class().expect("dispatch target is a class");
                if class.is_polymorphic() {
                    doc.insert(
                        class.discriminator_field.clone(),
                        class.discriminator_value.clone(),
                    );
                }
                self.write_properties(concrete, cx, handle, &mut doc);
                Value::Document(doc)
            }
            Some(_) => {
                cx.error(format!(
                    "type {} is not a subtype of {}",
                    tag,
                    self.get(declared).as_object().unwrap().type_tag
                ));
                Value::Null
            }
            // The runtime type is not mapped: write a discriminator
            // set-membership query over every known subtype instead of a
            // concrete discriminator, supporting query documents against a
            // superclass.
            None => {
                let class = self.get(declared).as_class().expect("declared is a class");
                let field = class.discriminator_field.clone();
                let mut doc = Document::new();
                let mut query = Document::new();
                query.insert(
                    "$in",
                    Value::Array(
                        self.discriminators_below(declared)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                doc.insert(field, query);
                self.write_properties(declared, cx, handle, &mut doc);
                Value::Document(doc)
            }
        }
    }

    fn write_elements(
        &self,
        element: MappingId,
        cx: &mut WriteContext,
        items: &[ObjectValue],
    ) -> Vec<Value> {
        let mut converted = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            cx.enter(index.to_string());
            converted.push(match item {
                // Collections normalize missing members to null.
                ObjectValue::Null => Value::Null,
                item => self.write(element, cx, item),
            });
            cx.exit();
        }
        converted
    }
}

/// Identifier values cross to the document side in their natural shapes.
pub(super) fn id_to_doc(value: &ObjectValue) -> Option<Value> {
    match value {
        ObjectValue::String(v) => Some(Value::String(v.clone())),
        ObjectValue::I64(v) => Some(Value::I64(*v)),
        ObjectValue::Binary(v) => Some(Value::Binary(v.clone())),
        _ => None,
    }
}
