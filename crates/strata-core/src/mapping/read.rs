use super::{MappingId, MappingKind, ReadContext, Registry};
use crate::doc::{Document, Value};
use crate::object::{ChangeObserver, ObjectHandle, ObjectValue, Reference};
use crate::{Error, Result};

impl Registry {
    /// Materializes a full entity from one of its root documents,
    /// dispatching on the stored discriminator. Validation errors are
    /// aggregated over the whole pass; a missing identifier or an unknown
    /// discriminator fails the conversion outright.
    pub fn read_document(
        &self,
        declared: MappingId,
        doc: &Document,
        observer: Option<ChangeObserver>,
    ) -> Result<ObjectHandle> {
        let policy = self
            .policy(declared)
            .ok_or_else(|| Error::precondition("read_document requires an entity mapping"))?;

        let id = doc
            .get(super::entity::ID_FIELD)
            .ok_or_else(|| Error::consistency("document is missing its identifier"))?;
        if !policy.generator.validate(id) {
            return Err(Error::consistency(format!(
                "identifier {:?} failed the configured generator's validation",
                id
            )));
        }

        let concrete = self.dispatch_read(declared, doc)?;

        let mut cx = match observer {
            Some(observer) => ReadContext::with_observer(observer),
            None => ReadContext::new(),
        };
        cx.set_entity_id(id.clone());

        let handle = self.read_object(concrete, &mut cx, doc);

        if cx.has_errors() {
            return Err(Error::validation(cx.into_errors()));
        }
        Ok(handle)
    }

    /// Selects the concrete node for a document of declared type `id` from
    /// the hierarchy root's discriminator table.
    pub(super) fn dispatch_read(&self, id: MappingId, doc: &Document) -> Result<MappingId> {
        let Some(class) = self.get(id).as_class() else {
            return Ok(id);
        };

        match doc.get(&class.discriminator_field) {
            None => {
                if class.is_polymorphic() {
                    Err(Error::consistency(format!(
                        "document is missing discriminator field {:?}",
                        class.discriminator_field
                    )))
                } else {
                    // Absent discriminator on a non-polymorphic read is fine.
                    Ok(id)
                }
            }
            Some(Value::String(value)) => {
                let root = self.get(class.root).as_class().expect("root is a class");
                match root.discriminator_table.get(value) {
                    Some(concrete) if self.descends_from(*concrete, id) => Ok(*concrete),
                    Some(_) => Err(Error::consistency(format!(
                        "discriminator {:?} does not name a subtype of {}",
                        value,
                        class.object.type_tag
                    ))),
                    None => Err(Error::consistency(format!(
                        "unknown discriminator value {:?}",
                        value
                    ))),
                }
            }
            Some(other) => Err(Error::consistency(format!(
                "discriminator field {:?} must hold a string, got {}",
                class.discriminator_field,
                other.shape()
            ))),
        }
    }

    /// Structural property-by-property materialization.
    pub(super) fn read_object(
        &self,
        id: MappingId,
        cx: &mut ReadContext,
        doc: &Document,
    ) -> ObjectHandle {
        let type_tag = self
            .get(id)
            .as_object()
            .expect("read_object requires an object-shaped node")
            .type_tag
            .clone();

        let handle = ObjectHandle::new(type_tag);
        cx.observe(&handle);
        cx.push_parent(handle.clone());

        for property in self.properties(id) {
            if property.ignored {
                continue;
            }

            cx.enter(&property.name);

            if property.parent_reference {
                // Populated from the traversal context, not the document.
                if let Some(parent) = cx.parent() {
                    handle.load(&property.name, parent.clone());
                }
            } else if property.inverse_of.is_some() {
                // Not stored on this side; resolved lazily through fetch.
            } else {
                match doc.get(&property.field) {
                    None => {}
                    Some(Value::Null) => {
                        if property.nullable {
                            handle.load(&property.name, ObjectValue::Null);
                        }
                    }
                    Some(value) => {
                        let converted = self.read(property.mapping, cx, value);
                        handle.load(&property.name, converted);
                    }
                }
            }

            cx.exit();
        }

        cx.pop_parent();
        handle
    }

    /// Converts one document value into its in-memory form. Shape
    /// mismatches are recorded on the context and yield `Null`.
    pub fn read(&self, id: MappingId, cx: &mut ReadContext, value: &Value) -> ObjectValue {
        match &self.get(id).kind {
            MappingKind::Primitive(primitive) => match primitive.read(value) {
                Some(converted) => converted,
                None => {
                    cx.error(format!(
                        "expected {}, got {}",
                        primitive.name(),
                        value.shape()
                    ));
                    ObjectValue::Null
                }
            }

            MappingKind::Enum(mapping) => match mapping.read(value) {
                Ok(converted) => converted,
                Err(message) => {
                    cx.error(message);
                    ObjectValue::Null
                }
            }

            MappingKind::Converter(mapping) => match mapping.converter.to_property(value) {
                Ok(converted) => converted,
                Err(err) => {
                    cx.error(err.to_string());
                    ObjectValue::Null
                }
            }

            MappingKind::Object(_) => match value {
                Value::Document(doc) => ObjectValue::Object(self.read_object(id, cx, doc)),
                other => {
                    cx.error(format!("expected document, got {}", other.shape()));
                    ObjectValue::Null
                }
            },

            MappingKind::Class(_) => match value {
                Value::Document(doc) => match self.dispatch_read(id, doc) {
                    Ok(concrete) => ObjectValue::Object(self.read_object(concrete, cx, doc)),
                    Err(err) => {
                        cx.error(err.to_string());
                        ObjectValue::Null
                    }
                },
                other => {
                    cx.error(format!("expected document, got {}", other.shape()));
                    ObjectValue::Null
                }
            },

            // Nested entities are stored as bare identifiers; produce a
            // reference instead of recursing.
            MappingKind::Entity(_) => {
                if value.id_key().is_some() {
                    ObjectValue::Reference(Reference::new(self.hierarchy_root(id), value.clone()))
                } else {
                    cx.error(format!(
                        "expected an entity identifier, got {}",
                        value.shape()
                    ));
                    ObjectValue::Null
                }
            }

            MappingKind::Array(mapping) => match value {
                Value::Array(items) => {
                    let element = mapping.element;
                    ObjectValue::Array(self.read_elements(element, cx, items))
                }
                other => {
                    cx.error(format!("expected array, got {}", other.shape()));
                    ObjectValue::Null
                }
            },

            MappingKind::Set(mapping) => match value {
                Value::Array(items) => {
                    let element = mapping.element;
                    let mut converted = self.read_elements(element, cx, items);
                    // Sets deduplicate on read.
                    let mut deduped: Vec<ObjectValue> = Vec::with_capacity(converted.len());
                    for item in converted.drain(..) {
                        if !deduped.contains(&item) {
                            deduped.push(item);
                        }
                    }
                    ObjectValue::Set(deduped)
                }
                other => {
                    cx.error(format!("expected array, got {}", other.shape()));
                    ObjectValue::Null
                }
            },

            MappingKind::Tuple(mapping) => match value {
                Value::Array(items) if items.len() == mapping.elements.len() => {
                    let elements = mapping.elements.clone();
                    let mut converted = Vec::with_capacity(items.len());
                    for (index, (element, item)) in elements.iter().zip(items).enumerate() {
                        cx.enter(index.to_string());
                        converted.push(self.read(*element, cx, item));
                        cx.exit();
                    }
                    ObjectValue::Array(converted)
                }
                Value::Array(items) => {
                    cx.error(format!(
                        "expected tuple of {} elements, got {}",
                        mapping.elements.len(),
                        items.len()
                    ));
                    ObjectValue::Null
                }
                other => {
                    cx.error(format!("expected array, got {}", other.shape()));
                    ObjectValue::Null
                }
            },

            // Computed from the owning document's identifier.
            MappingKind::VirtualId => match cx.entity_id() {
                Some(id) => id_to_object(id).unwrap_or(ObjectValue::Null),
                None => ObjectValue::Null,
            },
        }
    }

    fn read_elements(
        &self,
        element: MappingId,
        cx: &mut ReadContext,
        items: &[Value],
    ) -> Vec<ObjectValue> {
        let mut converted = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            cx.enter(index.to_string());
            converted.push(match item {
                Value::Null => ObjectValue::Null,
                item => self.read(element, cx, item),
            });
            cx.exit();
        }
        converted
    }
}

/// Identifier values surface on the object side in their natural shapes.
pub(super) fn id_to_object(id: &Value) -> Option<ObjectValue> {
    match id {
        Value::String(v) => Some(ObjectValue::String(v.clone())),
        Value::I64(v) => Some(ObjectValue::I64(*v)),
        Value::Binary(v) => Some(ObjectValue::Binary(v.clone())),
        _ => None,
    }
}
