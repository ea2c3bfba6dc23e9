use super::{CascadeOp, MappingId, MappingKind, Registry};
use crate::object::{HandleKey, ObjectHandle, ObjectValue, Reference};

/// Controls a traversal: which session operation is being cascaded, and
/// whether the walk crosses entity boundaries.
#[derive(Debug, Clone, Copy)]
pub struct WalkFlags {
    pub op: CascadeOp,

    /// Nested entity boundaries stop traversal unless set, preventing
    /// unbounded graph walks by default. The walked value's own properties
    /// are always traversed.
    pub walk_entities: bool,
}

/// Reachable values classified by a walk.
#[derive(Default)]
pub struct Classified {
    /// Entities reached through cascading properties, with their concrete
    /// mapping node.
    pub entities: Vec<(MappingId, ObjectHandle)>,

    /// Embedded (identity-less) objects.
    pub embedded: Vec<ObjectHandle>,

    /// Unresolved entity pointers.
    pub references: Vec<Reference>,

    visited: Vec<HandleKey>,
}

impl Classified {
    pub fn new() -> Self {
        Self::default()
    }

    fn visit(&mut self, handle: &ObjectHandle) -> bool {
        let key = handle.key();
        if self.visited.contains(&key) {
            return false;
        }
        self.visited.push(key);
        true
    }
}

impl Registry {
    /// Depth-first classification of every value reachable from `value`
    /// under this node, honoring per-property cascade flags.
    pub fn walk(&self, id: MappingId, value: &ObjectValue, flags: WalkFlags, out: &mut Classified) {
        self.walk_value(id, value, flags, true, true, out);
    }

    fn walk_value(
        &self,
        id: MappingId,
        value: &ObjectValue,
        flags: WalkFlags,
        cascade_ok: bool,
        root: bool,
        out: &mut Classified,
    ) {
        match &self.get(id).kind {
            MappingKind::Entity(_) => match value {
                // Entities participate only when the property leading here
                // cascades the walk's operation.
                ObjectValue::Object(handle) if cascade_ok => {
                    if !out.visit(handle) {
                        return;
                    }
                    let concrete = self.concrete_for(handle, id);
                    out.entities.push((concrete, handle.clone()));
                    // The entity-boundary gate applies to nested entities,
                    // not the value the walk started from.
                    if root || flags.walk_entities {
                        self.walk_properties(concrete, handle, flags, out);
                    }
                }
                ObjectValue::Reference(reference) if cascade_ok => {
                    out.references.push(reference.clone());
                }
                _ => {}
            },

            MappingKind::Object(_) | MappingKind::Class(_) => {
                if let ObjectValue::Object(handle) = value {
                    if !out.visit(handle) {
                        return;
                    }
                    out.embedded.push(handle.clone());
                    let concrete = self.concrete_for(handle, id);
                    self.walk_properties(concrete, handle, flags, out);
                }
            }

            MappingKind::Array(mapping) => {
                if let ObjectValue::Array(items) = value {
                    for item in items {
                        self.walk_value(mapping.element, item, flags, cascade_ok, root, out);
                    }
                }
            }

            MappingKind::Set(mapping) => {
                if let ObjectValue::Set(items) = value {
                    for item in items {
                        self.walk_value(mapping.element, item, flags, cascade_ok, root, out);
                    }
                }
            }

            MappingKind::Tuple(mapping) => {
                if let ObjectValue::Array(items) = value {
                    for (element, item) in mapping.elements.iter().zip(items) {
                        self.walk_value(*element, item, flags, cascade_ok, root, out);
                    }
                }
            }

            _ => {}
        }
    }

    fn walk_properties(
        &self,
        id: MappingId,
        handle: &ObjectHandle,
        flags: WalkFlags,
        out: &mut Classified,
    ) {
        for property in self.properties(id) {
            if property.ignored || property.parent_reference {
                continue;
            }
            let value = handle.get(&property.name);
            if value.is_null() {
                continue;
            }
            let cascade_ok = property.cascade.allows(flags.op);
            self.walk_value(property.mapping, &value, flags, cascade_ok, false, out);
        }
    }

    /// Runtime dispatch for traversal: the handle's tag wins when it names
    /// a subtype of the declared node.
    pub(super) fn concrete_for(&self, handle: &ObjectHandle, declared: MappingId) -> MappingId {
        match self.mapping_for_tag(&handle.type_tag()) {
            Some(node) if self.descends_from(node, declared) => node,
            _ => declared,
        }
    }
}
