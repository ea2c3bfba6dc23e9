use crate::doc::{IdKey, Value};
use crate::mapping::MappingId;

/// A deferred pointer to an entity that has not been loaded: the entity's
/// root mapping plus its identifier. Produced when a document field holds an
/// identifier for an entity the session has not materialized.
#[derive(Debug, Clone)]
pub struct Reference {
    mapping: MappingId,
    id: Value,
}

impl Reference {
    pub fn new(mapping: MappingId, id: Value) -> Self {
        Reference { mapping, id }
    }

    /// The root mapping of the referenced entity type.
    pub fn mapping(&self) -> MappingId {
        self.mapping
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn id_key(&self) -> Option<IdKey> {
        self.id.id_key()
    }

    /// Two references point at the same entity iff they share a root mapping
    /// and carry the same identifier.
    pub fn same_target(&self, other: &Reference) -> bool {
        self.mapping == other.mapping && self.id.doc_eq(&other.id)
    }
}
