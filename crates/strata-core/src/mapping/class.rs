use super::{MappingId, ObjectMapping};

use std::collections::HashMap;

/// An object node that participates in an inheritance hierarchy: adds
/// discriminator-based dispatch on top of structural conversion.
#[derive(Debug)]
pub struct ClassMapping {
    pub object: ObjectMapping,

    /// Immediate base class, if any.
    pub base: Option<MappingId>,

    /// Every registered descendant, transitively. Subclasses register
    /// themselves with all ancestors during construction.
    pub subclasses: Vec<MappingId>,

    /// The hierarchy root (self for root nodes).
    pub root: MappingId,

    /// Stored field naming the concrete subtype.
    pub discriminator_field: String,

    /// This node's stored discriminator value. Defaults to the type name.
    pub discriminator_value: String,

    /// discriminator value -> node. Held only on the hierarchy root.
    pub discriminator_table: HashMap<String, MappingId>,
}

pub const DEFAULT_DISCRIMINATOR_FIELD: &str = "__t";

impl ClassMapping {
    pub fn new(object: ObjectMapping, root: MappingId, base: Option<MappingId>) -> Self {
        let discriminator_value = object.type_tag.as_str().to_string();
        ClassMapping {
            object,
            base,
            subclasses: Vec::new(),
            root,
            discriminator_field: DEFAULT_DISCRIMINATOR_FIELD.to_string(),
            discriminator_value,
            discriminator_table: HashMap::new(),
        }
    }

    /// True if this node sits in a hierarchy with more than one member, in
    /// which case documents must carry the discriminator.
    pub fn is_polymorphic(&self) -> bool {
        self.base.is_some() || !self.subclasses.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.base.is_none()
    }
}
