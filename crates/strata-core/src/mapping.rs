mod class;
pub use class::{ClassMapping, DEFAULT_DISCRIMINATOR_FIELD};

mod context;
pub use context::{ReadContext, WriteContext};

mod convert;
pub use convert::{ConverterMapping, PropertyConverter};

mod entity;
pub use entity::{
    ChangeTracking, EntityMapping, EntityPolicy, IndexSpec, DEFAULT_VERSION_FIELD, ID_FIELD,
};

mod enumerated;
pub use enumerated::{EnumMapping, EnumRepr};

mod equality;

mod fetch;
pub use fetch::Loader;

mod object;
pub use object::ObjectMapping;

mod primitive;
pub use primitive::Primitive;

mod property;
pub use property::{Cascade, CascadeOp, Property};

mod read;
mod write;

mod registry;
pub use registry::{Builder, Registry};

mod resolve;
pub use resolve::ResolvedPath;

mod sequence;
pub use sequence::{ArrayMapping, SetMapping, TupleMapping};

mod walk;
pub use walk::{Classified, WalkFlags};


/// Identifies a mapping node within its [`Registry`]. Assigned once,
/// monotonically, by the [`Builder`] that owns the arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MappingId(pub usize);

/// One node of the mapping tree: a conversion strategy for one shape of
/// value. Built once, immutable thereafter, shared by all sessions.
#[derive(Debug)]
pub struct Mapping {
    pub id: MappingId,
    pub kind: MappingKind,
}

#[derive(Debug)]
pub enum MappingKind {
    Primitive(Primitive),
    Enum(EnumMapping),
    Converter(ConverterMapping),
    /// An embeddable object, serialized inline.
    Object(ObjectMapping),
    /// An object participating in an inheritance hierarchy.
    Class(ClassMapping),
    /// A document-backed, identity-bearing object.
    Entity(EntityMapping),
    Array(ArrayMapping),
    Set(SetMapping),
    Tuple(TupleMapping),
    /// Read-only, computed from the owning document's identifier.
    VirtualId,
}

impl Mapping {
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, MappingKind::Entity(_))
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, MappingKind::VirtualId)
    }

    /// The object-shaped payload shared by Object, Class and Entity nodes.
    pub fn as_object(&self) -> Option<&ObjectMapping> {
        match &self.kind {
            MappingKind::Object(object) => Some(object),
            MappingKind::Class(class) => Some(&class.object),
            MappingKind::Entity(entity) => Some(&entity.class.object),
            _ => None,
        }
    }

    /// The class payload shared by Class and Entity nodes.
    pub fn as_class(&self) -> Option<&ClassMapping> {
        match &self.kind {
            MappingKind::Class(class) => Some(class),
            MappingKind::Entity(entity) => Some(&entity.class),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityMapping> {
        match &self.kind {
            MappingKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}
