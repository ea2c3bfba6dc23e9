use super::ClassMapping;
use crate::identity::IdentityGenerator;

use std::rc::Rc;

pub const DEFAULT_VERSION_FIELD: &str = "__v";
pub const ID_FIELD: &str = "_id";

/// A class node backed by its own documents. Only the hierarchy root
/// carries the persistence policy; subclasses resolve it through the root.
#[derive(Debug)]
pub struct EntityMapping {
    pub class: ClassMapping,
    pub policy: Option<EntityPolicy>,
}

/// Persistence policy for one entity hierarchy.
pub struct EntityPolicy {
    /// Target collection for every member of the hierarchy.
    pub collection: String,

    /// The object-side property holding the identifier.
    pub id_property: String,

    pub generator: Rc<dyn IdentityGenerator>,

    pub tracking: ChangeTracking,

    /// Optimistic concurrency: stored documents carry a version counter and
    /// updates match against the version last read.
    pub versioned: bool,
    pub version_field: String,

    pub indexes: Vec<IndexSpec>,
}

/// When a managed object is re-serialized and diffed at flush time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTracking {
    /// Every managed object is dirty-checked at flush, whether or not
    /// `persist` was called again.
    DeferredImplicit,
    /// Only objects re-persisted since load are dirty-checked.
    DeferredExplicit,
    /// Mutation is detected as it happens via the one-shot change observer
    /// attached during read.
    Observed,
}

/// A declared index on the root collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// (field, direction) pairs; direction is 1 or -1.
    pub keys: Vec<(String, i32)>,
    pub unique: bool,
}

impl EntityMapping {
    pub fn new(class: ClassMapping, policy: Option<EntityPolicy>) -> Self {
        EntityMapping { class, policy }
    }
}

impl EntityPolicy {
    pub fn new(collection: impl Into<String>) -> Self {
        EntityPolicy {
            collection: collection.into(),
            id_property: "id".to_string(),
            generator: Rc::new(crate::identity::UuidGenerator),
            tracking: ChangeTracking::DeferredImplicit,
            versioned: false,
            version_field: DEFAULT_VERSION_FIELD.to_string(),
            indexes: Vec::new(),
        }
    }

    pub fn id_property(mut self, property: impl Into<String>) -> Self {
        self.id_property = property.into();
        self
    }

    pub fn generator(mut self, generator: Rc<dyn IdentityGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn tracking(mut self, tracking: ChangeTracking) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    pub fn version_field(mut self, field: impl Into<String>) -> Self {
        self.version_field = field.into();
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

impl core::fmt::Debug for EntityPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EntityPolicy")
            .field("collection", &self.collection)
            .field("id_property", &self.id_property)
            .field("tracking", &self.tracking)
            .field("versioned", &self.versioned)
            .field("version_field", &self.version_field)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}
