use super::MappingId;

/// A named object member bound to a document field. Added once during
/// mapping-tree construction.
#[derive(Debug, Clone)]
pub struct Property {
    /// The object-side member name.
    pub name: String,

    /// The document-side field name. Defaults to the member name.
    pub field: String,

    /// Conversion strategy for the member's value.
    pub mapping: MappingId,

    /// Null is stored and materialized for this member; otherwise null is
    /// treated as absence.
    pub nullable: bool,

    /// Never converted in either direction.
    pub ignored: bool,

    /// Read from the document but never written back.
    pub read_only: bool,

    /// The non-owning side of a relationship: not stored here, loaded by
    /// querying the named property on the target entity.
    pub inverse_of: Option<String>,

    /// Populated from the traversal context (the owning object), never from
    /// the document.
    pub parent_reference: bool,

    /// Which session operations propagate through this member.
    pub cascade: Cascade,
}

impl Property {
    pub fn new(name: impl Into<String>, mapping: MappingId) -> Self {
        let name = name.into();
        Property {
            field: name.clone(),
            name,
            mapping,
            nullable: false,
            ignored: false,
            read_only: false,
            inverse_of: None,
            parent_reference: false,
            cascade: Cascade::NONE,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn inverse_of(mut self, target_property: impl Into<String>) -> Self {
        self.inverse_of = Some(target_property.into());
        self
    }

    pub fn parent_reference(mut self) -> Self {
        self.parent_reference = true;
        self
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }
}

/// Per-property cascade flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cascade {
    pub save: bool,
    pub remove: bool,
    pub detach: bool,
}

impl Cascade {
    pub const NONE: Cascade = Cascade {
        save: false,
        remove: false,
        detach: false,
    };

    pub const ALL: Cascade = Cascade {
        save: true,
        remove: true,
        detach: true,
    };

    pub const SAVE: Cascade = Cascade {
        save: true,
        remove: false,
        detach: false,
    };

    pub fn allows(&self, op: CascadeOp) -> bool {
        match op {
            CascadeOp::Save => self.save,
            CascadeOp::Remove => self.remove,
            CascadeOp::Detach => self.detach,
        }
    }
}

/// The session operation being cascaded through a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOp {
    Save,
    Remove,
    Detach,
}
