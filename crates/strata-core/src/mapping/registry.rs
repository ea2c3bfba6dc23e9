use super::{
    ArrayMapping, ClassMapping, ConverterMapping, EntityMapping, EntityPolicy, EnumMapping,
    Mapping, MappingId, MappingKind, ObjectMapping, Primitive, Property, ResolvedPath,
    SetMapping, TupleMapping,
};
use crate::object::TypeTag;
use crate::{bail, Result};

use std::cell::RefCell;
use std::collections::HashMap;

/// The immutable mapping tree: an arena of nodes addressed by
/// [`MappingId`], plus the runtime-type dispatch table. Built once by a
/// [`Builder`], then shared read-only by every session.
pub struct Registry {
    nodes: Vec<Mapping>,
    by_tag: HashMap<TypeTag, MappingId>,
    pub(super) resolve_cache: RefCell<HashMap<(MappingId, String), ResolvedPath>>,
}

impl Registry {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn get(&self, id: MappingId) -> &Mapping {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node registered for a runtime type, used for discriminator
    /// dispatch on write.
    pub fn mapping_for_tag(&self, tag: &TypeTag) -> Option<MappingId> {
        self.by_tag.get(tag).copied()
    }

    /// The hierarchy root of a class or entity node.
    pub fn hierarchy_root(&self, id: MappingId) -> MappingId {
        match self.get(id).as_class() {
            Some(class) => class.root,
            None => id,
        }
    }

    /// The persistence policy governing an entity node, held by its
    /// hierarchy root.
    pub fn policy(&self, id: MappingId) -> Option<&EntityPolicy> {
        let root = self.hierarchy_root(id);
        self.get(root).as_entity()?.policy.as_ref()
    }

    /// Declared properties including inherited ones, base classes first.
    pub fn properties(&self, id: MappingId) -> Vec<&Property> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            let node = self.get(node_id);
            chain.push(node_id);
            cursor = node.as_class().and_then(|class| class.base);
            if node.as_class().is_none() {
                break;
            }
        }

        let mut properties = Vec::new();
        for node_id in chain.iter().rev() {
            if let Some(object) = self.get(*node_id).as_object() {
                properties.extend(object.properties.iter());
            }
        }
        properties
    }

    /// The property reached by name, searching the node and its ancestors.
    pub fn property(&self, id: MappingId, name: &str) -> Option<&Property> {
        self.properties(id).into_iter().find(|p| p.name == name)
    }

    /// True if `descendant` is `ancestor` or sits below it in the hierarchy.
    pub fn descends_from(&self, descendant: MappingId, ancestor: MappingId) -> bool {
        if descendant == ancestor {
            return true;
        }
        self.get(ancestor)
            .as_class()
            .map(|class| class.subclasses.contains(&descendant))
            .unwrap_or(false)
    }

    /// Every discriminator value at or below the given node, used to write
    /// set-membership queries against a superclass.
    pub fn discriminators_below(&self, id: MappingId) -> Vec<String> {
        let Some(class) = self.get(id).as_class() else {
            return Vec::new();
        };
        let mut values = vec![class.discriminator_value.clone()];
        for sub in &class.subclasses {
            if let Some(sub_class) = self.get(*sub).as_class() {
                values.push(sub_class.discriminator_value.clone());
            }
        }
        values
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

/// Owns the node arena and the monotonic id counter for one build pass.
/// Drives bottom-up construction: subclasses register themselves with every
/// ancestor as they are added.
pub struct Builder {
    nodes: Vec<Mapping>,
    by_tag: HashMap<TypeTag, MappingId>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            nodes: Vec::new(),
            by_tag: HashMap::new(),
        }
    }

    fn alloc(&mut self, kind: MappingKind) -> MappingId {
        let id = MappingId(self.nodes.len());
        self.nodes.push(Mapping { id, kind });
        id
    }

    pub fn primitive(&mut self, primitive: Primitive) -> MappingId {
        self.alloc(MappingKind::Primitive(primitive))
    }

    pub fn enumeration(&mut self, mapping: EnumMapping) -> MappingId {
        self.alloc(MappingKind::Enum(mapping))
    }

    pub fn converter(&mut self, mapping: ConverterMapping) -> MappingId {
        self.alloc(MappingKind::Converter(mapping))
    }

    pub fn array(&mut self, element: MappingId) -> MappingId {
        self.alloc(MappingKind::Array(ArrayMapping { element }))
    }

    pub fn set(&mut self, element: MappingId) -> MappingId {
        self.alloc(MappingKind::Set(SetMapping { element }))
    }

    pub fn tuple(&mut self, elements: Vec<MappingId>) -> MappingId {
        self.alloc(MappingKind::Tuple(TupleMapping { elements }))
    }

    pub fn virtual_id(&mut self) -> MappingId {
        self.alloc(MappingKind::VirtualId)
    }

    /// An embeddable object: serialized inline, no identity, no hierarchy.
    pub fn embeddable(&mut self, tag: impl Into<TypeTag>) -> MappingId {
        let tag = tag.into();
        let id = self.alloc(MappingKind::Object(ObjectMapping::new(tag.clone())));
        self.by_tag.insert(tag, id);
        id
    }

    /// An embeddable class at the root of an inheritance hierarchy.
    pub fn class(&mut self, tag: impl Into<TypeTag>) -> MappingId {
        self.class_node(tag.into(), None)
    }

    /// A subclass of an existing class or entity node.
    pub fn subclass(&mut self, tag: impl Into<TypeTag>, base: MappingId) -> MappingId {
        let tag = tag.into();
        match &self.nodes[base.0].kind {
            MappingKind::Class(_) => self.class_node(tag, Some(base)),
            MappingKind::Entity(_) => self.entity_node(tag, Some(base), None),
            _ => panic!("subclass base must be a class or entity node"),
        }
    }

    /// An entity hierarchy root carrying the persistence policy.
    pub fn entity(&mut self, tag: impl Into<TypeTag>, policy: EntityPolicy) -> MappingId {
        self.entity_node(tag.into(), None, Some(policy))
    }

    fn class_node(&mut self, tag: TypeTag, base: Option<MappingId>) -> MappingId {
        let id = MappingId(self.nodes.len());
        let root = self.root_of(base).unwrap_or(id);
        let class = ClassMapping::new(ObjectMapping::new(tag.clone()), root, base);
        self.alloc(MappingKind::Class(class));
        self.register(tag, id, base);
        id
    }

    fn entity_node(
        &mut self,
        tag: TypeTag,
        base: Option<MappingId>,
        policy: Option<EntityPolicy>,
    ) -> MappingId {
        let id = MappingId(self.nodes.len());
        let root = self.root_of(base).unwrap_or(id);
        let class = ClassMapping::new(ObjectMapping::new(tag.clone()), root, base);

        let id_property = policy.as_ref().map(|p| p.id_property.clone());
        self.alloc(MappingKind::Entity(EntityMapping::new(class, policy)));
        self.register(tag, id, base);

        // The identifier surfaces as a read-only virtual property on the
        // root.
        if let Some(id_property) = id_property {
            let virtual_id = self.virtual_id();
            self.add_property(
                id,
                Property::new(id_property, virtual_id)
                    .field(super::entity::ID_FIELD)
                    .read_only(),
            );
        }

        id
    }

    fn root_of(&self, base: Option<MappingId>) -> Option<MappingId> {
        base.map(|base| {
            self.nodes[base.0]
                .as_class()
                .map(|class| class.root)
                .expect("base must be a class or entity node")
        })
    }

    fn register(&mut self, tag: TypeTag, id: MappingId, base: Option<MappingId>) {
        self.by_tag.insert(tag, id);

        // Register with every ancestor.
        let mut cursor = base;
        while let Some(ancestor) = cursor {
            let class = self
                .class_mut(ancestor)
                .expect("ancestor must be a class or entity node");
            class.subclasses.push(id);
            cursor = class.base;
        }
    }

    pub fn add_property(&mut self, owner: MappingId, property: Property) {
        let object = self
            .object_mut(owner)
            .expect("properties can only be added to object-shaped nodes");
        object.properties.push(property);
    }

    /// Overrides the stored discriminator value for a class or entity node.
    pub fn discriminator_value(&mut self, id: MappingId, value: impl Into<String>) {
        self.class_mut(id)
            .expect("discriminator values apply to class or entity nodes")
            .discriminator_value = value.into();
    }

    /// Overrides the discriminator field name for a hierarchy. Applies to
    /// the root; descendants inherit it at build time.
    pub fn discriminator_field(&mut self, root: MappingId, field: impl Into<String>) {
        let class = self
            .class_mut(root)
            .expect("discriminator fields apply to class or entity nodes");
        assert!(class.is_root(), "discriminator field is set on the root");
        class.discriminator_field = field.into();
    }

    fn object_mut(&mut self, id: MappingId) -> Option<&mut ObjectMapping> {
        match &mut self.nodes[id.0].kind {
            MappingKind::Object(object) => Some(object),
            MappingKind::Class(class) => Some(&mut class.object),
            MappingKind::Entity(entity) => Some(&mut entity.class.object),
            _ => None,
        }
    }

    fn class_mut(&mut self, id: MappingId) -> Option<&mut ClassMapping> {
        match &mut self.nodes[id.0].kind {
            MappingKind::Class(class) => Some(class),
            MappingKind::Entity(entity) => Some(&mut entity.class),
            _ => None,
        }
    }

    /// Freezes the arena: populates each root's discriminator table,
    /// propagates the root's discriminator field, and verifies every entity
    /// root is fully populated.
    pub fn build(mut self) -> Result<Registry> {
        let ids: Vec<MappingId> = self.nodes.iter().map(|node| node.id).collect();

        // Discriminator field is hierarchy-wide; copy down from the root.
        for id in &ids {
            let Some(class) = self.nodes[id.0].as_class() else {
                continue;
            };
            if class.is_root() {
                continue;
            }
            let field = self.nodes[class.root.0]
                .as_class()
                .expect("hierarchy root must be a class")
                .discriminator_field
                .clone();
            self.class_mut(*id).unwrap().discriminator_field = field;
        }

        // Discriminator values are unique across an entire hierarchy; the
        // root is the sole holder of the lookup table.
        for id in &ids {
            let Some(class) = self.nodes[id.0].as_class() else {
                continue;
            };
            if !class.is_root() {
                continue;
            }
            let mut members = vec![*id];
            members.extend(class.subclasses.iter().copied());

            let mut table = HashMap::new();
            for member in members {
                let value = self.nodes[member.0]
                    .as_class()
                    .expect("hierarchy member must be a class")
                    .discriminator_value
                    .clone();
                if table.insert(value.clone(), member).is_some() {
                    bail!(
                        "duplicate discriminator value {:?} in hierarchy rooted at {:?}",
                        value,
                        self.nodes[id.0].as_object().unwrap().type_tag.as_str()
                    );
                }
            }
            self.class_mut(*id).unwrap().discriminator_table = table;
        }

        // Entity invariants: roots carry policy, subclasses do not.
        for node in &self.nodes {
            if let MappingKind::Entity(entity) = &node.kind {
                if entity.class.is_root() && entity.policy.is_none() {
                    bail!(
                        "entity root {:?} is missing its persistence policy",
                        entity.class.object.type_tag.as_str()
                    );
                }
                if !entity.class.is_root() && entity.policy.is_some() {
                    bail!(
                        "entity subclass {:?} must not carry a persistence policy",
                        entity.class.object.type_tag.as_str()
                    );
                }
            }
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            types = self.by_tag.len(),
            "mapping registry built"
        );

        Ok(Registry {
            nodes: self.nodes,
            by_tag: self.by_tag,
            resolve_cache: RefCell::new(HashMap::new()),
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut builder = Builder::new();
        let a = builder.primitive(Primitive::String);
        let b = builder.primitive(Primitive::Integer);
        let c = builder.embeddable("Address");
        assert_eq!((a, b, c), (MappingId(0), MappingId(1), MappingId(2)));
    }

    #[test]
    fn subclass_registers_with_every_ancestor() {
        let mut builder = Builder::new();
        let root = builder.entity("Animal", EntityPolicy::new("animals"));
        let cat = builder.subclass("Cat", root);
        let lion = builder.subclass("Lion", cat);

        let registry = builder.build().unwrap();
        let root_class = registry.get(root).as_class().unwrap();
        assert_eq!(root_class.subclasses, vec![cat, lion]);
        let cat_class = registry.get(cat).as_class().unwrap();
        assert_eq!(cat_class.subclasses, vec![lion]);
        assert_eq!(registry.hierarchy_root(lion), root);
    }

    #[test]
    fn duplicate_discriminator_is_rejected() {
        let mut builder = Builder::new();
        let root = builder.entity("Animal", EntityPolicy::new("animals"));
        let cat = builder.subclass("Cat", root);
        builder.discriminator_value(cat, "Animal");

        assert!(builder.build().is_err());
    }

    #[test]
    fn discriminator_field_propagates_to_subclasses() {
        let mut builder = Builder::new();
        let root = builder.entity("Animal", EntityPolicy::new("animals"));
        builder.discriminator_field(root, "kind");
        let cat = builder.subclass("Cat", root);

        let registry = builder.build().unwrap();
        assert_eq!(
            registry.get(cat).as_class().unwrap().discriminator_field,
            "kind"
        );
    }

    #[test]
    fn policy_resolves_through_root() {
        let mut builder = Builder::new();
        let root = builder.entity("Animal", EntityPolicy::new("animals"));
        let cat = builder.subclass("Cat", root);

        let registry = builder.build().unwrap();
        assert_eq!(registry.policy(cat).unwrap().collection, "animals");
    }
}
