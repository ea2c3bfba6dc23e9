use super::{MappingId, MappingKind, Registry};
use crate::{bail, Result};

/// The positional-match token accepted inside array paths.
pub const POSITIONAL: &str = "$";

/// The outcome of resolving a dotted property path: the leaf mapping and
/// the fully resolved document field path (which may differ from the
/// property path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub mapping: MappingId,
    pub field_path: String,
}

impl Registry {
    /// Walks a dotted property path one segment at a time against the
    /// mapping tree. Resolution is deterministic per (node, path), so
    /// results are memoized.
    pub fn resolve(&self, id: MappingId, path: &str) -> Result<ResolvedPath> {
        let key = (id, path.to_string());
        if let Some(resolved) = self.resolve_cache.borrow().get(&key) {
            return Ok(resolved.clone());
        }

        let resolved = self.resolve_uncached(id, path)?;
        self.resolve_cache
            .borrow_mut()
            .insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(&self, id: MappingId, path: &str) -> Result<ResolvedPath> {
        let mut cursor = id;
        let mut fields: Vec<String> = Vec::new();
        for segment in path.split('.') {
            match &self.get(cursor).kind {
                MappingKind::Object(_) | MappingKind::Class(_) => {
                    let Some(property) = self.property(cursor, segment) else {
                        bail!("unknown property {:?} in path {:?}", segment, path);
                    };
                    fields.push(property.field.clone());
                    cursor = property.mapping;
                }

                MappingKind::Entity(_) => {
                    if fields.is_empty() {
                        // Path rooted at the entity itself.
                        let Some(property) = self.property(cursor, segment) else {
                            bail!("unknown property {:?} in path {:?}", segment, path);
                        };
                        fields.push(property.field.clone());
                        cursor = property.mapping;
                    } else {
                        // Nested entities are stored by identifier; the path
                        // cannot continue into another document.
                        bail!(
                            "path {:?} crosses an entity boundary at {:?}",
                            path,
                            segment
                        );
                    }
                }

                MappingKind::Array(_) | MappingKind::Set(_) => {
                    let element = match &self.get(cursor).kind {
                        MappingKind::Array(m) => m.element,
                        MappingKind::Set(m) => m.element,
                        _ => unreachable!(),
                    };
                    if segment == POSITIONAL || segment.parse::<usize>().is_ok() {
                        fields.push(segment.to_string());
                        cursor = element;
                    } else {
                        // Implicit traversal: the segment applies to the
                        // element type without consuming an index.
                        let resolved = self.resolve_segmented(element, segment)?;
                        fields.push(resolved.0);
                        cursor = resolved.1;
                    }
                }

                MappingKind::Tuple(mapping) => {
                    let Ok(index) = segment.parse::<usize>() else {
                        bail!("tuple paths use numeric indices, got {:?}", segment);
                    };
                    let Some(element) = mapping.elements.get(index).copied() else {
                        bail!("tuple index {} out of bounds in path {:?}", index, path);
                    };
                    fields.push(segment.to_string());
                    cursor = element;
                }

                _ => bail!(
                    "cannot resolve {:?} through a terminal mapping in path {:?}",
                    segment,
                    path
                ),
            }
        }

        Ok(ResolvedPath {
            mapping: cursor,
            field_path: fields.join("."),
        })
    }

    fn resolve_segmented(&self, element: MappingId, segment: &str) -> Result<(String, MappingId)> {
        let Some(property) = self.property(element, segment) else {
            bail!("unknown property {:?} on collection element", segment);
        };
        Ok((property.field.clone(), property.mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Builder, EntityPolicy, Primitive, Property};

    fn fixture() -> (Registry, MappingId) {
        let mut builder = Builder::new();
        let string = builder.primitive(Primitive::String);
        let address = builder.embeddable("Address");
        builder.add_property(address, Property::new("city", string).field("c"));
        let addresses = builder.array(address);

        let person = builder.entity("Person", EntityPolicy::new("people"));
        builder.add_property(person, Property::new("name", string));
        builder.add_property(person, Property::new("addresses", addresses));

        let registry = builder.build().unwrap();
        (registry, person)
    }

    #[test]
    fn resolves_field_renames() {
        let (registry, person) = fixture();
        let resolved = registry.resolve(person, "addresses.0.city").unwrap();
        assert_eq!(resolved.field_path, "addresses.0.c");
    }

    #[test]
    fn positional_token() {
        let (registry, person) = fixture();
        let resolved = registry.resolve(person, "addresses.$.city").unwrap();
        assert_eq!(resolved.field_path, "addresses.$.c");
    }

    #[test]
    fn implicit_array_traversal() {
        let (registry, person) = fixture();
        let resolved = registry.resolve(person, "addresses.city").unwrap();
        assert_eq!(resolved.field_path, "addresses.c");
    }

    #[test]
    fn unknown_property_is_an_error() {
        let (registry, person) = fixture();
        assert!(registry.resolve(person, "missing").is_err());
    }

    #[test]
    fn results_are_memoized() {
        let (registry, person) = fixture();
        registry.resolve(person, "name").unwrap();
        assert!(registry
            .resolve_cache
            .borrow()
            .contains_key(&(person, "name".to_string())));
    }
}
