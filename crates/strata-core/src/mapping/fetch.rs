use super::{MappingId, MappingKind, Registry};
use crate::doc::Value;
use crate::object::{ObjectValue, Reference};
use crate::{async_trait, bail, Error, Result};

use async_recursion::async_recursion;

/// Resolves deferred values during a fetch: point loads for references and
/// filtered queries for inverse-side relationships. Implemented by the
/// session.
#[async_trait(?Send)]
pub trait Loader {
    /// Loads the referenced entity, consulting the identity map first.
    async fn load(&self, reference: &Reference) -> Result<ObjectValue>;

    /// Loads the non-owning side of a relationship by querying `field` on
    /// the target root's collection for the owning entity's identifier.
    async fn load_inverse(
        &self,
        target: MappingId,
        field: &str,
        id: &Value,
        many: bool,
    ) -> Result<ObjectValue>;
}

impl Registry {
    /// Resolves one dotted property path against a value, loading lazy
    /// references and inverse-side relationships segment by segment.
    /// Loaded values are written back onto the objects they were reached
    /// through, so repeated fetches hit memory.
    #[async_recursion(?Send)]
    pub async fn fetch(
        &self,
        loader: &dyn Loader,
        id: MappingId,
        value: ObjectValue,
        path: &str,
    ) -> Result<ObjectValue> {
        // Resolve a reference at the current position before descending.
        let value = match (&self.get(id).kind, value) {
            (MappingKind::Entity(_), ObjectValue::Reference(reference)) => {
                loader.load(&reference).await?
            }
            (_, value) => value,
        };

        if path.is_empty() {
            return Ok(value);
        }

        match &self.get(id).kind {
            MappingKind::Object(_) | MappingKind::Class(_) | MappingKind::Entity(_) => {
                let ObjectValue::Object(handle) = &value else {
                    bail!("cannot fetch {:?} through a {}", path, value.shape());
                };

                let (head, rest) = match path.split_once('.') {
                    Some((head, rest)) => (head, rest),
                    None => (path, ""),
                };

                let concrete = self.concrete_for(handle, id);
                let Some(property) = self.property(concrete, head).cloned() else {
                    bail!("unknown property {:?} in fetch path", head);
                };

                if let Some(inverse) = &property.inverse_of {
                    let Some(policy) = self.policy(concrete) else {
                        return Err(Error::precondition(
                            "inverse-side properties require an entity mapping",
                        ));
                    };
                    let Some(id_value) =
                        super::write::id_to_doc(&handle.get(&policy.id_property))
                    else {
                        return Err(Error::consistency(
                            "cannot fetch an inverse relationship before the identifier is assigned",
                        ));
                    };

                    let (target, many) = match &self.get(property.mapping).kind {
                        MappingKind::Array(m) => (m.element, true),
                        MappingKind::Set(m) => (m.element, true),
                        _ => (property.mapping, false),
                    };
                    let target_root = self.hierarchy_root(target);
                    let Some(owning) = self.property(target_root, inverse) else {
                        bail!(
                            "inverse property {:?} does not exist on the target entity",
                            inverse
                        );
                    };
                    let field = owning.field.clone();

                    let loaded = loader
                        .load_inverse(target_root, &field, &id_value, many)
                        .await?;
                    // Loaders answer multi-valued loads with an array; a
                    // set-typed property stores a set.
                    let loaded = match (&self.get(property.mapping).kind, loaded) {
                        (MappingKind::Set(_), ObjectValue::Array(items)) => ObjectValue::Set(items),
                        (_, loaded) => loaded,
                    };
                    handle.load(&property.name, loaded.clone());
                    self.fetch(loader, property.mapping, loaded, rest).await
                } else {
                    let nested = handle.get(&property.name);
                    let fetched = self.fetch(loader, property.mapping, nested, rest).await?;
                    handle.load(&property.name, fetched.clone());
                    Ok(fetched)
                }
            }

            // Collections fetch the path against every element.
            MappingKind::Array(mapping) => {
                let element = mapping.element;
                let ObjectValue::Array(items) = value else {
                    bail!("cannot fetch {:?} through a {}", path, value.shape());
                };
                let mut fetched = Vec::with_capacity(items.len());
                for item in items {
                    fetched.push(self.fetch(loader, element, item, path).await?);
                }
                Ok(ObjectValue::Array(fetched))
            }

            MappingKind::Set(mapping) => {
                let element = mapping.element;
                let ObjectValue::Set(items) = value else {
                    bail!("cannot fetch {:?} through a {}", path, value.shape());
                };
                let mut fetched = Vec::with_capacity(items.len());
                for item in items {
                    fetched.push(self.fetch(loader, element, item, path).await?);
                }
                Ok(ObjectValue::Set(fetched))
            }

            _ => bail!("cannot fetch {:?} through a terminal mapping", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StringGenerator;
    use crate::mapping::{EntityPolicy, Primitive, Property};
    use crate::object::ObjectHandle;

    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixture {
        registry: Registry,
        task: MappingId,
        person: MappingId,
    }

    fn fixture() -> Fixture {
        let mut builder = Registry::builder();
        let string = builder.primitive(Primitive::String);

        let person = builder.entity(
            "Person",
            EntityPolicy::new("people").generator(Rc::new(StringGenerator)),
        );
        builder.add_property(person, Property::new("name", string));

        let task = builder.entity(
            "Task",
            EntityPolicy::new("tasks").generator(Rc::new(StringGenerator)),
        );
        builder.add_property(task, Property::new("name", string));
        builder.add_property(task, Property::new("owner", person));

        let owned = builder.set(task);
        builder.add_property(person, Property::new("tasks", owned).inverse_of("owner"));

        Fixture {
            registry: builder.build().unwrap(),
            task,
            person,
        }
    }

    /// Answers every load with canned objects and counts point loads.
    struct StubLoader {
        person: ObjectHandle,
        tasks: Vec<ObjectHandle>,
        loads: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl Loader for StubLoader {
        async fn load(&self, _reference: &Reference) -> Result<ObjectValue> {
            self.loads.set(self.loads.get() + 1);
            Ok(ObjectValue::Object(self.person.clone()))
        }

        async fn load_inverse(
            &self,
            _target: MappingId,
            field: &str,
            id: &Value,
            many: bool,
        ) -> Result<ObjectValue> {
            assert_eq!(field, "owner");
            assert_eq!(id, &Value::from("p1"));
            assert!(many);
            Ok(ObjectValue::Array(
                self.tasks
                    .iter()
                    .map(|task| ObjectValue::Object(task.clone()))
                    .collect(),
            ))
        }
    }

    fn stub() -> StubLoader {
        let person = ObjectHandle::new("Person");
        person.load("id", "p1");
        person.load("name", "ada");
        let task = ObjectHandle::new("Task");
        task.load("id", "t1");
        task.load("name", "x");
        StubLoader {
            person,
            tasks: vec![task],
            loads: Cell::new(0),
        }
    }

    #[tokio::test]
    async fn fetch_resolves_a_reference_and_writes_it_back() {
        let Fixture { registry, task, person } = fixture();
        let loader = stub();

        let handle = ObjectHandle::new("Task");
        handle.load("id", "t1");
        handle.load(
            "owner",
            ObjectValue::Reference(Reference::new(person, Value::from("p1"))),
        );

        let fetched = registry
            .fetch(&loader, task, ObjectValue::Object(handle.clone()), "owner")
            .await
            .unwrap();
        assert_eq!(fetched.as_object().unwrap().get("name"), "ada".into());
        assert!(matches!(handle.get("owner"), ObjectValue::Object(_)));

        // Resolved once; the second fetch is answered from memory.
        registry
            .fetch(&loader, task, ObjectValue::Object(handle.clone()), "owner")
            .await
            .unwrap();
        assert_eq!(loader.loads.get(), 1);
    }

    #[tokio::test]
    async fn dotted_paths_descend_through_loaded_references() {
        let Fixture { registry, task, person } = fixture();
        let loader = stub();

        let handle = ObjectHandle::new("Task");
        handle.load("id", "t1");
        handle.load(
            "owner",
            ObjectValue::Reference(Reference::new(person, Value::from("p1"))),
        );

        let name = registry
            .fetch(&loader, task, ObjectValue::Object(handle), "owner.name")
            .await
            .unwrap();
        assert_eq!(name, ObjectValue::from("ada"));
    }

    #[tokio::test]
    async fn inverse_loads_take_the_shape_of_the_property() {
        let Fixture { registry, person, .. } = fixture();
        let loader = stub();
        let handle = loader.person.clone();

        let owned = registry
            .fetch(&loader, person, ObjectValue::Object(handle.clone()), "tasks")
            .await
            .unwrap();

        // The set-typed property stores a set, not the loader's array.
        let ObjectValue::Set(items) = owned else {
            panic!("expected a set of tasks");
        };
        assert_eq!(items.len(), 1);
        assert!(matches!(handle.get("tasks"), ObjectValue::Set(_)));
    }

    #[tokio::test]
    async fn unknown_fetch_path_is_an_error() {
        let Fixture { registry, task, .. } = fixture();
        let loader = stub();
        let handle = ObjectHandle::new("Task");
        handle.load("id", "t1");

        assert!(registry
            .fetch(&loader, task, ObjectValue::Object(handle), "nope")
            .await
            .is_err());
    }
}
