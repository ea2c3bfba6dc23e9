mod links;
pub use links::ObjectState;
use links::{id_value, object_id, ObjectLinks, ScheduledOp};

use crate::persister::{Batch, Persister};

use strata_core::doc::{Document, IdKey, Value};
use strata_core::mapping::{
    CascadeOp, ChangeTracking, Classified, Loader, MappingId, Registry, WalkFlags, ID_FIELD,
};
use strata_core::object::{ChangeObserver, HandleKey, ObjectHandle, ObjectValue, Reference};
use strata_core::store::Store;
use strata_core::{Error, Result};

use async_trait::async_trait;

use indexmap::IndexMap;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A unit of work: tracks objects, schedules inserts, dirty checks and
/// deletes, and writes everything out in one batched flush. One identity
/// map entry per stored document, so repeated lookups return the same
/// object.
///
/// Sessions are single-threaded and cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Session {
    inner: Rc<Inner>,
}

struct Inner {
    registry: Rc<Registry>,
    store: Rc<dyn Store>,
    persisters: RefCell<HashMap<MappingId, Rc<Persister>>>,
    /// Per-object bookkeeping, in registration order. Flush replays the
    /// order within each operation phase.
    links: RefCell<IndexMap<HandleKey, ObjectLinks>>,
    /// (hierarchy root, identifier) to the one managed object for it.
    identity: RefCell<HashMap<(MappingId, IdKey), ObjectHandle>>,
}

/// Post-execute bookkeeping for one queued write.
enum Planned {
    /// Advance the snapshot to the written document.
    Write(Document),
    /// Forget the object entirely.
    Forget,
}

impl Session {
    pub fn new(registry: Rc<Registry>, store: Rc<dyn Store>) -> Self {
        Session {
            inner: Rc::new(Inner {
                registry,
                store,
                persisters: RefCell::new(HashMap::new()),
                links: RefCell::new(IndexMap::new()),
                identity: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.inner.registry
    }

    /// Schedules the object (and everything reachable over save-cascading
    /// properties) for persistence. The identifier is assigned here, once,
    /// if the object does not already carry one.
    pub fn persist(&self, handle: &ObjectHandle) -> Result<()> {
        let concrete = self.concrete_entity(handle)?;
        for (node, entity) in self.reachable(concrete, handle, CascadeOp::Save).entities {
            self.persist_one(node, &entity)?;
        }
        Ok(())
    }

    /// Schedules an explicit save: the object is written out as a full
    /// document replacement instead of a diffed update. An object this
    /// session never loaded is saved from scratch, keyed by its
    /// caller-assigned identifier; save-cascading properties are persisted
    /// as by [`Session::persist`].
    pub fn save(&self, handle: &ObjectHandle) -> Result<()> {
        let concrete = self.concrete_entity(handle)?;
        self.save_one(concrete, handle)?;
        for (node, entity) in self.reachable(concrete, handle, CascadeOp::Save).entities {
            if entity.ptr_eq(handle) {
                continue;
            }
            self.persist_one(node, &entity)?;
        }
        Ok(())
    }

    /// Schedules the object (and everything reachable over remove-cascading
    /// properties) for deletion at the next flush.
    pub fn remove(&self, handle: &ObjectHandle) -> Result<()> {
        let (concrete, state) = {
            let links = self.inner.links.borrow();
            match links.get(&handle.key()) {
                Some(link) => (link.mapping, link.state),
                None => {
                    return Err(Error::precondition(
                        "cannot remove an object the session does not manage",
                    ))
                }
            }
        };
        if state == ObjectState::Detached {
            return Err(Error::precondition("cannot remove a detached object"));
        }

        for (_, entity) in self.reachable(concrete, handle, CascadeOp::Remove).entities {
            self.remove_one(&entity);
        }
        Ok(())
    }

    /// Stops tracking the object (and everything reachable over
    /// detach-cascading properties). Pending work for it is discarded; the
    /// identifier is cleared only if the object never reached the store or
    /// was pending deletion.
    pub fn detach(&self, handle: &ObjectHandle) {
        let concrete = {
            let links = self.inner.links.borrow();
            match links.get(&handle.key()) {
                Some(link) => link.mapping,
                None => return,
            }
        };
        for (_, entity) in self.reachable(concrete, handle, CascadeOp::Detach).entities {
            self.detach_one(&entity);
        }
    }

    /// Detaches every tracked object.
    pub fn clear(&self) {
        let handles: Vec<ObjectHandle> = self
            .inner
            .links
            .borrow()
            .values()
            .map(|link| link.handle.clone())
            .collect();
        for handle in handles {
            self.detach_one(&handle);
        }
    }

    pub fn contains(&self, handle: &ObjectHandle) -> bool {
        self.inner
            .links
            .borrow()
            .get(&handle.key())
            .is_some_and(ObjectLinks::is_managed)
    }

    pub fn state_of(&self, handle: &ObjectHandle) -> Option<ObjectState> {
        self.inner
            .links
            .borrow()
            .get(&handle.key())
            .map(|link| link.state)
    }

    /// The tracked object's identifier, in document form.
    pub fn id_of(&self, handle: &ObjectHandle) -> Option<Value> {
        let links = self.inner.links.borrow();
        let link = links.get(&handle.key())?;
        let policy = self.inner.registry.policy(link.mapping)?;
        id_value(&handle.get(&policy.id_property))
    }

    /// A pointer to the entity with `id` without loading it: the managed
    /// object when the identity map has one, a lazy reference otherwise.
    pub fn reference(&self, declared: MappingId, id: Value) -> Result<ObjectValue> {
        let root = self.inner.registry.hierarchy_root(declared);
        let Some(key) = id.id_key() else {
            return Err(Error::consistency(format!(
                "{} is not an identifier shape",
                id.shape()
            )));
        };
        match self.identity_hit(root, &key) {
            Some(existing) => Ok(ObjectValue::Object(existing)),
            None => Ok(ObjectValue::Reference(Reference::new(root, id))),
        }
    }

    /// Point lookup by identifier. The identity map wins over the store;
    /// concurrent lookups against the same collection are coalesced into
    /// one query. A missing document is a not-found error.
    pub async fn find(&self, declared: MappingId, id: Value) -> Result<ObjectHandle> {
        let root = self.inner.registry.hierarchy_root(declared);
        let Some(key) = id.id_key() else {
            return Err(Error::consistency(format!(
                "{} is not an identifier shape",
                id.shape()
            )));
        };

        if let Some(existing) = self.identity_hit(root, &key) {
            return self.check_declared(declared, existing);
        }

        let persister = self.persister(root)?;
        let doc = persister.find_one_by_id(id).await?;

        // Another task may have materialized the object while the lookup
        // was in flight.
        if let Some(existing) = self.identity_hit(root, &key) {
            return self.check_declared(declared, existing);
        }
        self.materialize(declared, doc)
    }

    /// Query returning every match as a managed object. A non-root declared
    /// type narrows the query to its branch of the hierarchy.
    pub async fn find_all(
        &self,
        declared: MappingId,
        mut filter: Document,
    ) -> Result<Vec<ObjectHandle>> {
        let registry = self.inner.registry.clone();
        let root = registry.hierarchy_root(declared);
        let persister = self.persister(root)?;

        if declared != root {
            if let Some(class) = registry.get(declared).as_class() {
                let values: Vec<Value> = registry
                    .discriminators_below(declared)
                    .into_iter()
                    .map(Value::String)
                    .collect();
                let mut matcher = Document::new();
                matcher.insert("$in", Value::Array(values));
                filter.insert(class.discriminator_field.clone(), matcher);
            }
        }

        let mut cursor = persister.collection().find_cursor(filter).await?;
        let mut results = Vec::new();
        while let Some(doc) = cursor.advance().await? {
            results.push(self.adopt(declared, doc)?);
        }
        Ok(results)
    }

    /// Resolves a dotted property path, loading lazy references and
    /// inverse-side relationships along the way.
    pub async fn fetch(
        &self,
        declared: MappingId,
        value: ObjectValue,
        path: &str,
    ) -> Result<ObjectValue> {
        self.inner.registry.fetch(self, declared, value, path).await
    }

    /// Writes all scheduled work out in one batch: inserts, then dirty
    /// checks, then deletes. On success snapshots advance and scheduled
    /// work clears; on failure session state is untouched, so the flush
    /// can be retried.
    pub async fn flush(&self) -> Result<()> {
        let registry = self.inner.registry.clone();
        let mut batch = Batch::new();
        let mut plan: Vec<(HandleKey, Planned)> = Vec::new();

        {
            let links = self.inner.links.borrow();

            // Inserts first, so rows referencing them can land in the same
            // cycle.
            for (key, link) in links.iter() {
                if link.is_managed() && link.op == ScheduledOp::Insert {
                    let persister = self.persister(registry.hierarchy_root(link.mapping))?;
                    let doc = persister.insert_document(&link.handle)?;
                    batch.queue_insert(&persister, doc.clone());
                    plan.push((key.clone(), Planned::Write(doc)));
                }
            }

            for (key, link) in links.iter() {
                if !link.is_managed() {
                    continue;
                }
                if link.op == ScheduledOp::Replace {
                    let persister = self.persister(registry.hierarchy_root(link.mapping))?;
                    let pending = persister.replace_for(link.snapshot.as_ref(), &link.handle)?;
                    batch.queue_replace(&persister, pending.filter, pending.doc.clone());
                    plan.push((key.clone(), Planned::Write(pending.doc)));
                    continue;
                }
                if !self.wants_dirty_check(link) {
                    continue;
                }
                let Some(snapshot) = &link.snapshot else {
                    return Err(Error::consistency(
                        "managed object has no snapshot to diff against",
                    ));
                };
                let persister = self.persister(registry.hierarchy_root(link.mapping))?;
                if let Some(pending) = persister.update_for(snapshot, &link.handle)? {
                    batch.queue_update(&persister, pending.filter, pending.update);
                    plan.push((key.clone(), Planned::Write(pending.snapshot)));
                }
            }

            for (key, link) in links.iter() {
                if link.state != ObjectState::Removed {
                    continue;
                }
                let Some(snapshot) = &link.snapshot else {
                    return Err(Error::consistency(
                        "removed object has no snapshot to delete by",
                    ));
                };
                let persister = self.persister(registry.hierarchy_root(link.mapping))?;
                let filter = persister.delete_filter(snapshot)?;
                batch.queue_delete(&persister, filter);
                plan.push((key.clone(), Planned::Forget));
            }
        }

        tracing::debug!(operations = plan.len(), "flushing session");

        if !batch.is_empty() {
            batch.execute().await?;
        }

        let mut forget: Vec<(MappingId, ObjectHandle)> = Vec::new();
        {
            let mut links = self.inner.links.borrow_mut();
            for (key, planned) in plan {
                match planned {
                    Planned::Write(snapshot) => {
                        if let Some(link) = links.get_mut(&key) {
                            link.snapshot = Some(snapshot);
                            link.op = ScheduledOp::None;
                        }
                    }
                    Planned::Forget => {
                        if let Some(link) = links.shift_remove(&key) {
                            forget.push((link.mapping, link.handle));
                        }
                    }
                }
            }

            // Explicit dirty-check marks are consumed whether or not they
            // produced a write, and observed objects get a fresh one-shot
            // observer.
            for link in links.values_mut() {
                if !link.is_managed() {
                    continue;
                }
                link.op = ScheduledOp::None;
                let observed = matches!(
                    registry.policy(link.mapping).map(|policy| policy.tracking),
                    Some(ChangeTracking::Observed)
                );
                if observed {
                    let observer = ChangeObserver::new();
                    link.handle.observe(observer.clone());
                    // Embedded objects share the root's one-shot observer,
                    // so mutating one marks the entity dirty.
                    let mut reachable = Classified::new();
                    registry.walk(
                        link.mapping,
                        &ObjectValue::Object(link.handle.clone()),
                        WalkFlags {
                            op: CascadeOp::Save,
                            walk_entities: false,
                        },
                        &mut reachable,
                    );
                    for embedded in &reachable.embedded {
                        embedded.observe(observer.clone());
                    }
                    link.observer = Some(observer);
                }
            }
        }
        for (mapping, handle) in forget {
            handle.clear_observer();
            self.unregister(mapping, &handle);
        }
        Ok(())
    }

    fn wants_dirty_check(&self, link: &ObjectLinks) -> bool {
        match link.op {
            ScheduledOp::DirtyCheck => true,
            ScheduledOp::None => match self
                .inner
                .registry
                .policy(link.mapping)
                .map(|policy| policy.tracking)
            {
                Some(ChangeTracking::DeferredImplicit) => true,
                Some(ChangeTracking::Observed) => {
                    link.observer.as_ref().is_some_and(ChangeObserver::is_dirty)
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn persist_one(&self, concrete: MappingId, handle: &ObjectHandle) -> Result<()> {
        let registry = &self.inner.registry;

        {
            let mut links = self.inner.links.borrow_mut();
            if let Some(link) = links.get_mut(&handle.key()) {
                match link.state {
                    ObjectState::Detached => {
                        return Err(Error::precondition("cannot persist a detached object"))
                    }
                    ObjectState::Removed => {
                        // Revived before the deletion flushed.
                        link.state = ObjectState::Managed;
                        link.op = if link.snapshot.is_none() {
                            ScheduledOp::Insert
                        } else {
                            ScheduledOp::DirtyCheck
                        };
                    }
                    ObjectState::Managed => {
                        if link.op == ScheduledOp::None {
                            link.op = ScheduledOp::DirtyCheck;
                        }
                    }
                }
                return Ok(());
            }
        }

        let Some(policy) = registry.policy(concrete) else {
            return Err(Error::precondition(format!(
                "{} is not an entity type",
                handle.type_tag()
            )));
        };

        let current = handle.get(&policy.id_property);
        let id = if current.is_null() {
            let generated = policy.generator.generate();
            let Some(value) = object_id(&generated) else {
                return Err(Error::consistency(
                    "identifier generator produced a non-identifier value",
                ));
            };
            handle.load(&policy.id_property, value);
            generated
        } else {
            let Some(id) = id_value(&current) else {
                return Err(Error::precondition(format!(
                    "{} is not an identifier shape",
                    current.shape()
                )));
            };
            if !policy.generator.validate(&id) {
                return Err(Error::precondition(format!(
                    "{id:?} is not a valid identifier"
                )));
            }
            id
        };
        let Some(id_key) = id.id_key() else {
            return Err(Error::consistency(format!(
                "{} is not an identifier shape",
                id.shape()
            )));
        };

        self.register_new(concrete, handle, id_key, ScheduledOp::Insert)
    }

    /// Explicit save of one object. A known object is rescheduled for a
    /// full replacement; an unknown one is registered from scratch, keyed
    /// by the identifier it already carries.
    fn save_one(&self, concrete: MappingId, handle: &ObjectHandle) -> Result<()> {
        let registry = &self.inner.registry;

        {
            let mut links = self.inner.links.borrow_mut();
            if let Some(link) = links.get_mut(&handle.key()) {
                if link.state == ObjectState::Detached {
                    return Err(Error::precondition("cannot save a detached object"));
                }
                link.state = ObjectState::Managed;
                // Pending inserts already write the full document.
                if !link.never_persisted() {
                    link.op = ScheduledOp::Replace;
                }
                return Ok(());
            }
        }

        let Some(policy) = registry.policy(concrete) else {
            return Err(Error::precondition(format!(
                "{} is not an entity type",
                handle.type_tag()
            )));
        };
        if policy.versioned {
            // There is no last-read version to advance from.
            return Err(Error::precondition(
                "cannot save a versioned object the session has not loaded",
            ));
        }
        let Some(id) = id_value(&handle.get(&policy.id_property)) else {
            return Err(Error::precondition(
                "saving an unloaded object requires an assigned identifier",
            ));
        };
        if !policy.generator.validate(&id) {
            return Err(Error::precondition(format!(
                "{id:?} is not a valid identifier"
            )));
        }
        let Some(id_key) = id.id_key() else {
            return Err(Error::consistency(format!(
                "{} is not an identifier shape",
                id.shape()
            )));
        };

        self.register_new(concrete, handle, id_key, ScheduledOp::Replace)
    }

    fn register_new(
        &self,
        concrete: MappingId,
        handle: &ObjectHandle,
        id_key: IdKey,
        op: ScheduledOp,
    ) -> Result<()> {
        let root = self.inner.registry.hierarchy_root(concrete);
        {
            let mut identity = self.inner.identity.borrow_mut();
            if let Some(existing) = identity.get(&(root, id_key.clone())) {
                if !existing.ptr_eq(handle) {
                    return Err(Error::precondition(format!(
                        "another object with identifier {id_key} is already managed"
                    )));
                }
            }
            identity.insert((root, id_key), handle.clone());
        }
        let mut link = ObjectLinks::inserted(concrete, handle.clone());
        link.op = op;
        self.inner.links.borrow_mut().insert(handle.key(), link);
        Ok(())
    }

    fn remove_one(&self, handle: &ObjectHandle) {
        let key = handle.key();
        let forget = {
            let mut links = self.inner.links.borrow_mut();
            let Some(link) = links.get_mut(&key) else {
                // Cascaded into an object this session never tracked.
                return;
            };
            match link.state {
                ObjectState::Detached | ObjectState::Removed => None,
                ObjectState::Managed if link.never_persisted() => {
                    let mapping = link.mapping;
                    links.shift_remove(&key);
                    Some(mapping)
                }
                ObjectState::Managed => {
                    link.state = ObjectState::Removed;
                    link.op = ScheduledOp::Delete;
                    None
                }
            }
        };
        if let Some(mapping) = forget {
            self.unregister(mapping, handle);
        }
    }

    fn detach_one(&self, handle: &ObjectHandle) {
        let key = handle.key();
        let (mapping, clear_id) = {
            let mut links = self.inner.links.borrow_mut();
            let Some(link) = links.get_mut(&key) else {
                return;
            };
            if link.state == ObjectState::Detached {
                return;
            }
            let clear_id = link.never_persisted() || link.state == ObjectState::Removed;
            link.state = ObjectState::Detached;
            link.op = ScheduledOp::None;
            link.snapshot = None;
            link.observer = None;
            (link.mapping, clear_id)
        };

        handle.clear_observer();
        self.unregister(mapping, handle);
        if clear_id {
            if let Some(policy) = self.inner.registry.policy(mapping) {
                handle.unload(&policy.id_property);
            }
        }
    }

    fn reachable(&self, concrete: MappingId, handle: &ObjectHandle, op: CascadeOp) -> Classified {
        let mut out = Classified::new();
        self.inner.registry.walk(
            concrete,
            &ObjectValue::Object(handle.clone()),
            WalkFlags {
                op,
                walk_entities: true,
            },
            &mut out,
        );
        out
    }

    fn concrete_entity(&self, handle: &ObjectHandle) -> Result<MappingId> {
        let registry = &self.inner.registry;
        let tag = handle.type_tag();
        let Some(id) = registry.mapping_for_tag(&tag) else {
            return Err(Error::precondition(format!(
                "no mapping registered for type {tag}"
            )));
        };
        if registry.policy(id).is_none() {
            return Err(Error::precondition(format!("{tag} is not an entity type")));
        }
        Ok(id)
    }

    fn persister(&self, root: MappingId) -> Result<Rc<Persister>> {
        let mut persisters = self.inner.persisters.borrow_mut();
        if let Some(persister) = persisters.get(&root) {
            return Ok(persister.clone());
        }
        let persister = Rc::new(Persister::new(
            self.inner.registry.clone(),
            root,
            self.inner.store.as_ref(),
        )?);
        persisters.insert(root, persister.clone());
        Ok(persister)
    }

    fn identity_hit(&self, root: MappingId, key: &IdKey) -> Option<ObjectHandle> {
        self.inner
            .identity
            .borrow()
            .get(&(root, key.clone()))
            .cloned()
    }

    fn check_declared(&self, declared: MappingId, handle: ObjectHandle) -> Result<ObjectHandle> {
        let registry = &self.inner.registry;
        match registry.mapping_for_tag(&handle.type_tag()) {
            Some(node) if registry.descends_from(node, declared) => Ok(handle),
            _ => {
                let expected = registry
                    .get(declared)
                    .as_object()
                    .map(|object| object.type_tag.to_string())
                    .unwrap_or_default();
                Err(Error::not_found(format!(
                    "{} is not a {expected}",
                    handle.type_tag()
                )))
            }
        }
    }

    /// The managed object for a fetched document: the identity map entry if
    /// one exists, a freshly materialized object otherwise.
    fn adopt(&self, declared: MappingId, doc: Document) -> Result<ObjectHandle> {
        let root = self.inner.registry.hierarchy_root(declared);
        let existing = doc
            .get(ID_FIELD)
            .and_then(Value::id_key)
            .and_then(|key| self.identity_hit(root, &key));
        match existing {
            Some(handle) => Ok(handle),
            None => self.materialize(declared, doc),
        }
    }

    fn materialize(&self, declared: MappingId, doc: Document) -> Result<ObjectHandle> {
        let registry = &self.inner.registry;
        let root = registry.hierarchy_root(declared);
        let Some(policy) = registry.policy(root) else {
            return Err(Error::precondition("find requires an entity mapping"));
        };
        let observer = match policy.tracking {
            ChangeTracking::Observed => Some(ChangeObserver::new()),
            _ => None,
        };

        let handle = registry.read_document(declared, &doc, observer.clone())?;
        let concrete = registry
            .mapping_for_tag(&handle.type_tag())
            .unwrap_or(declared);
        let Some(key) = doc.get(ID_FIELD).and_then(Value::id_key) else {
            return Err(Error::consistency("stored document is missing its identifier"));
        };

        self.inner
            .identity
            .borrow_mut()
            .insert((root, key), handle.clone());
        self.inner.links.borrow_mut().insert(
            handle.key(),
            ObjectLinks::loaded(concrete, handle.clone(), doc, observer),
        );
        Ok(handle)
    }

    fn unregister(&self, mapping: MappingId, handle: &ObjectHandle) {
        let registry = &self.inner.registry;
        let root = registry.hierarchy_root(mapping);
        let Some(policy) = registry.policy(mapping) else {
            return;
        };
        if let Some(key) = id_value(&handle.get(&policy.id_property)).and_then(|id| id.id_key()) {
            self.inner.identity.borrow_mut().remove(&(root, key));
        }
    }
}

#[async_trait(?Send)]
impl Loader for Session {
    async fn load(&self, reference: &Reference) -> Result<ObjectValue> {
        let handle = self.find(reference.mapping(), reference.id().clone()).await?;
        Ok(ObjectValue::Object(handle))
    }

    async fn load_inverse(
        &self,
        target: MappingId,
        field: &str,
        id: &Value,
        many: bool,
    ) -> Result<ObjectValue> {
        let root = self.inner.registry.hierarchy_root(target);
        let persister = self.persister(root)?;
        let mut filter = Document::new();
        filter.insert(field, id.clone());

        if many {
            let docs = persister.find_many(filter).await?;
            let mut items = Vec::with_capacity(docs.len());
            for doc in docs {
                items.push(ObjectValue::Object(self.adopt(root, doc)?));
            }
            Ok(ObjectValue::Array(items))
        } else {
            match persister.find_one(filter).await? {
                Some(doc) => Ok(ObjectValue::Object(self.adopt(root, doc)?)),
                None => Ok(ObjectValue::Null),
            }
        }
    }
}
