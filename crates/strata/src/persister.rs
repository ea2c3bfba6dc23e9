mod batch;
pub use batch::Batch;

use crate::coalescer::Coalescer;

use strata_core::doc::{Document, UpdateDoc, Value};
use strata_core::mapping::{EntityPolicy, MappingId, Registry, ID_FIELD};
use strata_core::object::ObjectHandle;
use strata_core::store::{Collection, Store};
use strata_core::{Error, Result};

use std::rc::Rc;

/// Builds store operations for one entity hierarchy. One persister per
/// hierarchy root, created lazily by the session and bound to the root's
/// collection.
pub struct Persister {
    registry: Rc<Registry>,
    root: MappingId,
    collection_name: String,
    collection: Rc<dyn Collection>,
    coalescer: Coalescer,
}

/// A computed update: the optimistic filter, the operator document to apply,
/// and the document state to snapshot once the write is confirmed.
pub struct PendingUpdate {
    pub filter: Document,
    pub update: Document,
    pub snapshot: Document,
}

/// A computed full-document replacement. The replacement doubles as the
/// next snapshot.
pub struct PendingReplace {
    pub filter: Document,
    pub doc: Document,
}

impl Persister {
    pub fn new(registry: Rc<Registry>, root: MappingId, store: &dyn Store) -> Result<Self> {
        let Some(policy) = registry.policy(root) else {
            return Err(Error::precondition(
                "a persister requires an entity mapping with a policy",
            ));
        };
        let collection_name = policy.collection.clone();
        let collection = store.collection(&collection_name);
        Ok(Persister {
            coalescer: Coalescer::new(collection.clone()),
            registry,
            root,
            collection_name,
            collection,
        })
    }

    pub fn root(&self) -> MappingId {
        self.root
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn collection(&self) -> &Rc<dyn Collection> {
        &self.collection
    }

    fn policy(&self) -> &EntityPolicy {
        // Presence is validated in `new`.
        match self.registry.policy(self.root) {
            Some(policy) => policy,
            None => unreachable!("persister root lost its policy"),
        }
    }

    /// Serializes a new object, stamping the initial version when the
    /// hierarchy is versioned. The returned document doubles as the
    /// post-flush snapshot.
    pub fn insert_document(&self, handle: &ObjectHandle) -> Result<Document> {
        let mut doc = self.registry.write_document(self.root, handle)?;
        let policy = self.policy();
        if policy.versioned {
            doc.insert(policy.version_field.clone(), 1i64);
        }
        Ok(doc)
    }

    /// Re-serializes a managed object and diffs it against the snapshot
    /// taken at the last load or flush. Returns `None` when nothing changed.
    pub fn update_for(
        &self,
        snapshot: &Document,
        handle: &ObjectHandle,
    ) -> Result<Option<PendingUpdate>> {
        let new_doc = self.registry.write_document(self.root, handle)?;
        if self.registry.documents_equal(self.root, snapshot, &new_doc) {
            return Ok(None);
        }

        let policy = self.policy();
        let Some(id) = snapshot.get(ID_FIELD).cloned() else {
            return Err(Error::consistency("snapshot is missing its identifier"));
        };

        let mut exclude = vec![ID_FIELD];
        if policy.versioned {
            exclude.push(policy.version_field.as_str());
        }
        let mut update = UpdateDoc::diff(snapshot, &new_doc, &exclude);

        let mut filter = Document::new();
        filter.insert(ID_FIELD, id);

        let mut next = new_doc;
        if policy.versioned {
            let old_version = match snapshot.get(&policy.version_field) {
                Some(Value::I64(version)) => *version,
                _ => {
                    return Err(Error::consistency(
                        "versioned snapshot is missing its version counter",
                    ))
                }
            };
            filter.insert(policy.version_field.clone(), old_version);
            update.inc(policy.version_field.clone(), 1);
            next.insert(policy.version_field.clone(), old_version + 1);
        }

        Ok(Some(PendingUpdate {
            filter,
            update: update.into_document(),
            snapshot: next,
        }))
    }

    /// Re-serializes an explicitly saved object as a full replacement
    /// keyed by its identifier, skipping the diff. For versioned
    /// hierarchies the filter carries the last-read version and the
    /// replacement stamps the next one.
    pub fn replace_for(
        &self,
        snapshot: Option<&Document>,
        handle: &ObjectHandle,
    ) -> Result<PendingReplace> {
        let mut doc = self.registry.write_document(self.root, handle)?;
        let Some(id) = doc.get(ID_FIELD).cloned() else {
            return Err(Error::consistency("entity is missing an identifier"));
        };
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id);

        let policy = self.policy();
        if policy.versioned {
            let old_version = match snapshot.and_then(|s| s.get(&policy.version_field)) {
                Some(Value::I64(version)) => *version,
                _ => {
                    return Err(Error::consistency(
                        "versioned replace requires the last-read version",
                    ))
                }
            };
            filter.insert(policy.version_field.clone(), old_version);
            doc.insert(policy.version_field.clone(), old_version + 1);
        }
        Ok(PendingReplace { filter, doc })
    }

    /// The delete filter for a managed object: identifier plus, for
    /// versioned hierarchies, the version last read.
    pub fn delete_filter(&self, snapshot: &Document) -> Result<Document> {
        let Some(id) = snapshot.get(ID_FIELD).cloned() else {
            return Err(Error::consistency("snapshot is missing its identifier"));
        };
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id);

        let policy = self.policy();
        if policy.versioned {
            let Some(version) = snapshot.get(&policy.version_field).cloned() else {
                return Err(Error::consistency(
                    "versioned snapshot is missing its version counter",
                ));
            };
            filter.insert(policy.version_field.clone(), version);
        }
        Ok(filter)
    }

    /// Coalesced point lookup by identifier.
    pub async fn find_one_by_id(&self, id: Value) -> Result<Document> {
        self.coalescer.find_one_by_id(id).await
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        self.collection.find_one(filter).await
    }

    pub async fn find_many(&self, filter: Document) -> Result<Vec<Document>> {
        self.collection.find_many(filter).await
    }
}
