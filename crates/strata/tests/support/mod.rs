//! An in-memory store for exercising sessions: documents per collection,
//! plus a log of every operation the engine issued.

#![allow(dead_code)]

use strata::core::doc::{Document, IdKey, Value};
use strata::core::mapping::ID_FIELD;
use strata::core::store::{BulkResult, BulkWriter, Collection, Cursor, Store};
use strata::core::{async_trait, Error, Result};

use indexmap::IndexMap;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use strata::core::identity::StringGenerator;
use strata::core::mapping::{
    Cascade, ChangeTracking, EntityPolicy, MappingId, Primitive, Property, Registry,
};
use strata::Session;

/// A session over an in-memory store, with a small mapping tree: a
/// versioned `Task` hierarchy (subclass `BugTask`) with an embedded
/// `Address`, owning an unversioned `Person`.
pub struct Fixture {
    pub registry: Rc<Registry>,
    pub store: Rc<MemoryStore>,
    pub session: Session,
    pub task: MappingId,
    pub bug: MappingId,
    pub person: MappingId,
}

pub fn fixture() -> Fixture {
    fixture_with(ChangeTracking::DeferredImplicit)
}

pub fn fixture_with(tracking: ChangeTracking) -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut builder = Registry::builder();
    let string = builder.primitive(Primitive::String);
    let integer = builder.primitive(Primitive::Integer);

    let person = builder.entity(
        "Person",
        EntityPolicy::new("people").generator(Rc::new(StringGenerator)),
    );
    builder.add_property(person, Property::new("name", string));

    let address = builder.embeddable("Address");
    builder.add_property(address, Property::new("city", string));

    let task = builder.entity(
        "Task",
        EntityPolicy::new("tasks")
            .generator(Rc::new(StringGenerator))
            .versioned()
            .tracking(tracking),
    );
    builder.add_property(task, Property::new("name", string));
    builder.add_property(task, Property::new("note", string).nullable());
    builder.add_property(task, Property::new("address", address).nullable());
    builder.add_property(task, Property::new("owner", person).cascade(Cascade::SAVE));

    let bug = builder.subclass("BugTask", task);
    builder.add_property(bug, Property::new("severity", integer));

    let owned = builder.array(task);
    builder.add_property(person, Property::new("tasks", owned).inverse_of("owner"));

    let registry = Rc::new(builder.build().unwrap());
    let store = MemoryStore::new();
    let session = Session::new(registry.clone(), store.clone());
    Fixture {
        registry,
        store,
        session,
        task,
        bug,
        person,
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RefCell<HashMap<String, Rc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn named(&self, name: &str) -> Rc<MemoryCollection> {
        self.collections
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl Store for MemoryStore {
    fn collection(&self, name: &str) -> Rc<dyn Collection> {
        self.named(name)
    }
}

/// Every operation a collection was asked to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    FindOne(Document),
    FindMany(Document),
    FindCursor(Document),
    Insert(Document),
    UpdateOne { filter: Document, update: Document },
    ReplaceOne { filter: Document, doc: Document },
    DeleteOne(Document),
}

#[derive(Default)]
pub struct MemoryCollection {
    state: Rc<State>,
}

#[derive(Default)]
struct State {
    docs: RefCell<IndexMap<IdKey, Document>>,
    log: RefCell<Vec<Op>>,
    fail_next: Cell<bool>,
}

impl MemoryCollection {
    /// Inserts a document directly, without logging.
    pub fn seed(&self, doc: Document) {
        let key = doc
            .get(ID_FIELD)
            .and_then(Value::id_key)
            .expect("seeded documents need an identifier");
        self.state.docs.borrow_mut().insert(key, doc);
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.state
            .docs
            .borrow()
            .get(&IdKey::String(id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.docs.borrow().len()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.state.log.borrow_mut().clear();
    }

    /// The next read or executed bulk write fails.
    pub fn fail_next(&self) {
        self.state.fail_next.set(true);
    }
}

impl State {
    fn take_failure(&self) -> Result<()> {
        if self.fail_next.replace(false) {
            return Err(Error::from_args(format_args!("injected store failure")));
        }
        Ok(())
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(field, condition)| match condition {
        Value::Document(inner) if inner.contains_field("$in") => {
            let Some(Value::Array(options)) = inner.get("$in") else {
                return false;
            };
            doc.get(field)
                .is_some_and(|value| options.iter().any(|option| option.doc_eq(value)))
        }
        other => doc.get(field).is_some_and(|value| value.doc_eq(other)),
    })
}

fn apply_update(doc: &mut Document, update: &Document) {
    if let Some(Value::Document(set)) = update.get("$set") {
        for (field, value) in set {
            doc.insert(field.clone(), value.clone());
        }
    }
    if let Some(Value::Document(unset)) = update.get("$unset") {
        for field in unset.fields() {
            doc.remove(field);
        }
    }
    if let Some(Value::Document(inc)) = update.get("$inc") {
        for (field, by) in inc {
            let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
            doc.insert(field.clone(), current + by.as_i64().unwrap_or(0));
        }
    }
}

#[async_trait(?Send)]
impl Collection for MemoryCollection {
    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        self.state.log.borrow_mut().push(Op::FindOne(filter.clone()));
        self.state.take_failure()?;
        Ok(self
            .state
            .docs
            .borrow()
            .values()
            .find(|doc| matches(doc, &filter))
            .cloned())
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<Document>> {
        self.state
            .log
            .borrow_mut()
            .push(Op::FindMany(filter.clone()));
        self.state.take_failure()?;
        Ok(self
            .state
            .docs
            .borrow()
            .values()
            .filter(|doc| matches(doc, &filter))
            .cloned()
            .collect())
    }

    async fn find_cursor(&self, filter: Document) -> Result<Box<dyn Cursor>> {
        self.state
            .log
            .borrow_mut()
            .push(Op::FindCursor(filter.clone()));
        self.state.take_failure()?;
        let docs = self
            .state
            .docs
            .borrow()
            .values()
            .filter(|doc| matches(doc, &filter))
            .cloned()
            .collect();
        Ok(Box::new(MemoryCursor { docs }))
    }

    fn bulk(&self) -> Box<dyn BulkWriter> {
        Box::new(MemoryBulk {
            state: self.state.clone(),
            ops: Vec::new(),
        })
    }
}

struct MemoryCursor {
    docs: Vec<Document>,
}

#[async_trait(?Send)]
impl Cursor for MemoryCursor {
    async fn advance(&mut self) -> Result<Option<Document>> {
        if self.docs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.docs.remove(0)))
        }
    }
}

enum BulkOp {
    Insert(Document),
    Replace { filter: Document, doc: Document },
    Update { filter: Document, update: Document },
    Delete(Document),
}

struct MemoryBulk {
    state: Rc<State>,
    ops: Vec<BulkOp>,
}

#[async_trait(?Send)]
impl BulkWriter for MemoryBulk {
    fn insert(&mut self, doc: Document) {
        self.ops.push(BulkOp::Insert(doc));
    }

    fn replace_one(&mut self, filter: Document, doc: Document) {
        self.ops.push(BulkOp::Replace { filter, doc });
    }

    fn update_one(&mut self, filter: Document, update: Document) {
        self.ops.push(BulkOp::Update { filter, update });
    }

    fn delete_one(&mut self, filter: Document) {
        self.ops.push(BulkOp::Delete(filter));
    }

    async fn execute(self: Box<Self>) -> Result<BulkResult> {
        self.state.take_failure()?;
        let mut result = BulkResult::default();
        for op in self.ops {
            match op {
                BulkOp::Insert(doc) => {
                    self.state.log.borrow_mut().push(Op::Insert(doc.clone()));
                    let Some(key) = doc.get(ID_FIELD).and_then(Value::id_key) else {
                        return Err(Error::from_args(format_args!(
                            "inserted document is missing an identifier"
                        )));
                    };
                    self.state.docs.borrow_mut().insert(key, doc);
                    result.inserted += 1;
                }
                BulkOp::Replace { filter, doc } => {
                    self.state.log.borrow_mut().push(Op::ReplaceOne {
                        filter: filter.clone(),
                        doc: doc.clone(),
                    });
                    let mut docs = self.state.docs.borrow_mut();
                    if let Some(stored) = docs.values_mut().find(|d| matches(d, &filter)) {
                        *stored = doc;
                        result.matched += 1;
                        result.modified += 1;
                    }
                }
                BulkOp::Update { filter, update } => {
                    self.state.log.borrow_mut().push(Op::UpdateOne {
                        filter: filter.clone(),
                        update: update.clone(),
                    });
                    let mut docs = self.state.docs.borrow_mut();
                    if let Some(stored) = docs.values_mut().find(|d| matches(d, &filter)) {
                        apply_update(stored, &update);
                        result.matched += 1;
                        result.modified += 1;
                    }
                }
                BulkOp::Delete(filter) => {
                    self.state.log.borrow_mut().push(Op::DeleteOne(filter.clone()));
                    let mut docs = self.state.docs.borrow_mut();
                    let found = docs
                        .iter()
                        .find(|(_, doc)| matches(doc, &filter))
                        .map(|(key, _)| key.clone());
                    if let Some(key) = found {
                        docs.shift_remove(&key);
                        result.removed += 1;
                    }
                }
            }
        }
        Ok(result)
    }
}
