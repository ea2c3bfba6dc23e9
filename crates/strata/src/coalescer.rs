use strata_core::doc::{Document, IdKey, Value};
use strata_core::mapping::ID_FIELD;
use strata_core::store::Collection;
use strata_core::{Error, Result};

use indexmap::IndexMap;
use tokio::sync::oneshot;

use std::cell::RefCell;
use std::rc::Rc;

/// Coalesces concurrent point lookups against one collection. Requests that
/// land within the same scheduler turn are answered with a single query:
/// `find_one` when only one identifier is pending, a `$in` multi-get
/// otherwise.
pub struct Coalescer {
    collection: Rc<dyn Collection>,
    queue: Rc<RefCell<Queue>>,
}

#[derive(Default)]
struct Queue {
    pending: IndexMap<IdKey, Slot>,
    /// Set while some task has volunteered to drain after yielding.
    draining: bool,
}

struct Slot {
    id: Value,
    waiters: Vec<oneshot::Sender<Result<Document>>>,
}

impl Coalescer {
    pub fn new(collection: Rc<dyn Collection>) -> Self {
        Coalescer {
            collection,
            queue: Rc::new(RefCell::new(Queue::default())),
        }
    }

    /// Looks up one document by identifier. The call queues the identifier,
    /// yields once so sibling lookups can queue theirs, and resolves when
    /// the batched query lands. A missing document is a not-found error.
    pub async fn find_one_by_id(&self, id: Value) -> Result<Document> {
        let Some(key) = id.id_key() else {
            return Err(Error::consistency(format!(
                "{} is not an identifier shape",
                id.shape()
            )));
        };

        let (tx, rx) = oneshot::channel();
        let drains = {
            let mut queue = self.queue.borrow_mut();
            queue
                .pending
                .entry(key)
                .or_insert_with(|| Slot {
                    id,
                    waiters: Vec::new(),
                })
                .waiters
                .push(tx);

            // The first enqueuer of a turn becomes the drainer.
            !std::mem::replace(&mut queue.draining, true)
        };

        if drains {
            tokio::task::yield_now().await;
            self.drain().await;
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::flush("coalesced lookup was dropped")),
        }
    }

    async fn drain(&self) {
        let pending = {
            let mut queue = self.queue.borrow_mut();
            queue.draining = false;
            std::mem::take(&mut queue.pending)
        };
        if pending.is_empty() {
            return;
        }

        tracing::debug!(ids = pending.len(), "draining coalesced lookups");

        let fetched = self.fetch(&pending).await;
        match fetched {
            Ok(docs) => {
                let mut by_key: IndexMap<IdKey, Document> = IndexMap::new();
                for doc in docs {
                    if let Some(key) = doc.get(ID_FIELD).and_then(Value::id_key) {
                        by_key.insert(key, doc);
                    }
                }
                for (key, slot) in pending {
                    let result = match by_key.get(&key) {
                        Some(doc) => Ok(doc.clone()),
                        None => Err(Error::not_found(format!("{key}"))),
                    };
                    for waiter in slot.waiters {
                        let _ = waiter.send(result.clone());
                    }
                }
            }
            Err(err) => {
                for (_, slot) in pending {
                    for waiter in slot.waiters {
                        let _ = waiter.send(Err(err.clone()));
                    }
                }
            }
        }
    }

    async fn fetch(&self, pending: &IndexMap<IdKey, Slot>) -> Result<Vec<Document>> {
        if pending.len() == 1 {
            let slot = &pending[0];
            let mut filter = Document::new();
            filter.insert(ID_FIELD, slot.id.clone());
            Ok(self.collection.find_one(filter).await?.into_iter().collect())
        } else {
            let ids: Vec<Value> = pending.values().map(|slot| slot.id.clone()).collect();
            let mut matcher = Document::new();
            matcher.insert("$in", Value::Array(ids));
            let mut filter = Document::new();
            filter.insert(ID_FIELD, matcher);
            self.collection.find_many(filter).await
        }
    }
}
