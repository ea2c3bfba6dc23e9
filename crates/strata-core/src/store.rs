//! The store-driver contract. The engine consumes these traits; concrete
//! drivers live outside this repository.
//!
//! Sessions are single-threaded, so the traits are `?Send` and drivers are
//! handed out behind `Rc`.

use crate::doc::Document;
use crate::{async_trait, Result};

use std::rc::Rc;

/// A connected document store.
#[async_trait(?Send)]
pub trait Store {
    /// A handle to the named collection. Called lazily, once per persister.
    fn collection(&self, name: &str) -> Rc<dyn Collection>;
}

/// One named collection of documents.
#[async_trait(?Send)]
pub trait Collection {
    /// Point lookup; returns at most one matching document.
    async fn find_one(&self, filter: Document) -> Result<Option<Document>>;

    /// Multi-get; returns every matching document.
    async fn find_many(&self, filter: Document) -> Result<Vec<Document>>;

    /// Cursor over every matching document.
    async fn find_cursor(&self, filter: Document) -> Result<Box<dyn Cursor>>;

    /// Starts an unordered bulk operation against this collection.
    fn bulk(&self) -> Box<dyn BulkWriter>;
}

#[async_trait(?Send)]
pub trait Cursor {
    async fn advance(&mut self) -> Result<Option<Document>>;
}

/// An unordered bulk write. Queued operations are not visible until
/// `execute` resolves; the result counts are the only success signal.
#[async_trait(?Send)]
pub trait BulkWriter {
    fn insert(&mut self, doc: Document);

    fn replace_one(&mut self, filter: Document, doc: Document);

    /// Partial update of the first document matching `filter`; `update` is a
    /// `$set`/`$unset`/`$inc` operator document.
    fn update_one(&mut self, filter: Document, update: Document);

    fn delete_one(&mut self, filter: Document);

    async fn execute(self: Box<Self>) -> Result<BulkResult>;
}

/// Effect counts reported by the store for one executed bulk operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkResult {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub removed: u64,
}
