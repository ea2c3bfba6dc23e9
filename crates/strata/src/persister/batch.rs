use super::Persister;

use strata_core::doc::Document;
use strata_core::store::{BulkResult, BulkWriter};
use strata_core::{Error, Result};

use indexmap::IndexMap;

/// One flush cycle's worth of queued writes, grouped per collection. Each
/// collection gets a single unordered bulk operation; the expected effect
/// counts are checked against what the store reports.
#[derive(Default)]
pub struct Batch {
    commands: IndexMap<String, Command>,
}

struct Command {
    writer: Box<dyn BulkWriter>,
    expect: BulkResult,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&mut self, persister: &Persister) -> &mut Command {
        self.commands
            .entry(persister.collection_name().to_string())
            .or_insert_with(|| Command {
                writer: persister.collection().bulk(),
                expect: BulkResult::default(),
            })
    }

    pub fn queue_insert(&mut self, persister: &Persister, doc: Document) {
        let command = self.command(persister);
        command.writer.insert(doc);
        command.expect.inserted += 1;
    }

    pub fn queue_update(&mut self, persister: &Persister, filter: Document, update: Document) {
        let command = self.command(persister);
        command.writer.update_one(filter, update);
        command.expect.matched += 1;
    }

    pub fn queue_replace(&mut self, persister: &Persister, filter: Document, doc: Document) {
        let command = self.command(persister);
        command.writer.replace_one(filter, doc);
        command.expect.matched += 1;
    }

    pub fn queue_delete(&mut self, persister: &Persister, filter: Document) {
        let command = self.command(persister);
        command.writer.delete_one(filter);
        command.expect.removed += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Executes every queued bulk operation. A count mismatch between what
    /// was queued and what the store reports fails the whole flush; with an
    /// optimistic filter, a stale version surfaces here as a missed match.
    pub async fn execute(self) -> Result<()> {
        for (collection, command) in self.commands {
            let expect = command.expect;
            let result = command.writer.execute().await?;

            if result.inserted != expect.inserted
                || result.matched != expect.matched
                || result.removed != expect.removed
            {
                tracing::warn!(
                    %collection,
                    expected = ?expect,
                    reported = ?result,
                    "bulk write effect counts do not match"
                );
                return Err(Error::flush(format!(
                    "collection {:?}: expected {} inserts, {} matches, {} removes; \
                     store reported {}, {}, {}",
                    collection,
                    expect.inserted,
                    expect.matched,
                    expect.removed,
                    result.inserted,
                    result.matched,
                    result.removed,
                )));
            }

            tracing::debug!(
                %collection,
                inserted = result.inserted,
                matched = result.matched,
                removed = result.removed,
                "bulk write applied"
            );
        }
        Ok(())
    }
}
