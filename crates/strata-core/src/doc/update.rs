use super::{Document, Value};

/// A partial-update document: `$set` assignments, `$unset` removals, and
/// `$inc` counters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    set: Document,
    unset: Vec<String>,
    inc: Document,
}

impl UpdateDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the minimal update turning `old` into `new`, at top-level
    /// field granularity. Fields named in `exclude` (identifier, version)
    /// never appear in the result.
    pub fn diff(old: &Document, new: &Document, exclude: &[&str]) -> Self {
        let mut update = UpdateDoc::new();

        for (field, value) in new {
            if exclude.contains(&field.as_str()) {
                continue;
            }
            match old.get(field) {
                Some(prev) if prev.doc_eq(value) => {}
                _ => update.set.insert(field.clone(), value.clone()),
            }
        }

        for field in old.fields() {
            if exclude.contains(&field.as_str()) {
                continue;
            }
            if !new.contains_field(field) {
                update.unset.push(field.clone());
            }
        }

        update
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.set.insert(field, value);
    }

    pub fn unset(&mut self, field: impl Into<String>) {
        self.unset.push(field.into());
    }

    pub fn inc(&mut self, field: impl Into<String>, by: i64) {
        self.inc.insert(field, by);
    }

    /// True if applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty()
    }

    pub fn set_fields(&self) -> &Document {
        &self.set
    }

    pub fn unset_fields(&self) -> &[String] {
        &self.unset
    }

    pub fn inc_fields(&self) -> &Document {
        &self.inc
    }

    /// Renders the update as a `$set`/`$unset`/`$inc` operator document.
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        if !self.set.is_empty() {
            doc.insert("$set", self.set);
        }
        if !self.unset.is_empty() {
            let mut unset = Document::new();
            for field in self.unset {
                unset.insert(field, 1i64);
            }
            doc.insert("$unset", unset);
        }
        if !self.inc.is_empty() {
            doc.insert("$inc", self.inc);
        }
        doc
    }
}
