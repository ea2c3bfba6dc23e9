use crate::doc::Value;
use crate::error::FieldError;
use crate::object::{ChangeObserver, HandleKey, ObjectHandle};

/// State carried through one write pass: the dotted path (grown and
/// restored around each recursive call), the accumulated field errors, and
/// the visited-object list used to reject recursive embedding.
pub struct WriteContext {
    path: Vec<String>,
    errors: Vec<FieldError>,
    visited: Vec<HandleKey>,
}

impl WriteContext {
    pub fn new() -> Self {
        WriteContext {
            path: Vec::new(),
            errors: Vec::new(),
            visited: Vec::new(),
        }
    }

    pub fn enter(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    pub fn exit(&mut self) {
        self.path.pop();
    }

    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Records a validation error at the current path. The pass continues;
    /// errors are aggregated, never fail-fast.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError::new(self.current_path(), message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Registers the object for the duration of its conversion. Returns
    /// false if the object is already on the stack, i.e. it embeds itself.
    pub fn push_visited(&mut self, handle: &ObjectHandle) -> bool {
        let key = handle.key();
        if self.visited.contains(&key) {
            return false;
        }
        self.visited.push(key);
        true
    }

    pub fn pop_visited(&mut self) {
        self.visited.pop();
    }
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new()
    }
}

/// State carried through one read pass: path and errors as on the write
/// side, plus the parent-object stack feeding back-reference properties,
/// the owning document's identifier for virtual identity properties, and an
/// optional change observer attached to every materialized object.
pub struct ReadContext {
    path: Vec<String>,
    errors: Vec<FieldError>,
    parents: Vec<ObjectHandle>,
    entity_id: Option<Value>,
    observer: Option<ChangeObserver>,
}

impl ReadContext {
    pub fn new() -> Self {
        ReadContext {
            path: Vec::new(),
            errors: Vec::new(),
            parents: Vec::new(),
            entity_id: None,
            observer: None,
        }
    }

    pub fn with_observer(observer: ChangeObserver) -> Self {
        let mut cx = Self::new();
        cx.observer = Some(observer);
        cx
    }

    pub fn enter(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    pub fn exit(&mut self) {
        self.path.pop();
    }

    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError::new(self.current_path(), message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    pub fn push_parent(&mut self, handle: ObjectHandle) {
        self.parents.push(handle);
    }

    pub fn pop_parent(&mut self) {
        self.parents.pop();
    }

    /// The object owning the one currently being read, if any.
    pub fn parent(&self) -> Option<&ObjectHandle> {
        match self.parents.len() {
            0 | 1 => None,
            n => Some(&self.parents[n - 2]),
        }
    }

    pub fn set_entity_id(&mut self, id: Value) {
        self.entity_id = Some(id);
    }

    pub fn entity_id(&self) -> Option<&Value> {
        self.entity_id.as_ref()
    }

    /// Attaches the pass observer, if any, to a freshly materialized object.
    pub fn observe(&self, handle: &ObjectHandle) {
        if let Some(observer) = &self.observer {
            handle.observe(observer.clone());
        }
    }
}

impl Default for ReadContext {
    fn default() -> Self {
        Self::new()
    }
}
