use super::{ObjectValue, TypeTag};

use by_address::ByAddress;
use indexmap::IndexMap;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A shared, mutable domain object. All field mutation goes through the
/// handle so the one-shot change observer sees it.
#[derive(Clone)]
pub struct ObjectHandle {
    data: Rc<RefCell<ObjectData>>,
}

/// Keys maps by the object's allocation address, not its contents.
pub type HandleKey = ByAddress<Rc<RefCell<ObjectData>>>;

pub struct ObjectData {
    type_tag: TypeTag,
    fields: IndexMap<String, ObjectValue>,
    observer: Option<ChangeObserver>,
}

/// A one-shot mutation signal. The first observed mutation sets the shared
/// flag and destroys the observer.
#[derive(Clone)]
pub struct ChangeObserver {
    dirty: Rc<Cell<bool>>,
}

impl ChangeObserver {
    pub fn new() -> Self {
        ChangeObserver {
            dirty: Rc::new(Cell::new(false)),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn fire(&self) {
        self.dirty.set(true);
    }
}

impl Default for ChangeObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHandle {
    pub fn new(type_tag: impl Into<TypeTag>) -> Self {
        ObjectHandle {
            data: Rc::new(RefCell::new(ObjectData {
                type_tag: type_tag.into(),
                fields: IndexMap::new(),
                observer: None,
            })),
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.data.borrow().type_tag.clone()
    }

    pub fn get(&self, field: &str) -> ObjectValue {
        self.data
            .borrow()
            .fields
            .get(field)
            .cloned()
            .unwrap_or(ObjectValue::Null)
    }

    pub fn has(&self, field: &str) -> bool {
        self.data.borrow().fields.contains_key(field)
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<ObjectValue>) {
        let mut data = self.data.borrow_mut();
        data.fields.insert(field.into(), value.into());
        if let Some(observer) = data.observer.take() {
            observer.fire();
        }
    }

    pub fn remove(&self, field: &str) -> Option<ObjectValue> {
        let mut data = self.data.borrow_mut();
        let removed = data.fields.shift_remove(field);
        if removed.is_some() {
            if let Some(observer) = data.observer.take() {
                observer.fire();
            }
        }
        removed
    }

    /// Writes a field without firing the observer. Used when materializing
    /// an object from a document.
    pub fn load(&self, field: impl Into<String>, value: impl Into<ObjectValue>) {
        self.data.borrow_mut().fields.insert(field.into(), value.into());
    }

    /// Removes a field without firing the observer.
    pub fn unload(&self, field: &str) -> Option<ObjectValue> {
        self.data.borrow_mut().fields.shift_remove(field)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.data.borrow().fields.keys().cloned().collect()
    }

    /// Attaches the one-shot observer, replacing any previous one.
    pub fn observe(&self, observer: ChangeObserver) {
        self.data.borrow_mut().observer = Some(observer);
    }

    pub fn clear_observer(&self) {
        self.data.borrow_mut().observer = None;
    }

    /// Identity key for maps: two handles are the same object iff they share
    /// an allocation.
    pub fn key(&self) -> HandleKey {
        ByAddress(self.data.clone())
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl core::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("ObjectHandle")
            .field("type", &data.type_tag.as_str())
            .field("fields", &data.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mutation_fires_and_consumes_observer() {
        let obj = ObjectHandle::new("Task");
        let observer = ChangeObserver::new();
        obj.observe(observer.clone());

        assert!(!observer.is_dirty());
        obj.set("name", "x");
        assert!(observer.is_dirty());

        // Second mutation has no observer left to fire.
        let second = ChangeObserver::new();
        obj.set("name", "y");
        assert!(!second.is_dirty());
    }

    #[test]
    fn load_does_not_fire_observer() {
        let obj = ObjectHandle::new("Task");
        let observer = ChangeObserver::new();
        obj.observe(observer.clone());

        obj.load("name", "x");
        assert!(!observer.is_dirty());
    }

    #[test]
    fn handle_identity() {
        let a = ObjectHandle::new("Task");
        let b = a.clone();
        let c = ObjectHandle::new("Task");

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(a.key() == b.key());
        assert!(a.key() != c.key());
    }
}
