use strata_core::doc::{Document, Value};
use strata_core::mapping::MappingId;
use strata_core::object::{ChangeObserver, ObjectHandle, ObjectValue};

/// How a session currently relates to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Tracked; mutations are written out at the next flush.
    Managed,
    /// Known to the session but no longer tracked. Persisting a detached
    /// object is an error.
    Detached,
    /// Scheduled for deletion at the next flush.
    Removed,
}

/// Work scheduled for an object at the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScheduledOp {
    None,
    Insert,
    Delete,
    /// Explicitly re-persisted; re-serialize and diff even under
    /// explicit-only change tracking.
    DirtyCheck,
    /// Explicitly saved; the full document is written out in place of a
    /// diff.
    Replace,
}

/// Per-object session bookkeeping: lifecycle state, scheduled work, the
/// object's concrete mapping, and the document snapshot the next dirty
/// check diffs against.
pub(crate) struct ObjectLinks {
    pub state: ObjectState,
    pub op: ScheduledOp,
    pub mapping: MappingId,
    pub handle: ObjectHandle,
    pub snapshot: Option<Document>,
    pub observer: Option<ChangeObserver>,
}

impl ObjectLinks {
    /// Links for a newly persisted object, pending insertion.
    pub fn inserted(mapping: MappingId, handle: ObjectHandle) -> Self {
        ObjectLinks {
            state: ObjectState::Managed,
            op: ScheduledOp::Insert,
            mapping,
            handle,
            snapshot: None,
            observer: None,
        }
    }

    /// Links for an object materialized from a stored document.
    pub fn loaded(
        mapping: MappingId,
        handle: ObjectHandle,
        snapshot: Document,
        observer: Option<ChangeObserver>,
    ) -> Self {
        ObjectLinks {
            state: ObjectState::Managed,
            op: ScheduledOp::None,
            mapping,
            handle,
            snapshot: Some(snapshot),
            observer,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.state == ObjectState::Managed
    }

    /// True if the object has never reached the store.
    pub fn never_persisted(&self) -> bool {
        self.op == ScheduledOp::Insert && self.snapshot.is_none()
    }
}

/// Projects an object-side identifier into its document form. Identifiers
/// are restricted to key-shaped values.
pub(crate) fn id_value(value: &ObjectValue) -> Option<Value> {
    match value {
        ObjectValue::String(text) => Some(Value::String(text.clone())),
        ObjectValue::I64(n) => Some(Value::I64(*n)),
        ObjectValue::Binary(bytes) => Some(Value::Binary(bytes.clone())),
        _ => None,
    }
}

/// The object-side form of a document identifier.
pub(crate) fn object_id(value: &Value) -> Option<ObjectValue> {
    match value {
        Value::String(text) => Some(ObjectValue::String(text.clone())),
        Value::I64(n) => Some(ObjectValue::I64(*n)),
        Value::Binary(bytes) => Some(ObjectValue::Binary(bytes.clone())),
        _ => None,
    }
}
