mod support;

use support::{fixture, fixture_with, Op};

use strata::core::mapping::ChangeTracking;
use strata::core::object::{ObjectHandle, ObjectValue};
use strata::core::Value;
use strata::{document, ObjectState};

use pretty_assertions::assert_eq;

#[tokio::test]
async fn persist_and_flush_inserts_with_initial_version() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("name", "write docs");

    f.session.persist(&task).unwrap();
    let id = f.session.id_of(&task).unwrap();
    f.session.flush().await.unwrap();

    let tasks = f.store.named("tasks");
    let id_text = id.as_str().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks.get(id_text).unwrap(),
        document! {
            "_id" => id_text,
            "__t" => "Task",
            "name" => "write docs",
            "__v" => 1i64,
        }
    );
}

#[tokio::test]
async fn identifier_is_assigned_once_at_first_persist() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("name", "x");

    assert!(f.session.id_of(&task).is_none());
    f.session.persist(&task).unwrap();
    let id = f.session.id_of(&task).unwrap();

    // Re-persisting does not reassign.
    f.session.persist(&task).unwrap();
    assert_eq!(f.session.id_of(&task), Some(id));
}

#[tokio::test]
async fn clean_session_flushes_nothing() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("name", "x");
    f.session.persist(&task).unwrap();
    f.session.flush().await.unwrap();

    let tasks = f.store.named("tasks");
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops(), vec![]);
}

#[tokio::test]
async fn dirty_check_updates_with_version_filter() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    task.set("name", "y");
    tasks.clear_log();
    f.session.flush().await.unwrap();

    assert_eq!(
        tasks.ops(),
        vec![Op::UpdateOne {
            filter: document! { "_id" => "t1", "__v" => 1i64 },
            update: document! {
                "$set" => document! { "name" => "y" },
                "$inc" => document! { "__v" => 1i64 },
            },
        }]
    );
    assert_eq!(
        tasks.get("t1").unwrap().get("__v"),
        Some(&Value::I64(2))
    );

    // The snapshot advanced with the write; nothing further is pending.
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops(), vec![]);
}

#[tokio::test]
async fn removed_field_is_unset() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "note" => "n", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    task.remove("note");
    tasks.clear_log();
    f.session.flush().await.unwrap();

    assert_eq!(
        tasks.ops(),
        vec![Op::UpdateOne {
            filter: document! { "_id" => "t1", "__v" => 1i64 },
            update: document! {
                "$unset" => document! { "note" => 1i64 },
                "$inc" => document! { "__v" => 1i64 },
            },
        }]
    );
}

#[tokio::test]
async fn stale_version_fails_the_flush_and_preserves_state() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();

    // A concurrent writer bumped the stored version.
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "theirs", "__v" => 7i64,
    });

    task.set("name", "mine");
    let err = f.session.flush().await.unwrap_err();
    assert!(err.is_flush());

    // The object is still managed and still dirty; the conflict write
    // never landed.
    assert!(f.session.contains(&task));
    assert_eq!(
        f.store.named("tasks").get("t1").unwrap().get("name"),
        Some(&Value::from("theirs"))
    );
}

#[tokio::test]
async fn find_consults_the_identity_map_first() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let first = f.session.find(f.task, "t1".into()).await.unwrap();
    let second = f.session.find(f.task, "t1".into()).await.unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(
        tasks
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::FindOne(_)))
            .count(),
        1
    );
}

#[tokio::test]
async fn find_missing_document_is_not_found() {
    let f = fixture();
    let err = f.session.find(f.task, "nope".into()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn remove_deletes_with_version_filter_and_evicts() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    f.session.remove(&task).unwrap();
    assert_eq!(f.session.state_of(&task), Some(ObjectState::Removed));

    tasks.clear_log();
    f.session.flush().await.unwrap();

    assert_eq!(
        tasks.ops(),
        vec![Op::DeleteOne(document! { "_id" => "t1", "__v" => 1i64 })]
    );
    assert_eq!(tasks.len(), 0);
    assert!(!f.session.contains(&task));
    assert_eq!(f.session.state_of(&task), None);
}

#[tokio::test]
async fn remove_of_pending_insert_never_reaches_the_store() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("name", "x");
    f.session.persist(&task).unwrap();
    f.session.remove(&task).unwrap();
    f.session.flush().await.unwrap();

    assert_eq!(f.store.named("tasks").len(), 0);
    assert_eq!(f.session.state_of(&task), None);
}

#[tokio::test]
async fn remove_of_an_unmanaged_object_is_an_error() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    assert!(f.session.remove(&task).unwrap_err().is_precondition());
}

#[tokio::test]
async fn detached_objects_cannot_be_persisted() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    f.session.detach(&task);
    assert_eq!(f.session.state_of(&task), Some(ObjectState::Detached));

    // The identifier survives: the object did reach the store.
    assert_eq!(task.get("id"), ObjectValue::from("t1"));
    assert!(f.session.persist(&task).unwrap_err().is_precondition());
}

#[tokio::test]
async fn detach_clears_the_identifier_of_a_pending_insert() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("name", "x");
    f.session.persist(&task).unwrap();
    assert!(task.has("id"));

    f.session.detach(&task);
    assert!(!task.has("id"));
}

#[tokio::test]
async fn detached_identifier_can_be_reused() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    f.session.detach(&task);

    // The identity map slot is free again.
    let again = f.session.find(f.task, "t1".into()).await.unwrap();
    assert!(!again.ptr_eq(&task));
}

#[tokio::test]
async fn clear_detaches_everything() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    f.session.clear();

    assert_eq!(f.session.state_of(&task), Some(ObjectState::Detached));
    assert!(!f.session.contains(&task));
}

#[tokio::test]
async fn persist_cascades_to_reachable_owners() {
    let f = fixture();
    let person = ObjectHandle::new("Person");
    person.set("name", "ada");
    let task = ObjectHandle::new("Task");
    task.set("name", "x");
    task.set("owner", ObjectValue::Object(person.clone()));

    f.session.persist(&task).unwrap();
    assert!(f.session.contains(&person));

    f.session.flush().await.unwrap();
    assert_eq!(f.store.named("people").len(), 1);
    assert_eq!(f.store.named("tasks").len(), 1);

    // The owner is stored as a bare identifier.
    let person_id = f.session.id_of(&person).unwrap();
    let task_id = f.session.id_of(&task).unwrap();
    let stored = f
        .store
        .named("tasks")
        .get(task_id.as_str().unwrap())
        .unwrap();
    assert_eq!(stored.get("owner"), Some(&person_id));
}

#[tokio::test]
async fn conflicting_identifier_is_rejected() {
    let f = fixture();
    let a = ObjectHandle::new("Task");
    a.set("id", "same");
    a.set("name", "a");
    let b = ObjectHandle::new("Task");
    b.set("id", "same");
    b.set("name", "b");

    f.session.persist(&a).unwrap();
    assert!(f.session.persist(&b).unwrap_err().is_precondition());
}

#[tokio::test]
async fn subtype_documents_materialize_as_their_runtime_type() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "b1", "__t" => "BugTask", "name" => "crash", "severity" => 2i64, "__v" => 1i64,
    });

    let bug = f.session.find(f.task, "b1".into()).await.unwrap();
    assert_eq!(bug.type_tag().as_str(), "BugTask");
    assert_eq!(bug.get("severity"), ObjectValue::I64(2));

    // Looking it up through the subclass yields the same object.
    let again = f.session.find(f.bug, "b1".into()).await.unwrap();
    assert!(again.ptr_eq(&bug));
}

#[tokio::test]
async fn find_through_the_wrong_subclass_fails() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    assert!(f.session.find(f.bug, "t1".into()).await.is_err());
}

#[tokio::test]
async fn find_all_narrows_to_the_declared_branch() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });
    tasks.seed(document! {
        "_id" => "b1", "__t" => "BugTask", "name" => "crash", "severity" => 1i64, "__v" => 1i64,
    });

    let all = f
        .session
        .find_all(f.task, document! {})
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let bugs = f.session.find_all(f.bug, document! {}).await.unwrap();
    assert_eq!(bugs.len(), 1);
    assert_eq!(bugs[0].type_tag().as_str(), "BugTask");
}

#[tokio::test]
async fn explicit_tracking_only_writes_repersisted_objects() {
    let f = fixture_with(ChangeTracking::DeferredExplicit);
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    task.set("name", "y");
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops(), vec![]);

    f.session.persist(&task).unwrap();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops().len(), 1);
    assert_eq!(
        tasks.get("t1").unwrap().get("name"),
        Some(&Value::from("y"))
    );
}

#[tokio::test]
async fn save_replaces_the_whole_document() {
    let f = fixture();
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "note" => "n", "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    task.set("name", "y");
    task.remove("note");
    f.session.save(&task).unwrap();
    tasks.clear_log();
    f.session.flush().await.unwrap();

    assert_eq!(
        tasks.ops(),
        vec![Op::ReplaceOne {
            filter: document! { "_id" => "t1", "__v" => 1i64 },
            doc: document! { "_id" => "t1", "__t" => "Task", "name" => "y", "__v" => 2i64 },
        }]
    );
    // The dropped field is gone, not `$unset`: the whole document was
    // written.
    assert_eq!(
        tasks.get("t1").unwrap(),
        document! { "_id" => "t1", "__t" => "Task", "name" => "y", "__v" => 2i64 }
    );

    // The replacement became the snapshot; nothing further is pending.
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops(), vec![]);
}

#[tokio::test]
async fn save_from_scratch_replaces_by_identifier() {
    let f = fixture();
    let people = f.store.named("people");
    people.seed(document! { "_id" => "p1", "name" => "old" });

    let person = ObjectHandle::new("Person");
    person.set("id", "p1");
    person.set("name", "new");
    f.session.save(&person).unwrap();
    f.session.flush().await.unwrap();

    // No lookup happens; the document is replaced sight unseen.
    assert_eq!(
        people.ops(),
        vec![Op::ReplaceOne {
            filter: document! { "_id" => "p1" },
            doc: document! { "_id" => "p1", "name" => "new" },
        }]
    );

    // The object is managed afterwards; later changes flow as diffs.
    assert!(f.session.contains(&person));
    person.set("name", "newer");
    people.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(
        people.ops(),
        vec![Op::UpdateOne {
            filter: document! { "_id" => "p1" },
            update: document! { "$set" => document! { "name" => "newer" } },
        }]
    );
}

#[tokio::test]
async fn save_of_a_missing_document_fails_the_flush() {
    let f = fixture();
    let person = ObjectHandle::new("Person");
    person.set("id", "ghost");
    person.set("name", "x");
    f.session.save(&person).unwrap();

    let err = f.session.flush().await.unwrap_err();
    assert!(err.is_flush());
    assert!(f.session.contains(&person));
}

#[tokio::test]
async fn save_of_an_unloaded_versioned_object_is_rejected() {
    let f = fixture();
    let task = ObjectHandle::new("Task");
    task.set("id", "t1");
    task.set("name", "x");
    assert!(f.session.save(&task).unwrap_err().is_precondition());
}

#[tokio::test]
async fn observed_tracking_writes_only_mutated_objects() {
    let f = fixture_with(ChangeTracking::Observed);
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x", "__v" => 1i64,
    });
    tasks.seed(document! {
        "_id" => "t2", "__t" => "Task", "name" => "untouched", "__v" => 1i64,
    });

    let touched = f.session.find(f.task, "t1".into()).await.unwrap();
    let _untouched = f.session.find(f.task, "t2".into()).await.unwrap();

    touched.set("name", "y");
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops().len(), 1);

    // The observer re-arms after the flush.
    touched.set("name", "z");
    tasks.clear_log();
    f.session.flush().await.unwrap();
    assert_eq!(tasks.ops().len(), 1);
    assert_eq!(
        tasks.get("t1").unwrap().get("__v"),
        Some(&Value::I64(3))
    );
}

#[tokio::test]
async fn observed_tracking_sees_embedded_mutations_after_a_flush() {
    let f = fixture_with(ChangeTracking::Observed);
    let tasks = f.store.named("tasks");
    tasks.seed(document! {
        "_id" => "t1", "__t" => "Task", "name" => "x",
        "address" => document! { "city" => "a" },
        "__v" => 1i64,
    });

    let task = f.session.find(f.task, "t1".into()).await.unwrap();
    task.set("name", "y");
    f.session.flush().await.unwrap();

    // The re-armed observer covers embedded objects, so a mutation that
    // never touches the root still gets written out.
    let address = task.get("address");
    address.as_object().unwrap().set("city", "b");
    tasks.clear_log();
    f.session.flush().await.unwrap();

    assert_eq!(tasks.ops().len(), 1);
    let stored = tasks.get("t1").unwrap();
    assert_eq!(
        stored.get("address"),
        Some(&Value::from(document! { "city" => "b" }))
    );
    assert_eq!(stored.get("__v"), Some(&Value::I64(3)));
}
