//! Owner-scoped to-do gate integration tests: cross-tenant isolation and the
//! completion timestamp invariant.

use tempfile::tempdir;

use todod::error::AppError;
use todod::identity::{Principal, SessionManager, TokenCodec};
use todod::storage::SharedStore;
use todod::todos::{TodoGate, TodoPatch};

async fn setup(root: &std::path::Path) -> (TodoGate, Principal, Principal) {
    let store = SharedStore::new(root).expect("store");
    let codec = TokenCodec::new("it-secret");
    let sessions = SessionManager::new(store.clone(), codec);
    let (alice, _) = sessions.register("alice@example.com", "secret1").await.expect("alice");
    let (bob, _) = sessions.register("bob@example.com", "secret2").await.expect("bob");
    (TodoGate::new(store), alice, bob)
}

fn patch(text: Option<&str>, completed: Option<bool>) -> TodoPatch {
    TodoPatch { text: text.map(str::to_string), completed }
}

#[tokio::test]
async fn create_trims_and_defaults_to_incomplete() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;

    let todo = gate.create(&alice, "  buy milk  ").await.expect("create");
    assert_eq!(todo.text, "buy milk");
    assert_eq!(todo.owner, alice.id);
    assert!(!todo.completed);
    assert!(todo.completed_at.is_none());

    let empty = gate.create(&alice, "   ").await;
    assert!(matches!(empty, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn list_returns_only_own_todos() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, bob) = setup(tmp.path()).await;

    gate.create(&alice, "one").await.expect("create");
    gate.create(&alice, "two").await.expect("create");
    gate.create(&bob, "three").await.expect("create");

    let alices = gate.list(&alice).await.expect("list");
    assert_eq!(alices.len(), 2);
    assert!(alices.iter().all(|t| t.owner == alice.id));
    assert_eq!(gate.list(&bob).await.expect("list").len(), 1);
}

#[tokio::test]
async fn foreign_ids_are_indistinguishable_from_missing() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, bob) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "private").await.expect("create");

    let get = gate.get_by_id(&bob, &todo.id).await;
    let upd = gate.update(&bob, &todo.id, patch(None, Some(true))).await;
    let del = gate.remove(&bob, &todo.id).await;
    assert!(matches!(get, Err(AppError::NotFound { .. })));
    assert!(matches!(upd, Err(AppError::NotFound { .. })));
    assert!(matches!(del, Err(AppError::NotFound { .. })));

    // untouched for the owner
    let mine = gate.get_by_id(&alice, &todo.id).await.expect("get");
    assert!(!mine.completed);

    let missing = gate.get_by_id(&alice, "3b2c6a9e-0000-0000-0000-000000000000").await;
    assert!(matches!(missing, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn completion_invariant_holds_across_transitions() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "walk the dog").await.expect("create");

    let done = gate.update(&alice, &todo.id, patch(None, Some(true))).await.expect("complete");
    assert!(done.completed);
    let stamped = done.completed_at.expect("completedAt set");
    assert!(stamped > 0);

    let fetched = gate.get_by_id(&alice, &todo.id).await.expect("get");
    assert_eq!(fetched.completed, fetched.completed_at.is_some());

    let undone = gate.update(&alice, &todo.id, patch(None, Some(false))).await.expect("uncomplete");
    assert!(!undone.completed);
    assert!(undone.completed_at.is_none());
}

#[tokio::test]
async fn uncomplete_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "laundry").await.expect("create");

    let first = gate.update(&alice, &todo.id, patch(None, Some(false))).await.expect("update");
    let second = gate.update(&alice, &todo.id, patch(None, Some(false))).await.expect("update");
    assert_eq!(first, second);
    assert!(!second.completed);
    assert!(second.completed_at.is_none());
}

#[tokio::test]
async fn patch_omitting_completed_resets_completion() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "water plants").await.expect("create");

    gate.update(&alice, &todo.id, patch(None, Some(true))).await.expect("complete");

    // A text-only patch resets the todo to incomplete.
    let updated = gate.update(&alice, &todo.id, patch(Some("water the plants"), None)).await.expect("update");
    assert_eq!(updated.text, "water the plants");
    assert!(!updated.completed);
    assert!(updated.completed_at.is_none());
}

#[tokio::test]
async fn update_validates_text() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "original").await.expect("create");

    let empty = gate.update(&alice, &todo.id, patch(Some("   "), None)).await;
    assert!(matches!(empty, Err(AppError::Validation { .. })));

    let trimmed = gate.update(&alice, &todo.id, patch(Some("  renamed  "), None)).await.expect("update");
    assert_eq!(trimmed.text, "renamed");
}

#[tokio::test]
async fn remove_returns_the_deleted_record() {
    let tmp = tempdir().expect("tempdir");
    let (gate, alice, _) = setup(tmp.path()).await;
    let todo = gate.create(&alice, "temporary").await.expect("create");

    let removed = gate.remove(&alice, &todo.id).await.expect("remove");
    assert_eq!(removed.id, todo.id);
    assert_eq!(removed.text, "temporary");

    let gone = gate.get_by_id(&alice, &todo.id).await;
    assert!(matches!(gone, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn todos_survive_store_reopen() {
    let tmp = tempdir().expect("tempdir");
    let (alice, todo_id) = {
        let (gate, alice, _) = setup(tmp.path()).await;
        let todo = gate.create(&alice, "persist me").await.expect("create");
        (alice, todo.id)
    };
    let store = SharedStore::new(tmp.path()).expect("reopen");
    let gate = TodoGate::new(store);
    let fetched = gate.get_by_id(&alice, &todo_id).await.expect("get after reopen");
    assert_eq!(fetched.text, "persist me");
}
