//! Ownership-scoped to-do operations.
//!
//! Every operation is implicitly filtered by the acting principal's id, so a
//! record owned by another principal and a record that does not exist are
//! indistinguishable to the caller. Completion is a two-state machine:
//! transitioning to complete stamps `completedAt`, transitioning to
//! incomplete clears it, and the invariant `completed == true` iff
//! `completedAt != null` is enforced here at the update boundary.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::storage::SharedStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<i64>,
}

/// Typed partial update. Unknown fields in a request body are dropped at
/// deserialization and never reach the store.
///
/// A patch that omits `completed` resets the todo to incomplete; this matches
/// the historical update contract of the API (see DESIGN.md).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Owner-scoped gate over the todo collection. Holds no state beyond the
/// store handle; the principal is injected per call.
#[derive(Clone)]
pub struct TodoGate {
    store: SharedStore,
}

impl TodoGate {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, principal: &Principal, text: &str) -> AppResult<Todo> {
        let text = text.trim();
        if text.is_empty() {
            return Err(empty_text());
        }
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            owner: principal.id.clone(),
            text: text.to_string(),
            completed: false,
            completed_at: None,
        };
        let mut store = self.store.0.write().await;
        store.insert_todo(todo.clone()).map_err(store_failed)?;
        Ok(todo)
    }

    /// All todos owned by the principal, in store order.
    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Todo>> {
        let store = self.store.0.read().await;
        Ok(store.todos_for(&principal.id))
    }

    pub async fn get_by_id(&self, principal: &Principal, id: &str) -> AppResult<Todo> {
        let store = self.store.0.read().await;
        store.todo_for(&principal.id, id).ok_or_else(not_found)
    }

    /// Apply a validated patch to an owned todo.
    ///
    /// `completed: true` stamps the completion time server-side, overriding
    /// any client-supplied value; `completed` false or absent forces the todo
    /// back to incomplete with a cleared timestamp.
    pub async fn update(&self, principal: &Principal, id: &str, patch: TodoPatch) -> AppResult<Todo> {
        let text = match patch.text {
            Some(ref t) => {
                let t = t.trim();
                if t.is_empty() {
                    return Err(empty_text());
                }
                Some(t.to_string())
            }
            None => None,
        };
        let completed = patch.completed == Some(true);
        let completed_at = completed.then(|| Utc::now().timestamp_millis());

        let mut store = self.store.0.write().await;
        store
            .modify_todo(&principal.id, id, |todo| {
                if let Some(t) = text {
                    todo.text = t;
                }
                todo.completed = completed;
                todo.completed_at = completed_at;
            })
            .map_err(store_failed)?
            .ok_or_else(not_found)
    }

    /// Owner-scoped delete returning the removed record.
    pub async fn remove(&self, principal: &Principal, id: &str) -> AppResult<Todo> {
        let mut store = self.store.0.write().await;
        store
            .remove_todo(&principal.id, id)
            .map_err(store_failed)?
            .ok_or_else(not_found)
    }
}

fn empty_text() -> AppError {
    AppError::validation("empty_text", "text must not be empty")
}

fn not_found() -> AppError {
    AppError::not_found("todo_not_found", "no such todo")
}

fn store_failed(e: anyhow::Error) -> AppError {
    AppError::internal("store_failed", e.to_string())
}
