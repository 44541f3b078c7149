//!
//! todod storage module
//! --------------------
//! On-disk document store holding the two persisted collections, principals
//! and todos, as one JSON file each (`users.json`, `todos.json`) under a
//! configured root folder. Collections are loaded once at open and flushed
//! wholesale after every mutation.
//!
//! Key responsibilities:
//! - Email uniqueness on principal insert.
//! - Token-sequence mutation (append on login, pull on logout).
//! - Owner-scoped todo lookup, update and delete; a caller asking with the
//!   wrong owner sees the same absence as a missing id.
//!
//! The public API centers around the `Store` type, which is wrapped in the
//! thread-safe `SharedStore` (`Arc<RwLock<Store>>`) used by every component.
//! A single locked mutation is atomic; concurrent requests touching different
//! documents never interfere.

use std::{fs, path::{Path, PathBuf}};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;

use crate::identity::{Principal, TokenEntry};
use crate::todos::Todo;

const USERS_FILE: &str = "users.json";
const TODOS_FILE: &str = "todos.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Cloneable handle shared by all components. Access suspends at the lock;
/// hold the guard only for the duration of one operation.
#[derive(Clone)]
pub struct SharedStore(pub Arc<RwLock<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self(Arc::new(RwLock::new(Store::open(root)?))))
    }
}

pub struct Store {
    root: PathBuf,
    users: Vec<Principal>,
    todos: Vec<Todo>,
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let raw = serde_json::to_vec_pretty(items)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

impl Store {
    /// Open a store rooted at the given folder, creating it if absent.
    /// Missing collection files read as empty collections.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store root {}", root.display()))?;
        let users = load_collection(&root.join(USERS_FILE))?;
        let todos = load_collection(&root.join(TODOS_FILE))?;
        debug!(users = users.len(), todos = todos.len(), "store.open");
        Ok(Self { root, users, todos })
    }

    fn flush_users(&self) -> Result<()> {
        write_collection(&self.root.join(USERS_FILE), &self.users)
    }

    fn flush_todos(&self) -> Result<()> {
        write_collection(&self.root.join(TODOS_FILE), &self.todos)
    }

    // --- principals ---

    /// Insert a principal, enforcing email uniqueness.
    pub fn insert_user(&mut self, user: Principal) -> Result<(), StoreError> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        self.users.push(user);
        self.flush_users()?;
        Ok(())
    }

    pub fn user_by_id(&self, id: &str) -> Option<&Principal> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&Principal> {
        // Exact, case-sensitive match
        self.users.iter().find(|u| u.email == email)
    }

    /// Append a token entry and return the updated principal.
    pub fn push_token(&mut self, id: &str, entry: TokenEntry) -> Result<Principal> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .with_context(|| format!("no principal {id}"))?;
        user.tokens.push(entry);
        let updated = user.clone();
        self.flush_users()?;
        Ok(updated)
    }

    /// Remove every entry carrying exactly this token string. Removing a
    /// token that is not present is not an error.
    pub fn pull_token(&mut self, id: &str, token: &str) -> Result<()> {
        let Some(user) = self.users.iter_mut().find(|u| u.id == id) else {
            return Ok(());
        };
        let before = user.tokens.len();
        user.tokens.retain(|t| t.token != token);
        if user.tokens.len() != before {
            self.flush_users()?;
        }
        Ok(())
    }

    // --- todos ---

    pub fn insert_todo(&mut self, todo: Todo) -> Result<()> {
        self.todos.push(todo);
        self.flush_todos()
    }

    pub fn todos_for(&self, owner: &str) -> Vec<Todo> {
        self.todos.iter().filter(|t| t.owner == owner).cloned().collect()
    }

    pub fn todo_for(&self, owner: &str, id: &str) -> Option<Todo> {
        self.todos.iter().find(|t| t.owner == owner && t.id == id).cloned()
    }

    /// Find-and-modify under the store lock: apply `apply` to the matching
    /// owner-scoped document and return the updated copy, or None when no
    /// document matches both id and owner.
    pub fn modify_todo(
        &mut self,
        owner: &str,
        id: &str,
        apply: impl FnOnce(&mut Todo),
    ) -> Result<Option<Todo>> {
        let Some(todo) = self.todos.iter_mut().find(|t| t.owner == owner && t.id == id) else {
            return Ok(None);
        };
        apply(todo);
        let updated = todo.clone();
        self.flush_todos()?;
        Ok(Some(updated))
    }

    /// Owner-scoped delete returning the removed document.
    pub fn remove_todo(&mut self, owner: &str, id: &str) -> Result<Option<Todo>> {
        let Some(pos) = self.todos.iter().position(|t| t.owner == owner && t.id == id) else {
            return Ok(None);
        };
        let removed = self.todos.remove(pos);
        self.flush_todos()?;
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn principal(email: &str) -> Principal {
        Principal::new(email, "phc".into())
    }

    fn todo(owner: &str, text: &str) -> Todo {
        Todo {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            text: text.to_string(),
            completed: false,
            completed_at: None,
        }
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let tmp = tempdir().expect("tempdir");
        let mut store = Store::open(tmp.path()).expect("open");
        store.insert_user(principal("a@b.co")).expect("first insert");
        let dup = store.insert_user(principal("a@b.co"));
        assert!(matches!(dup, Err(StoreError::DuplicateEmail)));
    }

    #[test]
    fn collections_survive_reopen() {
        let tmp = tempdir().expect("tempdir");
        let alice_id;
        {
            let mut store = Store::open(tmp.path()).expect("open");
            let alice = principal("alice@example.com");
            alice_id = alice.id.clone();
            store.insert_user(alice).expect("insert user");
            store.insert_todo(todo(&alice_id, "buy milk")).expect("insert todo");
        }
        let store = Store::open(tmp.path()).expect("reopen");
        assert!(store.user_by_id(&alice_id).is_some());
        assert_eq!(store.todos_for(&alice_id).len(), 1);
        assert_eq!(store.todos_for(&alice_id)[0].text, "buy milk");
    }

    #[test]
    fn todo_lookup_is_owner_scoped() {
        let tmp = tempdir().expect("tempdir");
        let mut store = Store::open(tmp.path()).expect("open");
        let t = todo("alice", "secret task");
        let id = t.id.clone();
        store.insert_todo(t).expect("insert");
        assert!(store.todo_for("alice", &id).is_some());
        assert!(store.todo_for("bob", &id).is_none());
        assert!(store.modify_todo("bob", &id, |t| t.completed = true).expect("modify").is_none());
        assert!(store.remove_todo("bob", &id).expect("remove").is_none());
        // still there for the owner
        assert!(store.todo_for("alice", &id).is_some());
    }

    #[test]
    fn pull_token_is_idempotent() {
        let tmp = tempdir().expect("tempdir");
        let mut store = Store::open(tmp.path()).expect("open");
        let mut alice = principal("alice@example.com");
        alice.tokens.push(TokenEntry { purpose: "auth".into(), token: "t1".into() });
        let id = alice.id.clone();
        store.insert_user(alice).expect("insert");
        store.pull_token(&id, "t1").expect("pull");
        assert!(store.user_by_id(&id).expect("user").tokens.is_empty());
        // absent token and unknown principal are both fine
        store.pull_token(&id, "t1").expect("pull again");
        store.pull_token("nobody", "t1").expect("pull unknown");
    }
}
