pub mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::DocId;

/// A single document field. Mirrors the handful of JSON-ish types the store keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl From<&serde_json::Value> for FieldValue {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            // Nested values are not representable; the legacy import never needs them.
            _ => FieldValue::Null,
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Where a collection lives. Every path is scoped to one user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionPath {
    Apartments { user: String },
    Reservations { user: String, apartment: DocId },
    Expenses { user: String, apartment: DocId },
}

impl CollectionPath {
    pub fn apartments(user: &str) -> Self {
        CollectionPath::Apartments { user: user.to_string() }
    }

    pub fn reservations(user: &str, apartment: DocId) -> Self {
        CollectionPath::Reservations {
            user: user.to_string(),
            apartment,
        }
    }

    pub fn expenses(user: &str, apartment: DocId) -> Self {
        CollectionPath::Expenses {
            user: user.to_string(),
            apartment,
        }
    }

    /// Parent apartment for sub-collections.
    pub fn apartment(&self) -> Option<DocId> {
        match self {
            CollectionPath::Apartments { .. } => None,
            CollectionPath::Reservations { apartment, .. } | CollectionPath::Expenses { apartment, .. } => {
                Some(*apartment)
            }
        }
    }

    pub fn user(&self) -> &str {
        match self {
            CollectionPath::Apartments { user }
            | CollectionPath::Reservations { user, .. }
            | CollectionPath::Expenses { user, .. } => user,
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionPath::Apartments { user } => write!(f, "users/{user}/apartments"),
            CollectionPath::Reservations { user, apartment } => {
                write!(f, "users/{user}/apartments/{apartment}/reservations")
            }
            CollectionPath::Expenses { user, apartment } => {
                write!(f, "users/{user}/apartments/{apartment}/charges")
            }
        }
    }
}

/// Committed store mutations, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    DocumentAdded {
        path: CollectionPath,
        id: DocId,
        fields: Fields,
    },
    DocumentUpdated {
        path: CollectionPath,
        id: DocId,
        patch: Fields,
    },
    DocumentDeleted {
        path: CollectionPath,
        id: DocId,
    },
}

impl StoreEvent {
    pub fn path(&self) -> &CollectionPath {
        match self {
            StoreEvent::DocumentAdded { path, .. }
            | StoreEvent::DocumentUpdated { path, .. }
            | StoreEvent::DocumentDeleted { path, .. } => path,
        }
    }
}

/// Full contents of one collection. `version` grows by one per committed write
/// to that collection, so listeners can drop snapshots that arrive late.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: CollectionPath,
    pub version: u64,
    pub docs: Vec<Document>,
}

pub type Listener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Handle to a live subscription. Cancelling is synchronous and happens at most
/// once, either through [`Subscription::cancel`] or on drop.
pub struct Subscription {
    id: ulid::Ulid,
    canceller: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(id: ulid::Ulid, canceller: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            canceller: Some(Box::new(canceller)),
        }
    }

    pub fn id(&self) -> ulid::Ulid {
        self.id
    }

    pub fn cancel(mut self) {
        self.cancel_inner();
    }

    fn cancel_inner(&mut self) {
        if let Some(canceller) = self.canceller.take() {
            canceller();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound { path: CollectionPath, id: DocId },
    Unavailable(String),
    Wal(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { path, id } => write!(f, "document not found: {path}/{id}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Collections, documents and change subscriptions.
///
/// Documents are loosely typed maps of [`FieldValue`]; typed records are
/// built from them in [`crate::schema`].
///
/// Writes are delivered to every subscriber of the touched collection after
/// they commit. `subscribe` delivers the current contents immediately.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot read of a whole collection.
    async fn get_all(&self, path: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    async fn add(&self, path: &CollectionPath, fields: Fields) -> Result<DocId, StoreError>;

    /// Merge `patch` into an existing document.
    async fn update(&self, path: &CollectionPath, id: DocId, patch: Fields) -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &CollectionPath, id: DocId) -> Result<(), StoreError>;

    fn subscribe(&self, path: &CollectionPath, listener: Listener) -> Subscription;
}
