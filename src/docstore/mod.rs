//! Per-user document database.
//!
//! Documents live at `users/{userId}/{collection}/{docId}` and hold a flat
//! JSON object of fields. The database supports:
//! - Add with a store-assigned id
//! - Full-replace set and idempotent delete
//! - Removal of a whole user subtree
//! - Snapshot listeners that receive the full collection after every change
//!
//! [`DocumentDb`] is the seam; [`MemoryDb`] is the in-process implementation,
//! optionally backed by an on-disk journal.
//!
//! # Example
//!
//! ```ignore
//! let db = MemoryDb::in_memory();
//! let path = CollectionPath::new(UserId::new("u1"), "accounts");
//!
//! let handle = db.listen(&path, ListenerConfig::default())?;
//! db.add(&path, fields, None)?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(SnapshotEvent::Snapshot { documents, .. }) => println!("{} docs", documents.len()),
//!         Ok(SnapshotEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod journal;
mod listeners;
mod memory;

pub use journal::{Journal, JournalEntry, JournalOp};
pub use listeners::{
    DropReason, ListenerConfig, ListenerHandle, ListenerId, ListenerRegistry, SnapshotEvent,
    StoredDocument,
};
pub use memory::{DbConfig, DbStats, Fault, MemoryDb};

use crate::error::Result;
use crate::types::{DocumentId, UserId};
use std::fmt;

/// Field map of a single document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Address of one collection inside a user's subtree.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath {
    pub user: UserId,
    pub collection: String,
}

impl CollectionPath {
    pub fn new(user: UserId, collection: impl Into<String>) -> Self {
        Self {
            user,
            collection: collection.into(),
        }
    }
}

impl fmt::Debug for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/{}", self.user, self.collection)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Operations a backing document database must provide.
///
/// `server_timestamp` names a field that the database fills with its own
/// clock when the written value is missing or null.
pub trait DocumentDb: Send + Sync {
    /// Insert a document under a fresh id.
    fn add(
        &self,
        path: &CollectionPath,
        fields: Fields,
        server_timestamp: Option<&str>,
    ) -> Result<DocumentId>;

    /// Replace the document at `id`, creating it if absent.
    fn set(
        &self,
        path: &CollectionPath,
        id: &DocumentId,
        fields: Fields,
        server_timestamp: Option<&str>,
    ) -> Result<()>;

    /// Remove a document. Missing documents are not an error.
    fn delete(&self, path: &CollectionPath, id: &DocumentId) -> Result<()>;

    /// Remove every collection under a user.
    fn delete_user(&self, user: &UserId) -> Result<()>;

    /// Register a snapshot listener. The current contents are delivered
    /// as the first event.
    fn listen(&self, path: &CollectionPath, config: ListenerConfig) -> Result<ListenerHandle>;

    /// Release a listener. Returns false if it was already gone.
    fn unlisten(&self, id: ListenerId) -> bool;
}
