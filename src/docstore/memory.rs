//! In-process document database with snapshot listeners.

use super::journal::{Journal, JournalOp};
use super::listeners::{ListenerConfig, ListenerHandle, ListenerId, ListenerRegistry, SnapshotEvent, StoredDocument};
use super::{CollectionPath, DocumentDb, Fields};
use crate::error::{Result, WalletError};
use crate::types::{DocumentId, Timestamp, UserId};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Length of generated document ids.
const DOCUMENT_ID_LEN: usize = 20;

/// Journal file name inside the database directory.
const JOURNAL_FILE: &str = "documents.journal";

/// Database configuration.
#[derive(Clone, Debug, Default)]
pub struct DbConfig {
    /// Directory for the journal. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

/// Injected failure mode for one-shot operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// Every write fails as if the network were down.
    Unavailable,
    /// Every write is rejected by security rules.
    PermissionDenied,
}

/// Counters describing database activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DbStats {
    pub writes: u64,
    pub listeners_opened: u64,
    pub listeners_released: u64,
    pub active_listeners: usize,
    pub documents: usize,
}

type Tree = BTreeMap<CollectionPath, BTreeMap<DocumentId, Fields>>;

/// Document database held in memory, optionally journaled to disk.
///
/// Writes hold the tree lock while broadcasting so every listener sees
/// snapshots in write order.
pub struct MemoryDb {
    tree: RwLock<Tree>,
    listeners: ListenerRegistry,
    journal: Option<Journal>,
    fault: Mutex<Fault>,
    /// Last server timestamp handed out.
    clock: Mutex<i64>,
    next_document: AtomicU64,
    writes: AtomicU64,
    listeners_opened: AtomicU64,
    listeners_released: AtomicU64,
    _lock_file: Option<File>,
}

impl MemoryDb {
    /// A database that is never written to disk.
    pub fn in_memory() -> Self {
        Self::with_parts(Tree::new(), None, None)
    }

    /// Open a database per `config`, replaying its journal if present.
    pub fn open(config: DbConfig) -> Result<Self> {
        let Some(path) = config.path else {
            return Ok(Self::in_memory());
        };

        fs::create_dir_all(&path)?;
        let lock_file = Self::acquire_lock(&path)?;
        let (journal, entries) = Journal::open(path.join(JOURNAL_FILE))?;

        let mut tree = Tree::new();
        let mut clock = 0;
        for entry in &entries {
            Self::replay(&mut tree, &entry.op, &mut clock)?;
        }
        tracing::info!(path = %path.display(), entries = entries.len(), "document database opened");

        let db = Self::with_parts(tree, Some(journal), Some(lock_file));
        *db.clock.lock() = clock;
        Ok(db)
    }

    fn with_parts(tree: Tree, journal: Option<Journal>, lock_file: Option<File>) -> Self {
        Self {
            tree: RwLock::new(tree),
            listeners: ListenerRegistry::new(),
            journal,
            fault: Mutex::new(Fault::None),
            clock: Mutex::new(0),
            next_document: AtomicU64::new(1),
            writes: AtomicU64::new(0),
            listeners_opened: AtomicU64::new(0),
            listeners_released: AtomicU64::new(0),
            _lock_file: lock_file,
        }
    }

    // --- Fault Injection ---

    /// Make subsequent one-shot operations fail.
    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    /// Terminate every listener on a collection with an error, as a server
    /// revoking a query would.
    pub fn fail_listeners(&self, path: &CollectionPath, message: &str) -> usize {
        self.listeners.fail(path, message)
    }

    // --- Inspection ---

    pub fn stats(&self) -> DbStats {
        DbStats {
            writes: self.writes.load(Ordering::SeqCst),
            listeners_opened: self.listeners_opened.load(Ordering::SeqCst),
            listeners_released: self.listeners_released.load(Ordering::SeqCst),
            active_listeners: self.listeners.listener_count(),
            documents: self.tree.read().values().map(BTreeMap::len).sum(),
        }
    }

    /// Read one document.
    pub fn get(&self, path: &CollectionPath, id: &DocumentId) -> Option<Fields> {
        self.tree.read().get(path).and_then(|docs| docs.get(id)).cloned()
    }

    /// Read a whole collection, ordered by document id.
    pub fn documents(&self, path: &CollectionPath) -> Vec<StoredDocument> {
        Self::collect(&self.tree.read(), path)
    }

    /// Rewrite the journal so it holds one entry per live document.
    pub fn compact(&self) -> Result<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };

        let tree = self.tree.read();
        let mut ops = Vec::new();
        for (path, docs) in tree.iter() {
            for (id, fields) in docs {
                ops.push(JournalOp::Put {
                    user: path.user.0.clone(),
                    collection: path.collection.clone(),
                    id: id.0.clone(),
                    fields: serde_json::to_vec(fields)?,
                    stamped: None,
                });
            }
        }
        ops.push(JournalOp::Clock {
            last: *self.clock.lock(),
        });
        journal.compact(ops)
    }

    // --- Private Helpers ---

    fn check_fault(&self) -> Result<()> {
        match &*self.fault.lock() {
            Fault::None => Ok(()),
            Fault::Unavailable => Err(WalletError::Unavailable(
                "the service is currently unavailable".into(),
            )),
            Fault::PermissionDenied => Err(WalletError::PermissionDenied(
                "missing or insufficient permissions".into(),
            )),
        }
    }

    /// Next server timestamp, strictly greater than every previous one.
    fn next_timestamp(&self) -> Timestamp {
        let mut clock = self.clock.lock();
        let now = Timestamp::now().0.max(*clock + 1);
        *clock = now;
        Timestamp(now)
    }

    /// Fill the server timestamp field if it is missing or null.
    fn stamp(&self, fields: &mut Fields, server_timestamp: Option<&str>) -> Option<i64> {
        let field = server_timestamp?;
        if !fields.get(field).map_or(true, serde_json::Value::is_null) {
            return None;
        }
        let ts = self.next_timestamp().0;
        fields.insert(field.to_string(), serde_json::json!(ts));
        Some(ts)
    }

    fn generate_id(&self, path: &CollectionPath) -> DocumentId {
        let n = self.next_document.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(n.to_le_bytes());
        hasher.update(Timestamp::now().0.to_le_bytes());
        hasher.update(path.user.0.as_bytes());
        hasher.update(path.collection.as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(DOCUMENT_ID_LEN);
        DocumentId(id)
    }

    fn log(&self, op: JournalOp) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.append(op)?;
        }
        Ok(())
    }

    fn collect(tree: &Tree, path: &CollectionPath) -> Vec<StoredDocument> {
        tree.get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| StoredDocument {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn publish(&self, tree: &Tree, path: &CollectionPath) {
        let version = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let documents = Arc::new(Self::collect(tree, path));
        self.listeners.broadcast_snapshot(path, documents, version);
    }

    fn put(
        &self,
        path: &CollectionPath,
        id: DocumentId,
        fields: Fields,
        stamped: Option<i64>,
    ) -> Result<()> {
        let mut tree = self.tree.write();
        self.log(JournalOp::Put {
            user: path.user.0.clone(),
            collection: path.collection.clone(),
            id: id.0.clone(),
            fields: serde_json::to_vec(&fields)?,
            stamped,
        })?;
        tree.entry(path.clone()).or_default().insert(id, fields);
        self.publish(&tree, path);
        Ok(())
    }

    fn replay(tree: &mut Tree, op: &JournalOp, clock: &mut i64) -> Result<()> {
        match op {
            JournalOp::Put {
                user,
                collection,
                id,
                fields,
                stamped,
            } => {
                let fields: Fields = serde_json::from_slice(fields)?;
                if let Some(ts) = stamped {
                    *clock = (*clock).max(*ts);
                }
                tree.entry(CollectionPath::new(UserId(user.clone()), collection.clone()))
                    .or_default()
                    .insert(DocumentId(id.clone()), fields);
            }
            JournalOp::Delete {
                user,
                collection,
                id,
            } => {
                let path = CollectionPath::new(UserId(user.clone()), collection.clone());
                if let Some(docs) = tree.get_mut(&path) {
                    docs.remove(&DocumentId(id.clone()));
                }
            }
            JournalOp::DeleteUser { user } => {
                tree.retain(|path, _| &path.user.0 != user);
            }
            JournalOp::Clock { last } => {
                *clock = (*clock).max(*last);
            }
        }
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| WalletError::Locked)?;
        Ok(lock_file)
    }
}

impl DocumentDb for MemoryDb {
    fn add(
        &self,
        path: &CollectionPath,
        mut fields: Fields,
        server_timestamp: Option<&str>,
    ) -> Result<DocumentId> {
        self.check_fault()?;
        let id = self.generate_id(path);
        let stamped = self.stamp(&mut fields, server_timestamp);
        self.put(path, id.clone(), fields, stamped)?;
        tracing::debug!(%path, %id, "document added");
        Ok(id)
    }

    fn set(
        &self,
        path: &CollectionPath,
        id: &DocumentId,
        mut fields: Fields,
        server_timestamp: Option<&str>,
    ) -> Result<()> {
        self.check_fault()?;
        if id.is_empty() || id.as_str().contains('/') {
            return Err(WalletError::InvalidDocumentId(id.clone()));
        }
        let stamped = self.stamp(&mut fields, server_timestamp);
        self.put(path, id.clone(), fields, stamped)?;
        tracing::debug!(%path, %id, "document replaced");
        Ok(())
    }

    fn delete(&self, path: &CollectionPath, id: &DocumentId) -> Result<()> {
        self.check_fault()?;
        if id.is_empty() || id.as_str().contains('/') {
            return Err(WalletError::InvalidDocumentId(id.clone()));
        }

        let mut tree = self.tree.write();
        self.log(JournalOp::Delete {
            user: path.user.0.clone(),
            collection: path.collection.clone(),
            id: id.0.clone(),
        })?;
        let removed = tree
            .get_mut(path)
            .map_or(false, |docs| docs.remove(id).is_some());
        self.publish(&tree, path);
        tracing::debug!(%path, %id, removed, "document deleted");
        Ok(())
    }

    fn delete_user(&self, user: &UserId) -> Result<()> {
        self.check_fault()?;

        let mut tree = self.tree.write();
        self.log(JournalOp::DeleteUser {
            user: user.0.clone(),
        })?;
        tree.retain(|path, _| &path.user != user);
        for path in self.listeners.paths_for_user(user) {
            self.publish(&tree, &path);
        }
        tracing::info!(%user, "user subtree deleted");
        Ok(())
    }

    fn listen(&self, path: &CollectionPath, config: ListenerConfig) -> Result<ListenerHandle> {
        // Read lock keeps writers out until the initial snapshot is queued.
        let tree = self.tree.read();
        let handle = self.listeners.register(path.clone(), &config);
        self.listeners_opened.fetch_add(1, Ordering::SeqCst);

        let documents = Arc::new(Self::collect(&tree, path));
        let version = self.writes.load(Ordering::SeqCst);
        self.listeners
            .send_to(handle.id, SnapshotEvent::Snapshot { documents, version });

        tracing::debug!(%path, listener = handle.id.0, "listener registered");
        Ok(handle)
    }

    fn unlisten(&self, id: ListenerId) -> bool {
        self.listeners_released.fetch_add(1, Ordering::SeqCst);
        self.listeners.unregister(id)
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::in_memory()
    }
}
