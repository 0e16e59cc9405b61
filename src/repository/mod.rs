//! Typed, user-scoped access to the document database.
//!
//! A [`Repository`] binds a database handle to one user id; every
//! collection it hands out reads and writes only below
//! `users/{userId}/`.

mod snapshots;

pub use snapshots::Snapshots;

use crate::docstore::{CollectionPath, DocumentDb, Fields, ListenerConfig, StoredDocument};
use crate::error::{Result, WalletError};
use crate::types::{Account, DocumentId, Record, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Field that carries the document key in entity structs.
const ID_FIELD: &str = "id";

/// An entity stored as one document in a per-user collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Collection name below the user root.
    const COLLECTION: &'static str;

    /// Field the database fills in on insert when it is null.
    const SERVER_TIMESTAMP: Option<&'static str> = None;

    fn id(&self) -> &DocumentId;

    fn set_id(&mut self, id: DocumentId);

    fn set_owner(&mut self, user: &UserId);
}

impl Document for Account {
    const COLLECTION: &'static str = "accounts";

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn set_id(&mut self, id: DocumentId) {
        self.id = id;
    }

    fn set_owner(&mut self, user: &UserId) {
        self.user_id = user.clone();
    }
}

impl Document for Record {
    const COLLECTION: &'static str = "records";
    const SERVER_TIMESTAMP: Option<&'static str> = Some("timestamp");

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn set_id(&mut self, id: DocumentId) {
        self.id = id;
    }

    fn set_owner(&mut self, user: &UserId) {
        self.user_id = user.clone();
    }
}

/// Serialize an entity into stored fields. The id is the document key and
/// is not stored in the body.
pub fn encode<T: Document>(entity: &T) -> Result<Fields> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(mut fields) => {
            fields.remove(ID_FIELD);
            Ok(fields)
        }
        other => Err(WalletError::Serialization(format!(
            "expected an object for {}, got {}",
            T::COLLECTION,
            other
        ))),
    }
}

/// Rebuild an entity from a stored document, injecting its key.
pub fn decode<T: Document>(document: &StoredDocument) -> Result<T> {
    let mut fields = document.fields.clone();
    fields.insert(
        ID_FIELD.to_string(),
        serde_json::Value::String(document.id.0.clone()),
    );
    let mut entity: T = serde_json::from_value(serde_json::Value::Object(fields))?;
    entity.set_id(document.id.clone());
    Ok(entity)
}

/// Storage client scoped to one user.
#[derive(Clone)]
pub struct Repository {
    db: Arc<dyn DocumentDb>,
    user: UserId,
    listener: ListenerConfig,
}

impl Repository {
    pub fn new(db: Arc<dyn DocumentDb>, user: UserId) -> Self {
        Self {
            db,
            user,
            listener: ListenerConfig::default(),
        }
    }

    /// Use a custom listener configuration for subscriptions.
    pub fn with_listener_config(mut self, config: ListenerConfig) -> Self {
        self.listener = config;
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user
    }

    pub fn collection<T: Document>(&self) -> Collection<T> {
        Collection {
            db: Arc::clone(&self.db),
            path: CollectionPath::new(self.user.clone(), T::COLLECTION),
            listener: self.listener.clone(),
            _marker: PhantomData,
        }
    }

    pub fn accounts(&self) -> Collection<Account> {
        self.collection()
    }

    pub fn records(&self) -> Collection<Record> {
        self.collection()
    }

    /// Remove the user's whole subtree.
    pub fn delete_all(&self) -> Result<()> {
        self.db.delete_user(&self.user).inspect_err(|e| {
            tracing::warn!(user = %self.user, error = %e, "failed to delete user data");
        })
    }
}

/// One typed collection within a user's subtree.
pub struct Collection<T> {
    db: Arc<dyn DocumentDb>,
    path: CollectionPath,
    listener: ListenerConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            path: self.path.clone(),
            listener: self.listener.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Persist a new entity under a store-assigned id.
    pub fn add(&self, entity: &T) -> Result<DocumentId> {
        let fields = encode(entity)?;
        let id = self
            .db
            .add(&self.path, fields, T::SERVER_TIMESTAMP)
            .inspect_err(|e| {
                tracing::warn!(path = %self.path, error = %e, "failed to add document");
            })?;
        tracing::debug!(path = %self.path, %id, "document added");
        Ok(id)
    }

    /// Replace the stored entity at `entity.id()`.
    pub fn update(&self, entity: &T) -> Result<()> {
        let id = entity.id();
        if id.is_empty() {
            return Err(WalletError::InvalidDocumentId(id.clone()));
        }
        let fields = encode(entity)?;
        self.db
            .set(&self.path, id, fields, T::SERVER_TIMESTAMP)
            .inspect_err(|e| {
                tracing::warn!(path = %self.path, %id, error = %e, "failed to update document");
            })
    }

    /// Remove by id. Removing a missing document succeeds.
    pub fn delete(&self, id: &DocumentId) -> Result<()> {
        self.db.delete(&self.path, id).inspect_err(|e| {
            tracing::warn!(path = %self.path, %id, error = %e, "failed to delete document");
        })
    }

    /// A lazy stream of full-collection snapshots.
    ///
    /// Nothing is registered with the database until the stream is first
    /// polled or started.
    pub fn subscribe(&self) -> Snapshots<T> {
        Snapshots::new(Arc::clone(&self.db), self.path.clone(), self.listener.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::docstore::MemoryDb;
    use crate::types::AccountType;

    fn repo(db: &Arc<MemoryDb>, user: &str) -> Repository {
        Repository::new(db.clone(), UserId::new(user))
    }

    fn cash() -> Account {
        Account {
            name: "Cash".to_string(),
            account_type: AccountType::Cash,
            amount: "100".to_string(),
            currency: "EGP".to_string(),
            color: Color::RED.encode(),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_strips_id() {
        let mut account = cash();
        account.id = DocumentId::new("abc");

        let fields = encode(&account).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["name"], "Cash");
    }

    #[test]
    fn test_decode_injects_id() {
        let document = StoredDocument {
            id: DocumentId::new("abc"),
            fields: encode(&cash()).unwrap(),
        };

        let account: Account = decode(&document).unwrap();
        assert_eq!(account.id, DocumentId::new("abc"));
        assert_eq!(account.color, Color::RED.encode());
    }

    #[test]
    fn test_add_writes_under_user() {
        let db = Arc::new(MemoryDb::in_memory());
        let id = repo(&db, "u1").accounts().add(&cash()).unwrap();

        let path = CollectionPath::new(UserId::new("u1"), "accounts");
        assert!(db.get(&path, &id).is_some());
        let other = CollectionPath::new(UserId::new("u2"), "accounts");
        assert!(db.documents(&other).is_empty());
    }

    #[test]
    fn test_record_gets_server_timestamp() {
        let db = Arc::new(MemoryDb::in_memory());
        let records = repo(&db, "u1").records();
        let id = records.add(&Record::default()).unwrap();

        let fields = db.get(records.path(), &id).unwrap();
        assert!(fields["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_update_requires_id() {
        let db = Arc::new(MemoryDb::in_memory());
        let result = repo(&db, "u1").accounts().update(&cash());
        assert!(matches!(result, Err(WalletError::InvalidDocumentId(_))));
    }

    #[test]
    fn test_update_replaces_fully() {
        let db = Arc::new(MemoryDb::in_memory());
        let accounts = repo(&db, "u1").accounts();
        let id = accounts.add(&cash()).unwrap();

        let replacement = Account {
            id: id.clone(),
            name: "Savings".to_string(),
            ..Default::default()
        };
        accounts.update(&replacement).unwrap();

        let stored: Account = decode(&StoredDocument {
            id: id.clone(),
            fields: db.get(accounts.path(), &id).unwrap(),
        })
        .unwrap();
        assert_eq!(stored, replacement);
    }

    #[test]
    fn test_delete_all_only_touches_user() {
        let db = Arc::new(MemoryDb::in_memory());
        repo(&db, "u1").accounts().add(&cash()).unwrap();
        repo(&db, "u1").records().add(&Record::default()).unwrap();
        repo(&db, "u2").accounts().add(&cash()).unwrap();

        repo(&db, "u1").delete_all().unwrap();
        assert_eq!(db.stats().documents, 1);
    }
}
