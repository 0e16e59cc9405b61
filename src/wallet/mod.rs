//! Live-synchronized accounts and records for one signed-in user.
//!
//! A [`Wallet`] keeps two in-memory lists that mirror the user's
//! collections. Each list is replaced wholesale by the latest snapshot from
//! its own listener thread; mutations never edit the lists directly. Writes
//! are dispatched to a background worker and their failures surface only in
//! the notification slot.
//!
//! # Example
//!
//! ```ignore
//! let repo = Repository::new(db, user.user_id.clone());
//! let wallet = Wallet::open(repo, WalletConfig::default())?;
//!
//! wallet.add_account(Account { name: "Cash".into(), ..Default::default() });
//! wallet.flush()?;
//!
//! for account in wallet.accounts().iter() {
//!     println!("{} {}", account.name, account.amount);
//! }
//! if let Some(message) = wallet.notification() {
//!     show(message);
//!     wallet.acknowledge_notification();
//! }
//! ```

mod events;
mod notification;

pub use events::WalletEvent;
pub use notification::Notification;

use crate::error::{Result, WalletError};
use crate::repository::{Collection, Document, Repository, Snapshots};
use crate::types::{Account, DocumentId, Record, UserId};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use events::EventBus;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Wallet configuration.
#[derive(Clone, Debug, Default)]
pub struct WalletConfig {
    /// How many times a failed subscription is reopened before the list is
    /// left frozen at its last snapshot.
    /// Default: 0
    pub resubscribe_attempts: u32,
}

/// A queued write.
enum Mutation {
    AddAccount(Account),
    UpdateAccount(Account),
    DeleteAccount(DocumentId),
    AddRecord(Record),
    UpdateRecord(Record),
    DeleteRecord(DocumentId),
    /// Optionally reports the outcome back to a waiting caller.
    DeleteAllUserData(Option<Sender<Result<()>>>),
    /// Acknowledged once everything queued before it has been attempted.
    Flush(Sender<()>),
}

/// State shared with the listener and mutation threads.
struct Shared {
    accounts: RwLock<Arc<Vec<Account>>>,
    records: RwLock<Arc<Vec<Record>>>,
    notification: Notification,
    events: EventBus,
}

impl Shared {
    fn new() -> Self {
        Self {
            accounts: RwLock::new(Arc::new(Vec::new())),
            records: RwLock::new(Arc::new(Vec::new())),
            notification: Notification::new(),
            events: EventBus::default(),
        }
    }

    fn notify(&self, message: impl Into<String>) {
        let message = self.notification.raise(message);
        self.events.emit(WalletEvent::Notification { message });
    }

    fn publish_accounts(&self, accounts: Vec<Account>) {
        let count = accounts.len();
        *self.accounts.write() = Arc::new(accounts);
        self.events.emit(WalletEvent::AccountsChanged { count });
    }

    fn publish_records(&self, mut records: Vec<Record>) {
        newest_first(&mut records);
        let count = records.len();
        *self.records.write() = Arc::new(records);
        self.events.emit(WalletEvent::RecordsChanged { count });
    }
}

/// Sort records by timestamp, newest first. Records still waiting for a
/// server timestamp count as newest.
pub fn newest_first(records: &mut [Record]) {
    records.sort_by_key(|r| std::cmp::Reverse(r.timestamp.map_or(i64::MAX, |t| t.0)));
}

/// Synchronization component for one user session.
pub struct Wallet {
    user: UserId,
    shared: Arc<Shared>,
    mutations: Option<Sender<Mutation>>,
    /// Dropping this sender cancels both listener threads.
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Wallet {
    /// Open both subscriptions and start the mutation worker.
    pub fn open(repo: Repository, config: WalletConfig) -> Result<Self> {
        let user = repo.user_id().clone();
        let shared = Arc::new(Shared::new());
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (mutations_tx, mutations_rx) = unbounded();

        let mut workers = Vec::with_capacity(3);

        if let Some(worker) = Self::spawn_listener(
            repo.accounts(),
            Arc::clone(&shared),
            shutdown_rx.clone(),
            config.resubscribe_attempts,
            Shared::publish_accounts,
        )? {
            workers.push(worker);
        }
        if let Some(worker) = Self::spawn_listener(
            repo.records(),
            Arc::clone(&shared),
            shutdown_rx,
            config.resubscribe_attempts,
            Shared::publish_records,
        )? {
            workers.push(worker);
        }

        let mutation_shared = Arc::clone(&shared);
        workers.push(
            thread::Builder::new()
                .name("wallet-mutations".into())
                .spawn(move || run_mutations(repo, mutations_rx, mutation_shared))?,
        );

        tracing::info!(%user, "wallet opened");

        Ok(Self {
            user,
            shared,
            mutations: Some(mutations_tx),
            shutdown: Some(shutdown_tx),
            workers,
        })
    }

    /// Register the listener on the calling thread, then hand the stream
    /// to its own thread.
    fn spawn_listener<T: Document>(
        collection: Collection<T>,
        shared: Arc<Shared>,
        shutdown: Receiver<()>,
        attempts: u32,
        publish: fn(&Shared, Vec<T>),
    ) -> Result<Option<JoinHandle<()>>> {
        let mut stream = collection.subscribe();
        if let Err(e) = stream.start() {
            shared.notify(e.to_string());
            return Ok(None);
        }

        let worker = thread::Builder::new()
            .name(format!("wallet-{}", T::COLLECTION))
            .spawn(move || run_listener(collection, stream, shared, shutdown, attempts, publish))?;
        Ok(Some(worker))
    }

    pub fn user_id(&self) -> &UserId {
        &self.user
    }

    // --- Reads ---

    /// Latest accounts snapshot.
    pub fn accounts(&self) -> Arc<Vec<Account>> {
        Arc::clone(&self.shared.accounts.read())
    }

    /// Latest records snapshot, newest first.
    pub fn records(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.shared.records.read())
    }

    pub fn account(&self, id: &DocumentId) -> Option<Account> {
        self.shared.accounts.read().iter().find(|a| &a.id == id).cloned()
    }

    /// Pending notification message, if any.
    pub fn notification(&self) -> Option<String> {
        self.shared.notification.pending()
    }

    /// Clear the notification once it has been shown.
    pub fn acknowledge_notification(&self) {
        self.shared.notification.acknowledge();
    }

    /// Receive change events from now on.
    pub fn subscribe_events(&self) -> Receiver<WalletEvent> {
        self.shared.events.subscribe()
    }

    // --- Mutations ---

    pub fn add_account(&self, account: Account) {
        self.dispatch(Mutation::AddAccount(account));
    }

    pub fn update_account(&self, account: Account) {
        self.dispatch(Mutation::UpdateAccount(account));
    }

    /// Delete an account. Its records are left in place.
    pub fn delete_account(&self, id: DocumentId) {
        self.dispatch(Mutation::DeleteAccount(id));
    }

    pub fn add_record(&self, record: Record) {
        self.dispatch(Mutation::AddRecord(record));
    }

    pub fn update_record(&self, record: Record) {
        self.dispatch(Mutation::UpdateRecord(record));
    }

    pub fn delete_record(&self, id: DocumentId) {
        self.dispatch(Mutation::DeleteRecord(id));
    }

    /// Remove everything stored for this user.
    pub fn delete_all_user_data(&self) {
        self.dispatch(Mutation::DeleteAllUserData(None));
    }

    /// Remove everything stored for this user and wait for the outcome.
    ///
    /// Mutations queued earlier are attempted first. A failure is also
    /// raised as a notification, like any other mutation.
    pub fn purge_user_data(&self) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        let sender = self.mutations.as_ref().ok_or(WalletError::Closed)?;
        sender
            .send(Mutation::DeleteAllUserData(Some(reply_tx)))
            .map_err(|_| WalletError::Closed)?;
        reply_rx.recv().map_err(|_| WalletError::Closed)?
    }

    /// Block until every mutation dispatched so far has been attempted.
    pub fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = bounded(1);
        let sender = self.mutations.as_ref().ok_or(WalletError::Closed)?;
        sender
            .send(Mutation::Flush(done_tx))
            .map_err(|_| WalletError::Closed)?;
        done_rx.recv().map_err(|_| WalletError::Closed)
    }

    /// Tear down both subscriptions and the mutation worker. Queued writes
    /// are attempted first.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn dispatch(&self, mutation: Mutation) {
        let sent = self
            .mutations
            .as_ref()
            .map_or(false, |sender| sender.send(mutation).is_ok());
        if !sent {
            self.shared.notify(WalletError::Closed.to_string());
        }
    }

    fn shutdown(&mut self) {
        self.mutations.take();
        self.shutdown.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!(user = %self.user, "wallet worker panicked");
            }
        }
        tracing::info!(user = %self.user, "wallet closed");
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn run_listener<T: Document>(
    collection: Collection<T>,
    mut stream: Snapshots<T>,
    shared: Arc<Shared>,
    shutdown: Receiver<()>,
    mut attempts: u32,
    publish: fn(&Shared, Vec<T>),
) {
    while let Some(item) = stream.next_or_cancel(&shutdown) {
        match item {
            Ok(items) => publish(&shared, items),
            Err(e) => {
                tracing::warn!(path = %collection.path(), error = %e, "subscription ended");
                shared.notify(e.to_string());
                shared.events.emit(WalletEvent::SubscriptionEnded {
                    collection: T::COLLECTION,
                    error: e.to_string(),
                });

                if attempts == 0 {
                    break;
                }
                attempts -= 1;
                tracing::info!(path = %collection.path(), remaining = attempts, "resubscribing");
                stream = collection.subscribe();
            }
        }
    }
}

fn run_mutations(repo: Repository, mutations: Receiver<Mutation>, shared: Arc<Shared>) {
    let user = repo.user_id().clone();
    let accounts = repo.accounts();
    let records = repo.records();

    for mutation in mutations.iter() {
        let (action, result) = match mutation {
            Mutation::AddAccount(mut account) => {
                account.set_owner(&user);
                ("add account", accounts.add(&account).map(drop))
            }
            Mutation::UpdateAccount(mut account) => {
                account.set_owner(&user);
                ("update account", accounts.update(&account))
            }
            Mutation::DeleteAccount(id) => ("delete account", accounts.delete(&id)),
            Mutation::AddRecord(mut record) => {
                record.set_owner(&user);
                ("add record", records.add(&record).map(drop))
            }
            Mutation::UpdateRecord(mut record) => {
                record.set_owner(&user);
                ("update record", records.update(&record))
            }
            Mutation::DeleteRecord(id) => ("delete record", records.delete(&id)),
            Mutation::DeleteAllUserData(None) => ("delete user data", repo.delete_all()),
            Mutation::DeleteAllUserData(Some(reply)) => {
                let result = repo.delete_all();
                if let Err(e) = &result {
                    tracing::warn!(%user, error = %e, "delete user data failed");
                    shared.notify(e.to_string());
                }
                let _ = reply.send(result);
                continue;
            }
            Mutation::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        if let Err(e) = result {
            tracing::warn!(%user, action, error = %e, "mutation failed");
            shared.notify(e.to_string());
        }
    }
}
