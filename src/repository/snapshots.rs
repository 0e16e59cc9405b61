//! Live snapshot streams over a database listener.

use super::{decode, Document};
use crate::docstore::{CollectionPath, DocumentDb, DropReason, ListenerConfig, ListenerHandle, SnapshotEvent};
use crate::error::{Result, WalletError};
use crossbeam_channel::{select, Receiver, RecvError};
use std::marker::PhantomData;
use std::sync::Arc;

/// Releases the database listener when dropped.
struct ListenerGuard {
    db: Arc<dyn DocumentDb>,
    handle: ListenerHandle,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.db.unlisten(self.handle.id);
        tracing::debug!(listener = self.handle.id.0, "listener released");
    }
}

enum State {
    /// Not registered yet.
    Idle,
    Live(ListenerGuard),
    /// Ended by error or cancellation. Yields nothing further.
    Finished,
}

/// Stream of full-collection snapshots.
///
/// Each item is the complete current list. After an error item the stream
/// is finished; it never reconnects on its own. The listener is released
/// exactly once: when the stream finishes or is dropped, whichever comes
/// first.
pub struct Snapshots<T> {
    db: Arc<dyn DocumentDb>,
    path: CollectionPath,
    config: ListenerConfig,
    state: State,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Snapshots<T> {
    pub(super) fn new(db: Arc<dyn DocumentDb>, path: CollectionPath, config: ListenerConfig) -> Self {
        Self {
            db,
            path,
            config,
            state: State::Idle,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// True while a listener is registered.
    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Live(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Register the listener now instead of on first poll.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::Live(_) => return Ok(()),
            State::Finished => return Err(WalletError::ListenerClosed),
            State::Idle => {}
        }

        match self.db.listen(&self.path, self.config.clone()) {
            Ok(handle) => {
                self.state = State::Live(ListenerGuard {
                    db: Arc::clone(&self.db),
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "failed to register listener");
                self.state = State::Finished;
                Err(e)
            }
        }
    }

    /// Stop listening. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.state = State::Finished;
    }

    /// Wait for the next snapshot, or until `cancel` fires or disconnects.
    ///
    /// Returns `None` when cancelled or already finished.
    pub fn next_or_cancel(&mut self, cancel: &Receiver<()>) -> Option<Result<Vec<T>>> {
        let receiver = match self.live_receiver() {
            Ok(Some(receiver)) => receiver,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };

        select! {
            recv(receiver) -> event => self.on_event(event),
            recv(cancel) -> _ => {
                self.cancel();
                None
            }
        }
    }

    /// Receiver of the live listener, starting it if needed.
    fn live_receiver(&mut self) -> Result<Option<Receiver<SnapshotEvent>>> {
        if let State::Idle = self.state {
            self.start()?;
        }
        match &self.state {
            State::Live(guard) => Ok(Some(guard.handle.receiver.clone())),
            _ => Ok(None),
        }
    }

    fn on_event(&mut self, event: std::result::Result<SnapshotEvent, RecvError>) -> Option<Result<Vec<T>>> {
        match event {
            Ok(SnapshotEvent::Snapshot { documents, .. }) => {
                let mut items = Vec::with_capacity(documents.len());
                for document in documents.iter() {
                    match decode::<T>(document) {
                        Ok(item) => items.push(item),
                        Err(e) => {
                            tracing::warn!(path = %self.path, id = %document.id, error = %e, "skipping undecodable document");
                        }
                    }
                }
                Some(Ok(items))
            }
            Ok(SnapshotEvent::Dropped { reason }) => {
                self.cancel();
                match reason {
                    DropReason::Unsubscribed => None,
                    DropReason::Error(message) => Some(Err(WalletError::ListenerFailed(message))),
                }
            }
            Err(RecvError) => {
                self.cancel();
                Some(Err(WalletError::ListenerClosed))
            }
        }
    }
}

impl<T: Document> Iterator for Snapshots<T> {
    type Item = Result<Vec<T>>;

    /// Blocks until the next snapshot arrives.
    fn next(&mut self) -> Option<Self::Item> {
        let receiver = match self.live_receiver() {
            Ok(Some(receiver)) => receiver,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        let event = receiver.recv();
        self.on_event(event)
    }
}

#[cfg(test)]
mod tests {
    use crate::docstore::{ListenerConfig, MemoryDb};
    use crate::error::WalletError;
    use crate::repository::Repository;
    use crate::types::{Account, UserId};
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryDb>, Repository) {
        let db = Arc::new(MemoryDb::in_memory());
        let repo = Repository::new(db.clone(), UserId::new("u1"));
        (db, repo)
    }

    fn named(name: &str) -> Account {
        Account {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lazy_registration() {
        let (db, repo) = setup();
        let mut stream = repo.accounts().subscribe();
        assert_eq!(db.stats().listeners_opened, 0);

        let first = stream.next().unwrap().unwrap();
        assert!(first.is_empty());
        assert_eq!(db.stats().active_listeners, 1);
    }

    #[test]
    fn test_every_write_produces_snapshot() {
        let (_db, repo) = setup();
        let accounts = repo.accounts();
        let mut stream = accounts.subscribe();
        assert!(stream.next().unwrap().unwrap().is_empty());

        let id = accounts.add(&named("Cash")).unwrap();
        let snapshot = stream.next().unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);

        let mut renamed = snapshot[0].clone();
        renamed.name = "Wallet".to_string();
        accounts.update(&renamed).unwrap();
        assert_eq!(stream.next().unwrap().unwrap()[0].name, "Wallet");

        accounts.delete(&id).unwrap();
        assert!(stream.next().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_lagging_stream_sees_latest_state() {
        let db = Arc::new(MemoryDb::in_memory());
        let repo = Repository::new(db.clone(), UserId::new("u1"))
            .with_listener_config(ListenerConfig { buffer_size: 2 });
        let accounts = repo.accounts();
        let mut stream = accounts.subscribe();
        stream.start().unwrap();

        for i in 0..20 {
            accounts.add(&named(&format!("a{}", i))).unwrap();
        }

        let sizes: Vec<_> = stream.by_ref().take(2).map(|s| s.unwrap().len()).collect();
        assert_eq!(sizes, vec![19, 20]);
        assert!(stream.is_live());
    }

    #[test]
    fn test_drop_releases_once() {
        let (db, repo) = setup();
        {
            let mut stream = repo.accounts().subscribe();
            stream.start().unwrap();
            stream.start().unwrap();
        }
        let stats = db.stats();
        assert_eq!(stats.listeners_opened, 1);
        assert_eq!(stats.listeners_released, 1);
        assert_eq!(stats.active_listeners, 0);
    }

    #[test]
    fn test_error_terminates_and_releases_once() {
        let (db, repo) = setup();
        let mut stream = repo.accounts().subscribe();
        stream.next().unwrap().unwrap();

        db.fail_listeners(repo.accounts().path(), "permission denied");

        match stream.next() {
            Some(Err(WalletError::ListenerFailed(message))) => assert_eq!(message, "permission denied"),
            other => panic!("Expected listener failure, got {:?}", other.map(|r| r.map(|v| v.len()))),
        }
        assert!(stream.is_finished());
        assert!(stream.next().is_none());
        assert_eq!(db.stats().listeners_released, 1);

        drop(stream);
        assert_eq!(db.stats().listeners_released, 1);
    }

    #[test]
    fn test_restart_by_subscribing_again() {
        let (db, repo) = setup();
        let accounts = repo.accounts();
        let mut first = accounts.subscribe();
        first.next().unwrap().unwrap();
        db.fail_listeners(accounts.path(), "boom");
        assert!(first.next().unwrap().is_err());

        accounts.add(&named("Cash")).unwrap();
        let mut second = accounts.subscribe();
        assert_eq!(second.next().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let (db, repo) = setup();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let mut stream = repo.accounts().subscribe();

        let worker = thread::spawn(move || {
            let mut seen = 0;
            while let Some(item) = stream.next_or_cancel(&cancel_rx) {
                item.unwrap();
                seen += 1;
            }
            (seen, stream.is_finished())
        });

        thread::sleep(Duration::from_millis(50));
        drop(cancel_tx);
        let (seen, finished) = worker.join().unwrap();

        assert_eq!(seen, 1);
        assert!(finished);
        assert_eq!(db.stats().listeners_released, 1);
        assert_eq!(db.stats().active_listeners, 0);
    }

    #[test]
    fn test_cancel_before_start() {
        let (db, repo) = setup();
        let mut stream = repo.accounts().subscribe();
        stream.cancel();
        assert!(stream.next().is_none());
        assert!(matches!(stream.start(), Err(WalletError::ListenerClosed)));
        assert_eq!(db.stats().listeners_opened, 0);
    }
}
