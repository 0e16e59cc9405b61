//! Listener registry for broadcasting collection snapshots.

use super::{CollectionPath, Fields};
use crate::types::{DocumentId, UserId};
use crossbeam_channel::{
    bounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Max buffered events. Older snapshots are discarded beyond this.
    /// Default: 64
    pub buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// A document as delivered in a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub fields: Fields,
}

/// Events delivered to a listener.
#[derive(Clone, Debug)]
pub enum SnapshotEvent {
    /// Full contents of the collection, ordered by document id.
    Snapshot {
        documents: Arc<Vec<StoredDocument>>,
        /// Database write counter at the time of the snapshot.
        version: u64,
    },

    /// The listener was removed by the database. No more events follow.
    Dropped { reason: DropReason },
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The database rejected or lost the query.
    Error(String),
    /// Explicitly unlistened.
    Unsubscribed,
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle to receive a listener's events.
pub struct ListenerHandle {
    pub id: ListenerId,
    pub receiver: Receiver<SnapshotEvent>,
}

impl ListenerHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SnapshotEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SnapshotEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SnapshotEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Internal listener state.
struct Listener {
    path: CollectionPath,
    sender: Sender<SnapshotEvent>,
    /// Second receiver on the same channel, used to discard the oldest
    /// queued snapshot when the buffer is full.
    backlog: Receiver<SnapshotEvent>,
}

impl Listener {
    /// Queue an event, evicting the oldest queued events while the buffer
    /// is full. Snapshots are full replacements, so a slow consumer only
    /// ever loses intermediate states. Returns false if the channel is
    /// disconnected.
    fn deliver(&self, mut event: SnapshotEvent) -> bool {
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(SnapshotEvent::Snapshot { version, .. }) = self.backlog.try_recv() {
                        tracing::trace!(path = %self.path, version, "coalesced stale snapshot");
                    }
                    event = rejected;
                }
            }
        }
    }
}

/// Tracks listeners per collection and fans snapshots out to them.
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener on a collection.
    pub fn register(&self, path: CollectionPath, config: &ListenerConfig) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.listeners.write().insert(
            id,
            Listener {
                path,
                sender,
                backlog: receiver.clone(),
            },
        );

        ListenerHandle { id, receiver }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id);
        match removed {
            Some(listener) => {
                listener.deliver(SnapshotEvent::Dropped {
                    reason: DropReason::Unsubscribed,
                });
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Collections under `user` that currently have listeners.
    pub fn paths_for_user(&self, user: &UserId) -> Vec<CollectionPath> {
        let mut paths: Vec<_> = self
            .listeners
            .read()
            .values()
            .filter(|l| &l.path.user == user)
            .map(|l| l.path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Send an event to one listener.
    pub fn send_to(&self, id: ListenerId, event: SnapshotEvent) -> bool {
        match self.listeners.read().get(&id) {
            Some(listener) => listener.deliver(event),
            None => false,
        }
    }

    /// Broadcast a snapshot to every listener on `path`.
    pub fn broadcast_snapshot(
        &self,
        path: &CollectionPath,
        documents: Arc<Vec<StoredDocument>>,
        version: u64,
    ) {
        let event = SnapshotEvent::Snapshot { documents, version };
        for listener in self.listeners.read().values() {
            if &listener.path == path {
                listener.deliver(event.clone());
            }
        }
    }

    /// Terminate every listener on `path` with an error.
    pub fn fail(&self, path: &CollectionPath, message: &str) -> usize {
        let removed: Vec<_> = {
            let mut listeners = self.listeners.write();
            let ids: Vec<_> = listeners
                .iter()
                .filter(|(_, l)| &l.path == path)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| listeners.remove(&id).map(|l| (id, l)))
                .collect()
        };

        let reason = DropReason::Error(message.to_string());
        for (id, listener) in &removed {
            tracing::debug!(listener = id.0, path = %listener.path, ?reason, "dropping listener");
            listener.deliver(SnapshotEvent::Dropped {
                reason: reason.clone(),
            });
        }
        removed.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
