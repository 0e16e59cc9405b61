//! Change events for consumers that re-render on updates.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// Events emitted by a [`Wallet`](super::Wallet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// A new accounts snapshot replaced the list.
    AccountsChanged { count: usize },
    /// A new records snapshot replaced the list.
    RecordsChanged { count: usize },
    /// The pending notification was set.
    Notification { message: String },
    /// A live subscription ended with an error.
    SubscriptionEnded {
        collection: &'static str,
        error: String,
    },
}

/// Fan-out of events to any number of receivers.
#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<WalletEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<WalletEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Deliver to every live receiver, forgetting disconnected ones.
    pub fn emit(&self, event: WalletEvent) {
        self.subscribers
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_prunes_dropped_receivers() {
        let bus = EventBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(WalletEvent::AccountsChanged { count: 1 });

        assert_eq!(bus.subscribers.lock().len(), 1);
        assert_eq!(kept.try_recv().unwrap(), WalletEvent::AccountsChanged { count: 1 });
    }
}
