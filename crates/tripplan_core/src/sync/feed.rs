//! Push-based sequence snapshot feed.
//!
//! # Responsibility
//! - Fan out full-sequence snapshots to subscribers of one container.
//! - Drop subscribers whose receiving side has gone away.
//!
//! # Invariants
//! - Every snapshot carries the complete ordered item list of its container,
//!   so a later snapshot always supersedes an earlier one.
//! - A subscriber only ever receives snapshots for the container it
//!   subscribed to.

use crate::model::item::{ContainerId, Item};
use log::debug;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

struct Subscriber {
    container_id: ContainerId,
    sender: Sender<Vec<Item>>,
}

/// Shared subscriber list.
///
/// Cloning yields another handle to the same list, which lets several
/// repositories on one database act as independent writers while every
/// subscriber observes all of their commits.
#[derive(Clone, Default)]
pub struct SnapshotFeed {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl SnapshotFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for one container.
    ///
    /// `initial` is delivered immediately so the subscriber starts from the
    /// current persisted state.
    pub fn subscribe(&self, container_id: &str, initial: Vec<Item>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        // The receiver is alive here, so this send cannot fail.
        let _ = sender.send(initial);

        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(Subscriber {
                container_id: container_id.to_string(),
                sender,
            }),
            Err(poisoned) => poisoned.into_inner().push(Subscriber {
                container_id: container_id.to_string(),
                sender,
            }),
        }

        Subscription {
            container_id: container_id.to_string(),
            receiver,
        }
    }

    /// Delivers one snapshot to every live subscriber of `container_id`.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, container_id: &str, items: &[Item]) -> usize {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut delivered = 0;
        subscribers.retain(|subscriber| {
            if subscriber.container_id != container_id {
                return true;
            }
            match subscriber.sender.send(items.to_vec()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });

        debug!(
            "event=snapshot_publish module=sync status=ok container_id={} item_count={} delivered={}",
            container_id,
            items.len(),
            delivered
        );
        delivered
    }

    /// Number of registered subscribers, including ones not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Receiving side of one container subscription.
///
/// Dropping the value unsubscribes; the feed prunes it on the next publish.
pub struct Subscription {
    container_id: ContainerId,
    receiver: Receiver<Vec<Item>>,
}

impl Subscription {
    /// Container this subscription is bound to.
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Returns the next queued snapshot without blocking.
    pub fn try_next(&self) -> Option<Vec<Item>> {
        match self.receiver.try_recv() {
            Ok(items) => Some(items),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drains the queue and returns only the newest snapshot.
    pub fn drain_latest(&self) -> Option<Vec<Item>> {
        let mut latest = None;
        while let Some(items) = self.try_next() {
            latest = Some(items);
        }
        latest
    }
}
