//! Live session registry and broadcaster
//!
//! The hub is the only owner of the turn ring and of every session's outbound
//! queue. It is driven from the coordinator loop, one request at a time, which
//! is what lets the ring get away without any synchronization.

use crate::ring::TurnRing;
use crate::PlayerId;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Sending half of a session's bounded outbound queue
pub type Outbox = mpsc::Sender<Arc<str>>;

/// A session that left the ring, and who followed it at that moment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub id: PlayerId,
    pub successor: Option<PlayerId>,
}

#[derive(Debug, Default)]
pub struct Hub {
    ring: TurnRing<PlayerId>,
    outboxes: HashMap<PlayerId, Outbox>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the turn ring and the broadcast list
    pub fn register(&mut self, id: PlayerId, outbox: Outbox) {
        self.ring.add(id);
        self.outboxes.insert(id, outbox);
        info!("{} registered, {} connected", id, self.ring.len());
    }

    /// Removes a session and closes its outbound queue
    ///
    /// Dropping the sender is what tells the session's writer to stop.
    pub fn unregister(&mut self, id: PlayerId) -> Option<Departure> {
        let successor = self.ring.next(id).ok().filter(|&next| next != id);
        let removed = self.ring.remove(id);
        if self.outboxes.remove(&id).is_some() {
            info!("{} unregistered, {} connected", id, self.ring.len());
        }
        removed.then_some(Departure { id, successor })
    }

    /// Hands `payload` to every session without waiting
    ///
    /// A session whose queue is full or already closed is unregistered on the
    /// spot. Returns the evicted sessions so the caller can drop them from the game.
    pub fn broadcast(&mut self, payload: Arc<str>) -> Vec<Departure> {
        let mut evicted = Vec::new();

        for id in self.ring.enumerate() {
            let Some(outbox) = self.outboxes.get(&id) else {
                evicted.push(id);
                continue;
            };
            match outbox.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("{} is not keeping up, dropping it", id);
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    info!("{} outbound queue already closed", id);
                    evicted.push(id);
                }
            }
        }

        evicted
            .into_iter()
            .filter_map(|id| self.unregister(id))
            .collect()
    }

    pub fn ring(&self) -> &TurnRing<PlayerId> {
        &self.ring
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.ring.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
