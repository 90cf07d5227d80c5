// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Observer registry and best-effort broadcast.
//!
//! Observer identity is opaque: the transport hands the hub a [`Observer`]
//! handle and gets an [`ObserverId`] back. Delivery failures never propagate
//! to the broadcast caller; failed observers are pruned after the delivery
//! pass, never while iterating the registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::model::CanvasSnapshot;

/// Events fanned out to observers after a committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CanvasEvent {
    /// The complete post-cycle canvas, so observers always see a structurally
    /// consistent view (never per-container deltas).
    CanvasUpdated { snapshot: CanvasSnapshot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DeliveryError {}

/// Transport-supplied delivery handle. The hub never inspects the other end.
pub trait Observer: Send + Sync {
    fn deliver(&self, event: &CanvasEvent) -> Result<(), DeliveryError>;
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub pruned: Vec<ObserverId>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    observers: BTreeMap<ObserverId, Box<dyn Observer>>,
}

/// Registry of connected observers.
///
/// Register/unregister serialize against broadcast iteration through the
/// inner mutex, so the set is never modified mid-fan-out.
#[derive(Default)]
pub struct ObserverHub {
    inner: Mutex<HubInner>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, observer: Box<dyn Observer>) -> ObserverId {
        let mut inner = self.inner.lock().await;
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.insert(id, observer);
        debug!(observer = %id, total = inner.observers.len(), "observer registered");
        id
    }

    pub async fn unregister(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.observers.remove(&id).is_some();
        if removed {
            debug!(observer = %id, total = inner.observers.len(), "observer unregistered");
        }
        removed
    }

    pub async fn observer_count(&self) -> usize {
        self.inner.lock().await.observers.len()
    }

    /// Delivers `event` to every observer except `excluding`.
    ///
    /// Best effort per observer: one failed delivery never blocks or fails the
    /// others, and the failed observer is unregistered afterwards. Never
    /// raises to the caller.
    pub async fn broadcast(
        &self,
        event: &CanvasEvent,
        excluding: Option<ObserverId>,
    ) -> BroadcastOutcome {
        let mut inner = self.inner.lock().await;

        let mut outcome = BroadcastOutcome::default();
        for (id, observer) in &inner.observers {
            if excluding == Some(*id) {
                continue;
            }
            match observer.deliver(event) {
                Ok(()) => outcome.delivered += 1,
                Err(err) => {
                    warn!(observer = %id, error = %err, "delivery failed, pruning observer");
                    outcome.pruned.push(*id);
                }
            }
        }

        for id in &outcome.pruned {
            inner.observers.remove(id);
        }

        outcome
    }
}

/// Observer backed by a bounded tokio channel; a full or closed channel counts
/// as a failed delivery (and thus pruning).
pub struct ChannelObserver {
    tx: mpsc::Sender<CanvasEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<CanvasEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CanvasEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, event: &CanvasEvent) -> Result<(), DeliveryError> {
        self.tx
            .try_send(event.clone())
            .map_err(|err| DeliveryError::new(format!("channel delivery failed: {err}")))
    }
}

#[cfg(test)]
mod tests;
