// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use crate::model::{CanvasSettings, CanvasSize, CanvasSnapshot};

use super::{CanvasEvent, ChannelObserver, DeliveryError, Observer, ObserverHub};

fn event() -> CanvasEvent {
    CanvasEvent::CanvasUpdated {
        snapshot: CanvasSnapshot {
            containers: Vec::new(),
            canvas_size: CanvasSize::default(),
            settings: CanvasSettings::default(),
            last_updated_ms: 1,
        },
    }
}

struct FailingObserver;

impl Observer for FailingObserver {
    fn deliver(&self, _event: &CanvasEvent) -> Result<(), DeliveryError> {
        Err(DeliveryError::new("connection reset"))
    }
}

#[tokio::test]
async fn broadcast_reaches_all_registered_observers() {
    let hub = ObserverHub::new();
    let (a, mut rx_a) = ChannelObserver::channel(4);
    let (b, mut rx_b) = ChannelObserver::channel(4);
    hub.register(Box::new(a)).await;
    hub.register(Box::new(b)).await;

    let outcome = hub.broadcast(&event(), None).await;
    assert_eq!(outcome.delivered, 2);
    assert!(outcome.pruned.is_empty());
    assert_eq!(rx_a.recv().await, Some(event()));
    assert_eq!(rx_b.recv().await, Some(event()));
}

#[tokio::test]
async fn broadcast_excludes_originating_observer() {
    let hub = ObserverHub::new();
    let (a, mut rx_a) = ChannelObserver::channel(4);
    let (b, mut rx_b) = ChannelObserver::channel(4);
    let origin = hub.register(Box::new(a)).await;
    hub.register(Box::new(b)).await;

    let outcome = hub.broadcast(&event(), Some(origin)).await;
    assert_eq!(outcome.delivered, 1);
    assert_eq!(rx_b.recv().await, Some(event()));
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn failed_observer_is_pruned_without_blocking_others() {
    let hub = ObserverHub::new();
    let (healthy, mut rx) = ChannelObserver::channel(4);
    hub.register(Box::new(FailingObserver)).await;
    let failing = hub.register(Box::new(FailingObserver)).await;
    hub.register(Box::new(healthy)).await;

    let outcome = hub.broadcast(&event(), None).await;
    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.pruned.len(), 2);
    assert!(outcome.pruned.contains(&failing));
    assert_eq!(rx.recv().await, Some(event()));

    // Pruned observers are gone; the next pass is clean.
    assert_eq!(hub.observer_count().await, 1);
    let outcome = hub.broadcast(&event(), None).await;
    assert_eq!(outcome.delivered, 1);
    assert!(outcome.pruned.is_empty());
}

#[tokio::test]
async fn full_channel_counts_as_failed_delivery() {
    let hub = ObserverHub::new();
    let (slow, _rx) = ChannelObserver::channel(1);
    let id = hub.register(Box::new(slow)).await;

    // First delivery fills the channel, second prunes the observer.
    let outcome = hub.broadcast(&event(), None).await;
    assert_eq!(outcome.delivered, 1);
    let outcome = hub.broadcast(&event(), None).await;
    assert_eq!(outcome.pruned, vec![id]);
    assert_eq!(hub.observer_count().await, 0);
}

#[tokio::test]
async fn unregister_is_idempotent() {
    let hub = ObserverHub::new();
    let (observer, _rx) = ChannelObserver::channel(1);
    let id = hub.register(Box::new(observer)).await;
    assert!(hub.unregister(id).await);
    assert!(!hub.unregister(id).await);
}
