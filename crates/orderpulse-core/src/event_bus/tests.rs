use super::*;
use crate::error::{LogError, LogResult};
use crate::event::OrderEvent;
use crate::logstore::EventStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn event(id: &str, event_type: &str, ts: DateTime<Utc>) -> OrderEvent {
    let mut ev = OrderEvent::new("o-1", event_type, "paid", 100).with_timestamp(ts);
    ev.id = id.to_string();
    ev
}

async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn drain(sub: &mut Subscriber) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(ev) = sub.try_recv() {
        ids.push(ev.id);
    }
    ids
}

/// In-memory store standing in for the durable log.
#[derive(Default)]
struct MemoryStore {
    events: Mutex<Vec<OrderEvent>>,
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, event: &OrderEvent) -> LogResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn replay_since(
        &self,
        since: DateTime<Utc>,
        visit: &mut (dyn FnMut(OrderEvent) -> ControlFlow<()> + Send),
    ) -> LogResult<()> {
        let events = self.events.lock().unwrap().clone();
        for ev in events.into_iter().filter(|ev| ev.ts > since) {
            if visit(ev).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn health(&self) -> LogResult<()> {
        Ok(())
    }
}

struct FailingStore;

#[async_trait]
impl EventStore for FailingStore {
    async fn append(&self, _event: &OrderEvent) -> LogResult<()> {
        Err(LogError::Unavailable("disk gone".to_string()))
    }

    async fn replay_since(
        &self,
        _since: DateTime<Utc>,
        _visit: &mut (dyn FnMut(OrderEvent) -> ControlFlow<()> + Send),
    ) -> LogResult<()> {
        Err(LogError::Unavailable("disk gone".to_string()))
    }

    async fn health(&self) -> LogResult<()> {
        Err(LogError::Unavailable("disk gone".to_string()))
    }
}

#[tokio::test]
async fn test_subscriber_receives_in_publish_order() {
    let hub = Hub::new();
    let mut sub = hub.subscribe(CancellationToken::new(), 16);

    let now = Utc::now();
    for i in 0..10 {
        hub.publish(event(&i.to_string(), "order.created", now)).await;
    }

    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(drain(&mut sub), expected);
    assert_eq!(sub.dropped(), 0);
}

#[tokio::test]
async fn test_only_events_after_registration() {
    let hub = Hub::new();
    hub.publish(event("before", "order.created", Utc::now())).await;

    let mut sub = hub.subscribe(CancellationToken::new(), 4);
    hub.publish(event("after", "order.created", Utc::now())).await;

    assert_eq!(drain(&mut sub), vec!["after"]);
}

#[tokio::test]
async fn test_multiple_subscribers() {
    let hub = Hub::new();
    let mut sub1 = hub.subscribe(CancellationToken::new(), 8);
    let mut sub2 = hub.subscribe(CancellationToken::new(), 8);
    assert_eq!(hub.subscriber_count(), 2);

    hub.publish(event("e1", "order.created", Utc::now())).await;

    assert_eq!(sub1.recv().await.unwrap().id, "e1");
    assert_eq!(sub2.recv().await.unwrap().id, "e1");
}

#[tokio::test]
async fn test_full_subscriber_does_not_block_others() {
    let metrics = Arc::new(HubMetrics::new());
    let hub = Hub::builder().observer(metrics.clone()).build();
    let slow = hub.subscribe(CancellationToken::new(), 1);
    let mut fast = hub.subscribe(CancellationToken::new(), 16);

    let now = Utc::now();
    let mut last_drops = 0;
    for i in 0..5 {
        hub.publish(event(&i.to_string(), "order.created", now)).await;
        assert!(slow.dropped() >= last_drops);
        last_drops = slow.dropped();
    }

    assert_eq!(drain(&mut fast).len(), 5);
    assert_eq!(fast.dropped(), 0);
    assert_eq!(slow.dropped(), 4);
    assert_eq!(metrics.snapshot().dropped, 4);
    assert_eq!(metrics.snapshot().published, 5);
}

#[tokio::test]
async fn test_cancel_unsubscribes_and_closes_queue() {
    let metrics = Arc::new(HubMetrics::new());
    let hub = Hub::builder().observer(metrics.clone()).build();
    let cancel = CancellationToken::new();
    let mut sub = hub.subscribe(cancel.clone(), 4);
    assert_eq!(metrics.snapshot().subscribers, 1);

    hub.publish(event("e1", "order.created", Utc::now())).await;
    cancel.cancel();
    wait_until(|| hub.subscriber_count() == 0).await;

    // queued events drain, then the queue reports closed
    assert_eq!(sub.recv().await.unwrap().id, "e1");
    assert!(sub.recv().await.is_none());
    assert_eq!(metrics.snapshot().subscribers, 0);
}

#[tokio::test]
async fn test_dropped_receiver_is_pruned_on_publish() {
    let metrics = Arc::new(HubMetrics::new());
    let hub = Hub::builder().observer(metrics.clone()).build();
    let cancel = CancellationToken::new();
    let sub = hub.subscribe(cancel.clone(), 4);
    drop(sub);

    hub.publish(event("e1", "order.created", Utc::now())).await;
    assert_eq!(hub.subscriber_count(), 0);

    // a late cancel must not decrement the gauge twice
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(metrics.snapshot().subscribers, 0);
}

#[tokio::test]
async fn test_history_bound() {
    let hub = Hub::builder().history(5, Duration::from_secs(300)).build();
    let now = Utc::now();
    for i in 0..12 {
        hub.publish(event(&i.to_string(), "order.created", now)).await;
    }

    let ids: Vec<String> = hub.history_snapshot().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["7", "8", "9", "10", "11"]);
}

#[tokio::test]
async fn test_ttl_eviction_hides_old_events_from_replay() {
    let hub = Hub::builder().history(100, Duration::from_secs(60)).build();
    let now = Utc::now();
    hub.publish(event("stale", "order.created", now - TimeDelta::seconds(600)))
        .await;
    hub.publish(event("fresh", "order.created", now)).await;

    let mut sub = hub.subscribe(CancellationToken::new(), 16);
    let sent = hub
        .replay_since(now - TimeDelta::seconds(3600), &sub)
        .await;

    assert_eq!(sent, 1);
    assert_eq!(drain(&mut sub), vec!["fresh"]);
}

#[tokio::test]
async fn test_late_stale_event_does_not_linger_in_history() {
    let hub = Hub::builder().history(100, Duration::from_secs(60)).build();
    let now = Utc::now();
    hub.publish(event("live-1", "order.created", now)).await;
    hub.publish(event("late", "order.created", now - TimeDelta::minutes(10)))
        .await;
    hub.publish(event("live-2", "order.created", now)).await;

    let ids: Vec<String> = hub.history_snapshot().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["live-1", "live-2"]);

    // the stale entry must not make history look like it covers an old cursor
    let mut sub = hub.subscribe(CancellationToken::new(), 16);
    hub.replay_since(now - TimeDelta::minutes(30), &sub).await;
    assert_eq!(drain(&mut sub), vec!["live-1", "live-2"]);
}

#[tokio::test]
async fn test_replay_is_strictly_after_cursor() {
    let hub = Hub::builder().history(100, Duration::from_secs(600)).build();
    let base = Utc::now() - TimeDelta::seconds(60);
    for i in 0..5 {
        hub.publish(event(&i.to_string(), "order.created", base + TimeDelta::seconds(i)))
            .await;
    }

    let mut sub = hub.subscribe(CancellationToken::new(), 16);
    hub.replay_since(base + TimeDelta::seconds(2), &sub).await;

    assert_eq!(drain(&mut sub), vec!["3", "4"]);
}

#[tokio::test]
async fn test_replay_then_live_ordering() {
    let hub = Hub::builder().history(100, Duration::from_secs(600)).build();
    let base = Utc::now() - TimeDelta::seconds(30);

    hub.publish(event("E1", "A", base + TimeDelta::seconds(1))).await;
    hub.publish(event("E2", "B", base + TimeDelta::seconds(2))).await;

    let mut sub = hub.subscribe(CancellationToken::new(), 16);
    hub.replay_since(base + TimeDelta::milliseconds(1500), &sub)
        .await;

    assert_eq!(sub.recv().await.unwrap().id, "E2");
    let idle = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
    assert!(idle.is_err(), "nothing else should arrive before E3");

    hub.publish(event("E3", "A", base + TimeDelta::seconds(3))).await;
    assert_eq!(sub.recv().await.unwrap().id, "E3");
}

#[tokio::test]
async fn test_replay_respects_drop_policy() {
    let hub = Hub::builder().history(100, Duration::from_secs(600)).build();
    let base = Utc::now() - TimeDelta::seconds(30);
    for i in 0..4 {
        hub.publish(event(&i.to_string(), "A", base + TimeDelta::seconds(i)))
            .await;
    }

    let mut sub = hub.subscribe(CancellationToken::new(), 2);
    let sent = hub.replay_since(base - TimeDelta::seconds(1), &sub).await;

    assert_eq!(sent, 2);
    assert_eq!(sub.dropped(), 2);
    assert_eq!(drain(&mut sub), vec!["0", "1"]);
}

#[tokio::test]
async fn test_replay_falls_back_to_store() {
    let store = Arc::new(MemoryStore::default());
    let hub = Hub::builder()
        .history(2, Duration::from_secs(600))
        .store(store.clone())
        .build();
    let base = Utc::now() - TimeDelta::seconds(30);
    for i in 0..5 {
        hub.publish(event(&i.to_string(), "A", base + TimeDelta::seconds(i)))
            .await;
    }
    assert_eq!(store.events.lock().unwrap().len(), 5);

    // history only holds 3 and 4, so a cursor before 1 must come from the store
    let mut sub = hub.subscribe(CancellationToken::new(), 16);
    hub.replay_since(base, &sub).await;
    assert_eq!(drain(&mut sub), vec!["1", "2", "3", "4"]);

    // a cursor inside the history window is served from memory
    hub.replay_since(base + TimeDelta::seconds(3), &sub).await;
    assert_eq!(drain(&mut sub), vec!["4"]);
}

#[tokio::test]
async fn test_store_failure_is_not_fatal() {
    let metrics = Arc::new(HubMetrics::new());
    let hub = Hub::builder()
        .store(Arc::new(FailingStore))
        .observer(metrics.clone())
        .build();
    let mut sub = hub.subscribe(CancellationToken::new(), 4);

    hub.publish(event("e1", "A", Utc::now())).await;

    assert_eq!(sub.recv().await.unwrap().id, "e1");
    assert_eq!(metrics.snapshot().store_errors, 1);
    assert_eq!(hub.replay_since(Utc::now() - TimeDelta::hours(1), &sub).await, 0);
}

#[tokio::test]
async fn test_replay_into_closed_subscriber() {
    let hub = Hub::builder().history(10, Duration::from_secs(600)).build();
    hub.publish(event("e1", "A", Utc::now())).await;

    let cancel = CancellationToken::new();
    let sub = hub.subscribe(cancel.clone(), 4);
    cancel.cancel();
    wait_until(|| hub.subscriber_count() == 0).await;

    assert_eq!(hub.replay_since(Utc::now() - TimeDelta::hours(1), &sub).await, 0);
}

#[tokio::test]
async fn test_concurrent_publishers() {
    let hub = Hub::new();
    let mut sub = hub.subscribe(CancellationToken::new(), 1024);

    let mut handles = Vec::new();
    for p in 0..4 {
        let hub = hub.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                hub.publish(event(&format!("{p}-{i}"), "A", Utc::now())).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let received = drain(&mut sub);
    assert_eq!(received.len(), 200);
    // per-producer order is preserved
    for p in 0..4 {
        let prefix = format!("{p}-");
        let seq: Vec<usize> = received
            .iter()
            .filter_map(|id| id.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..50).collect::<Vec<_>>());
    }
}
