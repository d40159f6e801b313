use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::history::History;
use super::observer::{HubObserver, NoopObserver};
use crate::event::OrderEvent;
use crate::logstore::EventStore;

/// Hub-side half of a subscription.
struct Slot {
    tx: mpsc::Sender<OrderEvent>,
    dropped: Arc<AtomicU64>,
}

/// In-process fan-out hub for order events.
///
/// Every subscriber owns a bounded queue. Publishing never waits on a
/// subscriber: when a queue is full the event is dropped for that subscriber
/// only and its drop counter is bumped. Clients close such gaps through replay,
/// served from the in-memory history (hot tier) backed by the durable log
/// (cold tier).
///
/// Locking: the subscriber map is behind a read/write lock so concurrent
/// publishes fan out in parallel and only subscribe/unsubscribe take the write
/// side. History and the durable log each use their own lock.
pub struct Hub {
    subscribers: RwLock<HashMap<u64, Slot>>,
    next_id: AtomicU64,
    history: Option<Mutex<History>>,
    store: Option<Arc<dyn EventStore>>,
    observer: Arc<dyn HubObserver>,
}

/// Builder for [`Hub`].
#[derive(Default)]
pub struct HubBuilder {
    history: Option<(usize, Duration)>,
    store: Option<Arc<dyn EventStore>>,
    observer: Option<Arc<dyn HubObserver>>,
}

impl HubBuilder {
    /// Keep up to `max_events` recent events, none older than `ttl`.
    #[must_use]
    pub fn history(mut self, max_events: usize, ttl: Duration) -> Self {
        self.history = Some((max_events, ttl));
        self
    }

    /// Append every published event to a durable store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Report subscriber and drop activity to an observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn HubObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Arc<Hub> {
        Arc::new(Hub {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            history: self
                .history
                .map(|(max, ttl)| Mutex::new(History::new(max, ttl))),
            store: self.store,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
        })
    }
}

impl Hub {
    /// Start building a hub.
    #[must_use]
    pub fn builder() -> HubBuilder {
        HubBuilder::default()
    }

    /// Hub with no history, no store and no observer.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    /// Register a bounded queue that receives every event published from now on.
    ///
    /// When `cancel` fires the subscriber is removed and its queue closed, so
    /// `Subscriber::recv` drains what is left and then returns `None`.
    pub fn subscribe(self: &Arc<Self>, cancel: CancellationToken, capacity: usize) -> Subscriber {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let weak_tx = tx.downgrade();
        let dropped = Arc::new(AtomicU64::new(0));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            subs.insert(
                id,
                Slot {
                    tx,
                    dropped: dropped.clone(),
                },
            );
        }
        self.observer.subscriber_added();
        debug!(subscriber_id = id, capacity, "Subscriber registered");

        let hub: Weak<Hub> = Arc::downgrade(self);
        tokio::spawn(async move {
            cancel.cancelled().await;
            if let Some(hub) = hub.upgrade() {
                hub.unsubscribe(id);
            }
        });

        Subscriber {
            id,
            rx,
            tx: weak_tx,
            dropped,
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    fn unsubscribe(&self, id: u64) -> bool {
        let removed = {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            subs.remove(&id).is_some()
        };
        if removed {
            self.observer.subscriber_removed();
            debug!(subscriber_id = id, "Subscriber removed");
        }
        removed
    }

    /// Deliver an event to all subscribers, then record it in history and the
    /// durable log.
    ///
    /// Store failures are logged and counted but never surfaced: live fan-out
    /// has already happened and durability is best-effort.
    pub async fn publish(&self, event: OrderEvent) {
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, slot) in subs.iter() {
                match slot.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        slot.dropped.fetch_add(1, Ordering::Relaxed);
                        self.observer.event_dropped();
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        // receiver dropped without cancelling
        for id in closed {
            self.unsubscribe(id);
        }
        self.observer.event_published();

        if let Some(history) = &self.history {
            let mut history = history.lock().unwrap_or_else(|e| e.into_inner());
            history.push(event.clone(), Utc::now());
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.append(&event).await {
                warn!(event_id = %event.id, error = %e, "Durable log append failed");
                self.observer.store_append_failed();
            }
        }
    }

    /// Push every retained event newer than `since` into `dest`'s queue.
    ///
    /// When history reaches back to the cursor, or there is no log, history
    /// answers alone. Otherwise the durable log (active file only) supplies
    /// the records older than anything in history, and history supplies the
    /// rest, so an event held by either tier is never skipped. Delivery
    /// follows the same drop-on-full policy as `publish`. Returns how many
    /// events were enqueued.
    pub async fn replay_since(&self, since: DateTime<Utc>, dest: &Subscriber) -> usize {
        let Some(tx) = dest.tx.upgrade() else {
            return 0;
        };

        let (hot, oldest, covered) = match &self.history {
            Some(history) => {
                let mut history = history.lock().unwrap_or_else(|e| e.into_inner());
                history.evict(Utc::now());
                (history.since(since), history.oldest(), history.covers(since))
            }
            None => (Vec::new(), None, false),
        };

        let mut sent = 0;
        if let (false, Some(store)) = (covered, &self.store) {
            let mut closed = false;
            let result = store
                .replay_since(since, &mut |ev: OrderEvent| {
                    // history already holds this one
                    if oldest.is_some_and(|oldest| ev.ts >= oldest) {
                        return ControlFlow::Continue(());
                    }
                    let flow = self.offer(&tx, &dest.dropped, ev);
                    match flow {
                        ControlFlow::Continue(()) => sent += 1,
                        ControlFlow::Break(()) => closed = true,
                    }
                    flow
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Durable log replay failed");
            }
            if closed {
                return sent;
            }
        }

        for ev in hot {
            if self.offer(&tx, &dest.dropped, ev).is_break() {
                break;
            }
            sent += 1;
        }
        debug!(subscriber_id = dest.id, %since, sent, "Replay finished");
        sent
    }

    /// Non-blocking send used by replay. Breaks only when the queue is closed;
    /// a full queue counts as a drop and the scan continues.
    fn offer(
        &self,
        tx: &mpsc::Sender<OrderEvent>,
        dropped: &AtomicU64,
        event: OrderEvent,
    ) -> ControlFlow<()> {
        match tx.try_send(event) {
            Ok(()) => ControlFlow::Continue(()),
            Err(TrySendError::Full(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                self.observer.event_dropped();
                ControlFlow::Continue(())
            }
            Err(TrySendError::Closed(_)) => ControlFlow::Break(()),
        }
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Copy of the history buffer, oldest first. Empty when history is disabled.
    #[must_use]
    pub fn history_snapshot(&self) -> Vec<OrderEvent> {
        self.history
            .as_ref()
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).snapshot())
            .unwrap_or_default()
    }

    /// The attached durable store, if any.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn EventStore>> {
        self.store.as_ref()
    }
}

/// Connection-side half of a subscription.
pub struct Subscriber {
    id: u64,
    rx: mpsc::Receiver<OrderEvent>,
    // weak so the queue closes once the hub lets go of its sender
    tx: mpsc::WeakSender<OrderEvent>,
    dropped: Arc<AtomicU64>,
}

impl Subscriber {
    /// Hub-assigned id
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscriber::recv`].
    pub fn try_recv(&mut self) -> Option<OrderEvent> {
        self.rx.try_recv().ok()
    }

    /// Events discarded for this subscriber because its queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("dropped", &self.dropped())
            .finish()
    }
}
