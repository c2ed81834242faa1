//! Priority-queued publish/subscribe.
//!
//! Publishing only enqueues. A single consumer task (started with
//! [`EventBus::start`]) drains the queue highest priority first, FIFO within a
//! priority, and fans each event out to every handler subscribed to its kind
//! (plus the `*` wildcard). Handlers of one event run concurrently; a handler
//! that fails or panics is logged and never takes the bus down.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::{Event, EventPriority};

pub const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus is already running")]
    AlreadyRunning,
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Queued {
    priority: EventPriority,
    seq: u64,
    event: Event,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    // Max-heap: higher priority wins, then the lower sequence number.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    queue: Mutex<BinaryHeap<Queued>>,
    seq: AtomicU64,
    next_id: AtomicU64,
    notify: Notify,
    running: AtomicBool,
    shutdown: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                queue: Mutex::new(BinaryHeap::new()),
                seq: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                notify: Notify::new(),
                running: AtomicBool::new(false),
                shutdown: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe<F, Fut>(&self, kind: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let kind = kind.into();
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move |event: Event| -> HandlerFuture { Box::pin(handler(event)) });

        let mut subscribers = self.inner.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.entry(kind.clone()).or_default().push((id, handler));
        debug!("Handler {:?} subscribed to {}", id, kind);
        id
    }

    /// Returns false when the subscription was not found.
    pub fn unsubscribe(&self, kind: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(handlers) = subscribers.get_mut(kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(kind);
        }
        if removed {
            debug!("Handler {:?} unsubscribed from {}", id, kind);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        let subscribers = self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner());
        subscribers.get(kind).map_or(0, Vec::len)
    }

    pub fn publish(&self, event: Event) {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        debug!("Event published: {} ({:?})", event.kind, event.priority);
        {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push(Queued {
                priority: event.priority,
                seq,
                event,
            });
        }
        self.inner.notify.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Spawn the consumer loop. Events queued while stopped are delivered first.
    pub fn start(&self) -> Result<(), BusError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(BusError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let bus = self.clone();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                bus.drain().await;
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = bus.inner.notify.notified() => {}
                }
            }
        });

        *self.inner.shutdown.lock().unwrap_or_else(|e| e.into_inner()) = Some((token, handle));
        info!("Event bus started");
        Ok(())
    }

    /// Stop the consumer. Anything still queued stays queued.
    pub async fn stop(&self) {
        let shutdown = self.inner.shutdown.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((token, handle)) = shutdown {
            token.cancel();
            if let Err(e) = handle.await {
                warn!("Event bus consumer ended abnormally: {}", e);
            }
        }
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Event bus stopped");
    }

    /// Dispatch everything currently queued, in priority order.
    /// Returns the number of events delivered.
    pub async fn drain(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = {
                let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.pop()
            };
            let Some(queued) = next else { break };
            self.dispatch(queued.event).await;
            delivered += 1;
        }
        delivered
    }

    async fn dispatch(&self, event: Event) {
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let subscribers = self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subscribers
                .get(&event.kind)
                .into_iter()
                .chain(subscribers.get(WILDCARD))
                .flatten()
                .cloned()
                .collect()
        };

        if handlers.is_empty() {
            return;
        }

        let tasks = handlers.into_iter().map(|(id, handler)| {
            let event = event.clone();
            (id, tokio::spawn(async move { handler(event).await }))
        });
        let (ids, joins): (Vec<_>, Vec<_>) = tasks.unzip();

        for (id, result) in ids.into_iter().zip(join_all(joins).await) {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error in event handler {:?} for {}: {}", id, event.kind, e),
                Err(e) => error!("Event handler {:?} for {} panicked: {}", id, event.kind, e),
            }
        }
    }
}

/// Convenience layer over a shared [`EventBus`].
#[derive(Clone, Debug, Default)]
pub struct EventManager {
    bus: EventBus,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn initialize(&self) -> Result<(), BusError> {
        self.bus.start()?;
        info!("Event manager initialized");
        Ok(())
    }

    pub async fn cleanup(&self) {
        self.bus.stop().await;
        info!("Event manager cleaned up");
    }

    pub fn create_event(
        &self,
        kind: impl Into<String>,
        data: Value,
        priority: EventPriority,
        source: impl Into<String>,
    ) -> Event {
        Event::new(kind, data).with_priority(priority).with_source(source)
    }

    pub fn emit(&self, kind: impl Into<String>, data: Value, priority: EventPriority) {
        self.emit_from(kind, data, priority, "system");
    }

    pub fn emit_from(
        &self,
        kind: impl Into<String>,
        data: Value,
        priority: EventPriority,
        source: impl Into<String>,
    ) {
        let event = self.create_event(kind, data, priority, source);
        self.bus.publish(event);
    }
}
