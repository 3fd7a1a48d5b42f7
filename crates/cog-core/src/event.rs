//! Named event sources and the bus that indirects over them.
//!
//! Module code subscribes to `(source, event)` pairs without knowing whether
//! the source is the chat gateway, an HTTP layer or purely in-process. Each
//! source is an [`EventSource`] registered under a name; [`LocalEmitter`] is
//! the in-process implementation and backs the built-in
//! [`FRAMEWORK_SOURCE`].
//!
//! # Example
//!
//! ```rust,ignore
//! use cog_core::event::{EventBus, ListenOptions, LocalEmitter, listener};
//!
//! let bus = EventBus::new();
//! bus.add_source("framework", Arc::new(LocalEmitter::new()));
//! let ready = listener(|_payload| async { Ok(()) });
//! bus.add_listener("framework", "ready", ready, ListenOptions::default())?;
//! bus.emit("ready", "framework", Arc::new(())).await?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::error::{BusError, BusResult};

/// Name of the in-process source the runtime installs for framework events.
pub const FRAMEWORK_SOURCE: &str = "framework";

/// Type-erased event payload. Listeners downcast to the type they expect.
pub type EventPayload = Arc<dyn Any + Send + Sync>;

/// A subscribed callback.
pub type Listener =
    Arc<dyn Fn(EventPayload) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wraps an async closure into a [`Listener`].
pub fn listener<F, Fut>(f: F) -> Listener
where
    F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |payload: EventPayload| -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(f(payload))
    })
}

/// Subscription options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenOptions {
    pub fn once() -> Self {
        Self { once: true }
    }
}

/// Handle identifying one subscription on one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// =============================================================================
// EventSource
// =============================================================================

/// Something listeners can attach to.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Attaches `listener` to `event`.
    fn subscribe(&self, event: &str, listener: Listener, options: ListenOptions) -> SubscriptionId;

    /// Detaches a listener. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Delivers `payload` to every listener of `event` and returns how many ran.
    async fn emit(&self, event: &str, payload: EventPayload) -> usize;
}

/// Shared handle to an [`EventSource`].
pub type SourceHandle = Arc<dyn EventSource>;

struct Subscription {
    id: SubscriptionId,
    listener: Listener,
    once: bool,
}

/// In-process [`EventSource`].
///
/// Listeners run sequentially in subscription order. A failing listener is
/// logged and does not stop the others. Once-listeners are detached before
/// they run, so concurrent emits never fire them twice.
#[derive(Default)]
pub struct LocalEmitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl LocalEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listeners attached to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventSource for LocalEmitter {
    fn subscribe(&self, event: &str, listener: Listener, options: ListenOptions) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                id,
                listener,
                once: options.once,
            });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        for subscriptions in listeners.values_mut() {
            if let Some(pos) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(pos);
                return true;
            }
        }
        false
    }

    async fn emit(&self, event: &str, payload: EventPayload) -> usize {
        let to_run: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let Some(subscriptions) = listeners.get_mut(event) else {
                return 0;
            };
            let to_run = subscriptions
                .iter()
                .map(|s| Arc::clone(&s.listener))
                .collect();
            subscriptions.retain(|s| !s.once);
            to_run
        };

        for listener in &to_run {
            if let Err(e) = listener(Arc::clone(&payload)).await {
                warn!(event = %event, error = %e, "Event listener failed");
            }
        }
        to_run.len()
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Registry of named event sources.
#[derive(Default)]
pub struct EventBus {
    sources: RwLock<HashMap<String, SourceHandle>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under `name`, returning the one it replaced.
    pub fn add_source(
        &self,
        name: impl Into<String>,
        source: SourceHandle,
    ) -> Option<SourceHandle> {
        let name = name.into();
        let previous = self.sources.write().insert(name.clone(), source);
        if previous.is_some() {
            warn!(source = %name, "Event source replaced, last registration wins");
        }
        previous
    }

    pub fn get_source(&self, name: &str) -> Option<SourceHandle> {
        self.sources.read().get(name).cloned()
    }

    pub fn remove_source(&self, name: &str) -> Option<SourceHandle> {
        self.sources.write().remove(name)
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.read().contains_key(name)
    }

    /// Names of all registered sources, sorted.
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Emits `event` on the named source.
    pub async fn emit(&self, event: &str, source: &str, payload: EventPayload) -> BusResult<usize> {
        let handle = self
            .get_source(source)
            .ok_or_else(|| BusError::SourceNotFound(source.to_string()))?;
        trace!(source = %source, event = %event, "Emitting event");
        Ok(handle.emit(event, payload).await)
    }

    /// Attaches a listener to `event` on the named source.
    pub fn add_listener(
        &self,
        source: &str,
        event: &str,
        listener: Listener,
        options: ListenOptions,
    ) -> BusResult<SubscriptionId> {
        let handle = self
            .get_source(source)
            .ok_or_else(|| BusError::SourceNotFound(source.to_string()))?;
        Ok(handle.subscribe(event, listener, options))
    }

    /// Detaches a listener from the named source.
    pub fn remove_listener(&self, source: &str, id: SubscriptionId) -> BusResult<bool> {
        let handle = self
            .get_source(source)
            .ok_or_else(|| BusError::SourceNotFound(source.to_string()))?;
        Ok(handle.unsubscribe(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        listener(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn bus_with_framework() -> EventBus {
        let bus = EventBus::new();
        bus.add_source(FRAMEWORK_SOURCE, Arc::new(LocalEmitter::new()));
        bus
    }

    #[tokio::test]
    async fn test_emit_unknown_source() {
        let bus = EventBus::new();
        let result = bus.emit("ready", "gateway", Arc::new(())).await;
        assert!(matches!(result, Err(BusError::SourceNotFound(name)) if name == "gateway"));
    }

    #[tokio::test]
    async fn test_listener_receives_payload() {
        let bus = bus_with_framework();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.add_listener(
            FRAMEWORK_SOURCE,
            "greet",
            listener(move |payload| {
                let sink = Arc::clone(&sink);
                async move {
                    if let Some(name) = payload.downcast_ref::<String>() {
                        sink.lock().push(name.clone());
                    }
                    Ok(())
                }
            }),
            ListenOptions::default(),
        )
        .unwrap();

        let ran = bus
            .emit("greet", FRAMEWORK_SOURCE, Arc::new("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(ran, 1);
        assert_eq!(*seen.lock(), vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_once_listener_fires_once() {
        let bus = bus_with_framework();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.add_listener(
            FRAMEWORK_SOURCE,
            "tick",
            counting_listener(&counter),
            ListenOptions::once(),
        )
        .unwrap();

        bus.emit("tick", FRAMEWORK_SOURCE, Arc::new(())).await.unwrap();
        bus.emit("tick", FRAMEWORK_SOURCE, Arc::new(())).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let bus = bus_with_framework();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.add_listener(
            FRAMEWORK_SOURCE,
            "tick",
            listener(|_| async { Err::<(), _>(anyhow::anyhow!("boom")) }),
            ListenOptions::default(),
        )
        .unwrap();
        bus.add_listener(
            FRAMEWORK_SOURCE,
            "tick",
            counting_listener(&counter),
            ListenOptions::default(),
        )
        .unwrap();

        let ran = bus.emit("tick", FRAMEWORK_SOURCE, Arc::new(())).await.unwrap();
        assert_eq!(ran, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let bus = bus_with_framework();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus
            .add_listener(
                FRAMEWORK_SOURCE,
                "tick",
                counting_listener(&counter),
                ListenOptions::default(),
            )
            .unwrap();

        assert!(bus.remove_listener(FRAMEWORK_SOURCE, id).unwrap());
        assert!(!bus.remove_listener(FRAMEWORK_SOURCE, id).unwrap());
        assert_eq!(bus.emit("tick", FRAMEWORK_SOURCE, Arc::new(())).await.unwrap(), 0);
    }
}
