//! Periodic resource-usage observer with lazily activated polling.
//!
//! The polling task exists only while at least one listener is subscribed:
//! the first subscription starts it (first tick immediately) and removing
//! the last one stops it. At most one usage query is in flight at a time,
//! including across a stop/start cycle.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use lamtamnix_core::{AppError, AppResult, SubscriptionId};

use crate::container::PluginContainer;
use crate::monitor::ResourcesUsage;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One published usage sample.
#[derive(Debug, Clone, Serialize)]
pub struct UsageEvent {
    /// Tick number, starting at 1 for the first published sample.
    pub sequence: u64,
    /// When the sample was taken.
    pub captured_at: DateTime<Utc>,
    /// Usage per plugin handle.
    pub usage: ResourcesUsage,
}

/// Receives observer output.
pub trait UsageListener: Send + Sync {
    /// A tick succeeded.
    fn on_usage(&self, event: &UsageEvent);

    /// A tick's usage query failed. Polling continues.
    fn on_error(&self, error: &AppError) {
        let _ = error;
    }

    /// A closed listener is dropped after the current tick.
    fn is_closed(&self) -> bool {
        false
    }
}

struct ChannelListener {
    tx: mpsc::UnboundedSender<UsageEvent>,
}

impl UsageListener for ChannelListener {
    fn on_usage(&self, event: &UsageEvent) {
        let _ = self.tx.send(event.clone());
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct TickTask {
    stop: watch::Sender<bool>,
}

#[derive(Default)]
struct Subscribers {
    listeners: HashMap<SubscriptionId, Arc<dyn UsageListener>>,
    task: Option<TickTask>,
}

struct Shared {
    container: Arc<PluginContainer>,
    subscribers: Mutex<Subscribers>,
    interval: watch::Sender<Duration>,
    in_flight: AtomicBool,
    sequence: AtomicU64,
    runtime: Handle,
}

/// Polls a [`PluginContainer`] and publishes [`UsageEvent`]s to subscribers.
pub struct ContainerObserver {
    shared: Arc<Shared>,
}

impl ContainerObserver {
    /// Create an observer on the current tokio runtime.
    pub fn new(container: Arc<PluginContainer>, interval: Duration) -> AppResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| AppError::internal(format!("container observer needs a tokio runtime: {e}")))?;
        Ok(Self::with_runtime(container, interval, runtime))
    }

    /// Create an observer whose polling task runs on `runtime`.
    pub fn with_runtime(container: Arc<PluginContainer>, interval: Duration, runtime: Handle) -> Self {
        let (interval, _) = watch::channel(interval.max(MIN_INTERVAL));
        Self {
            shared: Arc::new(Shared {
                container,
                subscribers: Mutex::new(Subscribers::default()),
                interval,
                in_flight: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                runtime,
            }),
        }
    }

    /// Register `listener`. The first subscription starts polling.
    pub fn subscribe(&self, listener: Arc<dyn UsageListener>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.listeners.insert(id, listener);
        if subscribers.task.is_none() {
            subscribers.task = Some(self.shared.start());
        }
        debug!(subscription = %id, listeners = subscribers.listeners.len(), "Observer subscription added");
        id
    }

    /// Subscribe a channel that receives every event.
    ///
    /// Dropping the receiver ends the subscription after the next tick.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<UsageEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.subscribe(Arc::new(ChannelListener { tx })), rx)
    }

    /// Remove a subscription. Removing the last one stops polling.
    ///
    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        if subscribers.listeners.remove(&id).is_none() {
            return false;
        }
        if subscribers.listeners.is_empty() {
            Shared::stop(&mut subscribers);
        }
        debug!(subscription = %id, listeners = subscribers.listeners.len(), "Observer subscription removed");
        true
    }

    /// Change the polling interval. Applies from the next tick on.
    pub fn set_update_interval(&self, interval: Duration) {
        self.shared.interval.send_replace(interval.max(MIN_INTERVAL));
    }

    /// Current polling interval.
    pub fn update_interval(&self) -> Duration {
        *self.shared.interval.borrow()
    }

    /// Whether the polling task is active.
    pub fn is_running(&self) -> bool {
        self.shared.subscribers.lock().task.is_some()
    }

    /// Number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.subscribers.lock().listeners.len()
    }
}

impl fmt::Debug for ContainerObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerObserver")
            .field("interval", &self.update_interval())
            .field("listeners", &self.listener_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for ContainerObserver {
    fn drop(&mut self) {
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.listeners.clear();
        Shared::stop(&mut subscribers);
    }
}

impl Shared {
    fn start(self: &Arc<Self>) -> TickTask {
        let (stop, stop_rx) = watch::channel(false);
        let interval_rx = self.interval.subscribe();
        self.runtime.spawn(Arc::clone(self).run(stop_rx, interval_rx));
        info!(interval_ms = self.interval.borrow().as_millis() as u64, "Resource observer started");
        TickTask { stop }
    }

    fn stop(subscribers: &mut Subscribers) {
        if let Some(task) = subscribers.task.take() {
            let _ = task.stop.send(true);
            info!("Resource observer stopped");
        }
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>, mut interval: watch::Receiver<Duration>) {
        loop {
            let started = Instant::now();
            self.tick().await;

            let mut deadline = started + *interval.borrow_and_update();
            loop {
                tokio::select! {
                    biased;
                    _ = stop.changed() => return,
                    changed = interval.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        deadline = started + *interval.borrow_and_update();
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Previous usage query still running, skipping tick");
            return;
        }

        let container = Arc::clone(&self.container);
        let result = tokio::task::spawn_blocking(move || container.resources_usage())
            .await
            .unwrap_or_else(|e| Err(AppError::internal(format!("usage query task failed: {e}"))));
        self.in_flight.store(false, Ordering::Release);

        let listeners: Vec<Arc<dyn UsageListener>> =
            self.subscribers.lock().listeners.values().cloned().collect();

        match result {
            Ok(usage) => {
                let event = UsageEvent {
                    sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
                    captured_at: Utc::now(),
                    usage,
                };
                debug!(sequence = event.sequence, plugins = event.usage.len(), "Publishing usage");
                for listener in &listeners {
                    notify(|| listener.on_usage(&event));
                }
            }
            Err(err) => {
                error!(error = %err, "Usage query failed");
                for listener in &listeners {
                    notify(|| listener.on_error(&err));
                }
            }
        }

        self.prune_closed();
    }

    fn prune_closed(&self) {
        // Listener callbacks run without the lock held; they may call back in.
        let listeners: Vec<(SubscriptionId, Arc<dyn UsageListener>)> = self
            .subscribers
            .lock()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();
        let closed: Vec<SubscriptionId> = listeners
            .into_iter()
            .filter(|(_, listener)| listener.is_closed())
            .map(|(id, _)| id)
            .collect();
        if closed.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.lock();
        let removed = closed
            .iter()
            .filter(|id| subscribers.listeners.remove(id).is_some())
            .count();
        if removed == 0 {
            return;
        }
        debug!(removed, "Dropped closed listeners");
        if subscribers.listeners.is_empty() {
            Shared::stop(&mut subscribers);
        }
    }
}

fn notify(f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        warn!(panic = %msg, "Usage listener panicked");
    }
}
