//! One isolation context: a dedicated worker thread with a mailbox.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use lamtamnix_core::{
    AppError, AppResult, ContextId, Plugin, PluginTypeDescriptor, TeardownFault,
    TeardownFaultReason,
};

use crate::alloc;
use crate::counters::ResourceCounters;

type Job = Box<dyn FnOnce(&mut ContextState) + Send>;

enum Command {
    Run(Job),
    Shutdown(Sender<Result<(), TeardownFaultReason>>),
}

/// Why a unit of work did not produce a result.
#[derive(Debug)]
pub(crate) enum ExecError {
    /// The context thread is gone.
    Gone,
    /// The work panicked; the panic was contained on the context thread.
    Panicked(String),
    /// No reply within the bounded wait.
    TimedOut,
}

/// State owned by the context thread.
#[derive(Default)]
pub(crate) struct ContextState {
    plugin: Option<Box<dyn Plugin>>,
    /// Libraries backing the plugin; dropped after the plugin.
    keep_alive: Vec<Arc<dyn Any + Send + Sync>>,
}

impl ContextState {
    /// Construct and load the plugin described by `descriptor`.
    pub(crate) fn install(&mut self, descriptor: &PluginTypeDescriptor) -> Result<(), String> {
        if let Some(owner) = descriptor.keep_alive() {
            self.keep_alive.push(Arc::clone(owner));
        }
        let mut plugin = descriptor.instantiate()?;
        plugin
            .on_load()
            .map_err(|e| format!("on_load of '{}' failed: {e}", plugin.name()))?;
        self.plugin = Some(plugin);
        Ok(())
    }

    /// Forward a call to the hosted plugin.
    pub(crate) fn call(&mut self, method: &str, args: Value) -> Result<Value, String> {
        let plugin = self
            .plugin
            .as_mut()
            .ok_or_else(|| "context hosts no plugin".to_string())?;
        plugin.call(method, args)
    }

    fn unload(&mut self) -> Result<(), TeardownFaultReason> {
        let Some(plugin) = self.plugin.take() else {
            return Ok(());
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut plugin = plugin;
            let result = plugin.on_unload();
            drop(plugin);
            result
        }));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(TeardownFaultReason::UnloadFailed(msg)),
            Err(payload) => Err(TeardownFaultReason::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

/// A live isolation boundary hosting at most one plugin.
pub(crate) struct IsolationContext {
    id: ContextId,
    name: String,
    counters: Arc<ResourceCounters>,
    mailbox: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    occupied: AtomicBool,
}

impl IsolationContext {
    /// Start the context thread.
    pub(crate) fn spawn(id: ContextId, name: String) -> AppResult<Self> {
        let counters = Arc::new(ResourceCounters::new());
        let (mailbox, inbox) = unbounded();

        let thread_counters = Arc::clone(&counters);
        let worker = thread::Builder::new()
            .name(format!("ctx-{}", id.short()))
            .spawn(move || run(inbox, thread_counters))
            .map_err(|e| {
                AppError::with_source(
                    lamtamnix_core::ErrorKind::Internal,
                    format!("failed to start thread for context '{name}'"),
                    e,
                )
            })?;

        Ok(Self {
            id,
            name,
            counters,
            mailbox,
            worker: Mutex::new(Some(worker)),
            occupied: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn counters(&self) -> &ResourceCounters {
        &self.counters
    }

    /// Claim the context for a plugin. Returns `false` if already claimed.
    pub(crate) fn claim(&self) -> bool {
        !self.occupied.swap(true, Ordering::SeqCst)
    }

    /// Run `job` on the context thread and wait for its result.
    pub(crate) fn execute<R, F>(&self, timeout: Option<Duration>, job: F) -> Result<R, ExecError>
    where
        R: Send + 'static,
        F: FnOnce(&mut ContextState) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded::<Result<R, String>>(1);
        let job: Job = Box::new(move |state| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(state)))
                .map_err(|payload| panic_message(payload.as_ref()));
            let _ = reply_tx.send(outcome);
        });

        self.mailbox
            .send(Command::Run(job))
            .map_err(|_| ExecError::Gone)?;

        let reply = match timeout {
            Some(limit) => reply_rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => ExecError::TimedOut,
                RecvTimeoutError::Disconnected => ExecError::Gone,
            })?,
            None => reply_rx.recv().map_err(|_| ExecError::Gone)?,
        };
        reply.map_err(ExecError::Panicked)
    }

    /// Unload the plugin, stop the thread, and join it.
    pub(crate) fn shutdown(&self, timeout: Option<Duration>) -> Result<(), TeardownFault> {
        let fault = |reason| TeardownFault::new(self.id, self.name.clone(), reason);

        let (reply_tx, reply_rx) = bounded(1);
        // A failed send drops `reply_tx`, which surfaces below as a disconnect.
        let _ = self.mailbox.send(Command::Shutdown(reply_tx));

        let outcome = match timeout {
            Some(limit) => match reply_rx.recv_timeout(limit) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => {
                    // Leave the thread detached; it exits once the plugin returns.
                    self.worker.lock().take();
                    return Err(fault(TeardownFaultReason::TimedOut));
                }
                Err(RecvTimeoutError::Disconnected) => Err(TeardownFaultReason::Panicked(
                    "context thread exited before teardown".to_string(),
                )),
            },
            None => reply_rx.recv().unwrap_or_else(|_| {
                Err(TeardownFaultReason::Panicked(
                    "context thread exited before teardown".to_string(),
                ))
            }),
        };

        if let Some(worker) = self.worker.lock().take() {
            if let Err(payload) = worker.join() {
                return Err(fault(TeardownFaultReason::Panicked(panic_message(payload.as_ref()))));
            }
        }

        outcome.map_err(fault)
    }
}

impl std::fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("occupied", &self.occupied.load(Ordering::Relaxed))
            .finish()
    }
}

/// Context thread main loop.
fn run(inbox: Receiver<Command>, counters: Arc<ResourceCounters>) {
    let _attached = alloc::attach(&counters);
    let mut state = ContextState::default();

    for command in inbox.iter() {
        match command {
            Command::Run(job) => {
                let wall = Instant::now();
                let cpu = cpu_clock::thread_time();
                job(&mut state);
                let spent = match (cpu, cpu_clock::thread_time()) {
                    (Some(before), Some(after)) => after.saturating_sub(before),
                    _ => wall.elapsed(),
                };
                counters.record_processor_time(spent);
                trace!(elapsed_us = spent.as_micros() as u64, "Context job finished");
            }
            Command::Shutdown(reply) => {
                let outcome = state.unload();
                let _ = reply.send(outcome);
                break;
            }
        }
    }

    drop(state);
    debug!("Context thread exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
))]
mod cpu_clock {
    use std::time::Duration;

    /// CPU time consumed by the calling thread.
    pub(super) fn thread_time() -> Option<Duration> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
        if rc != 0 {
            return None;
        }
        Some(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
)))]
mod cpu_clock {
    use std::time::Duration;

    /// Not available on this platform; callers fall back to wall time.
    pub(super) fn thread_time() -> Option<Duration> {
        None
    }
}
