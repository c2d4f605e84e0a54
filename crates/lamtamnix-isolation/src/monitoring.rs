//! The resource monitoring switch.
//!
//! Usage queries are gated by a switch that is turned on once, early, before
//! contexts are created. Once enabled it cannot be turned off again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

static PROCESS_MONITORING: AtomicBool = AtomicBool::new(false);

/// Turn on process-wide resource monitoring.
pub fn enable_monitoring() {
    MonitoringSwitch::process().enable();
}

#[derive(Debug, Clone)]
enum Flag {
    Process,
    Local(Arc<AtomicBool>),
}

/// A handle to a monitoring enable flag.
#[derive(Debug, Clone)]
pub struct MonitoringSwitch {
    flag: Flag,
}

impl MonitoringSwitch {
    /// The single process-wide switch.
    pub fn process() -> Self {
        Self { flag: Flag::Process }
    }

    /// An independent switch, initially off. Hosts that must not observe
    /// the process-wide state (tests, embedded hosts) use one of these.
    pub fn local() -> Self {
        Self {
            flag: Flag::Local(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Turn monitoring on.
    pub fn enable(&self) {
        let was_enabled = match &self.flag {
            Flag::Process => PROCESS_MONITORING.swap(true, Ordering::SeqCst),
            Flag::Local(flag) => flag.swap(true, Ordering::SeqCst),
        };
        if !was_enabled {
            info!(process_wide = matches!(self.flag, Flag::Process), "Resource monitoring enabled");
        }
    }

    /// Whether monitoring is on.
    pub fn is_enabled(&self) -> bool {
        match &self.flag {
            Flag::Process => PROCESS_MONITORING.load(Ordering::SeqCst),
            Flag::Local(flag) => flag.load(Ordering::SeqCst),
        }
    }
}

impl Default for MonitoringSwitch {
    fn default() -> Self {
        Self::process()
    }
}
