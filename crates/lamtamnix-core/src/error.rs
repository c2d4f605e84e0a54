//! Unified error types for the plugin host.
//!
//! Every fallible host operation returns [`AppError`]. Teardown faults are
//! deliberately a separate value type ([`TeardownFault`]): they are recovered
//! locally during container disposal and never propagate as errors.

use std::fmt;

use thiserror::Error;

use crate::types::id::ContextId;

/// Top-level error kind categorization used across the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// An operation was invoked on a container after it was disposed.
    Disposed,
    /// A usage query ran before process-wide resource monitoring was enabled.
    MonitoringDisabled,
    /// A context id was never created or has already been destroyed.
    UnknownContext,
    /// A plugin type could not be constructed inside its context.
    Instantiation,
    /// A discovery pass failed as a whole.
    Discovery,
    /// A call into a plugin failed.
    Invocation,
    /// A configuration error occurred.
    Configuration,
    /// A bounded wait at the isolation boundary expired.
    Timeout,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal host error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "DISPOSED"),
            Self::MonitoringDisabled => write!(f, "MONITORING_DISABLED"),
            Self::UnknownContext => write!(f, "UNKNOWN_CONTEXT"),
            Self::Instantiation => write!(f, "INSTANTIATION"),
            Self::Discovery => write!(f, "DISCOVERY"),
            Self::Invocation => write!(f, "INVOCATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout the plugin host.
///
/// Callers should treat [`ErrorKind::Disposed`] as a contract violation,
/// [`ErrorKind::MonitoringDisabled`] as a precondition to fix before
/// retrying, and [`ErrorKind::Instantiation`] as a problem with the
/// discovered plugin set.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a disposed-container error.
    pub fn disposed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Disposed, message)
    }

    /// Create a monitoring-disabled error.
    pub fn monitoring_disabled() -> Self {
        Self::new(
            ErrorKind::MonitoringDisabled,
            "resource monitoring has not been enabled for this process",
        )
    }

    /// Create an unknown-context error.
    pub fn unknown_context(id: ContextId) -> Self {
        Self::new(
            ErrorKind::UnknownContext,
            format!("isolation context {id} does not exist or was destroyed"),
        )
    }

    /// Create an instantiation error.
    pub fn instantiation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Instantiation, message)
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Discovery, message)
    }

    /// Create an invocation error.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invocation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` if this error reports a disposed container.
    pub fn is_disposed(&self) -> bool {
        self.kind == ErrorKind::Disposed
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

/// Why tearing down an isolation context did not complete cleanly.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TeardownFaultReason {
    /// The context was never created or was already destroyed.
    UnknownContext,
    /// The hosted plugin's unload hook reported an error.
    UnloadFailed(String),
    /// The plugin or the context thread panicked during teardown.
    Panicked(String),
    /// Teardown did not finish within the configured bound.
    TimedOut,
}

impl fmt::Display for TeardownFaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownContext => write!(f, "unknown context"),
            Self::UnloadFailed(msg) => write!(f, "unload failed: {msg}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// A non-fatal fault recorded while destroying one isolation context.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("teardown of context '{context_name}' ({context_id}) faulted: {reason}")]
pub struct TeardownFault {
    /// The context being torn down.
    pub context_id: ContextId,
    /// Friendly name of the context, empty if it was unknown.
    pub context_name: String,
    /// What went wrong.
    pub reason: TeardownFaultReason,
}

impl TeardownFault {
    /// Create a new teardown fault.
    pub fn new(context_id: ContextId, context_name: impl Into<String>, reason: TeardownFaultReason) -> Self {
        Self {
            context_id,
            context_name: context_name.into(),
            reason,
        }
    }

    /// Fault for a context id the host does not know.
    pub fn unknown(context_id: ContextId) -> Self {
        Self::new(context_id, "", TeardownFaultReason::UnknownContext)
    }
}
