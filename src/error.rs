//! Error types used by executors, the service registry and services.
//!
//! This module defines three error enums:
//!
//! - [`ExecutorError`]: a job could not be handed to an executor.
//! - [`RegistryError`]: the service registry rejected a call.
//! - [`ServiceError`]: a service lifecycle step failed.
//!
//! Each type provides `as_label` for logging/metrics. Programming errors
//! (calling a session-confined method off its executor, disposing a tracker
//! twice, ending an inactive session) are not represented here: they panic.

use thiserror::Error;

/// # Errors produced when submitting work to an executor.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor was shut down; the job was dropped.
    #[error("executor is shut down")]
    Closed,

    /// The job panicked before producing a result.
    #[error("job panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use servisor::ExecutorError;
    ///
    /// assert_eq!(ExecutorError::Closed.as_label(), "executor_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Closed => "executor_closed",
            ExecutorError::Panicked { .. } => "executor_job_panicked",
        }
    }
}

/// # Errors produced by a service registry.
///
/// Callers on the lookup path treat every variant as "not found";
/// the service base logs them on the register/unregister paths and never
/// returns them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry no longer accepts calls (process shutting down).
    #[error("service registry is unavailable")]
    Unavailable,

    /// The registration was already withdrawn or never existed.
    #[error("unknown registration {id}")]
    UnknownRegistration {
        /// Registry-assigned id of the registration.
        id: u64,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Unavailable => "registry_unavailable",
            RegistryError::UnknownRegistration { .. } => "registry_unknown_registration",
        }
    }
}

/// # Errors produced by service lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The session executor rejected a job.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// The operation requires an initialized service.
    #[error("service is not initialized")]
    NotInitialized,

    /// `initialize` was called twice.
    #[error("service is already initialized")]
    AlreadyInitialized,

    /// The owning session ended before the operation ran.
    #[error("session {session} has ended")]
    SessionEnded {
        /// Id of the ended session.
        session: String,
    },
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use servisor::{ExecutorError, ServiceError};
    ///
    /// let err = ServiceError::from(ExecutorError::Closed);
    /// assert_eq!(err.as_label(), "service_executor");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Executor(_) => "service_executor",
            ServiceError::NotInitialized => "service_not_initialized",
            ServiceError::AlreadyInitialized => "service_already_initialized",
            ServiceError::SessionEnded { .. } => "service_session_ended",
        }
    }
}
