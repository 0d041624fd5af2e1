//! # Service contract.
//!
//! A [`Service`] is a unit of functionality bound to one session. Its
//! lifecycle steps run on the session executor and report completion through
//! a [`Completion`] callback, so an implementation may finish asynchronously
//! (for example after its own dependencies answered).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use servisor::{Completion, Scope, Service, ServiceBase};
//!
//! struct Stack {
//!     base: ServiceBase,
//! }
//!
//! impl Service for Stack {
//!     fn base(&self) -> &ServiceBase {
//!         &self.base
//!     }
//!
//!     fn initialize(self: Arc<Self>, scope: &Scope, done: Completion) {
//!         if let Err(err) = self.base.initialize(scope) {
//!             return done(Err(err));
//!         }
//!         self.base.register(scope, &self, [], Default::default());
//!         done(Ok(()))
//!     }
//! }
//! ```

use std::sync::Arc;

use tokio::sync::oneshot;

use super::base::ServiceBase;
use crate::error::{ExecutorError, ServiceError};
use crate::executor::Scope;

/// Callback closing one lifecycle step.
pub type Completion = Box<dyn FnOnce(Result<(), ServiceError>) + Send + 'static>;

/// A session-bound unit published into the service registry.
pub trait Service: Send + Sync + 'static {
    /// Embedded lifecycle state.
    fn base(&self) -> &ServiceBase;

    /// Assigns the startup number and creates the tracker, then calls `done`.
    fn initialize(self: Arc<Self>, scope: &Scope, done: Completion) {
        done(self.base().initialize(scope));
    }

    /// Disposes the tracker and withdraws the registration, then calls `done`.
    fn shutdown(self: Arc<Self>, scope: &Scope, done: Completion) {
        done(self.base().shutdown(scope));
    }
}

/// Runs [`Service::initialize`] on the service's executor and waits for its completion.
pub async fn initialize_service<S: Service + ?Sized>(service: &Arc<S>) -> Result<(), ServiceError> {
    run_step(service, S::initialize).await
}

/// Runs [`Service::shutdown`] on the service's executor and waits for its completion.
pub async fn shutdown_service<S: Service + ?Sized>(service: &Arc<S>) -> Result<(), ServiceError> {
    run_step(service, S::shutdown).await
}

async fn run_step<S: Service + ?Sized>(
    service: &Arc<S>,
    step: fn(Arc<S>, &Scope, Completion),
) -> Result<(), ServiceError> {
    let (tx, rx) = oneshot::channel();
    let executor = service.base().executor().clone();
    let service = Arc::clone(service);

    executor
        .call(move |scope| {
            step(
                service,
                scope,
                Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                }),
            )
        })
        .await?;

    // A dropped completion means the step can never finish.
    rx.await.unwrap_or(Err(ServiceError::Executor(ExecutorError::Closed)))
}
