//! # servisor
//!
//! **Servisor** coordinates cooperating services inside *sessions*.
//!
//! A session binds one single-consumer executor to a set of services and
//! listeners. Everything the session owns is mutated from that executor only,
//! services are published into a service registry under type tags and
//! properties, and events fan out to listeners in a deterministic order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Service    │   │   Service    │   │   Listener   │
//!     │ (startup #0) │   │ (startup #1) │   │   (plain)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ register         │ register         │ add_service_event_listener
//!            ▼                  ▼                  ▼
//! ┌──────────────────────┐  ┌─────────────────────────────────────────┐
//! │   ServiceRegistry    │  │  Session (id, owner, executor)          │
//! │ (objectClass, props, │  │  - listener entries (confined)          │
//! │  use counts, subs)   │  │  - startup counter (confined)           │
//! └──────┬───────────────┘  │  - model adapters (any thread)          │
//!        │                  └──────────────┬──────────────────────────┘
//!        │ Unregistering /                 │ dispatch_event(ev, origin)
//!        │ Registered                      ▼
//!        ▼                  ┌─────────────────────────────────────────┐
//! ┌──────────────────────┐  │  Executor (FIFO, one consumer task)     │
//! │   ServicesTracker    │  │   job: filter ─► select ─► order ─►     │
//! │ (per-service cache)  │─►│        deliver (panics isolated)        │
//! └──────────────────────┘  └─────────────────────────────────────────┘
//!     invalidation is marshalled onto the executor when it arrives
//!     from another thread
//! ```
//!
//! ### Dispatch order
//! ```text
//! dispatch_event(ev)
//!   ├─► services, ascending startup number
//!   └─► plain listeners, in registration order
//! ```
//!
//! ## Features
//! | Area            | Description                                                     | Key types / traits                          |
//! |-----------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Sessions**    | Executor-bound dispatch domains, process-wide directory.        | [`Session`]                                 |
//! | **Executor**    | Single-consumer FIFO with confinement proof.                    | [`Executor`], [`Scope`], [`ExecutorConfig`] |
//! | **Events**      | Typed handlers with parent-chain assignability.                 | [`Event`], [`EventListener`], [`HandlerTable`] |
//! | **Services**    | Lifecycle, startup order, merged registration.                  | [`Service`], [`ServiceBase`]                |
//! | **Tracker**     | Cached, self-invalidating registry lookups.                     | [`ServicesTracker`]                         |
//! | **Registry**    | Registry contract, typed filters, in-memory implementation.     | [`ServiceRegistry`], [`Filter`], [`InMemoryRegistry`] |
//! | **Errors**      | Typed errors for executor, registry and service steps.          | [`ExecutorError`], [`RegistryError`], [`ServiceError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] listener _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use servisor::{
//!     Event, EventListener, Executor, ExecutorConfig, HandlerTable, InMemoryRegistry,
//!     Properties, Service, ServiceBase, Session, initialize_service,
//! };
//!
//! #[derive(Debug)]
//! struct Suspended { thread: u32 }
//! impl Event for Suspended {}
//!
//! struct RunControl { base: ServiceBase }
//!
//! impl Service for RunControl {
//!     fn base(&self) -> &ServiceBase { &self.base }
//! }
//!
//! impl EventListener for RunControl {
//!     fn handlers(table: &mut HandlerTable<Self>) {
//!         table.on(|_me: &RunControl, ev: &Suspended| {
//!             let _ = ev.thread;
//!         });
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let session = Session::start(Executor::spawn(ExecutorConfig::default()), "example");
//!
//!     let service = Arc::new(RunControl { base: ServiceBase::new(&session, registry.clone()) });
//!     initialize_service(&service).await?;
//!
//!     let (s, svc) = (session.clone(), service.clone());
//!     session
//!         .executor()
//!         .call(move |scope| s.add_service_listener(scope, svc, None))
//!         .await?;
//!
//!     session.dispatch_event(Suspended { thread: 1 }, Properties::new());
//!     session.executor().barrier().await?;
//!
//!     Session::end(&session);
//!     Ok(())
//! }
//! ```
mod error;
mod events;
mod executor;
mod registry;
mod services;
mod session;

// ---- Public re-exports ----

pub use error::{ExecutorError, RegistryError, ServiceError};
pub use events::{AsAny, Event, EventListener, HandlerTable, ListenerId};
pub use executor::{Executor, ExecutorConfig, ExecutorId, Job, Scope};
pub use registry::{
    Clause, Filter, InMemoryRegistry, OBJECT_CLASS, PROP_SESSION_ID, Properties, PropertyValue,
    Registration, ServiceCallback, ServiceEvent, ServiceObject, ServiceReference, ServiceRegistry,
    SubscriptionId, TypeTag, properties,
};
pub use services::{
    Completion, Service, ServiceBase, ServicesTracker, initialize_service, shutdown_service,
};
pub use session::{Session, SessionListenerId};

// Optional: expose a simple built-in logging listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
