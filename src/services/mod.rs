//! Services: lifecycle base, registration merge and the lookup tracker.
//!
//! ## Contents
//! - [`Service`], [`Completion`] the contract every service implements
//! - [`ServiceBase`] startup number, tracker ownership, merged registration
//! - [`ServicesTracker`] session-scoped registry lookup cache
//! - [`initialize_service`], [`shutdown_service`] run a lifecycle step from async code
//!
//! ## Lifecycle
//! ```text
//! initialize ──► startup = session.next_startup_number()
//!            └─► tracker = ServicesTracker::new(registry, session)
//! register   ──► merge classes/properties ──► withdraw old ──► publish new
//! shutdown   ──► tracker.dispose() ──► withdraw registration
//! ```

mod base;
#[allow(clippy::module_inception)]
mod service;
mod tracker;

pub use base::ServiceBase;
pub use service::{Completion, Service, initialize_service, shutdown_service};
pub use tracker::ServicesTracker;
