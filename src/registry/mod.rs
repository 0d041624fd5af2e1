//! Service registry: contract, typed filters and an in-memory implementation.
//!
//! ## Contents
//! - [`ServiceRegistry`] the seam to the host registry; [`Registration`] owned handle
//! - [`Filter`], [`Clause`] typed AND-of-clauses predicates with LDAP-style rendering
//! - [`Properties`], [`PropertyValue`] registration dictionaries
//! - [`TypeTag`] names services are published under
//! - [`InMemoryRegistry`] thread-safe in-process registry
//!
//! ## Quick wiring
//! ```text
//! ServiceBase::register ──► Registration::register ──► ServiceRegistry::register
//!                                                            │
//! ServicesTracker ──lookup/get_service──────────────────────►│
//!        ▲                                                   │
//!        └──── subscribe(Filter::session(id)) ◄── Registered / Unregistering
//! ```

mod filter;
mod memory;
mod properties;
#[allow(clippy::module_inception)]
mod registry;
mod tag;

pub use filter::{Clause, Filter};
pub use memory::InMemoryRegistry;
pub use properties::{OBJECT_CLASS, PROP_SESSION_ID, Properties, PropertyValue, properties};
pub use registry::{
    Registration, ServiceCallback, ServiceEvent, ServiceObject, ServiceReference,
    ServiceRegistry, SubscriptionId,
};
pub use tag::TypeTag;
