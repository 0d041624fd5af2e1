//! Sessions: executor-bound dispatch domains and the process-wide directory.
//!
//! ## Contents
//! - [`Session`] listener table, startup counter, model adapters, event dispatch
//! - [`SessionListenerId`] handle for global session-started/ended listeners
//!
//! Services and trackers refer to their session by id and resolve it through
//! [`Session::get_session`]; nothing holds a back-pointer into a session.

mod adapters;
mod directory;
#[allow(clippy::module_inception)]
mod session;

pub use directory::SessionListenerId;
pub use session::Session;
