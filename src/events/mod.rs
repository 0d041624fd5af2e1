//! Service events: data model, listener contract and session fan-out.
//!
//! ## Contents
//! - [`Event`], [`AsAny`] event values and their parent chain
//! - [`EventListener`], [`HandlerTable`] typed handler declaration
//! - [`ListenerId`] listener identity inside a session
//! - `dispatch` filtering, ordering and panic-isolated delivery
//!
//! ## Quick reference
//! - **Publishers**: any thread, through `Session::dispatch_event`.
//! - **Consumers**: listeners added with `Session::add_service_event_listener`,
//!   called on the session executor.

pub(crate) mod dispatch;
mod event;
mod handlers;
mod listener;
#[cfg(feature = "logging")]
mod log;

pub use event::{AsAny, Event};
pub use handlers::HandlerTable;
pub(crate) use listener::ListenerEntry;
pub use listener::{EventListener, ListenerId};
#[cfg(feature = "logging")]
pub use log::LogWriter;
