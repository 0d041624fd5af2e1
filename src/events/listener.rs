//! # Event listeners.
//!
//! [`EventListener`] is the extension point for code that reacts to service
//! events. Services implement it too and report their startup number, which
//! moves them ahead of plain listeners during dispatch.
//!
//! ## Example
//! ```rust
//! use servisor::{Event, EventListener, HandlerTable};
//!
//! #[derive(Debug)]
//! struct Suspended { thread: u32 }
//! impl Event for Suspended {}
//!
//! struct Console;
//!
//! impl EventListener for Console {
//!     fn handlers(table: &mut HandlerTable<Self>) {
//!         table.on(|_me: &Console, ev: &Suspended| {
//!             let _ = ev.thread;
//!         });
//!     }
//!
//!     fn name(&self) -> &'static str { "console" }
//! }
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use super::handlers::{Handler, HandlerTable};
use crate::registry::Filter;

/// Receives events dispatched on a session.
pub trait EventListener: Send + Sync + 'static {
    /// Declares the handlers of this listener.
    ///
    /// Called once per [`Session::add_service_event_listener`](crate::Session::add_service_event_listener).
    /// Declaring nothing is a configuration error and panics at registration.
    fn handlers(table: &mut HandlerTable<Self>)
    where
        Self: Sized;

    /// Startup number when this listener is a service, `None` otherwise.
    ///
    /// Services are notified before plain listeners, in ascending startup order.
    /// Services added with [`Session::add_service_listener`](crate::Session::add_service_listener)
    /// are ranked by their [`ServiceBase`](crate::ServiceBase) and need not override this.
    fn startup_number(&self) -> Option<u64> {
        None
    }

    /// Name used in logs. The default is the type name.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Identity of a registered listener (the address of its `Arc`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

impl ListenerId {
    /// Identity of `listener`.
    pub fn of<L: ?Sized>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }
}

/// One row of a session's listener table.
pub(crate) struct ListenerEntry {
    id: ListenerId,
    name: &'static str,
    filter: Option<Filter>,
    handlers: Vec<Handler>,
    startup: Box<dyn Fn() -> Option<u64> + Send + Sync>,
}

impl ListenerEntry {
    /// Builds the handler table of `listener`.
    ///
    /// # Panics
    /// When the listener declares no handlers.
    pub(crate) fn new<L: EventListener>(listener: Arc<L>, filter: Option<Filter>) -> Self {
        Self::with_startup(listener, filter, L::startup_number)
    }

    /// Like [`new`](Self::new), with the startup number read through `startup`
    /// instead of [`EventListener::startup_number`].
    ///
    /// # Panics
    /// When the listener declares no handlers.
    pub(crate) fn with_startup<L: EventListener>(
        listener: Arc<L>,
        filter: Option<Filter>,
        startup: fn(&L) -> Option<u64>,
    ) -> Self {
        let mut table = HandlerTable::new(Arc::clone(&listener));
        L::handlers(&mut table);
        assert!(
            !table.is_empty(),
            "event listener `{}` declares no handlers",
            listener.name()
        );

        let id = ListenerId::of(&listener);
        let name = listener.name();
        Self {
            id,
            name,
            filter,
            handlers: table.into_handlers(),
            startup: Box::new(move || startup(&listener)),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub(crate) fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    #[inline]
    pub(crate) fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Current startup number of the listener (read at dispatch time).
    #[inline]
    pub(crate) fn startup_number(&self) -> Option<u64> {
        (self.startup)()
    }
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
