//! # Typed handler table.
//!
//! A listener declares what it wants to receive by filling a
//! [`HandlerTable`] once, when it is added to a session. Each entry maps one
//! event type to one closure; dispatch selects the entries whose type is
//! assignable from the runtime type of the published event.

use std::any::type_name;
use std::sync::Arc;

use super::event::Event;

/// Type-erased handler invocation.
type Invoke = Box<dyn Fn(&dyn Event) + Send + Sync>;

/// One declared `(event type, closure)` pair.
pub(crate) struct Handler {
    event_name: &'static str,
    accepts: fn(&dyn Event) -> bool,
    invoke: Invoke,
}

impl Handler {
    /// Declared event type name (for logs).
    #[inline]
    pub(crate) fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// True when the declared type is assignable from the runtime type of `event`.
    #[inline]
    pub(crate) fn accepts(&self, event: &dyn Event) -> bool {
        (self.accepts)(event)
    }

    #[inline]
    pub(crate) fn invoke(&self, event: &dyn Event) {
        (self.invoke)(event)
    }
}

/// Registration builder populated by [`EventListener::handlers`](super::EventListener::handlers).
///
/// Handlers are kept in declaration order; a listener with handlers for both a
/// type and one of its parents receives one invocation per matching handler.
pub struct HandlerTable<L> {
    listener: Arc<L>,
    handlers: Vec<Handler>,
}

impl<L: Send + Sync + 'static> HandlerTable<L> {
    pub(crate) fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            handlers: Vec::new(),
        }
    }

    /// Declares a handler for events of type `E` (and every event embedding an `E`).
    pub fn on<E, F>(&mut self, f: F) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &E) + Send + Sync + 'static,
    {
        let listener = Arc::clone(&self.listener);
        self.handlers.push(Handler {
            event_name: type_name::<E>(),
            accepts: |ev| ev.is::<E>(),
            invoke: Box::new(move |ev| {
                if let Some(ev) = ev.view::<E>() {
                    f(&listener, ev);
                }
            }),
        });
        self
    }

    /// Declares a handler that receives every event.
    pub fn on_any<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&L, &dyn Event) + Send + Sync + 'static,
    {
        let listener = Arc::clone(&self.listener);
        self.handlers.push(Handler {
            event_name: "dyn Event",
            accepts: |_| true,
            invoke: Box::new(move |ev| f(&listener, ev)),
        });
        self
    }

    /// Number of declared handlers.
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if nothing was declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn into_handlers(self) -> Vec<Handler> {
        self.handlers
    }
}
