//! # Fan-out of one event to the listeners of a session.
//!
//! ## Algorithm
//! ```text
//! entries (registration order)
//!   │
//!   ├─► 1. drop entries whose filter rejects the origin properties
//!   ├─► 2. keep handlers whose type is assignable from the event
//!   ├─► 3. order: services by startup number, then plain listeners
//!   │        in registration order (stable sort)
//!   └─► 4. invoke; a panicking handler is logged and skipped
//! ```
//!
//! ## Rules
//! - Runs on the session executor only (called from a dispatch job).
//! - Handler panics never reach the publisher and never stop delivery.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use super::event::Event;
use super::handlers::Handler;
use super::listener::ListenerEntry;
use crate::executor::panic_message;
use crate::registry::Properties;

/// One handler invocation selected for an event.
pub(crate) struct Delivery<'a> {
    pub(crate) entry: &'a ListenerEntry,
    pub(crate) handler: &'a Handler,
}

/// Selects and orders the handler invocations for `event`.
pub(crate) fn plan<'a>(
    entries: &'a [Arc<ListenerEntry>],
    event: &dyn Event,
    origin: &Properties,
) -> Vec<Delivery<'a>> {
    let mut ranked: Vec<((u8, u64), &ListenerEntry)> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.filter().is_none_or(|f| f.matches(origin)))
        .map(|(position, entry)| {
            let rank = match entry.startup_number() {
                Some(startup) => (0, startup),
                None => (1, position as u64),
            };
            (rank, entry.as_ref())
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    ranked
        .into_iter()
        .flat_map(|(_, entry)| {
            entry
                .handlers()
                .iter()
                .filter(move |handler| handler.accepts(event))
                .map(move |handler| Delivery { entry, handler })
        })
        .collect()
}

/// Invokes every planned handler, isolating panics.
///
/// Returns the number of handlers that completed without panicking.
pub(crate) fn deliver(session: &str, deliveries: &[Delivery<'_>], event: &dyn Event) -> usize {
    let mut completed = 0;
    for delivery in deliveries {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| delivery.handler.invoke(event)));
        match outcome {
            Ok(()) => completed += 1,
            Err(payload) => {
                error!(
                    session,
                    listener = delivery.entry.name(),
                    handler = delivery.handler.event_name(),
                    event = event.event_name(),
                    panic = %panic_message(payload.as_ref()),
                    "event handler panicked"
                );
            }
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::events::{EventListener, HandlerTable};
    use crate::registry::{Filter, PropertyValue};

    #[derive(Debug)]
    struct Ping;
    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Event for Pong {}

    struct Recorder {
        label: &'static str,
        startup: Option<u64>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EventListener for Recorder {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on(|me: &Recorder, _: &Ping| me.log.lock().push(me.label));
        }

        fn startup_number(&self) -> Option<u64> {
            self.startup
        }
    }

    fn entry(
        label: &'static str,
        startup: Option<u64>,
        filter: Option<Filter>,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<ListenerEntry> {
        let listener = Arc::new(Recorder {
            label,
            startup,
            log: Arc::clone(log),
        });
        Arc::new(ListenerEntry::new(listener, filter))
    }

    #[test]
    fn services_come_first_in_startup_order_then_plain_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entries = vec![
            entry("plain-a", None, None, &log),
            entry("svc-7", Some(7), None, &log),
            entry("plain-b", None, None, &log),
            entry("svc-2", Some(2), None, &log),
        ];

        let deliveries = plan(&entries, &Ping, &Properties::new());
        assert_eq!(deliver("0", &deliveries, &Ping), 4);

        assert_eq!(*log.lock(), vec!["svc-2", "svc-7", "plain-a", "plain-b"]);
    }

    #[test]
    fn filter_rejects_entries_whose_origin_does_not_match() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entries = vec![
            entry("gdb", None, Some(Filter::equals("backend", "gdb")), &log),
            entry("any", None, None, &log),
        ];

        let mut origin = Properties::new();
        origin.insert("backend".into(), PropertyValue::from("lldb"));
        let deliveries = plan(&entries, &Ping, &origin);
        deliver("0", &deliveries, &Ping);

        assert_eq!(*log.lock(), vec!["any"]);
    }

    #[test]
    fn unrelated_event_selects_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entries = vec![entry("a", None, None, &log)];
        assert!(plan(&entries, &Pong, &Properties::new()).is_empty());
    }

    struct Exploding {
        calls: AtomicU64,
    }

    impl EventListener for Exploding {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on(|me: &Exploding, _: &Ping| {
                me.calls.fetch_add(1, Ordering::SeqCst);
                panic!("handler failure");
            });
        }
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let exploding = Arc::new(Exploding {
            calls: AtomicU64::new(0),
        });
        let entries = vec![
            Arc::new(ListenerEntry::new(Arc::clone(&exploding), None)),
            entry("after", None, None, &log),
        ];

        let deliveries = plan(&entries, &Ping, &Properties::new());
        assert_eq!(deliver("0", &deliveries, &Ping), 1);

        assert_eq!(exploding.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec!["after"]);
    }

    struct Silent;

    impl EventListener for Silent {
        fn handlers(_table: &mut HandlerTable<Self>) {}
    }

    #[test]
    #[should_panic(expected = "declares no handlers")]
    fn listener_without_handlers_is_rejected() {
        let _ = ListenerEntry::new(Arc::new(Silent), None);
    }
}
