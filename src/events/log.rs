//! # Logging listener for debugging and demos.
//!
//! [`LogWriter`] records every event dispatched on a session through
//! `tracing::info!`, with the event type and its `Debug` form.
//!
//! ## Output format
//! ```text
//! INFO servisor::events::log: event dispatched listener="log-writer" event="app::Suspended" payload=Suspended { thread: 3 }
//! ```
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use servisor::{LogWriter, Scope, Session};
//! # fn demo(session: &Session, scope: &Scope) {
//! session.add_service_event_listener(scope, Arc::new(LogWriter), None);
//! # }
//! ```

use tracing::info;

use super::event::Event;
use super::handlers::HandlerTable;
use super::listener::EventListener;

/// Listener that logs every event it receives.
///
/// Enabled via the `logging` feature. Not intended for production use:
/// implement an [`EventListener`] with the handlers you need instead.
pub struct LogWriter;

impl EventListener for LogWriter {
    fn handlers(table: &mut HandlerTable<Self>) {
        table.on_any(|_me: &LogWriter, ev: &dyn Event| {
            info!(
                listener = "log-writer",
                event = ev.event_name(),
                payload = ?ev,
                "event dispatched"
            );
        });
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
