//! # Session: the dispatch and ownership domain.
//!
//! A [`Session`] binds one [`Executor`] to the services and listeners that
//! cooperate inside it. Its listener table and startup counter are confined
//! to that executor: every mutating method takes the executor's [`Scope`]
//! and asserts it belongs to this session.
//!
//! ## Architecture
//! ```text
//! Session::start(executor, owner) ──► directory (active set, id counter)
//!        │                                   │
//!        │                                   └─► started listeners (on executor)
//!        ▼
//! ┌──────────── Session ────────────┐
//! │ id, owner_id, executor          │
//! │ confined: startup counter,      │◄── &Scope (executor jobs only)
//! │           listener entries      │
//! │ adapters (any thread)           │
//! └─────────────────────────────────┘
//!        │
//! dispatch_event(ev, origin) ──► executor job ──► plan ──► deliver
//! ```
//!
//! ## Rules
//! - `dispatch_event` never runs listener code on the caller's thread.
//! - Dispatching on an ended session is a silent no-op.
//! - At most one listener entry per listener identity; adding the same
//!   listener again replaces its entry in place.

use std::any::type_name;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::adapters::AdapterTable;
use super::directory::{self, SessionCallback, SessionListenerId};
use crate::events::{Event, EventListener, ListenerEntry, ListenerId, dispatch};
use crate::executor::{Executor, Scope, panic_message};
use crate::registry::{Filter, Properties};
use crate::services::Service;

/// State only touched from inside the session's executor.
#[derive(Default)]
struct Confined {
    startup_counter: u64,
    listeners: Vec<Arc<ListenerEntry>>,
}

/// Dispatch domain owning one executor, a listener table and an adapter table.
pub struct Session {
    id: String,
    owner_id: String,
    executor: Executor,
    active: AtomicBool,
    confined: Mutex<Confined>,
    adapters: AdapterTable,
}

impl Session {
    /// Starts a new session on `executor` and publishes it as active.
    ///
    /// Callable from any thread. Session-started listeners run later, on
    /// `executor`.
    pub fn start(executor: Executor, owner_id: impl Into<String>) -> Arc<Session> {
        let session = Arc::new(Session {
            id: directory::next_session_id(),
            owner_id: owner_id.into(),
            executor,
            active: AtomicBool::new(true),
            confined: Mutex::new(Confined::default()),
            adapters: AdapterTable::default(),
        });
        directory::insert(Arc::clone(&session));
        debug!(session = %session.id, owner = %session.owner_id, "session started");

        session.notify_lifecycle("started", directory::started_listeners);
        session
    }

    /// Ends `session`: removes it from the active set and notifies
    /// session-ended listeners on its executor.
    ///
    /// # Panics
    /// When the session is not active (never started, or already ended).
    pub fn end(session: &Arc<Session>) {
        let removed = directory::remove(&session.id);
        assert!(removed.is_some(), "session {} is not active", session.id);

        session.active.store(false, AtomicOrdering::SeqCst);
        debug!(session = %session.id, "session ended");

        session.notify_lifecycle("ended", directory::ended_listeners);
    }

    /// True while the session `id` is active.
    pub fn is_session_active(id: &str) -> bool {
        directory::is_active(id)
    }

    /// The active session with `id`, if any.
    pub fn get_session(id: &str) -> Option<Arc<Session>> {
        directory::get(id)
    }

    /// Snapshot of all active sessions, in start order.
    pub fn active_sessions() -> Vec<Arc<Session>> {
        directory::active()
    }

    /// Adds a listener notified, on each new session's executor, when a session starts.
    pub fn add_session_started_listener<F>(f: F) -> SessionListenerId
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        directory::add_started(Arc::new(f))
    }

    /// Removes a session-started listener. Returns `false` if it was unknown.
    pub fn remove_session_started_listener(id: SessionListenerId) -> bool {
        directory::remove_started(id)
    }

    /// Adds a listener notified, on the ended session's executor, when a session ends.
    pub fn add_session_ended_listener<F>(f: F) -> SessionListenerId
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        directory::add_ended(Arc::new(f))
    }

    /// Removes a session-ended listener. Returns `false` if it was unknown.
    pub fn remove_session_ended_listener(id: SessionListenerId) -> bool {
        directory::remove_ended(id)
    }

    /// Process-unique session id (decimal).
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the component that started the session.
    #[inline]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Executor the session is confined to.
    #[inline]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// False once [`end`](Self::end) was called.
    pub fn is_active(&self) -> bool {
        self.active.load(AtomicOrdering::SeqCst)
    }

    /// Hands out the next startup number (0, 1, 2, ...).
    pub fn next_startup_number(&self, scope: &Scope) -> u64 {
        self.check_scope(scope);
        let mut confined = self.confined.lock();
        let number = confined.startup_counter;
        confined.startup_counter += 1;
        number
    }

    /// Adds `listener`, optionally restricted to events whose origin
    /// properties match `filter`.
    ///
    /// # Panics
    /// When `scope` is not this session's executor, or when the listener
    /// declares no handlers.
    pub fn add_service_event_listener<L: EventListener>(
        &self,
        scope: &Scope,
        listener: Arc<L>,
        filter: Option<Filter>,
    ) {
        self.check_scope(scope);
        self.insert_entry(ListenerEntry::new(listener, filter));
    }

    /// Adds a service as a listener, ranked by the startup number of its
    /// [`ServiceBase`](crate::ServiceBase) ahead of every plain listener.
    ///
    /// # Panics
    /// When `scope` is not this session's executor, or when the service
    /// declares no handlers.
    pub fn add_service_listener<S: Service + EventListener>(
        &self,
        scope: &Scope,
        service: Arc<S>,
        filter: Option<Filter>,
    ) {
        self.check_scope(scope);
        self.insert_entry(ListenerEntry::with_startup(service, filter, |s: &S| {
            s.base().startup_number()
        }));
    }

    /// Removes `listener`. Returns `false` if it was not registered.
    ///
    /// # Panics
    /// When `scope` is not this session's executor.
    pub fn remove_service_event_listener<L: ?Sized>(&self, scope: &Scope, listener: &Arc<L>) -> bool {
        self.check_scope(scope);
        let id = ListenerId::of(listener);

        let mut confined = self.confined.lock();
        let before = confined.listeners.len();
        confined.listeners.retain(|e| e.id() != id);
        confined.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self, scope: &Scope) -> usize {
        self.check_scope(scope);
        self.confined.lock().listeners.len()
    }

    /// Enqueues delivery of `event` to the session's listeners and returns.
    ///
    /// `origin` holds the properties of the publisher; listener filters are
    /// evaluated against it. Callable from any thread.
    pub fn dispatch_event<E: Event>(self: &Arc<Self>, event: E, origin: Properties) {
        let session = Arc::clone(self);
        let submitted = self.executor.submit(move |_scope| {
            if !session.is_active() {
                debug!(session = %session.id, event = type_name::<E>(), "session ended, event dropped");
                return;
            }
            // Snapshot so handlers may add or remove listeners.
            let entries = session.confined.lock().listeners.clone();
            let deliveries = dispatch::plan(&entries, &event, &origin);
            dispatch::deliver(&session.id, &deliveries, &event);
        });

        if let Err(err) = submitted {
            debug!(session = %self.id, error = %err, "event not dispatched");
        }
    }

    /// Stores `adapter` as the `T` view of this session (last write wins).
    pub fn register_model_adapter<T>(&self, adapter: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.adapters.register(adapter);
    }

    /// Drops the `T` adapter. Returns `false` if none was registered.
    pub fn unregister_model_adapter<T: ?Sized + 'static>(&self) -> bool {
        self.adapters.unregister::<T>()
    }

    /// The `T` adapter, if registered.
    pub fn get_model_adapter<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.adapters.get::<T>()
    }

    fn insert_entry(&self, entry: ListenerEntry) {
        let entry = Arc::new(entry);
        let mut confined = self.confined.lock();
        match confined.listeners.iter().position(|e| e.id() == entry.id()) {
            Some(index) => confined.listeners[index] = entry,
            None => confined.listeners.push(entry),
        }
    }

    fn check_scope(&self, scope: &Scope) {
        assert!(
            scope.executor_id() == self.executor.id(),
            "session {} accessed from {} instead of its executor {}",
            self.id,
            scope.executor_id(),
            self.executor.id()
        );
    }

    /// Runs the current lifecycle listeners on the session executor.
    fn notify_lifecycle(self: &Arc<Self>, phase: &'static str, listeners: fn() -> Vec<SessionCallback>) {
        let session = Arc::clone(self);
        let submitted = self.executor.submit(move |_scope| {
            for listener in listeners() {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&session))) {
                    error!(
                        session = %session.id,
                        phase,
                        panic = %panic_message(payload.as_ref()),
                        "session listener panicked"
                    );
                }
            }
        });

        if let Err(err) = submitted {
            debug!(session = %self.id, phase, error = %err, "session listeners not notified");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("executor", &self.executor)
            .field("active", &self.is_active())
            .finish()
    }
}
