//! # Process-wide session directory.
//!
//! Holds the set of active sessions and the global session-started/ended
//! listeners. These have no natural owner executor, so they are guarded by
//! locks rather than confinement.
//!
//! ## Rules
//! - Session ids come from one global counter: unique even for sessions
//!   started concurrently from different threads.
//! - A session is active from the moment `start` returns until `end` removes it.
//! - Started/ended notifications run on the affected session's executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::session::Session;

/// Global sequence for session ids.
static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global sequence for lifecycle listener ids.
static LISTENER_SEQ: AtomicU64 = AtomicU64::new(0);

static DIRECTORY: Lazy<Directory> = Lazy::new(Directory::default);

/// Callback notified when a session starts or ends.
pub type SessionCallback = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;

/// Handle returned when adding a lifecycle listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionListenerId(u64);

#[derive(Default)]
struct Directory {
    active: Mutex<Vec<Arc<Session>>>,
    started: Mutex<Vec<(SessionListenerId, SessionCallback)>>,
    ended: Mutex<Vec<(SessionListenerId, SessionCallback)>>,
}

/// Next session id (decimal, starting at "0").
pub(crate) fn next_session_id() -> String {
    SESSION_SEQ.fetch_add(1, AtomicOrdering::Relaxed).to_string()
}

pub(crate) fn insert(session: Arc<Session>) {
    DIRECTORY.active.lock().push(session);
}

/// Removes `id` from the active set. Returns the removed session.
pub(crate) fn remove(id: &str) -> Option<Arc<Session>> {
    let mut active = DIRECTORY.active.lock();
    let index = active.iter().position(|s| s.id() == id)?;
    Some(active.remove(index))
}

pub(crate) fn is_active(id: &str) -> bool {
    DIRECTORY.active.lock().iter().any(|s| s.id() == id)
}

pub(crate) fn get(id: &str) -> Option<Arc<Session>> {
    DIRECTORY
        .active
        .lock()
        .iter()
        .find(|s| s.id() == id)
        .cloned()
}

pub(crate) fn active() -> Vec<Arc<Session>> {
    DIRECTORY.active.lock().clone()
}

pub(crate) fn add_started(callback: SessionCallback) -> SessionListenerId {
    add(&DIRECTORY.started, callback)
}

pub(crate) fn remove_started(id: SessionListenerId) -> bool {
    remove_listener(&DIRECTORY.started, id)
}

pub(crate) fn started_listeners() -> Vec<SessionCallback> {
    snapshot(&DIRECTORY.started)
}

pub(crate) fn add_ended(callback: SessionCallback) -> SessionListenerId {
    add(&DIRECTORY.ended, callback)
}

pub(crate) fn remove_ended(id: SessionListenerId) -> bool {
    remove_listener(&DIRECTORY.ended, id)
}

pub(crate) fn ended_listeners() -> Vec<SessionCallback> {
    snapshot(&DIRECTORY.ended)
}

fn add(
    list: &Mutex<Vec<(SessionListenerId, SessionCallback)>>,
    callback: SessionCallback,
) -> SessionListenerId {
    let id = SessionListenerId(LISTENER_SEQ.fetch_add(1, AtomicOrdering::Relaxed));
    list.lock().push((id, callback));
    id
}

fn remove_listener(list: &Mutex<Vec<(SessionListenerId, SessionCallback)>>, id: SessionListenerId) -> bool {
    let mut list = list.lock();
    let before = list.len();
    list.retain(|(lid, _)| *lid != id);
    list.len() != before
}

fn snapshot(list: &Mutex<Vec<(SessionListenerId, SessionCallback)>>) -> Vec<SessionCallback> {
    list.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;

    #[test]
    fn ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..64).map(|_| next_session_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate session id");
            }
        }
        assert_eq!(seen.len(), 8 * 64);
    }

    #[test]
    fn ids_are_decimal() {
        let id = next_session_id();
        assert!(id.parse::<u64>().is_ok());
    }
}
