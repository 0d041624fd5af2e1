//! # Per-client cache of registry lookups.
//!
//! A [`ServicesTracker`] resolves services of one session and remembers the
//! answer, including "nothing registered", so repeated lookups never touch the
//! registry. A registry subscription scoped to the session keeps the cache
//! honest.
//!
//! ## Architecture
//! ```text
//! get_service(key) ──► references[key] ──hit──► instances[ref] ──► Arc<T>
//!                          │ miss
//!                          ▼
//!                   registry.lookup ──► registry.get_service ──► cache both
//!
//! registry thread ── Unregistering(ref) ──► withdrawn += ref.id (any thread)
//!                                         ├─ on executor ──► invalidate now
//!                                         ├─ session active ──► submit invalidate
//!                                         └─ session ended ──► drop (debug!)
//! ```
//!
//! ## Rules
//! - Lookups run on the session executor (they take its [`Scope`]).
//! - A registry that is [`Unavailable`](crate::RegistryError::Unavailable)
//!   reads as "not found" and the miss is not cached.
//! - `Registered` notifications drop cached misses so a late service becomes visible.
//! - A reference is marked withdrawn as soon as `Unregistering` arrives, on
//!   whatever thread delivers it. Lookups skip withdrawn references even while
//!   the invalidation job is still queued.
//! - [`dispose`](ServicesTracker::dispose) must be called exactly once.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::executor::{Executor, Scope};
use crate::registry::{
    Filter, ServiceEvent, ServiceObject, ServiceReference, ServiceRegistry, SubscriptionId,
    TypeTag,
};
use crate::session::Session;

/// Cache key: a type tag plus the exact filter it was queried with.
///
/// Filters compare structurally, so two semantically equivalent filters
/// written differently are distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ServiceKey {
    tag: TypeTag,
    filter: Filter,
}

#[derive(Default)]
struct Cache {
    /// `None` records a lookup that found nothing.
    references: HashMap<ServiceKey, Option<ServiceReference>>,
    instances: HashMap<ServiceReference, ServiceObject>,
    /// Ids of references seen in `Unregistering`. Ids are never reused.
    withdrawn: HashSet<u64>,
}

/// Session-scoped cache over a [`ServiceRegistry`].
pub struct ServicesTracker {
    session_id: String,
    executor: Executor,
    registry: Arc<dyn ServiceRegistry>,
    subscription: Option<SubscriptionId>,
    disposed: AtomicBool,
    cache: Mutex<Cache>,
}

impl ServicesTracker {
    /// Creates a tracker for `session` and subscribes to registry changes of
    /// that session.
    ///
    /// A registry that refuses the subscription is logged; the tracker then
    /// works without invalidation.
    pub fn new(registry: Arc<dyn ServiceRegistry>, session: &Session) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ServicesTracker>| {
            let weak = weak.clone();
            let subscription = registry
                .subscribe(
                    Filter::session(session.id()),
                    Arc::new(move |event: &ServiceEvent| {
                        if let Some(tracker) = weak.upgrade() {
                            tracker.on_registry_event(event);
                        }
                    }),
                )
                .inspect_err(|err| {
                    warn!(session = session.id(), error = %err, "tracker could not subscribe to registry");
                })
                .ok();

            Self {
                session_id: session.id().to_string(),
                executor: session.executor().clone(),
                registry,
                subscription,
                disposed: AtomicBool::new(false),
                cache: Mutex::new(Cache::default()),
            }
        })
    }

    /// Id of the session this tracker is bound to.
    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True once [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(AtomicOrdering::SeqCst)
    }

    /// Service of concrete type `T` in this session.
    pub fn get_service<T>(&self, scope: &Scope) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_service_by_tag(scope, &TypeTag::of::<T>(), None)
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Service of concrete type `T` in this session whose properties also match `filter`.
    pub fn get_service_with<T>(&self, scope: &Scope, filter: &Filter) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_service_by_tag(scope, &TypeTag::of::<T>(), Some(filter))
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Service published under `tag` in this session, optionally narrowed by `filter`.
    ///
    /// # Panics
    /// When `scope` is not the session executor, or after `dispose`.
    pub fn get_service_by_tag(
        &self,
        scope: &Scope,
        tag: &TypeTag,
        filter: Option<&Filter>,
    ) -> Option<ServiceObject> {
        self.check_scope(scope);
        assert!(
            !self.is_disposed(),
            "services tracker for session {} used after dispose",
            self.session_id
        );

        let session = Filter::session(&self.session_id);
        let key = ServiceKey {
            tag: tag.clone(),
            filter: match filter {
                Some(filter) => session.and(filter.clone()),
                None => session,
            },
        };

        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.references.get(&key) {
                return cached
                    .as_ref()
                    .filter(|reference| !cache.withdrawn.contains(&reference.id()))
                    .and_then(|reference| cache.instances.get(reference).cloned());
            }
        }

        self.resolve(key)
    }

    /// Releases every cached instance and cancels the registry subscription.
    ///
    /// Off the executor, with the session still active, the release is
    /// scheduled on the executor and this returns immediately.
    ///
    /// # Panics
    /// When called twice.
    pub fn dispose(self: &Arc<Self>) {
        let already = self.disposed.swap(true, AtomicOrdering::SeqCst);
        assert!(
            !already,
            "services tracker for session {} disposed twice",
            self.session_id
        );

        if !self.executor.is_in_executor_thread() && Session::is_session_active(&self.session_id) {
            let tracker = Arc::clone(self);
            if self.executor.submit(move |_| tracker.release()).is_ok() {
                return;
            }
        }
        self.release();
    }

    /// Queries the registry for `key` and caches the outcome.
    fn resolve(&self, key: ServiceKey) -> Option<ServiceObject> {
        let found = match self.registry.lookup(&key.tag, &key.filter) {
            Ok(found) => found,
            Err(err) => {
                debug!(session = %self.session_id, tag = %key.tag, error = %err, "lookup failed");
                return None;
            }
        };

        let reference = {
            let mut cache = self.cache.lock();
            let live = found
                .into_iter()
                .find(|reference| !cache.withdrawn.contains(&reference.id()));
            let Some(reference) = live else {
                cache.references.insert(key, None);
                return None;
            };
            if let Some(service) = cache.instances.get(&reference).cloned() {
                cache.references.insert(key, Some(reference));
                return Some(service);
            }
            reference
        };

        match self.registry.get_service(&reference) {
            Ok(Some(service)) => {
                let mut cache = self.cache.lock();
                if cache.withdrawn.contains(&reference.id()) {
                    // Withdrawn while the instance was being checked out.
                    drop(cache);
                    self.unget(&reference);
                    return None;
                }
                cache.references.insert(key, Some(reference.clone()));
                cache.instances.insert(reference, Arc::clone(&service));
                Some(service)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(session = %self.session_id, tag = %key.tag, error = %err, "get_service failed");
                None
            }
        }
    }

    fn on_registry_event(self: &Arc<Self>, event: &ServiceEvent) {
        if self.is_disposed() {
            return;
        }
        match event {
            ServiceEvent::Unregistering(reference) => {
                self.cache.lock().withdrawn.insert(reference.id());
                let reference = reference.clone();
                self.on_executor("invalidate", move |tracker| tracker.invalidate(&reference));
            }
            ServiceEvent::Registered(_) => {
                self.on_executor("forget misses", |tracker| tracker.forget_misses());
            }
        }
    }

    /// Runs `f` now if already on the executor, otherwise marshals it there.
    /// Dropped when the session has ended.
    fn on_executor<F>(self: &Arc<Self>, what: &'static str, f: F)
    where
        F: FnOnce(&ServicesTracker) + Send + 'static,
    {
        if self.executor.is_in_executor_thread() {
            f(self);
            return;
        }
        if !Session::is_session_active(&self.session_id) {
            debug!(session = %self.session_id, what, "session ended, registry notification dropped");
            return;
        }

        let tracker = Arc::clone(self);
        if let Err(err) = self.executor.submit(move |_| f(&tracker)) {
            debug!(session = %self.session_id, what, error = %err, "registry notification dropped");
        }
    }

    /// Drops every mapping to `reference` and releases its instance.
    fn invalidate(&self, reference: &ServiceReference) {
        let released = {
            let mut cache = self.cache.lock();
            cache
                .references
                .retain(|_, cached| cached.as_ref() != Some(reference));
            cache.instances.remove(reference).is_some()
        };
        if released {
            self.unget(reference);
        }
    }

    fn forget_misses(&self) {
        self.cache.lock().references.retain(|_, cached| cached.is_some());
    }

    fn release(&self) {
        if let Some(id) = self.subscription {
            if let Err(err) = self.registry.unsubscribe(id) {
                debug!(session = %self.session_id, error = %err, "unsubscribe failed");
            }
        }

        let instances: Vec<ServiceReference> = {
            let mut cache = self.cache.lock();
            cache.references.clear();
            cache.withdrawn.clear();
            cache.instances.drain().map(|(reference, _)| reference).collect()
        };
        for reference in &instances {
            self.unget(reference);
        }
    }

    fn unget(&self, reference: &ServiceReference) {
        if let Err(err) = self.registry.unget_service(reference) {
            debug!(session = %self.session_id, id = reference.id(), error = %err, "unget_service failed");
        }
    }

    fn check_scope(&self, scope: &Scope) {
        assert!(
            scope.executor_id() == self.executor.id(),
            "services tracker for session {} used off its executor",
            self.session_id
        );
    }
}

impl fmt::Debug for ServicesTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("ServicesTracker")
            .field("session_id", &self.session_id)
            .field("references", &cache.references.len())
            .field("instances", &cache.instances.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::registry::{InMemoryRegistry, PROP_SESSION_ID, PropertyValue, properties};

    struct Stack(&'static str);

    fn publish(registry: &InMemoryRegistry, session: &Session, name: &'static str) -> ServiceReference {
        registry
            .register(
                vec![TypeTag::of::<Stack>()],
                properties([
                    (PROP_SESSION_ID, PropertyValue::from(session.id())),
                    ("name", PropertyValue::from(name)),
                ]),
                Arc::new(Stack(name)),
            )
            .unwrap()
    }

    fn setup() -> (Arc<InMemoryRegistry>, Arc<Session>, Arc<ServicesTracker>) {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let tracker = ServicesTracker::new(registry.clone(), &session);
        (registry, session, tracker)
    }

    #[tokio::test]
    async fn lookup_is_cached_and_counts_one_use() {
        let (registry, session, tracker) = setup();
        let reference = publish(&registry, &session, "a");

        let t = Arc::clone(&tracker);
        let same = session
            .executor()
            .call(move |scope| {
                let first = t.get_service::<Stack>(scope).unwrap();
                let second = t.get_service::<Stack>(scope).unwrap();
                Arc::ptr_eq(&first, &second)
            })
            .await
            .unwrap();

        assert!(same);
        assert_eq!(registry.use_count(&reference), Some(1));
        Session::end(&session);
    }

    #[tokio::test]
    async fn services_of_other_sessions_are_invisible() {
        let (registry, session, tracker) = setup();
        let other = Session::start(Executor::spawn(ExecutorConfig::default()), "other");
        publish(&registry, &other, "foreign");

        let t = Arc::clone(&tracker);
        let found = session
            .executor()
            .call(move |scope| t.get_service::<Stack>(scope).is_some())
            .await
            .unwrap();

        assert!(!found);
        Session::end(&session);
        Session::end(&other);
    }

    #[tokio::test]
    async fn explicit_filter_narrows_within_the_session() {
        let (registry, session, tracker) = setup();
        publish(&registry, &session, "a");
        publish(&registry, &session, "b");

        let t = Arc::clone(&tracker);
        let name = session
            .executor()
            .call(move |scope| {
                t.get_service_with::<Stack>(scope, &Filter::equals("name", "b"))
                    .map(|s| s.0)
            })
            .await
            .unwrap();

        assert_eq!(name, Some("b"));
        Session::end(&session);
    }

    #[tokio::test]
    async fn unregister_on_executor_invalidates_synchronously() {
        let (registry, session, tracker) = setup();
        let reference = publish(&registry, &session, "a");

        let (t, r) = (Arc::clone(&tracker), Arc::clone(&registry));
        let after = session
            .executor()
            .call(move |scope| {
                assert!(t.get_service::<Stack>(scope).is_some());
                r.unregister(&reference).unwrap();
                t.get_service::<Stack>(scope).is_some()
            })
            .await
            .unwrap();

        assert!(!after);
        Session::end(&session);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn withdrawn_reference_is_skipped_before_invalidation_runs() {
        let (registry, session, tracker) = setup();
        let reference = publish(&registry, &session, "a");

        let t = Arc::clone(&tracker);
        session
            .executor()
            .call(move |scope| t.get_service::<Stack>(scope).is_some())
            .await
            .unwrap();

        // Hold the executor so both lookups are queued ahead of the invalidation.
        let (release, gate) = std::sync::mpsc::channel::<()>();
        session
            .executor()
            .submit(move |_| {
                let _ = gate.recv();
            })
            .unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let t = Arc::clone(&tracker);
        session
            .executor()
            .submit(move |scope| {
                let cached = t.get_service::<Stack>(scope).is_some();
                let fresh = t
                    .get_service_with::<Stack>(scope, &Filter::equals("name", "a"))
                    .is_some();
                tx.send((cached, fresh)).unwrap();
            })
            .unwrap();

        tracker.on_registry_event(&ServiceEvent::Unregistering(reference.clone()));
        release.send(()).unwrap();

        let (cached, fresh) = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        session.executor().barrier().await.unwrap();

        assert!(!cached);
        assert!(!fresh);
        assert_eq!(registry.use_count(&reference), Some(0));
        Session::end(&session);
    }

    #[tokio::test]
    async fn unavailable_registry_reads_as_not_found() {
        let (registry, session, tracker) = setup();
        publish(&registry, &session, "a");
        registry.close();

        let t = Arc::clone(&tracker);
        let found = session
            .executor()
            .call(move |scope| t.get_service::<Stack>(scope).is_some())
            .await
            .unwrap();

        assert!(!found);
        Session::end(&session);
    }

    #[tokio::test]
    async fn dispose_releases_instances_and_subscription() {
        let (registry, session, tracker) = setup();
        let reference = publish(&registry, &session, "a");

        let t = Arc::clone(&tracker);
        session
            .executor()
            .call(move |scope| {
                t.get_service::<Stack>(scope);
                t.dispose();
            })
            .await
            .unwrap();

        assert!(tracker.is_disposed());
        assert_eq!(registry.use_count(&reference), Some(0));
        assert_eq!(registry.subscription_count(), 0);
        Session::end(&session);
    }

    #[tokio::test]
    async fn dispose_after_session_end_runs_in_the_caller() {
        let (registry, session, tracker) = setup();
        Session::end(&session);

        tracker.dispose();
        assert_eq!(registry.subscription_count(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "disposed twice")]
    async fn disposing_twice_panics() {
        let (_registry, session, tracker) = setup();
        Session::end(&session);
        tracker.dispose();
        tracker.dispose();
    }
}
