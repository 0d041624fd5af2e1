//! # Shared state and lifecycle of a service.
//!
//! [`ServiceBase`] is embedded in every [`Service`]. It knows the owning
//! session by id (resolved through the session directory, never held), hands
//! out the startup number, owns the service's [`ServicesTracker`] and its
//! registry [`Registration`].
//!
//! ## Registration merge
//! ```text
//! register([A, B], {x: 1})          register([B, C], {y: 2})
//!        │                                  │
//!        ▼                                  ▼
//! classes = {A, B, dyn Service, S}   classes = {A, B, dyn Service, S, C}
//! props   = {x: 1, session: id}      props   = {x: 1, y: 2, session: id}
//!        │                                  │
//!        └─► registry entry #1              ├─► withdraw #1
//!                                           └─► registry entry #2
//! ```
//!
//! Re-registering merges with what was registered before instead of replacing
//! it: classes are unioned, properties are overlaid key by key. The session id
//! property always wins over caller-supplied values.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::service::Service;
use super::tracker::ServicesTracker;
use crate::error::ServiceError;
use crate::executor::{Executor, Scope};
use crate::registry::{
    Filter, OBJECT_CLASS, PROP_SESSION_ID, Properties, PropertyValue, Registration,
    ServiceObject, ServiceReference, ServiceRegistry, TypeTag,
};
use crate::session::Session;

#[derive(Default)]
struct State {
    startup_number: Option<u64>,
    tracker: Option<Arc<ServicesTracker>>,
    registration: Option<Registration>,
    classes: Vec<TypeTag>,
    properties: Properties,
    filter: Option<Filter>,
}

/// Lifecycle state every service embeds.
pub struct ServiceBase {
    session_id: String,
    executor: Executor,
    registry: Arc<dyn ServiceRegistry>,
    state: Mutex<State>,
}

impl ServiceBase {
    /// Creates the base of a service living in `session` and publishing into `registry`.
    pub fn new(session: &Session, registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            session_id: session.id().to_string(),
            executor: session.executor().clone(),
            registry,
            state: Mutex::new(State::default()),
        }
    }

    /// Id of the owning session.
    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The owning session, while it is active.
    pub fn session(&self) -> Option<Arc<Session>> {
        Session::get_session(&self.session_id)
    }

    /// Executor of the owning session.
    #[inline]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Registry the service publishes into.
    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Startup number, assigned by [`initialize`](Self::initialize).
    pub fn startup_number(&self) -> Option<u64> {
        self.state.lock().startup_number
    }

    /// Tracker created by `initialize`, until `shutdown` disposes it.
    pub fn tracker(&self) -> Option<Arc<ServicesTracker>> {
        self.state.lock().tracker.clone()
    }

    /// Assigns the startup number and creates the tracker.
    ///
    /// # Panics
    /// When `scope` is not the session executor.
    pub fn initialize(&self, scope: &Scope) -> Result<(), ServiceError> {
        let session = self.session().ok_or_else(|| ServiceError::SessionEnded {
            session: self.session_id.clone(),
        })?;

        let mut state = self.state.lock();
        if state.startup_number.is_some() {
            return Err(ServiceError::AlreadyInitialized);
        }
        let startup = session.next_startup_number(scope);
        state.startup_number = Some(startup);
        state.tracker = Some(ServicesTracker::new(Arc::clone(&self.registry), &session));

        debug!(session = %self.session_id, startup, "service initialized");
        Ok(())
    }

    /// Disposes the tracker and withdraws the registration.
    ///
    /// # Panics
    /// When `scope` is not the session executor.
    pub fn shutdown(&self, scope: &Scope) -> Result<(), ServiceError> {
        self.check_scope(scope, "shut down");

        let tracker = {
            let mut state = self.state.lock();
            if state.startup_number.is_none() {
                return Err(ServiceError::NotInitialized);
            }
            state.tracker.take()
        };
        if let Some(tracker) = tracker {
            tracker.dispose();
        }
        self.unregister(scope);

        debug!(session = %self.session_id, "service shut down");
        Ok(())
    }

    /// Publishes `instance` under `classes` with `properties`, merged with any
    /// previous registration of this service.
    ///
    /// The class set always contains `dyn Service` and `S`; the session id
    /// property is always set. Returns the new reference, or `None` when the
    /// registry refused (logged).
    ///
    /// # Panics
    /// When `scope` is not the session executor.
    pub fn register<S: Service>(
        &self,
        scope: &Scope,
        instance: &Arc<S>,
        classes: impl IntoIterator<Item = TypeTag>,
        properties: Properties,
    ) -> Option<ServiceReference> {
        self.check_scope(scope, "registered");

        let (previous, classes, properties) = {
            let mut state = self.state.lock();

            let markers = [TypeTag::of::<dyn Service>(), TypeTag::of::<S>()];
            for tag in classes.into_iter().chain(markers) {
                if !state.classes.contains(&tag) {
                    state.classes.push(tag);
                }
            }

            state.properties.extend(properties);
            state.properties.insert(
                PROP_SESSION_ID.to_string(),
                PropertyValue::from(self.session_id.as_str()),
            );

            let mut described = state.properties.clone();
            described.insert(
                OBJECT_CLASS.to_string(),
                PropertyValue::List(state.classes.iter().map(|c| c.as_str().to_string()).collect()),
            );
            state.filter = Some(Filter::from_properties(&described));

            (
                state.registration.take(),
                state.classes.clone(),
                state.properties.clone(),
            )
        };

        if let Some(previous) = previous {
            self.withdraw(previous);
        }

        let service: ServiceObject = Arc::clone(instance) as ServiceObject;
        match Registration::register(Arc::clone(&self.registry), classes, properties, service) {
            Ok(registration) => {
                let reference = registration.reference().clone();
                debug!(session = %self.session_id, id = reference.id(), "service registered");
                self.state.lock().registration = Some(registration);
                Some(reference)
            }
            Err(err) => {
                warn!(session = %self.session_id, error = %err, label = err.as_label(), "service registration failed");
                None
            }
        }
    }

    /// Withdraws the current registration. Returns `false` if there was none.
    ///
    /// Merged classes and properties are kept for a later `register`.
    ///
    /// # Panics
    /// When `scope` is not the session executor.
    pub fn unregister(&self, scope: &Scope) -> bool {
        self.check_scope(scope, "unregistered");

        let registration = self.state.lock().registration.take();
        match registration {
            Some(registration) => {
                self.withdraw(registration);
                true
            }
            None => false,
        }
    }

    /// True while a registration is live.
    pub fn is_registered(&self) -> bool {
        self.state.lock().registration.is_some()
    }

    /// Reference of the live registration.
    pub fn reference(&self) -> Option<ServiceReference> {
        self.state
            .lock()
            .registration
            .as_ref()
            .map(|r| r.reference().clone())
    }

    /// Classes accumulated over every `register` call.
    pub fn registration_classes(&self) -> Vec<TypeTag> {
        self.state.lock().classes.clone()
    }

    /// Properties accumulated over every `register` call.
    pub fn properties(&self) -> Properties {
        self.state.lock().properties.clone()
    }

    /// Filter describing this service (classes, session id and properties).
    /// `None` before the first `register`.
    pub fn filter(&self) -> Option<Filter> {
        self.state.lock().filter.clone()
    }

    fn check_scope(&self, scope: &Scope, what: &str) {
        assert!(
            scope.executor_id() == self.executor.id(),
            "service of session {} {what} off its executor",
            self.session_id
        );
    }

    fn withdraw(&self, registration: Registration) {
        let id = registration.reference().id();
        if let Err(err) = registration.unregister() {
            warn!(session = %self.session_id, id, error = %err, label = err.as_label(), "service unregistration failed");
        }
    }
}

impl fmt::Debug for ServiceBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ServiceBase")
            .field("session_id", &self.session_id)
            .field("startup_number", &state.startup_number)
            .field("classes", &state.classes)
            .field("registered", &state.registration.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::registry::{InMemoryRegistry, properties};

    struct Sample {
        base: ServiceBase,
    }

    impl Service for Sample {
        fn base(&self) -> &ServiceBase {
            &self.base
        }
    }

    fn sample(session: &Session, registry: &Arc<InMemoryRegistry>) -> Arc<Sample> {
        Arc::new(Sample {
            base: ServiceBase::new(session, registry.clone()),
        })
    }

    #[tokio::test]
    async fn register_merges_classes_and_properties() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);

        let s = Arc::clone(&service);
        let (first, second) = session
            .executor()
            .call(move |scope| {
                let first = s.base().register(
                    scope,
                    &s,
                    [TypeTag::named("A"), TypeTag::named("B")],
                    properties([("x", PropertyValue::from(1))]),
                );
                let second = s.base().register(
                    scope,
                    &s,
                    [TypeTag::named("B"), TypeTag::named("C")],
                    properties([
                        ("y", PropertyValue::from(2)),
                        (PROP_SESSION_ID, PropertyValue::from("spoofed")),
                    ]),
                );
                (first.unwrap(), second.unwrap())
            })
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.len(), 1);

        let classes = service.base().registration_classes();
        for tag in ["A", "B", "C"] {
            assert_eq!(classes.iter().filter(|c| c.as_str() == tag).count(), 1);
        }
        assert!(classes.contains(&TypeTag::of::<dyn Service>()));
        assert!(classes.contains(&TypeTag::of::<Sample>()));

        assert_eq!(
            service.base().properties(),
            properties([
                ("x", PropertyValue::from(1)),
                ("y", PropertyValue::from(2)),
                (PROP_SESSION_ID, PropertyValue::from(session.id())),
            ])
        );

        let filter = service.base().filter().unwrap();
        assert!(filter.matches(second.properties()));
        assert!(filter.to_string().contains("(objectClass=*C)"));
        Session::end(&session);
    }

    #[tokio::test]
    async fn refused_registration_is_logged_not_returned() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);
        registry.close();

        let s = Arc::clone(&service);
        let reference = session
            .executor()
            .call(move |scope| s.base().register(scope, &s, [], Properties::new()))
            .await
            .unwrap();

        assert!(reference.is_none());
        assert!(!service.base().is_registered());
        Session::end(&session);
    }

    #[tokio::test]
    async fn register_off_the_session_executor_panics() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let foreign = Executor::spawn(ExecutorConfig::default());
        let service = sample(&session, &registry);

        let s = Arc::clone(&service);
        let outcome = foreign
            .call(move |scope| s.base().register(scope, &s, [], Properties::new()))
            .await;

        assert!(matches!(
            outcome,
            Err(crate::ExecutorError::Panicked { message }) if message.contains("off its executor")
        ));
        assert!(registry.is_empty());
        foreign.shutdown();
        Session::end(&session);
    }

    #[tokio::test]
    async fn unregister_keeps_merged_state() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);

        let s = Arc::clone(&service);
        let (withdrawn, again) = session
            .executor()
            .call(move |scope| {
                s.base().register(scope, &s, [TypeTag::named("A")], Properties::new());
                (s.base().unregister(scope), s.base().unregister(scope))
            })
            .await
            .unwrap();

        assert!(withdrawn);
        assert!(!again);
        assert!(registry.is_empty());
        assert!(service.base().registration_classes().contains(&TypeTag::named("A")));
        Session::end(&session);
    }

    #[tokio::test]
    async fn initialize_twice_is_rejected() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);

        let s = Arc::clone(&service);
        let (first, second) = session
            .executor()
            .call(move |scope| (s.base().initialize(scope), s.base().initialize(scope)))
            .await
            .unwrap();

        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(ServiceError::AlreadyInitialized));
        Session::end(&session);
    }

    #[tokio::test]
    async fn shutdown_disposes_tracker_and_withdraws_registration() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);

        let s = Arc::clone(&service);
        let tracker = session
            .executor()
            .call(move |scope| {
                s.base().initialize(scope).unwrap();
                s.base().register(scope, &s, [], Properties::new());
                let tracker = s.base().tracker().unwrap();
                s.base().shutdown(scope).unwrap();
                tracker
            })
            .await
            .unwrap();

        assert!(tracker.is_disposed());
        assert!(service.base().tracker().is_none());
        assert!(!service.base().is_registered());
        assert!(registry.is_empty());
        Session::end(&session);
    }

    #[tokio::test]
    async fn initialize_after_session_end_fails() {
        let registry = Arc::new(InMemoryRegistry::new());
        let session = Session::start(Executor::spawn(ExecutorConfig::default()), "test");
        let service = sample(&session, &registry);
        Session::end(&session);

        let s = Arc::clone(&service);
        let outcome = session
            .executor()
            .call(move |scope| s.base().initialize(scope))
            .await
            .unwrap();

        assert!(matches!(outcome, Err(ServiceError::SessionEnded { .. })));
    }
}
