//! # In-process service registry.
//!
//! [`InMemoryRegistry`] implements [`ServiceRegistry`] with a lock-protected
//! table. It is what tests and embedders without a host registry use.
//!
//! ## Rules
//! - Every reference carries [`OBJECT_CLASS`]: the list of its type tags.
//! - Use counts go up on `get_service` and down on `unget_service`.
//! - Callbacks are invoked after the table lock is released, so they may call
//!   back into the registry.
//! - After [`close`](InMemoryRegistry::close) every call returns
//!   [`RegistryError::Unavailable`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tracing::debug;

use super::filter::Filter;
use super::properties::{OBJECT_CLASS, Properties, PropertyValue};
use super::registry::{
    ServiceCallback, ServiceEvent, ServiceObject, ServiceReference, ServiceRegistry,
    SubscriptionId,
};
use super::tag::TypeTag;
use crate::error::RegistryError;

struct Entry {
    reference: ServiceReference,
    service: ServiceObject,
    use_count: usize,
}

struct Subscription {
    id: SubscriptionId,
    filter: Filter,
    callback: ServiceCallback,
}

#[derive(Default)]
struct State {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
    subscriptions: Vec<Subscription>,
}

impl State {
    /// Callbacks interested in `reference`, cloned so the lock can be released.
    fn interested(&self, reference: &ServiceReference) -> Vec<ServiceCallback> {
        self.subscriptions
            .iter()
            .filter(|s| s.filter.matches(reference.properties()))
            .map(|s| s.callback.clone())
            .collect()
    }
}

/// Thread-safe in-memory [`ServiceRegistry`].
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
    closed: AtomicBool,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every later call with [`RegistryError::Unavailable`].
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::SeqCst);
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current use count of `reference`, `None` when it is not registered.
    pub fn use_count(&self, reference: &ServiceReference) -> Option<usize> {
        self.state
            .lock()
            .entries
            .get(&reference.id())
            .map(|e| e.use_count)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    fn ensure_open(&self) -> Result<(), RegistryError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            Err(RegistryError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn notify(callbacks: Vec<ServiceCallback>, event: &ServiceEvent) {
        for callback in callbacks {
            callback(event);
        }
    }
}

impl ServiceRegistry for InMemoryRegistry {
    fn register(
        &self,
        classes: Vec<TypeTag>,
        mut properties: Properties,
        service: ServiceObject,
    ) -> Result<ServiceReference, RegistryError> {
        self.ensure_open()?;

        let tags: Vec<String> = classes.iter().map(|c| c.as_str().to_string()).collect();
        properties.insert(OBJECT_CLASS.to_string(), PropertyValue::List(tags));

        let (reference, callbacks) = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;

            let reference = ServiceReference::new(id, classes, properties);
            state.entries.insert(
                id,
                Entry {
                    reference: reference.clone(),
                    service,
                    use_count: 0,
                },
            );
            let callbacks = state.interested(&reference);
            (reference, callbacks)
        };

        debug!(id = reference.id(), classes = ?reference.classes(), "service registered");
        Self::notify(callbacks, &ServiceEvent::Registered(reference.clone()));
        Ok(reference)
    }

    fn unregister(&self, reference: &ServiceReference) -> Result<(), RegistryError> {
        self.ensure_open()?;

        let callbacks = {
            let state = self.state.lock();
            if !state.entries.contains_key(&reference.id()) {
                return Err(RegistryError::UnknownRegistration { id: reference.id() });
            }
            state.interested(reference)
        };

        Self::notify(callbacks, &ServiceEvent::Unregistering(reference.clone()));

        self.state.lock().entries.remove(&reference.id());
        debug!(id = reference.id(), "service unregistered");
        Ok(())
    }

    fn lookup(
        &self,
        class: &TypeTag,
        filter: &Filter,
    ) -> Result<Vec<ServiceReference>, RegistryError> {
        self.ensure_open()?;

        let state = self.state.lock();
        Ok(state
            .entries
            .values()
            .filter(|e| e.reference.has_class(class) && filter.matches(e.reference.properties()))
            .map(|e| e.reference.clone())
            .collect())
    }

    fn get_service(
        &self,
        reference: &ServiceReference,
    ) -> Result<Option<ServiceObject>, RegistryError> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        Ok(state.entries.get_mut(&reference.id()).map(|e| {
            e.use_count += 1;
            e.service.clone()
        }))
    }

    fn unget_service(&self, reference: &ServiceReference) -> Result<bool, RegistryError> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        match state.entries.get_mut(&reference.id()) {
            Some(e) if e.use_count > 0 => {
                e.use_count -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn subscribe(
        &self,
        filter: Filter,
        callback: ServiceCallback,
    ) -> Result<SubscriptionId, RegistryError> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscriptions.push(Subscription {
            id,
            filter,
            callback,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RegistryError> {
        self.ensure_open()?;

        self.state.lock().subscriptions.retain(|s| s.id != id);
        Ok(())
    }
}
