//! # Service registry contract.
//!
//! [`ServiceRegistry`] is the seam to the host's service registry
//! (OSGi-shaped): publish an object under type tags and properties, resolve
//! a tag plus filter to references, check instances in and out, and observe
//! registrations through filtered subscriptions.
//!
//! ## Rules
//! - Subscription callbacks run synchronously on the thread that mutated the
//!   registry, with no registry lock held.
//! - `Unregistering` is delivered *before* the service disappears.
//! - Every method may fail with [`RegistryError::Unavailable`] once the host
//!   is shutting down.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::filter::Filter;
use super::properties::{Properties, PropertyValue};
use super::tag::TypeTag;
use crate::error::RegistryError;

/// A published service instance.
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// Subscription callback.
pub type ServiceCallback = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

/// Handle to one registration inside a registry.
///
/// Equality and hashing use the registry-assigned id only.
#[derive(Clone)]
pub struct ServiceReference {
    id: u64,
    classes: Arc<[TypeTag]>,
    properties: Arc<Properties>,
}

impl ServiceReference {
    /// Creates a reference (used by registry implementations).
    pub fn new(id: u64, classes: Vec<TypeTag>, properties: Properties) -> Self {
        Self {
            id,
            classes: classes.into(),
            properties: Arc::new(properties),
        }
    }

    /// Registry-assigned id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tags the service is published under.
    #[inline]
    pub fn classes(&self) -> &[TypeTag] {
        &self.classes
    }

    /// Published properties.
    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// One published property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// True when the service is published under `class`.
    pub fn has_class(&self, class: &TypeTag) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceReference {}

impl Hash for ServiceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("id", &self.id)
            .field("classes", &self.classes)
            .finish()
    }
}

/// Registry change delivered to subscribers.
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// A service was published.
    Registered(ServiceReference),
    /// A service is about to be withdrawn.
    Unregistering(ServiceReference),
}

impl ServiceEvent {
    /// The reference concerned by this event.
    pub fn reference(&self) -> &ServiceReference {
        match self {
            ServiceEvent::Registered(r) | ServiceEvent::Unregistering(r) => r,
        }
    }
}

/// Identity of a registry subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Host service registry.
pub trait ServiceRegistry: Send + Sync + 'static {
    /// Publishes `service` under `classes` with `properties`.
    ///
    /// Reference ids are never reused within one registry.
    fn register(
        &self,
        classes: Vec<TypeTag>,
        properties: Properties,
        service: ServiceObject,
    ) -> Result<ServiceReference, RegistryError>;

    /// Withdraws a registration. Subscribers see `Unregistering` first.
    fn unregister(&self, reference: &ServiceReference) -> Result<(), RegistryError>;

    /// References published under `class` whose properties match `filter`,
    /// in registration order.
    fn lookup(&self, class: &TypeTag, filter: &Filter)
    -> Result<Vec<ServiceReference>, RegistryError>;

    /// Checks out the instance behind `reference` (bumps its use count).
    ///
    /// `Ok(None)` when the registration is gone.
    fn get_service(&self, reference: &ServiceReference)
    -> Result<Option<ServiceObject>, RegistryError>;

    /// Releases one use of `reference`. Returns `false` if it was not in use.
    fn unget_service(&self, reference: &ServiceReference) -> Result<bool, RegistryError>;

    /// Observes registrations whose properties match `filter`.
    fn subscribe(
        &self,
        filter: Filter,
        callback: ServiceCallback,
    ) -> Result<SubscriptionId, RegistryError>;

    /// Cancels a subscription.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RegistryError>;
}

/// Owned registration: the reference plus the registry it lives in.
pub struct Registration {
    registry: Arc<dyn ServiceRegistry>,
    reference: ServiceReference,
}

impl Registration {
    /// Publishes `service` into `registry`.
    pub fn register(
        registry: Arc<dyn ServiceRegistry>,
        classes: Vec<TypeTag>,
        properties: Properties,
        service: ServiceObject,
    ) -> Result<Self, RegistryError> {
        let reference = registry.register(classes, properties, service)?;
        Ok(Self {
            registry,
            reference,
        })
    }

    /// Reference of this registration.
    #[inline]
    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    /// Withdraws the registration.
    pub fn unregister(self) -> Result<(), RegistryError> {
        self.registry.unregister(&self.reference)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("reference", &self.reference)
            .finish()
    }
}
