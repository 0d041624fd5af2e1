//! # Model adapter table.
//!
//! Lets context objects resolve auxiliary views of a session by type without
//! a static dependency on whoever provides them. Last write wins; the table
//! is lock-protected and may be used from any thread.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Type-keyed map of shared adapter instances.
#[derive(Default)]
pub(crate) struct AdapterTable {
    adapters: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl AdapterTable {
    /// Stores `adapter` under `T`, replacing any previous one.
    pub(crate) fn register<T>(&self, adapter: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.adapters
            .write()
            .insert(TypeId::of::<T>(), Box::new(adapter));
    }

    /// Removes the adapter stored under `T`. Returns `true` if one was present.
    pub(crate) fn unregister<T: ?Sized + 'static>(&self) -> bool {
        self.adapters.write().remove(&TypeId::of::<T>()).is_some()
    }

    /// Adapter stored under `T`.
    pub(crate) fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.adapters
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Expressions: Send + Sync {
        fn evaluate(&self) -> i32;
    }

    struct Fixed(i32);

    impl Expressions for Fixed {
        fn evaluate(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn trait_object_adapters_round_trip_and_last_write_wins() {
        let table = AdapterTable::default();
        assert!(table.get::<dyn Expressions>().is_none());

        table.register::<dyn Expressions>(Arc::new(Fixed(1)));
        table.register::<dyn Expressions>(Arc::new(Fixed(2)));
        assert_eq!(table.get::<dyn Expressions>().map(|a| a.evaluate()), Some(2));

        assert!(table.unregister::<dyn Expressions>());
        assert!(!table.unregister::<dyn Expressions>());
        assert!(table.get::<dyn Expressions>().is_none());
    }

    #[test]
    fn adapters_are_keyed_by_exact_type() {
        let table = AdapterTable::default();
        table.register(Arc::new(5u32));
        assert_eq!(table.get::<u32>().as_deref(), Some(&5));
        assert!(table.get::<u64>().is_none());
    }
}
