//! # Example: tracker_invalidation
//!
//! Demonstrates cached registry lookups through a [`ServicesTracker`].
//!
//! Shows how to:
//! - Register a service with classes and properties from inside `initialize`.
//! - Look it up through the tracker of another service, by type and by filter.
//! - Watch the cache drop the service when it is withdrawn from another thread.
//!
//! ## Flow
//! ```text
//! memory.initialize ──► register([Memory], {space: "data"})
//! client.tracker.get_service::<Memory>()   ──► registry lookup, cached
//! client.tracker.get_service::<Memory>()   ──► cache hit (use count stays 1)
//! other thread: registry.unregister(ref)
//!     └─► Unregistering ──► invalidation marshalled to the executor
//! client.tracker.get_service::<Memory>()   ──► None
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example tracker_invalidation
//! ```

use std::sync::Arc;

use servisor::{
    Completion, Executor, ExecutorConfig, Filter, InMemoryRegistry, PropertyValue, Scope, Service,
    ServiceBase, ServiceRegistry, Session, TypeTag, initialize_service, properties,
};

struct Memory {
    base: ServiceBase,
}

impl Service for Memory {
    fn base(&self) -> &ServiceBase {
        &self.base
    }

    fn initialize(self: Arc<Self>, scope: &Scope, done: Completion) {
        if let Err(err) = self.base.initialize(scope) {
            return done(Err(err));
        }
        self.base.register(
            scope,
            &self,
            [TypeTag::named("memory")],
            properties([("space", PropertyValue::from("data"))]),
        );
        done(Ok(()))
    }
}

struct Client {
    base: ServiceBase,
}

impl Service for Client {
    fn base(&self) -> &ServiceBase {
        &self.base
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Session, registry and two services.
    let registry = Arc::new(InMemoryRegistry::new());
    let session = Session::start(Executor::spawn(ExecutorConfig::default()), "demo");
    let memory = Arc::new(Memory {
        base: ServiceBase::new(&session, registry.clone()),
    });
    let client = Arc::new(Client {
        base: ServiceBase::new(&session, registry.clone()),
    });
    initialize_service(&memory).await?;
    initialize_service(&client).await?;

    let reference = memory.base().reference().ok_or("memory service is not registered")?;
    let tracker = client.base().tracker().ok_or("client has no tracker")?;

    // 2. Two lookups; the second one is served from the cache.
    let t = tracker.clone();
    let (by_type, by_filter) = session
        .executor()
        .call(move |scope| {
            let by_type = t.get_service::<Memory>(scope).is_some();
            let by_filter = t
                .get_service_with::<Memory>(scope, &Filter::equals("space", "data"))
                .is_some();
            let _ = t.get_service::<Memory>(scope);
            (by_type, by_filter)
        })
        .await?;
    println!("found by type: {by_type}, by filter: {by_filter}");
    println!("use count: {:?}", registry.use_count(&reference));
    if let Some(filter) = memory.base().filter() {
        println!("memory filter: {filter}");
    }

    // 3. Withdraw from another thread.
    let withdraw = {
        let registry = registry.clone();
        let reference = reference.clone();
        std::thread::spawn(move || registry.unregister(&reference))
    };
    withdraw.join().map_err(|_| "unregister thread panicked")??;
    session.executor().barrier().await?;

    // 4. The tracker no longer hands it out.
    let t = tracker.clone();
    let after = session
        .executor()
        .call(move |scope| t.get_service::<Memory>(scope).is_some())
        .await?;
    println!("found after unregister: {after}");

    Session::end(&session);
    Ok(())
}
