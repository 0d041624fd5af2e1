//! # Example: session_dispatch
//!
//! Demonstrates a session with two services and a plain listener.
//!
//! Shows how to:
//! - Start a [`Session`] on its own [`Executor`].
//! - Initialize services and attach them with [`Session::add_service_listener`].
//! - Declare handlers with [`HandlerTable`], including a parent event type.
//! - Publish events from other threads with [`Session::dispatch_event`].
//!
//! ## Flow
//! ```text
//! Session::start(executor)
//!     ├─► initialize_service(run_control)   startup #0
//!     ├─► initialize_service(breakpoints)   startup #1
//!     ├─► add_service_event_listener(console)
//!     └─► dispatch_event(BreakpointHit)
//!           ├─► run_control  (Suspended handler, parent of BreakpointHit)
//!           ├─► breakpoints  (BreakpointHit handler)
//!           └─► console      (any event)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example session_dispatch
//! ```

use std::sync::Arc;

use servisor::{
    Event, EventListener, Executor, ExecutorConfig, HandlerTable, InMemoryRegistry, Properties,
    PropertyValue, Service, ServiceBase, Session, initialize_service, properties,
    shutdown_service,
};

#[derive(Debug)]
struct Suspended {
    thread: u32,
}
impl Event for Suspended {}

#[derive(Debug)]
struct BreakpointHit {
    suspended: Suspended,
    line: u32,
}
impl Event for BreakpointHit {
    fn parent(&self) -> Option<&dyn Event> {
        Some(&self.suspended)
    }
}

struct RunControl {
    base: ServiceBase,
}

impl Service for RunControl {
    fn base(&self) -> &ServiceBase {
        &self.base
    }
}

impl EventListener for RunControl {
    fn handlers(table: &mut HandlerTable<Self>) {
        table.on(|me: &RunControl, ev: &Suspended| {
            println!(
                "[run-control #{:?}] thread {} suspended",
                me.base.startup_number(),
                ev.thread
            );
        });
    }
}

struct Breakpoints {
    base: ServiceBase,
}

impl Service for Breakpoints {
    fn base(&self) -> &ServiceBase {
        &self.base
    }
}

impl EventListener for Breakpoints {
    fn handlers(table: &mut HandlerTable<Self>) {
        table.on(|me: &Breakpoints, ev: &BreakpointHit| {
            println!(
                "[breakpoints #{:?}] hit at line {}",
                me.base.startup_number(),
                ev.line
            );
        });
    }
}

/// Plain listener: sees every event after the services.
struct Console;

impl EventListener for Console {
    fn handlers(table: &mut HandlerTable<Self>) {
        table.on_any(|_: &Console, ev: &dyn Event| println!("[console] {ev:?}"));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Session and registry.
    let registry = Arc::new(InMemoryRegistry::new());
    let session = Session::start(Executor::spawn(ExecutorConfig::default()), "demo");
    println!("session {} started", session.id());

    // 2. Services, initialized in startup order.
    let run_control = Arc::new(RunControl {
        base: ServiceBase::new(&session, registry.clone()),
    });
    let breakpoints = Arc::new(Breakpoints {
        base: ServiceBase::new(&session, registry.clone()),
    });
    initialize_service(&run_control).await?;
    initialize_service(&breakpoints).await?;

    // 3. Listeners: the plain one first, services rank ahead of it anyway.
    let (s, rc, bp) = (session.clone(), run_control.clone(), breakpoints.clone());
    session
        .executor()
        .call(move |scope| {
            s.add_service_event_listener(scope, Arc::new(Console), None);
            s.add_service_listener(scope, bp, None);
            s.add_service_listener(scope, rc, None);
        })
        .await?;

    // 4. Events from another thread, delivered on the executor.
    let publisher = {
        let session = session.clone();
        std::thread::spawn(move || {
            let origin = properties([("backend", PropertyValue::from("gdb"))]);
            session.dispatch_event(
                BreakpointHit {
                    suspended: Suspended { thread: 1 },
                    line: 42,
                },
                origin,
            );
            session.dispatch_event(Suspended { thread: 2 }, Properties::new());
        })
    };
    publisher.join().map_err(|_| "publisher thread panicked")?;
    session.executor().barrier().await?;

    // 5. Shutdown.
    shutdown_service(&breakpoints).await?;
    shutdown_service(&run_control).await?;
    Session::end(&session);
    println!("session {} ended", session.id());
    Ok(())
}
