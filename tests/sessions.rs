use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use servisor::{Executor, ExecutorConfig, Session};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrently_started_sessions_get_distinct_ids() {
    let executor = Executor::spawn(ExecutorConfig::default());

    let starters: Vec<_> = (0..8)
        .map(|_| {
            let executor = executor.clone();
            std::thread::spawn(move || {
                (0..16)
                    .map(|_| Session::start(executor.clone(), "concurrent"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for starter in starters {
        for session in starter.join().unwrap() {
            assert!(ids.insert(session.id().to_string()));
            assert!(session.id().parse::<u64>().is_ok());
            Session::end(&session);
        }
    }
    assert_eq!(ids.len(), 8 * 16);
}

#[tokio::test]
async fn active_flag_follows_the_session_lifecycle() {
    let session = Session::start(Executor::spawn(ExecutorConfig::named("lifecycle")), "owner-7");
    assert_eq!(session.owner_id(), "owner-7");
    assert!(session.is_active());
    assert!(Session::is_session_active(session.id()));
    assert!(
        Session::active_sessions()
            .iter()
            .any(|s| Arc::ptr_eq(s, &session))
    );

    let same = Session::get_session(session.id()).unwrap();
    assert!(Arc::ptr_eq(&same, &session));

    Session::end(&session);
    assert!(!session.is_active());
    assert!(!Session::is_session_active(session.id()));
    assert!(Session::get_session(session.id()).is_none());
}

#[tokio::test]
#[should_panic(expected = "is not active")]
async fn ending_an_inactive_session_panics() {
    let session = Session::start(Executor::spawn(ExecutorConfig::default()), "owner");
    Session::end(&session);
    Session::end(&session);
}

#[tokio::test]
async fn ended_listener_runs_after_events_already_queued() {
    let session = Session::start(Executor::spawn(ExecutorConfig::default()), "owner");
    let order = Arc::new(Mutex::new(Vec::new()));

    let id = session.id().to_string();
    let listener = {
        let order = Arc::clone(&order);
        Session::add_session_ended_listener(move |ended| {
            if ended.id() == id {
                order.lock().push("ended");
            }
        })
    };

    {
        let order = Arc::clone(&order);
        session.executor().submit(move |_| order.lock().push("job")).unwrap();
    }
    Session::end(&session);
    session.executor().barrier().await.unwrap();
    Session::remove_session_ended_listener(listener);

    assert_eq!(*order.lock(), ["job", "ended"]);
}

#[tokio::test]
async fn model_adapters_are_last_write_wins() {
    trait Registers: Send + Sync {
        fn count(&self) -> usize;
    }
    struct Fixed(usize);
    impl Registers for Fixed {
        fn count(&self) -> usize {
            self.0
        }
    }

    let session = Session::start(Executor::spawn(ExecutorConfig::default()), "owner");
    session.register_model_adapter::<dyn Registers>(Arc::new(Fixed(16)));
    session.register_model_adapter::<dyn Registers>(Arc::new(Fixed(32)));

    let adapter = session.get_model_adapter::<dyn Registers>().unwrap();
    assert_eq!(adapter.count(), 32);

    assert!(session.unregister_model_adapter::<dyn Registers>());
    assert!(session.get_model_adapter::<dyn Registers>().is_none());
    Session::end(&session);
}
