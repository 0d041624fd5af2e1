//! # Single-consumer dispatch executor.
//!
//! [`Executor`] is a FIFO queue of synchronous jobs drained by exactly one
//! tokio task. Everything a session owns is mutated from inside those jobs.
//!
//! ## Architecture
//! ```text
//! any thread ── submit(job) ──► [unbounded FIFO] ──► consumer task
//!                                                       │
//!                                           CURRENT = id (task-local)
//!                                                       │
//!                                          catch_unwind(job(&Scope))
//!                                                       └─► panic → error! (loop continues)
//! ```
//!
//! ## Rules
//! - **Non-blocking submit**: `submit()` never waits; it fails only after shutdown.
//! - **FIFO**: two submissions from the same thread run in submission order.
//! - **One job at a time**: jobs never overlap, so confined state needs no ordering locks.
//! - **Panic isolation**: a panicking job is logged and the next job runs.
//! - **Shutdown**: `shutdown()` stops the loop; queued jobs are dropped.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::config::ExecutorConfig;
use super::scope::{ExecutorId, Scope};
use crate::error::ExecutorError;

/// Global sequence for executor ids.
static EXECUTOR_SEQ: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    /// Executor whose job is currently running on this task.
    static CURRENT: ExecutorId;
}

/// A unit of work run on the executor.
pub type Job = Box<dyn FnOnce(&Scope) + Send + 'static>;

struct Inner {
    id: ExecutorId,
    name: String,
    tx: mpsc::UnboundedSender<Job>,
    token: CancellationToken,
}

/// Cloneable handle to a single-consumer executor.
///
/// ### Properties
/// - **Cheap to clone**: all clones feed the same queue.
/// - **Self-terminating**: the consumer exits once every handle is dropped or
///   [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

impl Executor {
    /// Starts a new executor and its consumer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cfg: ExecutorConfig) -> Self {
        let id = ExecutorId(EXECUTOR_SEQ.fetch_add(1, AtomicOrdering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let token = CancellationToken::new();
        let name = cfg.name.to_string();

        tokio::spawn(consume(id, cfg, rx, token.clone()));
        debug!(executor = %name, %id, "executor started");

        Self {
            inner: Arc::new(Inner {
                id,
                name,
                tx,
                token,
            }),
        }
    }

    /// Executor identity.
    #[inline]
    pub fn id(&self) -> ExecutorId {
        self.inner.id
    }

    /// Executor name from its config.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Enqueues `job` and returns immediately.
    pub fn submit<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&Scope) + Send + 'static,
    {
        if self.inner.token.is_cancelled() {
            return Err(ExecutorError::Closed);
        }
        self.inner
            .tx
            .send(Box::new(job))
            .map_err(|_| ExecutorError::Closed)
    }

    /// Returns `true` when called from inside one of this executor's jobs.
    pub fn is_in_executor_thread(&self) -> bool {
        CURRENT
            .try_with(|current| *current == self.inner.id)
            .unwrap_or(false)
    }

    /// Runs `f` right now if the caller is already on this executor.
    ///
    /// Returns `None` (without running `f`) otherwise.
    pub fn enter<R>(&self, f: impl FnOnce(&Scope) -> R) -> Option<R> {
        if self.is_in_executor_thread() {
            Some(f(&Scope::new(self.inner.id)))
        } else {
            None
        }
    }

    /// Submits `f` and awaits its result.
    ///
    /// Must not be awaited from a job of this same executor (jobs are
    /// synchronous, so that cannot happen by construction).
    pub async fn call<R, F>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&Scope) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |scope| {
            match panic::catch_unwind(AssertUnwindSafe(|| f(scope))) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let _ = tx.send(Err(ExecutorError::Panicked {
                        message: panic_message(payload.as_ref()),
                    }));
                    panic::resume_unwind(payload);
                }
            }
        })?;
        rx.await.unwrap_or(Err(ExecutorError::Closed))
    }

    /// Waits until every job submitted before this call has run.
    pub async fn barrier(&self) -> Result<(), ExecutorError> {
        self.call(|_| ()).await
    }

    /// Stops the consumer loop. Queued jobs are dropped.
    pub fn shutdown(&self) {
        self.inner.token.cancel();
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.token.is_cancelled()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl PartialEq for Executor {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Executor {}

/// Consumer loop: drains the queue until shutdown or until all senders are gone.
async fn consume(
    id: ExecutorId,
    cfg: ExecutorConfig,
    mut rx: mpsc::UnboundedReceiver<Job>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => run_job(id, &cfg, job),
                None => break,
            }
        }
    }
    rx.close();
    debug!(executor = %cfg.name, %id, "executor stopped");
}

/// Runs one job with the task-local marker set and panics contained.
fn run_job(id: ExecutorId, cfg: &ExecutorConfig, job: Job) {
    let started = cfg.slow_job_threshold().map(|limit| (limit, Instant::now()));

    let outcome = CURRENT.sync_scope(id, || {
        let scope = Scope::new(id);
        panic::catch_unwind(AssertUnwindSafe(|| job(&scope)))
    });

    if let Err(payload) = outcome {
        error!(
            executor = %cfg.name,
            %id,
            panic = %panic_message(payload.as_ref()),
            "executor job panicked"
        );
    }

    if let Some((limit, at)) = started {
        let took = at.elapsed();
        if took > limit {
            warn!(executor = %cfg.name, %id, ?took, ?limit, "slow executor job");
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
