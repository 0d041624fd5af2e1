//! # Proof of executor confinement.
//!
//! A [`Scope`] is handed to every job by the executor loop. It cannot be sent
//! to another thread and only lives for the duration of the job, so holding a
//! `&Scope` proves the caller is running on the executor it names.
//!
//! Session-mutating APIs take `&Scope` instead of asserting a thread identity
//! at runtime; they still check that the scope belongs to *their* executor.

use std::fmt;
use std::marker::PhantomData;

/// Process-unique executor identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutorId(pub(crate) u64);

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "executor-{}", self.0)
    }
}

/// Token proving the current code runs on a specific executor.
///
/// `!Send` and `!Sync`: it never leaves the job it was created for.
pub struct Scope {
    executor: ExecutorId,
    _not_send: PhantomData<*const ()>,
}

impl Scope {
    /// Only the executor loop (and `Executor::enter`) mint scopes.
    pub(crate) fn new(executor: ExecutorId) -> Self {
        Self {
            executor,
            _not_send: PhantomData,
        }
    }

    /// Executor this scope belongs to.
    #[inline]
    pub fn executor_id(&self) -> ExecutorId {
        self.executor
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("executor", &self.executor)
            .finish()
    }
}
