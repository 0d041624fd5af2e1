//! Dispatch executors and the confinement token.
//!
//! ## Contents
//! - [`Executor`] single-consumer FIFO job queue driven by one tokio task
//! - [`Scope`] `!Send` proof that code runs on a given executor
//! - [`ExecutorConfig`] per-executor settings
//!
//! Every [`Session`](crate::Session) is bound to one executor for its whole
//! life; all of its listener bookkeeping happens inside executor jobs.

mod config;
#[allow(clippy::module_inception)]
mod executor;
mod scope;

pub use config::ExecutorConfig;
pub use executor::{Executor, Job};
pub use scope::{ExecutorId, Scope};

pub(crate) use executor::panic_message;
