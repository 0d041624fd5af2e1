//! # Executor configuration.
//!
//! Provides [`ExecutorConfig`], the settings of one dispatch executor.
//!
//! ## Sentinel values
//! - `slow_job_warn = 0s` → slow-job warnings disabled

use std::borrow::Cow;
use std::time::Duration;

/// Configuration for a single dispatch executor.
///
/// ## Field semantics
/// - `name`: label attached to every log record emitted by the executor loop
/// - `slow_job_warn`: jobs running longer than this are reported with `warn!` (`0s` = off)
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Human-readable executor name (appears in logs).
    pub name: Cow<'static, str>,

    /// Threshold above which a single job is logged as slow.
    ///
    /// Jobs run to completion on the executor and block every other job queued
    /// behind them, so long jobs show up here first.
    pub slow_job_warn: Duration,
}

impl ExecutorConfig {
    /// Creates a config with the given name and defaults for everything else.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the slow-job threshold as an `Option`.
    ///
    /// - `None` → no slow-job reporting
    /// - `Some(d)` → jobs taking longer than `d` are logged
    #[inline]
    pub fn slow_job_threshold(&self) -> Option<Duration> {
        if self.slow_job_warn == Duration::ZERO {
            None
        } else {
            Some(self.slow_job_warn)
        }
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `name = "dispatch"`
    /// - `slow_job_warn = 0s` (disabled)
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("dispatch"),
            slow_job_warn: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_disables_slow_job_reporting() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.slow_job_threshold(), None);
        assert_eq!(cfg.name, "dispatch");
    }

    #[test]
    fn named_keeps_other_defaults() {
        let cfg = ExecutorConfig {
            slow_job_warn: Duration::from_millis(50),
            ..ExecutorConfig::named("gdb")
        };
        assert_eq!(cfg.name, "gdb");
        assert_eq!(cfg.slow_job_threshold(), Some(Duration::from_millis(50)));
    }
}
