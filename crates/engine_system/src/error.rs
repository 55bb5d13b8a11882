//! Scheduler error types.

use std::fmt;

/// Errors returned by registry operations on a
/// [`SystemManager`](crate::SystemManager).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    /// A position passed to [`SystemManager::swap`](crate::SystemManager::swap)
    /// does not exist.
    #[error("system index {index} out of range ({len} registered)")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of registered systems at the time of the call.
        len: usize,
    },
}

/// One system that did not complete its update cleanly.
#[derive(Debug)]
pub struct SystemFailure {
    /// The system's name.
    pub system: String,
    /// The system's position in the registry when the tick started.
    pub priority: usize,
    /// `true` if the update panicked rather than returning an error.
    pub panicked: bool,
    /// The returned error, or the panic message.
    pub error: anyhow::Error,
}

impl fmt::Display for SystemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.panicked { "panicked" } else { "failed" };
        write!(f, "system `{}` {how}: {:#}", self.system, self.error)
    }
}

/// Returned by [`SystemManager::update`](crate::SystemManager::update) when at
/// least one system failed. Every other system of the tick still ran to
/// completion.
#[derive(Debug, thiserror::Error)]
#[error("{} system(s) failed during tick {tick_id}", .failures.len())]
pub struct UpdateError {
    /// The tick in which the failures happened.
    pub tick_id: u64,
    /// Failures in completion order.
    pub failures: Vec<SystemFailure>,
}
