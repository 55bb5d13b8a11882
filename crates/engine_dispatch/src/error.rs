//! Dispatcher error types.

/// Errors that can occur while forwarding a call to the main thread.
///
/// A dispatched closure's own failure is never reported here; it travels back
/// to the caller as the closure's return value (see
/// [`MainThread::call_err`](crate::MainThread::call_err)).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The main-thread loop has stopped (or was never run) and the call could
    /// not be executed.
    #[error("main-thread dispatcher is not running")]
    Closed,

    /// The dispatched closure panicked on the main thread. The main thread
    /// itself keeps running.
    #[error("dispatched call panicked: {0}")]
    Panicked(String),
}
