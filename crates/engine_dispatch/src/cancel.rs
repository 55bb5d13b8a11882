//! Process-wide cancellation signal for the main-thread loop.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Create a linked cancellation handle and token.
///
/// The token fires when [`CancelHandle::cancel`] is called or when the handle
/// is dropped, so a driver that returns early, fails or panics still stops
/// the main-thread loop.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (CancelHandle { _tx: tx }, CancelToken { rx })
}

/// The owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    // Never sent on. Dropping it disconnects the channel, which is the signal.
    _tx: Sender<()>,
}

impl CancelHandle {
    /// Fire the signal.
    pub fn cancel(self) {}
}

/// The observing side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_fires_on_cancel() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_fires_on_drop() {
        let (handle, token) = cancel_pair();
        let observer = token.clone();
        drop(handle);
        assert!(observer.is_cancelled());
    }
}
