//! The main-thread call queue and its run loop.
//!
//! Calls are boxed closures pushed onto one unbounded FIFO queue. The loop
//! pops and executes them in arrival order on the thread that called
//! [`MainThreadLoop::run`]. A caller blocks until its closure has run and the
//! result has been handed back, so calls made one after another by the same
//! caller execute in that order.
//!
//! Per call: submitted → dequeued by the owner → executing → result
//! delivered. There is no per-call cancellation or timeout. Stopping the loop
//! only prevents queued calls from starting; their callers get
//! [`DispatchError::Closed`] instead of blocking forever.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, select};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::DispatchError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Caller-side handle to the main thread.
///
/// Clone it into every system or task that needs to touch the graphics
/// context.
#[derive(Debug, Clone)]
pub struct MainThread {
    queue: Sender<Job>,
    owner: Arc<OnceLock<ThreadId>>,
}

/// Owner-side loop. Consumed by [`MainThreadLoop::run`].
#[derive(Debug)]
pub struct MainThreadLoop {
    queue: Receiver<Job>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl MainThread {
    /// Create a dispatcher: the caller handle and the loop that serves it.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MainThread, MainThreadLoop) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let owner = Arc::new(OnceLock::new());
        (
            MainThread {
                queue: tx,
                owner: Arc::clone(&owner),
            },
            MainThreadLoop { queue: rx, owner },
        )
    }

    /// Returns `true` when called from the thread running the loop.
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }

    /// Number of calls queued and not yet picked up by the owner.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run `f` on the main thread and wait for it to finish.
    ///
    /// # Errors
    ///
    /// See [`MainThread::call_val`].
    pub fn call<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.call_val(f)
    }

    /// Run `f` on the main thread and return the value it produces.
    ///
    /// Does not return before `f` has executed. Called from the main thread
    /// itself, `f` runs inline instead of being queued behind the caller.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] if the loop is not running and
    /// [`DispatchError::Panicked`] if `f` panicked.
    pub fn call_val<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return run_guarded(f);
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        self.submit(Box::new(move || {
            // The caller may have gone away; nothing to report to.
            let _ = tx.send(run_guarded(f));
        }))?;
        rx.recv().map_err(|_| DispatchError::Closed)?
    }

    /// Run a fallible `f` on the main thread and propagate its outcome.
    ///
    /// Delivery failures are converted into the caller's error type, so
    /// `f`'s own error and a dead dispatcher surface through the same
    /// `Result`.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error, or the converted [`DispatchError`].
    pub fn call_err<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DispatchError> + Send + 'static,
    {
        self.call_val(f)?
    }

    /// Async form of [`MainThread::call_val`] for tokio tasks: awaits the
    /// result instead of blocking the worker thread.
    ///
    /// # Errors
    ///
    /// Same as [`MainThread::call_val`].
    pub async fn call_async<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return run_guarded(f);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.submit(Box::new(move || {
            let _ = tx.send(run_guarded(f));
        }))?;
        rx.await.map_err(|_| DispatchError::Closed)?
    }

    fn submit(&self, job: Job) -> Result<(), DispatchError> {
        self.queue.send(job).map_err(|_| DispatchError::Closed)
    }
}

impl MainThreadLoop {
    /// Execute queued calls on the current thread until `cancel` fires.
    ///
    /// The current thread becomes the owner for the rest of the process.
    /// A call that is already executing when `cancel` fires finishes first.
    /// Calls still queued afterwards are dropped and their callers receive
    /// [`DispatchError::Closed`]. The loop also ends once every
    /// [`MainThread`] handle is gone.
    ///
    /// Returns the number of calls executed.
    pub fn run(self, cancel: &CancelToken) -> u64 {
        let current = thread::current().id();
        if *self.owner.get_or_init(|| current) != current {
            warn!("main-thread loop started on a different thread than before");
        }

        info!(thread = ?current, "main-thread dispatcher running");
        let mut executed = 0u64;
        loop {
            select! {
                recv(self.queue) -> job => match job {
                    Ok(job) => {
                        job();
                        executed += 1;
                    }
                    Err(_) => {
                        debug!("all main-thread handles dropped");
                        break;
                    }
                },
                recv(cancel.receiver()) -> _ => break,
            }
        }

        let dropped = self.queue.len();
        if dropped > 0 {
            warn!(dropped, "main-thread dispatcher stopped with calls still queued");
        }
        info!(executed, "main-thread dispatcher stopped");
        executed
    }
}

fn run_guarded<F, R>(f: F) -> Result<R, DispatchError>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(panic = %message, "dispatched call panicked");
        DispatchError::Panicked(message)
    })
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::cancel::{CancelHandle, cancel_pair};

    fn spawn_owner() -> (MainThread, CancelHandle, JoinHandle<u64>) {
        let (main_thread, main_loop) = MainThread::new();
        let (cancel, token) = cancel_pair();
        let owner = thread::spawn(move || main_loop.run(&token));
        (main_thread, cancel, owner)
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum GlError {
        #[error("context lost")]
        ContextLost,
        #[error(transparent)]
        Dispatch(#[from] DispatchError),
    }

    #[test]
    fn test_call_val_returns_value_after_execution() {
        let (mt, cancel, owner) = spawn_owner();
        let counter = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&counter);
        let value = mt
            .call_val(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                42
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        cancel.cancel();
        assert_eq!(owner.join().unwrap(), 1);
    }

    #[test]
    fn test_sequential_calls_execute_in_order() {
        let (mt, cancel, owner) = spawn_owner();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 1..=3 {
            let log = Arc::clone(&log);
            mt.call(move || log.lock().push(i)).unwrap();
        }

        assert_eq!(*log.lock(), vec![1, 2, 3]);
        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_calls_run_on_owner_thread() {
        let (mt, cancel, owner) = spawn_owner();
        let ran_on = mt.call_val(|| thread::current().id()).unwrap();

        assert_ne!(ran_on, thread::current().id());
        assert_eq!(ran_on, owner.thread().id());
        assert!(!mt.is_owner_thread());

        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_call_err_propagates_error() {
        let (mt, cancel, owner) = spawn_owner();

        let failed: Result<(), GlError> = mt.call_err(|| Err(GlError::ContextLost));
        assert_eq!(failed, Err(GlError::ContextLost));

        let ok: Result<u32, GlError> = mt.call_err(|| Ok(3));
        assert_eq!(ok, Ok(3));

        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_reentrant_call_runs_inline() {
        let (mt, cancel, owner) = spawn_owner();
        let inner = mt.clone();

        let nested = mt
            .call_val(move || {
                assert!(inner.is_owner_thread());
                inner.call_val(|| 7).unwrap()
            })
            .unwrap();

        assert_eq!(nested, 7);
        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_panicking_call_is_reported_and_owner_survives() {
        let (mt, cancel, owner) = spawn_owner();

        let err = mt.call(|| panic!("shader exploded")).unwrap_err();
        assert_eq!(err, DispatchError::Panicked("shader exploded".to_string()));

        assert_eq!(mt.call_val(|| 1 + 1), Ok(2));
        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_call_after_shutdown_is_closed() {
        let (mt, cancel, owner) = spawn_owner();
        cancel.cancel();
        owner.join().unwrap();

        assert_eq!(mt.call(|| ()), Err(DispatchError::Closed));
        let err: Result<(), GlError> = mt.call_err(|| Ok(()));
        assert_eq!(err, Err(GlError::Dispatch(DispatchError::Closed)));
    }

    #[test]
    fn test_queued_call_released_when_loop_dropped() {
        let (mt, main_loop) = MainThread::new();

        let caller = {
            let mt = mt.clone();
            thread::spawn(move || mt.call_val(|| 5))
        };
        while mt.pending() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        drop(main_loop);
        assert_eq!(caller.join().unwrap(), Err(DispatchError::Closed));
    }

    #[test]
    fn test_concurrent_callers_all_served() {
        let (mt, cancel, owner) = spawn_owner();
        let counter = Arc::new(AtomicUsize::new(0));

        thread::scope(|s| {
            for _ in 0..8 {
                let mt = mt.clone();
                let counter = Arc::clone(&counter);
                s.spawn(move || {
                    for _ in 0..50 {
                        let counter = Arc::clone(&counter);
                        mt.call(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    }
                });
            }
        });

        assert_eq!(counter.load(Ordering::SeqCst), 400);
        cancel.cancel();
        assert_eq!(owner.join().unwrap(), 400);
    }

    #[test]
    fn test_loop_ends_when_handles_dropped() {
        let (mt, main_loop) = MainThread::new();
        let (_cancel, token) = cancel_pair();
        let owner = thread::spawn(move || main_loop.run(&token));
        drop(mt);
        assert_eq!(owner.join().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_call_async_round_trip() {
        let (mt, cancel, owner) = spawn_owner();

        let ran_on = mt.call_async(|| thread::current().id()).await.unwrap();
        assert_eq!(ran_on, owner.thread().id());

        cancel.cancel();
        owner.join().unwrap();
    }
}
