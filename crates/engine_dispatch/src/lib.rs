//! # engine_dispatch
//!
//! Confines work to a single owning OS thread ("the main thread"), the only
//! thread allowed to touch the graphics context.
//!
//! This crate provides:
//!
//! - [`MainThread`]: a cloneable handle any thread or task can use to run a
//!   closure on the main thread and get its result back synchronously.
//! - [`MainThreadLoop`]: the owner side; [`MainThreadLoop::run`] drains the
//!   call queue on the thread that calls it until cancelled.
//! - [`cancel_pair`]: the process-wide stop signal for the loop.
//! - [`DispatchError`]: why a call could not be delivered.
//!
//! ## Usage
//!
//! ```rust
//! use engine_dispatch::{MainThread, cancel_pair};
//!
//! let (main_thread, main_loop) = MainThread::new();
//! let (cancel, token) = cancel_pair();
//!
//! let worker = std::thread::spawn(move || {
//!     let answer = main_thread.call_val(|| 6 * 7);
//!     cancel.cancel();
//!     answer
//! });
//!
//! main_loop.run(&token);
//! assert_eq!(worker.join().unwrap(), Ok(42));
//! ```

pub mod cancel;
pub mod dispatcher;
pub mod error;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use dispatcher::{MainThread, MainThreadLoop, panic_message};
pub use error::DispatchError;
