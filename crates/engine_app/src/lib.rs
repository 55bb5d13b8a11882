//! # engine_app
//!
//! The application driver. [`run`] wires a [`Display`], the
//! [`SystemManager`] and the main-thread dispatcher together:
//!
//! 1. The calling thread becomes the main thread and serves dispatched calls.
//! 2. A driver thread initialises the display (through the dispatcher), runs
//!    the user's setup, then drives the frame loop until the display asks to
//!    close.
//! 3. Shutdown hooks run on the main thread, the display is closed, and the
//!    driver's result is returned.
//!
//! The dispatcher stops as soon as the driver thread ends, whether it
//! returned or panicked.
//!
//! ## Usage
//!
//! ```rust
//! use engine_app::{FrameConfig, HeadlessDisplay, RunOptions};
//!
//! let options = RunOptions::new("demo")
//!     .with_frame(FrameConfig::default().with_target_fps(0.0));
//!
//! engine_app::run(options, HeadlessDisplay::new().close_after(3), |app| {
//!     let main_thread = app.main_thread().clone();
//!     app.on_shutdown(move || {
//!         assert!(main_thread.is_owner_thread());
//!         Ok(())
//!     });
//!     Ok(())
//! })
//! .unwrap();
//! ```

pub mod config;
pub mod display;
pub mod frame;
pub mod logging;

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use engine_dispatch::{MainThread, cancel_pair, panic_message};
use engine_system::{System, SystemManager};
use tracing::{info, warn};

pub use config::{FrameConfig, MAX_FRAMES_ENV, RunOptions};
pub use display::{Display, DisplayError, HeadlessDisplay, Size};
pub use frame::FrameLoop;

use display::MainThreadDisplay;

type ShutdownHook = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// What the setup callback of [`run`] gets to work with.
pub struct AppContext {
    manager: Arc<SystemManager>,
    main_thread: MainThread,
    shutdown_hooks: Vec<(String, ShutdownHook)>,
}

impl AppContext {
    /// The manager the frame loop updates.
    #[must_use]
    pub fn manager(&self) -> &Arc<SystemManager> {
        &self.manager
    }

    /// Handle for running code on the main thread.
    #[must_use]
    pub fn main_thread(&self) -> &MainThread {
        &self.main_thread
    }

    /// Register a system with the manager.
    pub fn add_system<S: System>(&self, system: Arc<S>) -> Arc<S> {
        self.manager.add_system(system)
    }

    /// Run `hook` on the main thread after the frame loop ends and before
    /// the display is closed. Hooks run in registration order; a failing hook
    /// is logged and does not stop the others.
    pub fn on_shutdown<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.on_shutdown_named(format!("hook-{}", self.shutdown_hooks.len()), hook);
    }

    /// Same as [`AppContext::on_shutdown`], with a name used in logs.
    pub fn on_shutdown_named<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.shutdown_hooks.push((name.into(), Box::new(hook)));
    }

    fn run_shutdown_hooks(&mut self) {
        for (name, hook) in self.shutdown_hooks.drain(..) {
            match self.main_thread.call_val(hook) {
                Ok(Ok(())) => info!(hook = %name, "shutdown hook complete"),
                Ok(Err(err)) => warn!(hook = %name, error = %format_args!("{err:#}"), "shutdown hook failed"),
                Err(err) => warn!(hook = %name, error = %err, "shutdown hook not run"),
            }
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("manager", &self.manager)
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .finish_non_exhaustive()
    }
}

/// Run an application until its display asks to close.
///
/// Blocks the calling thread, which serves as the main thread for the whole
/// run: every [`Display`] call and every [`MainThread`] call executes on it.
///
/// # Errors
///
/// Returns the first of: a display init failure, a setup failure, a frame
/// loop failure (display or dispatcher), a display close failure, or a
/// panic on the driver thread.
pub fn run<D, S>(options: RunOptions, display: D, setup: S) -> Result<()>
where
    D: Display,
    S: FnOnce(&mut AppContext) -> Result<()> + Send + 'static,
{
    let (main_thread, main_loop) = MainThread::new();
    let (cancel, token) = cancel_pair();

    let driver = thread::Builder::new()
        .name("engine-driver".to_string())
        .spawn(move || {
            // Dropped on return and on unwind; either way the main loop stops.
            let _cancel = cancel;
            drive(options, display, setup, main_thread)
        })
        .context("failed to spawn driver thread")?;

    let executed = main_loop.run(&token);
    info!(executed, "main thread released");

    match driver.join() {
        Ok(result) => result,
        Err(payload) => Err(anyhow!(
            "driver thread panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn drive<D, S>(options: RunOptions, display: D, setup: S, main_thread: MainThread) -> Result<()>
where
    D: Display,
    S: FnOnce(&mut AppContext) -> Result<()>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("engine-worker")
        .build()
        .context("failed to build system runtime")?;

    let display = MainThreadDisplay::new(display, main_thread.clone());
    display
        .init(options.clone())
        .context("display initialisation failed")?;
    let size = display.size()?;
    info!(title = %options.title, width = size.width, height = size.height, "display ready");

    let manager = Arc::new(SystemManager::new());
    let mut app = AppContext {
        manager: Arc::clone(&manager),
        main_thread,
        shutdown_hooks: Vec::new(),
    };

    let outcome = setup(&mut app)
        .context("application setup failed")
        .and_then(|()| {
            info!(systems = manager.len(), "setup complete");
            FrameLoop::new(options.frame.clone()).run(&runtime, &manager, &display)
        });

    app.run_shutdown_hooks();
    let closed = display.close();

    let frames = outcome?;
    closed.context("display close failed")?;
    info!(frames, ticks = manager.tick_id(), "application finished");
    Ok(())
}
