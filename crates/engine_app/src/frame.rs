//! The driver's frame loop.
//!
//! One frame:
//!
//! 1. Ask the display whether it wants to close.
//! 2. Measure the time since the previous frame started.
//! 3. Update every system through the [`SystemManager`] and wait for all of
//!    them.
//! 4. Let the display poll input and present.
//! 5. Sleep off the rest of the frame budget, if any.

use std::time::{Duration, Instant};

use anyhow::Result;
use engine_system::SystemManager;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::FrameConfig;
use crate::display::{Display, MainThreadDisplay};

/// Frame loop state.
#[derive(Debug)]
pub struct FrameLoop {
    config: FrameConfig,
    frame: u64,
}

impl FrameLoop {
    #[must_use]
    pub fn new(config: FrameConfig) -> Self {
        Self { config, frame: 0 }
    }

    /// Frames completed so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run frames until the display asks to close or the frame cap is hit.
    ///
    /// Failing systems are logged and do not stop the loop. A display or
    /// dispatcher failure does.
    pub(crate) fn run<D: Display>(
        &mut self,
        runtime: &Runtime,
        manager: &SystemManager,
        display: &MainThreadDisplay<D>,
    ) -> Result<u64> {
        let budget = self.config.frame_budget();
        info!(
            target_fps = self.config.target_fps,
            max_frames = self.config.max_frames,
            "starting frame loop"
        );

        let mut last = Instant::now();
        while !display.should_close()? {
            let start = Instant::now();
            let dt = start.duration_since(last).as_secs_f64();
            last = start;

            if let Err(err) = runtime.block_on(manager.update(dt)) {
                for failure in &err.failures {
                    warn!(tick_id = err.tick_id, "{failure}");
                }
            }
            display.update()?;

            self.frame += 1;
            debug!(frame = self.frame, dt, "frame complete");
            if self.config.max_frames > 0 && self.frame >= self.config.max_frames {
                info!(frames = self.frame, "frame cap reached");
                break;
            }

            if let Some(budget) = budget {
                pace(self.frame, start.elapsed(), budget);
            }
        }

        info!(frames = self.frame, "frame loop complete");
        Ok(self.frame)
    }
}

fn pace(frame: u64, elapsed: Duration, budget: Duration) {
    if elapsed < budget {
        std::thread::sleep(budget - elapsed);
    } else {
        warn!(
            frame,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "frame exceeded time budget"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread::{self, JoinHandle};

    use engine_dispatch::{CancelHandle, MainThread, cancel_pair};
    use engine_system::{BaseSystem, System, TickContext};

    use super::*;
    use crate::config::RunOptions;
    use crate::display::HeadlessDisplay;

    struct Ticks {
        base: BaseSystem,
        seen: AtomicU64,
    }

    impl System for Ticks {
        fn name(&self) -> &str {
            "ticks"
        }
        fn base(&self) -> &BaseSystem {
            &self.base
        }
        fn update(&self, ctx: &TickContext) -> anyhow::Result<()> {
            assert!(ctx.dt >= 0.0);
            self.seen.store(ctx.tick_id, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing {
        base: BaseSystem,
    }

    impl System for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn base(&self) -> &BaseSystem {
            &self.base
        }
        fn update(&self, _ctx: &TickContext) -> anyhow::Result<()> {
            anyhow::bail!("always fails")
        }
    }

    fn spawn_owner() -> (MainThread, CancelHandle, JoinHandle<u64>) {
        let (main_thread, main_loop) = MainThread::new();
        let (cancel, token) = cancel_pair();
        let owner = thread::spawn(move || main_loop.run(&token));
        (main_thread, cancel, owner)
    }

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_runs_until_display_closes() {
        let (main_thread, cancel, owner) = spawn_owner();
        let display = MainThreadDisplay::new(HeadlessDisplay::new().close_after(4), main_thread);
        display.init(RunOptions::default()).unwrap();

        let manager = SystemManager::new();
        let ticks = manager.add_system(Arc::new(Ticks {
            base: BaseSystem::new(),
            seen: AtomicU64::new(0),
        }));

        let mut frames = FrameLoop::new(FrameConfig::default().with_target_fps(0.0));
        let ran = frames.run(&runtime(), &manager, &display).unwrap();

        assert_eq!(ran, 4);
        assert_eq!(frames.frame(), 4);
        assert_eq!(ticks.seen.load(Ordering::SeqCst), 4);

        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_frame_cap() {
        let (main_thread, cancel, owner) = spawn_owner();
        let display = MainThreadDisplay::new(HeadlessDisplay::new(), main_thread);
        display.init(RunOptions::default()).unwrap();

        let manager = SystemManager::new();
        let mut frames = FrameLoop::new(
            FrameConfig::default()
                .with_target_fps(1000.0)
                .with_max_frames(3),
        );
        assert_eq!(frames.run(&runtime(), &manager, &display).unwrap(), 3);

        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_failing_system_does_not_stop_loop() {
        let (main_thread, cancel, owner) = spawn_owner();
        let display = MainThreadDisplay::new(HeadlessDisplay::new().close_after(2), main_thread);
        display.init(RunOptions::default()).unwrap();

        let manager = SystemManager::new();
        manager.add_system(Arc::new(Failing {
            base: BaseSystem::new(),
        }));

        let mut frames = FrameLoop::new(FrameConfig::default().with_target_fps(0.0));
        assert_eq!(frames.run(&runtime(), &manager, &display).unwrap(), 2);
        assert_eq!(manager.tick_id(), 2);

        cancel.cancel();
        owner.join().unwrap();
    }

    #[test]
    fn test_display_error_stops_loop() {
        let (main_thread, cancel, owner) = spawn_owner();
        // Never initialised, so the first present fails.
        let display = MainThreadDisplay::new(HeadlessDisplay::new(), main_thread);

        let manager = SystemManager::new();
        let mut frames = FrameLoop::new(FrameConfig::default().with_target_fps(0.0));
        let err = frames.run(&runtime(), &manager, &display).unwrap_err();
        assert!(err.to_string().contains("before init"));
        assert_eq!(frames.frame(), 0);

        cancel.cancel();
        owner.join().unwrap();
    }
}
