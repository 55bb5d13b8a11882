//! System manager: the ordered system registry and the per-tick scheduler.
//!
//! The registry order is the update priority order; [`SystemManager::swap`]
//! is the only way to reorder it. A tick launches every registered system's
//! update as its own blocking task and waits for all of them before
//! returning:
//!
//! - systems of the same tick run in parallel, in no defined order;
//! - tick N has fully finished before tick N+1 starts, even if several
//!   callers drive the same manager.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::context::TickContext;
use crate::error::{ManagerError, SystemFailure, UpdateError};
use crate::system::System;

/// Owns the ordered list of systems and drives their per-tick updates.
///
/// Constructed explicitly and shared by `Arc`; there is no global instance.
#[derive(Default)]
pub struct SystemManager {
    systems: RwLock<Vec<Arc<dyn System>>>,
    tick_id: AtomicU64,
    /// Held for the duration of a tick so ticks never overlap.
    tick_gate: tokio::sync::Mutex<()>,
}

impl SystemManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append systems to the end of the registry, in order.
    ///
    /// No de-duplication: a system registered twice is updated twice per
    /// tick.
    pub fn add_systems<I>(&self, systems: I)
    where
        I: IntoIterator<Item = Arc<dyn System>>,
    {
        let mut registry = self.systems.write();
        for system in systems {
            info!(system = system.name(), priority = registry.len(), "system registered");
            registry.push(system);
        }
    }

    /// Append one system and return it unchanged.
    pub fn add_system<S: System>(&self, system: Arc<S>) -> Arc<S> {
        self.add_systems([Arc::clone(&system) as Arc<dyn System>]);
        system
    }

    /// Snapshot of the registry in priority order.
    #[must_use]
    pub fn systems(&self) -> Vec<Arc<dyn System>> {
        self.systems.read().clone()
    }

    /// Names of the registered systems in priority order.
    #[must_use]
    pub fn system_names(&self) -> Vec<String> {
        self.systems
            .read()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Exchange the positions of two systems.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::IndexOutOfRange`] if either index does not
    /// exist; the registry is left untouched.
    pub fn swap(&self, i: usize, j: usize) -> Result<(), ManagerError> {
        let mut registry = self.systems.write();
        let len = registry.len();
        for index in [i, j] {
            if index >= len {
                return Err(ManagerError::IndexOutOfRange { index, len });
            }
        }
        registry.swap(i, j);
        debug!(i, j, "swapped system priorities");
        Ok(())
    }

    /// Remove every system named `name`. Returns how many were removed.
    pub fn remove_system(&self, name: &str) -> usize {
        let mut registry = self.systems.write();
        let before = registry.len();
        registry.retain(|s| s.name() != name);
        let removed = before - registry.len();
        if removed > 0 {
            info!(system = name, removed, "system removed");
        }
        removed
    }

    /// Number of registered systems (counting duplicates).
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.read().len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.read().is_empty()
    }

    /// Id of the last tick started, 0 before the first one.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id.load(Ordering::Acquire)
    }

    /// Run one tick: update every registered system with `dt` (seconds) and
    /// wait until all of them are done.
    ///
    /// Must be awaited inside a tokio runtime; updates run on its blocking
    /// pool. The registry is snapshotted when the tick starts, so systems
    /// added during a tick first run on the next one.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] listing every system that returned an error or
    /// panicked. The remaining systems still completed.
    pub async fn update(&self, dt: f64) -> Result<(), UpdateError> {
        let _gate = self.tick_gate.lock().await;
        let tick_id = self.tick_id.fetch_add(1, Ordering::AcqRel) + 1;
        let ctx = TickContext::new(tick_id, dt);
        let systems = self.systems();
        let started = Instant::now();

        trace!(tick_id, dt, systems = systems.len(), "tick start");

        let mut join_set = JoinSet::new();
        for (priority, system) in systems.into_iter().enumerate() {
            join_set.spawn_blocking(move || run_system(priority, system.as_ref(), &ctx));
        }

        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => {
                    warn!(
                        tick_id,
                        system = %failure.system,
                        priority = failure.priority,
                        panicked = failure.panicked,
                        error = %format_args!("{:#}", failure.error),
                        "system update failed"
                    );
                    failures.push(failure);
                }
                Err(err) => {
                    // Only reachable if the runtime cancels the task.
                    warn!(tick_id, error = %err, "system update task did not complete");
                    failures.push(SystemFailure {
                        system: "<unknown>".to_string(),
                        priority: usize::MAX,
                        panicked: err.is_panic(),
                        error: anyhow::Error::new(err),
                    });
                }
            }
        }

        trace!(
            tick_id,
            elapsed_us = started.elapsed().as_micros() as u64,
            "tick complete"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(UpdateError { tick_id, failures })
        }
    }
}

fn run_system(priority: usize, system: &dyn System, ctx: &TickContext) -> Result<(), SystemFailure> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| system.update(ctx)));
    let (panicked, error) = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(error)) => (false, error),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            (true, anyhow::anyhow!(message))
        }
    };
    Err(SystemFailure {
        system: system.name().to_string(),
        priority,
        panicked,
        error,
    })
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.system_names())
            .field("tick_id", &self.tick_id())
            .finish()
    }
}
