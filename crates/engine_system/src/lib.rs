//! # engine_system
//!
//! Systems and the scheduler that drives them.
//!
//! A [`System`] is a behaviour unit updated once per tick. Systems are
//! registered with a [`SystemManager`] in priority order; every tick the
//! manager runs all of them in parallel and waits for the whole batch before
//! returning.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use engine_system::{BaseSystem, System, SystemManager, TickContext};
//!
//! struct Log {
//!     base: BaseSystem,
//! }
//!
//! impl System for Log {
//!     fn name(&self) -> &str { "log" }
//!     fn base(&self) -> &BaseSystem { &self.base }
//!     fn update(&self, ctx: &TickContext) -> anyhow::Result<()> {
//!         assert!(ctx.dt > 0.0);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SystemManager::new();
//!     manager.add_system(Arc::new(Log { base: BaseSystem::new() }));
//!     manager.update(1.0 / 60.0).await.unwrap();
//!     assert_eq!(manager.tick_id(), 1);
//! }
//! ```

pub mod context;
pub mod error;
pub mod filter;
pub mod manager;
pub mod system;

pub use context::TickContext;
pub use error::{ManagerError, SystemFailure, UpdateError};
pub use filter::{AcceptAll, ComponentCondition, ComponentFilter, EntityFilter};
pub use manager::SystemManager;
pub use system::{BaseSystem, System};
