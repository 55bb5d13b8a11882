//! # engine_app demo
//!
//! Runs a headless scene for a fixed number of frames: a spinning "render"
//! system that submits draw calls through the main thread, and a health
//! system that decays entities until they drop out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::Parser;
use engine_app::{FrameConfig, HeadlessDisplay, RunOptions, logging};
use engine_component::{Component, Entity};
use engine_dispatch::MainThread;
use engine_system::{BaseSystem, ComponentFilter, System, TickContext};
use tracing::info;

#[derive(Parser)]
#[command(name = "engine_app", about = "Headless ECS engine demo")]
struct Args {
    /// Frames to run before the display closes
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Target frame rate (0 = unpaced)
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Number of entities to spawn
    #[arg(short, long, default_value_t = 8)]
    entities: usize,

    /// Window title
    #[arg(short, long, default_value = "engine demo")]
    title: String,
}

#[derive(Debug)]
struct Transform {
    angle: f64,
    speed: f64,
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

#[derive(Debug)]
struct Health {
    points: f64,
}

impl Component for Health {
    fn type_name() -> &'static str {
        "Health"
    }
}

/// Rotates transforms and submits one draw call per entity on the main
/// thread.
struct Spin {
    base: BaseSystem,
    main_thread: MainThread,
    draw_calls: Arc<AtomicU64>,
}

impl System for Spin {
    fn name(&self) -> &str {
        "spin"
    }

    fn base(&self) -> &BaseSystem {
        &self.base
    }

    fn update(&self, ctx: &TickContext) -> Result<()> {
        let mut batch = 0;
        for entity in self.entities() {
            if let Some(transform) = entity.component::<Transform>() {
                let mut t = transform.write();
                t.angle = (t.angle + t.speed * ctx.dt) % std::f64::consts::TAU;
                batch += 1;
            }
        }
        let draw_calls = Arc::clone(&self.draw_calls);
        self.main_thread.call(move || {
            draw_calls.fetch_add(batch, Ordering::Relaxed);
        })?;
        Ok(())
    }
}

/// Drains health per second and drops entities that reach zero.
struct Decay {
    base: BaseSystem,
    per_second: f64,
}

impl System for Decay {
    fn name(&self) -> &str {
        "decay"
    }

    fn base(&self) -> &BaseSystem {
        &self.base
    }

    fn update(&self, ctx: &TickContext) -> Result<()> {
        for entity in self.entities() {
            let Some(health) = entity.component::<Health>() else {
                continue;
            };
            let remaining = {
                let mut h = health.write();
                h.points = (h.points - self.per_second * ctx.dt).max(0.0);
                h.points
            };
            if remaining <= 0.0 && self.remove_entity(&entity) {
                info!(entity = %entity.id(), tick_id = ctx.tick_id, "entity expired");
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    logging::init("engine_app=info")?;

    let args = Args::parse();
    let frame = FrameConfig::default()
        .with_target_fps(args.fps)
        .with_env_overrides();
    let options = RunOptions::new(args.title).with_frame(frame);
    let display = HeadlessDisplay::new().close_after(args.frames);
    let entity_count = args.entities;

    info!(frames = args.frames, entities = entity_count, "engine demo starting");

    engine_app::run(options, display, move |app| {
        let entities: Vec<_> = (0..entity_count)
            .map(|i| {
                Entity::with_components((
                    Transform {
                        angle: 0.0,
                        speed: 1.0 + i as f64,
                    },
                    Health {
                        points: 10.0 * (i + 1) as f64,
                    },
                ))
            })
            .collect();

        let draw_calls = Arc::new(AtomicU64::new(0));
        let spin = app.add_system(Arc::new(Spin {
            base: BaseSystem::with_filter(ComponentFilter::new().with::<Transform>()),
            main_thread: app.main_thread().clone(),
            draw_calls: Arc::clone(&draw_calls),
        }));
        let decay = app.add_system(Arc::new(Decay {
            base: BaseSystem::with_filter(ComponentFilter::new().with::<Health>()),
            per_second: 20.0,
        }));
        spin.add_entities(&entities);
        decay.add_entities(&entities);

        app.on_shutdown_named("renderer", move || {
            info!(
                draw_calls = draw_calls.load(Ordering::Relaxed),
                survivors = decay.entities().len(),
                "releasing renderer resources"
            );
            Ok(())
        });
        Ok(())
    })?;

    info!("engine demo shut down");
    Ok(())
}
