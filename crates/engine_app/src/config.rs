//! Application and frame loop configuration.

use std::time::Duration;

use tracing::warn;

/// Environment variable that caps the number of frames, overriding
/// [`FrameConfig::max_frames`].
pub const MAX_FRAMES_ENV: &str = "ENGINE_MAX_FRAMES";

/// Initial window settings plus the frame loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Frame pacing and limits.
    pub frame: FrameConfig,
}

impl RunOptions {
    /// Default options with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Override the window size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Override the frame loop configuration.
    #[must_use]
    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "engine".to_string(),
            frame: FrameConfig::default(),
        }
    }
}

/// Configuration for the driver's frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Target frames per second. Zero or less runs frames back to back.
    pub target_fps: f64,
    /// Maximum number of frames to run (0 = until the display closes).
    pub max_frames: u64,
}

impl FrameConfig {
    /// Override the target frame rate.
    #[must_use]
    pub fn with_target_fps(mut self, target_fps: f64) -> Self {
        self.target_fps = target_fps;
        self
    }

    /// Override the frame cap.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Apply the [`MAX_FRAMES_ENV`] override, if set. An unparsable value is
    /// logged and ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(MAX_FRAMES_ENV) {
            Ok(raw) => self.with_max_frames_override(&raw),
            Err(_) => self,
        }
    }

    fn with_max_frames_override(self, raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(max_frames) => self.with_max_frames(max_frames),
            Err(err) => {
                warn!(var = MAX_FRAMES_ENV, value = raw, error = %err, "ignoring invalid override");
                self
            }
        }
    }

    /// Time budget of one frame, or `None` when frames are not paced.
    #[must_use]
    pub fn frame_budget(&self) -> Option<Duration> {
        if self.target_fps > 0.0 && self.target_fps.is_finite() {
            Some(Duration::from_secs_f64(1.0 / self.target_fps))
        } else {
            None
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_frames: 0,
        }
    }
}
