//! Per-tick context handed to every system update.

use std::time::Duration;

/// Tick metadata passed to [`System::update`](crate::System::update).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// The current tick id. Starts at 1 and increases by one per tick.
    pub tick_id: u64,
    /// Time elapsed since the previous tick, in seconds.
    pub dt: f64,
}

impl TickContext {
    /// Create a new context for a tick.
    #[must_use]
    pub fn new(tick_id: u64, dt: f64) -> Self {
        Self { tick_id, dt }
    }

    /// The elapsed time as a [`Duration`]. Negative or non-finite values
    /// clamp to zero.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.dt).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = TickContext::new(1, 0.016);
        assert_eq!(ctx.tick_id, 1);
        assert!((ctx.dt - 0.016).abs() < f64::EPSILON);
    }

    #[test]
    fn test_elapsed_clamps_bad_input() {
        assert_eq!(TickContext::new(1, -1.0).elapsed(), Duration::ZERO);
        assert_eq!(TickContext::new(1, f64::NAN).elapsed(), Duration::ZERO);
        assert_eq!(
            TickContext::new(1, 0.5).elapsed(),
            Duration::from_millis(500)
        );
    }
}
