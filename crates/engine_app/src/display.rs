//! The windowing boundary.
//!
//! Every [`Display`] method is invoked on the main thread through the
//! dispatcher, never from the frame loop's own thread.

use std::sync::Arc;

use engine_dispatch::{DispatchError, MainThread};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::RunOptions;

/// Width and height of a display surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Errors raised by a display.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("invalid window size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("display used before init")]
    NotInitialized,

    #[error("display backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A window (or window stand-in) driven by the frame loop.
pub trait Display: Send + 'static {
    /// Create the window and its graphics context.
    ///
    /// # Errors
    ///
    /// Any failure here aborts [`run`](crate::run) before setup.
    fn init(&mut self, options: &RunOptions) -> Result<(), DisplayError>;

    /// Returns `true` once the window wants to close.
    fn should_close(&self) -> bool;

    /// Poll input and present the frame.
    ///
    /// # Errors
    ///
    /// A failure stops the frame loop.
    fn update(&mut self) -> Result<(), DisplayError>;

    /// Tear down the window. Called once, after shutdown hooks.
    fn close(&mut self);

    /// Current surface size.
    fn size(&self) -> Size;
}

/// A display without a window. Presents nothing and asks to close after a
/// fixed number of frames.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    size: Size,
    close_after: Option<u64>,
    frames: u64,
    initialized: bool,
    closed: bool,
}

impl HeadlessDisplay {
    /// A headless display that never asks to close on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to close once `frames` frames have been presented.
    #[must_use]
    pub fn close_after(mut self, frames: u64) -> Self {
        self.close_after = Some(frames);
        self
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns `true` after [`Display::close`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Display for HeadlessDisplay {
    fn init(&mut self, options: &RunOptions) -> Result<(), DisplayError> {
        if options.width == 0 || options.height == 0 {
            return Err(DisplayError::InvalidSize {
                width: options.width,
                height: options.height,
            });
        }
        self.size = Size {
            width: options.width,
            height: options.height,
        };
        self.initialized = true;
        info!(
            title = %options.title,
            width = options.width,
            height = options.height,
            "headless display initialised"
        );
        Ok(())
    }

    fn should_close(&self) -> bool {
        self.closed || self.close_after.is_some_and(|limit| self.frames >= limit)
    }

    fn update(&mut self) -> Result<(), DisplayError> {
        if !self.initialized {
            return Err(DisplayError::NotInitialized);
        }
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        debug!(frames = self.frames, "headless display closed");
    }

    fn size(&self) -> Size {
        self.size
    }
}

/// Routes every call on a shared display through the main thread.
pub(crate) struct MainThreadDisplay<D> {
    display: Arc<Mutex<D>>,
    main_thread: MainThread,
}

impl<D: Display> MainThreadDisplay<D> {
    pub(crate) fn new(display: D, main_thread: MainThread) -> Self {
        Self {
            display: Arc::new(Mutex::new(display)),
            main_thread,
        }
    }

    pub(crate) fn init(&self, options: RunOptions) -> Result<(), DisplayError> {
        let display = Arc::clone(&self.display);
        self.main_thread
            .call_err(move || display.lock().init(&options))
    }

    pub(crate) fn should_close(&self) -> Result<bool, DispatchError> {
        let display = Arc::clone(&self.display);
        self.main_thread.call_val(move || display.lock().should_close())
    }

    pub(crate) fn update(&self) -> Result<(), DisplayError> {
        let display = Arc::clone(&self.display);
        self.main_thread.call_err(move || display.lock().update())
    }

    pub(crate) fn close(&self) -> Result<(), DispatchError> {
        let display = Arc::clone(&self.display);
        self.main_thread.call(move || display.lock().close())
    }

    pub(crate) fn size(&self) -> Result<Size, DispatchError> {
        let display = Arc::clone(&self.display);
        self.main_thread.call_val(move || display.lock().size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_lifecycle() {
        let mut display = HeadlessDisplay::new().close_after(2);
        display.init(&RunOptions::new("t").with_size(320, 200)).unwrap();
        assert_eq!(display.size(), Size { width: 320, height: 200 });

        assert!(!display.should_close());
        display.update().unwrap();
        display.update().unwrap();
        assert!(display.should_close());
        assert_eq!(display.frames(), 2);

        display.close();
        assert!(display.is_closed());
    }

    #[test]
    fn test_headless_rejects_empty_size() {
        let mut display = HeadlessDisplay::new();
        let err = display.init(&RunOptions::new("t").with_size(0, 10)).unwrap_err();
        assert!(matches!(err, DisplayError::InvalidSize { width: 0, height: 10 }));
    }

    #[test]
    fn test_update_before_init() {
        let mut display = HeadlessDisplay::new();
        assert!(matches!(display.update(), Err(DisplayError::NotInitialized)));
    }

    #[test]
    fn test_close_without_limit() {
        let mut display = HeadlessDisplay::new();
        assert!(!display.should_close());
        display.close();
        assert!(display.should_close());
    }
}
