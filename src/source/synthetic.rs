//! Generated video source for tests and demos
//!
//! Produces a moving gradient (or a solid colour) at a resolution that can be
//! changed while the source is bound to a compositor, which makes it possible
//! to exercise resizes, blank cameras and lost feeds without hardware.

use std::io;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use super::VideoSource;

/// Pixel content generated by a [`SyntheticSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// RGB gradient that shifts every frame
    Gradient,
    /// Uniform colour
    Solid([u8; 4]),
}

#[derive(Debug)]
struct State {
    width: u32,
    height: u32,
    pattern: Pattern,
    live: bool,
    blank: bool,
    open_error: Option<String>,
    opened: bool,
    released: bool,
    frame_number: u64,
    cached: Option<Arc<RgbaImage>>,
}

impl State {
    fn frame(&mut self) -> Option<Arc<RgbaImage>> {
        if !self.opened || self.blank || self.width == 0 || self.height == 0 {
            return None;
        }

        let stale = match &self.cached {
            Some(frame) => frame.width() != self.width || frame.height() != self.height,
            None => true,
        };
        if stale || self.pattern == Pattern::Gradient {
            let image = render_pattern(self.pattern, self.frame_number, self.width, self.height);
            self.frame_number = self.frame_number.wrapping_add(1);
            self.cached = Some(Arc::new(image));
        }
        self.cached.clone()
    }
}

/// A [`VideoSource`] that synthesizes its frames
pub struct SyntheticSource {
    label: String,
    state: Arc<Mutex<State>>,
}

/// Runtime handle to a [`SyntheticSource`] that has been moved into a compositor
#[derive(Debug, Clone)]
pub struct SourceControl {
    state: Arc<Mutex<State>>,
}

impl SyntheticSource {
    /// Gradient source at the given resolution
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(Mutex::new(State {
                width,
                height,
                pattern: Pattern::Gradient,
                live: true,
                blank: false,
                open_error: None,
                opened: false,
                released: false,
                frame_number: 0,
                cached: None,
            })),
        }
    }

    /// Solid colour source at the given resolution
    pub fn solid(label: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(label, width, height).with_pattern(Pattern::Solid(rgba))
    }

    /// Gradient source plus its control handle
    pub fn with_control(label: impl Into<String>, width: u32, height: u32) -> (Self, SourceControl) {
        let source = Self::new(label, width, height);
        let control = source.control();
        (source, control)
    }

    pub fn with_pattern(self, pattern: Pattern) -> Self {
        self.state.lock().pattern = pattern;
        self
    }

    pub fn control(&self) -> SourceControl {
        SourceControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl VideoSource for SyntheticSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.open_error.clone() {
            return Err(io::Error::new(io::ErrorKind::NotFound, reason));
        }
        state.opened = true;
        state.released = false;
        Ok(())
    }

    fn width(&self) -> u32 {
        let state = self.state.lock();
        if state.blank {
            0
        } else {
            state.width
        }
    }

    fn height(&self) -> u32 {
        let state = self.state.lock();
        if state.blank {
            0
        } else {
            state.height
        }
    }

    fn is_live(&self) -> bool {
        let state = self.state.lock();
        state.live && !state.released
    }

    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.state.lock().frame()
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.opened = false;
        state.released = true;
        state.cached = None;
    }
}

impl SourceControl {
    /// Change the native resolution, as a resized window would
    pub fn resize(&self, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.width = width;
        state.height = height;
    }

    pub fn set_pattern(&self, pattern: Pattern) {
        let mut state = self.state.lock();
        state.pattern = pattern;
        state.cached = None;
    }

    /// Report zero dimensions and no frames until unset
    pub fn set_blank(&self, blank: bool) {
        self.state.lock().blank = blank;
    }

    /// End the feed for good
    pub fn kill(&self) {
        self.state.lock().live = false;
    }

    /// Make the next `open` fail with `reason`
    pub fn fail_open(&self, reason: impl Into<String>) {
        self.state.lock().open_error = Some(reason.into());
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().opened
    }

    pub fn was_released(&self) -> bool {
        self.state.lock().released
    }
}

fn render_pattern(pattern: Pattern, frame_number: u64, width: u32, height: u32) -> RgbaImage {
    match pattern {
        Pattern::Solid(rgba) => RgbaImage::from_pixel(width, height, Rgba(rgba)),
        Pattern::Gradient => {
            let base = (frame_number % 256) as u8;
            RgbaImage::from_fn(width, height, |x, y| {
                Rgba([
                    base.wrapping_add((x % 256) as u8),
                    base.wrapping_add((y % 256) as u8),
                    base.wrapping_add(((x + y) % 256) as u8),
                    255,
                ])
            })
        }
    }
}
