//! Per-tick drawing of the source pair onto the raster surface

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::layout::PipLayout;
use super::output::CompositedFrame;
use crate::source::{SourceRole, VideoSource};
use crate::timing::FrameClock;

/// The two sources bound to a compositor
pub struct SourcePair {
    pub primary: Box<dyn VideoSource>,
    pub secondary: Box<dyn VideoSource>,
}

impl SourcePair {
    pub fn new(primary: Box<dyn VideoSource>, secondary: Box<dyn VideoSource>) -> Self {
        Self { primary, secondary }
    }

    /// First source, primary before secondary, that is no longer live
    pub fn lost_source(&self) -> Option<SourceRole> {
        if !self.primary.is_live() {
            Some(SourceRole::Primary)
        } else if !self.secondary.is_live() {
            Some(SourceRole::Secondary)
        } else {
            None
        }
    }

    pub fn release(&mut self) {
        self.primary.release();
        self.secondary.release();
        log::info!(
            "Released sources '{}' and '{}'",
            self.primary.label(),
            self.secondary.label()
        );
    }
}

/// Result of one render tick
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A new frame was drawn
    Rendered(Arc<CompositedFrame>),
    /// The primary had nothing to draw; nothing is published for this tick
    NoFrame,
    /// A source stopped being live
    Lost(SourceRole),
}

/// Owns the off-screen surface and draws one composite per tick
pub struct Renderer {
    layout: PipLayout,
    surface: RgbaImage,
    sequence: u64,
    clock: FrameClock,
}

impl Renderer {
    pub fn new(layout: PipLayout, width: u32, height: u32) -> Self {
        Self {
            layout,
            surface: blank_surface(width, height),
            sequence: 0,
            clock: FrameClock::new(),
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Number of frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.sequence
    }

    pub fn tick(&mut self, sources: &SourcePair) -> TickOutcome {
        if let Some(role) = sources.lost_source() {
            return TickOutcome::Lost(role);
        }

        let (width, height) = (sources.primary.width(), sources.primary.height());
        if width == 0 || height == 0 {
            return TickOutcome::NoFrame;
        }
        if self.surface.dimensions() != (width, height) {
            log::debug!(
                "Primary resized {}x{} -> {}x{}",
                self.surface.width(),
                self.surface.height(),
                width,
                height
            );
            self.surface = blank_surface(width, height);
        }

        let Some(background) = sources.primary.current_frame() else {
            return TickOutcome::NoFrame;
        };
        imageops::replace(&mut self.surface, &*background, 0, 0);

        if let Some(camera) = sources.secondary.current_frame() {
            self.draw_overlay(&camera);
        }

        self.sequence += 1;
        TickOutcome::Rendered(Arc::new(CompositedFrame {
            sequence: self.sequence,
            timestamp_us: self.clock.now_us(),
            image: self.surface.clone(),
        }))
    }

    fn draw_overlay(&mut self, camera: &RgbaImage) {
        let Some(rect) = self.layout.overlay_rect(
            self.surface.width(),
            self.surface.height(),
            camera.width(),
            camera.height(),
        ) else {
            return;
        };

        let scaled = imageops::resize(camera, rect.width, rect.height, FilterType::Triangle);
        imageops::replace(&mut self.surface, &scaled, rect.x, rect.y);
    }
}

fn blank_surface(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}
