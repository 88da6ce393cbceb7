//! Frame hand-off between a device capture thread and its source

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

/// Bad frames in a row after which a device feed counts as lost
pub(crate) const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Latest frame written by a capture thread, plus the feed's liveness.
///
/// A single undecodable frame is skipped; only a run of
/// [`MAX_CONSECUTIVE_FAILURES`] or an explicit [`end`](Self::end) makes the
/// feed lost.
#[derive(Debug, Default)]
pub(crate) struct FeedState {
    latest: Mutex<Option<Arc<RgbaImage>>>,
    failures: AtomicU32,
    ended: AtomicBool,
}

impl FeedState {
    pub fn store(&self, frame: RgbaImage) {
        *self.latest.lock() = Some(Arc::new(frame));
        self.failures.store(0, Ordering::Relaxed);
    }

    /// Returns the length of the current failure run
    pub fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The device stopped delivering for good
    pub fn end(&self) {
        self.ended.store(true, Ordering::Relaxed);
    }

    pub fn is_live(&self) -> bool {
        !self.ended.load(Ordering::Relaxed)
            && self.failures.load(Ordering::Relaxed) < MAX_CONSECUTIVE_FAILURES
    }

    pub fn current(&self) -> Option<Arc<RgbaImage>> {
        self.latest.lock().clone()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.latest
            .lock()
            .as_ref()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }

    /// Forget the last frame and any failure state, ready to open again
    pub fn reset(&self) {
        *self.latest.lock() = None;
        self.failures.store(0, Ordering::Relaxed);
        self.ended.store(false, Ordering::Relaxed);
    }
}

/// Byte order of packed device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PixelLayout {
    Rgb,
    Rgbx,
    Bgrx,
    Xbgr,
}

impl PixelLayout {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            _ => 4,
        }
    }
}

/// Repack device pixels as opaque RGBA. `None` if `data` is too short for
/// `width` x `height`; trailing row padding is ignored.
pub(crate) fn to_rgba(layout: PixelLayout, width: u32, height: u32, data: &[u8]) -> Option<RgbaImage> {
    let bpp = layout.bytes_per_pixel();
    let pixels = width as usize * height as usize;
    if pixels == 0 || data.len() < pixels * bpp {
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data[..pixels * bpp].chunks_exact(bpp) {
        let [r, g, b] = match layout {
            PixelLayout::Rgb | PixelLayout::Rgbx => [px[0], px[1], px[2]],
            PixelLayout::Bgrx => [px[2], px[1], px[0]],
            PixelLayout::Xbgr => [px[3], px[2], px[1]],
        };
        rgba.extend_from_slice(&[r, g, b, 255]);
    }
    RgbaImage::from_raw(width, height, rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_failure_keeps_feed_live() {
        let feed = FeedState::default();
        feed.store(RgbaImage::new(4, 2));
        assert_eq!(feed.record_failure(), 1);
        assert!(feed.is_live());
        assert_eq!(feed.dimensions(), (4, 2));
    }

    #[test]
    fn test_failure_run_loses_feed_until_good_frame() {
        let feed = FeedState::default();
        for _ in 0..MAX_CONSECUTIVE_FAILURES - 1 {
            feed.record_failure();
        }
        assert!(feed.is_live());

        // A good frame restarts the count
        feed.store(RgbaImage::new(2, 2));
        for _ in 0..MAX_CONSECUTIVE_FAILURES - 1 {
            feed.record_failure();
        }
        assert!(feed.is_live());

        feed.record_failure();
        assert!(!feed.is_live());
    }

    #[test]
    fn test_end_and_reset() {
        let feed = FeedState::default();
        feed.store(RgbaImage::new(2, 2));
        feed.end();
        assert!(!feed.is_live());

        feed.reset();
        assert!(feed.is_live());
        assert!(feed.current().is_none());
        assert_eq!(feed.dimensions(), (0, 0));
    }

    #[test]
    fn test_to_rgba_layouts() {
        let rgb = to_rgba(PixelLayout::Rgb, 1, 1, &[10, 20, 30]).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30, 255]);

        let bgrx = to_rgba(PixelLayout::Bgrx, 1, 1, &[30, 20, 10, 0]).unwrap();
        assert_eq!(bgrx.get_pixel(0, 0).0, [10, 20, 30, 255]);

        let xbgr = to_rgba(PixelLayout::Xbgr, 1, 1, &[0, 30, 20, 10]).unwrap();
        assert_eq!(xbgr.get_pixel(0, 0).0, [10, 20, 30, 255]);

        let rgbx = to_rgba(PixelLayout::Rgbx, 2, 1, &[1, 2, 3, 9, 4, 5, 6, 9]).unwrap();
        assert_eq!(rgbx.get_pixel(1, 0).0, [4, 5, 6, 255]);
    }

    #[test]
    fn test_to_rgba_rejects_short_buffers() {
        assert!(to_rgba(PixelLayout::Bgrx, 2, 2, &[0; 15]).is_none());
        assert!(to_rgba(PixelLayout::Rgb, 0, 4, &[]).is_none());
    }
}
