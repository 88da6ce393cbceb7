//! Screen and window capture backed by scap

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use scap::{
    capturer::{Capturer, Options, Resolution},
    frame::{Frame, FrameType},
    Target,
};

use super::feed::{to_rgba, FeedState, PixelLayout};
use super::VideoSource;

/// How long `open` waits for the first captured frame
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(15);

/// What to capture. Ids are the platform ids scap reports for its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenTarget {
    Display(u32),
    Window(u32),
    /// The first display scap lists
    FirstDisplay,
}

impl ScreenTarget {
    fn matches(&self, target: &Target) -> bool {
        match (self, target) {
            (ScreenTarget::Display(id), Target::Display(display)) => display.id == *id,
            (ScreenTarget::Window(id), Target::Window(window)) => window.id == *id,
            (ScreenTarget::FirstDisplay, Target::Display(_)) => true,
            _ => false,
        }
    }
}

/// Display or window capture for the primary slot.
///
/// scap delivers frames on a capture thread owned by this source; `open`
/// returns once the first frame has arrived, so the dimensions are known
/// before the compositor sizes its surface.
pub struct ScreenSource {
    label: String,
    target: ScreenTarget,
    fps: u32,
    feed: Arc<FeedState>,
    stop: Option<Arc<AtomicBool>>,
}

impl ScreenSource {
    pub fn new(target: ScreenTarget) -> Self {
        let label = match target {
            ScreenTarget::Display(id) => format!("display {}", id),
            ScreenTarget::Window(id) => format!("window {}", id),
            ScreenTarget::FirstDisplay => "main display".to_string(),
        };
        Self {
            label,
            target,
            fps: 60,
            feed: Arc::default(),
            stop: None,
        }
    }

    /// Capture rate requested from the platform
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }
}

impl VideoSource for ScreenSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&mut self) -> io::Result<()> {
        if !scap::is_supported() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "screen capture is not supported on this platform",
            ));
        }
        if !scap::has_permission() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "screen recording permission not granted",
            ));
        }

        let target = scap::get_all_targets()
            .into_iter()
            .find(|t| self.target.matches(t))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{} not found", self.label))
            })?;

        // A fresh feed per run, so a capture thread still winding down from
        // an earlier run cannot write into it
        let feed = Arc::new(FeedState::default());
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let options = Options {
            fps: self.fps,
            target: Some(target),
            show_cursor: true,
            show_highlight: false,
            excluded_targets: None,
            output_type: FrameType::BGRAFrame,
            output_resolution: Resolution::Captured,
            ..Default::default()
        };
        let thread_feed = Arc::clone(&feed);
        let thread_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name(format!("pipcorder {}", self.label))
            .spawn(move || capture_loop(options, thread_feed, thread_stop, ready_tx))?;

        match ready_rx.recv_timeout(FIRST_FRAME_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return Err(io::Error::new(io::ErrorKind::Other, reason));
            }
            Err(RecvTimeoutError::Timeout) => {
                stop.store(true, Ordering::Relaxed);
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no frame captured; check screen recording permissions",
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "capture thread ended before the first frame",
                ));
            }
        }

        self.feed = feed;
        self.stop = Some(stop);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.feed.dimensions().0
    }

    fn height(&self) -> u32 {
        self.feed.dimensions().1
    }

    fn is_live(&self) -> bool {
        self.stop.is_some() && self.feed.is_live()
    }

    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.feed.current()
    }

    fn release(&mut self) {
        // The capture thread notices on its next frame and stops capturing
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        self.feed.reset();
    }
}

fn capture_loop(
    options: Options,
    feed: Arc<FeedState>,
    stop: Arc<AtomicBool>,
    ready: SyncSender<Result<(), String>>,
) {
    let mut capturer = match Capturer::build(options) {
        Ok(capturer) => capturer,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to create capturer: {:?}", e)));
            return;
        }
    };
    capturer.start_capture();

    let mut ready = Some(ready);
    while !stop.load(Ordering::Relaxed) && feed.is_live() {
        match capturer.get_next_frame() {
            Ok(frame) => {
                let Some((layout, width, height, data)) = unpack(frame) else {
                    continue;
                };
                // Empty frames repeat the previous one
                if data.is_empty() {
                    continue;
                }
                match to_rgba(layout, width, height, &data) {
                    Some(image) if !stop.load(Ordering::Relaxed) => {
                        feed.store(image);
                        if let Some(ready) = ready.take() {
                            log::info!("Screen capture running at {}x{}", width, height);
                            let _ = ready.send(Ok(()));
                        }
                    }
                    Some(_) => break,
                    None => {
                        log::debug!("Skipping screen frame of unexpected size");
                        feed.record_failure();
                    }
                }
            }
            Err(e) => {
                log::warn!("Screen capture error: {:?}", e);
                feed.record_failure();
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    if !feed.is_live() {
        log::error!("Screen capture stopped delivering frames");
        feed.end();
    }
    capturer.stop_capture();
}

fn unpack(frame: Frame) -> Option<(PixelLayout, u32, u32, Vec<u8>)> {
    let unpacked = match frame {
        Frame::BGRA(f) => (PixelLayout::Bgrx, f.width, f.height, f.data),
        Frame::BGR0(f) => (PixelLayout::Bgrx, f.width, f.height, f.data),
        Frame::BGRx(f) => (PixelLayout::Bgrx, f.width, f.height, f.data),
        Frame::RGBx(f) => (PixelLayout::Rgbx, f.width, f.height, f.data),
        Frame::XBGR(f) => (PixelLayout::Xbgr, f.width, f.height, f.data),
        Frame::RGB(f) => (PixelLayout::Rgb, f.width, f.height, f.data),
        _ => return None,
    };
    let (layout, width, height, data) = unpacked;
    Some((layout, width.max(0) as u32, height.max(0) as u32, data))
}
