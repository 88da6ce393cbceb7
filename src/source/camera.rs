//! Webcam source backed by nokhwa

use std::io;
use std::sync::Arc;

use image::RgbaImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

use super::feed::{to_rgba, FeedState, PixelLayout, MAX_CONSECUTIVE_FAILURES};
use super::VideoSource;

/// Camera feed by device index.
///
/// nokhwa drives its own capture thread; every decoded frame replaces the
/// latest frame slot read by the compositor. Corrupt frames are skipped.
pub struct CameraSource {
    label: String,
    index: u32,
    camera: Option<CallbackCamera>,
    feed: Arc<FeedState>,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            label: format!("camera {}", index),
            index,
            camera: None,
            feed: Arc::default(),
        }
    }
}

impl VideoSource for CameraSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&mut self) -> io::Result<()> {
        self.feed.reset();
        let feed = Arc::clone(&self.feed);
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);

        let mut camera = CallbackCamera::new(
            CameraIndex::Index(self.index),
            requested_format,
            move |buffer| match buffer.decode_image::<RgbFormat>() {
                Ok(rgb) => {
                    let (width, height) = (rgb.width(), rgb.height());
                    match to_rgba(PixelLayout::Rgb, width, height, rgb.as_raw()) {
                        Some(frame) => feed.store(frame),
                        None => {
                            feed.record_failure();
                        }
                    }
                }
                Err(e) => {
                    let run = feed.record_failure();
                    if run == 1 {
                        log::warn!("Camera frame decode failed, skipping: {}", e);
                    } else if run == MAX_CONSECUTIVE_FAILURES {
                        log::error!("Camera produced {} undecodable frames in a row", run);
                    }
                }
            },
        )
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;

        camera
            .open_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        self.camera = Some(camera);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.feed.dimensions().0
    }

    fn height(&self) -> u32 {
        self.feed.dimensions().1
    }

    fn is_live(&self) -> bool {
        self.camera.is_some() && self.feed.is_live()
    }

    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.feed.current()
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop {}: {}", self.label, e);
            }
        }
        self.feed.reset();
    }
}

// The nokhwa handle is only touched through `&mut self`
unsafe impl Send for CameraSource {}
