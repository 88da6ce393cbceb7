//! Encoder seam between the recorder and the codec libraries

use bytes::{Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use super::config::{CodecProfile, Container, MimeConfiguration, MimeType};
use crate::compositor::CompositedFrame;
use crate::errors::CaptureError;

/// Turns composited frames into encoded container bytes.
///
/// Encoders buffer internally and release data in chunks whenever their
/// buffering allows, so `encode` may return zero, one or several chunks.
pub trait MediaEncoder: Send {
    fn encode(&mut self, frame: &CompositedFrame) -> Result<Vec<Bytes>, CaptureError>;

    /// Flush everything still buffered. Called once, after the last frame.
    fn finish(&mut self) -> Result<Vec<Bytes>, CaptureError>;
}

/// Registry of the encoders available on this host
pub trait EncoderBackend: Send + Sync {
    fn supports(&self, mime: &MimeType) -> bool;

    /// Create an encoder for frames of `width` x `height`
    fn create(
        &self,
        config: &MimeConfiguration,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError>;
}

/// Encoders compiled into this build.
///
/// Motion-JPEG is always available; H.264 in MP4 needs the `recording`
/// feature. WebM (VP8/VP9) has no muxer here and is reported unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEncoders;

impl HostEncoders {
    /// MIME types `supports` accepts
    pub fn available() -> Vec<MimeType> {
        let mut available = vec![MimeType::MOTION_JPEG];
        if cfg!(feature = "recording") {
            available.push(MimeType::MP4_H264);
        }
        available
    }
}

impl EncoderBackend for HostEncoders {
    fn supports(&self, mime: &MimeType) -> bool {
        Self::available().contains(mime)
    }

    #[cfg_attr(not(feature = "recording"), allow(unused_variables))]
    fn create(
        &self,
        config: &MimeConfiguration,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        match (config.mime.container, config.mime.codec) {
            (Container::Mjpeg, CodecProfile::Mjpeg) => Ok(Box::new(MjpegEncoder::new(
                config.jpeg_quality,
                config.chunk_bytes,
            ))),
            #[cfg(feature = "recording")]
            (Container::Mp4, CodecProfile::H264) => Ok(Box::new(super::h264::Mp4Encoder::new(
                width,
                height,
                config,
            )?)),
            _ => Err(CaptureError::UnsupportedConfiguration(format!(
                "{} is not available on this host",
                config.mime
            ))),
        }
    }
}

/// Motion-JPEG: every frame becomes a standalone JPEG image, concatenated.
///
/// Frame size may change between frames, so primary resizes need no special
/// handling.
pub struct MjpegEncoder {
    quality: u8,
    chunk_bytes: usize,
    pending: BytesMut,
}

impl MjpegEncoder {
    pub fn new(quality: u8, chunk_bytes: usize) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            chunk_bytes: chunk_bytes.max(1),
            pending: BytesMut::new(),
        }
    }
}

impl MediaEncoder for MjpegEncoder {
    fn encode(&mut self, frame: &CompositedFrame) -> Result<Vec<Bytes>, CaptureError> {
        // JPEG has no alpha channel
        let rgb = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            let [r, g, b, _] = frame.image.get_pixel(x, y).0;
            Rgb([r, g, b])
        });

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&rgb)
            .map_err(|e| CaptureError::Encoder(format!("JPEG encoding failed: {}", e)))?;
        self.pending.extend_from_slice(&jpeg);

        if self.pending.len() >= self.chunk_bytes {
            Ok(vec![self.pending.split().freeze()])
        } else {
            Ok(Vec::new())
        }
    }

    fn finish(&mut self) -> Result<Vec<Bytes>, CaptureError> {
        if self.pending.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![self.pending.split().freeze()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> CompositedFrame {
        let mut frame = CompositedFrame::blank(width, height);
        frame.sequence = 1;
        frame
    }

    #[test]
    fn test_mjpeg_buffers_until_threshold() {
        let mut encoder = MjpegEncoder::new(80, usize::MAX);
        assert!(encoder.encode(&frame(64, 48)).unwrap().is_empty());
        assert!(encoder.encode(&frame(64, 48)).unwrap().is_empty());

        let tail = encoder.finish().unwrap();
        assert_eq!(tail.len(), 1);
        // Two JPEG images back to back, each starting with SOI
        assert_eq!(&tail[0][..2], &[0xFF, 0xD8]);
        let soi_count = tail[0].windows(2).filter(|w| w == &[0xFF, 0xD8]).count();
        assert!(soi_count >= 2);
    }

    #[test]
    fn test_mjpeg_emits_per_frame_with_small_threshold() {
        let mut encoder = MjpegEncoder::new(80, 1);
        let chunks = encoder.encode(&frame(32, 32)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(encoder.finish().unwrap().is_empty());
    }

    #[test]
    fn test_host_rejects_webm() {
        let host = HostEncoders;
        assert!(!host.supports(&MimeType::WEBM_VP9));
        assert!(host.supports(&MimeType::MOTION_JPEG));

        let config = MimeConfiguration::new(MimeType::WEBM_VP9);
        assert!(matches!(
            host.create(&config, 640, 480),
            Err(CaptureError::UnsupportedConfiguration(_))
        ));
    }
}
