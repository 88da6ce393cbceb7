//! Recording configuration types

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::CaptureError;

/// Quality presets for recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    /// Small files, visible artifacts on text
    Low,
    /// Balanced
    Medium,
    /// Crisp screen text
    #[default]
    High,
    /// Settings given explicitly
    Custom,
}

impl RecordingQuality {
    /// Target bitrate in bits per second for bitrate-controlled codecs
    pub fn bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 2_500_000,
            RecordingQuality::Medium => 5_000_000,
            RecordingQuality::High => 10_000_000,
            RecordingQuality::Custom => 5_000_000,
        }
    }

    /// JPEG quality (1-100) for intra-only codecs
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            RecordingQuality::Low => 60,
            RecordingQuality::Medium => 75,
            RecordingQuality::High => 90,
            RecordingQuality::Custom => 80,
        }
    }
}

/// Container format of the finalized file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Concatenated JPEG frames
    Mjpeg,
    Mp4,
    WebM,
}

impl Container {
    pub fn mime(&self) -> &'static str {
        match self {
            Container::Mjpeg => "video/x-motion-jpeg",
            Container::Mp4 => "video/mp4",
            Container::WebM => "video/webm",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mjpeg => "mjpeg",
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
        }
    }
}

/// Video codec profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    Mjpeg,
    H264,
    Vp8,
    Vp9,
}

impl CodecProfile {
    /// Name used in the `codecs=` MIME parameter
    pub fn name(&self) -> &'static str {
        match self {
            CodecProfile::Mjpeg => "mjpeg",
            CodecProfile::H264 => "avc1",
            CodecProfile::Vp8 => "vp8",
            CodecProfile::Vp9 => "vp9",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        let name = name.trim().trim_matches('"').to_ascii_lowercase();
        match name.as_str() {
            "mjpeg" | "mjpg" => Some(CodecProfile::Mjpeg),
            "h264" | "avc1" => Some(CodecProfile::H264),
            n if n.starts_with("avc1.") => Some(CodecProfile::H264),
            "vp8" | "vp08" => Some(CodecProfile::Vp8),
            "vp9" | "vp09" => Some(CodecProfile::Vp9),
            n if n.starts_with("vp09.") => Some(CodecProfile::Vp9),
            _ => None,
        }
    }
}

/// Container plus codec, as written in a MIME string such as
/// `video/webm; codecs=vp9`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MimeType {
    pub container: Container,
    pub codec: CodecProfile,
}

impl MimeType {
    pub const MOTION_JPEG: MimeType = MimeType {
        container: Container::Mjpeg,
        codec: CodecProfile::Mjpeg,
    };
    pub const MP4_H264: MimeType = MimeType {
        container: Container::Mp4,
        codec: CodecProfile::H264,
    };
    pub const WEBM_VP9: MimeType = MimeType {
        container: Container::WebM,
        codec: CodecProfile::Vp9,
    };
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.container {
            Container::Mjpeg => f.write_str(self.container.mime()),
            _ => write!(f, "{}; codecs={}", self.container.mime(), self.codec.name()),
        }
    }
}

impl FromStr for MimeType {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || CaptureError::UnsupportedConfiguration(format!("unknown MIME type '{}'", s));

        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let container = match essence.as_str() {
            "video/x-motion-jpeg" | "video/mjpeg" => Container::Mjpeg,
            "video/mp4" => Container::Mp4,
            "video/webm" => Container::WebM,
            _ => return Err(unsupported()),
        };

        let mut codec = None;
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("codecs") {
                // Video-only: a single codec is expected
                let first = value.trim().trim_matches('"').split(',').next().unwrap_or_default();
                codec = Some(CodecProfile::parse(first).ok_or_else(unsupported)?);
            }
        }

        let codec = codec.unwrap_or(match container {
            Container::Mjpeg => CodecProfile::Mjpeg,
            Container::Mp4 => CodecProfile::H264,
            Container::WebM => CodecProfile::Vp8,
        });
        Ok(MimeType { container, codec })
    }
}

/// Fixed encoding configuration of a capture session
#[derive(Debug, Clone, PartialEq)]
pub struct MimeConfiguration {
    pub mime: MimeType,
    /// Upper bound on recorded frames per second
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// JPEG quality for Motion-JPEG
    pub jpeg_quality: u8,
    /// Encoded bytes buffered before a chunk is released
    pub chunk_bytes: usize,
    pub quality: RecordingQuality,
}

pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024;

/// Slowest recording frame rate accepted
pub const MIN_FPS: f64 = 1.0;
/// Fastest recording frame rate accepted
pub const MAX_FPS: f64 = 240.0;

impl MimeConfiguration {
    pub fn new(mime: MimeType) -> Self {
        Self::from_quality(mime, RecordingQuality::default())
    }

    pub fn from_quality(mime: MimeType, quality: RecordingQuality) -> Self {
        Self {
            mime,
            fps: 30.0,
            bitrate: quality.bitrate(),
            jpeg_quality: quality.jpeg_quality(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            quality,
        }
    }

    /// Parse a MIME string such as `video/webm; codecs=vp9`
    pub fn parse(mime: &str) -> Result<Self, CaptureError> {
        Ok(Self::new(mime.parse()?))
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self.quality = RecordingQuality::Custom;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self.quality = RecordingQuality::Custom;
        self
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Full MIME string the finalized media is tagged with
    pub fn mime_type(&self) -> String {
        self.mime.to_string()
    }

    pub fn extension(&self) -> &'static str {
        self.mime.container.extension()
    }

    /// Minimum spacing between recorded frames. Zero (no limit) when `fps`
    /// is not positive; rates below [`MIN_FPS`] are raised to it.
    pub fn frame_interval(&self) -> Duration {
        if self.fps > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.fps.max(MIN_FPS)).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }
}

impl Default for MimeConfiguration {
    fn default() -> Self {
        Self::new(MimeType::MOTION_JPEG)
    }
}

/// Statistics of a finished recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Frames handed to the encoder
    pub frames_encoded: u64,
    /// Frames that arrived faster than the configured rate
    pub frames_skipped: u64,
    /// Chunks emitted by the encoder
    pub chunk_count: usize,
    /// Total encoded bytes
    pub bytes: u64,
    /// Wall time between start and stop
    pub duration_secs: f64,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
