//! Recording of the composited output stream
//!
//! A [`CaptureSession`] binds an [`OutputStream`](crate::compositor::OutputStream)
//! to a [`MediaEncoder`] chosen by MIME type. Encoded data arrives as chunks,
//! is collected in emission order and joined into a single
//! [`FinalizedMedia`] when the session stops.
//!
//! Motion-JPEG is always available. H.264 in MP4 uses:
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! and needs the `recording` feature.
//!
//! # Example
//! ```rust,ignore
//! use pipcorder::recording::{CaptureSession, HostEncoders, MimeConfiguration};
//!
//! let config = MimeConfiguration::parse("video/x-motion-jpeg")?;
//! let mut session = CaptureSession::begin(stream, config, &HostEncoders)?;
//! session.start();
//!
//! // Later:
//! let media = session.stop().await?;
//! ```

mod chunks;
mod config;
mod encoder;
#[cfg(feature = "recording")]
mod h264;
mod recorder;
mod session;
mod state;

pub use chunks::{ChunkSequence, FinalizedMedia};
pub use config::{
    CodecProfile, Container, MimeConfiguration, MimeType, RecordingQuality, RecordingStats,
    DEFAULT_CHUNK_BYTES, MAX_FPS, MIN_FPS,
};
pub use encoder::{EncoderBackend, HostEncoders, MediaEncoder, MjpegEncoder};
#[cfg(feature = "recording")]
pub use h264::{EncodedFrame, H264Encoder, Mp4Encoder};
pub use recorder::{Recorder, RecorderSummary};
pub use session::CaptureSession;
pub use state::RecordingState;
