//! pipcorder: picture-in-picture screen and webcam recording
//!
//! This crate composites a primary video source (a screen or window) with a
//! secondary one (a webcam) into a single picture-in-picture stream and
//! records that stream to a single media file.
//!
//! # Features
//! - Compositing paced at the display refresh rate, overlay in a fixed corner
//! - Chunked recording with strict chunk ordering
//! - Motion-JPEG recording out of the box, H.264/MP4 with `recording`
//! - Webcam input through nokhwa with `camera`
//! - Display and window capture through scap with `screen`
//! - Synthetic sources and scripted encoders for offline testing
//!
//! # Usage
//! ```rust,ignore
//! use pipcorder::{DirectoryPersistence, PipcorderConfig, RecordingController, SyntheticSource};
//!
//! let config = PipcorderConfig::load_or_default();
//! let mut controller = RecordingController::from_config(&config)?;
//! controller.arm(
//!     Box::new(SyntheticSource::new("screen", 1280, 720)),
//!     Box::new(SyntheticSource::new("camera", 640, 480)),
//! )?;
//! controller.on_start_requested();
//!
//! // Later:
//! let persistence = DirectoryPersistence::new(&config.storage.output_directory);
//! let report = controller.on_stop_requested(&persistence).await?;
//! ```
pub mod compositor;
pub mod config;
pub mod controller;
pub mod errors;
pub mod persistence;
pub mod recording;
pub mod source;
pub mod timing;

// Testing utilities - scripted encoders and persistence fakes
pub mod testing;

// Re-exports for convenience
pub use compositor::{CompositedFrame, FrameCompositor, OutputStream, PipLayout, SourceHealth};
pub use config::PipcorderConfig;
pub use controller::{RecordingController, StopReason, StopReport};
pub use errors::{CaptureError, ErrorResponse};
pub use persistence::{DirectoryPersistence, Persistence};
pub use recording::{CaptureSession, FinalizedMedia, MimeConfiguration, RecordingState};
#[cfg(feature = "camera")]
pub use source::CameraSource;
#[cfg(feature = "screen")]
pub use source::{ScreenSource, ScreenTarget};
pub use source::{SourceRole, SyntheticSource, VideoSource};

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "pipcorder=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        encoders: recording::HostEncoders::available()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// MIME types this build can record
    pub encoders: Vec<String>,
}
