//! Live video sources feeding the compositor
//!
//! A compositor binds exactly two sources: the primary (screen or window
//! capture, drawn full-frame) and the secondary (camera, drawn as the
//! picture-in-picture overlay). How sources are enumerated and picked is up to
//! the caller; this module only defines what the compositor needs from them.

#[cfg(feature = "camera")]
mod camera;
#[cfg_attr(not(any(feature = "camera", feature = "screen")), allow(dead_code))]
mod feed;
#[cfg(feature = "screen")]
mod screen;
mod synthetic;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
#[cfg(feature = "screen")]
pub use screen::{ScreenSource, ScreenTarget};
pub use synthetic::{Pattern, SourceControl, SyntheticSource};

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::errors::CaptureError;

/// Which slot of the picture-in-picture layout a source occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// Screen/window capture, rendered at full surface size
    Primary,
    /// Camera capture, rendered as the scaled corner overlay
    Secondary,
}

impl SourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Primary => "primary",
            SourceRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live video feed.
///
/// Dimensions report the feed's current native resolution and may change at
/// any time (a captured window being resized, a camera renegotiating). A
/// source that has not produced anything yet reports zero width/height and no
/// frame.
pub trait VideoSource: Send {
    /// Human readable name, used in logs
    fn label(&self) -> &str;

    /// Open the underlying feed. Blocks until the platform grants the stream.
    fn open(&mut self) -> std::io::Result<()>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// False once the feed has ended or failed
    fn is_live(&self) -> bool;

    /// Most recent frame, if any has arrived
    fn current_frame(&self) -> Option<Arc<RgbaImage>>;

    /// Release the feed. Called exactly once by the owner.
    fn release(&mut self);
}

/// Opens `source`, mapping any failure (or a feed that is not live after
/// opening) to `SourceUnavailable` for `role`.
pub(crate) fn open_source(
    source: &mut dyn VideoSource,
    role: SourceRole,
) -> Result<(), CaptureError> {
    source
        .open()
        .map_err(|e| CaptureError::source_unavailable(role, format!("{}: {}", source.label(), e)))?;
    if !source.is_live() {
        source.release();
        return Err(CaptureError::source_unavailable(
            role,
            format!("{} is not live", source.label()),
        ));
    }
    log::info!(
        "Opened {} source '{}' at {}x{}",
        role,
        source.label(),
        source.width(),
        source.height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(SourceRole::Primary.to_string(), "primary");
        assert_eq!(SourceRole::Secondary.as_str(), "secondary");
    }

    #[test]
    fn test_open_source_rejects_dead_feed() {
        let (mut source, control) = SyntheticSource::with_control("screen", 640, 480);
        control.kill();
        let result = open_source(&mut source, SourceRole::Primary);
        assert!(matches!(
            result,
            Err(CaptureError::SourceUnavailable { role: SourceRole::Primary, .. })
        ));
        assert!(control.was_released());
    }

    #[test]
    fn test_open_source_maps_open_failure_to_role() {
        let (mut source, control) = SyntheticSource::with_control("cam", 640, 480);
        control.fail_open("device busy");
        match open_source(&mut source, SourceRole::Secondary) {
            Err(CaptureError::SourceUnavailable { role, reason }) => {
                assert_eq!(role, SourceRole::Secondary);
                assert!(reason.contains("device busy"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
