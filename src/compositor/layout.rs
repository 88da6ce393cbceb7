//! Picture-in-picture placement

use serde::{Deserialize, Serialize};

/// Surface corner the overlay is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Where the overlay lands on the surface, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Fixed picture-in-picture layout.
///
/// The overlay is `surface_height / divisor` tall, as wide as the secondary's
/// aspect ratio demands, and sits `margin` pixels in from `corner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipLayout {
    pub divisor: u32,
    pub corner: Corner,
    pub margin: u32,
}

impl Default for PipLayout {
    fn default() -> Self {
        Self {
            divisor: 3,
            corner: Corner::BottomRight,
            margin: 0,
        }
    }
}

impl PipLayout {
    /// Placement of a `source_width` x `source_height` overlay, or `None` when
    /// either the surface or the source has no area.
    pub fn overlay_rect(
        &self,
        surface_width: u32,
        surface_height: u32,
        source_width: u32,
        source_height: u32,
    ) -> Option<OverlayRect> {
        if surface_width == 0 || surface_height == 0 || source_width == 0 || source_height == 0 {
            return None;
        }

        let aspect = source_width as f64 / source_height as f64;
        let out_height = surface_height as f64 / self.divisor.max(1) as f64;
        let out_width = out_height * aspect;

        let width = out_width.round() as u32;
        let height = out_height.round() as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let margin = self.margin as i64;
        let x = match self.corner {
            Corner::TopLeft | Corner::BottomLeft => margin,
            Corner::TopRight | Corner::BottomRight => surface_width as i64 - width as i64 - margin,
        };
        let y = match self.corner {
            Corner::TopLeft | Corner::TopRight => margin,
            Corner::BottomLeft | Corner::BottomRight => {
                surface_height as i64 - height as i64 - margin
            }
        };

        Some(OverlayRect {
            x,
            y,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_right_third_of_height() {
        let rect = PipLayout::default()
            .overlay_rect(1280, 720, 640, 480)
            .unwrap();
        assert_eq!(rect.height, 240);
        assert_eq!(rect.width, 320);
        assert_eq!((rect.x, rect.y), (960, 480));
    }

    #[test]
    fn test_rescale_after_primary_resize() {
        let rect = PipLayout::default()
            .overlay_rect(1920, 1080, 640, 480)
            .unwrap();
        assert_eq!(rect.height, 360);
        assert_eq!(rect.width, 480);
        assert_eq!((rect.x, rect.y), (1440, 720));
    }

    #[test]
    fn test_zero_area_source_is_skipped() {
        let layout = PipLayout::default();
        assert!(layout.overlay_rect(1280, 720, 0, 480).is_none());
        assert!(layout.overlay_rect(1280, 720, 640, 0).is_none());
        assert!(layout.overlay_rect(0, 0, 640, 480).is_none());
    }

    #[test]
    fn test_top_left_with_margin() {
        let layout = PipLayout {
            divisor: 4,
            corner: Corner::TopLeft,
            margin: 16,
        };
        let rect = layout.overlay_rect(1600, 800, 1920, 1080).unwrap();
        assert_eq!(rect.height, 200);
        assert_eq!(rect.width, 356);
        assert_eq!((rect.x, rect.y), (16, 16));
    }
}
