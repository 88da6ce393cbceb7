//! H.264 in MP4, using openh264 for encoding and muxide for muxing

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;
use parking_lot::Mutex;

use super::config::{MimeConfiguration, MAX_FPS, MIN_FPS};
use super::encoder::MediaEncoder;
use crate::compositor::CompositedFrame;
use crate::errors::CaptureError;

/// In-memory MP4 destination shared between the muxer and the encoder
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        std::mem::take(self.0.lock().get_mut())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.lock().seek(pos)
    }
}

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    bitrate: u32,
    frame_count: u64,
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B NAL units
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

impl H264Encoder {
    /// Rate-controlled to `bitrate` bits per second at up to `fps` frames
    /// per second. Dimensions are inferred by openh264 from the YUV buffer
    /// at encode time.
    pub fn new(width: u32, height: u32, bitrate: u32, fps: f64) -> Result<Self, CaptureError> {
        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate))
            .max_frame_rate(FrameRate::from_hz(fps as f32));
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CaptureError::Encoder(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            bitrate,
            frame_count: 0,
        })
    }

    /// Target bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Encode tightly packed RGB24
    pub fn encode_rgb(&mut self, rgb_data: &[u8]) -> Result<EncodedFrame, CaptureError> {
        let expected_size = (self.width * self.height * 3) as usize;
        if rgb_data.len() != expected_size {
            return Err(CaptureError::Encoder(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                rgb_data.len()
            )));
        }

        let yuv = rgb_to_yuv420(rgb_data, self.width, self.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| CaptureError::Encoder(format!("Encoding failed: {}", e)))?;
        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// MP4 recording of composited frames.
///
/// The track size is fixed when the session begins, rounded down to even
/// dimensions. Frames of another size (the primary was resized) are scaled
/// to the track size. The moov box is only complete once the muxer
/// finishes, so all chunks are released by `finish`.
pub struct Mp4Encoder {
    encoder: H264Encoder,
    muxer: Option<Muxer<SharedBuffer>>,
    buffer: SharedBuffer,
    width: u32,
    height: u32,
    clock: PresentationClock,
    chunk_bytes: usize,
}

/// Presentation times in seconds from the first recorded frame, taken from
/// the render timestamps so skipped ticks keep real-time spacing. Frames
/// with a repeated or earlier timestamp are placed one frame duration after
/// the previous one.
#[derive(Debug, Clone)]
struct PresentationClock {
    first_us: Option<u64>,
    last: Option<f64>,
    frame_duration: f64,
}

impl PresentationClock {
    fn new(fps: f64) -> Self {
        Self {
            first_us: None,
            last: None,
            frame_duration: 1.0 / fps,
        }
    }

    fn pts(&mut self, timestamp_us: u64) -> f64 {
        let first = *self.first_us.get_or_insert(timestamp_us);
        let mut pts = timestamp_us.saturating_sub(first) as f64 / 1_000_000.0;
        if let Some(last) = self.last {
            if pts <= last {
                pts = last + self.frame_duration;
            }
        }
        self.last = Some(pts);
        pts
    }
}

impl Mp4Encoder {
    pub fn new(width: u32, height: u32, config: &MimeConfiguration) -> Result<Self, CaptureError> {
        let width = width & !1;
        let height = height & !1;
        if width == 0 || height == 0 {
            return Err(CaptureError::UnsupportedConfiguration(format!(
                "{}x{} is too small for H.264",
                width, height
            )));
        }

        let fps = if config.fps > 0.0 {
            config.fps.clamp(MIN_FPS, MAX_FPS)
        } else {
            30.0
        };
        let buffer = SharedBuffer::default();
        let muxer = MuxerBuilder::new(buffer.clone())
            .video(VideoCodec::H264, width, height, fps)
            .with_fast_start(true)
            .with_metadata(Metadata::new().with_current_time())
            .build()
            .map_err(|e| CaptureError::Encoder(format!("Failed to create muxer: {}", e)))?;

        log::debug!("MP4 track {}x{} at {} fps", width, height, fps);
        Ok(Self {
            encoder: H264Encoder::new(width, height, config.bitrate, fps)?,
            muxer: Some(muxer),
            buffer,
            width,
            height,
            clock: PresentationClock::new(fps),
            chunk_bytes: config.chunk_bytes.max(1),
        })
    }

    fn rgb_at_track_size(&self, image: &RgbaImage) -> Vec<u8> {
        let scaled;
        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            scaled = imageops::resize(image, self.width, self.height, FilterType::Triangle);
            &scaled
        };

        image
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect()
    }
}

impl MediaEncoder for Mp4Encoder {
    fn encode(&mut self, frame: &CompositedFrame) -> Result<Vec<Bytes>, CaptureError> {
        let rgb = self.rgb_at_track_size(&frame.image);
        let pts = self.clock.pts(frame.timestamp_us);
        let encoded = self.encoder.encode_rgb(&rgb)?;

        // openh264 may hold a frame back
        if encoded.data.is_empty() {
            return Ok(Vec::new());
        }

        let Some(muxer) = self.muxer.as_mut() else {
            return Err(CaptureError::Encoder("muxer already finished".to_string()));
        };
        muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CaptureError::Encoder(format!("Failed to write frame: {}", e)))?;

        Ok(Vec::new())
    }

    fn finish(&mut self) -> Result<Vec<Bytes>, CaptureError> {
        let Some(muxer) = self.muxer.take() else {
            return Ok(Vec::new());
        };
        let stats = muxer
            .finish_with_stats()
            .map_err(|e| CaptureError::Encoder(format!("Failed to finalize recording: {}", e)))?;
        log::debug!(
            "MP4 finalized: {} frames, {:.2}s, {} bytes",
            stats.video_frames,
            stats.duration_secs,
            stats.bytes_written
        );

        let data = Bytes::from(self.buffer.take());
        let mut chunks = Vec::with_capacity(data.len() / self.chunk_bytes + 1);
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + self.chunk_bytes).min(data.len());
            chunks.push(data.slice(offset..end));
            offset = end;
        }
        Ok(chunks)
    }
}

/// Convert RGB24 to YUV420 planar (BT.601)
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // 2x2 subsampling
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{MimeType, RecordingQuality};

    #[test]
    fn test_rgb_to_yuv420_size() {
        let rgb = vec![128u8; 640 * 480 * 3];
        let yuv = rgb_to_yuv420(&rgb, 640, 480);
        assert_eq!(yuv.len(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut encoder = H264Encoder::new(320, 240, 2_000_000, 30.0).unwrap();
        let encoded = encoder.encode_rgb(&vec![128u8; 320 * 240 * 3]).unwrap();
        assert!(encoded.is_keyframe);
        assert!(
            encoded.data.starts_with(&[0x00, 0x00, 0x00, 0x01])
                || encoded.data.starts_with(&[0x00, 0x00, 0x01])
        );
    }

    #[test]
    fn test_presentation_time_follows_render_clock() {
        let mut clock = PresentationClock::new(25.0);
        assert_eq!(clock.pts(2_000_000), 0.0);
        assert!((clock.pts(2_040_000) - 0.04).abs() < 1e-9);
        // Two skipped ticks leave a real-time gap
        assert!((clock.pts(2_160_000) - 0.16).abs() < 1e-9);
        // A repeated timestamp still advances
        assert!((clock.pts(2_160_000) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_encoder_uses_configured_bitrate() {
        let config = MimeConfiguration::new(MimeType::MP4_H264).with_bitrate(750_000);
        let encoder = Mp4Encoder::new(320, 240, &config).unwrap();
        assert_eq!(encoder.encoder.bitrate(), 750_000);

        let preset = MimeConfiguration::from_quality(MimeType::MP4_H264, RecordingQuality::Low);
        let encoder = Mp4Encoder::new(320, 240, &preset).unwrap();
        assert_eq!(encoder.encoder.bitrate(), RecordingQuality::Low.bitrate());
    }

    #[test]
    fn test_mp4_chunks_on_finish() {
        let config = MimeConfiguration::new(MimeType::MP4_H264).with_chunk_bytes(4096);
        let mut encoder = Mp4Encoder::new(321, 241, &config).unwrap();

        for i in 0..15u8 {
            let mut frame = CompositedFrame::blank(321, 241);
            frame.sequence = i as u64 + 1;
            frame.image.pixels_mut().for_each(|p| p.0 = [i * 10, 80, 160, 255]);
            assert!(encoder.encode(&frame).unwrap().is_empty());
        }

        let chunks = encoder.finish().unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.len() <= 4096));
        let data: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        // ftyp box leads the file
        assert_eq!(&data[4..8], b"ftyp");
    }
}
