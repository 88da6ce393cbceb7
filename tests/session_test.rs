//! Capture Session Tests
//!
//! Records the real compositor output with scripted encoders, whose chunks
//! are known in advance, so ordering and completeness can be checked byte
//! for byte.

use std::time::Duration;

use pipcorder::compositor::{output_channel, CompositedFrame, FrameCompositor, OutputStream, PipLayout};
use pipcorder::recording::{
    CaptureSession, HostEncoders, MimeConfiguration, MimeType, RecordingState,
};
use pipcorder::source::SyntheticSource;
use pipcorder::testing::ScriptedBackend;
use pipcorder::CaptureError;

fn running_compositor(screen: (u32, u32), camera: (u32, u32)) -> (FrameCompositor, OutputStream) {
    let mut compositor = FrameCompositor::new(PipLayout::default(), 60);
    compositor
        .acquire(
            Box::new(SyntheticSource::new("screen", screen.0, screen.1)),
            Box::new(SyntheticSource::new("camera", camera.0, camera.1)),
        )
        .unwrap();
    let stream = compositor.start().unwrap();
    (compositor, stream)
}

// ═══════════════════════════════════════════════════════════════════════════
// CHUNK ORDERING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_three_chunks_concatenate_in_order() {
    let (_compositor, stream) = running_compositor((320, 180), (64, 48));
    let backend = ScriptedBackend::new(&[1024, 2048, 512]);

    let mut session =
        CaptureSession::begin(stream, MimeConfiguration::default(), &backend).unwrap();
    assert!(session.start());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let media = session.stop().await.unwrap();
    assert_eq!(media.len(), 3584);
    assert_eq!(media.chunk_count, 3);
    assert_eq!(&media.data[..], &backend.expected_bytes()[..]);
    assert_eq!(&media.data[..1024], &[0u8; 1024][..]);
    assert_eq!(&media.data[1024..3072], &[1u8; 2048][..]);
    assert_eq!(&media.data[3072..], &[2u8; 512][..]);
    assert_eq!(media.mime_type, "video/x-motion-jpeg");
    assert_eq!(session.state(), RecordingState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_chunks_released_while_recording_keep_order() {
    let (_compositor, stream) = running_compositor((320, 180), (64, 48));
    let sizes = [10, 700, 3, 4096, 1, 250, 90];
    let backend = ScriptedBackend::new(&sizes).releasing_per_frame(1);

    let mut session = CaptureSession::begin(
        stream,
        MimeConfiguration::default().with_fps(0.0),
        &backend,
    )
    .unwrap();
    session.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.chunk_count() > 0, "chunks should arrive during recording");

    let media = session.stop().await.unwrap();
    assert_eq!(media.chunk_count, sizes.len());
    assert_eq!(&media.data[..], &backend.expected_bytes()[..]);
    assert_eq!(media.stats.bytes as usize, sizes.iter().sum::<usize>());
}

#[tokio::test(start_paused = true)]
async fn test_frames_follow_primary_size() {
    let (_compositor, stream) = running_compositor((320, 180), (64, 48));
    let backend = ScriptedBackend::new(&[16]);

    let mut session =
        CaptureSession::begin(stream, MimeConfiguration::default(), &backend).unwrap();
    session.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let media = session.stop().await.unwrap();

    let sizes = backend.encoded_frame_sizes();
    assert!(!sizes.is_empty());
    assert!(sizes.iter().all(|&s| s == (320, 180)));
    assert_eq!(media.stats.frames_encoded as usize, sizes.len());
}

// ═══════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unsupported_codec_fails_begin() {
    let (_publisher, stream) = output_channel(CompositedFrame::blank(640, 360));
    let config = MimeConfiguration::parse("video/webm; codecs=vp9").unwrap();

    let result = CaptureSession::begin(stream, config, &HostEncoders);
    assert!(matches!(
        result,
        Err(CaptureError::UnsupportedConfiguration(_))
    ));
}

#[tokio::test]
async fn test_rejected_by_custom_backend() {
    let (_publisher, stream) = output_channel(CompositedFrame::blank(640, 360));
    let backend = ScriptedBackend::new(&[1]).rejecting(MimeType::MOTION_JPEG);

    let result = CaptureSession::begin(stream, MimeConfiguration::default(), &backend);
    assert!(matches!(
        result,
        Err(CaptureError::UnsupportedConfiguration(_))
    ));
}

#[tokio::test]
async fn test_stop_while_armed() {
    let (_publisher, stream) = output_channel(CompositedFrame::blank(640, 360));
    let backend = ScriptedBackend::new(&[1024]);
    let mut session =
        CaptureSession::begin(stream, MimeConfiguration::default(), &backend).unwrap();

    let result = session.stop().await;
    assert!(matches!(result, Err(CaptureError::RecordingNotActive)));
    assert_eq!(session.state(), RecordingState::Armed);
    assert_eq!(session.chunk_count(), 0);
    assert_eq!(session.recorded_bytes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_double_stop_finalizes_once() {
    let (_compositor, stream) = running_compositor((160, 90), (32, 24));
    let backend = ScriptedBackend::new(&[8, 8]);
    let mut session =
        CaptureSession::begin(stream, MimeConfiguration::default(), &backend).unwrap();
    session.start();

    let first = session.stop().await.unwrap();
    assert_eq!(first.len(), 16);
    assert!(matches!(
        session.stop().await,
        Err(CaptureError::RecordingNotActive)
    ));
    assert_eq!(session.state(), RecordingState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_compositor_stop_mid_recording_keeps_partial() {
    let (mut compositor, stream) = running_compositor((160, 90), (32, 24));
    let backend = ScriptedBackend::new(&[100, 200, 300]).releasing_per_frame(1);
    let mut session = CaptureSession::begin(
        stream,
        MimeConfiguration::default().with_fps(0.0),
        &backend,
    )
    .unwrap();
    session.start();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The stream ends; the recorder flushes on its own
    compositor.stop();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let media = session.stop().await.unwrap();
    assert_eq!(&media.data[..], &backend.expected_bytes()[..]);
}

#[tokio::test(start_paused = true)]
async fn test_motion_jpeg_output() {
    let (_compositor, stream) = running_compositor((160, 90), (32, 24));
    let mut session =
        CaptureSession::begin(stream, MimeConfiguration::default(), &HostEncoders).unwrap();
    session.start();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let media = session.stop().await.unwrap();
    assert!(media.stats.frames_encoded > 0);
    assert_eq!(media.extension, "mjpeg");
    // Starts with a JPEG SOI marker, ends with EOI
    assert_eq!(&media.data[..2], &[0xFF, 0xD8]);
    assert_eq!(&media.data[media.len() - 2..], &[0xFF, 0xD9]);
}
