//! The composited output stream

use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::watch;

/// One rendered picture-in-picture frame
#[derive(Debug, Clone)]
pub struct CompositedFrame {
    /// 0 for the placeholder published before the first render, then 1, 2, ...
    pub sequence: u64,
    /// Microseconds since the render loop started
    pub timestamp_us: u64,
    pub image: RgbaImage,
}

impl CompositedFrame {
    /// Black placeholder frame
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            sequence: 0,
            timestamp_us: 0,
            image: RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_placeholder(&self) -> bool {
        self.sequence == 0
    }
}

/// Write end of an [`OutputStream`]. Dropping it ends the stream.
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Arc<CompositedFrame>>,
}

/// Continuous stream of composited frames.
///
/// Holds only the latest frame: a slow consumer observes the newest frame
/// rather than a backlog. Clones share the same feed.
#[derive(Debug, Clone)]
pub struct OutputStream {
    rx: watch::Receiver<Arc<CompositedFrame>>,
}

/// Creates a stream whose current value is `initial`.
pub fn output_channel(initial: CompositedFrame) -> (FramePublisher, OutputStream) {
    let (tx, rx) = watch::channel(Arc::new(initial));
    (FramePublisher { tx }, OutputStream { rx })
}

impl FramePublisher {
    pub fn publish(&self, frame: Arc<CompositedFrame>) {
        self.tx.send_replace(frame);
    }

    pub fn subscribe(&self) -> OutputStream {
        OutputStream {
            rx: self.tx.subscribe(),
        }
    }
}

impl OutputStream {
    /// Most recently published frame
    pub fn latest(&self) -> Arc<CompositedFrame> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let frame = self.rx.borrow();
        (frame.width(), frame.height())
    }

    /// False once the producing render loop has been stopped
    pub fn is_active(&self) -> bool {
        self.rx.has_changed().is_ok()
    }

    /// Waits for a frame newer than the last one this handle saw.
    ///
    /// Returns `None` once the stream has been invalidated.
    pub async fn next_frame(&mut self) -> Option<Arc<CompositedFrame>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// Marks the current frame as seen and returns it
    pub(crate) fn mark_seen(&mut self) -> Arc<CompositedFrame> {
        Arc::clone(&self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Arc<CompositedFrame> {
        let mut f = CompositedFrame::blank(4, 4);
        f.sequence = sequence;
        Arc::new(f)
    }

    #[test]
    fn test_stream_valid_before_first_publish() {
        let (_publisher, stream) = output_channel(CompositedFrame::blank(320, 240));
        assert!(stream.is_active());
        assert!(stream.latest().is_placeholder());
        assert_eq!(stream.dimensions(), (320, 240));
    }

    #[tokio::test]
    async fn test_next_frame_sees_latest_only() {
        let (publisher, mut stream) = output_channel(CompositedFrame::blank(4, 4));
        stream.mark_seen();

        publisher.publish(frame(1));
        publisher.publish(frame(2));
        let next = stream.next_frame().await.unwrap();
        assert_eq!(next.sequence, 2);
    }

    #[tokio::test]
    async fn test_dropping_publisher_invalidates() {
        let (publisher, mut stream) = output_channel(CompositedFrame::blank(4, 4));
        stream.mark_seen();
        drop(publisher);

        assert!(!stream.is_active());
        assert!(stream.next_frame().await.is_none());
    }
}
