//! Recorder feeding composited frames to an encoder

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::MimeConfiguration;
use super::encoder::MediaEncoder;
use crate::compositor::{CompositedFrame, OutputStream};
use crate::errors::CaptureError;

/// Frame counters of a finished recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderSummary {
    pub frames_encoded: u64,
    pub frames_skipped: u64,
    pub chunks_emitted: usize,
}

/// Frame-rate limited front end of a [`MediaEncoder`]
pub struct Recorder {
    encoder: Box<dyn MediaEncoder>,
    frame_interval: Duration,
    last_frame_time: Option<Instant>,
    last_sequence: u64,
    summary: RecorderSummary,
}

impl Recorder {
    pub fn new(encoder: Box<dyn MediaEncoder>, config: &MimeConfiguration) -> Self {
        Self {
            encoder,
            frame_interval: config.frame_interval(),
            last_frame_time: None,
            last_sequence: 0,
            summary: RecorderSummary::default(),
        }
    }

    /// Encode a frame unless it came in faster than the configured rate or
    /// has already been recorded.
    pub fn write_frame(
        &mut self,
        frame: &CompositedFrame,
        now: Instant,
    ) -> Result<Vec<Bytes>, CaptureError> {
        if frame.is_placeholder() || frame.sequence <= self.last_sequence {
            return Ok(Vec::new());
        }

        if let Some(last_time) = self.last_frame_time {
            let elapsed = now.duration_since(last_time);
            if elapsed.as_secs_f64() < self.frame_interval.as_secs_f64() * 0.8 {
                self.summary.frames_skipped += 1;
                return Ok(Vec::new());
            }
        }

        let chunks = self.encoder.encode(frame)?;
        self.last_sequence = frame.sequence;
        self.last_frame_time = Some(now);
        self.summary.frames_encoded += 1;
        self.summary.chunks_emitted += chunks.len();
        Ok(chunks)
    }

    /// Flush the encoder
    pub fn finish(&mut self) -> Result<Vec<Bytes>, CaptureError> {
        let chunks = self.encoder.finish()?;
        self.summary.chunks_emitted += chunks.len();
        Ok(chunks)
    }

    pub fn summary(&self) -> RecorderSummary {
        self.summary
    }

    /// Record `stream` on a task until `shutdown` fires or the stream ends,
    /// sending every chunk to `chunks` in emission order.
    pub(crate) fn spawn(
        self,
        stream: OutputStream,
        chunks: mpsc::UnboundedSender<Bytes>,
    ) -> RecorderHandle {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stream, chunks, shutdown_rx));
        RecorderHandle { shutdown, task }
    }

    async fn run(
        mut self,
        mut stream: OutputStream,
        chunks: mpsc::UnboundedSender<Bytes>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<RecorderSummary, CaptureError> {
        // The frame on screen when recording starts is recorded too
        let current = stream.mark_seen();
        self.deliver(&current, &chunks)?;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = stream.next_frame() => match next {
                    Some(frame) => self.deliver(&frame, &chunks)?,
                    None => {
                        log::warn!("Output stream ended while recording; flushing");
                        break;
                    }
                },
            }
        }

        for chunk in self.finish()? {
            let _ = chunks.send(chunk);
        }
        log::debug!(
            "Recorder finished: {} frames encoded, {} skipped",
            self.summary.frames_encoded,
            self.summary.frames_skipped
        );
        Ok(self.summary)
    }

    fn deliver(
        &mut self,
        frame: &CompositedFrame,
        chunks: &mpsc::UnboundedSender<Bytes>,
    ) -> Result<(), CaptureError> {
        for chunk in self.write_frame(frame, Instant::now())? {
            let _ = chunks.send(chunk);
        }
        Ok(())
    }
}

/// A recorder running on its own task
pub(crate) struct RecorderHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<RecorderSummary, CaptureError>>,
}

impl RecorderHandle {
    /// Signal the recorder and wait for its final flush
    pub(crate) async fn stop(self) -> Result<RecorderSummary, CaptureError> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| CaptureError::Encoder(format!("recorder task failed: {}", e)))?
    }

    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}
