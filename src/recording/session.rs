//! Capture session: records an output stream into an ordered chunk sequence

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::chunks::{ChunkSequence, FinalizedMedia};
use super::config::{MimeConfiguration, RecordingStats};
use super::encoder::EncoderBackend;
use super::recorder::{Recorder, RecorderHandle};
use super::state::RecordingState;
use crate::compositor::OutputStream;
use crate::errors::CaptureError;

struct ActiveRecording {
    recorder: RecorderHandle,
    collector: JoinHandle<()>,
    started_at: Instant,
}

/// One recording of a composited [`OutputStream`].
///
/// Chunks are appended in the order the encoder emits them. The session
/// moves `Armed -> Recording -> Stopped` and is never restarted.
pub struct CaptureSession {
    id: Uuid,
    config: MimeConfiguration,
    state: RecordingState,
    stream: OutputStream,
    recorder: Option<Recorder>,
    active: Option<ActiveRecording>,
    chunks: Arc<Mutex<ChunkSequence>>,
}

impl CaptureSession {
    /// Bind `stream` to an encoder for `config`.
    ///
    /// Fails with `UnsupportedConfiguration` when `backend` has no encoder
    /// for the MIME type; no session exists afterwards.
    pub fn begin(
        stream: OutputStream,
        config: MimeConfiguration,
        backend: &dyn EncoderBackend,
    ) -> Result<Self, CaptureError> {
        if !backend.supports(&config.mime) {
            return Err(CaptureError::UnsupportedConfiguration(format!(
                "{} is not available on this host",
                config.mime
            )));
        }

        let (width, height) = stream.dimensions();
        let encoder = backend.create(&config, width, height)?;
        let id = Uuid::new_v4();
        log::info!(
            "Capture session {} armed: {} at {}x{}",
            id,
            config.mime,
            width,
            height
        );

        Ok(Self {
            id,
            recorder: Some(Recorder::new(encoder, &config)),
            config,
            state: RecordingState::Armed,
            stream,
            active: None,
            chunks: Arc::new(Mutex::new(ChunkSequence::new())),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn config(&self) -> &MimeConfiguration {
        &self.config
    }

    /// The stream being recorded
    pub fn stream(&self) -> &OutputStream {
        &self.stream
    }

    /// Bytes collected so far
    pub fn recorded_bytes(&self) -> usize {
        self.chunks.lock().total_bytes()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Start recording. Returns false, doing nothing, unless the session is
    /// armed.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.state != RecordingState::Armed {
            log::warn!("Session {} cannot start from {}", self.id, self.state);
            return false;
        }
        let Some(recorder) = self.recorder.take() else {
            return false;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let chunks = Arc::clone(&self.chunks);
        let session_id = self.id;
        let collector = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                log::trace!("Session {} chunk of {} bytes", session_id, chunk.len());
                chunks.lock().push(chunk);
            }
        });

        self.active = Some(ActiveRecording {
            recorder: recorder.spawn(self.stream.clone(), tx),
            collector,
            started_at: Instant::now(),
        });
        self.state = RecordingState::Recording;
        log::info!("Capture session {} recording", self.id);
        true
    }

    /// Stop recording, wait for the encoder's final chunk and join the
    /// chunks into one media object.
    ///
    /// Fails with `RecordingNotActive` unless the session is recording.
    pub async fn stop(&mut self) -> Result<FinalizedMedia, CaptureError> {
        if self.state != RecordingState::Recording {
            return Err(CaptureError::RecordingNotActive);
        }
        self.state = RecordingState::Stopped;
        let Some(active) = self.active.take() else {
            return Err(CaptureError::RecordingNotActive);
        };

        let recorded = active.recorder.stop().await;
        // The recorder dropped its sender, so the collector drains and exits
        active
            .collector
            .await
            .map_err(|e| CaptureError::Encoder(format!("chunk collector failed: {}", e)))?;

        let summary = match recorded {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Capture session {} failed: {}", self.id, e);
                self.chunks.lock().clear();
                return Err(e);
            }
        };

        let mut chunks = self.chunks.lock();
        let stats = RecordingStats {
            frames_encoded: summary.frames_encoded,
            frames_skipped: summary.frames_skipped,
            chunk_count: chunks.len(),
            bytes: chunks.total_bytes() as u64,
            duration_secs: active.started_at.elapsed().as_secs_f64(),
        };
        let media = chunks.finalize(self.config.mime_type(), self.config.extension(), stats);

        log::info!(
            "Capture session {} stopped: {} chunks, {} bytes, {} frames",
            self.id,
            media.chunk_count,
            media.len(),
            media.stats.frames_encoded
        );
        Ok(media)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.recorder.abort();
            active.collector.abort();
        }
    }
}
