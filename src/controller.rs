//! Recording lifecycle orchestration
//!
//! [`RecordingController`] owns the compositor, the active capture session
//! and the elapsed timer, and reacts to start/stop requests from the host
//! application. Requests that do not fit the current state are ignored.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::compositor::{FrameCompositor, OutputStream, SourceHealth};
use crate::config::PipcorderConfig;
use crate::errors::CaptureError;
use crate::persistence::{default_file_name, Persistence};
use crate::recording::{
    CaptureSession, EncoderBackend, FinalizedMedia, HostEncoders, MimeConfiguration,
    RecordingState, RecordingStats,
};
use crate::source::{SourceRole, VideoSource};
use crate::timing::ElapsedTimer;

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "role")]
pub enum StopReason {
    Requested,
    SourceLost(SourceRole),
}

/// Outcome of a finished recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReport {
    pub reason: StopReason,
    /// Where the recording was written; `None` if the save was cancelled
    pub saved_to: Option<PathBuf>,
    pub bytes: usize,
    pub stats: RecordingStats,
}

struct PendingSave {
    media: FinalizedMedia,
    suggested_name: String,
    reason: StopReason,
}

pub struct RecordingController {
    compositor: FrameCompositor,
    encoders: Arc<dyn EncoderBackend>,
    mime: MimeConfiguration,
    filename_prefix: String,
    state: RecordingState,
    session: Option<CaptureSession>,
    timer: ElapsedTimer,
    pending: Option<PendingSave>,
}

impl RecordingController {
    pub fn new(compositor: FrameCompositor, mime: MimeConfiguration) -> Self {
        Self {
            compositor,
            encoders: Arc::new(HostEncoders),
            mime,
            filename_prefix: "vid".to_string(),
            state: RecordingState::Idle,
            session: None,
            timer: ElapsedTimer::new(),
            pending: None,
        }
    }

    pub fn from_config(config: &PipcorderConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::Config)?;
        let mime = config.recording.mime_configuration()?;
        Ok(
            Self::new(FrameCompositor::from_config(&config.compositor), mime)
                .with_filename_prefix(config.storage.filename_prefix.clone()),
        )
    }

    /// Use another encoder registry
    pub fn with_encoders(mut self, encoders: Arc<dyn EncoderBackend>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    /// Current lifecycle state.
    ///
    /// A lost source ends the recording on its own: the state reads
    /// `Stopped` (or `Idle` for an armed session) as soon as the render loop
    /// reports the loss, and the partial recording is handed off by the next
    /// [`on_stop_requested`](Self::on_stop_requested) or
    /// [`on_source_lost`](Self::on_source_lost).
    pub fn state(&self) -> RecordingState {
        match (self.state, self.compositor.lost_source()) {
            (RecordingState::Recording, Some(_)) => RecordingState::Stopped,
            (RecordingState::Armed, Some(_)) => RecordingState::Idle,
            (state, _) => state,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.seconds()
    }

    /// Elapsed recording time as `MM:SS`
    pub fn elapsed_display(&self) -> String {
        self.timer.display()
    }

    /// The composited stream, for a live preview
    pub fn preview(&self) -> Option<OutputStream> {
        self.compositor.output()
    }

    /// Whether a finished recording is waiting for a successful save
    pub fn has_pending_save(&self) -> bool {
        self.pending.is_some()
    }

    /// Acquire both sources, start compositing and begin a capture session.
    ///
    /// Ignored while recording. Refused with `UnsavedRecording` while a
    /// finished recording still waits for a successful save; retry or
    /// discard it first. On failure the compositor is stopped, the sources
    /// are released and the controller is left idle.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn arm(
        &mut self,
        primary: Box<dyn VideoSource>,
        secondary: Box<dyn VideoSource>,
    ) -> Result<(), CaptureError> {
        if self.state == RecordingState::Recording {
            log::warn!("Arm requested while recording; ignoring");
            return Ok(());
        }
        if let Some(pending) = &self.pending {
            log::warn!("Arm refused: {} is not saved yet", pending.suggested_name);
            return Err(CaptureError::UnsavedRecording(
                pending.suggested_name.clone(),
            ));
        }

        self.session = None;
        self.state = RecordingState::Idle;

        let session = match self.begin_session(primary, secondary) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Arm failed: {}", e);
                self.compositor.stop();
                return Err(e);
            }
        };

        self.session = Some(session);
        self.state = RecordingState::Armed;
        Ok(())
    }

    fn begin_session(
        &mut self,
        primary: Box<dyn VideoSource>,
        secondary: Box<dyn VideoSource>,
    ) -> Result<CaptureSession, CaptureError> {
        self.compositor.acquire(primary, secondary)?;
        let stream = self.compositor.start()?;
        CaptureSession::begin(stream, self.mime.clone(), self.encoders.as_ref())
    }

    /// Release the sources of an armed session. Ignored while recording.
    pub fn disarm(&mut self) -> bool {
        if self.state == RecordingState::Recording {
            log::warn!("Disarm requested while recording; ignoring");
            return false;
        }
        self.session = None;
        self.compositor.stop();
        self.state = RecordingState::Idle;
        true
    }

    /// Start recording the armed session. Returns false when not armed.
    pub fn on_start_requested(&mut self) -> bool {
        if self.state != RecordingState::Armed {
            log::warn!("Start requested while {}; ignoring", self.state);
            return false;
        }
        if let Some(role) = self.compositor.lost_source() {
            log::warn!("{} source lost before recording started; disarming", role);
            self.disarm();
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.start() {
            return false;
        }

        let source_loss = self.wait_for_source_loss();
        self.timer.start_until(source_loss);
        self.state = RecordingState::Recording;
        true
    }

    /// Stop recording and hand the result to `persistence`.
    ///
    /// Returns `Ok(None)` when nothing is recording. A recording already
    /// ended by a lost source is finalized with that reason. A failed write
    /// leaves the recording pending for [`retry_save`](Self::retry_save).
    pub async fn on_stop_requested(
        &mut self,
        persistence: &dyn Persistence,
    ) -> Result<Option<StopReport>, CaptureError> {
        if self.state != RecordingState::Recording {
            log::debug!("Stop requested while {}; ignoring", self.state);
            return Ok(None);
        }
        let reason = match self.compositor.lost_source() {
            Some(role) => StopReason::SourceLost(role),
            None => StopReason::Requested,
        };
        self.finish(reason, persistence).await
    }

    /// Resolves with `SourceLost` once the render loop reports a lost
    /// source. Does not borrow the controller, so it can be raced against
    /// user requests.
    pub fn wait_for_source_loss(&self) -> impl Future<Output = CaptureError> + Send + 'static {
        let mut health = self.compositor.health();
        async move {
            loop {
                let current = *health.borrow_and_update();
                if let SourceHealth::Lost(role) = current {
                    return CaptureError::SourceLost(role);
                }
                if health.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    /// Implicit stop after a source was lost: the partial recording is
    /// finalized and handed off. An armed session is disarmed instead.
    pub async fn on_source_lost(
        &mut self,
        role: SourceRole,
        persistence: &dyn Persistence,
    ) -> Result<Option<StopReport>, CaptureError> {
        match self.state {
            RecordingState::Recording => {
                log::warn!("{} source lost; stopping recording", role);
                self.finish(StopReason::SourceLost(role), persistence).await
            }
            RecordingState::Armed => {
                log::warn!("{} source lost before recording started", role);
                self.disarm();
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Drop a recording whose save failed. Returns false if none was pending.
    pub fn discard_pending_save(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                log::warn!(
                    "Discarding unsaved recording {} ({} bytes)",
                    pending.suggested_name,
                    pending.media.len()
                );
                true
            }
            None => false,
        }
    }

    /// Try again to save a recording whose write failed
    pub async fn retry_save(
        &mut self,
        persistence: &dyn Persistence,
    ) -> Result<Option<StopReport>, CaptureError> {
        if self.pending.is_none() {
            return Ok(None);
        }
        self.save_pending(persistence).await.map(Some)
    }

    async fn finish(
        &mut self,
        reason: StopReason,
        persistence: &dyn Persistence,
    ) -> Result<Option<StopReport>, CaptureError> {
        let Some(mut session) = self.session.take() else {
            self.state = RecordingState::Stopped;
            return Ok(None);
        };

        let stopped = session.stop().await;
        self.timer.stop();
        self.compositor.stop();
        self.state = RecordingState::Stopped;
        let media = stopped?;

        log::info!(
            "Recording stopped after {}: {} bytes",
            self.timer.display(),
            media.len()
        );
        self.pending = Some(PendingSave {
            suggested_name: default_file_name(&self.filename_prefix, media.extension, Utc::now()),
            media,
            reason,
        });
        self.save_pending(persistence).await.map(Some)
    }

    async fn save_pending(
        &mut self,
        persistence: &dyn Persistence,
    ) -> Result<StopReport, CaptureError> {
        let Some(pending) = self.pending.as_ref() else {
            return Err(CaptureError::RecordingNotActive);
        };

        let saved_to = match persistence.request_save_path(&pending.suggested_name).await {
            Some(path) => {
                persistence
                    .write_bytes(&path, &pending.media.data)
                    .await
                    .map_err(|source| {
                        log::error!("Failed to save recording to {}: {}", path.display(), source);
                        CaptureError::Io {
                            path: path.clone(),
                            source,
                        }
                    })?;
                Some(path)
            }
            None => {
                log::info!("Save cancelled; discarding {}", pending.suggested_name);
                None
            }
        };

        let Some(pending) = self.pending.take() else {
            return Err(CaptureError::RecordingNotActive);
        };
        Ok(StopReport {
            reason: pending.reason,
            saved_to,
            bytes: pending.media.len(),
            stats: pending.media.stats,
        })
    }
}
