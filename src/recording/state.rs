use serde::{Deserialize, Serialize};

/// Lifecycle of a capture session, also reported by the controller.
///
/// `Idle -> Armed -> Recording -> Stopped`. A stopped session is never
/// restarted; arming again creates a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    #[default]
    Idle,
    Armed,
    Recording,
    Stopped,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Armed => "armed",
            RecordingState::Recording => "recording",
            RecordingState::Stopped => "stopped",
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
