use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::persistence::Persistence;

/// How [`RecordingPersistence`] answers save requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveBehavior {
    /// Accept the suggested name under `/recordings`
    Accept,
    /// The user dismisses the save dialog
    Cancel,
    /// The next `n` writes fail
    FailWrites(usize),
}

/// In-memory persistence that records every request and write
pub struct RecordingPersistence {
    behavior: SaveBehavior,
    failures_left: AtomicUsize,
    requests: Mutex<Vec<String>>,
    writes: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl RecordingPersistence {
    pub fn new(behavior: SaveBehavior) -> Self {
        let failures = match behavior {
            SaveBehavior::FailWrites(n) => n,
            _ => 0,
        };
        Self {
            behavior,
            failures_left: AtomicUsize::new(failures),
            requests: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Suggested names passed to `request_save_path`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Successful writes, in order
    pub fn writes(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl Persistence for RecordingPersistence {
    async fn request_save_path(&self, suggested_name: &str) -> Option<PathBuf> {
        self.requests.lock().push(suggested_name.to_string());
        match self.behavior {
            SaveBehavior::Cancel => None,
            _ => Some(Path::new("/recordings").join(suggested_name)),
        }
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "disk is read-only"));
        }
        self.writes.lock().push((path.to_path_buf(), data.to_vec()));
        Ok(())
    }
}
