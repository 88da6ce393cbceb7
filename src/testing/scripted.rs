use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::compositor::CompositedFrame;
use crate::errors::CaptureError;
use crate::recording::{EncoderBackend, MediaEncoder, MimeConfiguration, MimeType};

/// Chunk number `index` of a script: `size` bytes, all equal to `index`
pub fn scripted_chunk(index: usize, size: usize) -> Bytes {
    Bytes::from(vec![index as u8; size])
}

/// Encoder that emits a fixed list of chunks regardless of frame content.
///
/// Up to `per_frame` chunks are released on each encoded frame; whatever is
/// left comes out of `finish`.
pub struct ScriptedEncoder {
    remaining: VecDeque<Bytes>,
    per_frame: usize,
    frames: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedEncoder {
    pub fn new(sizes: &[usize], per_frame: usize) -> Self {
        Self {
            remaining: sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| scripted_chunk(i, size))
                .collect(),
            per_frame,
            frames: Arc::default(),
        }
    }
}

impl MediaEncoder for ScriptedEncoder {
    fn encode(&mut self, frame: &CompositedFrame) -> Result<Vec<Bytes>, CaptureError> {
        self.frames.lock().push((frame.width(), frame.height()));
        let count = self.per_frame.min(self.remaining.len());
        Ok(self.remaining.drain(..count).collect())
    }

    fn finish(&mut self) -> Result<Vec<Bytes>, CaptureError> {
        Ok(self.remaining.drain(..).collect())
    }
}

/// Encoder registry handing out [`ScriptedEncoder`]s
#[derive(Clone)]
pub struct ScriptedBackend {
    sizes: Vec<usize>,
    per_frame: usize,
    rejected: Vec<MimeType>,
    frames: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedBackend {
    /// All chunks are released when the recording stops
    pub fn new(sizes: &[usize]) -> Self {
        Self {
            sizes: sizes.to_vec(),
            per_frame: 0,
            rejected: Vec::new(),
            frames: Arc::default(),
        }
    }

    /// Release up to `per_frame` chunks per encoded frame
    pub fn releasing_per_frame(mut self, per_frame: usize) -> Self {
        self.per_frame = per_frame;
        self
    }

    /// Report `mime` as unavailable
    pub fn rejecting(mut self, mime: MimeType) -> Self {
        self.rejected.push(mime);
        self
    }

    /// Sizes of every frame encoded by encoders from this backend
    pub fn encoded_frame_sizes(&self) -> Vec<(u32, u32)> {
        self.frames.lock().clone()
    }

    /// The script joined in order
    pub fn expected_bytes(&self) -> Vec<u8> {
        self.sizes
            .iter()
            .enumerate()
            .flat_map(|(i, &size)| std::iter::repeat(i as u8).take(size))
            .collect()
    }
}

impl EncoderBackend for ScriptedBackend {
    fn supports(&self, mime: &MimeType) -> bool {
        !self.rejected.contains(mime)
    }

    fn create(
        &self,
        _config: &MimeConfiguration,
        _width: u32,
        _height: u32,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        let mut encoder = ScriptedEncoder::new(&self.sizes, self.per_frame);
        encoder.frames = Arc::clone(&self.frames);
        Ok(Box::new(encoder))
    }
}
