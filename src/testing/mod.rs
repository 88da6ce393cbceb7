//! Testing utilities for pipcorder
//!
//! Deterministic stand-ins for the encoder registry and the persistence
//! collaborator, so recording flows can be tested without codecs or a
//! save dialog.

mod persistence;
mod scripted;

pub use persistence::{RecordingPersistence, SaveBehavior};
pub use scripted::{scripted_chunk, ScriptedBackend, ScriptedEncoder};
