//! Shared utilities

pub mod audio_decoder;
