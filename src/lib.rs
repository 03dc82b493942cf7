//! trackdrop - Drop-folder intake service for audio files
//!
//! Watches an incoming directory for audio files, waits for transfers to
//! settle, normalizes embedded tags and filenames, relocates each file exactly
//! once to the configured destinations, and records completion in a durable
//! ledger so nothing is ever processed twice.
//!
//! Two interchangeable drivers move the pipeline forward:
//! - [`services::poller`] re-scans the watched root on a fixed interval
//! - [`services::watcher`] reacts to filesystem create/modify events

pub mod config;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::config::Policy;
pub use crate::error::{Error, Result};
