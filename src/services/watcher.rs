//! Event driver
//!
//! Subscribes to recursive create/modify notifications on the watched root
//! and spawns one handler task per actionable path. Rapid repeated events
//! for the same file are collapsed by the in-flight set: a path is claimed
//! before any work starts and released by guard drop on every exit path,
//! so no two handlers ever run for one path simultaneously. Shutdown stops
//! event dispatch first, then drains the handlers still running.

use crate::services::ledger::Ledger;
use crate::services::processor::Processor;
use crate::services::stability;
use crate::{Policy, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Paths currently being handled. This is the sole concurrency-control
/// primitive in the pipeline.
#[derive(Default)]
pub struct InFlight {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim a path for exclusive handling. Returns `None` when another
    /// handler already owns it.
    pub fn claim(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        let mut paths = self.paths.lock().unwrap();
        if !paths.insert(path.to_path_buf()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the claimed path when dropped, on success, failure or panic
/// unwind alike.
pub struct InFlightGuard {
    set: Arc<InFlight>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.paths.lock().unwrap().remove(&self.path);
    }
}

pub async fn run(
    processor: Arc<Processor>,
    policy: Arc<Policy>,
    ledger: Arc<Ledger>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PathBuf>();

    let mut watcher =
        notify::recommended_watcher(move |result: std::result::Result<notify::Event, notify::Error>| {
            match result {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watch error"),
            }
        })?;
    watcher.watch(&policy.base_path, RecursiveMode::Recursive)?;
    info!(root = %policy.base_path.display(), "watching for new files");

    let in_flight = InFlight::new();
    let handlers = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => {
                let Some(path) = event else { break };
                dispatch(&path, &processor, &policy, &ledger, &in_flight, &handlers);
            }
        }
    }

    // Stop the event source before draining so no new handlers appear.
    drop(watcher);
    handlers.close();
    if !in_flight.is_empty() {
        info!(active = in_flight.len(), "waiting for in-flight handlers to finish");
    }
    handlers.wait().await;
    info!("event driver stopped");
    Ok(())
}

/// Filter one notification and spawn a handler if it is actionable.
fn dispatch(
    path: &Path,
    processor: &Arc<Processor>,
    policy: &Arc<Policy>,
    ledger: &Arc<Ledger>,
    in_flight: &Arc<InFlight>,
    handlers: &TaskTracker,
) {
    if !policy.is_candidate(path) {
        return;
    }
    if ledger.contains(path) {
        debug!(file = %path.display(), "already processed, ignoring event");
        return;
    }
    let Some(guard) = in_flight.claim(path) else {
        debug!(file = %path.display(), "already in flight, ignoring event");
        return;
    };

    debug!(file = %path.display(), "file event accepted");
    let processor = Arc::clone(processor);
    let timeout = policy.stability_timeout();
    let path = path.to_path_buf();
    handlers.spawn(async move {
        // Guard is owned by the task: released when this future completes
        // or is dropped, whatever the outcome.
        let _guard = guard;
        stability::wait_for_stable(&path, timeout).await;
        // Decode, tag rewrite and copy are all synchronous; they run on the
        // blocking pool, not the event-dispatch workers.
        let result = tokio::task::spawn_blocking({
            let path = path.clone();
            move || processor.process_file(&path)
        })
        .await;
        if let Err(e) = result {
            warn!(file = %path.display(), error = %e, "file handler aborted");
        }
    });
}
