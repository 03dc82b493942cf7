//! Polling driver
//!
//! Single-threaded cooperative loop: sleep one interval, then run one full
//! intake cycle. Cycles never overlap and the inter-cycle sleep is the only
//! suspension point, fully interruptible by shutdown. Files found by a poll
//! have already survived at least one interval untouched, so no stability
//! gate is needed here.

use crate::services::processor::Processor;
use crate::{Policy, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run(
    processor: Arc<Processor>,
    policy: Arc<Policy>,
    shutdown: CancellationToken,
) -> Result<()> {
    info!(
        interval_secs = policy.poll_interval_secs,
        "polling driver started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, polling driver stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(policy.poll_interval()) => {
                info!("polling for new files");
                if let Err(e) = processor.run_cycle() {
                    // The watched root can vanish mid-run (unmounted share);
                    // keep polling until it comes back.
                    error!(error = %e, "polling cycle failed");
                }
            }
        }
    }
}
