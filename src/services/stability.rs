//! File stability gate
//!
//! Directory-event delivery can race with the transfer that is still writing
//! the file, so event-driven processing waits here first. The file is
//! considered ready once two consecutive size samples are equal and nonzero.
//! A file that disappears mid-check is retried, not failed. The wait is
//! bounded: on timeout we log a warning and proceed anyway.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Wait until `path` stops growing, or until `timeout` elapses.
pub async fn wait_for_stable(path: &Path, timeout: Duration) {
    wait_with_interval(path, timeout, SAMPLE_INTERVAL).await
}

async fn wait_with_interval(path: &Path, timeout: Duration, interval: Duration) {
    let mut last_size: Option<u64> = None;
    let mut waited = Duration::ZERO;

    while waited < timeout {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let size = meta.len();
                if size > 0 && last_size == Some(size) {
                    debug!(file = %path.display(), size, "file size stable");
                    return;
                }
                last_size = Some(size);
            }
            Err(e) => {
                // The file may not exist yet, or may have been replaced
                // mid-transfer; keep sampling until the deadline.
                debug!(file = %path.display(), error = %e, "stability check: file not readable");
                last_size = None;
            }
        }
        tokio::time::sleep(interval).await;
        waited += interval;
    }

    warn!(
        file = %path.display(),
        timeout_secs = timeout.as_secs_f64(),
        "file never stabilized, processing anyway"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    const FAST: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn stable_file_passes_after_two_samples() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("song.mp3");
        std::fs::write(&file, b"complete data").unwrap();

        let start = Instant::now();
        wait_with_interval(&file, Duration::from_secs(5), FAST).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn growing_file_is_waited_on() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("song.mp3");
        std::fs::write(&file, b"part").unwrap();

        let writer = {
            let file = file.clone();
            tokio::spawn(async move {
                for _ in 0..3 {
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    let mut data = std::fs::read(&file).unwrap();
                    data.extend_from_slice(b"more");
                    std::fs::write(&file, data).unwrap();
                }
            })
        };

        wait_with_interval(&file, Duration::from_secs(5), FAST).await;
        writer.await.unwrap();
        // Must have settled at the final size
        assert_eq!(std::fs::metadata(&file).unwrap().len(), 4 + 3 * 4);
    }

    #[tokio::test]
    async fn missing_file_times_out_instead_of_failing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("never-appears.mp3");

        let start = Instant::now();
        wait_with_interval(&file, Duration::from_millis(50), FAST).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn empty_file_is_not_considered_stable() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.mp3");
        std::fs::write(&file, b"").unwrap();

        let start = Instant::now();
        wait_with_interval(&file, Duration::from_millis(60), FAST).await;
        // Zero-size samples never satisfy the gate; it must run to timeout.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
