//! Periodic cache cleanup.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::watch;

use crate::cache::Manager;
use crate::observability::metrics;

/// Background sweeper deleting expired entries and bounding total size.
pub struct Janitor {
    manager: Manager,
    interval: Duration,
    max_bytes: u64,
}

/// Control handle for a spawned sweeper. Dropping the handle also stops the
/// sweeper, so a crashed entrypoint cannot leave it orphaned.
pub struct JanitorHandle {
    stop: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl JanitorHandle {
    /// Signal the sweeper to stop and wait for the in-flight sweep, if any,
    /// to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

struct SweepEntry {
    path: PathBuf,
    modified: SystemTime,
    len: u64,
}

impl Janitor {
    /// `max_bytes` of zero leaves the cache unbounded; only the TTL applies.
    pub fn new(manager: Manager, interval: Duration, max_bytes: u64) -> Self {
        Self {
            manager,
            interval,
            max_bytes,
        }
    }

    /// Spawn the sweep loop on its own task and return the stop handle.
    /// Callers should skip spawning entirely when the sweep interval is
    /// zero.
    pub fn spawn(self) -> JanitorHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval fires immediately; the first tick is a startup sweep.
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            tracing::warn!(error = %e, "cache sweep failed");
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            tracing::info!("cache sweeper stopping");
                            return;
                        }
                    }
                }
            }
        });
        JanitorHandle { stop, task }
    }

    /// One sweep: delete everything older than the TTL, then delete
    /// oldest-first until the total size fits the configured bound.
    pub async fn sweep(&self) -> std::io::Result<()> {
        let mut entries = Vec::new();
        for dir in [self.manager.orig_dir(), self.manager.resized_dir()] {
            collect_entries(&dir, &mut entries).await?;
        }

        let ttl = self.manager.ttl();
        let now = SystemTime::now();
        let mut kept = Vec::new();
        let mut removed = 0usize;

        for entry in entries {
            let age = now.duration_since(entry.modified).unwrap_or_default();
            if age > ttl {
                remove_entry(&entry.path).await;
                removed += 1;
            } else {
                kept.push(entry);
            }
        }

        if self.max_bytes > 0 {
            let mut total: u64 = kept.iter().map(|e| e.len).sum();
            if total > self.max_bytes {
                kept.sort_by_key(|e| e.modified);
                for entry in &kept {
                    if total <= self.max_bytes {
                        break;
                    }
                    // A data file takes its metadata sidecar with it.
                    if entry.path.extension().is_some_and(|e| e == "bin") {
                        let meta = entry.path.with_extension("meta");
                        if let Ok(m) = fs::metadata(&meta).await {
                            remove_entry(&meta).await;
                            total = total.saturating_sub(m.len());
                        }
                    }
                    remove_entry(&entry.path).await;
                    total = total.saturating_sub(entry.len);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "cache sweep removed entries");
            metrics::record_cache_evictions(removed);
        }
        Ok(())
    }
}

async fn collect_entries(dir: &PathBuf, out: &mut Vec<SweepEntry>) -> std::io::Result<()> {
    let mut rd = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    while let Some(entry) = rd.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        out.push(SweepEntry {
            path: entry.path(),
            modified,
            len: meta.len(),
        });
    }
    Ok(())
}

async fn remove_entry(path: &std::path::Path) {
    // Races with readers are benign: an open handle keeps reading, a late
    // reader sees a miss and refetches.
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
        }
    }
}
