// SPDX-License-Identifier: Apache-2.0

//! File-backed host label enrichment.
//!
//! An optional YAML file maps host identifiers to extra static labels:
//!
//! ```yaml
//! leeloo.example.com:
//!   rack: b12
//!   dc: waw1
//! ```
//!
//! The map is reloaded on a timer and swapped in as a whole snapshot, so
//! concurrent lookups never observe a partially-updated mapping. A reload
//! failure keeps the previous snapshot; the enricher never degrades to an
//! empty map on a transient read error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ConfigError;

/// Host identifier to extra static labels.
pub type HostLabelMap = HashMap<String, HashMap<String, String>>;

/// Handle to the live host label snapshot. Cheap to clone; all clones
/// observe the same periodically-refreshed map.
#[derive(Debug, Clone)]
pub struct HostLabels {
    rx: watch::Receiver<Arc<HostLabelMap>>,
}

impl HostLabels {
    /// An enricher with no backing file; every lookup is empty.
    pub fn empty() -> Self {
        let (_tx, rx) = watch::channel(Arc::new(HostLabelMap::new()));
        HostLabels { rx }
    }

    /// Loads the file once (errors are fatal here, not later) and spawns a
    /// refresh task that re-loads it every `refresh_interval` until the
    /// cancellation token fires.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_file(
        path: &Path,
        refresh_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let map = load(path)?;
        let (tx, rx) = watch::channel(Arc::new(map));
        let path = path.to_path_buf();
        tokio::spawn(refresh_loop(tx, path, refresh_interval, cancel_token));
        Ok(HostLabels { rx })
    }

    /// Current snapshot of the whole map. The returned `Arc` stays valid
    /// across refresh swaps.
    pub fn snapshot(&self) -> Arc<HostLabelMap> {
        self.rx.borrow().clone()
    }
}

fn load(path: &Path) -> Result<HostLabelMap, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::HostLabelRead(path.display().to_string(), e.to_string()))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError::HostLabelParse(path.display().to_string(), e.to_string()))
}

async fn refresh_loop(
    tx: watch::Sender<Arc<HostLabelMap>>,
    path: PathBuf,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.tick().await; // discard first tick, which is instantaneous
    loop {
        tokio::select! {
            _ = ticker.tick() => match load(&path) {
                Ok(map) => {
                    debug!("reloaded host label file {} ({} hosts)", path.display(), map.len());
                    let _ = tx.send(Arc::new(map));
                }
                // Stale-but-available: keep serving the previous snapshot
                Err(e) => warn!("host label reload failed, keeping previous map: {e}"),
            },
            () = cancel_token.cancelled() => break,
        }
    }
}
