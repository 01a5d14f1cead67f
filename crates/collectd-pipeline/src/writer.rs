// SPDX-License-Identifier: Apache-2.0

//! Writer instances: one bounded queue, one batch loop and one transport
//! per configured backend.
//!
//! The [`Writer`] handle is what ingestion talks to; the [`WriterService`]
//! owns the perpetual batch loop and runs until its cancellation token
//! fires, at which point it drains what is already queued and exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collectd::CollectdSample;
use crate::encode::{BatchEncoder, WireFormat};
use crate::errors::ConfigError;
use crate::host_labels::HostLabels;
use crate::metric::{Batch, MetricEvent};
use crate::queue::EventQueue;
use crate::stats::{StatsSnapshot, WriterStats};
use crate::transform::transform;

/// Per-instance configuration, deserialized from the process config file.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    pub url: String,
    #[serde(default)]
    pub format: WireFormat,
    /// Transport request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on how long a batch may accumulate, in seconds.
    #[serde(default = "default_max_batch_duration_secs")]
    pub max_batch_duration_secs: u64,
    /// Upper bound on events per batch.
    #[serde(default = "default_max_batch_length")]
    pub max_batch_length: usize,
    #[serde(default)]
    pub host_label_file: Option<PathBuf>,
    /// How often the host label file is re-read, in seconds.
    #[serde(default = "default_host_label_refresh_secs")]
    pub host_label_refresh_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_batch_duration_secs() -> u64 {
    3
}

fn default_max_batch_length() -> usize {
    1000
}

fn default_host_label_refresh_secs() -> u64 {
    60
}

/// Ingestion-facing handle of one writer instance. Cheap to clone.
#[derive(Clone)]
pub struct Writer {
    name: String,
    queue: EventQueue,
    host_labels: HostLabels,
    stats: Arc<WriterStats>,
}

impl Writer {
    /// Builds a writer instance and the service that runs its batch loop.
    ///
    /// The caller spawns the returned service. An unparseable destination
    /// URL or an unreadable host label file is fatal here; everything later
    /// is fire-and-forget. Must be called from within a tokio runtime when
    /// a host label file is configured.
    pub fn new(
        index: usize,
        cfg: WriterConfig,
        cancel_token: CancellationToken,
    ) -> Result<(WriterService, Writer), ConfigError> {
        let url = Url::parse(&cfg.url)
            .map_err(|e| ConfigError::InvalidUrl(cfg.url.clone(), e.to_string()))?;
        // explicit zeros fall back to the defaults like absent fields do;
        // a zero batch length or duration would stall the batch loop
        let timeout_secs = if cfg.timeout_secs == 0 {
            default_timeout_secs()
        } else {
            cfg.timeout_secs
        };
        let max_batch_duration_secs = if cfg.max_batch_duration_secs == 0 {
            default_max_batch_duration_secs()
        } else {
            cfg.max_batch_duration_secs
        };
        let max_batch_length = if cfg.max_batch_length == 0 {
            default_max_batch_length()
        } else {
            cfg.max_batch_length
        };
        let name = instance_name(&url, index);
        // log host and path only, never credentials embedded in the URL
        info!(
            "starting {} writer {} to {}{}",
            cfg.format,
            name,
            url.host_str().unwrap_or(""),
            url.path()
        );

        let host_labels = match &cfg.host_label_file {
            Some(path) => {
                info!("loading host label map file {}", path.display());
                HostLabels::from_file(
                    path,
                    Duration::from_secs(cfg.host_label_refresh_secs.max(1)),
                    cancel_token.clone(),
                )?
            }
            None => HostLabels::empty(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let (queue, rx) = EventQueue::bounded(max_batch_length * 2);
        let stats = Arc::new(WriterStats::default());

        let service = WriterService {
            name: name.clone(),
            rx,
            encoder: cfg.format.encoder(),
            client,
            url,
            stats: Arc::clone(&stats),
            cancel_token,
            max_batch_length,
            max_batch_duration: Duration::from_secs(max_batch_duration_secs),
        };
        let writer = Writer {
            name,
            queue,
            host_labels,
            stats,
        };
        Ok((service, writer))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Transforms one sample and enqueues its events.
    ///
    /// Fire and forget: once a sample is accepted here, delivery failures
    /// are only visible through the counters and the log.
    pub async fn write_sample(&self, sample: &CollectdSample) {
        let labels = self.host_labels.snapshot();
        for event in transform(sample, &labels) {
            if !self.queue.enqueue(event).await {
                warn!("queue delay exceeded, dropping event for writer {}", self.name);
                self.stats.incr_events_dropped();
            }
        }
    }
}

/// Derives a stable instance name from the destination and config position,
/// e.g. `victoria.example.com_8480_1f0a9b3c`.
fn instance_name(url: &Url, index: usize) -> String {
    let sum = Sha256::digest(format!("{url}{index}").as_bytes());
    let hash: String = sum[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}_{}_{}",
        url.host_str().unwrap_or("unknown"),
        url.port_or_known_default().unwrap_or(0),
        hash
    )
}

/// Why one batch-fill cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillOutcome {
    /// Count threshold reached before the duration timer.
    Full,
    /// Duration timer fired first.
    Deadline,
    /// All producers dropped their handles.
    Closed,
    /// Shutdown requested.
    Cancelled,
}

/// Fills a batch until it reaches `max_len`, the deadline fires, the channel
/// closes or the token cancels, whichever happens first.
async fn fill_batch(
    rx: &mut mpsc::Receiver<MetricEvent>,
    max_len: usize,
    deadline: Instant,
    cancel_token: &CancellationToken,
) -> (Batch, FillOutcome) {
    let mut batch = Batch::new();
    loop {
        if batch.len() >= max_len {
            return (batch, FillOutcome::Full);
        }
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => batch.push(event),
                None => return (batch, FillOutcome::Closed),
            },
            () = tokio::time::sleep_until(deadline) => return (batch, FillOutcome::Deadline),
            () = cancel_token.cancelled() => return (batch, FillOutcome::Cancelled),
        }
    }
}

/// Batch assembler plus transport for one writer instance.
pub struct WriterService {
    name: String,
    rx: mpsc::Receiver<MetricEvent>,
    encoder: Box<dyn BatchEncoder>,
    client: reqwest::Client,
    url: Url,
    stats: Arc<WriterStats>,
    cancel_token: CancellationToken,
    max_batch_length: usize,
    max_batch_duration: Duration,
}

impl WriterService {
    /// Greedy, latency-bounded micro-batcher: every cycle starts a fresh
    /// duration timer and an empty batch; an empty batch triggers no
    /// transport call. Batches ship strictly in assembly order.
    pub async fn run(mut self) {
        debug!("writer {} batch loop started", self.name);
        loop {
            let deadline = Instant::now() + self.max_batch_duration;
            let (batch, outcome) = fill_batch(
                &mut self.rx,
                self.max_batch_length,
                deadline,
                &self.cancel_token,
            )
            .await;
            if !batch.is_empty() {
                self.stats.add_events(batch.len() as u64);
                self.ship(batch).await;
            }
            match outcome {
                FillOutcome::Cancelled => {
                    self.drain().await;
                    break;
                }
                FillOutcome::Closed => break,
                FillOutcome::Full | FillOutcome::Deadline => {}
            }
        }
        debug!("writer {} batch loop stopped", self.name);
    }

    /// Ships whatever is already queued at shutdown, in max-length chunks.
    async fn drain(&mut self) {
        loop {
            let mut batch = Batch::new();
            while batch.len() < self.max_batch_length {
                match self.rx.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(_) => break,
                }
            }
            if batch.is_empty() {
                return;
            }
            self.stats.add_events(batch.len() as u64);
            self.ship(batch).await;
        }
    }

    /// Encodes and POSTs one batch. The batch is dropped afterwards no
    /// matter the outcome; failures only move the counters.
    async fn ship(&self, batch: Batch) {
        let body = match self.encoder.encode(&batch) {
            Ok(body) => body,
            Err(e) => {
                error!("writer {}: failed to encode batch: {e}", self.name);
                self.stats.incr_requests_failed();
                return;
            }
        };
        let result = self
            .client
            .post(self.url.clone())
            .headers(self.encoder.headers().clone())
            .body(body)
            .send()
            .await;
        // TODO retry transient failures with backoff instead of dropping the batch
        match result {
            Ok(resp) if resp.status() == StatusCode::NO_CONTENT => self.stats.incr_requests_ok(),
            Ok(resp) => {
                error!(
                    "writer {}: unexpected status {} from {}{}",
                    self.name,
                    resp.status(),
                    self.url.host_str().unwrap_or(""),
                    self.url.path()
                );
                self.stats.incr_requests_failed();
            }
            Err(e) => {
                error!(
                    "writer {}: error sending request to {}{}: {e}",
                    self.name,
                    self.url.host_str().unwrap_or(""),
                    self.url.path()
                );
                self.stats.incr_requests_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(i: usize) -> MetricEvent {
        MetricEvent {
            name: format!("m{i}"),
            ..Default::default()
        }
    }

    #[test]
    fn config_defaults_apply() {
        let cfg: WriterConfig =
            serde_yaml::from_str("url: http://127.0.0.1:8480/write").unwrap();
        assert_eq!(cfg.format, WireFormat::RemoteWrite);
        assert_eq!(cfg.timeout_secs, 10);
        assert_eq!(cfg.max_batch_duration_secs, 3);
        assert_eq!(cfg.max_batch_length, 1000);
        assert!(cfg.host_label_file.is_none());
        assert_eq!(cfg.host_label_refresh_secs, 60);
    }

    #[test]
    fn instance_name_is_stable_and_distinct_per_index() {
        let url = Url::parse("http://victoria.example.com:8480/write").unwrap();
        let a = instance_name(&url, 0);
        let b = instance_name(&url, 0);
        let c = instance_name(&url, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("victoria.example.com_8480_"));
    }

    #[tokio::test]
    async fn invalid_url_is_fatal() {
        let cfg: WriterConfig = serde_yaml::from_str("url: '::not a url::'").unwrap();
        // the Ok side carries no Debug impl, so take the error out directly
        let err = Writer::new(0, cfg, CancellationToken::new()).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidUrl(_, _)));
    }

    #[tokio::test]
    async fn zero_config_values_fall_back_to_defaults() {
        // an explicit zero must not leave the batch loop with a zero-length
        // target, which would make every fill return empty without awaiting
        let cfg: WriterConfig = serde_yaml::from_str(concat!(
            "url: http://127.0.0.1:8480/write\n",
            "timeout_secs: 0\n",
            "max_batch_duration_secs: 0\n",
            "max_batch_length: 0\n",
        ))
        .unwrap();
        let (service, _writer) = Writer::new(0, cfg, CancellationToken::new()).ok().unwrap();
        assert_eq!(service.max_batch_length, 1000);
        assert_eq!(service.max_batch_duration, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_splits_into_count_bounded_batches() {
        let (tx, mut rx) = mpsc::channel(4096);
        for i in 0..2500 {
            tx.send(event(i)).await.unwrap();
        }
        let cancel = CancellationToken::new();
        let far = Instant::now() + Duration::from_secs(3);

        let (batch, outcome) = fill_batch(&mut rx, 1000, far, &cancel).await;
        assert_eq!((batch.len(), outcome), (1000, FillOutcome::Full));
        let (batch, outcome) = fill_batch(&mut rx, 1000, far, &cancel).await;
        assert_eq!((batch.len(), outcome), (1000, FillOutcome::Full));
        // the remainder waits for its duration timer
        let (batch, outcome) = fill_batch(&mut rx, 1000, far, &cancel).await;
        assert_eq!((batch.len(), outcome), (500, FillOutcome::Deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_input_ships_on_duration_timer() {
        let (tx, mut rx) = mpsc::channel(64);
        for i in 0..10 {
            tx.send(event(i)).await.unwrap();
        }
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + Duration::from_secs(3);
        let (batch, outcome) = fill_batch(&mut rx, 1000, deadline, &cancel).await;
        assert_eq!((batch.len(), outcome), (10, FillOutcome::Deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_cycle_yields_empty_batch() {
        let (_tx, mut rx) = mpsc::channel::<MetricEvent>(64);
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + Duration::from_secs(3);
        let (batch, outcome) = fill_batch(&mut rx, 1000, deadline, &cancel).await;
        assert!(batch.is_empty());
        assert_eq!(outcome, FillOutcome::Deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_partial_batch() {
        let (tx, mut rx) = mpsc::channel(64);
        for i in 0..7 {
            tx.send(event(i)).await.unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        let deadline = Instant::now() + Duration::from_secs(3);
        let (batch, outcome) = fill_batch(&mut rx, 1000, deadline, &cancel).await;
        // events already buffered are picked up before the cancel arm wins
        assert!(outcome == FillOutcome::Cancelled || outcome == FillOutcome::Full);
        assert!(batch.len() <= 7);
    }
}
