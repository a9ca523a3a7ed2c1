use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use biya_common::{
    config::{DEFAULT_MEMPOOL_CAPACITY, MockConfig},
    error::Result,
};
use biya_metrics::{ExporterMetrics, catalog};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    job::{Collector, unless_cancelled},
    tendermint::TendermintClient,
    upstream::parse_number,
};

const SOURCE_MEMPOOL: &str = "tendermint_mempool";
const SOURCE_STATUS: &str = "tendermint_status_for_tps";
const SOURCE_BLOCK: &str = "tendermint_block";

const TPS_WINDOW: Duration = Duration::from_secs(60);

/// Mempool pressure and an approximate TPS sampled once a minute.
///
/// Upstream failures never fail the run. With mock enabled they fall back
/// to the configured mock values, otherwise the metric is left untouched.
pub struct MinuteChainCollector {
    metrics: Arc<ExporterMetrics>,
    tendermint: TendermintClient,
    mock: MockConfig,
    mempool_capacity: i64,
    tps: Mutex<TpsWindow>,
}

impl MinuteChainCollector {
    pub fn new(
        metrics: Arc<ExporterMetrics>,
        tendermint: TendermintClient,
        mock: MockConfig,
        mempool_capacity: i64,
    ) -> Self {
        let mempool_capacity = if mempool_capacity <= 0 {
            DEFAULT_MEMPOOL_CAPACITY
        } else {
            mempool_capacity
        };

        Self {
            metrics,
            tendermint,
            mock,
            mempool_capacity,
            tps: Mutex::new(TpsWindow::new(TPS_WINDOW)),
        }
    }

    /// Falls back to `mock` when enabled, logging the upstream failure.
    fn fallback(&self, source: &str, err: &dyn std::fmt::Display, mock: f64) -> Option<f64> {
        self.metrics.set_source_up(source, false);
        if !self.mock.enabled {
            return None;
        }
        warn!(source, error = %err, "upstream unavailable, using mock value");
        Some(mock)
    }

    async fn mempool_pending(&self, cancel: &CancellationToken) -> Result<Option<f64>> {
        let response = match unless_cancelled(cancel, self.tendermint.num_unconfirmed_txs()).await? {
            Ok(response) => response,
            Err(err) => {
                return Ok(self.fallback(SOURCE_MEMPOOL, &err, self.mock.values.mempool_pending_txs));
            }
        };
        self.metrics.set_source_up(SOURCE_MEMPOOL, true);

        match parse_number("num_unconfirmed_txs.total", &response.result.total) {
            Ok(pending) => Ok(Some(pending)),
            Err(err) => {
                warn!(source = SOURCE_MEMPOOL, error = %err, "skip mempool size");
                Ok(None)
            }
        }
    }

    async fn tps_window(&self, cancel: &CancellationToken) -> Result<Option<f64>> {
        let status = match unless_cancelled(cancel, self.tendermint.status()).await? {
            Ok(status) => status,
            Err(err) => return Ok(self.fallback(SOURCE_STATUS, &err, self.mock.values.tps_window)),
        };
        self.metrics.set_source_up(SOURCE_STATUS, true);

        let raw_height = status.result.sync_info.latest_block_height;
        let height: i64 = match raw_height.trim().parse() {
            Ok(height) => height,
            Err(err) => {
                warn!(source = SOURCE_STATUS, height = %raw_height, error = %err, "skip tps sample");
                return Ok(None);
            }
        };

        let block = match unless_cancelled(cancel, self.tendermint.block(height)).await? {
            Ok(block) => block,
            Err(err) => return Ok(self.fallback(SOURCE_BLOCK, &err, self.mock.values.tps_window)),
        };
        self.metrics.set_source_up(SOURCE_BLOCK, true);

        let tps = self
            .tps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(Instant::now(), block.tx_count());
        Ok(Some(tps))
    }
}

#[async_trait]
impl Collector for MinuteChainCollector {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()> {
        let capacity = self.mempool_capacity as f64;
        self.metrics.set_gauge(catalog::MEMPOOL_CAPACITY, &[], capacity);

        if let Some(pending) = self.mempool_pending(cancel).await? {
            self.metrics
                .set_chain_gauge(catalog::CHAIN_MEMPOOL_PENDING_TXS, pending);
            self.metrics.set_gauge(catalog::MEMPOOL_SIZE, &[], pending);
            self.metrics
                .set_gauge(catalog::CONGESTION_RATIO, &[], pending / capacity);
        }

        if let Some(tps) = self.tps_window(cancel).await? {
            self.metrics.set_chain_gauge(catalog::CHAIN_TPS_WINDOW, tps);
        }

        Ok(())
    }
}

/// Sliding window of `(instant, tx count)` samples.
#[derive(Debug)]
struct TpsWindow {
    width: Duration,
    samples: VecDeque<(Instant, usize)>,
}

impl TpsWindow {
    fn new(width: Duration) -> Self {
        Self {
            width,
            samples: VecDeque::new(),
        }
    }

    /// Adds a sample, evicts those older than the window and returns the
    /// transactions per second across what remains.
    fn record(&mut self, now: Instant, tx_count: usize) -> f64 {
        self.samples.push_back((now, tx_count));
        if let Some(cutoff) = now.checked_sub(self.width) {
            while self.samples.front().is_some_and(|(at, _)| *at < cutoff) {
                self.samples.pop_front();
            }
        }

        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let span = last.duration_since(*first).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }

        let total: usize = self.samples.iter().map(|(_, count)| count).sum();
        total as f64 / span
    }
}
