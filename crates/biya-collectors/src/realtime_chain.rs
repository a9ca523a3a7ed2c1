use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use biya_common::{
    config::MockConfig,
    error::{ExporterError, Result},
};
use biya_metrics::{ExporterMetrics, catalog};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    job::{Collector, unless_cancelled},
    tendermint::TendermintClient,
};

const SOURCE_STATUS: &str = "tendermint_status";
const NODE: &str = "default";

/// Smoothing factor of the block time moving average.
const BLOCK_TIME_ALPHA: f64 = 0.3;
/// Averages above this are treated as bogus and reported as 0.
const BLOCK_TIME_CEILING_SECONDS: f64 = 3600.0;

/// Head height, sync state and block time from the node `/status` endpoint.
pub struct RealtimeChainCollector {
    metrics: Arc<ExporterMetrics>,
    tendermint: TendermintClient,
    mock: MockConfig,
    block_time: Mutex<BlockTimeTracker>,
}

impl RealtimeChainCollector {
    pub fn new(metrics: Arc<ExporterMetrics>, tendermint: TendermintClient, mock: MockConfig) -> Self {
        Self {
            metrics,
            tendermint,
            mock,
            block_time: Mutex::new(BlockTimeTracker::default()),
        }
    }

    fn write_confirm_time(&self, seconds: f64) {
        self.metrics
            .set_chain_gauge(catalog::CHAIN_TX_CONFIRM_TIME_SECONDS_AVG, seconds);
        self.metrics
            .set_gauge(catalog::TX_CONFIRM_TIME_AVG_SECONDS, &[], seconds);
        self.metrics.observe_histogram(
            catalog::TX_CONFIRM_TIME_SECONDS,
            &[],
            catalog::TX_CONFIRM_TIME_BUCKETS,
            seconds,
        );
    }
}

#[async_trait]
impl Collector for RealtimeChainCollector {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()> {
        let status = unless_cancelled(cancel, self.tendermint.status()).await?;
        self.metrics.set_source_up(SOURCE_STATUS, status.is_ok());
        let sync_info = status?.result.sync_info;

        let height: i64 = sync_info.latest_block_height.trim().parse().map_err(|err| {
            ExporterError::MalformedPayload(format!(
                "latest_block_height {:?}: {err}",
                sync_info.latest_block_height
            ))
        })?;
        let height_value = height as f64;

        self.metrics
            .set_chain_gauge(catalog::CHAIN_HEAD_BLOCK_HEIGHT, height_value);
        self.metrics.set_gauge(catalog::BLOCK_HEIGHT, &[], height_value);
        // Height stands in for the produced block count.
        self.metrics.set_gauge(catalog::BLOCKS_TOTAL, &[], height_value);

        let node = [("node", NODE)];
        self.metrics.set_chain_gauge(
            catalog::CHAIN_NODE_CATCHING_UP,
            if sync_info.catching_up { 1.0 } else { 0.0 },
        );
        self.metrics.set_gauge(
            catalog::NODE_SYNC_STATUS,
            &node,
            if sync_info.catching_up { 0.0 } else { 1.0 },
        );
        self.metrics.set_gauge(catalog::NODE_SYNC_HEIGHT, &node, height_value);
        self.metrics.set_gauge(catalog::NODE_BEHIND_BLOCKS, &node, 0.0);

        let average = self
            .block_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(height, sync_info.latest_block_time);
        if average > 0.0 {
            self.metrics
                .set_chain_gauge(catalog::CHAIN_BLOCK_TIME_SECONDS_AVG, average);
            self.metrics.set_gauge(catalog::BLOCK_TIME_SECONDS, &[], average);
            // Under BFT finality a transaction confirms with its block.
            self.write_confirm_time(average);
        } else if self.mock.enabled {
            self.write_confirm_time(self.mock.values.tx_confirm_time_seconds);
        }

        if self.mock.enabled {
            let values = &self.mock.values;
            self.metrics.set_chain_gauge(
                catalog::CHAIN_BLOCK_GAS_UTILIZATION_RATIO_AVG,
                values.gas_utilization_ratio,
            );
            self.metrics
                .set_chain_gauge(catalog::CHAIN_CONGESTION_RATIO, values.congestion_ratio);
            self.metrics
                .set_gauge(catalog::GAS_UTILIZATION, &[], values.gas_utilization_ratio);
        }

        Ok(())
    }
}

/// Exponential moving average of seconds per block across successive
/// `(height, time)` observations.
#[derive(Debug, Default)]
struct BlockTimeTracker {
    last_height: i64,
    last_time: Option<DateTime<Utc>>,
    average: f64,
}

impl BlockTimeTracker {
    fn update(&mut self, height: i64, time: Option<DateTime<Utc>>) -> f64 {
        let Some(time) = time else {
            return self.reported();
        };

        let Some(last_time) = self.last_time.filter(|_| self.last_height > 0) else {
            self.last_height = height;
            self.last_time = Some(time);
            return self.reported();
        };

        let blocks = height - self.last_height;
        if blocks <= 0 {
            return self.reported();
        }
        let elapsed = (time - last_time).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return self.reported();
        }

        let sample = elapsed / blocks as f64;
        self.average = if self.average <= 0.0 {
            sample
        } else {
            BLOCK_TIME_ALPHA * sample + (1.0 - BLOCK_TIME_ALPHA) * self.average
        };
        self.last_height = height;
        self.last_time = Some(time);
        self.reported()
    }

    fn reported(&self) -> f64 {
        if self.average > BLOCK_TIME_CEILING_SECONDS {
            0.0
        } else {
            self.average
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
    use biya_common::config::MockConfig;
    use biya_metrics::{BuildInfo, ExporterMetrics};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::{BlockTimeTracker, RealtimeChainCollector};
    use crate::{job::Collector, tendermint::TendermintClient, test_support::serve, upstream::http_client};

    fn at(seconds: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(1_735_689_600 + seconds, 0).unwrap())
    }

    fn collector(base_url: &str, mock: MockConfig) -> (Arc<ExporterMetrics>, RealtimeChainCollector) {
        let metrics = Arc::new(ExporterMetrics::new("biya", &BuildInfo::new("test", "none")));
        let tendermint = TendermintClient::new(base_url, http_client(Duration::from_secs(2)).unwrap());
        let collector = RealtimeChainCollector::new(Arc::clone(&metrics), tendermint, mock);
        (metrics, collector)
    }

    fn disabled_mock() -> MockConfig {
        MockConfig {
            enabled: false,
            ..MockConfig::default()
        }
    }

    #[test]
    fn first_observation_is_only_a_baseline() {
        let mut tracker = BlockTimeTracker::default();
        assert_eq!(tracker.update(100, at(0)), 0.0);
        assert_eq!(tracker.update(110, at(50)), 5.0);
    }

    #[test]
    fn average_is_smoothed() {
        let mut tracker = BlockTimeTracker::default();
        tracker.update(100, at(0));
        tracker.update(110, at(50));
        let smoothed = tracker.update(120, at(70));
        assert!((smoothed - 4.1).abs() < 1e-9);
    }

    #[test]
    fn stalled_or_rewound_heights_keep_previous_average() {
        let mut tracker = BlockTimeTracker::default();
        tracker.update(100, at(0));
        tracker.update(110, at(50));
        assert_eq!(tracker.update(110, at(80)), 5.0);
        assert_eq!(tracker.update(105, at(90)), 5.0);
        assert_eq!(tracker.update(111, at(40)), 5.0);
        assert_eq!(tracker.update(112, None), 5.0);
    }

    #[test]
    fn absurd_block_times_are_reported_as_zero() {
        let mut tracker = BlockTimeTracker::default();
        tracker.update(1, at(0));
        assert_eq!(tracker.update(2, at(7200)), 0.0);
    }

    #[tokio::test]
    async fn status_is_translated_into_chain_metrics() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/status",
                get(|State(calls): State<Arc<AtomicUsize>>| async move {
                    let (height, time) = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        ("100", "2025-01-01T00:00:00Z")
                    } else {
                        ("110", "2025-01-01T00:00:50Z")
                    };
                    Json(json!({
                        "result": {
                            "sync_info": {
                                "latest_block_height": height,
                                "latest_block_time": time,
                                "catching_up": false
                            }
                        }
                    }))
                }),
            )
            .with_state(calls);
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url, disabled_mock());

        collector.collect(&CancellationToken::new()).await.unwrap();
        let output = metrics.render_text();
        assert!(output.contains("biya_chain_head_block_height{chain_id=\"biya\"} 100\n"));
        assert!(output.contains("\nbiya_block_height 100\n"));
        assert!(output.contains("\nbiya_blocks_total 100\n"));
        assert!(output.contains("biya_chain_node_catching_up{chain_id=\"biya\"} 0\n"));
        assert!(output.contains("biya_node_sync_status{node=\"default\"} 1\n"));
        assert!(output.contains("biya_node_sync_height{node=\"default\"} 100\n"));
        assert!(output.contains("biya_exporter_source_up{source=\"tendermint_status\"} 1\n"));
        assert!(!output.contains("biya_chain_block_time_seconds_avg{"));

        collector.collect(&CancellationToken::new()).await.unwrap();
        let output = metrics.render_text();
        assert!(output.contains("biya_chain_block_time_seconds_avg{chain_id=\"biya\"} 5\n"));
        assert!(output.contains("\nbiya_block_time_seconds 5\n"));
        assert!(output.contains("\nbiya_tx_confirm_time_avg_seconds 5\n"));
        assert!(output.contains("biya_tx_confirm_time_seconds_bucket{le=\"5\"} 1\n"));
        assert!(output.contains("\nbiya_tx_confirm_time_seconds_count 1\n"));
    }

    #[tokio::test]
    async fn mock_values_fill_gaps_before_an_average_exists() {
        let router = Router::new().route(
            "/status",
            get(|| async {
                Json(json!({
                    "result": {
                        "sync_info": {
                            "latest_block_height": "7",
                            "latest_block_time": "2025-01-01T00:00:00Z",
                            "catching_up": true
                        }
                    }
                }))
            }),
        );
        let base_url = serve(router).await;
        let mut mock = MockConfig::default();
        mock.values.tx_confirm_time_seconds = 2.5;
        mock.values.gas_utilization_ratio = 0.42;
        mock.values.congestion_ratio = 0.1;
        let (metrics, collector) = collector(&base_url, mock);

        collector.collect(&CancellationToken::new()).await.unwrap();
        let output = metrics.render_text();
        assert!(output.contains("biya_chain_node_catching_up{chain_id=\"biya\"} 1\n"));
        assert!(output.contains("biya_node_sync_status{node=\"default\"} 0\n"));
        assert!(output.contains("biya_chain_tx_confirm_time_seconds_avg{chain_id=\"biya\"} 2.5\n"));
        assert!(output.contains("biya_tx_confirm_time_seconds_bucket{le=\"3\"} 1\n"));
        assert!(output.contains("biya_chain_block_gas_utilization_ratio_avg{chain_id=\"biya\"} 0.42\n"));
        assert!(output.contains("biya_chain_congestion_ratio{chain_id=\"biya\"} 0.1\n"));
        assert!(output.contains("\nbiya_gas_utilization 0.42\n"));
    }

    #[tokio::test]
    async fn unreachable_status_fails_the_run() {
        let router = Router::new().route("/status", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url, MockConfig::default());

        assert!(collector.collect(&CancellationToken::new()).await.is_err());
        assert!(metrics
            .render_text()
            .contains("biya_exporter_source_up{source=\"tendermint_status\"} 0\n"));
    }

    #[tokio::test]
    async fn unparsable_height_fails_the_run() {
        let router = Router::new().route(
            "/status",
            get(|| async { Json(json!({"result": {"sync_info": {"latest_block_height": "n/a"}}})) }),
        );
        let base_url = serve(router).await;
        let (_metrics, collector) = collector(&base_url, disabled_mock());

        assert!(collector.collect(&CancellationToken::new()).await.is_err());
    }
}
