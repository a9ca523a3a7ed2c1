use std::sync::Arc;

use async_trait::async_trait;
use biya_common::error::Result;
use biya_metrics::{ExporterMetrics, catalog};
use tokio_util::sync::CancellationToken;

use crate::{
    job::{Collector, unless_cancelled},
    lcd::LcdClient,
    upstream::parse_number,
};

const SOURCE_STAKING_POOL: &str = "lcd_staking_pool";

/// Slow-moving staking totals from the LCD staking pool.
pub struct HourlyChainCollector {
    metrics: Arc<ExporterMetrics>,
    lcd: LcdClient,
}

impl HourlyChainCollector {
    pub fn new(metrics: Arc<ExporterMetrics>, lcd: LcdClient) -> Self {
        Self { metrics, lcd }
    }
}

#[async_trait]
impl Collector for HourlyChainCollector {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()> {
        let pool = unless_cancelled(cancel, self.lcd.staking_pool()).await?;
        self.metrics.set_source_up(SOURCE_STAKING_POOL, pool.is_ok());

        let bonded = parse_number("pool.bonded_tokens", &pool?.pool.bonded_tokens)?;
        self.metrics.set_chain_gauge(catalog::STAKE_BONDED_TOKENS, bonded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{Json, Router, http::StatusCode, routing::get};
    use biya_common::error::ExporterError;
    use biya_metrics::{BuildInfo, ExporterMetrics};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::HourlyChainCollector;
    use crate::{job::Collector, lcd::LcdClient, test_support::serve, upstream::http_client};

    fn collector(base_url: &str) -> (Arc<ExporterMetrics>, HourlyChainCollector) {
        let metrics = Arc::new(ExporterMetrics::new("biya", &BuildInfo::new("test", "none")));
        let lcd = LcdClient::new(base_url, http_client(Duration::from_secs(2)).unwrap());
        (Arc::clone(&metrics), HourlyChainCollector::new(metrics, lcd))
    }

    #[tokio::test]
    async fn bonded_tokens_are_published() {
        let router = Router::new().route(
            "/cosmos/staking/v1beta1/pool",
            get(|| async { Json(json!({"pool": {"bonded_tokens": "123456789", "not_bonded_tokens": "0"}})) }),
        );
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url);

        collector.collect(&CancellationToken::new()).await.unwrap();
        let output = metrics.render_text();
        assert!(output.contains("biya_stake_bonded_tokens{chain_id=\"biya\"} 123456789\n"));
        assert!(output.contains("biya_exporter_source_up{source=\"lcd_staking_pool\"} 1\n"));
    }

    #[tokio::test]
    async fn upstream_failure_fails_the_run() {
        let router = Router::new().route(
            "/cosmos/staking/v1beta1/pool",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url);

        let err = collector.collect(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExporterError::UpstreamStatus { status: 500, .. }));
        assert!(metrics
            .render_text()
            .contains("biya_exporter_source_up{source=\"lcd_staking_pool\"} 0\n"));
    }

    #[tokio::test]
    async fn shutdown_abandons_a_stalled_request() {
        let router = Router::new().route(
            "/cosmos/staking/v1beta1/pool",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                StatusCode::OK
            }),
        );
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url);
        let cancel = CancellationToken::new();

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move { collector.collect(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!run.is_finished());
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ExporterError::Cancelled));
        assert!(!metrics.render_text().contains("source=\"lcd_staking_pool\""));
    }

    #[tokio::test]
    async fn unparsable_amount_fails_the_run() {
        let router = Router::new().route(
            "/cosmos/staking/v1beta1/pool",
            get(|| async { Json(json!({"pool": {"bonded_tokens": "lots"}})) }),
        );
        let base_url = serve(router).await;
        let (metrics, collector) = collector(&base_url);

        let err = collector.collect(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), "payload");
        assert!(!metrics.render_text().contains("biya_stake_bonded_tokens{"));
    }
}
