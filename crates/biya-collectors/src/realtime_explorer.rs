use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use biya_common::{config::MockConfig, error::Result};
use biya_metrics::{ExporterMetrics, catalog};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    explorer::ExplorerClient,
    job::{Collector, unless_cancelled},
    upstream::{field_number, find_number},
};

const SOURCE_LATEST_BLOCKS: &str = "explorer_latest_blocks";
const SOURCE_TX_STATS: &str = "explorer_transaction_stats";
const SOURCE_GAS: &str = "explorer_gas_utilization";
const SOURCE_FAILED_TXS: &str = "explorer_failed_transactions_24h";

/// Transaction, gas and head-block figures from the block explorer API.
///
/// Explorer outages never fail the run; the node collectors keep the
/// chain-level series alive in the meantime.
pub struct RealtimeExplorerCollector {
    metrics: Arc<ExporterMetrics>,
    explorer: ExplorerClient,
    mock: MockConfig,
}

impl RealtimeExplorerCollector {
    pub fn new(metrics: Arc<ExporterMetrics>, explorer: ExplorerClient, mock: MockConfig) -> Self {
        Self {
            metrics,
            explorer,
            mock,
        }
    }

    /// Awaits one explorer call and records its `source_up`. `None` means the
    /// call failed and was logged.
    async fn read(
        &self,
        cancel: &CancellationToken,
        source: &str,
        request: impl Future<Output = Result<Value>>,
    ) -> Result<Option<Value>> {
        let outcome = unless_cancelled(cancel, request).await?;
        self.metrics.set_source_up(source, outcome.is_ok());
        match outcome {
            Ok(data) => Ok(Some(data)),
            Err(err) => {
                warn!(source, error = %err, "explorer endpoint unavailable");
                Ok(None)
            }
        }
    }

    fn write(&self, metric: &str, value: Option<f64>) {
        if let Some(value) = value {
            self.metrics.set_gauge(metric, &[], value);
        }
    }
}

#[async_trait]
impl Collector for RealtimeExplorerCollector {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()> {
        let blocks = self
            .read(cancel, SOURCE_LATEST_BLOCKS, self.explorer.latest_blocks())
            .await?;
        if let Some(data) = blocks {
            self.write(
                catalog::BLOCK_HEIGHT,
                find_number(&data, &["height", "latestBlockHeight", "blockHeight"]),
            );
        }

        let stats = self
            .read(cancel, SOURCE_TX_STATS, self.explorer.transaction_stats())
            .await?;
        if let Some(data) = stats {
            self.write(catalog::TX_24H_TOTAL, field_number(&data, &["count_24h", "count24h"]));
            self.write(catalog::TPS_CURRENT, field_number(&data, &["tps"]));
            self.write(
                catalog::BLOCK_TIME_SECONDS,
                field_number(&data, &["avg_block_time", "avgBlockTime"]),
            );
            self.write(
                catalog::ACTIVE_ADDRESSES_24H,
                field_number(&data, &["active_addresses_24h", "activeAddresses24h"]),
            );
        }

        let gas = self
            .read(cancel, SOURCE_GAS, self.explorer.gas_utilization())
            .await?;
        let utilization = gas.as_ref().and_then(|data| {
            field_number(data, &["gas_utilization", "gasUtilization", "utilization"])
        });
        if let Some(data) = &gas {
            self.write(catalog::GAS_PRICE, field_number(data, &["gas_price", "gasPrice"]));
        }
        match utilization {
            Some(ratio) => self.write(catalog::GAS_UTILIZATION, Some(ratio)),
            None if self.mock.enabled => self.write(
                catalog::GAS_UTILIZATION,
                Some(self.mock.values.gas_utilization_ratio),
            ),
            None => {}
        }

        let failed = self
            .read(cancel, SOURCE_FAILED_TXS, self.explorer.failed_transactions_24h())
            .await?;
        let failed_total = match failed {
            Some(data) => Some(find_number(&data, &["total", "count", "failedTotal"]).unwrap_or(0.0)),
            None if self.mock.enabled => Some(0.0),
            None => None,
        };
        self.write(catalog::TX_FAILED_24H_TOTAL, failed_total);

        Ok(())
    }
}
