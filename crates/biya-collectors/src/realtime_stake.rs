use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use biya_common::error::Result;
use biya_metrics::{ExporterMetrics, catalog};
use chrono::{SecondsFormat, TimeDelta, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    job::{Collector, unless_cancelled},
    stake::{STATUS_BONDED, StakeClient, Validator},
    upstream::field_number,
};

const SOURCE_VALIDATORS: &str = "stake_validators";
const SOURCE_STATISTICS: &str = "stake_statistics";
const SOURCE_SLASHING: &str = "stake_slashing_events";
const SOURCE_GOVERNANCE: &str = "stake_governance_statistics";

/// Validator set, staking totals, slashing and governance figures from the
/// staking API.
///
/// The run always succeeds: an unreachable API reports `source_up = 0` and
/// zeroes the headline values instead of failing the job.
pub struct RealtimeStakeCollector {
    metrics: Arc<ExporterMetrics>,
    stake: StakeClient,
}

impl RealtimeStakeCollector {
    pub fn new(metrics: Arc<ExporterMetrics>, stake: StakeClient) -> Self {
        Self { metrics, stake }
    }

    fn write_validators(&self, validators: &[Validator]) {
        let total = validators.len() as f64;
        let jailed = validators.iter().filter(|v| v.jailed).count() as f64;
        let bonded = validators.iter().filter(|v| v.status == STATUS_BONDED).count() as f64;

        self.metrics.set_chain_gauge(catalog::STAKE_VALIDATORS_TOTAL, total);
        self.metrics.set_chain_gauge(catalog::STAKE_VALIDATORS_BONDED, bonded);
        self.metrics.set_chain_gauge(catalog::STAKE_VALIDATORS_JAILED, jailed);
        self.metrics.set_gauge(catalog::VALIDATORS_TOTAL, &[], total);
        // Every validator the API lists counts as active.
        self.metrics.set_gauge(catalog::VALIDATORS_ACTIVE, &[], total);
        self.metrics.set_gauge(catalog::VALIDATORS_JAILED, &[], jailed);

        let uptimes: Vec<f64> = validators
            .iter()
            .map(|v| v.uptime_percentage)
            .filter(|uptime| *uptime > 0.0)
            .collect();
        if !uptimes.is_empty() {
            let average = uptimes.iter().sum::<f64>() / uptimes.len() as f64;
            self.metrics
                .set_chain_gauge(catalog::STAKE_VALIDATORS_UPTIME_PERCENTAGE_AVG, average);
        }

        for validator in validators {
            let labels = [
                ("address", validator.operator_address.as_str()),
                ("moniker", validator.moniker.as_str()),
            ];
            let status = if validator.jailed {
                -1.0
            } else if validator.status == STATUS_BONDED {
                1.0
            } else {
                0.0
            };
            self.metrics.set_gauge(catalog::VALIDATOR_STATUS, &labels, status);
            self.metrics.set_gauge(
                catalog::VALIDATOR_JAILED,
                &labels,
                if validator.jailed { 1.0 } else { 0.0 },
            );
            self.metrics.set_gauge(
                catalog::VALIDATOR_UPTIME_RATIO,
                &labels,
                validator.uptime_percentage.max(0.0) / 100.0,
            );
        }
    }

    fn write_zero(&self, metrics: &[&str]) {
        for metric in metrics {
            self.metrics.set_gauge(metric, &[], 0.0);
        }
    }

    /// Writes the first of `keys` that `data` carries as a number.
    fn write_field(&self, metric: &str, data: &Value, keys: &[&str]) {
        if let Some(value) = field_number(data, keys) {
            self.metrics.set_gauge(metric, &[], value);
        }
    }

    async fn read_statistics(&self, cancel: &CancellationToken) -> Result<()> {
        let data = match unless_cancelled(cancel, self.stake.statistics()).await? {
            Ok(data) => data,
            Err(err) => {
                warn!(source = SOURCE_STATISTICS, error = %err, "stake statistics unavailable");
                self.metrics.set_source_up(SOURCE_STATISTICS, false);
                self.write_zero(&[
                    catalog::STAKED_TOTAL_BYB,
                    catalog::REWARDS_24H_TOTAL_BYB,
                    catalog::APR_ANNUAL,
                ]);
                return Ok(());
            }
        };
        self.metrics.set_source_up(SOURCE_STATISTICS, true);

        self.write_field(
            catalog::STAKED_TOTAL_BYB,
            &data,
            &["totalStakedByb", "totalStaked", "stakedTotal"],
        );
        self.write_field(
            catalog::REWARDS_24H_TOTAL_BYB,
            &data,
            &["rewards24hByb", "rewards24hTotal", "rewards24h"],
        );
        self.write_field(catalog::APR_ANNUAL, &data, &["aprAnnual", "annualApr", "apr"]);
        self.write_field(catalog::STAKED_RATIO, &data, &["stakingRatio", "stakedRatio"]);
        Ok(())
    }

    async fn read_slashing_events(&self, cancel: &CancellationToken) -> Result<()> {
        let end = Utc::now();
        let start = end - TimeDelta::hours(24);
        let start_ts = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_ts = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let request = self.stake.slashing_events(&start_ts, &end_ts);
        let data = match unless_cancelled(cancel, request).await? {
            Ok(data) => data,
            Err(err) => {
                warn!(source = SOURCE_SLASHING, error = %err, "slashing events unavailable");
                self.metrics.set_source_up(SOURCE_SLASHING, false);
                self.write_zero(&[catalog::SLASHING_EVENTS_24H]);
                return Ok(());
            }
        };
        self.metrics.set_source_up(SOURCE_SLASHING, true);

        let events = ["events", "data"]
            .iter()
            .filter_map(|key| data.get(key).and_then(Value::as_array))
            .find(|events| !events.is_empty())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();
        for event in events {
            if let Some(kind) = event.get("type").and_then(Value::as_str).filter(|kind| !kind.is_empty()) {
                *by_type.entry(kind).or_default() += 1;
            }
        }

        // A positive count/total reported by the API wins over the page length.
        let count = field_number(&data, &["count"])
            .filter(|count| *count > 0.0)
            .or_else(|| field_number(&data, &["total"]).filter(|total| *total > 0.0))
            .unwrap_or(events.len() as f64);
        self.metrics.set_gauge(catalog::SLASHING_EVENTS_24H, &[], count);
        for (kind, seen) in by_type {
            self.metrics
                .set_gauge(catalog::SLASHING_EVENTS_TOTAL, &[("type", kind)], seen as f64);
        }
        Ok(())
    }

    async fn read_governance_statistics(&self, cancel: &CancellationToken) -> Result<()> {
        let data = match unless_cancelled(cancel, self.stake.governance_statistics()).await? {
            Ok(data) => data,
            Err(err) => {
                warn!(source = SOURCE_GOVERNANCE, error = %err, "governance statistics unavailable");
                self.metrics.set_source_up(SOURCE_GOVERNANCE, false);
                self.write_zero(&[catalog::VOTING_POWER_TOTAL, catalog::PARTICIPATION_RATE_AVG]);
                return Ok(());
            }
        };
        self.metrics.set_source_up(SOURCE_GOVERNANCE, true);

        self.write_field(
            catalog::VOTING_POWER_TOTAL,
            &data,
            &["votingPowerTotal", "totalVotingPower"],
        );
        self.write_field(
            catalog::PARTICIPATION_RATE_AVG,
            &data,
            &[
                "participationRateAvg",
                "avgParticipationRate",
                "averageParticipation",
                "participationRate",
            ],
        );
        Ok(())
    }
}

#[async_trait]
impl Collector for RealtimeStakeCollector {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()> {
        let page = match unless_cancelled(cancel, self.stake.validators()).await? {
            Ok(page) => page,
            Err(err) => {
                warn!(source = SOURCE_VALIDATORS, error = %err, "stake validators unavailable");
                self.metrics.set_source_up(SOURCE_VALIDATORS, false);
                self.write_zero(&[
                    catalog::VALIDATORS_TOTAL,
                    catalog::VALIDATORS_ACTIVE,
                    catalog::VALIDATORS_JAILED,
                ]);
                return Ok(());
            }
        };
        self.metrics.set_source_up(SOURCE_VALIDATORS, true);
        self.write_validators(&page.validators);

        self.read_statistics(cancel).await?;
        self.read_slashing_events(cancel).await?;
        self.read_governance_statistics(cancel).await
    }
}
