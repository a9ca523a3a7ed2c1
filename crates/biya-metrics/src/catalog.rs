//! Static metric catalog of the exporter.
//!
//! Labels are kept low-cardinality: never put account addresses, transaction
//! hashes or contract ids into a label. Validator operator addresses are the
//! exception since the validator set is bounded.

use crate::{registry::Label, types::MetricType};

pub const SCRAPE_SUCCESS: &str = "biya_exporter_scrape_success";
pub const SCRAPE_DURATION_SECONDS: &str = "biya_exporter_scrape_duration_seconds";
pub const BUILD_INFO: &str = "biya_exporter_build_info";
pub const SOURCE_UP: &str = "biya_exporter_source_up";

pub const CHAIN_HEAD_BLOCK_HEIGHT: &str = "biya_chain_head_block_height";
pub const CHAIN_NODE_CATCHING_UP: &str = "biya_chain_node_catching_up";
pub const CHAIN_BLOCK_TIME_SECONDS_AVG: &str = "biya_chain_block_time_seconds_avg";
pub const CHAIN_TPS_WINDOW: &str = "biya_chain_tps_window";
pub const CHAIN_TX_CONFIRM_TIME_SECONDS_AVG: &str = "biya_chain_tx_confirm_time_seconds_avg";
pub const CHAIN_BLOCK_GAS_UTILIZATION_RATIO_AVG: &str = "biya_chain_block_gas_utilization_ratio_avg";
pub const CHAIN_MEMPOOL_PENDING_TXS: &str = "biya_chain_mempool_pending_txs";
pub const CHAIN_CONGESTION_RATIO: &str = "biya_chain_congestion_ratio";
pub const STAKE_BONDED_TOKENS: &str = "biya_stake_bonded_tokens";

pub const BLOCK_HEIGHT: &str = "biya_block_height";
pub const BLOCK_TIME_SECONDS: &str = "biya_block_time_seconds";
pub const BLOCKS_TOTAL: &str = "biya_blocks_total";
pub const TX_CONFIRM_TIME_SECONDS: &str = "biya_tx_confirm_time_seconds";
pub const TX_CONFIRM_TIME_AVG_SECONDS: &str = "biya_tx_confirm_time_avg_seconds";
pub const GAS_UTILIZATION: &str = "biya_gas_utilization";
pub const MEMPOOL_SIZE: &str = "biya_mempool_size";
pub const MEMPOOL_CAPACITY: &str = "biya_mempool_capacity";
pub const CONGESTION_RATIO: &str = "biya_congestion_ratio";
pub const NODE_SYNC_STATUS: &str = "biya_node_sync_status";
pub const NODE_SYNC_HEIGHT: &str = "biya_node_sync_height";
pub const NODE_BEHIND_BLOCKS: &str = "biya_node_behind_blocks";

pub const TX_24H_TOTAL: &str = "biya_tx_24h_total";
pub const TPS_CURRENT: &str = "biya_tps_current";
pub const TX_FAILED_24H_TOTAL: &str = "biya_tx_failed_24h_total";
pub const GAS_PRICE: &str = "biya_gas_price";
pub const ACTIVE_ADDRESSES_24H: &str = "biya_active_addresses_24h";

pub const STAKE_VALIDATORS_TOTAL: &str = "biya_stake_validators_total";
pub const STAKE_VALIDATORS_BONDED: &str = "biya_stake_validators_bonded";
pub const STAKE_VALIDATORS_JAILED: &str = "biya_stake_validators_jailed";
pub const STAKE_VALIDATORS_UPTIME_PERCENTAGE_AVG: &str = "biya_stake_validators_uptime_percentage_avg";
pub const VALIDATORS_TOTAL: &str = "biya_validators_total";
pub const VALIDATORS_ACTIVE: &str = "biya_validators_active";
pub const VALIDATORS_JAILED: &str = "biya_validators_jailed";
pub const STAKED_TOTAL_BYB: &str = "biya_staked_total_byb";
pub const STAKED_RATIO: &str = "biya_staked_ratio";
pub const REWARDS_24H_TOTAL_BYB: &str = "biya_rewards_24h_total_byb";
pub const APR_ANNUAL: &str = "biya_apr_annual";
pub const SLASHING_EVENTS_24H: &str = "biya_slashing_events_24h";
pub const SLASHING_EVENTS_TOTAL: &str = "biya_slashing_events_total";
pub const VALIDATOR_STATUS: &str = "biya_validator_status";
pub const VALIDATOR_JAILED: &str = "biya_validator_jailed";
pub const VALIDATOR_UPTIME_RATIO: &str = "biya_validator_uptime_ratio";
pub const VOTING_POWER_TOTAL: &str = "biya_voting_power_total";
pub const PARTICIPATION_RATE_AVG: &str = "biya_participation_rate_avg";

/// Collector run latency buckets, 5ms to 10s.
pub const SCRAPE_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Transaction confirmation time buckets in seconds.
pub const TX_CONFIRM_TIME_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub label_keys: &'static [&'static str],
}

const fn gauge(name: &'static str, help: &'static str, label_keys: &'static [&'static str]) -> MetricSpec {
    MetricSpec {
        name,
        metric_type: MetricType::Gauge,
        help,
        label_keys,
    }
}

const fn counter(name: &'static str, help: &'static str, label_keys: &'static [&'static str]) -> MetricSpec {
    MetricSpec {
        name,
        metric_type: MetricType::Counter,
        help,
        label_keys,
    }
}

const fn histogram(name: &'static str, help: &'static str, label_keys: &'static [&'static str]) -> MetricSpec {
    MetricSpec {
        name,
        metric_type: MetricType::Histogram,
        help,
        label_keys,
    }
}

const CHAIN_ID: &[&str] = &["chain_id"];
const SOURCE: &[&str] = &["source"];
const NODE: &[&str] = &["node"];
const VALIDATOR: &[&str] = &["address", "moniker"];
const NONE: &[&str] = &[];

pub const CATALOG: &[MetricSpec] = &[
    // chain node
    gauge(CHAIN_HEAD_BLOCK_HEIGHT, "Latest block height observed from the chain node.", CHAIN_ID),
    gauge(CHAIN_NODE_CATCHING_UP, "Whether the node is catching up (1) or fully synced (0).", CHAIN_ID),
    gauge(CHAIN_BLOCK_TIME_SECONDS_AVG, "Average block time in seconds (EMA).", CHAIN_ID),
    gauge(
        CHAIN_TPS_WINDOW,
        "Approximate TPS over a rolling time window. May be mocked until explorer/indexer endpoints are ready.",
        CHAIN_ID,
    ),
    gauge(CHAIN_TX_CONFIRM_TIME_SECONDS_AVG, "Average transaction confirmation time in seconds. May be mocked.", CHAIN_ID),
    gauge(CHAIN_BLOCK_GAS_UTILIZATION_RATIO_AVG, "Average gas utilization ratio (0-1). May be mocked.", CHAIN_ID),
    gauge(CHAIN_MEMPOOL_PENDING_TXS, "Pending transactions in mempool. May be mocked.", CHAIN_ID),
    gauge(CHAIN_CONGESTION_RATIO, "Congestion ratio (0-1). May be mocked.", CHAIN_ID),
    // staking
    gauge(STAKE_VALIDATORS_TOTAL, "Total validators returned by stake API.", CHAIN_ID),
    gauge(STAKE_VALIDATORS_BONDED, "Bonded validators count (status==bonded).", CHAIN_ID),
    gauge(STAKE_VALIDATORS_JAILED, "Jailed validators count.", CHAIN_ID),
    gauge(
        STAKE_VALIDATORS_UPTIME_PERCENTAGE_AVG,
        "Average uptime percentage across validators (aggregate).",
        CHAIN_ID,
    ),
    gauge(STAKE_BONDED_TOKENS, "Bonded tokens from LCD staking pool (raw units).", CHAIN_ID),
    // exporter self-observation
    gauge(SCRAPE_SUCCESS, "Whether a collector run succeeded (1) or failed (0).", SOURCE),
    histogram(SCRAPE_DURATION_SECONDS, "Collector run duration in seconds.", SOURCE),
    gauge(BUILD_INFO, "Build info as a gauge with labels version/commit.", &["version", "commit"]),
    gauge(SOURCE_UP, "Whether a concrete data source call is up (1) or down (0).", SOURCE),
    // blocks
    gauge(BLOCK_HEIGHT, "Current block height.", NONE),
    gauge(BLOCK_TIME_SECONDS, "Average block time (last 100 blocks).", NONE),
    counter(BLOCKS_TOTAL, "Total blocks produced.", NONE),
    // transactions
    counter("biya_tx_total", "Total transactions (success/failed).", &["status"]),
    gauge(TX_24H_TOTAL, "Transactions in last 24h.", NONE),
    gauge(TPS_CURRENT, "Current TPS.", NONE),
    gauge("biya_tps_24h_avg", "24h average TPS.", NONE),
    gauge("biya_tx_success_rate", "Transaction success rate (0-1).", NONE),
    gauge(TX_FAILED_24H_TOTAL, "Failed transactions in last 24h.", NONE),
    histogram(TX_CONFIRM_TIME_SECONDS, "Transaction confirmation time distribution (seconds).", NONE),
    gauge(TX_CONFIRM_TIME_AVG_SECONDS, "Average confirmation time (seconds).", NONE),
    // gas
    gauge(GAS_PRICE, "Current average gas price.", NONE),
    gauge("biya_gas_price_24h_max_gwei", "24h maximum gas price (Gwei).", NONE),
    gauge("biya_gas_price_24h_min_gwei", "24h minimum gas price (Gwei).", NONE),
    gauge(GAS_UTILIZATION, "Gas utilization ratio (0-1).", NONE),
    gauge("biya_gas_limit_per_block", "Block gas limit.", NONE),
    gauge("biya_gas_used_per_block", "Average gas used per block.", NONE),
    // mempool and network
    gauge(MEMPOOL_SIZE, "Pending transactions currently in the mempool.", NONE),
    gauge(MEMPOOL_CAPACITY, "Mempool capacity limit.", NONE),
    gauge(CONGESTION_RATIO, "Network congestion ratio (mempool_size/capacity).", NONE),
    gauge(ACTIVE_ADDRESSES_24H, "Unique active addresses in 24h.", NONE),
    // node sync
    gauge(NODE_SYNC_STATUS, "Node sync status (1=synced, 0=syncing).", NODE),
    gauge(NODE_SYNC_HEIGHT, "Current node sync height.", NODE),
    gauge(NODE_BEHIND_BLOCKS, "Blocks behind latest.", NODE),
    // validator set
    gauge(VALIDATORS_TOTAL, "Total validators (all created).", NONE),
    gauge("biya_validators_consensus", "Validators participating in consensus (TOP N).", NONE),
    gauge(VALIDATORS_ACTIVE, "Active validators.", NONE),
    gauge(VALIDATORS_JAILED, "Jailed validators count.", NONE),
    gauge("biya_validators_max", "MaxValidators parameter.", NONE),
    // staking economics
    gauge(STAKED_TOTAL_BYB, "Total staked amount (BYB).", NONE),
    gauge(STAKED_RATIO, "Staking ratio (staked/total supply).", NONE),
    gauge(REWARDS_24H_TOTAL_BYB, "24h total rewards (BYB).", NONE),
    gauge(APR_ANNUAL, "Annual percentage rate (0-100).", NONE),
    gauge(SLASHING_EVENTS_24H, "Slashing events in 24h.", NONE),
    counter(SLASHING_EVENTS_TOTAL, "Total slashing events by type.", &["type"]),
    // per validator
    gauge(VALIDATOR_STATUS, "Validator status (1=active, 0=inactive, -1=jailed).", VALIDATOR),
    gauge("biya_validator_stake_byb", "Validator stake (BYB).", VALIDATOR),
    gauge("biya_validator_voting_power", "Validator voting power percentage (0-100).", VALIDATOR),
    gauge("biya_validator_commission_rate", "Validator commission rate (0-1).", VALIDATOR),
    counter("biya_validator_blocks_proposed_total", "Total blocks proposed by validator.", VALIDATOR),
    counter("biya_validator_blocks_missed_total", "Total blocks missed by validator.", VALIDATOR),
    gauge(VALIDATOR_UPTIME_RATIO, "Validator uptime ratio (0-1).", VALIDATOR),
    gauge("biya_validator_last_active_timestamp", "Validator last active timestamp (unix seconds).", VALIDATOR),
    gauge("biya_validator_rewards_24h_byb", "Validator 24h rewards (BYB).", VALIDATOR),
    gauge(VALIDATOR_JAILED, "Validator jailed (1=yes, 0=no).", VALIDATOR),
    // governance
    counter("biya_proposals_total", "Total proposals created.", NONE),
    gauge("biya_proposals_passed", "Total passed proposals.", NONE),
    gauge("biya_proposals_rejected", "Total rejected proposals.", NONE),
    gauge("biya_proposals_active", "Currently active proposals.", NONE),
    gauge(VOTING_POWER_TOTAL, "Total voting power.", NONE),
    gauge(PARTICIPATION_RATE_AVG, "Average participation rate.", NONE),
    gauge("biya_proposal_status", "Proposal status (0-5 enum).", &["id", "title"]),
    gauge("biya_proposal_votes_yes", "Yes votes.", &["id"]),
    gauge("biya_proposal_votes_no", "No votes.", &["id"]),
    gauge("biya_proposal_votes_veto", "NoWithVeto votes.", &["id"]),
    gauge("biya_proposal_votes_abstain", "Abstain votes.", &["id"]),
];

/// Headline series written as 0 at startup so they are present before the
/// first collector run.
pub const SEEDED_ZERO: &[(&str, &[Label<'static>])] = &[
    ("biya_tx_total", &[("status", "success")]),
    ("biya_tx_total", &[("status", "failed")]),
    (BLOCK_HEIGHT, &[]),
    (BLOCK_TIME_SECONDS, &[]),
    (BLOCKS_TOTAL, &[]),
    (TX_24H_TOTAL, &[]),
    (TPS_CURRENT, &[]),
    ("biya_tps_24h_avg", &[]),
    ("biya_tx_success_rate", &[]),
    (TX_FAILED_24H_TOTAL, &[]),
    (TX_CONFIRM_TIME_AVG_SECONDS, &[]),
    (GAS_UTILIZATION, &[]),
    (GAS_PRICE, &[]),
    (MEMPOOL_SIZE, &[]),
    (MEMPOOL_CAPACITY, &[]),
    (CONGESTION_RATIO, &[]),
    (VALIDATORS_TOTAL, &[]),
    (VALIDATORS_JAILED, &[]),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{CATALOG, SEEDED_ZERO};

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in CATALOG {
            assert!(seen.insert(spec.name), "duplicate metric {}", spec.name);
        }
    }

    #[test]
    fn seeded_series_are_declared_non_histograms() {
        for (name, _) in SEEDED_ZERO {
            let spec = CATALOG
                .iter()
                .find(|spec| spec.name == *name)
                .unwrap_or_else(|| panic!("{name} is not declared"));
            assert!(!spec.metric_type.is_histogram());
        }
    }
}
