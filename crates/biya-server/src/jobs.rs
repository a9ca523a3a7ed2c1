use std::sync::Arc;

use biya_collectors::{
    ExplorerClient, HourlyChainCollector, Job, LcdClient, MinuteChainCollector,
    RealtimeChainCollector, RealtimeExplorerCollector, RealtimeStakeCollector, StakeClient,
    TendermintClient, http_client,
};
use biya_common::{Config, Result};
use biya_metrics::ExporterMetrics;
use tracing::info;

pub const REALTIME_CHAIN: &str = "realtime_chain";
pub const MINUTE_CHAIN: &str = "minute_chain";
pub const HOURLY_CHAIN: &str = "hourly_chain";
pub const REALTIME_STAKE: &str = "realtime_stake";
pub const REALTIME_EXPLORER: &str = "realtime_explorer";

/// Builds the scheduled job list. The staking pool job needs an LCD endpoint;
/// the stake and explorer API jobs need both a base url and an api key.
pub fn build_jobs(config: &Config, metrics: &Arc<ExporterMetrics>) -> Result<Vec<Job>> {
    let client = http_client(config.http_client.timeout)?;
    let tendermint = TendermintClient::new(&config.node.tendermint_rpc_base_url, client.clone());
    let intervals = &config.scrape_intervals;

    let mut jobs = vec![
        Job::new(
            REALTIME_CHAIN,
            intervals.realtime,
            Arc::new(RealtimeChainCollector::new(
                Arc::clone(metrics),
                tendermint.clone(),
                config.mock.clone(),
            )),
        ),
        Job::new(
            MINUTE_CHAIN,
            intervals.minute,
            Arc::new(MinuteChainCollector::new(
                Arc::clone(metrics),
                tendermint,
                config.mock.clone(),
                config.node.mempool_capacity,
            )),
        ),
    ];

    let stake = StakeClient::new(&config.stake.base_url, &config.stake.api_key, client.clone());
    if stake.is_configured() {
        jobs.push(Job::new(
            REALTIME_STAKE,
            intervals.realtime,
            Arc::new(RealtimeStakeCollector::new(Arc::clone(metrics), stake)),
        ));
    } else {
        info!("stake api base_url or api_key is empty, stake job disabled");
    }

    let explorer = ExplorerClient::new(&config.explorer.base_url, &config.explorer.api_key, client.clone());
    if explorer.is_configured() {
        jobs.push(Job::new(
            REALTIME_EXPLORER,
            intervals.realtime,
            Arc::new(RealtimeExplorerCollector::new(
                Arc::clone(metrics),
                explorer,
                config.mock.clone(),
            )),
        ));
    } else {
        info!("explorer api base_url or api_key is empty, explorer job disabled");
    }

    let lcd = LcdClient::new(&config.node.lcd_base_url, client);
    if lcd.is_configured() {
        jobs.push(Job::new(
            HOURLY_CHAIN,
            intervals.hourly,
            Arc::new(HourlyChainCollector::new(Arc::clone(metrics), lcd)),
        ));
    } else {
        info!("node.lcd_base_url is empty, staking pool job disabled");
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use biya_common::Config;
    use biya_metrics::{BuildInfo, ExporterMetrics};

    use super::{HOURLY_CHAIN, MINUTE_CHAIN, REALTIME_CHAIN, REALTIME_EXPLORER, REALTIME_STAKE, build_jobs};

    fn metrics() -> Arc<ExporterMetrics> {
        Arc::new(ExporterMetrics::new("biya", &BuildInfo::new("test", "none")))
    }

    #[test]
    fn chain_jobs_use_configured_intervals() {
        let jobs = build_jobs(&Config::default(), &metrics()).unwrap();
        let summary: Vec<_> = jobs.iter().map(|job| (job.name.as_str(), job.interval)).collect();
        assert_eq!(
            summary,
            vec![
                (REALTIME_CHAIN, Duration::from_secs(10)),
                (MINUTE_CHAIN, Duration::from_secs(60)),
            ]
        );
    }

    #[test]
    fn staking_job_requires_lcd_endpoint() {
        let mut config = Config::default();
        config.node.lcd_base_url = "http://lcd.local:1317".to_string();
        config.scrape_intervals.hourly = Duration::from_secs(1800);

        let jobs = build_jobs(&config, &metrics()).unwrap();
        let hourly = jobs.iter().find(|job| job.name == HOURLY_CHAIN).unwrap();
        assert_eq!(hourly.interval, Duration::from_secs(1800));
        assert_eq!(jobs.len(), 3);
    }

    #[test]
    fn api_jobs_need_a_key() {
        let mut config = Config::default();
        config.stake.api_key = "stake-key".to_string();
        config.explorer.api_key = "explorer-key".to_string();
        config.scrape_intervals.realtime = Duration::from_secs(15);

        let jobs = build_jobs(&config, &metrics()).unwrap();
        let summary: Vec<_> = jobs.iter().map(|job| (job.name.as_str(), job.interval)).collect();
        assert_eq!(
            summary,
            vec![
                (REALTIME_CHAIN, Duration::from_secs(15)),
                (MINUTE_CHAIN, Duration::from_secs(60)),
                (REALTIME_STAKE, Duration::from_secs(15)),
                (REALTIME_EXPLORER, Duration::from_secs(15)),
            ]
        );

        config.explorer.base_url = String::new();
        let jobs = build_jobs(&config, &metrics()).unwrap();
        assert!(jobs.iter().all(|job| job.name != REALTIME_EXPLORER));
    }
}
