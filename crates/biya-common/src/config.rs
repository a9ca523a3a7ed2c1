use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer};

use crate::error::{ExporterError, Result};

pub const DEFAULT_MEMPOOL_CAPACITY: i64 = 5000;
pub const DEFAULT_STAKE_BASE_URL: &str = "https://prv.stake.biya.io/stake";
pub const DEFAULT_EXPLORER_BASE_URL: &str = "https://prv.explorer.biya.io/demo";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub node: NodeConfig,
    pub http: HttpConfig,
    pub http_client: HttpClientConfig,
    pub scrape_intervals: ScrapeIntervalsConfig,
    pub log: LogConfig,
    pub mock: MockConfig,
    pub stake: ApiConfig,
    pub explorer: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            node: NodeConfig::default(),
            http: HttpConfig::default(),
            http_client: HttpClientConfig::default(),
            scrape_intervals: ScrapeIntervalsConfig::default(),
            log: LogConfig::default(),
            mock: MockConfig::default(),
            stake: ApiConfig::new(DEFAULT_STAKE_BASE_URL),
            explorer: ApiConfig::new(DEFAULT_EXPLORER_BASE_URL),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "biya".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Tendermint/CometBFT RPC endpoint, e.g. `https://rpc.example:26657`.
    pub tendermint_rpc_base_url: String,
    /// Cosmos LCD REST endpoint, e.g. `https://api.example:1317`.
    pub lcd_base_url: String,
    pub mempool_capacity: i64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tendermint_rpc_base_url: String::new(),
            lcd_base_url: String::new(),
            mempool_capacity: DEFAULT_MEMPOOL_CAPACITY,
        }
    }
}

/// One of the Biya REST APIs (staking, explorer). A blank `base_url`
/// disables the matching job; `api_key` is sent as a bearer token when set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeIntervalsConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub realtime: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub minute: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub hourly: Duration,
}

impl Default for ScrapeIntervalsConfig {
    fn default() -> Self {
        Self {
            realtime: Duration::from_secs(10),
            minute: Duration::from_secs(60),
            hourly: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// debug | info | warn | error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub enabled: bool,
    pub values: MockValues,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            values: MockValues::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockValues {
    pub gas_utilization_ratio: f64,
    pub congestion_ratio: f64,
    pub tps_window: f64,
    pub mempool_pending_txs: f64,
    pub tx_confirm_time_seconds: f64,
}

impl Config {
    /// Loads the configuration file over the built-in defaults.
    ///
    /// Without a path the defaults are returned unchanged. The format follows
    /// the extension: `.yaml`/`.yml` or `.json`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let parse: fn(&str) -> Result<Self> = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml,
            "json" => Self::from_json,
            _ => {
                return Err(ExporterError::InvalidConfig(format!(
                    "unsupported config extension: {extension:?} (supported: .yaml, .yml, .json)"
                )));
            }
        };

        let raw = std::fs::read_to_string(path)?;
        parse(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|err| ExporterError::InvalidConfig(format!("invalid yaml config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| ExporterError::InvalidConfig(format!("invalid json config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.chain_id.trim().is_empty() {
            return Err(ExporterError::InvalidConfig(
                "chain.chain_id is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a bare number of seconds or a humantime duration such as `500ms`,
/// `10s` or `1m30s`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
        return value
            .parse()
            .map(Duration::from_secs)
            .map_err(|err| ExporterError::InvalidConfig(format!("invalid duration {value:?}: {err}")));
    }

    humantime::parse_duration(value)
        .map_err(|err| ExporterError::InvalidConfig(format!("invalid duration {value:?}: {err}")))
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        RawDuration::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
