use biya_common::error::Result;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::upstream::{ApiEndpoint, get_api_json};

const UPSTREAM: &str = "stake api";
const VALIDATORS_PAGE_SIZE: u32 = 100;

/// Cosmos staking status of a bonded validator.
pub const STATUS_BONDED: i64 = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorsPage {
    pub validators: Vec<Validator>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Validator {
    pub moniker: String,
    pub operator_address: String,
    pub jailed: bool,
    /// 1 unbonded, 2 unbonding, 3 bonded.
    pub status: i64,
    /// 0-100.
    pub uptime_percentage: f64,
}

/// Client of the Biya staking REST API.
#[derive(Clone)]
pub struct StakeClient {
    api: ApiEndpoint,
    client: reqwest::Client,
}

impl StakeClient {
    /// Accepts the base url with or without its trailing `/stake` segment.
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client) -> Self {
        let base_url = base_url.trim().trim_end_matches('/');
        let base_url = base_url.strip_suffix("/stake").unwrap_or(base_url);
        Self {
            api: ApiEndpoint::new(base_url, api_key),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    /// First page of validators, up to 100 entries.
    pub async fn validators(&self) -> Result<ValidatorsPage> {
        self.get(
            "/stake/validators",
            &[
                ("page", "1".to_string()),
                ("pageSize", VALIDATORS_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    pub async fn statistics(&self) -> Result<Value> {
        self.get("/stake/statistics", &[]).await
    }

    /// Slashing events between two RFC 3339 instants.
    pub async fn slashing_events(&self, start_time: &str, end_time: &str) -> Result<Value> {
        self.get(
            "/stake/slashing/events",
            &[
                ("startTime", start_time.to_string()),
                ("endTime", end_time.to_string()),
                ("pagination.page", "1".to_string()),
                ("pagination.pageSize", VALIDATORS_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    pub async fn governance_statistics(&self) -> Result<Value> {
        self.get("/stake/governance/statistics", &[]).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        get_api_json(&self.client, UPSTREAM, &self.api, path, query).await
    }
}
