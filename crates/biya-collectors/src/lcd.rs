use biya_common::error::Result;
use serde::Deserialize;

use crate::upstream::{get_json, normalize_base_url};

const UPSTREAM: &str = "cosmos lcd";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StakingPoolResponse {
    pub pool: StakingPool,
}

/// Token amounts arrive as decimal strings in raw denomination units.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StakingPool {
    pub bonded_tokens: String,
    pub not_bonded_tokens: String,
}

/// Cosmos SDK LCD REST client.
#[derive(Clone)]
pub struct LcdClient {
    base_url: String,
    client: reqwest::Client,
}

impl LcdClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub async fn staking_pool(&self) -> Result<StakingPoolResponse> {
        get_json(
            &self.client,
            UPSTREAM,
            &self.base_url,
            "/cosmos/staking/v1beta1/pool",
            &[],
        )
        .await
    }
}
