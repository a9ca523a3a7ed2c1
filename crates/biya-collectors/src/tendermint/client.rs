use biya_common::error::Result;

use crate::{
    tendermint::types::{BlockResponse, NumUnconfirmedTxsResponse, StatusResponse},
    upstream::{get_json, normalize_base_url},
};

const UPSTREAM: &str = "tendermint rpc";

#[derive(Clone)]
pub struct TendermintClient {
    base_url: String,
    client: reqwest::Client,
}

impl TendermintClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        get_json(&self.client, UPSTREAM, &self.base_url, "/status", &[]).await
    }

    /// Fetches the block at `height`, or the latest block when `height <= 0`.
    pub async fn block(&self, height: i64) -> Result<BlockResponse> {
        let query = if height > 0 {
            vec![("height", height.to_string())]
        } else {
            Vec::new()
        };
        get_json(&self.client, UPSTREAM, &self.base_url, "/block", &query).await
    }

    pub async fn num_unconfirmed_txs(&self) -> Result<NumUnconfirmedTxsResponse> {
        get_json(
            &self.client,
            UPSTREAM,
            &self.base_url,
            "/num_unconfirmed_txs",
            &[],
        )
        .await
    }
}
