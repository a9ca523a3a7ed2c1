use biya_common::error::Result;
use serde_json::Value;

use crate::upstream::{ApiEndpoint, get_api_json};

const UPSTREAM: &str = "explorer api";

/// Client of the Biya block explorer REST API.
///
/// Explorer payloads are loosely specified, so every call hands back the raw
/// `data` document and the collector picks the fields it understands.
#[derive(Clone)]
pub struct ExplorerClient {
    api: ApiEndpoint,
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client) -> Self {
        Self {
            api: ApiEndpoint::new(base_url, api_key),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    /// Most recent block only.
    pub async fn latest_blocks(&self) -> Result<Value> {
        self.get(
            "/api/v1/block/latest",
            &[("page", "1".to_string()), ("page_size", "1".to_string())],
        )
        .await
    }

    pub async fn transaction_stats(&self) -> Result<Value> {
        self.get("/api/v1/transaction/stats", &[]).await
    }

    pub async fn gas_utilization(&self) -> Result<Value> {
        self.get("/api/v1/block/gas-utilization", &[]).await
    }

    pub async fn failed_transactions_24h(&self) -> Result<Value> {
        self.get(
            "/api/v1/transaction/failed-24h",
            &[
                ("pagination.page", "1".to_string()),
                ("pagination.pageSize", "10".to_string()),
            ],
        )
        .await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        get_api_json(&self.client, UPSTREAM, &self.api, path, query).await
    }
}
