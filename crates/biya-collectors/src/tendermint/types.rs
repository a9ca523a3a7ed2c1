//! Subset of the Tendermint/CometBFT RPC responses the collectors read.
//! Shapes drift between node versions, so every field is optional on the wire.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    pub result: StatusResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusResult {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    pub network: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncInfo {
    pub latest_block_height: String,
    pub latest_block_time: Option<DateTime<Utc>>,
    pub catching_up: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockResponse {
    pub result: BlockResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockResult {
    pub block_id: BlockId,
    pub block: Block,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockId {
    pub hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    pub height: String,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockData {
    pub txs: Option<Vec<String>>,
}

impl BlockResponse {
    pub fn tx_count(&self) -> usize {
        self.result.block.data.txs.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NumUnconfirmedTxsResponse {
    pub result: NumUnconfirmedTxs,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NumUnconfirmedTxs {
    pub n_txs: String,
    pub total: String,
}
