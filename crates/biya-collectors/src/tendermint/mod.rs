mod client;
pub mod types;

pub use client::TendermintClient;
pub use types::{BlockResponse, NumUnconfirmedTxsResponse, StatusResponse};
