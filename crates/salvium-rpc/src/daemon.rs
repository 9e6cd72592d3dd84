//! Daemon RPC client.
//!
//! Typed async methods for the daemon endpoints a regtest harness drives:
//! network info, chain height, the tip header and regtest block generation.

use crate::client::{RpcClient, RpcConfig};
use crate::error::RpcError;
use serde::Deserialize;
use serde_json::{json, Value};

// =============================================================================
// Response Types
// =============================================================================

/// Daemon `/get_info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonInfo {
    pub height: u64,
    #[serde(default)]
    pub target_height: u64,
    #[serde(default)]
    pub difficulty: u64,
    #[serde(default)]
    pub tx_count: u64,
    #[serde(default)]
    pub tx_pool_size: u64,
    #[serde(default)]
    pub mainnet: bool,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub stagenet: bool,
    #[serde(default)]
    pub nettype: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub synchronized: bool,
    #[serde(default)]
    pub top_block_hash: String,
    pub status: String,
    /// Catch-all for additional fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DaemonInfo {
    /// Whether the daemon runs the regression-test fakechain.
    pub fn is_regtest(&self) -> bool {
        self.nettype == "fakechain"
    }
}

/// Block header from RPC.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub prev_hash: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub reward: u64,
    #[serde(default)]
    pub num_txes: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct BlockHeaderResponse {
    block_header: BlockHeader,
}

#[derive(Deserialize)]
struct HeightResponse {
    height: u64,
}

/// Response from `generateblocks` (regtest only).
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBlocksResult {
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub height: u64,
    pub status: String,
}

// =============================================================================
// DaemonRpc
// =============================================================================

/// Async RPC client for the Salvium daemon.
pub struct DaemonRpc {
    client: RpcClient,
}

impl DaemonRpc {
    /// Create a daemon RPC client connected to the given URL.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::new(url)?,
        })
    }

    /// Create with full configuration.
    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::with_config(config)?,
        })
    }

    /// Get the underlying RPC client for custom calls.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Network info: height, network type, sync status.
    pub async fn get_info(&self) -> Result<DaemonInfo, RpcError> {
        self.client.post_as("/get_info", &json!({})).await
    }

    /// Chain height (block count, so the tip is at `height - 1`).
    pub async fn get_height(&self) -> Result<u64, RpcError> {
        let resp: HeightResponse = self.client.post_as("/get_height", &json!({})).await?;
        Ok(resp.height)
    }

    pub async fn get_last_block_header(&self) -> Result<BlockHeader, RpcError> {
        let resp: BlockHeaderResponse = self
            .client
            .call_as("get_last_block_header", json!({}))
            .await?;
        Ok(resp.block_header)
    }

    /// Mine `blocks` blocks with the coinbase paid to `wallet_address`.
    ///
    /// Only available on a regtest (fakechain) daemon. Sent once: a timed
    /// out request may still have mined.
    pub async fn generate_blocks(
        &self,
        blocks: u64,
        wallet_address: &str,
    ) -> Result<GenerateBlocksResult, RpcError> {
        self.client
            .call_once_as(
                "generateblocks",
                json!({ "amount_of_blocks": blocks, "wallet_address": wallet_address }),
            )
            .await
    }
}
