//! Wallet RPC client.
//!
//! Typed async methods for the `salvium-wallet-rpc` endpoints used to
//! provision, refresh and spend from a regtest wallet.

use crate::client::{RpcClient, RpcConfig};
use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// =============================================================================
// Response Types
// =============================================================================

/// Balance info from `get_balance`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceInfo {
    pub balance: u64,
    pub unlocked_balance: u64,
    #[serde(default)]
    pub blocks_to_unlock: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Address info from `get_address`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressResult {
    pub address: String,
    #[serde(default)]
    pub addresses: Vec<AddressEntry>,
}

/// Single address entry, also returned by `create_address`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressEntry {
    pub address: String,
    #[serde(default)]
    pub address_index: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub used: bool,
}

/// Transfer result from `transfer`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferResult {
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub tx_key: Option<String>,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Subaddress index (major = account, minor = address).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubaddrIndex {
    pub major: u32,
    pub minor: u32,
}

/// Refresh result.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResult {
    #[serde(default)]
    pub blocks_fetched: u64,
    #[serde(default)]
    pub received_money: bool,
}

/// Incoming transfer entry.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingTransfer {
    pub amount: u64,
    pub spent: bool,
    #[serde(default)]
    pub global_index: u64,
    pub tx_hash: String,
    #[serde(default)]
    pub subaddr_index: SubaddrIndex,
    #[serde(default)]
    pub key_image: String,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub unlocked: bool,
}

/// Result from `generate_from_keys`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateFromKeysResult {
    pub address: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: u32,
}

#[derive(Deserialize)]
struct HeightResponse {
    height: u64,
}

#[derive(Deserialize)]
struct AttributeResponse {
    value: String,
}

/// The service omits `transfers` when there are none.
#[derive(Deserialize)]
struct IncomingTransfersResponse {
    #[serde(default)]
    transfers: Vec<IncomingTransfer>,
}

// =============================================================================
// Transfer Destination
// =============================================================================

/// Destination for a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub address: String,
    pub amount: u64,
}

/// Transfer priority levels.
pub mod priority {
    pub const DEFAULT: u32 = 0;
    pub const UNIMPORTANT: u32 = 1;
    pub const NORMAL: u32 = 2;
    pub const ELEVATED: u32 = 3;
}

/// `incoming_transfers` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFilter {
    All,
    Available,
    Unavailable,
}

impl TransferFilter {
    fn as_str(self) -> &'static str {
        match self {
            TransferFilter::All => "all",
            TransferFilter::Available => "available",
            TransferFilter::Unavailable => "unavailable",
        }
    }
}

// =============================================================================
// WalletRpc
// =============================================================================

/// Async RPC client for the Salvium wallet.
pub struct WalletRpc {
    client: RpcClient,
}

impl WalletRpc {
    /// Create a wallet RPC client connected to the given URL.
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

    /// Get the underlying RPC client.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// State-changing call whose result carries nothing the caller needs.
    /// Sent once.
    async fn call_unit(&self, method: &str, params: Value) -> Result<(), RpcError> {
        self.client.call_once(method, params).await?;
        Ok(())
    }

    // =========================================================================
    // Wallet Files
    // =========================================================================

    pub async fn open_wallet(&self, filename: &str, password: &str) -> Result<(), RpcError> {
        self.call_unit(
            "open_wallet",
            json!({ "filename": filename, "password": password }),
        )
        .await
    }

    /// Save and close the open wallet.
    pub async fn close_wallet(&self) -> Result<(), RpcError> {
        self.call_unit("close_wallet", json!({ "autosave_current": true }))
            .await
    }

    /// Create a wallet file from an address and its secret keys, and open it.
    pub async fn generate_from_keys(
        &self,
        filename: &str,
        address: &str,
        spendkey: &str,
        viewkey: &str,
        password: &str,
        restore_height: u64,
    ) -> Result<GenerateFromKeysResult, RpcError> {
        self.client
            .call_once_as(
                "generate_from_keys",
                json!({
                    "filename": filename,
                    "address": address,
                    "spendkey": spendkey,
                    "viewkey": viewkey,
                    "password": password,
                    "restore_height": restore_height,
                    "autosave_current": false,
                }),
            )
            .await
    }

    pub async fn store(&self) -> Result<(), RpcError> {
        self.call_unit("store", json!({})).await
    }

    /// Service RPC version. Answers without an open wallet.
    pub async fn get_version(&self) -> Result<u32, RpcError> {
        let resp: VersionResponse = self.client.call_as("get_version", json!({})).await?;
        Ok(resp.version)
    }

    // =========================================================================
    // Balance & Addresses
    // =========================================================================

    pub async fn get_balance(&self, account_index: u32) -> Result<BalanceInfo, RpcError> {
        self.client
            .call_as("get_balance", json!({ "account_index": account_index }))
            .await
    }

    pub async fn get_address(&self, account_index: u32) -> Result<AddressResult, RpcError> {
        self.client
            .call_as("get_address", json!({ "account_index": account_index }))
            .await
    }

    /// Create the next subaddress in `account_index`.
    pub async fn create_address(
        &self,
        account_index: u32,
        label: &str,
    ) -> Result<AddressEntry, RpcError> {
        self.client
            .call_once_as(
                "create_address",
                json!({ "account_index": account_index, "label": label }),
            )
            .await
    }

    /// Wallet chain height (block count).
    pub async fn get_height(&self) -> Result<u64, RpcError> {
        let resp: HeightResponse = self.client.call_as("get_height", json!({})).await?;
        Ok(resp.height)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Pay `destinations`. Never resent: a transfer that timed out may
    /// still have been relayed.
    pub async fn transfer(
        &self,
        destinations: &[Destination],
        account_index: u32,
        priority: u32,
        get_tx_key: bool,
    ) -> Result<TransferResult, RpcError> {
        self.client
            .call_once_as(
                "transfer",
                json!({
                    "destinations": destinations,
                    "account_index": account_index,
                    "priority": priority,
                    "get_tx_key": get_tx_key,
                }),
            )
            .await
    }

    /// Outputs received by `account_index`.
    pub async fn incoming_transfers(
        &self,
        filter: TransferFilter,
        account_index: u32,
    ) -> Result<Vec<IncomingTransfer>, RpcError> {
        let resp: IncomingTransfersResponse = self
            .client
            .call_as(
                "incoming_transfers",
                json!({ "transfer_type": filter.as_str(), "account_index": account_index }),
            )
            .await?;
        Ok(resp.transfers)
    }

    // =========================================================================
    // Daemon & Refresh
    // =========================================================================

    /// Scan for new blocks, from `start_height` if given.
    pub async fn refresh(&self, start_height: Option<u64>) -> Result<RefreshResult, RpcError> {
        let params = match start_height {
            Some(h) => json!({ "start_height": h }),
            None => json!({}),
        };
        self.client.call_as("refresh", params).await
    }

    /// Point the service at a daemon (`host:port`).
    pub async fn set_daemon(&self, address: &str, trusted: bool) -> Result<(), RpcError> {
        self.call_unit(
            "set_daemon",
            json!({ "address": address, "trusted": trusted }),
        )
        .await
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub async fn set_attribute(&self, key: &str, value: &str) -> Result<(), RpcError> {
        self.call_unit("set_attribute", json!({ "key": key, "value": value }))
            .await
    }

    pub async fn get_attribute(&self, key: &str) -> Result<String, RpcError> {
        let resp: AttributeResponse = self
            .client
            .call_as("get_attribute", json!({ "key": key }))
            .await?;
        Ok(resp.value)
    }
}
