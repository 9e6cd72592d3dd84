//! Main Wallet handle.
//!
//! A wallet lives inside a `salvium-wallet-rpc` service; this handle drives
//! it over RPC and adds the lock state and balance accounting the harness
//! needs. All methods take `&self` so the handle can be shared between the
//! syncer task and the foreground flow behind an `Arc`.

use crate::error::WalletError;
use log::{debug, info};
use salvium_rpc::wallet_rpc::{
    Destination, IncomingTransfer, RefreshResult, TransferFilter, TransferResult,
};
use salvium_rpc::error::codes;
use salvium_rpc::WalletRpc;
use salvium_types::address::parse_address_as;
use salvium_types::constants::{format_amount, AddressType, NetParams};
use salvium_types::keccak256;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wallet attribute holding the digest of the private passphrase.
pub(crate) const PASSPHRASE_ATTRIBUTE: &str = "regtest.private_passphrase_digest";

/// Hex digest stored in [`PASSPHRASE_ATTRIBUTE`].
pub(crate) fn passphrase_digest(passphrase: &str) -> String {
    hex::encode(keccak256(passphrase.as_bytes()))
}

/// Account balance split by spendability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    /// Every unspent output.
    pub total: u64,
    /// Unspent, unlocked outputs with enough confirmations.
    pub spendable: u64,
    /// Unspent outputs still inside their lock window.
    pub immature: u64,
}

impl fmt::Display for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {} (spendable {}, immature {})",
            format_amount(self.total),
            format_amount(self.spendable),
            format_amount(self.immature)
        )
    }
}

/// Tally incoming transfers at chain height `height` (block count).
///
/// An output in block `b` has `height - b` confirmations.
pub fn tally_balances(transfers: &[IncomingTransfer], height: u64, min_confirmations: u64) -> Balances {
    let mut balances = Balances::default();
    for t in transfers.iter().filter(|t| !t.spent) {
        balances.total += t.amount;
        if !t.unlocked {
            balances.immature += t.amount;
            continue;
        }
        let confirmations = height.saturating_sub(t.block_height);
        if !t.frozen && confirmations >= min_confirmations {
            balances.spendable += t.amount;
        }
    }
    balances
}

/// High-level wallet handle.
pub struct Wallet {
    rpc: Arc<WalletRpc>,
    params: NetParams,
    file_name: String,
    primary_address: String,
    locked: AtomicBool,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("file_name", &self.file_name)
            .field("primary_address", &self.primary_address)
            .field("service", &self.rpc.client().url())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Wallet {
    /// Wrap a wallet already open in the service behind `rpc`. Starts locked.
    pub fn new(
        rpc: Arc<WalletRpc>,
        params: NetParams,
        file_name: String,
        primary_address: String,
    ) -> Self {
        Self {
            rpc,
            params,
            file_name,
            primary_address,
            locked: AtomicBool::new(true),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn params(&self) -> &NetParams {
        &self.params
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Primary standard address.
    pub fn primary_address(&self) -> &str {
        &self.primary_address
    }

    /// The wallet service this handle talks to.
    pub fn rpc(&self) -> &WalletRpc {
        &self.rpc
    }

    // ── Lock state ───────────────────────────────────────────────────────

    /// Unlock for spending and address generation.
    ///
    /// The passphrase is checked against the digest stored when the wallet
    /// was created.
    pub async fn unlock(&self, private_passphrase: &str) -> Result<(), WalletError> {
        let stored = match self.rpc.get_attribute(PASSPHRASE_ATTRIBUTE).await {
            Ok(stored) => stored,
            // Not created by the loader, so no passphrase can match.
            Err(e) if e.rpc_code() == Some(codes::ATTRIBUTE_NOT_FOUND) => {
                return Err(WalletError::WrongPassphrase)
            }
            Err(e) => return Err(e.into()),
        };
        if stored != passphrase_digest(private_passphrase) {
            return Err(WalletError::WrongPassphrase);
        }
        self.locked.store(false, Ordering::Release);
        debug!("wallet {} unlocked", self.file_name);
        Ok(())
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn require_unlocked(&self, action: &'static str) -> Result<(), WalletError> {
        if self.is_locked() {
            return Err(WalletError::Locked(action));
        }
        Ok(())
    }

    // ── Chain ────────────────────────────────────────────────────────────

    /// Point the wallet service at a daemon.
    pub async fn connect(&self, daemon_url: &str) -> Result<(), WalletError> {
        self.rpc.set_daemon(daemon_url, true).await?;
        info!("wallet {} connected to {}", self.file_name, daemon_url);
        Ok(())
    }

    /// Wallet chain height (block count).
    pub async fn height(&self) -> Result<u64, WalletError> {
        Ok(self.rpc.get_height().await?)
    }

    /// Scan new blocks.
    pub async fn refresh(&self) -> Result<RefreshResult, WalletError> {
        Ok(self.rpc.refresh(None).await?)
    }

    // ── Balance & addresses ──────────────────────────────────────────────

    /// Balance of `account`, counting as spendable only outputs with at
    /// least `min_confirmations`.
    pub async fn calculate_account_balance(
        &self,
        account: u32,
        min_confirmations: u64,
    ) -> Result<Balances, WalletError> {
        let height = self.height().await?;
        let transfers = self
            .rpc
            .incoming_transfers(TransferFilter::All, account)
            .await?;
        Ok(tally_balances(&transfers, height, min_confirmations))
    }

    /// Derive a fresh receiving subaddress in `account`.
    ///
    /// The service's answer must be a subaddress of this wallet's network.
    pub async fn new_external_address(&self, account: u32) -> Result<String, WalletError> {
        self.require_unlocked("derive addresses")?;
        let entry = self.rpc.create_address(account, "").await?;
        parse_address_as(
            &entry.address,
            self.params.address_network,
            AddressType::Subaddress,
        )?;
        debug!(
            "new address {}/{}: {}",
            account, entry.address_index, entry.address
        );
        Ok(entry.address)
    }

    /// Pay `destinations` from `account`.
    pub async fn transfer(
        &self,
        destinations: &[Destination],
        account: u32,
        priority: u32,
    ) -> Result<TransferResult, WalletError> {
        self.require_unlocked("spend")?;
        Ok(self
            .rpc
            .transfer(destinations, account, priority, false)
            .await?)
    }

    /// Save and close the wallet file in the service.
    pub async fn close(&self) -> Result<(), WalletError> {
        self.lock();
        self.rpc.close_wallet().await?;
        Ok(())
    }
}
