//! Wallet creation and opening.
//!
//! Keys are derived locally from the seed and imported into the wallet
//! service with `generate_from_keys`. The public passphrase becomes the
//! wallet file password; the private passphrase gates spending and address
//! derivation through a digest stored as a wallet attribute.

use crate::error::WalletError;
use crate::keys::WalletKeys;
use crate::wallet::{passphrase_digest, Wallet, PASSPHRASE_ATTRIBUTE};
use log::info;
use salvium_rpc::error::codes;
use salvium_rpc::{RpcError, WalletRpc};
use salvium_types::constants::NetParams;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default wallet file name inside the wallet directory.
pub const DEFAULT_WALLET_NAME: &str = "wallet";

/// Creates and opens wallets in one wallet service.
///
/// `wallet_dir` must be the directory the service was started with
/// (`--wallet-dir`).
pub struct WalletLoader {
    params: NetParams,
    wallet_dir: PathBuf,
    file_name: String,
    rpc: Arc<WalletRpc>,
}

impl WalletLoader {
    pub fn new(params: NetParams, wallet_dir: impl Into<PathBuf>, rpc: Arc<WalletRpc>) -> Self {
        Self {
            params,
            wallet_dir: wallet_dir.into(),
            file_name: DEFAULT_WALLET_NAME.to_string(),
            rpc,
        }
    }

    /// Use `file_name` instead of [`DEFAULT_WALLET_NAME`].
    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn wallet_dir(&self) -> &Path {
        &self.wallet_dir
    }

    /// Path of the wallet cache file.
    pub fn wallet_path(&self) -> PathBuf {
        self.wallet_dir.join(&self.file_name)
    }

    /// Whether a wallet with this name has been written.
    pub fn wallet_exists(&self) -> bool {
        self.wallet_dir
            .join(format!("{}.keys", self.file_name))
            .exists()
    }

    /// Create a wallet from a 32-byte seed. The returned wallet is locked.
    pub async fn create_new_wallet(
        &self,
        public_passphrase: &str,
        private_passphrase: &str,
        seed: &[u8],
    ) -> Result<Wallet, WalletError> {
        if self.wallet_exists() {
            return Err(WalletError::AlreadyExists(
                self.wallet_path().display().to_string(),
            ));
        }

        let keys = WalletKeys::from_seed_bytes(seed, self.params.address_network)?;
        let expected = keys.address();

        let created = self
            .rpc
            .generate_from_keys(
                &self.file_name,
                &expected,
                &keys.spend_secret_hex(),
                &keys.view_secret_hex(),
                public_passphrase,
                0,
            )
            .await
            .map_err(|e| match e.rpc_code() {
                Some(codes::WALLET_ALREADY_EXISTS) => {
                    WalletError::AlreadyExists(self.wallet_path().display().to_string())
                }
                _ => WalletError::Rpc(e),
            })?;

        if created.address != expected {
            return Err(WalletError::AddressMismatch {
                expected,
                actual: created.address,
            });
        }

        self.rpc
            .set_attribute(PASSPHRASE_ATTRIBUTE, &passphrase_digest(private_passphrase))
            .await?;
        self.rpc.store().await?;

        info!(
            "created {} wallet {} ({})",
            self.params.name,
            self.wallet_path().display(),
            expected
        );

        Ok(Wallet::new(
            self.rpc.clone(),
            self.params,
            self.file_name.clone(),
            expected,
        ))
    }

    /// Create a wallet from a random seed.
    pub async fn create_random_wallet(
        &self,
        public_passphrase: &str,
        private_passphrase: &str,
    ) -> Result<Wallet, WalletError> {
        let seed = WalletKeys::random_seed();
        self.create_new_wallet(public_passphrase, private_passphrase, &seed)
            .await
    }

    /// Open a previously created wallet with its public passphrase.
    pub async fn open_existing_wallet(&self, public_passphrase: &str) -> Result<Wallet, WalletError> {
        self.rpc
            .open_wallet(&self.file_name, public_passphrase)
            .await
            .map_err(map_open_error)?;

        let address = self.rpc.get_address(0).await?.address;
        info!("opened wallet {} ({})", self.wallet_path().display(), address);

        Ok(Wallet::new(
            self.rpc.clone(),
            self.params,
            self.file_name.clone(),
            address,
        ))
    }
}

fn map_open_error(e: RpcError) -> WalletError {
    match e.rpc_code() {
        Some(codes::INVALID_PASSWORD) => WalletError::WrongPassphrase,
        _ => WalletError::Rpc(e),
    }
}
