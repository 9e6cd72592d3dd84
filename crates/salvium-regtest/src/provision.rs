//! Test wallet provisioning.
//!
//! A [`WalletProvisioner`] owns a temporary wallet directory and the
//! `salvium-wallet-rpc` process serving it. Dropping it stops the service
//! and deletes the directory.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::wallet_service::WalletService;
use log::{debug, info, warn};
use salvium_types::constants::NetParams;
use salvium_wallet::{Wallet, WalletLoader};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Name of the wallet-rpc serving the test wallet.
const SERVICE_NAME: &str = "test-wallet-rpc";

pub struct WalletProvisioner {
    params: NetParams,
    service: Option<WalletService>,
    dir: Option<TempDir>,
}

/// Create the temporary wallet directory.
fn wallet_tempdir() -> Result<TempDir, HarnessError> {
    tempfile::Builder::new()
        .prefix("test-wallet")
        .tempdir()
        .map_err(|source| HarnessError::TempDir {
            what: "wallet directory",
            source,
        })
}

impl WalletProvisioner {
    /// Create a temporary wallet directory and start a wallet service for
    /// it, bound to the daemon at `daemon_address` (`host:port`).
    pub async fn start(
        params: NetParams,
        config: &HarnessConfig,
        daemon_address: &str,
    ) -> Result<Self, HarnessError> {
        Self::start_in(wallet_tempdir()?, params, config, daemon_address).await
    }

    /// Start the service in `dir`. The directory is removed if that fails.
    async fn start_in(
        dir: TempDir,
        params: NetParams,
        config: &HarnessConfig,
        daemon_address: &str,
    ) -> Result<Self, HarnessError> {
        debug!("wallet directory {}", dir.path().display());
        let service = WalletService::start(SERVICE_NAME, config, dir.path(), daemon_address).await?;
        Ok(Self {
            params,
            service: Some(service),
            dir: Some(dir),
        })
    }

    /// Wallet directory, `None` after tear-down.
    pub fn wallet_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    /// Loader for wallets in this directory.
    pub fn loader(&self) -> Result<WalletLoader, HarnessError> {
        match (&self.service, &self.dir) {
            (Some(service), Some(dir)) => {
                Ok(WalletLoader::new(self.params, dir.path(), service.rpc()))
            }
            _ => Err(HarnessError::NotSetUp),
        }
    }

    /// Create the test wallet from `seed`. The wallet is returned locked.
    pub async fn create_wallet(
        &self,
        public_passphrase: &str,
        private_passphrase: &str,
        seed: &[u8],
    ) -> Result<Arc<Wallet>, HarnessError> {
        let wallet = self
            .loader()?
            .create_new_wallet(public_passphrase, private_passphrase, seed)
            .await?;
        info!("test wallet address {}", wallet.primary_address());
        Ok(Arc::new(wallet))
    }

    /// Stop the service and delete the directory. Safe to call more than
    /// once; also run on drop.
    pub fn tear_down(&mut self) {
        if let Some(mut service) = self.service.take() {
            service.stop();
        }
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) => warn!("failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for WalletProvisioner {
    fn drop(&mut self) {
        self.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(dir: TempDir) -> WalletProvisioner {
        WalletProvisioner {
            params: NetParams::regtest(),
            service: None,
            dir: Some(dir),
        }
    }

    #[test]
    fn test_tempdir_prefix() {
        let dir = wallet_tempdir().unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("test-wallet"));
    }

    #[test]
    fn test_drop_removes_wallet_dir() {
        let dir = wallet_tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("wallet.keys"), b"keys").unwrap();
        drop(idle(dir));
        assert!(!path.exists());
    }

    #[test]
    fn test_tear_down_is_idempotent() {
        let mut p = idle(wallet_tempdir().unwrap());
        p.tear_down();
        assert!(p.wallet_dir().is_none());
        p.tear_down();
    }

    #[tokio::test]
    async fn test_create_without_service_fails() {
        let p = idle(wallet_tempdir().unwrap());
        assert!(matches!(p.loader(), Err(HarnessError::NotSetUp)));
        let err = p
            .create_wallet("public", "private", &[0u8; 32])
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::NotSetUp));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_with_dead_service_cleans_up() {
        let config = HarnessConfig {
            wallet_rpc_bin: "false".into(),
            poll_interval: std::time::Duration::from_millis(20),
            ..HarnessConfig::default()
        };
        let dir = wallet_tempdir().unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());

        let err = WalletProvisioner::start_in(dir, NetParams::regtest(), &config, "127.0.0.1:1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::Exited { .. }), "got {:?}", err);
        assert!(!path.exists(), "{} left behind", path.display());
    }
}
