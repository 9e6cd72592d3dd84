//! A `salvium-wallet-rpc` process serving one wallet directory.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::process::ChildProcess;
use log::info;
use salvium_rpc::{RpcConfig, WalletRpc};
use std::path::Path;
use std::sync::Arc;

pub struct WalletService {
    process: ChildProcess,
    rpc: Arc<WalletRpc>,
}

pub(crate) fn free_port() -> Result<u16, HarnessError> {
    portpicker::pick_unused_port().ok_or(HarnessError::NoFreePort)
}

fn service_args(wallet_dir: &Path, port: u16, daemon_address: &str) -> Vec<String> {
    vec![
        "--wallet-dir".into(),
        wallet_dir.display().to_string(),
        "--rpc-bind-ip".into(),
        "127.0.0.1".into(),
        "--rpc-bind-port".into(),
        port.to_string(),
        "--disable-rpc-login".into(),
        "--rpc-ssl".into(),
        "disabled".into(),
        "--daemon-ssl".into(),
        "disabled".into(),
        "--daemon-address".into(),
        daemon_address.to_string(),
        "--trusted-daemon".into(),
        "--allow-mismatched-daemon-version".into(),
        "--non-interactive".into(),
        "--log-level".into(),
        "1".into(),
    ]
}

impl WalletService {
    /// Start a service for `wallet_dir`, bound to the daemon at
    /// `daemon_address` (`host:port`), and wait until it answers RPC.
    pub async fn start(
        name: &str,
        config: &HarnessConfig,
        wallet_dir: &Path,
        daemon_address: &str,
    ) -> Result<Self, HarnessError> {
        let port = free_port()?;
        let args = service_args(wallet_dir, port, daemon_address);
        let mut process =
            ChildProcess::spawn(name, &config.wallet_rpc_bin, &args, wallet_dir)?;

        let rpc = WalletRpc::with_config(RpcConfig {
            timeout: config.rpc_timeout,
            ..RpcConfig::for_url(&format!("http://127.0.0.1:{}", port))
        })?;

        let ready = tokio::time::timeout(config.setup_timeout, async {
            loop {
                process.ensure_running()?;
                if rpc.get_version().await.is_ok() {
                    return Ok::<(), HarnessError>(());
                }
                tokio::time::sleep(config.poll_interval).await;
            }
        })
        .await;

        match ready {
            Ok(result) => result?,
            Err(_) => {
                return Err(HarnessError::NotReady {
                    name: name.to_string(),
                    timeout: config.setup_timeout,
                })
            }
        }

        info!("{} listening on 127.0.0.1:{}", name, port);
        Ok(Self {
            process,
            rpc: Arc::new(rpc),
        })
    }

    pub fn rpc(&self) -> Arc<WalletRpc> {
        self.rpc.clone()
    }

    /// Kill the service. Safe to call more than once.
    pub fn stop(&mut self) {
        self.process.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_service_args() {
        let args = service_args(Path::new("/tmp/w"), 40000, "127.0.0.1:40001");
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--wallet-dir") + 1], "/tmp/w");
        assert_eq!(args[pos("--rpc-bind-port") + 1], "40000");
        assert_eq!(args[pos("--daemon-address") + 1], "127.0.0.1:40001");
        assert!(args.contains(&"--disable-rpc-login".to_string()));
    }

    #[test]
    fn test_free_port() {
        let port = free_port().unwrap();
        assert!(portpicker::is_free(port));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_fails_when_process_exits() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            wallet_rpc_bin: PathBuf::from("false"),
            poll_interval: Duration::from_millis(20),
            setup_timeout: Duration::from_secs(10),
            ..HarnessConfig::default()
        };
        let err = WalletService::start("wallet-rpc", &config, dir.path(), "127.0.0.1:1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::Exited { .. }), "got {:?}", err);
    }
}
