//! Regtest mining node.
//!
//! A [`Harness`] owns a `salviumd --regtest` process, a miner wallet served
//! by its own `salvium-wallet-rpc`, and the temporary directory both write
//! to. Setup optionally mines a chain whose coinbase outputs are mature, and
//! [`Harness::send_outputs`] pays outputs from the miner wallet and mines
//! the block that confirms them.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::process::ChildProcess;
use crate::wallet_service::{free_port, WalletService};
use log::{debug, info};
use salvium_rpc::error::codes;
use salvium_rpc::wallet_rpc::Destination;
use salvium_rpc::{DaemonRpc, RpcConfig};
use salvium_types::constants::NetParams;
use salvium_wallet::{Wallet, WalletError, WalletLoader};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const MINER_WALLET_NAME: &str = "miner";

/// Blocks mined per `generateblocks` call during setup.
const SETUP_BATCH: u64 = 50;

struct Miner {
    service: WalletService,
    wallet: Arc<Wallet>,
}

pub struct Harness {
    params: NetParams,
    config: HarnessConfig,
    extra_args: Vec<String>,
    data_dir: Option<TempDir>,
    rpc_port: u16,
    p2p_port: u16,
    zmq_port: u16,
    daemon_rpc: DaemonRpc,
    daemon: Option<ChildProcess>,
    miner: Option<Miner>,
}

impl Harness {
    /// Allocate a data directory and ports. Nothing is started yet.
    pub fn new(
        params: NetParams,
        extra_args: &[String],
        config: HarnessConfig,
    ) -> Result<Self, HarnessError> {
        let data_dir = tempfile::Builder::new()
            .prefix("salvium-regtest-")
            .tempdir()
            .map_err(|source| HarnessError::TempDir {
                what: "node data directory",
                source,
            })?;

        let rpc_port = free_port()?;
        let p2p_port = free_port()?;
        let zmq_port = free_port()?;

        let daemon_rpc = DaemonRpc::with_config(RpcConfig {
            timeout: config.rpc_timeout,
            ..RpcConfig::for_url(&format!("http://127.0.0.1:{}", rpc_port))
        })?;

        let mut args = config.extra_daemon_args.clone();
        args.extend_from_slice(extra_args);

        Ok(Self {
            params,
            config,
            extra_args: args,
            data_dir: Some(data_dir),
            rpc_port,
            p2p_port,
            zmq_port,
            daemon_rpc,
            daemon: None,
            miner: None,
        })
    }

    pub fn params(&self) -> &NetParams {
        &self.params
    }

    /// Node data directory, `None` after tear-down.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_ref().map(|d| d.path())
    }

    /// Daemon RPC `host:port`.
    pub fn daemon_address(&self) -> String {
        format!("127.0.0.1:{}", self.rpc_port)
    }

    /// Connection parameters for clients of the daemon RPC.
    pub fn rpc_config(&self) -> RpcConfig {
        self.daemon_rpc.client().config().clone()
    }

    pub fn daemon(&self) -> &DaemonRpc {
        &self.daemon_rpc
    }

    fn daemon_args(&self, data_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--regtest".into(),
            "--offline".into(),
            "--fixed-difficulty".into(),
            "1".into(),
            "--no-igd".into(),
            "--non-interactive".into(),
            "--disable-dns-checkpoints".into(),
            "--check-updates".into(),
            "disabled".into(),
            "--rpc-ssl".into(),
            "disabled".into(),
            "--rpc-bind-ip".into(),
            "127.0.0.1".into(),
            "--rpc-bind-port".into(),
            self.rpc_port.to_string(),
            "--p2p-bind-port".into(),
            self.p2p_port.to_string(),
            "--zmq-rpc-bind-port".into(),
            self.zmq_port.to_string(),
            "--data-dir".into(),
            data_dir.join("daemon").display().to_string(),
            "--log-level".into(),
            "1".into(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Start the daemon and miner wallet.
    ///
    /// With `create_test_chain`, mines `coinbase_maturity + mature_outputs`
    /// blocks to the miner so that `mature_outputs` coinbase outputs are
    /// spendable.
    pub async fn set_up(
        &mut self,
        create_test_chain: bool,
        mature_outputs: u64,
    ) -> Result<(), HarnessError> {
        let data_dir = self
            .data_dir
            .as_ref()
            .ok_or(HarnessError::NotSetUp)?
            .path()
            .to_path_buf();

        let args = self.daemon_args(&data_dir);
        let daemon = ChildProcess::spawn("salviumd", &self.config.daemon_bin, &args, &data_dir)?;
        self.daemon = Some(daemon);
        self.wait_for_daemon().await?;
        info!("{} daemon ready at {}", self.params.name, self.daemon_address());

        let miner_dir = data_dir.join("miner");
        std::fs::create_dir_all(&miner_dir).map_err(|source| HarnessError::TempDir {
            what: "miner wallet directory",
            source,
        })?;
        let service = WalletService::start(
            "miner-wallet-rpc",
            &self.config,
            &miner_dir,
            &self.daemon_address(),
        )
        .await?;

        let loader = WalletLoader::new(self.params, &miner_dir, service.rpc())
            .with_file_name(MINER_WALLET_NAME);
        let wallet = loader.create_random_wallet("", "").await?;
        wallet.unlock("").await?;
        wallet.connect(&self.daemon_address()).await?;
        debug!("miner address {}", wallet.primary_address());

        self.miner = Some(Miner {
            service,
            wallet: Arc::new(wallet),
        });

        if create_test_chain {
            let blocks = self.params.coinbase_maturity + mature_outputs;
            let mut left = blocks;
            while left > 0 {
                let batch = left.min(SETUP_BATCH);
                self.generate(batch).await?;
                left -= batch;
            }
            self.miner()?.wallet.refresh().await?;
            let tip = self.daemon_rpc.get_last_block_header().await?;
            info!("mined {} blocks, tip {} at {}", blocks, tip.hash, tip.height);
        }
        Ok(())
    }

    async fn wait_for_daemon(&mut self) -> Result<(), HarnessError> {
        let timeout = self.config.setup_timeout;
        let poll = self.config.poll_interval;
        let daemon_rpc = &self.daemon_rpc;
        let process = self.daemon.as_mut().ok_or(HarnessError::NotSetUp)?;

        let ready = tokio::time::timeout(timeout, async {
            loop {
                process.ensure_running()?;
                if let Ok(info) = daemon_rpc.get_info().await {
                    return Ok::<_, HarnessError>(info);
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await;

        let info = match ready {
            Ok(result) => result?,
            Err(_) => {
                return Err(HarnessError::NotReady {
                    name: "salviumd".to_string(),
                    timeout,
                })
            }
        };
        if !info.is_regtest() {
            return Err(HarnessError::Other(format!(
                "daemon reports network '{}', expected fakechain",
                info.nettype
            )));
        }
        Ok(())
    }

    fn miner(&self) -> Result<&Miner, HarnessError> {
        self.miner.as_ref().ok_or(HarnessError::NotSetUp)
    }

    /// The miner wallet.
    pub fn miner_wallet(&self) -> Result<Arc<Wallet>, HarnessError> {
        Ok(self.miner()?.wallet.clone())
    }

    /// Mine `blocks` blocks to the miner wallet. Returns their hashes.
    pub async fn generate(&self, blocks: u64) -> Result<Vec<String>, HarnessError> {
        let miner = self.miner()?;
        let result = self
            .daemon_rpc
            .generate_blocks(blocks, miner.wallet.primary_address())
            .await?;
        debug!("generated {} blocks, height {}", result.blocks.len(), result.height);
        Ok(result.blocks)
    }

    pub async fn node_height(&self) -> Result<u64, HarnessError> {
        Ok(self.daemon_rpc.get_height().await?)
    }

    /// Pay `outputs` from the miner wallet and mine one block including the
    /// transaction. Returns the transaction hash.
    pub async fn send_outputs(
        &self,
        outputs: &[Destination],
        priority: u32,
    ) -> Result<String, HarnessError> {
        let miner = self.miner()?;
        let transfer = miner
            .wallet
            .transfer(outputs, 0, priority)
            .await
            .map_err(map_transfer_error)?;
        let tx_hash = transfer
            .tx_hash
            .ok_or_else(|| HarnessError::Other("transfer returned no tx hash".into()))?;
        debug!("miner sent {} (fee {})", tx_hash, transfer.fee);

        self.generate(1).await?;
        miner.wallet.refresh().await?;
        Ok(tx_hash)
    }

    /// Stop both processes and delete the data directory. Safe to call more
    /// than once; also run on drop.
    pub fn tear_down(&mut self) {
        if let Some(mut miner) = self.miner.take() {
            miner.service.stop();
        }
        if let Some(mut daemon) = self.daemon.take() {
            daemon.kill();
        }
        if let Some(dir) = self.data_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("failed to remove {}: {}", path.display(), e);
            } else {
                debug!("removed {}", path.display());
            }
        }
    }
}

fn map_transfer_error(e: WalletError) -> HarnessError {
    match &e {
        WalletError::Rpc(rpc) if rpc.rpc_code() == Some(codes::NOT_ENOUGH_MONEY) => {
            HarnessError::MinerUnderfunded(e)
        }
        _ => HarnessError::Wallet(e),
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness() -> Harness {
        Harness::new(
            NetParams::regtest(),
            &["--txindex".to_string()],
            HarnessConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_allocates_dir_and_ports() {
        let h = harness();
        let dir = h.data_dir().unwrap().to_path_buf();
        assert!(dir.is_dir());
        assert_ne!(h.rpc_port, 0);
        assert_eq!(h.rpc_config().url, format!("http://{}", h.daemon_address()));
    }

    #[test]
    fn test_daemon_args() {
        let h = harness();
        let data_dir = h.data_dir().unwrap().to_path_buf();
        let args = h.daemon_args(&data_dir);
        assert_eq!(args[0], "--regtest");
        assert!(args.contains(&"--offline".to_string()));
        assert!(args.contains(&h.rpc_port.to_string()));
        assert_eq!(args.last().unwrap(), "--txindex");
    }

    #[test]
    fn test_tear_down_removes_dir_and_is_idempotent() {
        let mut h = harness();
        let dir = h.data_dir().unwrap().to_path_buf();
        h.tear_down();
        assert!(!dir.exists());
        assert!(h.data_dir().is_none());
        h.tear_down();
    }

    #[test]
    fn test_drop_removes_dir() {
        let h = harness();
        let dir = h.data_dir().unwrap().to_path_buf();
        drop(h);
        assert!(!dir.exists());
    }

    #[test]
    fn test_independent_harnesses() {
        let a = harness();
        let b = harness();
        assert_ne!(a.data_dir(), b.data_dir());
    }

    #[tokio::test]
    async fn test_operations_require_set_up() {
        let h = harness();
        assert!(matches!(h.generate(1).await, Err(HarnessError::NotSetUp)));
        assert!(matches!(
            h.send_outputs(&[], 0).await,
            Err(HarnessError::NotSetUp)
        ));
        assert!(h.miner_wallet().is_err());
    }

    #[tokio::test]
    async fn test_set_up_after_tear_down_fails() {
        let mut h = harness();
        h.tear_down();
        assert!(matches!(
            h.set_up(false, 0).await,
            Err(HarnessError::NotSetUp)
        ));
    }

    #[test]
    fn test_not_enough_money_maps_to_underfunded() {
        let rpc_err = |code| {
            WalletError::Rpc(salvium_rpc::RpcError::Rpc {
                code,
                message: "not enough money".into(),
                method: "transfer".into(),
            })
        };
        assert!(matches!(
            map_transfer_error(rpc_err(codes::NOT_ENOUGH_MONEY)),
            HarnessError::MinerUnderfunded(_)
        ));
        assert!(matches!(
            map_transfer_error(rpc_err(codes::UNKNOWN)),
            HarnessError::Wallet(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_set_up_reports_dead_daemon() {
        let mut h = Harness::new(
            NetParams::regtest(),
            &[],
            HarnessConfig {
                daemon_bin: "false".into(),
                poll_interval: std::time::Duration::from_millis(20),
                ..HarnessConfig::default()
            },
        )
        .unwrap();
        let err = h.set_up(true, 25).await.unwrap_err();
        assert!(matches!(err, HarnessError::Exited { .. }), "got {:?}", err);
    }
}
