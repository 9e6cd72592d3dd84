//! Harness error types.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("RPC error: {0}")]
    Rpc(#[from] salvium_rpc::RpcError),

    #[error("wallet error: {0}")]
    Wallet(#[from] salvium_wallet::WalletError),

    #[error("failed to create {what}: {source}")]
    TempDir {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("no free local port available")]
    NoFreePort,

    #[error("failed to spawn {name} ('{binary}'): {source}")]
    Spawn {
        name: String,
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} exited during startup ({status})")]
    Exited { name: String, status: String },

    #[error("{name} did not answer RPC within {timeout:?}")]
    NotReady { name: String, timeout: Duration },

    #[error("miner wallet cannot cover the outputs; mine more mature outputs during setup")]
    MinerUnderfunded(#[source] salvium_wallet::WalletError),

    #[error("harness is not set up")]
    NotSetUp,

    #[error("wallet did not sync within {0:?}")]
    SyncTimeout(Duration),

    #[error("chain syncer stopped before the wallet synced")]
    SyncerStopped,

    #[error("wallet at height {wallet_height} is behind the node at {node_height} after sync")]
    BehindNode {
        wallet_height: u64,
        node_height: u64,
    },

    #[error("{0}")]
    Other(String),
}
