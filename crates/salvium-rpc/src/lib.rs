//! Salvium RPC client library.
//!
//! Async HTTP clients for the daemon and wallet-rpc JSON-RPC interfaces,
//! limited to the calls a regtest harness needs: chain height, block
//! generation, wallet lifecycle, addresses, balances and transfers.
//!
//! # Example
//!
//! ```ignore
//! use salvium_rpc::DaemonRpc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), salvium_rpc::RpcError> {
//!     let daemon = DaemonRpc::new("http://127.0.0.1:18081")?;
//!     let height = daemon.get_height().await?;
//!     println!("Height: {}", height);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod daemon;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod wallet_rpc;

pub use client::{RpcClient, RpcConfig};
pub use daemon::DaemonRpc;
pub use error::RpcError;
pub use wallet_rpc::WalletRpc;
