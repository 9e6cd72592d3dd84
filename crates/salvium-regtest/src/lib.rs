//! Salvium regtest harness.
//!
//! Starts a disposable `salviumd --regtest` node with a mining wallet,
//! provisions a test wallet in a temporary directory, and funds it once a
//! chain syncer reports it caught up with the node.
//!
//! # Example
//!
//! ```no_run
//! use salvium_regtest::{run_sync_then_fund, Harness, HarnessConfig, Scenario, WalletProvisioner};
//! use salvium_types::constants::NetParams;
//!
//! # async fn demo() -> Result<(), salvium_regtest::HarnessError> {
//! let scenario = Scenario::standard();
//! let config = HarnessConfig::default();
//! let mut harness = Harness::new(NetParams::regtest(), &[], config.clone())?;
//! harness.set_up(true, scenario.mature_outputs).await?;
//!
//! let provisioner = WalletProvisioner::start(NetParams::regtest(), &config, &harness.daemon_address()).await?;
//! let wallet = provisioner
//!     .create_wallet(&scenario.public_passphrase, &scenario.private_passphrase, &scenario.seed)
//!     .await?;
//! wallet.unlock(&scenario.private_passphrase).await?;
//!
//! let report = run_sync_then_fund(&harness, wallet, &scenario.funding, config.poll_interval).await?;
//! println!("received {}", report.received());
//! # Ok(())
//! # }
//! ```

pub mod binary;
pub mod config;
pub mod error;
pub mod funding;
pub mod node;
pub mod orchestrator;
pub mod process;
pub mod provision;
pub mod signal;
pub mod wallet_service;

pub use config::{FundingConfig, HarnessConfig, Scenario};
pub use error::HarnessError;
pub use funding::{fund, FundingReport, FundingWallet, OutputSender};
pub use node::Harness;
pub use orchestrator::{run_sync_then_fund, wait_then_fund, SyncerTask};
pub use provision::WalletProvisioner;
pub use signal::{sync_signal, SyncNotifier, SyncWaiter};
