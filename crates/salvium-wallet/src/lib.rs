//! Salvium wallet core.
//!
//! Provides key derivation, wallet provisioning against a
//! `salvium-wallet-rpc` service, balance accounting and chain sync.

pub mod error;
pub mod keys;
pub mod loader;
pub mod sync;
pub mod wallet;

pub use error::WalletError;
pub use keys::WalletKeys;
pub use loader::WalletLoader;
pub use sync::{Callbacks, ChainSyncer, SyncEvent, SyncTracker};
pub use wallet::{Balances, Wallet};
