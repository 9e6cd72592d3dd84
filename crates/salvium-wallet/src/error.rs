//! Wallet error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid seed length: expected 32, got {0}")]
    InvalidSeedLength(usize),

    #[error("RPC error: {0}")]
    Rpc(#[from] salvium_rpc::RpcError),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] salvium_types::address::AddressError),

    #[error("wallet service derived address {actual}, expected {expected}")]
    AddressMismatch { expected: String, actual: String },

    #[error("wrong passphrase")]
    WrongPassphrase,

    #[error("wallet is locked, cannot {0}")]
    Locked(&'static str),

    #[error("wallet file already exists: {0}")]
    AlreadyExists(String),

    #[error("sync error: {0}")]
    Sync(String),
}
