//! Core types and constants shared by the regtest harness crates.
//!
//! Network parameters for the regression-test chain, atomic-unit amount
//! helpers, and CryptoNote Base58 address encoding.

pub mod address;
pub mod base58;
pub mod constants;

pub use address::ParsedAddress;
pub use constants::{AddressType, NetParams, Network};

/// Keccak-256 as used by CryptoNote (original padding, not SHA3).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};

    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}
