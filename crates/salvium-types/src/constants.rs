//! Salvium network constants, address prefixes and amount helpers.
//!
//! Reference: salvium/src/cryptonote_config.h

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Types
// =============================================================================

/// Network type identifier used for address prefixes.
///
/// A regtest daemon runs a fakechain that uses mainnet address prefixes, so
/// there is no separate regtest variant here; see [`NetParams::regtest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Stagenet,
}

/// Legacy (CryptoNote) address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Standard,
    Integrated,
    Subaddress,
}

// =============================================================================
// Address Prefixes
// =============================================================================

/// Address prefix entry: the varint prefix value and its human-readable text.
#[derive(Debug, Clone, Copy)]
pub struct PrefixInfo {
    pub prefix: u64,
    pub text: &'static str,
    pub network: Network,
    pub address_type: AddressType,
}

/// Legacy address prefixes (3 networks × 3 types).
pub const LEGACY_PREFIXES: [PrefixInfo; 9] = [
    PrefixInfo { prefix: 0x3ef318,    text: "SaLv",   network: Network::Mainnet,  address_type: AddressType::Standard },
    PrefixInfo { prefix: 0x55ef318,   text: "SaLvi",  network: Network::Mainnet,  address_type: AddressType::Integrated },
    PrefixInfo { prefix: 0xf5ef318,   text: "SaLvs",  network: Network::Mainnet,  address_type: AddressType::Subaddress },
    PrefixInfo { prefix: 0x15beb318,  text: "SaLvT",  network: Network::Testnet,  address_type: AddressType::Standard },
    PrefixInfo { prefix: 0xd055eb318, text: "SaLvTi", network: Network::Testnet,  address_type: AddressType::Integrated },
    PrefixInfo { prefix: 0xa59eb318,  text: "SaLvTs", network: Network::Testnet,  address_type: AddressType::Subaddress },
    PrefixInfo { prefix: 0x149eb318,  text: "SaLvS",  network: Network::Stagenet, address_type: AddressType::Standard },
    PrefixInfo { prefix: 0xf343eb318, text: "SaLvSi", network: Network::Stagenet, address_type: AddressType::Integrated },
    PrefixInfo { prefix: 0x2d47eb318, text: "SaLvSs", network: Network::Stagenet, address_type: AddressType::Subaddress },
];

/// Look up prefix info by varint prefix value.
pub fn prefix_info(prefix: u64) -> Option<&'static PrefixInfo> {
    LEGACY_PREFIXES.iter().find(|p| p.prefix == prefix)
}

/// Get the prefix value for a network/type combination.
pub fn get_prefix(network: Network, address_type: AddressType) -> u64 {
    let row = match network {
        Network::Mainnet => 0,
        Network::Testnet => 3,
        Network::Stagenet => 6,
    };
    let col = match address_type {
        AddressType::Standard => 0,
        AddressType::Integrated => 1,
        AddressType::Subaddress => 2,
    };
    LEGACY_PREFIXES[row + col].prefix
}

/// Size of a public or secret key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the address checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Size of the payment ID for integrated addresses.
pub const PAYMENT_ID_SIZE: usize = 8;

/// Address data size (without prefix) for an address type.
pub fn address_data_size(address_type: AddressType) -> usize {
    match address_type {
        AddressType::Integrated => KEY_SIZE * 2 + PAYMENT_ID_SIZE,
        AddressType::Standard | AddressType::Subaddress => KEY_SIZE * 2,
    }
}

// =============================================================================
// Maturity
// =============================================================================

/// Coinbase maturity window (blocks).
pub const MINED_MONEY_UNLOCK_WINDOW: u64 = 60;

/// Default minimum age before a regular output can be spent (blocks).
pub const DEFAULT_TX_SPENDABLE_AGE: u64 = 10;

/// Parameters of the chain the harness runs against.
///
/// Read-only for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetParams {
    /// Human-readable name, also used in log lines.
    pub name: &'static str,
    /// Network whose address prefixes the chain uses.
    pub address_network: Network,
    /// Blocks before a coinbase output is spendable.
    pub coinbase_maturity: u64,
    /// Blocks before a regular output is spendable.
    pub spendable_age: u64,
}

impl NetParams {
    /// Regression-test fakechain (`salviumd --regtest`).
    pub const fn regtest() -> Self {
        Self {
            name: "regtest",
            address_network: Network::Mainnet,
            coinbase_maturity: MINED_MONEY_UNLOCK_WINDOW,
            spendable_age: DEFAULT_TX_SPENDABLE_AGE,
        }
    }
}

impl Default for NetParams {
    fn default() -> Self {
        Self::regtest()
    }
}

// =============================================================================
// Amount Helpers
// =============================================================================

/// Atomic units per coin (10^8).
pub const COIN: u64 = 100_000_000;

/// Format an atomic amount as a human-readable string (e.g., 1.23456789).
pub fn format_amount(atomic: u64) -> String {
    let whole = atomic / COIN;
    let frac = atomic % COIN;
    if frac == 0 {
        return format!("{}.0", whole);
    }
    let frac_str = format!("{:08}", frac);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Parse a human-readable amount string to atomic units.
pub fn parse_amount(s: &str) -> Option<u64> {
    let s = s.trim();
    let (whole_str, frac_str) = s.split_once('.').unwrap_or((s, ""));

    let whole: u64 = whole_str.parse().ok()?;
    let frac: u64 = match frac_str.len() {
        0 => 0,
        1..=8 => format!("{:0<8}", frac_str).parse().ok()?,
        _ => return None,
    };

    whole.checked_mul(COIN)?.checked_add(frac)
}
