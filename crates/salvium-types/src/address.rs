//! Legacy (CryptoNote) address creation and parsing.

use crate::base58;
use crate::constants::{
    address_data_size, get_prefix, prefix_info, AddressType, Network, KEY_SIZE, PAYMENT_ID_SIZE,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address must be a non-empty string")]
    Empty,

    #[error("base58 decode error: {0}")]
    Base58(#[from] base58::Base58Error),

    #[error("unknown address prefix: 0x{0:x}")]
    UnknownPrefix(u64),

    #[error("invalid data length: expected {expected} bytes, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },

    #[error("address is for {actual:?}, expected {expected:?}")]
    WrongNetwork { expected: Network, actual: Network },

    #[error("{actual:?} address, expected {expected:?}")]
    WrongType {
        expected: AddressType,
        actual: AddressType,
    },
}

/// Result of parsing an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub network: Network,
    pub address_type: AddressType,
    pub prefix_text: &'static str,
    pub spend_public_key: [u8; KEY_SIZE],
    pub view_public_key: [u8; KEY_SIZE],
    pub payment_id: Option<[u8; PAYMENT_ID_SIZE]>,
}

/// Create a standard address from a spend/view public key pair.
pub fn create_standard_address(
    network: Network,
    spend_public_key: &[u8; KEY_SIZE],
    view_public_key: &[u8; KEY_SIZE],
) -> String {
    let mut data = Vec::with_capacity(KEY_SIZE * 2);
    data.extend_from_slice(spend_public_key);
    data.extend_from_slice(view_public_key);
    base58::encode_address(get_prefix(network, AddressType::Standard), &data)
}

/// Parse and validate an address string.
pub fn parse_address(address: &str) -> Result<ParsedAddress, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    let (prefix, data) = base58::decode_address(address)?;
    let info = prefix_info(prefix).ok_or(AddressError::UnknownPrefix(prefix))?;

    let expected = address_data_size(info.address_type);
    if data.len() != expected {
        return Err(AddressError::InvalidDataLength {
            expected,
            actual: data.len(),
        });
    }

    let mut spend_public_key = [0u8; KEY_SIZE];
    let mut view_public_key = [0u8; KEY_SIZE];
    spend_public_key.copy_from_slice(&data[..KEY_SIZE]);
    view_public_key.copy_from_slice(&data[KEY_SIZE..KEY_SIZE * 2]);

    let payment_id = match info.address_type {
        AddressType::Integrated => {
            let mut pid = [0u8; PAYMENT_ID_SIZE];
            pid.copy_from_slice(&data[KEY_SIZE * 2..]);
            Some(pid)
        }
        _ => None,
    };

    Ok(ParsedAddress {
        network: info.network,
        address_type: info.address_type,
        prefix_text: info.text,
        spend_public_key,
        view_public_key,
        payment_id,
    })
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address_for(address: &str, network: Network) -> Result<ParsedAddress, AddressError> {
    let parsed = parse_address(address)?;
    if parsed.network != network {
        return Err(AddressError::WrongNetwork {
            expected: network,
            actual: parsed.network,
        });
    }
    Ok(parsed)
}

/// Parse an address and require both its network and its kind.
pub fn parse_address_as(
    address: &str,
    network: Network,
    address_type: AddressType,
) -> Result<ParsedAddress, AddressError> {
    let parsed = parse_address_for(address, network)?;
    if parsed.address_type != address_type {
        return Err(AddressError::WrongType {
            expected: address_type,
            actual: parsed.address_type,
        });
    }
    Ok(parsed)
}
