//! CryptoNote Base58.
//!
//! Data is cut into 8-byte blocks, each encoding to exactly 11 characters.
//! A trailing partial block maps to a fixed shorter width.

use crate::constants::CHECKSUM_SIZE;
use crate::keccak256;
use thiserror::Error;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded width for a block of `n` bytes.
const ENCODED_BLOCK_SIZES: [usize; FULL_BLOCK_SIZE + 1] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base58Error {
    #[error("invalid character '{0}' at position {1}")]
    InvalidCharacter(char, usize),

    #[error("invalid trailing block width {0}")]
    InvalidLength(usize),

    #[error("numeric overflow in block {0}")]
    Overflow(usize),

    #[error("address too short ({0} bytes)")]
    AddressTooShort(usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("varint incomplete or too long")]
    Varint,
}

fn decoded_width(encoded_width: usize) -> Option<usize> {
    ENCODED_BLOCK_SIZES.iter().position(|&w| w == encoded_width)
}

fn encode_block(block: &[u8], out: &mut Vec<u8>) {
    let width = ENCODED_BLOCK_SIZES[block.len()];
    let start = out.len();
    out.resize(start + width, ALPHABET[0]);

    let mut num = block.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    let mut i = width;
    while num > 0 {
        i -= 1;
        out[start + i] = ALPHABET[(num % 58) as usize];
        num /= 58;
    }
}

fn decode_block(
    block: &[u8],
    block_index: usize,
    offset: usize,
    out: &mut Vec<u8>,
) -> Result<(), Base58Error> {
    let width = decoded_width(block.len()).ok_or(Base58Error::InvalidLength(block.len()))?;

    let mut num: u128 = 0;
    for (i, &ch) in block.iter().enumerate() {
        let digit = ALPHABET
            .iter()
            .position(|&a| a == ch)
            .ok_or(Base58Error::InvalidCharacter(ch as char, offset + i))?;
        num = num * 58 + digit as u128;
    }

    if num >> (8 * width) != 0 {
        return Err(Base58Error::Overflow(block_index));
    }

    out.extend_from_slice(&(num as u64).to_be_bytes()[FULL_BLOCK_SIZE - width..]);
    Ok(())
}

/// Encode binary data to CryptoNote Base58.
pub fn encode(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len() / FULL_BLOCK_SIZE * FULL_ENCODED_BLOCK_SIZE + 11);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut out);
    }
    out.into_iter().map(char::from).collect()
}

/// Decode a CryptoNote Base58 string to binary data.
pub fn decode(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / FULL_ENCODED_BLOCK_SIZE * FULL_BLOCK_SIZE + 8);
    for (i, block) in bytes.chunks(FULL_ENCODED_BLOCK_SIZE).enumerate() {
        decode_block(block, i, i * FULL_ENCODED_BLOCK_SIZE, &mut out)?;
    }
    Ok(out)
}

/// Encode an unsigned LEB128 varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

/// Decode a varint from the start of `data`. Returns (value, bytes_read).
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), Base58Error> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate().take(10) {
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Base58Error::Varint)
}

/// Encode an address: `varint(tag) || data || keccak256(..)[..4]`.
pub fn encode_address(tag: u64, data: &[u8]) -> String {
    let mut payload = encode_varint(tag);
    payload.extend_from_slice(data);
    let checksum = keccak256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_SIZE]);
    encode(&payload)
}

/// Decode an address, verifying the checksum. Returns (tag, data).
pub fn decode_address(address: &str) -> Result<(u64, Vec<u8>), Base58Error> {
    let decoded = decode(address)?;
    if decoded.len() <= CHECKSUM_SIZE {
        return Err(Base58Error::AddressTooShort(decoded.len()));
    }

    let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_SIZE);
    if keccak256(payload)[..CHECKSUM_SIZE] != *checksum {
        return Err(Base58Error::ChecksumMismatch);
    }

    let (tag, read) = decode_varint(payload)?;
    Ok((tag, payload[read..].to_vec()))
}
