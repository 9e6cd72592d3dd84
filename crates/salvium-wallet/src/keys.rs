//! Wallet key derivation.
//!
//! Derives the CryptoNote key pair hierarchy from a 32-byte seed:
//!
//! ```text
//! spend_secret = sc_reduce32(seed)
//! spend_public = spend_secret * G
//! view_secret  = sc_reduce32(keccak256(spend_secret))
//! view_public  = view_secret * G
//! ```

use crate::error::WalletError;
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::scalar::Scalar;
use salvium_types::address::create_standard_address;
use salvium_types::constants::{Network, KEY_SIZE};
use salvium_types::keccak256;

/// CryptoNote key set for a full (spendable) wallet.
pub struct WalletKeys {
    pub seed: [u8; KEY_SIZE],
    pub spend_secret_key: [u8; KEY_SIZE],
    pub spend_public_key: [u8; KEY_SIZE],
    pub view_secret_key: [u8; KEY_SIZE],
    pub view_public_key: [u8; KEY_SIZE],
    pub network: Network,
}

fn sc_reduce32(bytes: [u8; 32]) -> [u8; 32] {
    Scalar::from_bytes_mod_order(bytes).to_bytes()
}

fn public_key(secret: &[u8; 32]) -> [u8; 32] {
    let scalar = Scalar::from_bytes_mod_order(*secret);
    (ED25519_BASEPOINT_TABLE * &scalar).compress().to_bytes()
}

impl WalletKeys {
    /// Derive the key set from a 32-byte seed.
    pub fn from_seed(seed: [u8; KEY_SIZE], network: Network) -> Self {
        let spend_secret_key = sc_reduce32(seed);
        let view_secret_key = sc_reduce32(keccak256(&spend_secret_key));

        Self {
            seed,
            spend_public_key: public_key(&spend_secret_key),
            view_public_key: public_key(&view_secret_key),
            spend_secret_key,
            view_secret_key,
            network,
        }
    }

    /// Derive the key set from seed bytes of unchecked length.
    pub fn from_seed_bytes(seed: &[u8], network: Network) -> Result<Self, WalletError> {
        let seed: [u8; KEY_SIZE] = seed
            .try_into()
            .map_err(|_| WalletError::InvalidSeedLength(seed.len()))?;
        Ok(Self::from_seed(seed, network))
    }

    /// Generate a random seed for a new wallet.
    pub fn random_seed() -> [u8; KEY_SIZE] {
        use rand::RngCore;
        let mut seed = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut seed);
        seed
    }

    /// Primary standard address.
    pub fn address(&self) -> String {
        create_standard_address(self.network, &self.spend_public_key, &self.view_public_key)
    }

    pub fn spend_secret_hex(&self) -> String {
        hex::encode(self.spend_secret_key)
    }

    pub fn view_secret_hex(&self) -> String {
        hex::encode(self.view_secret_key)
    }
}

impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("spend_public_key", &hex::encode(self.spend_public_key))
            .field("view_public_key", &hex::encode(self.view_public_key))
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
