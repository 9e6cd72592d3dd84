//! Harness and funding configuration, and the scenario presets.

use crate::binary::{SALVIUMD, SALVIUM_WALLET_RPC};
use salvium_rpc::wallet_rpc::priority;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How to launch and talk to the regtest processes.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub daemon_bin: PathBuf,
    pub wallet_rpc_bin: PathBuf,
    /// Appended to the daemon command line.
    pub extra_daemon_args: Vec<String>,
    /// Upper bound on waiting for a process to answer RPC.
    pub setup_timeout: Duration,
    /// Readiness and sync poll interval.
    pub poll_interval: Duration,
    /// Per-request RPC timeout.
    pub rpc_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            daemon_bin: SALVIUMD.resolve(),
            wallet_rpc_bin: SALVIUM_WALLET_RPC.resolve(),
            extra_daemon_args: Vec::new(),
            setup_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            rpc_timeout: Duration::from_secs(120),
        }
    }
}

/// Parameters of the funding loop and the sync wait before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingConfig {
    /// Outputs to send, one per iteration.
    pub iterations: u32,
    /// Atomic units per output.
    pub amount: u64,
    /// Transfer priority used by the mining wallet.
    pub priority: u32,
    /// Account that receives the outputs.
    pub account: u32,
    /// Confirmations required for a balance to count as spendable.
    pub min_confirmations: u64,
    /// Upper bound on waiting for the wallet to sync.
    pub sync_timeout: Duration,
    /// Interval of the "waiting for sync" log line.
    pub sync_log_interval: Duration,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            amount: 1_000_000,
            priority: priority::UNIMPORTANT,
            account: 0,
            min_confirmations: 1,
            sync_timeout: Duration::from_secs(300),
            sync_log_interval: Duration::from_secs(1),
        }
    }
}

impl FundingConfig {
    /// Total atomic units the loop sends.
    pub fn total(&self) -> u64 {
        self.amount * u64::from(self.iterations)
    }
}

/// A complete run: chain length, test wallet and funding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    /// Blocks mined beyond coinbase maturity during setup.
    pub mature_outputs: u64,
    pub seed: [u8; 32],
    pub public_passphrase: String,
    pub private_passphrase: String,
    pub funding: FundingConfig,
}

impl Scenario {
    /// 25 mature outputs, 20 sends of 1,000,000.
    pub fn standard() -> Self {
        Self {
            name: "standard",
            mature_outputs: 25,
            seed: [0u8; 32],
            public_passphrase: "public".to_string(),
            private_passphrase: "private".to_string(),
            funding: FundingConfig::default(),
        }
    }

    /// 60 mature outputs, 60 sends of 100,000.
    pub fn flood() -> Self {
        Self {
            name: "flood",
            mature_outputs: 60,
            funding: FundingConfig {
                iterations: 60,
                amount: 100_000,
                ..FundingConfig::default()
            },
            ..Self::standard()
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::standard()
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "flood" => Ok(Self::flood()),
            _ => Err(format!("unknown scenario: {} (use standard or flood)", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scenario() {
        let s = Scenario::standard();
        assert_eq!(s.mature_outputs, 25);
        assert_eq!(s.seed, [0u8; 32]);
        assert_eq!(s.public_passphrase, "public");
        assert_eq!(s.private_passphrase, "private");
        assert_eq!(s.funding.iterations, 20);
        assert_eq!(s.funding.amount, 1_000_000);
        assert_eq!(s.funding.total(), 20_000_000);
    }

    #[test]
    fn test_flood_scenario() {
        let s = Scenario::flood();
        assert_eq!(s.mature_outputs, 60);
        assert_eq!(s.funding.iterations, 60);
        assert_eq!(s.funding.amount, 100_000);
        assert_eq!(s.private_passphrase, "private");
    }

    #[test]
    fn test_scenario_from_str() {
        assert_eq!("Flood".parse::<Scenario>().unwrap().name, "flood");
        assert_eq!("standard".parse::<Scenario>().unwrap().name, "standard");
        assert!("bogus".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_harness_defaults() {
        let cfg = HarnessConfig::default();
        assert!(cfg.extra_daemon_args.is_empty());
        assert!(cfg.setup_timeout >= Duration::from_secs(10));
        assert!(cfg.daemon_bin.ends_with("salviumd") || std::env::var_os("SALVIUMD_BIN").is_some());
    }
}
