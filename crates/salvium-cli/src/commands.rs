//! CLI command implementations.

use crate::AppContext;
use log::info;
use salvium_regtest::{run_sync_then_fund, Harness, Scenario, WalletProvisioner};
use salvium_rpc::wallet_rpc::priority;
use salvium_types::constants::{format_amount, parse_amount, NetParams};
use salvium_wallet::WalletKeys;
use std::time::Duration;

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

fn hex_to_32(s: &str) -> std::result::Result<[u8; 32], Box<dyn std::error::Error>> {
    let bytes = hex::decode(s.trim())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()).into());
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

fn parse_priority(s: &str) -> std::result::Result<u32, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "default" => Ok(priority::DEFAULT),
        "unimportant" | "low" => Ok(priority::UNIMPORTANT),
        "normal" => Ok(priority::NORMAL),
        "elevated" | "high" => Ok(priority::ELEVATED),
        _ => Err(format!(
            "unknown priority: {} (use default, unimportant, normal, or elevated)",
            s
        )
        .into()),
    }
}

/// Command-line overrides of the scenario's funding parameters.
pub struct FundOverrides {
    pub iterations: Option<u32>,
    pub amount: Option<String>,
    pub priority: Option<String>,
    pub sync_timeout: Option<u64>,
    pub seed: Option<String>,
}

fn apply_overrides(
    mut scenario: Scenario,
    o: &FundOverrides,
) -> std::result::Result<Scenario, Box<dyn std::error::Error>> {
    if let Some(n) = o.iterations {
        scenario.funding.iterations = n;
    }
    if let Some(ref amount) = o.amount {
        scenario.funding.amount =
            parse_amount(amount).ok_or_else(|| format!("invalid amount: {}", amount))?;
        if scenario.funding.amount == 0 {
            return Err("amount must be positive".into());
        }
    }
    if let Some(ref p) = o.priority {
        scenario.funding.priority = parse_priority(p)?;
    }
    if let Some(secs) = o.sync_timeout {
        scenario.funding.sync_timeout = Duration::from_secs(secs);
    }
    if let Some(ref seed) = o.seed {
        scenario.seed = hex_to_32(seed)?;
    }
    Ok(scenario)
}

// ─── Commands ───────────────────────────────────────────────────────────────

pub async fn fund(ctx: &AppContext, overrides: FundOverrides, json: bool) -> Result {
    let scenario = apply_overrides(ctx.scenario.clone(), &overrides)?;
    let params = NetParams::regtest();
    info!(
        "scenario {}: {} outputs of {} SAL",
        scenario.name,
        scenario.funding.iterations,
        format_amount(scenario.funding.amount)
    );

    let mut harness = Harness::new(params, &[], ctx.harness.clone())?;
    info!("mining node created");
    harness.set_up(true, scenario.mature_outputs).await?;
    info!("mining node setup");

    let provisioner =
        WalletProvisioner::start(params, &ctx.harness, &harness.daemon_address()).await?;
    let wallet = provisioner
        .create_wallet(
            &scenario.public_passphrase,
            &scenario.private_passphrase,
            &scenario.seed,
        )
        .await?;
    info!("wallet created");
    wallet.unlock(&scenario.private_passphrase).await?;
    info!("wallet unlocked");

    let report = run_sync_then_fund(
        &harness,
        wallet,
        &scenario.funding,
        ctx.harness.poll_interval,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("Outputs sent:   {}", report.tx_hashes.len());
        println!("Received:       {} SAL", format_amount(report.received()));
        println!("Final balance:  {}", report.final_balance);
    }
    info!("Done!");

    drop(provisioner);
    harness.tear_down();
    Ok(())
}

pub async fn run_node(ctx: &AppContext) -> Result {
    let mut harness = Harness::new(NetParams::regtest(), &[], ctx.harness.clone())?;
    harness.set_up(true, ctx.scenario.mature_outputs).await?;

    let miner = harness.miner_wallet()?;
    println!("Daemon RPC:     http://{}", harness.daemon_address());
    println!("Height:         {}", harness.node_height().await?);
    println!("Miner address:  {}", miner.primary_address());
    if let Some(dir) = harness.data_dir() {
        println!("Data directory: {}", dir.display());
    }
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    harness.tear_down();
    Ok(())
}

pub fn show_keys(_ctx: &AppContext, seed: Option<&str>) -> Result {
    let seed = match seed {
        Some(s) => hex_to_32(s)?,
        None => [0u8; 32],
    };
    let keys = WalletKeys::from_seed(seed, NetParams::regtest().address_network);
    println!("Address:          {}", keys.address());
    println!("Spend public key: {}", hex::encode(keys.spend_public_key));
    println!("View public key:  {}", hex::encode(keys.view_public_key));
    println!("Spend secret key: {}", keys.spend_secret_hex());
    println!("View secret key:  {}", keys.view_secret_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> FundOverrides {
        FundOverrides {
            iterations: None,
            amount: None,
            priority: None,
            sync_timeout: None,
            seed: None,
        }
    }

    #[test]
    fn test_hex_to_32() {
        assert_eq!(hex_to_32(&"00".repeat(32)).unwrap(), [0u8; 32]);
        assert!(hex_to_32("abcd").is_err());
        assert!(hex_to_32("zz").is_err());
    }

    #[test]
    fn test_no_overrides_keeps_scenario() {
        let s = apply_overrides(Scenario::flood(), &none()).unwrap();
        assert_eq!(s, Scenario::flood());
    }

    #[test]
    fn test_overrides() {
        let o = FundOverrides {
            iterations: Some(3),
            amount: Some("0.5".into()),
            priority: Some("Normal".into()),
            sync_timeout: Some(10),
            seed: Some("01".repeat(32)),
        };
        let s = apply_overrides(Scenario::standard(), &o).unwrap();
        assert_eq!(s.funding.iterations, 3);
        assert_eq!(s.funding.amount, 50_000_000);
        assert_eq!(s.funding.priority, priority::NORMAL);
        assert_eq!(s.funding.sync_timeout, Duration::from_secs(10));
        assert_eq!(s.seed, [1u8; 32]);
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("low").unwrap(), priority::UNIMPORTANT);
        assert_eq!(parse_priority("elevated").unwrap(), priority::ELEVATED);
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn test_invalid_amount() {
        let o = FundOverrides {
            amount: Some("lots".into()),
            ..none()
        };
        assert!(apply_overrides(Scenario::standard(), &o).is_err());
        let o = FundOverrides {
            amount: Some("0".into()),
            ..none()
        };
        assert!(apply_overrides(Scenario::standard(), &o).is_err());
    }
}
