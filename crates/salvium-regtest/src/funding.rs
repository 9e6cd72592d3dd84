//! Funding loop: pay a fixed number of fixed-size outputs from the mining
//! node to freshly derived wallet addresses.

use crate::config::FundingConfig;
use crate::error::HarnessError;
use crate::node::Harness;
use async_trait::async_trait;
use log::info;
use salvium_rpc::wallet_rpc::Destination;
use salvium_wallet::{Balances, Wallet};
use serde::Serialize;

/// The wallet being funded.
#[async_trait]
pub trait FundingWallet: Send + Sync {
    /// Wallet chain height.
    async fn height(&self) -> Result<u64, HarnessError>;

    async fn new_external_address(&self, account: u32) -> Result<String, HarnessError>;

    async fn account_balance(
        &self,
        account: u32,
        min_confirmations: u64,
    ) -> Result<Balances, HarnessError>;
}

/// Pays outputs and mines the transaction into a block.
#[async_trait]
pub trait OutputSender: Send + Sync {
    /// Node chain height.
    async fn node_height(&self) -> Result<u64, HarnessError>;

    async fn send_outputs(
        &self,
        outputs: &[Destination],
        priority: u32,
    ) -> Result<String, HarnessError>;
}

#[async_trait]
impl FundingWallet for Wallet {
    async fn height(&self) -> Result<u64, HarnessError> {
        Ok(Wallet::height(self).await?)
    }

    async fn new_external_address(&self, account: u32) -> Result<String, HarnessError> {
        Ok(Wallet::new_external_address(self, account).await?)
    }

    async fn account_balance(
        &self,
        account: u32,
        min_confirmations: u64,
    ) -> Result<Balances, HarnessError> {
        // Pick up blocks mined since the syncer's last pass.
        self.refresh().await?;
        Ok(self
            .calculate_account_balance(account, min_confirmations)
            .await?)
    }
}

#[async_trait]
impl OutputSender for Harness {
    async fn node_height(&self) -> Result<u64, HarnessError> {
        Harness::node_height(self).await
    }

    async fn send_outputs(
        &self,
        outputs: &[Destination],
        priority: u32,
    ) -> Result<String, HarnessError> {
        Harness::send_outputs(self, outputs, priority).await
    }
}

/// Outcome of a funding run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingReport {
    pub initial_balance: Balances,
    pub final_balance: Balances,
    /// Receiving address of each iteration, in order.
    pub addresses: Vec<String>,
    /// Funding transaction of each iteration, in order.
    pub tx_hashes: Vec<String>,
}

impl FundingReport {
    /// Increase of the total balance over the run.
    pub fn received(&self) -> u64 {
        self.final_balance
            .total
            .saturating_sub(self.initial_balance.total)
    }
}

/// Run `config.iterations` funding iterations. The first error ends the run.
///
/// The initial balance is reported but does not change how much is sent.
pub async fn fund<W, S>(
    wallet: &W,
    sender: &S,
    config: &FundingConfig,
) -> Result<FundingReport, HarnessError>
where
    W: FundingWallet + ?Sized,
    S: OutputSender + ?Sized,
{
    let initial_balance = wallet
        .account_balance(config.account, config.min_confirmations)
        .await?;
    info!("initial balance: {}", initial_balance);

    let mut addresses = Vec::with_capacity(config.iterations as usize);
    let mut tx_hashes = Vec::with_capacity(config.iterations as usize);

    for i in 0..config.iterations {
        let address = wallet.new_external_address(config.account).await?;
        let output = Destination {
            address: address.clone(),
            amount: config.amount,
        };
        let tx_hash = sender.send_outputs(&[output], config.priority).await?;
        info!("Sent output {}", i);
        addresses.push(address);
        tx_hashes.push(tx_hash);
    }

    let final_balance = wallet
        .account_balance(config.account, config.min_confirmations)
        .await?;
    info!("final balance: {}", final_balance);

    Ok(FundingReport {
        initial_balance,
        final_balance,
        addresses,
        tx_hashes,
    })
}
