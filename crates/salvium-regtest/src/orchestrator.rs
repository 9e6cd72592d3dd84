//! Sync-then-fund flow.
//!
//! A chain syncer runs as a background task and fires the sync signal from
//! its callback. The foreground waits on the signal (bounded by the
//! configured timeout) and then runs the funding loop.

use crate::config::FundingConfig;
use crate::error::HarnessError;
use crate::funding::{fund, FundingReport, FundingWallet, OutputSender};
use crate::node::Harness;
use crate::signal::{sync_signal, SyncWaiter};
use log::{debug, info, warn};
use salvium_rpc::RpcConfig;
use salvium_wallet::{Callbacks, ChainSyncer, Wallet, WalletError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background chain syncer. Aborted on drop if not stopped.
pub struct SyncerTask {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<Result<(), WalletError>>>,
}

impl SyncerTask {
    /// Spawn a syncer for `wallet` against `daemon`. The returned waiter is
    /// signalled when the wallet first catches up.
    pub fn spawn(
        wallet: Arc<Wallet>,
        daemon: RpcConfig,
        poll_interval: Duration,
    ) -> Result<(Self, SyncWaiter), HarnessError> {
        let (notifier, waiter) = sync_signal();
        let mut syncer = ChainSyncer::new(wallet, daemon)?.with_poll_interval(poll_interval);
        syncer.set_callbacks(Callbacks {
            synced: Some(Box::new(move |synced| {
                if synced && notifier.notify() {
                    info!("wallet chain syncer synced");
                }
            })),
        });
        info!("wallet chain syncer created");

        if let Some(mut events) = syncer.events() {
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    debug!("sync event: {:?}", event);
                }
            });
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!("starting syncer...");
            let result = syncer.run(shutdown_rx).await;
            if let Err(e) = &result {
                warn!("error after syncer run: {}", e);
            }
            result
        });

        Ok((
            Self {
                shutdown,
                handle: Some(handle),
            },
            waiter,
        ))
    }

    /// Ask the syncer to stop and wait for it to finish.
    pub async fn stop(mut self) -> Result<(), HarnessError> {
        let _ = self.shutdown.send(true);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => Ok(result?),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(HarnessError::Other(format!("syncer task failed: {}", e))),
        }
    }
}

impl Drop for SyncerTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown.send(true);
            handle.abort();
        }
    }
}

/// Wait for the sync signal, then run the funding loop.
///
/// Once signalled, the wallet must be at least at the node's height.
pub async fn wait_then_fund<W, S>(
    waiter: &mut SyncWaiter,
    wallet: &W,
    sender: &S,
    config: &FundingConfig,
) -> Result<FundingReport, HarnessError>
where
    W: FundingWallet + ?Sized,
    S: OutputSender + ?Sized,
{
    waiter
        .wait(config.sync_timeout, config.sync_log_interval)
        .await?;

    let wallet_height = wallet.height().await?;
    let node_height = sender.node_height().await?;
    if wallet_height < node_height {
        return Err(HarnessError::BehindNode {
            wallet_height,
            node_height,
        });
    }
    info!(
        "wallet synced: wallet height {}, node height {}",
        wallet_height, node_height
    );
    info!("funding {} outputs", config.iterations);
    fund(wallet, sender, config).await
}

/// Sync `wallet` against the harness node, then fund it from the miner.
pub async fn run_sync_then_fund(
    harness: &Harness,
    wallet: Arc<Wallet>,
    config: &FundingConfig,
    poll_interval: Duration,
) -> Result<FundingReport, HarnessError> {
    let (syncer, mut waiter) =
        SyncerTask::spawn(wallet.clone(), harness.rpc_config(), poll_interval)?;
    let report = wait_then_fund(&mut waiter, wallet.as_ref(), harness, config).await?;
    syncer.stop().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::fakes::{FakeNode, FakeWallet};
    use salvium_rpc::mock::MockChain;
    use salvium_rpc::WalletRpc;
    use salvium_types::constants::NetParams;

    fn config() -> FundingConfig {
        FundingConfig {
            iterations: 3,
            sync_timeout: Duration::from_secs(30),
            ..FundingConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_funds_after_sync() {
        let (notifier, mut waiter) = sync_signal();
        let wallet = FakeWallet::default();
        let node = FakeNode::new(&wallet);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            notifier.notify();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let report = wait_then_fund(&mut waiter, &wallet, &node, &config())
            .await
            .unwrap();
        assert!(waiter.is_synced());
        assert_eq!(report.addresses.len(), 3);
        assert_eq!(node.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_funding_without_sync() {
        let (_notifier, mut waiter) = sync_signal();
        let wallet = FakeWallet::default();
        let node = FakeNode::new(&wallet);

        let err = wait_then_fund(&mut waiter, &wallet, &node, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::SyncTimeout(_)));
        assert!(node.sent.lock().unwrap().is_empty());
        assert_eq!(*wallet.derived.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_syncer_aborts_flow() {
        let (notifier, mut waiter) = sync_signal();
        drop(notifier);
        let wallet = FakeWallet::default();
        let node = FakeNode::new(&wallet);

        let err = wait_then_fund(&mut waiter, &wallet, &node, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::SyncerStopped));
        assert!(node.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_behind_node_is_not_funded() {
        let (notifier, mut waiter) = sync_signal();
        notifier.notify();
        let wallet = FakeWallet {
            height: 40,
            ..FakeWallet::default()
        };
        let mut node = FakeNode::new(&wallet);
        node.height = 41;

        let err = wait_then_fund(&mut waiter, &wallet, &node, &config())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                HarnessError::BehindNode {
                    wallet_height: 40,
                    node_height: 41
                }
            ),
            "got {:?}",
            err
        );
        assert!(node.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_syncer_task_signals_at_node_height() {
        let chain = MockChain::start(30, 4, 5).await.unwrap();
        let heights = chain.heights();
        let rpc = Arc::new(WalletRpc::new(chain.url()).unwrap());
        let wallet = Arc::new(Wallet::new(
            rpc,
            NetParams::regtest(),
            "wallet".into(),
            "SaLv".into(),
        ));

        let (syncer, mut waiter) = SyncerTask::spawn(
            wallet.clone(),
            RpcConfig::for_url(chain.url()),
            Duration::from_millis(10),
        )
        .unwrap();
        waiter
            .wait(Duration::from_secs(5), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(heights.wallet(), heights.node());
        assert_eq!(wallet.height().await.unwrap(), 30);

        // The signalled waiter lets the funding loop start straight away.
        let funded = FakeWallet {
            height: heights.wallet(),
            ..FakeWallet::default()
        };
        let mut node = FakeNode::new(&funded);
        node.height = heights.node();
        let report = wait_then_fund(&mut waiter, &funded, &node, &config())
            .await
            .unwrap();
        assert_eq!(report.tx_hashes.len(), 3);

        syncer.stop().await.unwrap();
        let after_stop = heights.refreshes();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(heights.refreshes(), after_stop);
    }

    #[tokio::test]
    async fn test_syncer_task_failure_surfaces_as_stopped() {
        // Nothing listens here, so the first pass fails and the task ends.
        let dead = RpcConfig {
            retries: 0,
            ..RpcConfig::for_url("http://127.0.0.1:1")
        };
        let rpc = Arc::new(WalletRpc::with_config(dead.clone()).unwrap());
        let wallet = Arc::new(Wallet::new(
            rpc,
            NetParams::regtest(),
            "wallet".into(),
            "SaLv".into(),
        ));
        let (syncer, mut waiter) =
            SyncerTask::spawn(wallet, dead, Duration::from_millis(10)).unwrap();

        let err = waiter
            .wait(Duration::from_secs(5), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::SyncerStopped), "got {:?}", err);
        assert!(matches!(
            syncer.stop().await,
            Err(HarnessError::Wallet(WalletError::Rpc(_)))
        ));
    }

    #[tokio::test]
    async fn test_dropping_syncer_task_aborts_it() {
        let (shutdown, _) = watch::channel(false);
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<Result<(), WalletError>>().await
        });
        drop(SyncerTask {
            shutdown,
            handle: Some(handle),
        });
        // The task future, and the sender it holds, is dropped on abort.
        let closed = tokio::time::timeout(Duration::from_secs(5), alive_rx)
            .await
            .unwrap();
        assert!(closed.is_err());
    }

    #[tokio::test]
    async fn test_stop_waits_for_clean_exit() {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            Ok::<(), WalletError>(())
        });
        let task = SyncerTask {
            shutdown,
            handle: Some(handle),
        };
        task.stop().await.unwrap();
    }
}
