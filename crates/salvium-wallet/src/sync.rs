//! Chain synchronization.
//!
//! [`ChainSyncer`] points a wallet at a daemon and keeps refreshing it,
//! comparing the wallet height with the daemon height on every pass.
//! Registered callbacks learn when the wallet first catches up and when it
//! later falls behind.

use crate::error::WalletError;
use crate::wallet::Wallet;
use log::{debug, info, warn};
use salvium_rpc::{DaemonRpc, RpcConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Default time between sync passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Blocks the wallet may trail the daemon by before it counts as lost.
pub const DEFAULT_LAG_TOLERANCE: u64 = 2;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Sync progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Syncer attached to the daemon.
    Started { target_height: u64 },
    /// Pass finished without reaching the daemon tip.
    Progress {
        current_height: u64,
        target_height: u64,
    },
    /// Wallet caught up with the daemon.
    Complete { height: u64 },
    /// Wallet fell behind after having caught up.
    Lost {
        wallet_height: u64,
        node_height: u64,
    },
    /// Error during sync; the syncer stops after emitting it.
    Error(String),
}

/// Change in sync state observed by [`SyncTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTransition {
    Synced { height: u64 },
    Lost { wallet_height: u64, node_height: u64 },
}

/// Synced/unsynced state machine fed with height samples.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    synced: bool,
    lag_tolerance: u64,
}

impl SyncTracker {
    pub fn new(lag_tolerance: u64) -> Self {
        Self {
            synced: false,
            lag_tolerance,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Record one pass. Returns the transition it caused, if any.
    pub fn observe(&mut self, wallet_height: u64, node_height: u64) -> Option<SyncTransition> {
        if !self.synced && wallet_height >= node_height {
            self.synced = true;
            return Some(SyncTransition::Synced {
                height: wallet_height,
            });
        }
        if self.synced && node_height > wallet_height.saturating_add(self.lag_tolerance) {
            self.synced = false;
            return Some(SyncTransition::Lost {
                wallet_height,
                node_height,
            });
        }
        None
    }
}

/// Callback invoked with `true` when sync completes and `false` when lost.
pub type SyncedCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Notification hooks for a [`ChainSyncer`].
#[derive(Default)]
pub struct Callbacks {
    pub synced: Option<SyncedCallback>,
}

/// Follows a daemon on behalf of a wallet.
pub struct ChainSyncer {
    wallet: Arc<Wallet>,
    daemon: DaemonRpc,
    daemon_url: String,
    callbacks: Callbacks,
    poll_interval: Duration,
    lag_tolerance: u64,
    event_tx: mpsc::Sender<SyncEvent>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl ChainSyncer {
    /// Create a syncer for `wallet` against the daemon described by `daemon`.
    pub fn new(wallet: Arc<Wallet>, daemon: RpcConfig) -> Result<Self, WalletError> {
        let daemon_url = daemon.url.clone();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        Ok(Self {
            wallet,
            daemon: DaemonRpc::with_config(daemon)?,
            daemon_url,
            callbacks: Callbacks::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            lag_tolerance: DEFAULT_LAG_TOLERANCE,
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_lag_tolerance(mut self, lag_tolerance: u64) -> Self {
        self.lag_tolerance = lag_tolerance;
        self
    }

    pub fn set_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    /// Take the event stream. Returns `None` after the first call.
    ///
    /// Events are dropped rather than awaited when the receiver falls behind.
    pub fn events(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            debug!("sync event dropped: {:?}", event);
        }
    }

    fn notify(&self, synced: bool) {
        if let Some(cb) = &self.callbacks.synced {
            cb(synced);
        }
    }

    /// Run until `shutdown` reads `true` or a pass fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), WalletError> {
        let result = self.follow(&mut shutdown).await;
        if let Err(e) = &result {
            warn!("chain syncer stopped: {}", e);
            self.emit(SyncEvent::Error(e.to_string()));
        }
        result
    }

    async fn follow(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), WalletError> {
        self.wallet.connect(&self.daemon_url).await?;
        let target_height = self.daemon.get_height().await?;
        info!("chain syncer started, daemon height {}", target_height);
        self.emit(SyncEvent::Started { target_height });

        let mut tracker = SyncTracker::new(self.lag_tolerance);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("chain syncer shutting down");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => self.pass(&mut tracker).await?,
            }
        }
    }

    async fn pass(&self, tracker: &mut SyncTracker) -> Result<(), WalletError> {
        let refreshed = self.wallet.refresh().await?;
        let wallet_height = self.wallet.height().await?;
        let node_height = self.daemon.get_height().await?;
        if refreshed.blocks_fetched > 0 {
            debug!(
                "fetched {} blocks, wallet {} / node {}",
                refreshed.blocks_fetched, wallet_height, node_height
            );
        }

        match tracker.observe(wallet_height, node_height) {
            Some(SyncTransition::Synced { height }) => {
                info!("wallet synced at height {}", height);
                self.emit(SyncEvent::Complete { height });
                self.notify(true);
            }
            Some(SyncTransition::Lost {
                wallet_height,
                node_height,
            }) => {
                warn!(
                    "wallet fell behind: wallet {} / node {}",
                    wallet_height, node_height
                );
                self.emit(SyncEvent::Lost {
                    wallet_height,
                    node_height,
                });
                self.notify(false);
            }
            None if !tracker.is_synced() => self.emit(SyncEvent::Progress {
                current_height: wallet_height,
                target_height: node_height,
            }),
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_rpc::mock::{ChainHeights, MockChain};
    use salvium_rpc::WalletRpc;
    use salvium_types::constants::NetParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_tracker_fires_once_on_catch_up() {
        let mut tracker = SyncTracker::new(2);
        assert_eq!(tracker.observe(10, 86), None);
        assert_eq!(tracker.observe(50, 86), None);
        assert_eq!(
            tracker.observe(86, 86),
            Some(SyncTransition::Synced { height: 86 })
        );
        assert_eq!(tracker.observe(86, 86), None);
        assert!(tracker.is_synced());
    }

    #[test]
    fn test_tracker_tolerates_small_lag() {
        let mut tracker = SyncTracker::new(2);
        tracker.observe(86, 86);
        assert_eq!(tracker.observe(86, 88), None);
        assert!(tracker.is_synced());
    }

    #[test]
    fn test_tracker_reports_lost_and_resync() {
        let mut tracker = SyncTracker::new(2);
        tracker.observe(86, 86);
        assert_eq!(
            tracker.observe(86, 89),
            Some(SyncTransition::Lost {
                wallet_height: 86,
                node_height: 89
            })
        );
        assert!(!tracker.is_synced());
        assert_eq!(
            tracker.observe(89, 89),
            Some(SyncTransition::Synced { height: 89 })
        );
    }

    #[test]
    fn test_tracker_zero_tolerance() {
        let mut tracker = SyncTracker::new(0);
        tracker.observe(5, 5);
        assert!(tracker.observe(5, 6).is_some());
    }

    fn unreachable() -> RpcConfig {
        RpcConfig {
            retries: 0,
            ..RpcConfig::for_url("http://127.0.0.1:1")
        }
    }

    fn syncer() -> ChainSyncer {
        let rpc = Arc::new(salvium_rpc::WalletRpc::with_config(unreachable()).unwrap());
        let wallet = Arc::new(Wallet::new(
            rpc,
            NetParams::regtest(),
            "wallet".into(),
            String::new(),
        ));
        ChainSyncer::new(wallet, unreachable()).unwrap()
    }

    #[test]
    fn test_builder_sets_lag_tolerance() {
        let syncer = syncer().with_lag_tolerance(7);
        assert_eq!(syncer.lag_tolerance, 7);
        assert_eq!(syncer.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_events_taken_once() {
        let mut syncer = syncer();
        assert!(syncer.events().is_some());
        assert!(syncer.events().is_none());
    }

    #[test]
    fn test_callbacks_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut syncer = syncer();
        syncer.set_callbacks(Callbacks {
            synced: Some(Box::new(move |synced| {
                if synced {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            })),
        });
        syncer.notify(true);
        syncer.notify(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_drops_when_full() {
        let mut syncer = syncer();
        let mut rx = syncer.events().unwrap();
        for h in 0..(EVENT_CHANNEL_SIZE as u64 + 10) {
            syncer.emit(SyncEvent::Complete { height: h });
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_SIZE);
    }

    #[tokio::test]
    async fn test_run_reports_unreachable_wallet_service() {
        let mut syncer = syncer().with_poll_interval(Duration::from_millis(10));
        let mut rx = syncer.events().unwrap();
        let (_tx, shutdown) = watch::channel(false);
        let err = syncer.run(shutdown).await.unwrap_err();
        assert!(matches!(err, WalletError::Rpc(_)));
        assert!(matches!(rx.recv().await, Some(SyncEvent::Error(_))));
    }

    /// (synced, wallet height, node height) at each callback.
    type Seen = Arc<Mutex<Vec<(bool, u64, u64)>>>;

    fn following(chain: &MockChain) -> (ChainSyncer, Seen) {
        let rpc = Arc::new(WalletRpc::new(chain.url()).unwrap());
        let wallet = Arc::new(Wallet::new(
            rpc,
            NetParams::regtest(),
            "wallet".into(),
            String::new(),
        ));
        let mut syncer = ChainSyncer::new(wallet, RpcConfig::for_url(chain.url()))
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let seen: Seen = Arc::default();
        let record = seen.clone();
        let heights = chain.heights();
        syncer.set_callbacks(Callbacks {
            synced: Some(Box::new(move |synced| {
                record
                    .lock()
                    .unwrap()
                    .push((synced, heights.wallet(), heights.node()));
            })),
        });
        (syncer, seen)
    }

    async fn until(what: &str, cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
    }

    async fn more_passes(heights: &ChainHeights, passes: usize) {
        let target = heights.refreshes() + passes;
        until("more sync passes", || heights.refreshes() >= target).await;
    }

    #[tokio::test]
    async fn test_synced_callback_fires_once_at_node_height() {
        let chain = MockChain::start(20, 5, 3).await.unwrap();
        let heights = chain.heights();
        let (syncer, seen) = following(&chain);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(syncer.run(shutdown));

        until("first callback", || !seen.lock().unwrap().is_empty()).await;
        more_passes(&heights, 3).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "callbacks: {:?}", *seen);
        let (synced, wallet_height, node_height) = seen[0];
        assert!(synced);
        assert!(wallet_height >= node_height);
        assert_eq!(wallet_height, 20);
        // 5 -> 20 in steps of 3 takes five refreshes.
        assert!(heights.refreshes() >= 5);
    }

    #[tokio::test]
    async fn test_lost_and_regained_sync_reported() {
        let chain = MockChain::start(10, 10, 3).await.unwrap();
        let heights = chain.heights();
        let (syncer, seen) = following(&chain);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(syncer.run(shutdown));

        until("first callback", || seen.lock().unwrap().len() == 1).await;
        heights.set_node(30);
        until("sync regained", || seen.lock().unwrap().len() == 3).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();

        let flags: Vec<bool> = seen.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(flags, vec![true, false, true]);
        let (_, wallet_height, node_height) = seen.lock().unwrap()[2];
        assert_eq!((wallet_height, node_height), (30, 30));
    }

    #[tokio::test]
    async fn test_small_lag_keeps_sync() {
        let chain = MockChain::start(10, 10, 0).await.unwrap();
        let heights = chain.heights();
        let (syncer, seen) = following(&chain);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(syncer.run(shutdown));

        until("first callback", || seen.lock().unwrap().len() == 1).await;
        heights.set_node(10 + DEFAULT_LAG_TOLERANCE);
        more_passes(&heights, 3).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
