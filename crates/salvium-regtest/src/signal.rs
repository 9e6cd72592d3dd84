//! One-shot "wallet synced" signal.
//!
//! The notifier side is moved into the chain syncer's callback; the waiter
//! side blocks the foreground flow. Dropping the notifier without firing it
//! (the syncer task ended) wakes the waiter with an error.

use crate::error::HarnessError;
use log::info;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Create a connected notifier/waiter pair.
pub fn sync_signal() -> (SyncNotifier, SyncWaiter) {
    let (tx, rx) = watch::channel(false);
    (SyncNotifier { tx }, SyncWaiter { rx })
}

pub struct SyncNotifier {
    tx: watch::Sender<bool>,
}

impl SyncNotifier {
    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn notify(&self) -> bool {
        self.tx.send_if_modified(|synced| {
            if *synced {
                return false;
            }
            *synced = true;
            true
        })
    }
}

pub struct SyncWaiter {
    rx: watch::Receiver<bool>,
}

impl SyncWaiter {
    pub fn is_synced(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the signal, logging every `log_interval` until it fires.
    ///
    /// Fails with [`HarnessError::SyncTimeout`] after `timeout` and with
    /// [`HarnessError::SyncerStopped`] if the notifier is dropped first.
    pub async fn wait(
        &mut self,
        timeout: Duration,
        log_interval: Duration,
    ) -> Result<(), HarnessError> {
        let mut ticker = interval_at(Instant::now() + log_interval, log_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let rx = &mut self.rx;

        let wait = async {
            loop {
                tokio::select! {
                    synced = rx.wait_for(|synced| *synced) => {
                        return synced.map(|_| ()).map_err(|_| HarnessError::SyncerStopped);
                    }
                    _ = ticker.tick() => info!("waiting for wallet sync"),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| HarnessError::SyncTimeout(timeout))?
    }
}
