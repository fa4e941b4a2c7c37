use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use crate::manager::TransactionManager;

/// Drives [`TransactionManager::check_timeouts`] on a fixed interval.
///
/// The transactional core never schedules its own timeout sweep; something
/// has to call `check_timeouts` periodically, and most embedders want a
/// ready-made loop rather than hand-rolling one. `TimeoutTicker` owns no
/// transaction state itself — stopping it cancels the sweep, not any
/// in-flight transaction.
#[derive(Default)]
pub struct TimeoutTicker {
    interval: Duration,
    close_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl TimeoutTicker {
    pub fn new(interval: Duration) -> Self {
        TimeoutTicker {
            interval,
            close_tx: Mutex::new(None),
        }
    }

    /// Spawns the sweep loop. A no-op (returns `false`) if already running.
    pub async fn start(&self, manager: TransactionManager) -> bool {
        {
            let close_tx = self.close_tx.lock().await;
            if close_tx.is_some() {
                return false;
            }
        }

        let (close_tx, mut close_rx) = mpsc::channel(1);
        let interval = self.interval;

        tokio::spawn(async move {
            loop {
                let timer = tokio::time::sleep(interval);
                tokio::pin!(timer);

                tokio::select! {
                    _ = timer.as_mut() => {
                        let reaped = manager.check_timeouts().await;
                        if !reaped.is_empty() {
                            log::debug!("timeout ticker reaped {} transaction(s)", reaped.len());
                        }
                    }
                    _ = close_rx.recv() => break,
                }
            }
        });

        {
            let mut close = self.close_tx.lock().await;
            *close = Some(close_tx);
        }

        true
    }

    /// Stops the sweep loop. A no-op if not running.
    pub async fn stop(&self) {
        let mut close_tx = self.close_tx.lock().await;
        close_tx.take();
    }

    /// Debug/test purposes only.
    pub async fn is_running(&self) -> bool {
        self.close_tx.lock().await.is_some()
    }
}
