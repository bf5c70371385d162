//! Periodic cleanup of idle clients.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::limiter::RateLimiter;

/// Background task that calls [`RateLimiter::cleanup`] on a fixed interval.
///
/// Admission checks never sweep other clients; without a sweeper the
/// limiter remembers every distinct key it has seen.
pub struct Sweeper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweeper on the current Tokio runtime.
    ///
    /// The first sweep happens one `interval` after spawning.
    pub fn spawn<C>(limiter: Arc<RateLimiter<C>>, interval: Duration, max_age: Duration) -> Self
    where
        C: Clock + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!(
            interval_secs = interval.as_secs(),
            max_age_secs = max_age.as_secs(),
            "Starting idle client sweeper"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.cleanup(max_age);
                        if removed > 0 {
                            info!(
                                removed = removed,
                                remaining = limiter.client_count(),
                                "Swept idle clients"
                            );
                        } else {
                            debug!(remaining = limiter.client_count(), "Sweep found no idle clients");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            info!("Idle client sweeper stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "Idle client sweeper ended abnormally");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some() {
            self.handle.abort();
        }
    }
}
