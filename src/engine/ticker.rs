//! Progress ticks while a request is outstanding.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Background task calling `on_tick` every period until stopped.
pub struct ProgressTicker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<u64>,
}

impl ProgressTicker {
    pub fn start<F>(period: Duration, on_tick: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        let (stop, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        ticks += 1;
                        on_tick(ticks);
                    }
                }
            }
            ticks
        });
        Self { stop, handle }
    }

    /// Stop ticking and wait for the task. Returns the number of ticks.
    pub async fn stop(self) -> u64 {
        let _ = self.stop.send(());
        self.handle.await.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn counts_ticks_until_stopped() {
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        let ticker = ProgressTicker::start(Duration::from_millis(100), move |n| {
            counter.store(n, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        let ticks = ticker.stop().await;

        assert_eq!(ticks, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_stop_has_no_ticks() {
        let ticker = ProgressTicker::start(Duration::from_secs(1), |_| {});
        assert_eq!(ticker.stop().await, 0);
    }
}
