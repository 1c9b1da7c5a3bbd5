use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Periodic reconciliation scheduler.
///
/// A producer task owns the timer and offers ticks through a channel of
/// capacity one to a single consumer that runs the pass. Ticks are dropped,
/// never queued, while a pass is running, or when `should_tick` says no: a
/// tick parked in the channel during a pass is drained once it finishes.
#[derive(Debug)]
pub struct Poller {
    cancel: CancellationToken,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Poller {
    pub fn start<G, F, Fut>(period: Duration, cancel: CancellationToken, should_tick: G, on_tick: F) -> Self
    where
        G: Fn() -> bool + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);

        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = producer_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if !should_tick() {
                            debug!("poll tick dropped");
                            continue;
                        }
                        if tick_tx.try_send(()).is_err() {
                            debug!("poll tick dropped: pass already pending");
                        }
                    }
                }
            }
        });

        let consumer_cancel = cancel.clone();
        let consumer = tokio::spawn(async move {
            loop {
                let tick = tokio::select! {
                    _ = consumer_cancel.cancelled() => break,
                    tick = tick_rx.recv() => tick,
                };
                if tick.is_none() {
                    break;
                }
                tokio::select! {
                    _ = consumer_cancel.cancelled() => break,
                    _ = on_tick() => {}
                }
                while tick_rx.try_recv().is_ok() {
                    debug!("poll tick dropped: arrived during pass");
                }
            }
        });

        debug!(period_ms = period.as_millis() as u64, "poller started");
        Self {
            cancel,
            producer,
            consumer,
        }
    }

    /// Stop both tasks. No tick fires after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.producer.abort();
        self.consumer.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn counting_poller(period: Duration, count: Arc<AtomicUsize>) -> Poller {
        Poller::start(
            period,
            CancellationToken::new(),
            || true,
            move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval_not_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let _poller = counting_poller(Duration::from_secs(30), count.clone());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let count = Arc::new(AtomicUsize::new(0));
        let poller = counting_poller(Duration::from_secs(1), count.clone());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        poller.stop();
        assert!(!poller.is_running());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_tick_gate_drops_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let allowed = Arc::new(AtomicBool::new(false));
        let allowed_in_gate = allowed.clone();
        let count_in_tick = count.clone();
        let _poller = Poller::start(
            Duration::from_secs(1),
            CancellationToken::new(),
            move || allowed_in_gate.load(Ordering::SeqCst),
            move || {
                let count = count_in_tick.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        allowed.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_during_slow_pass_are_dropped() {
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let started_in_tick = started.clone();
        let release_in_tick = release.clone();
        let _poller = Poller::start(
            Duration::from_secs(1),
            CancellationToken::new(),
            || true,
            move || {
                let started = started_in_tick.clone();
                let release = release_in_tick.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                }
            },
        );

        // Ten periods elapse while the first pass is stuck
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Nothing parked during the pass runs after it
        release.notify_one();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // The next period starts a fresh pass
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        release.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_token_stops_poller() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let count_in_tick = count.clone();
        let _poller = Poller::start(Duration::from_secs(1), cancel.child_token(), || true, move || {
            let count = count_in_tick.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
