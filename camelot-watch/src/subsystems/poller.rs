//! Fixed-interval polling
//!
//! Each poll loop fires a job on every tick of a `tokio::time::interval`.
//! The first tick is immediate, so activation triggers a fetch right away.
//! Jobs run as their own tasks: a slow fetch never delays the next tick and
//! several fetches for the same data set may be in flight at once. The store
//! keeps whichever response completes last.
//!
//! All loops under one `PollHandle` share a cancellation token. `shutdown`
//! cancels it, aborts in-flight fetches and waits for every task, so no
//! response can reach a store once it returns.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Work fired on each tick. Receives the token that guards its commits.
pub type PollJob = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

/// Owns a set of poll loops and tears them down together.
pub struct PollHandle {
    token: CancellationToken,
    loops: JoinSet<()>,
}

impl PollHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            loops: JoinSet::new(),
        }
    }

    /// Start a loop firing `job` every `period`, beginning immediately.
    pub fn spawn(&mut self, name: &'static str, period: Duration, job: PollJob) {
        let token = self.token.clone();
        self.loops.spawn(run_poll_loop(name, period, token, job));
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Stop every loop and wait until no fetch can commit anymore.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        while let Some(joined) = self.loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Poll loop ended abnormally");
            }
        }
        tracing::info!("All poll loops stopped");
    }
}

impl Default for PollHandle {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_poll_loop(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    job: PollJob,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: JoinSet<()> = JoinSet::new();

    tracing::info!(poller = name, interval_ms = period.as_millis() as u64, "Poll loop started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                in_flight.spawn(job(token.clone()));
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(poller = name, error = %e, "Poll job panicked");
                    }
                }
            }
        }
    }

    in_flight.abort_all();
    while in_flight.join_next().await.is_some() {}

    tracing::info!(poller = name, "Poll loop shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> PollJob {
        Arc::new(move |_token| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handle = PollHandle::new();
        handle.spawn("test", Duration::from_secs(5), counting_job(Arc::clone(&counter)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handle = PollHandle::new();
        handle.spawn("test", Duration::from_secs(2), counting_job(Arc::clone(&counter)));

        // Ticks at 0, 2, 4 and 6 seconds.
        tokio::time::sleep(Duration::from_millis(6_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_jobs_do_not_block_ticks() {
        let started = Arc::new(AtomicUsize::new(0));
        let job: PollJob = {
            let started = Arc::clone(&started);
            Arc::new(move |_token| {
                let started = Arc::clone(&started);
                Box::pin(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                })
            })
        };

        let mut handle = PollHandle::new();
        handle.spawn("slow", Duration::from_secs(1), job);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handle = PollHandle::new();
        handle.spawn("test", Duration::from_secs(1), counting_job(Arc::clone(&counter)));
        assert_eq!(handle.loop_count(), 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.shutdown().await;
        let after_shutdown = counter.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_shutdown);
    }
}
