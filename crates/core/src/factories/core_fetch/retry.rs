use super::CoreFetchConfig;
use backon::BackoffBuilder;
use hashvend_api::{future::ResultValue, AsyncResult, PeerId};
use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

/// How often, and after which pauses, a request is resent after a channel
/// failure.
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    max_retries: usize,
    first_interval: Duration,
    last_interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CoreFetchConfig) -> Self {
        Self {
            max_retries: config.max_retries as usize,
            first_interval: Duration::from_millis(
                config.first_retry_interval_ms as u64,
            ),
            last_interval: Duration::from_millis(
                config.last_retry_interval_ms as u64,
            ),
        }
    }

    fn intervals(&self) -> backon::ExponentialBackoff {
        backon::ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.first_interval)
            .with_max_delay(self.last_interval)
            .with_max_times(self.max_retries)
            .build()
    }
}

/// A fallible operation that can be started any number of times.
pub(crate) type Attempt<T> = Arc<dyn Fn() -> AsyncResult<T> + 'static + Send + Sync>;

/// Run `attempt`, starting it again after a retryable failure until the
/// policy is exhausted. The last failure is returned as is.
///
/// Cancelling the returned result cancels the attempt in progress.
pub(crate) fn with_retry<T: ResultValue>(
    policy: &RetryPolicy,
    attempt: Attempt<T>,
) -> AsyncResult<T> {
    retry_from(policy.intervals(), attempt)
}

fn retry_from<T: ResultValue>(
    mut intervals: backon::ExponentialBackoff,
    attempt: Attempt<T>,
) -> AsyncResult<T> {
    let current = attempt();
    let out = current.recover_with(move |err| {
        if !err.is_retryable() {
            return AsyncResult::failed(err);
        }
        match intervals.next() {
            None => AsyncResult::failed(err),
            Some(interval) => {
                tracing::warn!(?err, ?interval, "retrying request");
                AsyncResult::<()>::delay(interval)
                    .flat_map(move |()| retry_from(intervals, attempt))
            }
        }
    });
    out.propagate_cancel_to(&current);
    out
}

/// Peers whose exchanges failed on the channel after all retries.
///
/// Each failure in a row backs a peer off for longer, following the
/// configured intervals. A failure after the last interval was sat out
/// starts the intervals over.
#[derive(Debug)]
pub(crate) struct PeerBackOff {
    schedule: backon::ExponentialBuilder,
    first_interval: Duration,
    peers: HashMap<PeerId, Strikes>,
}

#[derive(Debug)]
struct Strikes {
    intervals: backon::ExponentialBackoff,
    until: Instant,
}

impl PeerBackOff {
    pub fn from_config(config: &CoreFetchConfig) -> Self {
        let first_interval =
            Duration::from_millis(config.first_back_off_interval_ms as u64);
        let schedule = backon::ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(first_interval)
            .with_max_delay(Duration::from_millis(
                config.last_back_off_interval_ms as u64,
            ))
            .with_max_times((config.num_back_off_intervals as usize).max(1));
        Self {
            schedule,
            first_interval,
            peers: HashMap::new(),
        }
    }

    /// Back `peer` off after a failed exchange, returning for how long.
    pub fn record_failure(&mut self, peer: &PeerId) -> Duration {
        let schedule = self.schedule;
        let now = Instant::now();
        let strikes = self.peers.entry(peer.clone()).or_insert_with(|| Strikes {
            intervals: schedule.build(),
            until: now,
        });

        let interval = match strikes.intervals.next() {
            Some(interval) => interval,
            None => {
                strikes.intervals = schedule.build();
                strikes.intervals.next().unwrap_or(self.first_interval)
            }
        };
        strikes.until = now + interval;
        interval
    }

    /// Forget the failures of `peer` after a successful exchange.
    pub fn record_success(&mut self, peer: &PeerId) {
        self.peers.remove(peer);
    }

    /// How much longer fetches from `peer` fail fast, if at all.
    pub fn remaining(&self, peer: &PeerId) -> Option<Duration> {
        let strikes = self.peers.get(peer)?;
        let remaining = strikes.until.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }
}
