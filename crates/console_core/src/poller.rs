use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use parking_lot::Mutex;
use shared::domain::{SensorSnapshot, Severity};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    device::{bounded, read_temperature, DeviceClient, DeviceEndpoint},
    error::Result,
    notify::{Notification, NotificationKind, Notifier},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub consecutive_failures: u64,
    pub total_failures: u64,
    pub stale_discarded: u64,
    pub last_sequence: u64,
}

struct PollState {
    snapshot: SensorSnapshot,
    stats: PollStats,
    closed: bool,
}

struct PollShared {
    client: Arc<dyn DeviceClient>,
    endpoint: DeviceEndpoint,
    request_timeout: Duration,
    notifier: Notifier,
    next_sequence: AtomicU64,
    state: Mutex<PollState>,
    published: watch::Sender<SensorSnapshot>,
}

/// Periodic temperature poll against the mechanical node.
///
/// Each tick gets the next sequence number and runs its request on its own task, so a
/// slow node never delays the schedule. A result is applied only if its sequence is
/// newer than every result already resolved, successful or failed.
pub struct SensorPoller {
    shared: Arc<PollShared>,
    period: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SensorPoller {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        endpoint: DeviceEndpoint,
        period: Duration,
        request_timeout: Duration,
        notifier: Notifier,
    ) -> Self {
        let (published, _) = watch::channel(SensorSnapshot::default());
        Self {
            shared: Arc::new(PollShared {
                client,
                endpoint,
                request_timeout,
                notifier,
                next_sequence: AtomicU64::new(0),
                state: Mutex::new(PollState {
                    snapshot: SensorSnapshot::default(),
                    stats: PollStats::default(),
                    closed: false,
                }),
                published,
            }),
            period,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Spawns the poll loop. Calling it again while running, or after `stop`, does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() || self.shared.state.lock().closed {
            return;
        }

        info!(
            node = %self.shared.endpoint.kind(),
            period_ms = self.period.as_millis() as u64,
            "sensor polling started"
        );
        *task = Some(tokio::spawn(run_poll_loop(
            Arc::clone(&self.shared),
            self.period,
            self.cancel.clone(),
        )));
    }

    /// Halts the schedule. Once this returns no poll result is applied any more; requests
    /// still in flight finish on their own and are ignored.
    pub async fn stop(&self) {
        self.shared.state.lock().closed = true;
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Runs one poll outside the schedule, with the next sequence number.
    pub async fn poll_now(&self) {
        let sequence = self.shared.take_sequence();
        self.shared.poll(sequence).await;
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.shared.state.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SensorSnapshot> {
        self.shared.published.subscribe()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.state.lock().stats
    }
}

impl Drop for SensorPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_poll_loop(shared: Arc<PollShared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let sequence = shared.take_sequence();
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.poll(sequence).await });
            }
        }
    }
    debug!("sensor poll loop stopped");
}

impl PollShared {
    fn take_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn poll(&self, sequence: u64) {
        let result = bounded(
            self.endpoint.kind(),
            self.request_timeout,
            read_temperature(self.client.as_ref(), &self.endpoint),
        )
        .await;
        self.apply(sequence, result);
    }

    fn apply(&self, sequence: u64, result: Result<f64>) {
        let notification = {
            let mut state = self.state.lock();
            if state.closed {
                debug!(sequence, "poll finished after stop; result ignored");
                return;
            }
            if sequence <= state.stats.last_sequence {
                state.stats.stale_discarded += 1;
                debug!(
                    sequence,
                    current = state.stats.last_sequence,
                    "stale poll result discarded"
                );
                return;
            }
            state.stats.last_sequence = sequence;

            match result {
                Ok(temperature) => {
                    let recovered = state.stats.consecutive_failures > 0;
                    state.stats.consecutive_failures = 0;
                    state.snapshot = SensorSnapshot {
                        temperature: Some(temperature),
                        captured_at: Some(Utc::now()),
                        sequence,
                    };
                    self.published.send_replace(state.snapshot.clone());
                    recovered.then(|| {
                        Notification::new(
                            NotificationKind::SensorRestored,
                            Severity::Info,
                            "Temperature readings restored",
                        )
                    })
                }
                Err(err) => {
                    state.stats.consecutive_failures += 1;
                    state.stats.total_failures += 1;
                    warn!(
                        sequence,
                        consecutive_failures = state.stats.consecutive_failures,
                        %err,
                        "sensor poll failed; keeping last reading"
                    );
                    (state.stats.consecutive_failures == 1).then(|| {
                        Notification::new(
                            NotificationKind::SensorUnavailable,
                            Severity::Info,
                            "Temperature reading unavailable",
                        )
                    })
                }
            }
        };

        if let Some(notification) = notification {
            self.notifier.send(notification);
        }
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
