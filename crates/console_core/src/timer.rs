use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use shared::domain::Severity;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    error::{ConsoleError, Result},
    notify::{Notification, NotificationKind, Notifier},
};

pub const MIN_TIMER_MINUTES: u32 = 1;
pub const MAX_TIMER_MINUTES: u32 = 120;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub total_seconds: u32,
    pub remaining_seconds: u32,
    pub running: bool,
}

impl TimerSnapshot {
    pub fn is_idle(&self) -> bool {
        !self.running && self.remaining_seconds == 0
    }

    /// Remaining time as `M:SS`.
    pub fn remaining_display(&self) -> String {
        format!(
            "{}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }
}

struct TimerState {
    snapshot: TimerSnapshot,
    // Bumped by every start/cancel so a countdown task from an earlier run can never
    // touch the current one.
    generation: u64,
    closed: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    published: watch::Sender<TimerSnapshot>,
    notifier: Notifier,
}

/// Single-shot cook countdown with one-second resolution.
pub struct CycleTimer {
    shared: Arc<TimerShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CycleTimer {
    pub fn new(notifier: Notifier) -> Self {
        let (published, _) = watch::channel(TimerSnapshot::default());
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    snapshot: TimerSnapshot::default(),
                    generation: 0,
                    closed: false,
                }),
                published,
                notifier,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.shared.state.lock().snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.shared.published.subscribe()
    }

    pub fn start(&self, minutes: u32) -> Result<TimerSnapshot> {
        if !(MIN_TIMER_MINUTES..=MAX_TIMER_MINUTES).contains(&minutes) {
            self.shared.notifier.send(
                Notification::new(
                    NotificationKind::TimerRejected,
                    Severity::Error,
                    format!(
                        "Please enter a valid time between {MIN_TIMER_MINUTES} and {MAX_TIMER_MINUTES} minutes"
                    ),
                )
                .with_audio(),
            );
            return Err(ConsoleError::InvalidDuration(minutes));
        }

        let started_at = Instant::now();
        let snapshot = {
            // Lock order is state then task, so the countdown stored here always belongs
            // to the generation set here.
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(ConsoleError::SessionClosed);
            }
            if state.snapshot.running {
                return Err(ConsoleError::AlreadyRunning);
            }
            state.generation += 1;
            state.snapshot = TimerSnapshot {
                total_seconds: minutes * 60,
                remaining_seconds: minutes * 60,
                running: true,
            };
            self.shared.published.send_replace(state.snapshot);

            let handle = tokio::spawn(run_countdown(
                Arc::clone(&self.shared),
                state.generation,
                started_at,
            ));
            if let Some(previous) = self.task.lock().replace(handle) {
                previous.abort();
            }
            state.snapshot
        };

        info!(minutes, "cycle timer started");
        self.shared.notifier.send(
            Notification::new(
                NotificationKind::TimerStarted,
                Severity::Info,
                format!("Timer started for {minutes} minutes"),
            )
            .with_audio(),
        );
        Ok(snapshot)
    }

    /// Stops a running countdown without a completion notification. No-op when idle.
    pub fn cancel(&self) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            if !state.snapshot.running {
                return;
            }
            let remaining = state.snapshot.remaining_seconds;
            state.generation += 1;
            state.snapshot = TimerSnapshot::default();
            self.shared.published.send_replace(state.snapshot);
            if let Some(handle) = self.task.lock().take() {
                handle.abort();
            }
            remaining
        };

        info!(remaining_seconds = cancelled, "cycle timer cancelled");
    }

    /// Cancels any countdown and refuses further starts. No tick is applied after this
    /// returns.
    pub async fn shutdown(&self) {
        let handle = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.generation += 1;
            if state.snapshot.running {
                state.snapshot = TimerSnapshot::default();
                self.shared.published.send_replace(state.snapshot);
            }
            self.task.lock().take()
        };

        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        debug!("cycle timer shut down");
    }
}

impl Drop for CycleTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_countdown(shared: Arc<TimerShared>, generation: u64, started_at: Instant) {
    // Ticks are pinned to the instant `start` was called; a late wakeup fires the
    // missed ticks back to back instead of shifting the schedule.
    let mut ticker = interval_at(started_at + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        ticker.tick().await;
        if !shared.tick(generation) {
            break;
        }
    }
}

impl TimerShared {
    /// Applies one tick; returns whether the countdown should keep going.
    fn tick(&self, generation: u64) -> bool {
        let finished = {
            let mut state = self.state.lock();
            if state.generation != generation || !state.snapshot.running {
                return false;
            }
            state.snapshot.remaining_seconds = state.snapshot.remaining_seconds.saturating_sub(1);
            let finished = state.snapshot.remaining_seconds == 0;
            if finished {
                state.snapshot.running = false;
            }
            self.published.send_replace(state.snapshot);
            finished
        };

        if finished {
            info!("cycle timer finished");
            self.notifier.send(
                Notification::new(
                    NotificationKind::TimerFinished,
                    Severity::Info,
                    "Timer finished!",
                )
                .with_audio(),
            );
        }
        !finished
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
