use std::{sync::Arc, time::Duration};

use shared::domain::{MachineStatus, SensorSnapshot};
use tracing::info;

use crate::{
    actuator::{ActuatorBoard, ActuatorController},
    audit::AuditLog,
    device::{DeviceClient, Endpoints, MAX_REQUEST_TIMEOUT},
    identity::IdentityProvider,
    notify::{NotificationSink, Notifier},
    poller::{PollStats, SensorPoller},
    timer::{CycleTimer, TimerSnapshot},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub endpoints: Endpoints,
    pub poll_interval: Duration,
    /// Capped at [`MAX_REQUEST_TIMEOUT`].
    pub request_timeout: Duration,
}

impl SessionOptions {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: MAX_REQUEST_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn effective_request_timeout(&self) -> Duration {
        self.request_timeout.min(MAX_REQUEST_TIMEOUT)
    }
}

/// Everything the presentation layer renders, read in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleStatus {
    pub sensors: SensorSnapshot,
    pub poll: PollStats,
    pub actuators: ActuatorBoard,
    pub timer: TimerSnapshot,
    pub machine: MachineStatus,
}

/// One operator session: the poll loop, the actuator controller and the cook timer.
///
/// The three run independently; the only shared collaborators are the identity provider
/// and the audit log used by the actuator path.
pub struct ConsoleSession {
    poller: SensorPoller,
    actuators: Arc<ActuatorController>,
    timer: CycleTimer,
}

impl ConsoleSession {
    /// Builds the session and starts polling. Must be called inside a Tokio runtime.
    pub fn start(
        options: SessionOptions,
        client: Arc<dyn DeviceClient>,
        audit: Arc<dyn AuditLog>,
        identity: Arc<dyn IdentityProvider>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifier = Notifier::new(sink);
        let request_timeout = options.effective_request_timeout();

        let poller = SensorPoller::new(
            Arc::clone(&client),
            options.endpoints.mechanical.clone(),
            options.poll_interval,
            request_timeout,
            notifier.clone(),
        );
        let actuators = Arc::new(ActuatorController::new(
            client,
            options.endpoints,
            request_timeout,
            notifier.clone(),
            audit,
            identity,
        ));
        let timer = CycleTimer::new(notifier);

        poller.start();
        info!(
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            request_timeout_ms = request_timeout.as_millis() as u64,
            "console session started"
        );

        Self {
            poller,
            actuators,
            timer,
        }
    }

    pub fn poller(&self) -> &SensorPoller {
        &self.poller
    }

    pub fn actuators(&self) -> &Arc<ActuatorController> {
        &self.actuators
    }

    pub fn timer(&self) -> &CycleTimer {
        &self.timer
    }

    pub fn status(&self) -> ConsoleStatus {
        ConsoleStatus {
            sensors: self.poller.snapshot(),
            poll: self.poller.stats(),
            actuators: self.actuators.board(),
            timer: self.timer.snapshot(),
            machine: self.actuators.machine_status(),
        }
    }

    /// Stops the poll loop and the timer. Commands already in flight are left to finish
    /// but their results are discarded.
    pub async fn shutdown(&self) {
        self.actuators.close();
        self.poller.stop().await;
        self.timer.shutdown().await;
        info!("console session ended");
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
