use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use parking_lot::Mutex;
use shared::{
    domain::{
        ActuatorId, ActuatorState, CommandOutcome, DeviceEvent, MachineStatus, ProcessingEvent,
        Severity, UNKNOWN_OPERATOR_EMAIL,
    },
    protocol::ControlRequest,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    audit::AuditLog,
    device::{bounded, read_mixer_state, DeviceClient, Endpoints},
    error::{ConsoleError, Result},
    identity::IdentityProvider,
    notify::{Notification, NotificationKind, Notifier},
};

pub type ActuatorBoard = BTreeMap<ActuatorId, ActuatorState>;

/// Level written to the node for a desired run state.
///
/// The grinder relay on the mechanical node is wired active-low: driving the line
/// high stops the motor. Every other output is active-high.
pub fn wire_level(actuator: ActuatorId, run: bool) -> bool {
    match actuator {
        ActuatorId::Grinder => !run,
        ActuatorId::Valve | ActuatorId::Heater | ActuatorId::Mixer => run,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Recorded(ProcessingEvent),
    /// The store refused the record. The grinder stays off regardless.
    Failed {
        event: ProcessingEvent,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub actuator: ActuatorId,
    pub confirmed: bool,
    /// Set only when a running grinder was switched off.
    pub audit: Option<AuditOutcome>,
}

pub struct ActuatorController {
    client: Arc<dyn DeviceClient>,
    endpoints: Endpoints,
    request_timeout: Duration,
    notifier: Notifier,
    audit: Arc<dyn AuditLog>,
    identity: Arc<dyn IdentityProvider>,
    states: Mutex<ActuatorBoard>,
    published: watch::Sender<ActuatorBoard>,
    closed: AtomicBool,
}

impl ActuatorController {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        endpoints: Endpoints,
        request_timeout: Duration,
        notifier: Notifier,
        audit: Arc<dyn AuditLog>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let board: ActuatorBoard = ActuatorId::ALL
            .into_iter()
            .map(|actuator| (actuator, ActuatorState::default()))
            .collect();
        let (published, _) = watch::channel(board.clone());
        Self {
            client,
            endpoints,
            request_timeout,
            notifier,
            audit,
            identity,
            states: Mutex::new(board),
            published,
            closed: AtomicBool::new(false),
        }
    }

    pub fn state(&self, actuator: ActuatorId) -> ActuatorState {
        self.states
            .lock()
            .get(&actuator)
            .copied()
            .unwrap_or_default()
    }

    pub fn board(&self) -> ActuatorBoard {
        self.states.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActuatorBoard> {
        self.published.subscribe()
    }

    pub fn machine_status(&self) -> MachineStatus {
        MachineStatus::from_heater(self.state(ActuatorId::Heater).confirmed)
    }

    /// Marks the owning session as ended. Commands still in flight complete, but
    /// their results are no longer applied.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flips one actuator.
    ///
    /// Networked outputs go pending, send one command and only move `confirmed` on an
    /// acknowledgment. A second toggle while pending is refused with `Busy`.
    ///
    /// The mixer node has no acknowledgment channel in this deployment, so the mixer is
    /// switched locally: `confirmed` flips immediately and nothing goes over the wire.
    pub async fn toggle(&self, actuator: ActuatorId) -> Result<ToggleOutcome> {
        if self.is_closed() {
            return Err(ConsoleError::SessionClosed);
        }
        if actuator == ActuatorId::Mixer {
            return Ok(self.toggle_local(actuator).await);
        }

        let target = match self.begin(actuator) {
            Ok(target) => target,
            Err(err) => {
                self.reject_busy(actuator).await;
                return Err(err);
            }
        };

        let endpoint = self.endpoints.for_actuator(actuator);
        let payload = ControlRequest {
            status: wire_level(actuator, target),
        };
        debug!(%actuator, target, wire_status = payload.status, "dispatching actuator command");
        let result = bounded(
            endpoint.kind(),
            self.request_timeout,
            self.client
                .command(endpoint, &actuator.control_path(), &payload),
        )
        .await;

        let closed = self.is_closed();
        self.resolve(actuator, target, result.is_ok() && !closed);
        if closed {
            debug!(%actuator, "command resolved after session end; result discarded");
            return Err(ConsoleError::SessionClosed);
        }

        match result {
            Ok(ack) => {
                info!(%actuator, target, http_status = ack.status, "actuator confirmed");
                self.notifier.send(
                    Notification::new(
                        NotificationKind::ActuatorChanged,
                        Severity::Info,
                        format!("{} {}", actuator.label(), switched(target)),
                    )
                    .with_audio(),
                );
                self.log_device_event(
                    actuator,
                    target,
                    CommandOutcome::Confirmed,
                    Severity::Info,
                    format!("{} {}", actuator.label(), switched(target)),
                )
                .await;

                let audit = if actuator == ActuatorId::Grinder && !target {
                    Some(self.record_grinding_cycle().await)
                } else {
                    None
                };
                Ok(ToggleOutcome {
                    actuator,
                    confirmed: target,
                    audit,
                })
            }
            Err(err) => {
                warn!(%actuator, target, %err, "actuator command failed; confirmed state kept");
                self.notifier.send(
                    Notification::new(
                        NotificationKind::CommandFailed,
                        Severity::Error,
                        format!("Failed to toggle {actuator}"),
                    )
                    .with_audio(),
                );
                self.log_device_event(
                    actuator,
                    target,
                    CommandOutcome::Failed,
                    Severity::Error,
                    err.to_string(),
                )
                .await;
                Err(err)
            }
        }
    }

    /// Reads the mixer node's own view of the mixer line. Does not touch local state.
    pub async fn read_mixer_state(&self) -> Result<bool> {
        let endpoint = &self.endpoints.mixer;
        bounded(
            endpoint.kind(),
            self.request_timeout,
            read_mixer_state(self.client.as_ref(), endpoint),
        )
        .await
    }

    fn begin(&self, actuator: ActuatorId) -> Result<bool> {
        let mut states = self.states.lock();
        let state = states.entry(actuator).or_default();
        if state.pending {
            return Err(ConsoleError::Busy(actuator));
        }
        let target = !state.confirmed;
        state.pending = true;
        state.desired = target;
        self.published.send_replace(states.clone());
        Ok(target)
    }

    fn resolve(&self, actuator: ActuatorId, target: bool, acknowledged: bool) {
        let mut states = self.states.lock();
        let state = states.entry(actuator).or_default();
        state.pending = false;
        if acknowledged {
            state.confirmed = target;
        } else {
            state.desired = state.confirmed;
        }
        self.published.send_replace(states.clone());
    }

    async fn toggle_local(&self, actuator: ActuatorId) -> ToggleOutcome {
        let confirmed = {
            let mut states = self.states.lock();
            let state = states.entry(actuator).or_default();
            state.confirmed = !state.confirmed;
            state.desired = state.confirmed;
            let confirmed = state.confirmed;
            self.published.send_replace(states.clone());
            confirmed
        };

        info!(%actuator, confirmed, "local actuator switched");
        self.notifier.send(
            Notification::new(
                NotificationKind::ActuatorChanged,
                Severity::Info,
                format!("{} {}", actuator.label(), switched(confirmed)),
            )
            .with_audio(),
        );
        self.log_device_event(
            actuator,
            confirmed,
            CommandOutcome::Confirmed,
            Severity::Info,
            format!("{} {} (local)", actuator.label(), switched(confirmed)),
        )
        .await;

        ToggleOutcome {
            actuator,
            confirmed,
            audit: None,
        }
    }

    async fn reject_busy(&self, actuator: ActuatorId) {
        let desired = self.state(actuator).desired;
        debug!(%actuator, "toggle refused: command already in flight");
        self.notifier.send(Notification::new(
            NotificationKind::CommandRejected,
            Severity::Warning,
            format!("{} command already in progress", actuator.label()),
        ));
        self.log_device_event(
            actuator,
            desired,
            CommandOutcome::Rejected,
            Severity::Warning,
            "command already in flight".to_string(),
        )
        .await;
    }

    async fn record_grinding_cycle(&self) -> AuditOutcome {
        let operator = self.identity.current_user();
        let event = ProcessingEvent::grinding_cycle(operator.as_ref(), Utc::now());

        match self.audit.append_processing(&event).await {
            Ok(()) => {
                info!(
                    event_id = %event.event_id,
                    operator = %event.operator_email,
                    amount = event.amount,
                    "processing event recorded"
                );
                self.notifier.send(
                    Notification::new(
                        NotificationKind::AuditRecorded,
                        Severity::Info,
                        "Processing data recorded successfully",
                    )
                    .with_audio(),
                );
                AuditOutcome::Recorded(event)
            }
            Err(err) => {
                error!(
                    event_id = %event.event_id,
                    %err,
                    "failed to record processing event; grinder state left as confirmed"
                );
                self.notifier.send(
                    Notification::new(
                        NotificationKind::AuditFailed,
                        Severity::Error,
                        "Failed to record processing data",
                    )
                    .with_audio(),
                );
                AuditOutcome::Failed {
                    event,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn log_device_event(
        &self,
        actuator: ActuatorId,
        requested: bool,
        outcome: CommandOutcome,
        severity: Severity,
        message: String,
    ) {
        let event = DeviceEvent {
            timestamp: Utc::now(),
            actuator,
            requested,
            outcome,
            severity,
            message,
            operator_email: self
                .identity
                .current_user()
                .map(|operator| operator.email)
                .unwrap_or_else(|| UNKNOWN_OPERATOR_EMAIL.to_string()),
        };
        if let Err(err) = self.audit.append_device_event(&event).await {
            warn!(%actuator, outcome = outcome.as_str(), %err, "device event not logged");
        }
    }
}

fn switched(on: bool) -> &'static str {
    if on {
        "activated"
    } else {
        "deactivated"
    }
}

#[cfg(test)]
#[path = "tests/actuator_tests.rs"]
mod tests;
