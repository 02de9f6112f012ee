//! Orchestration core of the processing-machine console: sensor polling, actuator
//! command dispatch, the cook timer and audit emission.

pub mod actuator;
pub mod audit;
pub mod device;
pub mod error;
pub mod fake;
pub mod http_client;
pub mod identity;
pub mod notify;
pub mod poller;
pub mod session;
pub mod timer;

pub use actuator::{ActuatorBoard, ActuatorController, AuditOutcome, ToggleOutcome};
pub use audit::{AuditLog, MemoryAuditLog};
pub use device::{DeviceClient, DeviceEndpoint, Endpoints};
pub use error::{AuthError, ConsoleError, NotifyError, Result};
pub use fake::FakeDeviceClient;
pub use http_client::HttpDeviceClient;
pub use identity::{Credential, IdentityProvider, LocalIdentity};
pub use notify::{Notification, NotificationKind, NotificationSink, Notifier, RecordingSink, TracingSink};
pub use poller::{PollStats, SensorPoller};
pub use session::{ConsoleSession, ConsoleStatus, SessionOptions};
pub use timer::{CycleTimer, TimerSnapshot};
