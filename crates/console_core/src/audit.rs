use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::domain::{DeviceEvent, ProcessingEvent};

use crate::error::{ConsoleError, Result};

/// Append-only sink for audit records. Failures come back as `ConsoleError::Store`.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append_processing(&self, event: &ProcessingEvent) -> Result<()>;

    async fn append_device_event(&self, event: &DeviceEvent) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryAuditLog {
    processing: Mutex<Vec<ProcessingEvent>>,
    device_events: Mutex<Vec<DeviceEvent>>,
    unavailable: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every append fails and nothing is kept.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn processing_events(&self) -> Vec<ProcessingEvent> {
        self.processing.lock().clone()
    }

    pub fn device_events(&self) -> Vec<DeviceEvent> {
        self.device_events.lock().clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ConsoleError::Store("audit log unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append_processing(&self, event: &ProcessingEvent) -> Result<()> {
        self.check_available()?;
        self.processing.lock().push(event.clone());
        Ok(())
    }

    async fn append_device_event(&self, event: &DeviceEvent) -> Result<()> {
        self.check_available()?;
        self.device_events.lock().push(event.clone());
        Ok(())
    }
}
