use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use console_core::{AuditLog, ConsoleError};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

use shared::domain::{ActuatorId, CommandOutcome, DeviceEvent, ProcessingEvent, Severity};

/// Durable audit trail: one row per completed grinding cycle plus the device command log.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Filter for the processed-log listing. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub limit: Option<u32>,
    pub operator_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingTotals {
    pub cycles: i64,
    pub amount: i64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Appends one processing record. Returns `false` when a record with the same
    /// event id already exists, in which case nothing is written.
    pub async fn append_processing_event(&self, event: &ProcessingEvent) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processing_logs (event_id, amount, recorded_at, operator_id, operator_email)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(event.event_id.to_string())
        .bind(i64::from(event.amount))
        .bind(event.timestamp)
        .bind(event.operator_id.as_deref())
        .bind(&event.operator_email)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert processing event {}", event.event_id))?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!(event_id = %event.event_id, "duplicate processing event ignored");
        }
        Ok(inserted)
    }

    pub async fn list_processing_logs(&self, query: &LogQuery) -> Result<Vec<ProcessingEvent>> {
        let limit = query.limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT event_id, amount, recorded_at, operator_id, operator_email
             FROM processing_logs
             WHERE (?1 IS NULL OR operator_email = ?1 COLLATE NOCASE)
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )
        .bind(query.operator_email.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list processing logs")?;

        rows.iter().map(processing_event_from_row).collect()
    }

    pub async fn processing_totals(&self, operator_email: Option<&str>) -> Result<ProcessingTotals> {
        let row = sqlx::query(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0)
             FROM processing_logs
             WHERE (?1 IS NULL OR operator_email = ?1 COLLATE NOCASE)",
        )
        .bind(operator_email)
        .fetch_one(&self.pool)
        .await
        .context("failed to total processing logs")?;

        Ok(ProcessingTotals {
            cycles: row.get::<i64, _>(0),
            amount: row.get::<i64, _>(1),
        })
    }

    pub async fn append_device_event(&self, event: &DeviceEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO device_events
                (recorded_at, actuator, requested, outcome, severity, message, operator_email)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.timestamp)
        .bind(event.actuator.as_str())
        .bind(event.requested)
        .bind(event.outcome.as_str())
        .bind(event.severity.as_str())
        .bind(&event.message)
        .bind(&event.operator_email)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert device event for {}", event.actuator))?;
        Ok(())
    }

    /// Device log, newest first. `None` means every severity.
    pub async fn list_device_events(
        &self,
        severity: Option<Severity>,
        limit: Option<u32>,
    ) -> Result<Vec<DeviceEvent>> {
        let rows = sqlx::query(
            "SELECT recorded_at, actuator, requested, outcome, severity, message, operator_email
             FROM device_events
             WHERE (?1 IS NULL OR severity = ?1)
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )
        .bind(severity.map(Severity::as_str))
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .context("failed to list device events")?;

        rows.iter().map(device_event_from_row).collect()
    }
}

fn processing_event_from_row(row: &SqliteRow) -> Result<ProcessingEvent> {
    let event_id: String = row.get(0);
    let amount: i64 = row.get(1);
    Ok(ProcessingEvent {
        event_id: Uuid::parse_str(&event_id)
            .with_context(|| format!("corrupt event id '{event_id}'"))?,
        amount: u32::try_from(amount).with_context(|| format!("corrupt amount {amount}"))?,
        timestamp: row.get::<DateTime<Utc>, _>(2),
        operator_id: row.get::<Option<String>, _>(3),
        operator_email: row.get::<String, _>(4),
    })
}

fn device_event_from_row(row: &SqliteRow) -> Result<DeviceEvent> {
    let actuator: String = row.get(1);
    let outcome: String = row.get(3);
    let severity: String = row.get(4);
    Ok(DeviceEvent {
        timestamp: row.get::<DateTime<Utc>, _>(0),
        actuator: ActuatorId::from_str(&actuator)?,
        requested: row.get::<bool, _>(2),
        outcome: CommandOutcome::from_str(&outcome)?,
        severity: Severity::from_str(&severity)?,
        message: row.get::<String, _>(5),
        operator_email: row.get::<String, _>(6),
    })
}

#[async_trait]
impl AuditLog for Storage {
    async fn append_processing(&self, event: &ProcessingEvent) -> console_core::Result<()> {
        self.append_processing_event(event)
            .await
            .map(|_| ())
            .map_err(|err| ConsoleError::Store(format!("{err:#}")))
    }

    async fn append_device_event(&self, event: &DeviceEvent) -> console_core::Result<()> {
        Storage::append_device_event(self, event)
            .await
            .map_err(|err| ConsoleError::Store(format!("{err:#}")))
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
