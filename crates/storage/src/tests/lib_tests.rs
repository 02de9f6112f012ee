use super::*;
use chrono::{Duration, TimeZone};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).single().expect("timestamp") + Duration::seconds(seconds)
}

fn cycle(email: &str, seconds: i64) -> ProcessingEvent {
    ProcessingEvent {
        event_id: Uuid::new_v4(),
        amount: 1,
        timestamp: at(seconds),
        operator_id: Some("1".to_string()),
        operator_email: email.to_string(),
    }
}

fn device_event(actuator: ActuatorId, severity: Severity, seconds: i64) -> DeviceEvent {
    DeviceEvent {
        timestamp: at(seconds),
        actuator,
        requested: true,
        outcome: match severity {
            Severity::Info => CommandOutcome::Confirmed,
            Severity::Warning => CommandOutcome::Rejected,
            Severity::Error => CommandOutcome::Failed,
        },
        severity,
        message: format!("{actuator} {severity}"),
        operator_email: "admin@email.com".to_string(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("console.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn records_survive_reopen() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        temp_root
            .path()
            .join("console.db")
            .to_string_lossy()
            .replace('\\', "/")
    );
    let event = cycle("admin@email.com", 0);

    let storage = Storage::new(&database_url).await.expect("db");
    storage
        .append_processing_event(&event)
        .await
        .expect("append");
    storage.pool().close().await;

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let logs = reopened
        .list_processing_logs(&LogQuery::default())
        .await
        .expect("list");
    assert_eq!(logs, vec![event]);
}

#[tokio::test]
async fn lists_processing_logs_newest_first() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = cycle("admin@email.com", 0);
    let second = cycle("admin@email.com", 60);
    let third = cycle("juice@email.com", 120);
    for event in [&second, &first, &third] {
        storage.append_processing_event(event).await.expect("append");
    }

    let logs = storage
        .list_processing_logs(&LogQuery::default())
        .await
        .expect("list");
    assert_eq!(logs, vec![third.clone(), second.clone(), first.clone()]);

    let latest = storage
        .list_processing_logs(&LogQuery {
            limit: Some(1),
            operator_email: None,
        })
        .await
        .expect("limited");
    assert_eq!(latest, vec![third]);

    let mine = storage
        .list_processing_logs(&LogQuery {
            limit: None,
            operator_email: Some("ADMIN@email.com".to_string()),
        })
        .await
        .expect("filtered");
    assert_eq!(mine, vec![second, first]);
}

#[tokio::test]
async fn duplicate_event_id_is_not_recorded_twice() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event = cycle("admin@email.com", 0);

    assert!(storage.append_processing_event(&event).await.expect("first"));
    assert!(!storage.append_processing_event(&event).await.expect("second"));

    let totals = storage.processing_totals(None).await.expect("totals");
    assert_eq!(
        totals,
        ProcessingTotals {
            cycles: 1,
            amount: 1
        }
    );
}

#[tokio::test]
async fn unknown_operator_is_stored_without_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event = ProcessingEvent::grinding_cycle(None, at(0));

    storage
        .append_processing_event(&event)
        .await
        .expect("append");

    let logs = storage
        .list_processing_logs(&LogQuery::default())
        .await
        .expect("list");
    assert_eq!(logs[0].operator_email, "Unknown User");
    assert_eq!(logs[0].operator_id, None);
}

#[tokio::test]
async fn totals_per_operator() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(
        storage.processing_totals(None).await.expect("empty"),
        ProcessingTotals {
            cycles: 0,
            amount: 0
        }
    );

    for (email, seconds) in [("a@email.com", 0), ("a@email.com", 1), ("b@email.com", 2)] {
        storage
            .append_processing_event(&cycle(email, seconds))
            .await
            .expect("append");
    }

    assert_eq!(storage.processing_totals(None).await.expect("all").amount, 3);
    assert_eq!(
        storage
            .processing_totals(Some("a@email.com"))
            .await
            .expect("a")
            .cycles,
        2
    );
}

#[tokio::test]
async fn device_events_filter_by_severity() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let events = [
        device_event(ActuatorId::Grinder, Severity::Info, 0),
        device_event(ActuatorId::Valve, Severity::Warning, 1),
        device_event(ActuatorId::Heater, Severity::Error, 2),
        device_event(ActuatorId::Grinder, Severity::Error, 3),
    ];
    for event in &events {
        storage.append_device_event(event).await.expect("append");
    }

    let all = storage.list_device_events(None, None).await.expect("all");
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], events[3]);

    let errors = storage
        .list_device_events(Some(Severity::Error), None)
        .await
        .expect("errors");
    assert_eq!(errors, vec![events[3].clone(), events[2].clone()]);

    let warnings = storage
        .list_device_events(Some(Severity::Warning), Some(10))
        .await
        .expect("warnings");
    assert_eq!(warnings, vec![events[1].clone()]);
}

#[tokio::test]
async fn implements_audit_log() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let audit: &dyn AuditLog = &storage;
    let event = cycle("admin@email.com", 0);

    audit.append_processing(&event).await.expect("processing");
    audit
        .append_device_event(&device_event(ActuatorId::Grinder, Severity::Info, 0))
        .await
        .expect("device event");

    assert_eq!(storage.processing_totals(None).await.expect("totals").cycles, 1);
    assert_eq!(
        storage
            .list_device_events(None, None)
            .await
            .expect("events")
            .len(),
        1
    );
}

#[tokio::test]
async fn closed_pool_surfaces_store_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.pool().close().await;

    let err = AuditLog::append_processing(&storage, &cycle("admin@email.com", 0))
        .await
        .expect_err("closed pool");

    assert!(matches!(err, ConsoleError::Store(_)));
}
