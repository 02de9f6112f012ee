use super::*;
use crate::{
    error::ConsoleError,
    fake::{FakeDeviceClient, FakeReply},
    notify::RecordingSink,
};
use shared::{domain::NodeKind, protocol::SENSORS_PATH};

const PERIOD: Duration = Duration::from_secs(2);

fn mechanical() -> DeviceEndpoint {
    DeviceEndpoint::parse(NodeKind::Mechanical, "http://mechanical.test").expect("endpoint")
}

fn poller_with(
    client: &Arc<FakeDeviceClient>,
    sink: &Arc<RecordingSink>,
    request_timeout: Duration,
) -> SensorPoller {
    SensorPoller::new(
        client.clone(),
        mechanical(),
        PERIOD,
        request_timeout,
        Notifier::new(sink.clone()),
    )
}

#[tokio::test(start_paused = true)]
async fn first_tick_publishes_a_reading() {
    let client = Arc::new(FakeDeviceClient::new().with_temperature(65.5));
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snapshot = poller.snapshot();
    assert_eq!(snapshot.temperature, Some(65.5));
    assert_eq!(snapshot.sequence, 1);
    assert!(snapshot.captured_at.is_some());
    assert_eq!(client.queries(), vec![SENSORS_PATH.to_string()]);
    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn polls_on_a_fixed_schedule() {
    let client = Arc::new(FakeDeviceClient::new());
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(Duration::from_millis(6_500)).await;

    // ticks at 0, 2, 4 and 6 seconds
    assert_eq!(client.queries().len(), 4);
    assert_eq!(poller.stats().last_sequence, 4);
    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn older_response_arriving_late_is_discarded() {
    let client = Arc::new(FakeDeviceClient::new().with_temperature(65.5));
    client.push_temperature(Duration::from_secs(3), 65.2);
    client.push_temperature(Duration::from_millis(500), 65.5);
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let snapshot = poller.snapshot();
    assert_eq!(snapshot.temperature, Some(65.5));
    assert_eq!(snapshot.sequence, 2);
    assert_eq!(poller.stats().stale_discarded, 1);
    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failures_keep_last_reading_and_notify_once() {
    let client = Arc::new(FakeDeviceClient::new().with_temperature(71.0));
    client.push_temperature(Duration::ZERO, 70.0);
    for _ in 0..2 {
        client.push_query_reply(
            SENSORS_PATH,
            FakeReply::fail(
                Duration::ZERO,
                ConsoleError::network(NodeKind::Mechanical, "connection refused"),
            ),
        );
    }
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(Duration::from_millis(5_000)).await;

    assert_eq!(poller.snapshot().temperature, Some(70.0));
    let stats = poller.stats();
    assert_eq!(stats.consecutive_failures, 2);
    assert_eq!(stats.total_failures, 2);
    assert_eq!(sink.count(NotificationKind::SensorUnavailable), 1);
    assert_eq!(sink.count(NotificationKind::SensorRestored), 0);

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(poller.snapshot().temperature, Some(71.0));
    assert_eq!(poller.stats().consecutive_failures, 0);
    assert_eq!(poller.stats().total_failures, 2);
    assert_eq!(sink.count(NotificationKind::SensorRestored), 1);
    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_node_is_cut_off_by_request_timeout() {
    let client = Arc::new(FakeDeviceClient::new());
    client.push_temperature(Duration::from_secs(3), 80.0);
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(1));

    poller.start();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(poller.snapshot().temperature, None);
    assert_eq!(poller.stats().consecutive_failures, 1);
    assert_eq!(sink.count(NotificationKind::SensorUnavailable), 1);
    poller.stop().await;
}

#[tokio::test]
async fn stale_failure_does_not_count() {
    let client = Arc::new(FakeDeviceClient::new());
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.shared.apply(2, Ok(60.0));
    poller.shared.apply(
        1,
        Err(ConsoleError::network(NodeKind::Mechanical, "timed out")),
    );

    let stats = poller.stats();
    assert_eq!(stats.consecutive_failures, 0);
    assert_eq!(stats.total_failures, 0);
    assert_eq!(stats.stale_discarded, 1);
    assert_eq!(poller.snapshot().temperature, Some(60.0));
    assert!(sink.notifications().is_empty());
}

#[tokio::test]
async fn older_success_after_newer_failure_does_not_restore() {
    let client = Arc::new(FakeDeviceClient::new());
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.shared.apply(2, Ok(60.0));
    poller.shared.apply(
        4,
        Err(ConsoleError::network(NodeKind::Mechanical, "connection refused")),
    );
    poller.shared.apply(3, Ok(61.0));

    let stats = poller.stats();
    assert_eq!(stats.consecutive_failures, 1);
    assert_eq!(stats.last_sequence, 4);
    assert_eq!(stats.stale_discarded, 1);
    assert_eq!(poller.snapshot().temperature, Some(60.0));
    assert_eq!(sink.count(NotificationKind::SensorRestored), 0);

    let unavailable: Vec<_> = sink
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::SensorUnavailable)
        .collect();
    assert_eq!(unavailable.len(), 1);
    assert_eq!(unavailable[0].severity, Severity::Info);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_in_flight_result() {
    let client = Arc::new(FakeDeviceClient::new());
    client.push_temperature(Duration::from_secs(1), 90.0);
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    poller.stop().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(poller.snapshot().temperature, None);
    assert_eq!(client.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent_and_refused_after_stop() {
    let client = Arc::new(FakeDeviceClient::new());
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));

    poller.start();
    poller.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.queries().len(), 1);

    poller.stop().await;
    poller.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_new_readings() {
    let client = Arc::new(FakeDeviceClient::new().with_temperature(42.0));
    let sink = Arc::new(RecordingSink::new());
    let poller = poller_with(&client, &sink, Duration::from_secs(5));
    let mut readings = poller.subscribe();

    poller.start();
    readings.changed().await.expect("reading published");

    assert_eq!(readings.borrow().temperature, Some(42.0));
    poller.stop().await;
}
