use super::*;
use crate::notify::RecordingSink;

fn timer() -> (CycleTimer, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (CycleTimer::new(Notifier::new(sink.clone())), sink)
}

#[test]
fn remaining_time_renders_as_minutes_and_seconds() {
    let snapshot = TimerSnapshot {
        total_seconds: 1800,
        remaining_seconds: 1200,
        running: true,
    };
    assert_eq!(snapshot.remaining_display(), "20:00");

    let snapshot = TimerSnapshot {
        remaining_seconds: 65,
        ..snapshot
    };
    assert_eq!(snapshot.remaining_display(), "1:05");
    assert_eq!(TimerSnapshot::default().remaining_display(), "0:00");
}

#[tokio::test(start_paused = true)]
async fn counts_down_once_per_second() {
    let (timer, sink) = timer();

    let started = timer.start(30).expect("start");
    assert_eq!(started.remaining_seconds, 1800);
    assert!(started.running);
    assert_eq!(sink.messages(), vec!["Timer started for 30 minutes".to_string()]);

    tokio::time::sleep(Duration::from_millis(600_500)).await;

    let snapshot = timer.snapshot();
    assert_eq!(snapshot.remaining_seconds, 1200);
    assert!(snapshot.running);

    timer.cancel();
    let snapshot = timer.snapshot();
    assert!(snapshot.is_idle());
    assert_eq!(sink.count(NotificationKind::TimerFinished), 0);
}

#[tokio::test(start_paused = true)]
async fn finishes_exactly_once_and_can_restart() {
    let (timer, sink) = timer();

    timer.start(1).expect("start");
    tokio::time::sleep(Duration::from_secs(61)).await;

    let snapshot = timer.snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.remaining_seconds, 0);
    assert_eq!(sink.count(NotificationKind::TimerFinished), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.count(NotificationKind::TimerFinished), 1);

    timer.start(2).expect("restart");
    assert_eq!(timer.snapshot().remaining_seconds, 120);
}

#[tokio::test]
async fn rejects_out_of_range_durations() {
    let (timer, sink) = timer();

    for minutes in [0, 121] {
        assert_eq!(timer.start(minutes), Err(ConsoleError::InvalidDuration(minutes)));
    }

    assert!(timer.snapshot().is_idle());
    assert_eq!(sink.count(NotificationKind::TimerRejected), 2);
    assert_eq!(
        sink.messages()[0],
        "Please enter a valid time between 1 and 120 minutes"
    );
}

#[tokio::test(start_paused = true)]
async fn accepts_both_range_bounds() {
    let (timer, _sink) = timer();

    assert_eq!(timer.start(120).expect("max").remaining_seconds, 7200);
    timer.cancel();
    assert_eq!(timer.start(1).expect("min").remaining_seconds, 60);
}

#[tokio::test(start_paused = true)]
async fn second_start_while_running_is_refused() {
    let (timer, _sink) = timer();

    timer.start(5).expect("start");
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    assert_eq!(timer.start(10), Err(ConsoleError::AlreadyRunning));
    assert_eq!(timer.snapshot().remaining_seconds, 290);
}

#[tokio::test(start_paused = true)]
async fn cancelled_countdown_never_ticks_again() {
    let (timer, sink) = timer();

    timer.start(1).expect("start");
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    timer.cancel();
    timer.cancel();

    timer.start(2).expect("restart");
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert_eq!(timer.snapshot().remaining_seconds, 117);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sink.count(NotificationKind::TimerFinished), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_countdown_and_refuses_start() {
    let (timer, sink) = timer();

    timer.start(1).expect("start");
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    timer.shutdown().await;

    assert!(timer.snapshot().is_idle());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sink.count(NotificationKind::TimerFinished), 0);
    assert_eq!(timer.start(1), Err(ConsoleError::SessionClosed));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_each_tick() {
    let (timer, _sink) = timer();
    let mut ticks = timer.subscribe();

    timer.start(1).expect("start");
    ticks.borrow_and_update();
    ticks.changed().await.expect("tick");

    assert_eq!(ticks.borrow().remaining_seconds, 59);
}

#[tokio::test(start_paused = true)]
async fn ticks_are_measured_from_the_start_call() {
    let (timer, _sink) = timer();

    timer.start(1).expect("start");
    // The countdown task first runs only after the clock has moved on.
    tokio::time::advance(Duration::from_millis(700)).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(timer.snapshot().remaining_seconds, 59);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancel_and_start_keep_a_live_countdown() {
    let (timer, _sink) = timer();
    let timer = Arc::new(timer);

    for _ in 0..500 {
        let _ = timer.start(1);
        let canceller = {
            let timer = Arc::clone(&timer);
            tokio::spawn(async move { timer.cancel() })
        };
        let starter = {
            let timer = Arc::clone(&timer);
            tokio::spawn(async move {
                let _ = timer.start(1);
            })
        };
        canceller.await.expect("cancel task");
        starter.await.expect("start task");

        if timer.snapshot().running {
            let live = timer
                .task
                .lock()
                .as_ref()
                .is_some_and(|task| !task.is_finished());
            assert!(live, "running timer has no countdown task");
        }
        timer.cancel();
    }
}
