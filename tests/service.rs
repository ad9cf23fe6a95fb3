mod common;

use common::{MockConnector, MockHost, MockNotifier, MockSnapshot, start_time};
use print_bullet::clock::{Clock, add_seconds};
use print_bullet::{
    ManualClock, NotificationService, PrintEvent, PrinterState, Settings, TestFailure,
    ThrottleState,
};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    service: NotificationService,
    notifier: Arc<MockNotifier>,
    connector: Arc<MockConnector>,
    snapshots: Arc<MockSnapshot>,
    host: Arc<MockHost>,
    clock: Arc<ManualClock>,
}

fn settings(token: &str) -> Settings {
    Settings::from_value(&json!({
        "access_token": token,
        "periodic_updates": true,
        "periodic_updates_interval": 15,
        "webcam": { "snapshot": "http://camera.local/snapshot" }
    }))
}

fn harness(settings: Settings) -> Harness {
    let notifier = Arc::new(MockNotifier::default());
    let connector = Arc::new(MockConnector::new(notifier.clone()));
    let snapshots = Arc::new(MockSnapshot::ok());
    let host = Arc::new(MockHost::new());
    let clock = Arc::new(ManualClock::new(start_time()));

    let service = NotificationService::new(
        settings,
        connector.clone(),
        snapshots.clone(),
        host.clone(),
        clock.clone(),
    );
    service.startup();

    Harness {
        service,
        notifier,
        connector,
        snapshots,
        host,
        clock,
    }
}

fn tick(h: &Harness, percent: u8) {
    h.service.handle_event(PrintEvent::ProgressTick { percent });
    h.service.flush();
}

#[test]
fn test_startup_connects_with_configured_token() {
    let h = harness(settings("good"));
    assert!(h.service.is_connected());
    assert_eq!(
        h.connector.connects.lock().unwrap().clone(),
        vec![("good".to_string(), None)]
    );
}

#[test]
fn test_invalid_key_leaves_sends_as_no_ops() {
    let h = harness(settings("bad"));
    assert!(!h.service.is_connected());

    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    h.service.handle_event(PrintEvent::JobDone {
        file: "benchy.gcode".to_string(),
        elapsed_seconds: Some(600),
    });
    h.service.flush();

    assert!(h.notifier.calls().is_empty());
    assert_eq!(h.service.throttle_state(), ThrottleState::Idle);
}

#[test]
fn test_unknown_channel_leaves_notifier_unset() {
    let mut settings = settings("good");
    settings.push_channel = Some("nope".to_string());
    let h = harness(settings);
    assert!(!h.service.is_connected());
}

#[test]
fn test_periodic_update_and_done_message() {
    let h = harness(settings("good"));
    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    assert_eq!(
        h.service.throttle_state(),
        ThrottleState::Armed {
            next_due: add_seconds(start_time(), 900)
        }
    );

    h.clock.advance(800);
    h.host.set_timing(Some(800), Some(5000));
    tick(&h, 10);
    assert!(h.notifier.calls().is_empty());
    // quiet period ticks never query the printer
    assert_eq!(h.host.query_count(), 0);

    h.clock.advance(105);
    h.host.set_timing(Some(905), Some(4895));
    tick(&h, 16);
    let files = h.notifier.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "benchy-16.jpg");
    assert_eq!(files[0].1, "Print job 16% complete");
    assert!(files[0].2.starts_with("16% on benchy.gcode\nTime elapsed: 0h 15min"));
    assert_eq!(
        h.service.throttle_state(),
        ThrottleState::Armed {
            next_due: add_seconds(start_time(), 1805)
        }
    );

    h.clock.advance(905);
    h.host.set_timing(Some(1810), Some(50));
    tick(&h, 97);
    assert_eq!(h.notifier.files().len(), 1);

    h.service.handle_event(PrintEvent::JobDone {
        file: "benchy.gcode".to_string(),
        elapsed_seconds: Some(1900),
    });
    h.service.flush();
    let files = h.notifier.files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[1].0, "benchy-done.jpg");
    assert_eq!(files[1].2, "benchy finished printing in 0h 31min");
    assert_eq!(h.service.throttle_state(), ThrottleState::Idle);
    assert_eq!(h.snapshots.capture_count(), 2);
}

#[test]
fn test_unknown_timing_sends_nothing() {
    let h = harness(settings("good"));
    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    h.clock.advance(1000);
    tick(&h, 1);
    assert!(h.notifier.calls().is_empty());
    assert_eq!(h.host.query_count(), 1);
}

#[test]
fn test_settings_change_mid_job_restarts_timer_and_reconnects() {
    let h = harness(settings("good"));
    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    h.clock.advance(1000);

    h.service.save_settings(&json!({ "periodic_updates_interval": "1" }));
    h.service.flush();

    assert_eq!(h.service.settings().periodic_updates_interval, 1);
    assert_eq!(
        h.service.throttle_state(),
        ThrottleState::Armed {
            next_due: add_seconds(start_time(), 1060)
        }
    );
    assert_eq!(h.connector.connect_count(), 2);
    assert!(h.notifier.calls().is_empty());

    h.clock.advance(60);
    h.host.set_timing(Some(1060), Some(4000));
    tick(&h, 20);
    assert_eq!(h.notifier.files().len(), 1);
}

#[test]
fn test_clearing_token_disconnects() {
    let h = harness(settings("good"));
    assert!(h.service.is_connected());

    h.service.save_settings(&json!({ "access_token": "" }));
    h.service.flush();
    assert!(!h.service.is_connected());
}

#[test]
fn test_job_ended_resets_without_message() {
    let h = harness(settings("good"));
    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    h.service.handle_event(PrintEvent::JobEnded {
        file: "benchy.gcode".to_string(),
        state: PrinterState::Cancelled,
    });
    h.service.flush();
    assert_eq!(h.service.throttle_state(), ThrottleState::Idle);
    assert!(h.notifier.calls().is_empty());
}

#[test]
fn test_send_test_message_outcomes() {
    let h = harness(settings("good"));

    let outcome = h.service.send_test_message("bad", None, None);
    assert!(!outcome.result);
    assert_eq!(outcome.error, Some(TestFailure::ApiKey));

    let outcome = h.service.send_test_message("good", Some("nope"), None);
    assert!(!outcome.result);
    assert_eq!(outcome.error, Some(TestFailure::Channel));

    let outcome = h.service.send_test_message("down", None, None);
    assert!(!outcome.result);
    assert_eq!(outcome.error, None);

    assert!(h.notifier.calls().is_empty());

    let outcome = h.service.send_test_message("good", Some("printers"), None);
    assert!(outcome.result);
    assert_eq!(outcome.error, None);
    let files = h.notifier.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].2, "Testing, 1, 2, 3, 4...");
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({ "result": true })
    );
}

#[test]
fn test_send_test_message_bypasses_throttle() {
    let h = harness(settings("good"));
    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    let before = h.service.throttle_state();

    assert!(h.service.send_test_message("good", None, Some("hello")).result);
    assert!(h.service.send_test_message("good", None, Some("again")).result);

    assert_eq!(h.notifier.files().len(), 2);
    assert_eq!(h.service.throttle_state(), before);
}

#[test]
fn test_test_failure_serializes_like_the_settings_dialog_expects() {
    assert_eq!(serde_json::to_value(TestFailure::ApiKey).unwrap(), json!("apikey"));
    assert_eq!(serde_json::to_value(TestFailure::Channel).unwrap(), json!("channel"));
}

#[test]
fn test_disabled_updates_never_query_the_printer() {
    let mut settings = settings("good");
    settings.periodic_updates = false;
    let h = harness(settings);

    h.service.handle_event(PrintEvent::JobStarted {
        file: "benchy.gcode".to_string(),
    });
    h.host.set_timing(Some(100), Some(5000));
    for percent in 1..=20 {
        h.clock.advance(600);
        tick(&h, percent);
    }
    assert_eq!(h.service.throttle_state(), ThrottleState::Disabled);
    assert_eq!(h.host.query_count(), 0);
    assert!(h.notifier.calls().is_empty());

    // switching updates on arms the timer on the next tick, still without a query
    h.service.save_settings(&json!({ "periodic_updates": true }));
    tick(&h, 21);
    let armed_at = h.clock.now();
    assert_eq!(
        h.service.throttle_state(),
        ThrottleState::Armed {
            next_due: add_seconds(armed_at, 900)
        }
    );
    assert_eq!(h.host.query_count(), 0);
}
