use candle_chart_wasm::application::RealtimeDataManager;
use candle_chart_wasm::config::RealtimeConfig;
use candle_chart_wasm::domain::market_data::ConnectionStatus;
use candle_chart_wasm::infrastructure::http::{PollOutcome, PollingPayload, PollingRetryState};
use candle_chart_wasm::infrastructure::websocket::{StreamEvent, StreamStatus};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn config() -> RealtimeConfig {
    RealtimeConfig {
        symbol: "ETHUSDT".into(),
        polling_url: Some("/api/candles".into()),
        polling_retry_delay_ms: 2_000,
        polling_max_attempts: 3,
        ..RealtimeConfig::default()
    }
}

#[test]
fn third_consecutive_failure_gives_up() {
    let mut retry = PollingRetryState::new(&config());
    let outcomes: Vec<PollOutcome> = (0..3).map(|_| retry.on_failure()).collect();
    assert_eq!(
        outcomes,
        vec![
            PollOutcome::Retry(Duration::from_millis(2_000)),
            PollOutcome::Retry(Duration::from_millis(2_000)),
            PollOutcome::GiveUp,
        ]
    );
    assert_eq!(retry.attempts(), 3);
}

#[test]
fn zero_attempt_budget_still_tries_once() {
    let mut retry = PollingRetryState::new(&RealtimeConfig { polling_max_attempts: 0, ..config() });
    assert_eq!(retry.on_failure(), PollOutcome::GiveUp);
}

#[test]
fn giving_up_reports_disconnected_and_blocks_restart() {
    let manager = RealtimeDataManager::new(config());
    let statuses = Rc::new(RefCell::new(Vec::new()));
    let seen = statuses.clone();
    let subscription = manager.on_status_change(move |status| seen.borrow_mut().push(status));

    manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
    manager.polling_gave_up();
    assert!(manager.polling_failed());
    assert!(!manager.is_polling());
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);

    // a later stream drop does not bring polling back
    manager.on_stream_event(StreamEvent::Status(StreamStatus::Error));
    assert!(!manager.is_polling());
    assert!(manager.polling_failed());

    assert_eq!(*statuses.borrow(), vec![ConnectionStatus::Connected, ConnectionStatus::Disconnected]);
    subscription.unsubscribe();
}

#[test]
fn polled_candles_merge_into_the_series() {
    let manager = RealtimeDataManager::new(config());
    let updates = Rc::new(RefCell::new(0usize));
    let count = updates.clone();
    let subscription = manager.on_data_update(move |_| *count.borrow_mut() += 1);

    let first = PollingPayload::parse(json!([
        {"timestamp": 1_700_000_060_000u64, "open": 10.0, "high": 12.0, "low": 9.0, "close": 11.0},
        {"timestamp": 1_700_000_000_000u64, "open": 9.0, "high": 11.0, "low": 8.0, "close": 10.0}
    ]))
    .unwrap();
    manager.handle_polling_payload(first);

    let update = PollingPayload::parse(json!({
        "candle": {"timestamp": 1_700_000_060_000u64, "open": 10.0, "high": 13.0, "low": 9.0, "close": 12.5}
    }))
    .unwrap();
    manager.handle_polling_payload(update);

    let candles = manager.get_candles();
    assert_eq!(candles.len(), 2);
    assert!(candles[0].timestamp < candles[1].timestamp);
    assert_eq!(candles[1].ohlcv.close.value(), 12.5);
    assert_eq!(*updates.borrow(), 2);

    // nothing valid, nobody notified
    manager.handle_polling_payload(PollingPayload::parse(json!([{"open": -5.0, "close": 1.0}])).unwrap());
    assert_eq!(*updates.borrow(), 2);

    subscription.unsubscribe();
}

#[test]
fn unsubscribed_callbacks_stay_silent() {
    let manager = RealtimeDataManager::new(config());
    let calls = Rc::new(RefCell::new(0));
    let count = calls.clone();
    manager.on_status_change(move |_| *count.borrow_mut() += 1).unsubscribe();

    manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
    assert_eq!(*calls.borrow(), 0);
}
