use candle_chart_wasm::application::{ChartComposition, ManualClock, RealtimeDataManager, bind_chart};
use candle_chart_wasm::config::{EngineConfig, RealtimeConfig};
use candle_chart_wasm::domain::market_data::{Candle, ConnectionStatus};
use candle_chart_wasm::infrastructure::rendering::RecordingBackend;
use candle_chart_wasm::infrastructure::storage::MemoryDrawingStore;
use candle_chart_wasm::infrastructure::websocket::{StreamEvent, StreamStatus};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

const T0: u64 = 1_700_000_040_000;
const MINUTE: u64 = 60_000;

type Chart = ChartComposition<RecordingBackend>;

fn history(n: u64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i % 5) as f64;
            Candle::from_values(T0 + i * MINUTE, base, base + 2.0, base - 2.0, base + 1.0, 3.0)
        })
        .collect()
}

fn chart_with(candles: Vec<Candle>) -> Rc<RefCell<Chart>> {
    let mut chart = ChartComposition::new(
        RecordingBackend::new(),
        EngineConfig::default(),
        Rc::new(MemoryDrawingStore::new()),
        Rc::new(ManualClock::new(0.0)),
    );
    chart.resize(800.0, 400.0, 1.0);
    chart.set_candles(candles);
    Rc::new(RefCell::new(chart))
}

fn manager() -> RealtimeDataManager {
    RealtimeDataManager::new(RealtimeConfig { symbol: "BTCUSDT".into(), ..RealtimeConfig::default() })
}

fn stream_candle(timestamp: u64, close: f64) -> serde_json::Value {
    json!({
        "type": "candle", "symbol": "BTCUSDT", "timestamp": timestamp,
        "data": {"open": 100.0, "high": 110.0, "low": 95.0, "close": close}
    })
}

#[test]
fn first_stream_candle_extends_host_history() {
    let chart = chart_with(history(100));
    let manager = manager();
    let _subscriptions = bind_chart(&manager, &chart);
    assert_eq!(manager.get_candles().len(), 100);

    assert!(manager.handle_message(&stream_candle(T0 + 100 * MINUTE, 104.0)));

    let chart = chart.borrow();
    assert_eq!(chart.candles().len(), 101);
    assert_eq!(chart.candles()[0].timestamp.value(), T0);
    assert_eq!(chart.candles()[100].ohlcv.close.value(), 104.0);
}

#[test]
fn stream_candle_with_a_known_timestamp_replaces_it() {
    let chart = chart_with(history(10));
    let manager = manager();
    let _subscriptions = bind_chart(&manager, &chart);

    manager.handle_message(&stream_candle(T0 + 9 * MINUTE, 107.5));

    let chart = chart.borrow();
    assert_eq!(chart.candles().len(), 10);
    assert_eq!(chart.candles()[9].ohlcv.close.value(), 107.5);
}

#[test]
fn history_set_after_binding_becomes_the_base() {
    let chart = chart_with(Vec::new());
    let manager = manager();
    let _subscriptions = bind_chart(&manager, &chart);
    assert!(manager.get_candles().is_empty());

    manager.set_initial_data(history(20));
    assert_eq!(chart.borrow().candles().len(), 20);

    manager.handle_message(&stream_candle(T0 + 20 * MINUTE, 101.0));
    assert_eq!(chart.borrow().candles().len(), 21);
}

#[test]
fn status_reaches_the_chart_until_unsubscribed() {
    let chart = chart_with(history(3));
    let manager = manager();
    let subscriptions = bind_chart(&manager, &chart);

    manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
    assert_eq!(chart.borrow().hud().status, ConnectionStatus::Connected);

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    manager.handle_message(&stream_candle(T0 + 3 * MINUTE, 101.0));
    assert_eq!(chart.borrow().candles().len(), 3);
    assert_eq!(manager.get_candles().len(), 4);
}
