//! Realtime data manager: one symbol, a reconnecting stream with a polling
//! fallback, and subscribers notified with the full ordered series.

use crate::application::composition::ChartComposition;
use crate::config::RealtimeConfig;
use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::market_data::{Candle, CandleSeries, ConnectionStatus, MarketDataParser};
use crate::infrastructure::http::{PollingFallback, PollingPayload};
use crate::infrastructure::rendering::GraphicsBackend;
use crate::infrastructure::websocket::{MessageKind, StreamClient, StreamEvent, StreamMessage, StreamStatus};
use crate::{log_debug, log_warn};
use futures::future::{AbortHandle, Abortable};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen_futures::spawn_local;

type DataCallback = Rc<dyn Fn(&[Candle])>;
type StatusCallback = Rc<dyn Fn(ConnectionStatus)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Data,
    Status,
}

/// Handle returned by the `on_*` registrations. Dropping it keeps the
/// callback registered; call [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    kind: SubscriptionKind,
    state: Weak<RefCell<State>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.borrow_mut();
        match self.kind {
            SubscriptionKind::Data => state.data_subscribers.retain(|(id, _)| *id != self.id),
            SubscriptionKind::Status => state.status_subscribers.retain(|(id, _)| *id != self.id),
        }
    }
}

struct State {
    config: RealtimeConfig,
    series: CandleSeries,
    status: ConnectionStatus,
    running: bool,
    polling_active: bool,
    polling_failed: bool,
    stream_task: Option<AbortHandle>,
    polling_task: Option<AbortHandle>,
    data_subscribers: Vec<(u64, DataCallback)>,
    status_subscribers: Vec<(u64, StatusCallback)>,
    next_id: u64,
}

impl State {
    fn polling_url_allowed(&self) -> bool {
        self.config.enable_polling && self.config.polling_url.as_deref().is_some_and(|url| url.starts_with('/'))
    }

    fn can_start_polling(&self) -> bool {
        self.running && !self.polling_active && !self.polling_failed && self.polling_url_allowed()
    }
}

#[derive(Clone)]
pub struct RealtimeDataManager {
    state: Rc<RefCell<State>>,
}

impl RealtimeDataManager {
    pub fn new(config: RealtimeConfig) -> Self {
        let series = CandleSeries::new(config.max_candles);
        Self {
            state: Rc::new(RefCell::new(State {
                config,
                series,
                status: ConnectionStatus::Disconnected,
                running: false,
                polling_active: false,
                polling_failed: false,
                stream_task: None,
                polling_task: None,
                data_subscribers: Vec::new(),
                status_subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn upgrade(weak: &Weak<RefCell<State>>) -> Option<Self> {
        weak.upgrade().map(|state| Self { state })
    }

    pub fn symbol(&self) -> String {
        self.state.borrow().config.symbol.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn is_polling(&self) -> bool {
        self.state.borrow().polling_active
    }

    /// Polling gave up; it is not restarted until the next `start`.
    pub fn polling_failed(&self) -> bool {
        self.state.borrow().polling_failed
    }

    pub fn get_candles(&self) -> Vec<Candle> {
        self.state.borrow().series.to_vec()
    }

    // ---- lifecycle ------------------------------------------------------

    /// Open the stream, or poll straight away when streaming is disabled.
    pub fn start(&self) {
        let stream_url = {
            let mut state = self.state.borrow_mut();
            if state.running {
                return;
            }
            state.running = true;
            state.polling_failed = false;
            state.config.websocket_url.clone().filter(|_| state.config.enable_websocket)
        };

        match stream_url {
            Some(url) => self.start_stream(url),
            None => {
                log_debug!(LogComponent::Application("Realtime"), "streaming disabled, trying polling");
                self.start_polling();
            }
        }
    }

    /// Abort every task and report `Disconnected`.
    pub fn stop(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.running = false;
            state.polling_active = false;
            for handle in [state.stream_task.take(), state.polling_task.take()].into_iter().flatten() {
                handle.abort();
            }
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn start_stream(&self, url: String) {
        let (symbol, config) = {
            let state = self.state.borrow();
            (state.config.symbol.clone(), state.config.stream.clone())
        };
        let client = StreamClient::new(url, symbol, config);
        let weak = Rc::downgrade(&self.state);
        let (handle, registration) = AbortHandle::new_pair();
        let task = Abortable::new(
            client.run(move |event| {
                if let Some(manager) = Self::upgrade(&weak) {
                    manager.on_stream_event(event);
                }
            }),
            registration,
        );
        spawn_local(async move {
            let _ = task.await;
        });
        self.state.borrow_mut().stream_task = Some(handle);
    }

    fn start_polling(&self) {
        let fallback = {
            let state = self.state.borrow();
            if !state.can_start_polling() {
                return;
            }
            PollingFallback::new(&state.config)
        };
        let Some(fallback) = fallback else {
            return;
        };

        let since = Rc::downgrade(&self.state);
        let data = since.clone();
        let done = since.clone();
        let run = fallback.run(
            move || {
                let state = since.upgrade()?;
                let last = state.borrow().series.last_timestamp();
                last.map(|ts| ts.value())
            },
            move |payload| {
                if let Some(manager) = Self::upgrade(&data) {
                    manager.handle_polling_payload(payload);
                }
            },
        );
        let (handle, registration) = AbortHandle::new_pair();
        let task = Abortable::new(
            async move {
                run.await;
                if let Some(manager) = Self::upgrade(&done) {
                    manager.polling_gave_up();
                }
            },
            registration,
        );
        spawn_local(async move {
            let _ = task.await;
        });

        {
            let mut state = self.state.borrow_mut();
            state.polling_task = Some(handle);
            state.polling_active = true;
        }
        get_logger().info(LogComponent::Application("Realtime"), "Polling fallback started");
        self.set_status(ConnectionStatus::Polling);
    }

    fn stop_polling(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(handle) = state.polling_task.take() {
            handle.abort();
        }
        state.polling_active = false;
    }

    pub fn on_stream_event(&self, event: StreamEvent) {
        match event {
            StreamEvent::Status(StreamStatus::Connected) => {
                self.stop_polling();
                self.set_status(ConnectionStatus::Connected);
            }
            StreamEvent::Status(status @ (StreamStatus::Disconnected | StreamStatus::Error)) => {
                log_warn!(LogComponent::Application("Realtime"), "stream {}", status);
                self.set_status(ConnectionStatus::Disconnected);
                self.start_polling();
            }
            StreamEvent::Status(StreamStatus::Connecting | StreamStatus::Reconnecting) => {}
            StreamEvent::Message(message) => {
                self.handle_stream_message(&message);
            }
        }
    }

    /// Polling exhausted its retries.
    pub fn polling_gave_up(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.polling_failed = true;
            state.polling_active = false;
            state.polling_task = None;
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    // ---- data -----------------------------------------------------------

    pub fn set_initial_data(&self, candles: Vec<Candle>) {
        self.state.borrow_mut().series.set_initial(candles);
        self.notify_data();
    }

    /// Apply one raw stream frame. Returns true when the series changed.
    pub fn handle_message(&self, raw: &Value) -> bool {
        match StreamMessage::from_value(raw.clone()) {
            Ok(message) => self.handle_stream_message(&message),
            Err(e) => {
                log_warn!(LogComponent::Application("Realtime"), "ignoring frame: {}", e);
                false
            }
        }
    }

    fn handle_stream_message(&self, message: &StreamMessage) -> bool {
        if message.is_heartbeat() {
            return false;
        }
        let now = get_time_provider().current_timestamp();
        let changed = {
            let mut state = self.state.borrow_mut();
            if !message.is_for(&state.config.symbol) {
                return false;
            }
            match message.kind {
                MessageKind::Candle => match MarketDataParser::parse_candle(&message.raw, now) {
                    Some(candle) => {
                        state.series.upsert(candle);
                        true
                    }
                    None => {
                        log_warn!(LogComponent::Application("Realtime"), "invalid candle dropped");
                        false
                    }
                },
                MessageKind::Tick | MessageKind::Price => match MarketDataParser::parse_tick(&message.raw, now) {
                    Some(tick) => {
                        let interval = state.config.tick_interval_ms;
                        state.series.apply_tick(&tick, interval)
                    }
                    None => {
                        log_warn!(LogComponent::Application("Realtime"), "invalid tick dropped");
                        false
                    }
                },
                kind => {
                    log_debug!(LogComponent::Application("Realtime"), "{} frame ignored", kind);
                    false
                }
            }
        };
        if changed {
            self.notify_data();
        }
        changed
    }

    pub fn handle_polling_payload(&self, payload: PollingPayload) {
        let candles = payload.into_candles(get_time_provider().current_timestamp());
        if candles.is_empty() {
            return;
        }
        self.state.borrow_mut().series.merge(&candles);
        self.notify_data();
    }

    // ---- subscribers ----------------------------------------------------

    pub fn on_data_update(&self, callback: impl Fn(&[Candle]) + 'static) -> Subscription {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.data_subscribers.push((id, Rc::new(callback)));
        Subscription { id, kind: SubscriptionKind::Data, state: Rc::downgrade(&self.state) }
    }

    pub fn on_status_change(&self, callback: impl Fn(ConnectionStatus) + 'static) -> Subscription {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.status_subscribers.push((id, Rc::new(callback)));
        Subscription { id, kind: SubscriptionKind::Status, state: Rc::downgrade(&self.state) }
    }

    fn notify_data(&self) {
        let (candles, subscribers): (Vec<Candle>, Vec<DataCallback>) = {
            let state = self.state.borrow();
            (state.series.to_vec(), state.data_subscribers.iter().map(|(_, cb)| cb.clone()).collect())
        };
        for callback in subscribers {
            callback(&candles);
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let subscribers: Vec<StatusCallback> = {
            let mut state = self.state.borrow_mut();
            if state.status == status {
                return;
            }
            state.status = status;
            state.status_subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in subscribers {
            callback(status);
        }
    }
}

/// Route `manager` into `chart`: the series starts from the candles the chart
/// already shows, data updates replace the chart candles and status changes
/// reach the HUD.
pub fn bind_chart<B: GraphicsBackend + 'static>(
    manager: &RealtimeDataManager,
    chart: &Rc<RefCell<ChartComposition<B>>>,
) -> Vec<Subscription> {
    let history = chart.borrow().candles().to_vec();
    if !history.is_empty() {
        manager.set_initial_data(history);
    }

    let data_target = Rc::downgrade(chart);
    let status_target = Weak::clone(&data_target);
    vec![
        manager.on_data_update(move |candles| {
            if let Some(chart) = data_target.upgrade() {
                chart.borrow_mut().set_candles(candles.to_vec());
            }
        }),
        manager.on_status_change(move |status| {
            if let Some(chart) = status_target.upgrade() {
                chart.borrow_mut().set_status(status);
            }
        }),
    ]
}

impl Drop for State {
    fn drop(&mut self) {
        for handle in [self.stream_task.take(), self.polling_task.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    // 2023-11-14T22:14:00Z, on a minute boundary
    const T0: u64 = 1_700_000_040_000;

    fn manager() -> RealtimeDataManager {
        RealtimeDataManager::new(RealtimeConfig { symbol: "BTCUSDT".into(), ..Default::default() })
    }

    #[test]
    fn other_symbols_and_heartbeats_are_ignored() {
        let manager = manager();
        assert!(!manager.handle_message(&json!({"type": "ping"})));
        assert!(!manager.handle_message(&json!({
            "type": "candle", "symbol": "ETHUSDT", "timestamp": 60_000,
            "data": {"open": 1.0, "close": 2.0}
        })));
        assert!(manager.get_candles().is_empty());
    }

    #[test]
    fn ticks_fold_into_the_last_bucket() {
        let manager = manager();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let _sub = manager.on_data_update(move |candles| counter.set(candles.len()));

        manager.handle_message(&json!({
            "type": "candle", "symbol": "BTCUSDT", "timestamp": T0,
            "data": {"open": 100.0, "high": 110.0, "low": 95.0, "close": 105.0}
        }));
        manager.handle_message(&json!({
            "type": "tick", "symbol": "BTCUSDT", "timestamp": T0 + 30_000, "data": {"price": 120.0}
        }));
        let candles = manager.get_candles();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].ohlcv.high.value(), 120.0);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn status_subscribers_fire_on_change_only() {
        let manager = manager();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let sub = manager.on_status_change(move |_| counter.set(counter.get() + 1));

        manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
        manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
        assert_eq!(calls.get(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Connected);

        sub.unsubscribe();
        manager.stop();
        assert_eq!(calls.get(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn giving_up_marks_polling_failed() {
        let manager = manager();
        manager.on_stream_event(StreamEvent::Status(StreamStatus::Connected));
        manager.polling_gave_up();
        assert!(manager.polling_failed());
        assert!(!manager.is_polling());
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn polling_payload_merges() {
        let manager = manager();
        manager.set_initial_data(vec![Candle::from_values(T0, 1.0, 2.0, 0.5, 1.5, 0.0)]);
        let payload = PollingPayload::parse(json!([
            {"timestamp": T0, "open": 1.0, "high": 3.0, "low": 0.5, "close": 2.5},
            {"timestamp": T0 + 60_000, "open": 2.5, "close": 2.0}
        ]))
        .unwrap();
        manager.handle_polling_payload(payload);
        let candles = manager.get_candles();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].ohlcv.close.value(), 2.5);
    }

    #[test]
    fn second_and_millisecond_stamps_land_on_the_same_candle() {
        let manager = manager();
        manager.handle_message(&json!({
            "type": "candle", "symbol": "BTCUSDT", "timestamp": T0 / 1000,
            "data": {"open": 100.0, "close": 101.0}
        }));
        manager.handle_message(&json!({
            "type": "candle", "symbol": "BTCUSDT", "timestamp": T0,
            "data": {"open": 100.0, "close": 104.0}
        }));
        let candles = manager.get_candles();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp.value(), T0);
        assert_eq!(candles[0].ohlcv.close.value(), 104.0);
    }
}
