#![cfg(target_arch = "wasm32")]

use candle_chart_wasm::application::{AnimationFrameScheduler, FrameScheduler};
use candle_chart_wasm::domain::market_data::MarketDataParser;
use candle_chart_wasm::infrastructure::storage::{DrawingStore, LocalStorageDrawingStore};
use futures::channel::oneshot;
use futures::future::{AbortHandle, Abortable};
use gloo_timers::future::sleep;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen_test::*;
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_round_trip() {
    let store = LocalStorageDrawingStore;
    store.save("candle_chart_test_key", "[1,2,3]").unwrap();
    assert_eq!(store.load("candle_chart_test_key").as_deref(), Some("[1,2,3]"));
    store.remove("candle_chart_test_key");
    assert!(store.load("candle_chart_test_key").is_none());
}

#[wasm_bindgen_test]
fn iso_dates_parse_through_the_browser() {
    let ts = MarketDataParser::normalize_timestamp(Some(&json!("2024-01-01T00:00:00Z")), 7);
    assert_eq!(ts, 1_704_067_200_000);
    assert_eq!(MarketDataParser::normalize_timestamp(Some(&json!("not a date")), 7), 7);
}

#[wasm_bindgen_test]
fn webgpu_support_check_does_not_panic() {
    let _ = candle_chart_wasm::is_webgpu_supported();
}

#[wasm_bindgen_test(async)]
async fn animation_frame_runs_once() {
    let scheduler = AnimationFrameScheduler::new();
    let (tx, rx) = oneshot::channel();
    scheduler.request(Box::new(move || {
        let _ = tx.send(());
    }));
    assert!(rx.await.is_ok());
}

#[wasm_bindgen_test(async)]
async fn cancelled_frame_never_runs() {
    let scheduler = AnimationFrameScheduler::new();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let id = scheduler.request(Box::new(move || flag.set(true)));
    scheduler.cancel(id);
    sleep(Duration::from_millis(100)).await;
    assert!(!ran.get());
}

#[wasm_bindgen_test(async)]
async fn aborted_poll_sleep_stops() {
    let (handle, registration) = AbortHandle::new_pair();
    let task = Abortable::new(sleep(Duration::from_millis(50)), registration);
    handle.abort();
    assert!(task.await.is_err());
}
