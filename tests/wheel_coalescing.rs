use candle_chart_wasm::application::{CanvasInput, ChartComposition, ChartEvent, ManualClock, ManualFrameScheduler};
use candle_chart_wasm::config::EngineConfig;
use candle_chart_wasm::domain::chart::ViewStatePatch;
use candle_chart_wasm::domain::chart::services::zoom_view_at;
use candle_chart_wasm::domain::market_data::Candle;
use candle_chart_wasm::infrastructure::rendering::RecordingBackend;
use candle_chart_wasm::infrastructure::storage::MemoryDrawingStore;
use std::cell::RefCell;
use std::rc::Rc;

type Chart = ChartComposition<RecordingBackend>;

fn setup() -> (Rc<RefCell<Chart>>, CanvasInput<Chart>, Rc<ManualFrameScheduler>) {
    let mut chart = ChartComposition::new(
        RecordingBackend::new(),
        EngineConfig::default(),
        Rc::new(MemoryDrawingStore::new()),
        Rc::new(ManualClock::new(0.0)),
    );
    chart.resize(800.0, 400.0, 1.0);
    let candles = (0..20)
        .map(|i| Candle::from_values(60_000 * i as u64, 10.0, 12.0, 9.0, 11.0, 1.0))
        .collect();
    chart.set_candles(candles);
    chart.update_view_state(ViewStatePatch::horizontal(2.0, 0.0));
    chart.render();
    chart.take_events();

    let chart = Rc::new(RefCell::new(chart));
    let scheduler = Rc::new(ManualFrameScheduler::new());
    let input = CanvasInput::new(chart.clone(), scheduler.clone());
    (chart, input, scheduler)
}

fn view_changes(chart: &Rc<RefCell<Chart>>) -> usize {
    chart
        .borrow_mut()
        .take_events()
        .iter()
        .filter(|e| matches!(e, ChartEvent::ViewChanged { .. }))
        .count()
}

#[test]
fn burst_of_wheel_events_zooms_once_with_the_latest_delta() {
    let (chart, input, scheduler) = setup();
    let before = chart.borrow().renderer().view_state();

    input.wheel(100.0, -30.0);
    input.wheel(200.0, 80.0);
    input.wheel(400.0, -120.0);
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(chart.borrow().renderer().view_state(), before);

    assert_eq!(scheduler.run_frame(), 1);
    assert_eq!(view_changes(&chart), 1);

    let config = EngineConfig::default();
    let expected = zoom_view_at(
        &before,
        400.0,
        800.0,
        -120.0,
        config.input.zoom_sensitivity,
        config.input.max_zoom_step,
        &chart.borrow().renderer().scale_bounds(),
    )
    .expect("zoom in from scale 2");
    let after = chart.borrow().renderer().view_state();
    assert_eq!(after, before.merge(&expected));
}

#[test]
fn each_frame_takes_a_fresh_payload() {
    let (chart, input, scheduler) = setup();
    input.wheel(400.0, -50.0);
    scheduler.run_frame();
    input.wheel(400.0, -50.0);
    assert_eq!(scheduler.pending(), 1);
    scheduler.run_frame();
    assert_eq!(view_changes(&chart), 2);
    assert_eq!(scheduler.run_frame(), 0);
}

#[test]
fn zero_and_non_finite_deltas_are_ignored() {
    let (chart, input, scheduler) = setup();
    input.wheel(400.0, 0.0);
    input.wheel(400.0, f64::NAN);
    input.wheel(400.0, f64::INFINITY);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(view_changes(&chart), 0);
}

#[test]
fn hover_and_wheel_share_a_frame_without_merging() {
    let (chart, input, scheduler) = setup();
    input.mouse_move(300.0, 200.0);
    input.mouse_move(320.0, 210.0);
    input.wheel(320.0, -40.0);
    assert_eq!(scheduler.pending(), 2);
    scheduler.run_frame();

    let events = chart.borrow_mut().take_events();
    let hovers = events.iter().filter(|e| matches!(e, ChartEvent::PointerHover { .. })).count();
    assert_eq!(hovers, 1);
    assert!(events.iter().any(|e| matches!(e, ChartEvent::ViewChanged { .. })));
}
