use candle_chart_wasm::application::{CanvasInput, ChartComposition, ChartEvent, ManualClock, ManualFrameScheduler};
use candle_chart_wasm::config::EngineConfig;
use candle_chart_wasm::domain::chart::{DrawingMode, RegionSelection};
use candle_chart_wasm::domain::market_data::Candle;
use candle_chart_wasm::infrastructure::rendering::RecordingBackend;
use candle_chart_wasm::infrastructure::storage::MemoryDrawingStore;
use std::cell::RefCell;
use std::rc::Rc;

type Chart = ChartComposition<RecordingBackend>;

fn candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = 50.0 + (i % 7) as f64;
            Candle::from_values(60_000 * i as u64, base, base + 3.0, base - 3.0, base + 1.0, 5.0)
        })
        .collect()
}

fn setup() -> (Rc<RefCell<Chart>>, CanvasInput<Chart>) {
    let clock = Rc::new(ManualClock::new(0.0));
    let mut chart = ChartComposition::new(
        RecordingBackend::new(),
        EngineConfig::default(),
        Rc::new(MemoryDrawingStore::new()),
        clock,
    );
    chart.resize(800.0, 400.0, 1.0);
    chart.set_candles(candles(40));
    chart.render();
    chart.take_events();
    let chart = Rc::new(RefCell::new(chart));
    let input = CanvasInput::new(chart.clone(), Rc::new(ManualFrameScheduler::new()));
    (chart, input)
}

fn region_selected(events: &[ChartEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            ChartEvent::RegionSelected { metrics } => Some(metrics.is_some()),
            _ => None,
        })
        .collect()
}

#[test]
fn narrow_drag_does_not_zoom() {
    let (chart, input) = setup();
    let before = chart.borrow().renderer().view_state();

    input.mouse_down(100.0, 100.0, true);
    input.mouse_move(104.0, 200.0);
    input.mouse_up(104.0, 200.0);

    let mut chart = chart.borrow_mut();
    assert_eq!(chart.region(), RegionSelection::Idle);
    assert_eq!(chart.renderer().view_state(), before);
    assert!(chart.region_metrics().is_none());
    let events = chart.take_events();
    assert!(region_selected(&events).is_empty());
    assert!(events.iter().any(|e| matches!(e, ChartEvent::RegionEnd { cancelled: false, .. })));
}

#[test]
fn flat_drag_does_not_zoom() {
    let (chart, input) = setup();
    let before = chart.borrow().renderer().view_state();

    input.mouse_down(100.0, 100.0, true);
    input.mouse_move(500.0, 103.0);
    input.mouse_up(500.0, 103.0);

    let chart = chart.borrow();
    assert_eq!(chart.region(), RegionSelection::Idle);
    assert_eq!(chart.renderer().view_state(), before);
}

#[test]
fn completed_drag_zooms_and_reports_metrics() {
    let (chart, input) = setup();
    let before = chart.borrow().renderer().view_state();

    input.mouse_down(200.0, 80.0, true);
    assert!(input.is_selecting_region());
    input.mouse_move(450.0, 300.0);
    input.mouse_up(600.0, 320.0);

    let mut chart = chart.borrow_mut();
    assert!(matches!(chart.region(), RegionSelection::Completed { .. }));
    assert!(chart.renderer().view_state().scale_x > before.scale_x);
    assert!(chart.custom_zoom());

    let metrics = chart.region_metrics().cloned().expect("metrics for a completed region");
    assert!(metrics.candle_count >= 1);
    assert!(metrics.time_start <= metrics.time_end);
    assert!(metrics.price_range >= 0.0);

    let events = chart.take_events();
    assert_eq!(region_selected(&events), vec![true]);
    assert!(events.iter().any(|e| matches!(e, ChartEvent::ViewChanged { .. })));
}

#[test]
fn leaving_mid_drag_cancels() {
    let (chart, input) = setup();
    let before = chart.borrow().renderer().view_state();

    input.mouse_down(200.0, 80.0, true);
    input.mouse_move(600.0, 320.0);
    input.mouse_leave();

    let mut chart = chart.borrow_mut();
    assert_eq!(chart.region(), RegionSelection::Idle);
    assert_eq!(chart.renderer().view_state(), before);
    let events = chart.take_events();
    assert!(events.iter().any(|e| matches!(e, ChartEvent::RegionEnd { cancelled: true, .. })));
    assert!(events.iter().any(|e| matches!(e, ChartEvent::PointerLeave)));
}

#[test]
fn shift_press_in_drawing_mode_pans_instead() {
    let (chart, input) = setup();
    chart.borrow_mut().set_drawing_mode(DrawingMode::Rectangle);
    input.mouse_down(200.0, 80.0, true);
    assert!(input.is_dragging());
    assert!(!input.is_selecting_region());
}
