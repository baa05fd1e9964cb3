use candle_chart_wasm::application::{ChartRenderer, ManualClock};
use candle_chart_wasm::config::EngineConfig;
use candle_chart_wasm::domain::chart::services::candle_center_x;
use candle_chart_wasm::domain::chart::{ViewState, ViewStatePatch};
use candle_chart_wasm::infrastructure::rendering::RecordingBackend;
use std::rc::Rc;

const WIDTH: f64 = 800.0;

fn renderer() -> (ChartRenderer<RecordingBackend>, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new(1_000.0));
    let renderer = ChartRenderer::new(RecordingBackend::new(), &EngineConfig::default(), clock.clone());
    (renderer, clock)
}

#[test]
fn at_most_49_undos_after_many_mutations() {
    let (mut renderer, clock) = renderer();
    renderer.update_view_state(ViewStatePatch::horizontal(5.0, 0.0));
    for _ in 0..60 {
        assert!(renderer.pan_pixels(10.0, WIDTH));
        clock.advance(121.0);
        renderer.render();
    }
    assert_eq!(renderer.history().len(), 50);

    let mut undos = 0;
    while renderer.can_undo_view() {
        assert!(renderer.undo_view());
        undos += 1;
    }
    assert_eq!(undos, 49);
    assert!(!renderer.undo_view());
}

#[test]
fn pans_within_the_debounce_window_record_once() {
    let (mut renderer, clock) = renderer();
    renderer.update_view_state(ViewStatePatch::horizontal(3.0, 0.0));
    for _ in 0..5 {
        renderer.pan_pixels(-20.0, WIDTH);
        clock.advance(50.0);
        renderer.render();
    }
    clock.advance(120.0);
    renderer.render();
    assert_eq!(renderer.history().len(), 3);
}

#[test]
fn reset_is_idempotent() {
    let (mut renderer, _) = renderer();
    renderer.zoom_to_range(-0.5, 0.5);
    assert!(renderer.reset_view());
    let once = renderer.view_state();
    assert!(!renderer.reset_view());
    assert_eq!(renderer.view_state(), once);
    assert_eq!(once, ViewState::default());
}

#[test]
fn undo_restores_previous_view() {
    let (mut renderer, _) = renderer();
    renderer.zoom_to_range(-0.5, 0.5);
    let zoomed = renderer.view_state();
    renderer.zoom_to_range(0.0, 0.5);
    assert!(renderer.undo_view());
    assert_eq!(renderer.view_state(), zoomed);
}

#[test]
fn zoom_keeps_the_point_under_clip_zero() {
    let (mut renderer, _) = renderer();
    renderer.update_view_state(ViewStatePatch::horizontal(3.0, 0.5));
    let before = renderer.view_state();
    let anchor = before.invert_x(0.0);

    for dy in [-120.0, -40.0, 90.0] {
        renderer.zoom_at_pixel(WIDTH / 2.0, WIDTH, dy);
        let after = renderer.view_state();
        assert!(after.apply_x(anchor).abs() < 1e-4, "anchor drifted to {}", after.apply_x(anchor));
    }
}

#[test]
fn center_on_candle_centres_or_clamps() {
    let total = 200usize;
    for index in [0usize, 3, 50, 100, 150, 196, 199] {
        let (mut renderer, _) = renderer();
        let candle_x = candle_center_x(index, total);
        renderer.center_on_candle(candle_x, 50.0, total as f64);
        let view = renderer.view_state();
        let clip = view.apply_x(candle_x);
        let bound = (view.scale_x - 1.0).max(0.0);
        let centred = clip.abs() < 1e-6;
        let clamped_at_edge = (view.translate_x.abs() - bound).abs() < 1e-9 && (-1.0..=1.0).contains(&clip);
        assert!(centred || clamped_at_edge, "candle {index}: clip {clip}, view {view:?}");
    }
}

#[test]
fn center_on_candle_ignores_empty_input() {
    let (mut renderer, _) = renderer();
    assert!(!renderer.center_on_candle(0.0, 10.0, 0.0));
    assert!(!renderer.center_on_candle(f64::NAN, 10.0, 100.0));
}
