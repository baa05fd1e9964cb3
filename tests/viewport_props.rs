use candle_chart_wasm::domain::chart::services::{compute_visible_range, pan_view, zoom_to_range_view, zoom_view_at};
use candle_chart_wasm::domain::chart::{ScaleBounds, ViewState};
use candle_chart_wasm::domain::market_data::Candle;
use quickcheck_macros::quickcheck;

const WIDTH: f64 = 800.0;

fn within_bounds(view: &ViewState, bounds: &ScaleBounds) -> bool {
    view.scale_x >= bounds.min
        && view.scale_x <= bounds.max
        && view.translate_x.abs() <= (view.scale_x - 1.0).max(0.0) + 1e-12
}

/// Replays wheel and drag input and checks the bounds after every step.
#[quickcheck]
fn pan_and_zoom_stay_within_bounds(steps: Vec<(bool, i16, u16)>) -> bool {
    let bounds = ScaleBounds::default();
    let mut view = ViewState::default();
    for (is_zoom, delta, pixel) in steps {
        let pixel = f64::from(pixel % 800);
        let patch = if is_zoom {
            zoom_view_at(&view, pixel, WIDTH, f64::from(delta), 0.0015, 0.5, &bounds)
        } else {
            pan_view(&view, f64::from(delta), WIDTH, &bounds)
        };
        if let Some(patch) = patch {
            view = view.merge(&patch);
        }
        if !within_bounds(&view, &bounds) {
            return false;
        }
    }
    true
}

#[quickcheck]
fn repeated_pan_saturates(dx: i16, repeats: u8) -> bool {
    let bounds = ScaleBounds::default();
    let mut view = ViewState { scale_x: 3.0, ..ViewState::default() };
    let dx = f64::from(dx);
    if dx == 0.0 {
        return true;
    }
    for _ in 0..(u32::from(repeats) + 2_000) {
        if let Some(patch) = pan_view(&view, dx, WIDTH, &bounds) {
            view = view.merge(&patch);
        }
    }
    // dragging right moves the data right, towards the negative limit
    let limit = 2.0 * -dx.signum();
    within_bounds(&view, &bounds) && (view.translate_x - limit).abs() < 1e-9
}

#[quickcheck]
fn zoom_to_range_keeps_source_candles_visible(a: u8, b: u8) -> bool {
    let count = 50usize;
    let (a, b) = (usize::from(a) % count, usize::from(b) % count);
    let (first, last) = (a.min(b), a.max(b));
    let candles: Vec<Candle> = (0..count)
        .map(|i| Candle::from_values(i as u64 * 60_000, 10.0, 11.0, 9.0, 10.5, 1.0))
        .collect();

    let spacing = 2.0 / count as f64;
    let left = -1.0 + first as f64 * spacing;
    let right = -1.0 + (last + 1) as f64 * spacing;
    let bounds = ScaleBounds::default();
    let Some(patch) = zoom_to_range_view(left, right, &bounds) else {
        return false;
    };
    let view = ViewState::default().merge(&patch);
    let Some(range) = compute_visible_range(&candles, &view, None) else {
        return false;
    };
    range.start_index <= first && range.end_index >= last
}

#[test]
fn non_finite_scale_collapses_to_minimum() {
    let bounds = ScaleBounds::default();
    assert_eq!(bounds.clamp_scale(f64::NAN), 1.0);
    assert_eq!(bounds.clamp_scale(f64::INFINITY), 1.0);
    assert_eq!(bounds.clamp_translate(1.0, 0.3), 0.0);
    assert_eq!(bounds.clamp_translate(4.0, f64::NAN), 0.0);
}
