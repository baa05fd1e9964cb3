//! Viewport arithmetic shared by the renderer, the composition layer and the HUD.

use super::value_objects::{CandleMetrics, ScaleBounds, ViewState, ViewStatePatch, VisibleRange};
use crate::domain::market_data::Candle;

/// Centre of candle `index` of `count` in original space.
pub fn candle_center_x(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    -1.0 + (index as f64 + 0.5) * (2.0 / count as f64)
}

pub fn pixel_to_clip_x(pixel_x: f64, width: f64) -> f64 {
    (pixel_x / width) * 2.0 - 1.0
}

/// Pixel y grows downwards; clip y grows upwards.
pub fn pixel_to_clip_y(pixel_y: f64, height: f64) -> f64 {
    ((height - pixel_y) / height) * 2.0 - 1.0
}

pub fn clip_to_original_x(clip_x: f64, view: &ViewState) -> f64 {
    view.invert_x(clip_x)
}

/// Price under a clip y inside `[price_min, price_max]`.
pub fn price_at_clip_y(clip_y: f64, price_min: f64, price_max: f64) -> f64 {
    let ratio = ((clip_y + 1.0) / 2.0).clamp(0.0, 1.0);
    price_min + (price_max - price_min) * ratio
}

/// Candle under `original_x`, if the point lies within its body half width.
pub fn hit_test_candle(original_x: f64, metrics: &CandleMetrics, count: usize) -> Option<usize> {
    if count == 0 || metrics.candle_spacing <= 0.0 || !original_x.is_finite() {
        return None;
    }
    let relative = (original_x + 1.0) / metrics.candle_spacing;
    let index = (relative - 0.5).round();
    if index < 0.0 || index >= count as f64 {
        return None;
    }
    let index = index as usize;
    let center = -1.0 + (index as f64 + 0.5) * metrics.candle_spacing;
    ((original_x - center).abs() <= metrics.half_width).then_some(index)
}

/// Nearest candle index for `original_x`, clamped to the data.
pub fn nearest_index(original_x: f64, count: usize) -> usize {
    if count <= 1 || !original_x.is_finite() {
        return 0;
    }
    let last = (count - 1) as f64;
    (((original_x + 1.0) / 2.0) * last).round().clamp(0.0, last) as usize
}

/// Indices whose transformed body intersects `[-1, 1]`, with their price and time extent.
pub fn compute_visible_range(candles: &[Candle], view: &ViewState, metrics: Option<&CandleMetrics>) -> Option<VisibleRange> {
    if candles.is_empty() {
        return None;
    }
    let n = candles.len();
    let spacing = metrics.map(|m| m.candle_spacing).unwrap_or(2.0 / n as f64);
    let half_width = metrics.map(|m| m.half_width).unwrap_or(spacing * 0.35);

    let mut start = n - 1;
    let mut end = 0;
    for index in 0..n {
        let center = -1.0 + (index as f64 + 0.5) * spacing;
        let left = view.apply_x(center - half_width);
        let right = view.apply_x(center + half_width);
        if right >= -1.0 && left <= 1.0 {
            start = start.min(index);
            end = end.max(index);
        }
    }
    if start > end {
        start = 0;
        end = n - 1;
    }

    let slice = &candles[start..=end];
    let price_min = slice.iter().map(|c| c.ohlcv.low.value()).fold(f64::INFINITY, f64::min);
    let price_max = slice.iter().map(|c| c.ohlcv.high.value()).fold(f64::NEG_INFINITY, f64::max);

    Some(VisibleRange {
        time_start: slice[0].timestamp.value(),
        time_end: slice[slice.len() - 1].timestamp.value(),
        price_min,
        price_max,
        start_index: start,
        end_index: end,
        candle_count: slice.len(),
    })
}

/// Pan by a pixel delta. `None` when nothing changes.
pub fn pan_view(view: &ViewState, dx: f64, width: f64, bounds: &ScaleBounds) -> Option<ViewStatePatch> {
    if dx == 0.0 || width <= 0.0 || !dx.is_finite() {
        return None;
    }
    let delta_clip = (dx / width) * 2.0;
    let translate = bounds.clamp_translate(view.scale_x, view.translate_x - delta_clip);
    Some(ViewStatePatch { translate_x: Some(translate), ..Default::default() })
}

/// Zoom around the pixel under the cursor. Positive `dy` zooms out.
pub fn zoom_view_at(
    view: &ViewState,
    pixel_x: f64,
    width: f64,
    dy: f64,
    sensitivity: f64,
    max_step: f64,
    bounds: &ScaleBounds,
) -> Option<ViewStatePatch> {
    if width <= 0.0 || dy == 0.0 || !dy.is_finite() {
        return None;
    }
    let clip_x = pixel_to_clip_x(pixel_x, width);
    let amount = 1.0 + (dy.abs() * sensitivity).min(max_step);
    let factor = if dy > 0.0 { 1.0 / amount } else { amount };
    let scale = bounds.clamp_scale(view.scale_x * factor);

    let base_x = view.invert_x(clip_x);
    let translate = bounds.clamp_translate(scale, clip_x - scale * base_x);
    Some(ViewStatePatch::horizontal(scale, translate))
}

/// Fit `[left, right]` of original space to the clip window.
pub fn zoom_to_range_view(left: f64, right: f64, bounds: &ScaleBounds) -> Option<ViewStatePatch> {
    let min = left.min(right);
    let max = left.max(right);
    let span = max - min;
    if !(span > 0.0) {
        return None;
    }
    let scale = bounds.clamp_scale(2.0 / span);
    let translate = bounds.clamp_translate(scale, -1.0 - scale * min);
    Some(ViewStatePatch::horizontal(scale, translate))
}

/// Show about `visible` candles of `total`, centring `candle_x` where the
/// translate bound allows it.
pub fn center_on_candle_view(candle_x: f64, visible: f64, total: f64, bounds: &ScaleBounds) -> ViewStatePatch {
    let range_width = visible * (2.0 / total);
    let mut scale = bounds.clamp_scale(2.0 / range_width);
    let mut translate = -scale * candle_x;

    let max_translate = (scale - 1.0).max(0.0);
    if translate.abs() > max_translate && candle_x.abs() < 0.9999 {
        let min_scale = 1.0 / (1.0 - candle_x.abs());
        if min_scale > scale && min_scale <= bounds.max {
            scale = bounds.clamp_scale(min_scale);
            translate = -scale * candle_x;
        }
    }

    ViewStatePatch::horizontal(scale, bounds.clamp_translate(scale, translate))
}

/// Outcome of [`auto_center_plan`].
pub enum AutoCenter {
    Direct(ViewStatePatch),
    CenterOn { candle_x: f64, visible: f64, total: f64 },
}

/// Auto-centre on the last candle, aiming at a window of about
/// `target_visible` candles (half of them left of the last one).
///
/// Returns the direct patch when the required translate fits the bound, or
/// the `center_on_candle` arguments otherwise.
pub fn auto_center_plan(count: usize, target_visible: usize, bounds: &ScaleBounds) -> Option<AutoCenter> {
    if count == 0 {
        return None;
    }
    let half = (target_visible / 2).max(1);
    let last_index = count - 1;
    let last_x = candle_center_x(last_index, count);
    let left = half.min(last_index);
    let start_x = candle_center_x(last_index - left, count);
    let adjusted_start = (-1.0f64).max(start_x - (last_x - start_x));
    let span = last_x - adjusted_start;

    // a single candle gives a zero span, which saturates at the max scale
    let scale = (2.0 / span).clamp(bounds.min, bounds.max);
    let translate = -scale * last_x;
    if translate.abs() <= (scale - 1.0).max(0.0) {
        return Some(AutoCenter::Direct(ViewStatePatch::horizontal(scale, translate)));
    }
    Some(AutoCenter::CenterOn {
        candle_x: last_x,
        visible: half.min(count / 2).max(1) as f64,
        total: count as f64,
    })
}
