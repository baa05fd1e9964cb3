//! CPU-side vertex generation. X is in original space (`[-1, 1]` before the
//! view transform) and y is already in clip space.

use crate::config::SeriesPalette;
use crate::domain::chart::{CandleMetrics, Color};
use crate::domain::market_data::Candle;

/// Top and bottom alpha of the area fill, relative to the area color.
pub const AREA_TOP_ALPHA: f32 = 0.25;
pub const AREA_BOTTOM_ALPHA: f32 = 0.0;

/// Price to clip-y mapping with padding around the data bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub min: f64,
    pub max: f64,
}

impl PriceScale {
    /// Fit every finite open/high/low/close, padded by 8% of the range (or a
    /// small fraction of the price when the range is flat).
    pub fn fit(candles: &[Candle]) -> Self {
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for c in candles {
            for p in [c.ohlcv.open, c.ohlcv.high, c.ohlcv.low, c.ohlcv.close] {
                let p = p.value();
                if p.is_finite() {
                    min = min.min(p);
                    max = max.max(p);
                }
            }
        }
        if !min.is_finite() || !max.is_finite() {
            return Self { min: 0.0, max: 1.0 };
        }
        let range = max - min;
        let padding = if range > 0.0 { range * 0.08 } else { (min.abs() * 0.005).max(0.0005) };
        Self { min: min - padding, max: max + padding }
    }

    pub fn from_metrics(metrics: &CandleMetrics) -> Self {
        Self { min: metrics.price_min, max: metrics.price_max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn to_clip(&self, price: f64) -> f32 {
        let range = self.range();
        if range <= 0.0 {
            return 0.0;
        }
        (-1.0 + 2.0 * (price - self.min) / range) as f32
    }
}

/// Horizontal layout for `count` evenly spaced candles.
pub fn candle_layout(count: usize) -> (f64, f64, f64) {
    let spacing = 2.0 / count.max(1) as f64;
    let gap = (spacing * 0.15).max(0.02).min(spacing * 0.55);
    let half_width = (spacing - gap) / 2.0;
    (spacing, gap, half_width)
}

fn metrics_for(count: usize, scale: &PriceScale) -> CandleMetrics {
    let (candle_spacing, gap, half_width) = candle_layout(count);
    CandleMetrics {
        half_width,
        candle_spacing,
        gap,
        price_min: scale.min,
        price_max: scale.max,
        price_range: scale.range(),
    }
}

/// Layout and price bounds shared by every series type, `None` without data.
pub fn series_metrics(candles: &[Candle]) -> Option<CandleMetrics> {
    (!candles.is_empty()).then(|| metrics_for(candles.len(), &PriceScale::fit(candles)))
}

fn center_x(index: usize, spacing: f64) -> f32 {
    (-1.0 + (index as f64 + 0.5) * spacing) as f32
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandlestickGeometry {
    pub body_positions: Vec<[f32; 2]>,
    pub body_colors: Vec<[f32; 4]>,
    pub body_indices: Vec<u32>,
    pub wick_positions: Vec<[f32; 2]>,
    pub wick_colors: Vec<[f32; 4]>,
    pub bullish: Vec<bool>,
    pub metrics: Option<CandleMetrics>,
}

/// Bodies and wicks for `candles`. Candles with non-finite prices produce no
/// vertices; flat candles produce only a wick.
pub fn generate_candlestick_geometry(candles: &[Candle], palette: &SeriesPalette) -> CandlestickGeometry {
    let mut out = CandlestickGeometry::default();
    if candles.is_empty() {
        return out;
    }
    let scale = PriceScale::fit(candles);
    let metrics = metrics_for(candles.len(), &scale);
    let half_width = metrics.half_width as f32;

    out.body_positions.reserve(candles.len() * 4);
    out.body_indices.reserve(candles.len() * 6);
    out.wick_positions.reserve(candles.len() * 2);

    for (i, candle) in candles.iter().enumerate() {
        let bullish = candle.is_bullish();
        out.bullish.push(bullish);
        if !candle.ohlcv.is_finite() {
            continue;
        }
        let color = if bullish { palette.bullish } else { palette.bearish }.to_array();
        let x = center_x(i, metrics.candle_spacing);
        let open_y = scale.to_clip(candle.ohlcv.open.value());
        let close_y = scale.to_clip(candle.ohlcv.close.value());

        out.wick_positions.push([x, scale.to_clip(candle.ohlcv.low.value())]);
        out.wick_positions.push([x, scale.to_clip(candle.ohlcv.high.value())]);
        out.wick_colors.extend([color; 2]);

        if (close_y - open_y).abs() > 0.0 {
            let base = out.body_positions.len() as u32;
            let (top, bottom) = (open_y.max(close_y), open_y.min(close_y));
            out.body_positions.extend([
                [x - half_width, bottom],
                [x + half_width, bottom],
                [x + half_width, top],
                [x - half_width, top],
            ]);
            out.body_colors.extend([color; 4]);
            out.body_indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    out.metrics = Some(metrics);
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineGeometry {
    pub positions: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub metrics: Option<CandleMetrics>,
}

/// Close-price line strip. Non-finite closes are skipped.
pub fn generate_line_geometry(candles: &[Candle], palette: &SeriesPalette) -> LineGeometry {
    let mut out = LineGeometry::default();
    if candles.is_empty() {
        return out;
    }
    let scale = PriceScale::fit(candles);
    let metrics = metrics_for(candles.len(), &scale);
    let color = palette.line.to_array();
    for (i, candle) in candles.iter().enumerate() {
        let close = candle.ohlcv.close.value();
        if close.is_finite() {
            out.positions.push([center_x(i, metrics.candle_spacing), scale.to_clip(close)]);
            out.colors.push(color);
        }
    }
    out.metrics = Some(metrics);
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaGeometry {
    /// Triangle strip alternating close point and bottom edge.
    pub fill_positions: Vec<[f32; 2]>,
    pub fill_colors: Vec<[f32; 4]>,
    pub outline: LineGeometry,
}

/// Gradient fill under the close line plus the line itself.
pub fn generate_area_geometry(candles: &[Candle], palette: &SeriesPalette) -> AreaGeometry {
    let outline = generate_line_geometry(candles, palette);
    let top = palette.area.with_alpha(palette.area.a * AREA_TOP_ALPHA).to_array();
    let bottom = palette.area.with_alpha(AREA_BOTTOM_ALPHA).to_array();

    let mut fill_positions = Vec::with_capacity(outline.positions.len() * 2);
    let mut fill_colors = Vec::with_capacity(outline.positions.len() * 2);
    for &[x, y] in &outline.positions {
        fill_positions.extend([[x, y], [x, -1.0]]);
        fill_colors.extend([top, bottom]);
    }
    AreaGeometry { fill_positions, fill_colors, outline }
}

/// Line-list segments joining consecutive defined values.
pub fn indicator_polyline(values: &[Option<f64>], metrics: &CandleMetrics, color: Color) -> (Vec<[f32; 2]>, Vec<[f32; 4]>) {
    let scale = PriceScale::from_metrics(metrics);
    let color = color.to_array();
    let mut positions = Vec::new();
    for (i, pair) in values.windows(2).enumerate() {
        if let [Some(a), Some(b)] = pair
            && a.is_finite()
            && b.is_finite()
        {
            positions.push([center_x(i, metrics.candle_spacing), scale.to_clip(*a)]);
            positions.push([center_x(i + 1, metrics.candle_spacing), scale.to_clip(*b)]);
        }
    }
    let colors = vec![color; positions.len()];
    (positions, colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: u64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::from_values(ts, o, h, l, c, 1.0)
    }

    #[test]
    fn flat_candle_has_wick_only() {
        let geometry = generate_candlestick_geometry(&[candle(0, 10.0, 11.0, 9.0, 10.0)], &SeriesPalette::default());
        assert!(geometry.body_positions.is_empty());
        assert_eq!(geometry.wick_positions.len(), 2);
        assert_eq!(geometry.bullish, vec![true]);
    }

    #[test]
    fn invalid_prices_do_not_panic() {
        let candles = [candle(0, f64::NAN, 1.0, 2.0, 3.0), candle(1, 5.0, 4.0, 6.0, 5.5)];
        let geometry = generate_candlestick_geometry(&candles, &SeriesPalette::default());
        assert_eq!(geometry.wick_positions.len(), 2);
        assert_eq!(geometry.body_indices.len(), 6);
    }

    #[test]
    fn large_series_keeps_every_body() {
        let candles: Vec<Candle> =
            (0..20_000).map(|i| candle(i, 10.0, 12.0, 9.0, if i % 2 == 0 { 11.0 } else { 9.5 })).collect();
        let geometry = generate_candlestick_geometry(&candles, &SeriesPalette::default());
        assert_eq!(geometry.body_positions.len(), 80_000);
        assert_eq!(geometry.body_indices.len(), 120_000);
        assert_eq!(geometry.body_indices.last().copied(), Some(79_999));
    }

    #[test]
    fn series_metrics_match_generated_geometry() {
        let candles = [candle(0, 1.0, 2.0, 0.5, 1.5), candle(1, 1.5, 2.5, 1.0, 2.0)];
        let palette = SeriesPalette::default();
        assert_eq!(series_metrics(&candles), generate_candlestick_geometry(&candles, &palette).metrics);
        assert_eq!(series_metrics(&candles), generate_line_geometry(&candles, &palette).metrics);
        assert_eq!(series_metrics(&[]), None);
    }

    #[test]
    fn polyline_breaks_at_gaps() {
        let metrics = metrics_for(4, &PriceScale { min: 0.0, max: 10.0 });
        let (positions, colors) = indicator_polyline(&[None, Some(1.0), Some(2.0), Some(3.0)], &metrics, Color::WHITE);
        assert_eq!(positions.len(), 4);
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn area_fades_to_bottom() {
        let candles = [candle(0, 1.0, 2.0, 0.5, 1.5), candle(1, 1.5, 2.5, 1.0, 2.0)];
        let area = generate_area_geometry(&candles, &SeriesPalette::default());
        assert_eq!(area.fill_positions.len(), 4);
        assert_eq!(area.fill_colors[0][3], 0.25);
        assert_eq!(area.fill_colors[1][3], 0.0);
        assert_eq!(area.fill_positions[1][1], -1.0);
    }
}
