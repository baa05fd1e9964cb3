//! Chart renderer facade: viewport, history, series geometry and annotations
//! on top of a [`GraphicsBackend`].

use super::scheduler::Clock;
use crate::config::{ChartStyle, DrawingStyles, EngineConfig, InputConfig, SeriesPalette};
use crate::domain::chart::{
    CandleMetrics, ChartType, Color, DrawingShape, ScaleBounds, ViewHistory, ViewState, ViewStatePatch,
    VisibleRange, services,
};
use crate::domain::errors::{ChartResult, RenderingResult};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{Candle, IndicatorEngine, IndicatorSpec, closes};
use crate::infrastructure::rendering::drawings::build_drawing_geometry;
use crate::infrastructure::rendering::geometry::{
    generate_area_geometry, generate_candlestick_geometry, generate_line_geometry, indicator_polyline,
    series_metrics,
};
use crate::infrastructure::rendering::{
    GraphicsBackend, PerformanceMonitor, PerformanceStats, RenderPass, TransformUniform,
};
use crate::{log_debug, log_warn};
use serde_json::Value;
use std::rc::Rc;

pub const CANDLE_BODY_KEY: &str = "candlestick::body";
pub const CANDLE_WICK_KEY: &str = "candlestick::wick";
pub const LINE_KEY: &str = "line::series";
pub const AREA_KEY: &str = "area::series";

const SMA_COLOR: &str = "#F59E0B";
const EMA_COLOR: &str = "#A78BFA";
const BOLLINGER_COLOR: &str = "#94A3B8";

/// Uploaded series layer redrawn every frame with the view transform.
#[derive(Debug, Clone)]
struct SeriesLayer {
    key: String,
    pass: RenderPass,
}

pub struct ChartRenderer<B: GraphicsBackend = Box<dyn GraphicsBackend>> {
    backend: B,
    clock: Rc<dyn Clock>,
    style: ChartStyle,
    palette: SeriesPalette,
    drawing_styles: DrawingStyles,
    input: InputConfig,
    bounds: ScaleBounds,

    view: ViewState,
    history: ViewHistory,

    chart_type: ChartType,
    candles: Vec<Candle>,
    metrics: Option<CandleMetrics>,
    shapes: Vec<DrawingShape>,
    indicators: Vec<IndicatorSpec>,
    indicator_engine: IndicatorEngine,
    layers: Vec<SeriesLayer>,

    series_dirty: bool,
    render_pending: bool,
    performance: PerformanceMonitor,
    destroyed: bool,
}

impl<B: GraphicsBackend> ChartRenderer<B> {
    pub fn new(backend: B, config: &EngineConfig, clock: Rc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        let mut history =
            ViewHistory::new(config.history.max_entries, config.history.debounce_ms, config.history.similarity_epsilon);
        let view = ViewState::default();
        history.record(view, true);

        Self {
            backend,
            clock,
            style: config.chart.clone(),
            palette: config.chart.palette(),
            drawing_styles: config.drawings.clone(),
            input: config.input,
            bounds: config.viewport.bounds(),
            view,
            history,
            chart_type: ChartType::Candlestick,
            candles: Vec::new(),
            metrics: None,
            shapes: Vec::new(),
            indicators: Vec::new(),
            indicator_engine: IndicatorEngine::new(),
            layers: Vec::new(),
            series_dirty: true,
            render_pending: true,
            performance: PerformanceMonitor::new(false, now),
            destroyed: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        self.backend.resize(css_width, css_height, device_pixel_ratio);
        self.request_render();
    }

    pub fn request_render(&mut self) {
        if !self.destroyed {
            self.render_pending = true;
        }
    }

    pub fn is_render_pending(&self) -> bool {
        self.render_pending
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ---- data ---------------------------------------------------------

    fn set_series(&mut self, chart_type: ChartType, candles: Vec<Candle>) {
        self.chart_type = chart_type;
        self.candles = candles;
        self.metrics = series_metrics(&self.candles);
        self.series_dirty = true;
        self.request_render();
    }

    pub fn render_candlestick(&mut self, candles: Vec<Candle>) {
        self.set_series(ChartType::Candlestick, candles);
    }

    pub fn render_line(&mut self, candles: Vec<Candle>) {
        self.set_series(ChartType::Line, candles);
    }

    pub fn render_area(&mut self, candles: Vec<Candle>) {
        self.set_series(ChartType::Area, candles);
    }

    pub fn render_series(&mut self, chart_type: ChartType, candles: Vec<Candle>) {
        self.set_series(chart_type, candles);
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn metrics(&self) -> Option<CandleMetrics> {
        self.metrics
    }

    pub fn set_drawing_shapes(&mut self, shapes: Vec<DrawingShape>) {
        self.shapes = shapes;
        self.request_render();
    }

    pub fn drawing_shapes(&self) -> &[DrawingShape] {
        &self.shapes
    }

    /// Overlays are only drawn in candlestick mode.
    pub fn set_indicators(&mut self, indicators: Vec<IndicatorSpec>) {
        self.indicators = indicators;
        self.series_dirty = true;
        self.request_render();
    }

    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    /// Apply a partial configuration. Colors, drawing styles and scale bounds
    /// take effect on the next frame; the view is re-clamped to new bounds.
    pub fn update_config(&mut self, config: &EngineConfig) {
        self.style = config.chart.clone();
        self.palette = config.chart.palette();
        self.drawing_styles = config.drawings.clone();
        self.input = config.input;
        self.bounds = config.viewport.bounds();

        let scale = self.bounds.clamp_scale(self.view.scale_x);
        self.view.scale_x = scale;
        self.view.translate_x = self.bounds.clamp_translate(scale, self.view.translate_x);
        self.series_dirty = true;
        self.request_render();
    }

    pub fn update_config_json(&mut self, current: &EngineConfig, patch: &Value) -> ChartResult<EngineConfig> {
        let merged = current.merged(patch)?;
        self.update_config(&merged);
        Ok(merged)
    }

    // ---- viewport -------------------------------------------------------

    pub fn view_state(&self) -> ViewState {
        self.view
    }

    pub fn scale_bounds(&self) -> ScaleBounds {
        self.bounds
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        services::compute_visible_range(&self.candles, &self.view, self.metrics.as_ref())
    }

    fn apply_patch(&mut self, patch: &ViewStatePatch) -> bool {
        let next = self.view.merge(patch);
        if next == self.view {
            return false;
        }
        self.view = next;
        self.request_render();
        true
    }

    /// Merge `patch` as given, without clamping, and record it.
    pub fn update_view_state(&mut self, patch: ViewStatePatch) -> bool {
        let changed = self.apply_patch(&patch);
        self.history.record(self.view, false);
        changed
    }

    pub fn pan_pixels(&mut self, dx: f64, width: f64) -> bool {
        let Some(patch) = services::pan_view(&self.view, dx, width, &self.bounds) else {
            return false;
        };
        let changed = self.apply_patch(&patch);
        if changed {
            self.history.schedule(self.clock.now_ms());
        }
        changed
    }

    pub fn zoom_at_pixel(&mut self, pixel_x: f64, width: f64, dy: f64) -> bool {
        let input = self.input;
        let Some(patch) = services::zoom_view_at(
            &self.view,
            pixel_x,
            width,
            dy,
            input.zoom_sensitivity,
            input.max_zoom_step,
            &self.bounds,
        ) else {
            return false;
        };
        let changed = self.apply_patch(&patch);
        if changed {
            self.history.schedule(self.clock.now_ms());
        }
        changed
    }

    pub fn zoom_to_range(&mut self, left: f64, right: f64) -> bool {
        let Some(patch) = services::zoom_to_range_view(left, right, &self.bounds) else {
            return false;
        };
        let changed = self.apply_patch(&patch);
        self.history.record(self.view, false);
        changed
    }

    pub fn center_on_candle(&mut self, candle_x: f64, visible: f64, total: f64) -> bool {
        if !(total > 0.0) || !(visible > 0.0) || !candle_x.is_finite() {
            return false;
        }
        let patch = services::center_on_candle_view(candle_x, visible, total, &self.bounds);
        let changed = self.apply_patch(&patch);
        self.history.record(self.view, false);
        changed
    }

    pub fn reset_view(&mut self) -> bool {
        self.history.cancel_pending();
        let changed = self.apply_patch(&ViewState::default().into());
        self.history.record(self.view, true);
        changed
    }

    pub fn undo_view(&mut self) -> bool {
        let Some(previous) = self.history.begin_undo() else {
            return false;
        };
        self.view = previous;
        self.request_render();
        self.history.end_apply();
        log_debug!(LogComponent::Application("ChartRenderer"), "undo to {:?}", previous);
        true
    }

    pub fn can_undo_view(&self) -> bool {
        self.history.can_undo()
    }

    pub fn history(&self) -> &ViewHistory {
        &self.history
    }

    /// Record a debounced snapshot once it is due. Returns true when recorded.
    pub fn poll_history(&mut self) -> bool {
        self.history.poll(self.clock.now_ms(), self.view)
    }

    // ---- performance ----------------------------------------------------

    pub fn enable_performance_monitoring(&mut self, enabled: bool) {
        self.performance.set_enabled(enabled);
    }

    pub fn performance_stats(&self) -> Option<PerformanceStats> {
        self.performance.is_enabled().then(|| self.performance.stats())
    }

    pub fn reset_performance_stats(&mut self) {
        self.performance.reset();
    }

    // ---- frame ----------------------------------------------------------

    /// Run one frame if anything changed since the last one. Frame errors are
    /// logged and never propagated. Returns true when a frame was submitted.
    pub fn render(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.poll_history();
        if !self.render_pending {
            return false;
        }
        self.render_pending = false;

        self.performance.start_frame(self.clock.now_ms());
        self.backend.begin_frame(self.style.clear_color);
        if let Err(e) = self.draw_scene() {
            log_warn!(LogComponent::Application("ChartRenderer"), "frame skipped: {}", e);
        }
        let submitted = match self.backend.end_frame() {
            Ok(stats) => {
                self.performance.record_frame_stats(&stats);
                true
            }
            Err(e) => {
                get_logger().warn(LogComponent::Application("ChartRenderer"), &format!("frame failed: {e}"));
                false
            }
        };
        self.performance.end_frame(self.clock.now_ms());
        submitted
    }

    fn draw_scene(&mut self) -> RenderingResult<()> {
        if self.series_dirty {
            self.series_dirty = false;
            self.upload_series()?;
        }

        let transform = TransformUniform::from_view(&self.view);
        for layer in &self.layers {
            self.backend.draw(&layer.key, layer.pass, &transform);
        }

        if let Some(metrics) = self.metrics.as_ref()
            && !self.shapes.is_empty()
        {
            let identity = TransformUniform::identity();
            for bucket in build_drawing_geometry(&self.shapes, &self.view, metrics, &self.drawing_styles) {
                self.backend.upload(bucket.key, &bucket.positions, &bucket.colors, bucket.indices.as_deref())?;
                self.backend.draw(bucket.key, bucket.pass, &identity);
            }
        }
        Ok(())
    }

    fn upload_series(&mut self) -> RenderingResult<()> {
        self.layers.clear();
        self.metrics = None;
        if self.candles.is_empty() {
            return Ok(());
        }

        match self.chart_type {
            ChartType::Candlestick => {
                let geometry = generate_candlestick_geometry(&self.candles, &self.palette);
                self.backend.upload(
                    CANDLE_BODY_KEY,
                    &geometry.body_positions,
                    &geometry.body_colors,
                    Some(&geometry.body_indices),
                )?;
                self.backend.upload(CANDLE_WICK_KEY, &geometry.wick_positions, &geometry.wick_colors, None)?;
                self.layers.push(SeriesLayer { key: CANDLE_BODY_KEY.into(), pass: RenderPass::Candlestick });
                self.layers.push(SeriesLayer { key: CANDLE_WICK_KEY.into(), pass: RenderPass::Wick });
                self.metrics = geometry.metrics;
                self.upload_indicators()?;
            }
            ChartType::Line => {
                let geometry = generate_line_geometry(&self.candles, &self.palette);
                self.backend.upload(LINE_KEY, &geometry.positions, &geometry.colors, None)?;
                self.layers.push(SeriesLayer { key: LINE_KEY.into(), pass: RenderPass::Line });
                self.metrics = geometry.metrics;
            }
            ChartType::Area => {
                let geometry = generate_area_geometry(&self.candles, &self.palette);
                self.backend.upload(AREA_KEY, &geometry.fill_positions, &geometry.fill_colors, None)?;
                self.backend.upload(LINE_KEY, &geometry.outline.positions, &geometry.outline.colors, None)?;
                self.layers.push(SeriesLayer { key: AREA_KEY.into(), pass: RenderPass::GradientArea });
                self.layers.push(SeriesLayer { key: LINE_KEY.into(), pass: RenderPass::Line });
                self.metrics = geometry.outline.metrics;
            }
        }
        Ok(())
    }

    fn upload_indicators(&mut self) -> RenderingResult<()> {
        let Some(metrics) = self.metrics else {
            return Ok(());
        };
        if self.indicators.is_empty() {
            return Ok(());
        }
        let closes = closes(&self.candles);
        let now = self.clock.now_ms() as u64;

        for spec in self.indicators.clone() {
            let lines: Vec<(String, Vec<Option<f64>>)> = match &spec {
                IndicatorSpec::Sma { period, .. } => {
                    vec![(spec.key(), self.indicator_engine.sma(&closes, *period, now))]
                }
                IndicatorSpec::Ema { period, .. } => {
                    vec![(spec.key(), self.indicator_engine.ema(&closes, *period, now))]
                }
                IndicatorSpec::Bollinger { period, multiplier, .. } => {
                    let bands = self.indicator_engine.bollinger(&closes, *period, *multiplier, now);
                    let key = spec.key();
                    vec![
                        (format!("{key}::upper"), bands.upper),
                        (format!("{key}::middle"), bands.middle),
                        (format!("{key}::lower"), bands.lower),
                    ]
                }
            };
            let fallback = match spec {
                IndicatorSpec::Sma { .. } => SMA_COLOR,
                IndicatorSpec::Ema { .. } => EMA_COLOR,
                IndicatorSpec::Bollinger { .. } => BOLLINGER_COLOR,
            };
            let color = Color::from_hex_str(spec.color().unwrap_or(fallback));

            for (name, values) in lines {
                let (positions, colors) = indicator_polyline(&values, &metrics, color);
                let key = format!("indicator::{name}");
                self.backend.upload(&key, &positions, &colors, None)?;
                self.layers.push(SeriesLayer { key, pass: RenderPass::Wick });
            }
        }
        Ok(())
    }

    /// Release GPU resources and drop all state. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.backend.release();
        self.candles.clear();
        self.shapes.clear();
        self.layers.clear();
        self.metrics = None;
        self.history.clear();
        self.render_pending = false;
        self.destroyed = true;
        get_logger().info(LogComponent::Application("ChartRenderer"), "renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::ManualClock;
    use crate::infrastructure::rendering::RecordingBackend;

    fn renderer() -> (ChartRenderer<RecordingBackend>, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(0.0));
        let renderer = ChartRenderer::new(RecordingBackend::new(), &EngineConfig::default(), clock.clone());
        (renderer, clock)
    }

    #[test]
    fn idle_frames_do_nothing() {
        let (mut renderer, _) = renderer();
        assert!(renderer.render());
        assert!(!renderer.render());
        assert_eq!(renderer.backend().frames(), 1);
    }

    #[test]
    fn pan_snapshot_waits_for_debounce() {
        let (mut renderer, clock) = renderer();
        renderer.update_view_state(ViewStatePatch::horizontal(3.0, 0.0));
        assert!(renderer.pan_pixels(50.0, 500.0));
        assert_eq!(renderer.history().len(), 2);
        clock.advance(119.0);
        assert!(!renderer.poll_history());
        clock.advance(1.0);
        assert!(renderer.poll_history());
        assert_eq!(renderer.history().len(), 3);
    }

    #[test]
    fn monitoring_collects_and_resets() {
        let (mut renderer, clock) = renderer();
        assert!(renderer.performance_stats().is_none());
        renderer.enable_performance_monitoring(true);
        let candles = vec![Candle::from_values(60_000, 1.0, 2.0, 0.5, 1.5, 1.0)];
        for _ in 0..12 {
            clock.advance(100.0);
            renderer.render_candlestick(candles.clone());
            assert!(renderer.render());
        }
        let stats = renderer.performance_stats().unwrap();
        assert!(stats.samples >= 10);
        assert!(stats.average.draw_calls > 0.0);

        renderer.reset_performance_stats();
        assert_eq!(renderer.performance_stats().unwrap().samples, 0);
        renderer.enable_performance_monitoring(false);
        assert!(renderer.performance_stats().is_none());
    }

    #[test]
    fn metrics_follow_new_data_before_the_next_frame() {
        let (mut renderer, _) = renderer();
        let series = |n: u64| -> Vec<Candle> {
            (0..n).map(|i| Candle::from_values(60_000 * i, 10.0, 12.0, 9.0, 11.0, 1.0)).collect()
        };
        renderer.render_candlestick(series(10));
        assert!(renderer.render());
        assert!((renderer.metrics().unwrap().candle_spacing - 0.2).abs() < 1e-12);

        renderer.render_candlestick(series(20));
        assert!((renderer.metrics().unwrap().candle_spacing - 0.1).abs() < 1e-12);
        assert_eq!(renderer.visible_range().map(|r| r.end_index), Some(19));

        renderer.render_line(Vec::new());
        assert!(renderer.metrics().is_none());
    }

    #[test]
    fn destroy_releases_backend() {
        let (mut renderer, _) = renderer();
        renderer.render_candlestick(vec![Candle::from_values(1, 1.0, 2.0, 0.5, 1.5, 1.0)]);
        renderer.destroy();
        assert!(renderer.backend().is_released());
        assert!(!renderer.render());
        assert!(renderer.candles().is_empty());
    }
}
