//! Chart composition: hover, selection, region zoom, drawing sessions,
//! auto-centring and persistence around one [`ChartRenderer`].

use super::input::InputTarget;
use super::renderer::ChartRenderer;
use super::scheduler::Clock;
use crate::config::EngineConfig;
use crate::domain::chart::{
    CandleMetrics, CandleSelection, ChartType, DrawingClick, DrawingIdGenerator, DrawingMode, DrawingPoint,
    DrawingSession, DrawingShape, RegionGestureEnd, RegionMetrics, RegionPoint, RegionSelection, SelectionHistory,
    ViewState, ViewStatePatch, sanitize_stored_shape, services,
};
use crate::domain::errors::{ChartResult, StorageError};
use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::market_data::{Candle, ConnectionStatus, IndicatorSpec};
use crate::infrastructure::rendering::{GraphicsBackend, PerformanceStats};
use crate::infrastructure::storage::DrawingStore;
use crate::time_utils::{format_hud_time, format_price, format_time_label, price_decimals};
use crate::{log_debug, log_warn};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::str::FromStr;

const AXIS_LABELS: usize = 5;

/// Cursor position resolved against the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Crosshair {
    pub point: RegionPoint,
    /// Candle whose body is under the cursor.
    pub candle: Option<Candle>,
    pub price_label: String,
    pub time_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisLabel {
    /// Clip-space coordinate along the axis.
    pub position: f64,
    pub text: String,
}

/// Everything the HUD overlay displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudModel {
    pub crosshair: Option<Crosshair>,
    pub selection: Option<CandleSelection>,
    pub recent_selections: Vec<CandleSelection>,
    pub region: Option<RegionMetrics>,
    pub price_labels: Vec<AxisLabel>,
    pub time_labels: Vec<AxisLabel>,
    pub performance: Option<PerformanceStats>,
    pub status: ConnectionStatus,
    pub mode: DrawingMode,
    pub custom_zoom: bool,
    pub can_undo: bool,
}

/// Notification for the host, drained with [`ChartComposition::take_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChartEvent {
    ViewChanged { view: ViewState },
    PointerHover { crosshair: Option<Crosshair> },
    PointerLeave,
    PointerClick { x: f64, y: f64 },
    RegionStart { point: RegionPoint },
    RegionUpdate { point: RegionPoint },
    RegionEnd { start: Option<RegionPoint>, end: Option<RegionPoint>, cancelled: bool },
    CandleSelected { selection: Option<CandleSelection> },
    RegionSelected { metrics: Option<RegionMetrics> },
    DrawingsChanged { shapes: Vec<DrawingShape> },
    ModeChanged { mode: DrawingMode },
    StatusChanged { status: ConnectionStatus },
}

pub struct ChartComposition<B: GraphicsBackend = Box<dyn GraphicsBackend>> {
    renderer: ChartRenderer<B>,
    config: EngineConfig,
    store: Rc<dyn DrawingStore>,

    css_size: (f64, f64),
    candles: Vec<Candle>,

    drawings: Vec<DrawingShape>,
    session: DrawingSession,
    ids: DrawingIdGenerator,

    selection: Option<CandleSelection>,
    selection_history: SelectionHistory,
    region: RegionSelection,
    region_metrics: Option<RegionMetrics>,
    crosshair: Option<Crosshair>,

    custom_zoom: bool,
    has_centered: bool,
    last_timestamp: Option<u64>,
    last_view: ViewState,
    status: ConnectionStatus,

    events: Vec<ChartEvent>,
}

impl<B: GraphicsBackend> ChartComposition<B> {
    /// Build around `backend`, restoring persisted drawings and drawing mode.
    pub fn new(backend: B, config: EngineConfig, store: Rc<dyn DrawingStore>, clock: Rc<dyn Clock>) -> Self {
        let renderer = ChartRenderer::new(backend, &config, clock);
        let last_view = renderer.view_state();
        let mut composition = Self {
            renderer,
            selection_history: SelectionHistory::new(config.composition.selection_history),
            config,
            store,
            css_size: (0.0, 0.0),
            candles: Vec::new(),
            drawings: Vec::new(),
            session: DrawingSession::default(),
            ids: DrawingIdGenerator::default(),
            selection: None,
            region: RegionSelection::Idle,
            region_metrics: None,
            crosshair: None,
            custom_zoom: false,
            has_centered: false,
            last_timestamp: None,
            last_view,
            status: ConnectionStatus::default(),
            events: Vec::new(),
        };
        composition.restore();
        composition
    }

    pub fn renderer(&self) -> &ChartRenderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut ChartRenderer<B> {
        &mut self.renderer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Merge a partial JSON configuration into the running chart.
    pub fn update_config(&mut self, patch: &Value) -> ChartResult<()> {
        self.config = self.renderer.update_config_json(&self.config, patch)?;
        self.sync_view(false);
        Ok(())
    }

    pub fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        self.css_size = (css_width, css_height);
        self.renderer.resize(css_width, css_height, device_pixel_ratio);
    }

    pub fn css_size(&self) -> (f64, f64) {
        self.css_size
    }

    pub fn take_events(&mut self) -> Vec<ChartEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run a frame if one is pending.
    pub fn render(&mut self) -> bool {
        self.renderer.render()
    }

    // ---- data ---------------------------------------------------------

    /// Replace the series, keep the selection on its candle and auto-centre
    /// when new data arrives and the user has not zoomed.
    pub fn set_candles(&mut self, candles: Vec<Candle>) {
        let last_timestamp = candles.last().map(|c| c.timestamp.value());
        self.candles = candles.clone();
        self.renderer.render_series(self.renderer.chart_type(), candles);

        if let Some(selection) = self.selection {
            let reconciled = selection.reconcile(&self.candles);
            if reconciled != self.selection {
                self.selection = reconciled;
                self.events.push(ChartEvent::CandleSelected { selection: reconciled });
            }
        }

        let advanced = last_timestamp.is_some() && last_timestamp != self.last_timestamp;
        if !self.candles.is_empty() && (!self.has_centered || (advanced && !self.custom_zoom)) {
            self.auto_center();
        }
        self.last_timestamp = last_timestamp;
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        if chart_type != self.renderer.chart_type() {
            self.renderer.render_series(chart_type, self.candles.clone());
        }
    }

    pub fn set_indicators(&mut self, indicators: Vec<IndicatorSpec>) {
        self.renderer.set_indicators(indicators);
    }

    fn auto_center(&mut self) {
        let bounds = self.renderer.scale_bounds();
        let target = self.config.composition.target_visible_candles;
        match services::auto_center_plan(self.candles.len(), target, &bounds) {
            Some(services::AutoCenter::Direct(patch)) => {
                self.renderer.update_view_state(patch);
            }
            Some(services::AutoCenter::CenterOn { candle_x, visible, total }) => {
                self.renderer.center_on_candle(candle_x, visible, total);
            }
            None => return,
        }
        self.has_centered = true;
        log_debug!(LogComponent::Application("Composition"), "auto-centred on {} candles", self.candles.len());
        self.sync_view(false);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.events.push(ChartEvent::StatusChanged { status });
        }
    }

    // ---- viewport -------------------------------------------------------

    pub fn custom_zoom(&self) -> bool {
        self.custom_zoom
    }

    /// Emit a view change when the view moved. A manual move of more than
    /// the threshold after the first centring suspends auto-centre.
    fn sync_view(&mut self, manual: bool) {
        let view = self.renderer.view_state();
        if view == self.last_view {
            return;
        }
        if manual && self.has_centered && view.max_delta(&self.last_view) > self.config.composition.custom_zoom_threshold {
            self.custom_zoom = true;
        }
        self.last_view = view;
        self.events.push(ChartEvent::ViewChanged { view });
    }

    pub fn pan_pixels(&mut self, dx: f64) -> bool {
        let changed = self.renderer.pan_pixels(dx, self.css_size.0);
        self.sync_view(true);
        changed
    }

    pub fn zoom_at_pixel(&mut self, pixel_x: f64, dy: f64) -> bool {
        let changed = self.renderer.zoom_at_pixel(pixel_x, self.css_size.0, dy);
        self.sync_view(true);
        changed
    }

    pub fn zoom_to_range(&mut self, left: f64, right: f64) -> bool {
        let changed = self.renderer.zoom_to_range(left, right);
        self.sync_view(true);
        changed
    }

    pub fn center_on_candle(&mut self, candle_x: f64, visible: f64, total: f64) -> bool {
        let changed = self.renderer.center_on_candle(candle_x, visible, total);
        self.sync_view(true);
        changed
    }

    pub fn update_view_state(&mut self, patch: ViewStatePatch) -> bool {
        let changed = self.renderer.update_view_state(patch);
        self.sync_view(true);
        changed
    }

    /// Back to the identity view; auto-centre resumes with the next candle.
    pub fn reset_view(&mut self) -> bool {
        let changed = self.renderer.reset_view();
        self.custom_zoom = false;
        self.sync_view(false);
        changed
    }

    pub fn undo_view(&mut self) -> bool {
        if !self.renderer.undo_view() {
            return false;
        }
        self.custom_zoom = true;
        self.sync_view(false);
        true
    }

    // ---- pointer resolution ---------------------------------------------

    fn resolve_point(&self, x: f64, y: f64) -> Option<RegionPoint> {
        let (width, height) = self.css_size;
        let metrics = self.renderer.metrics()?;
        if self.candles.is_empty() || width <= 0.0 || height <= 0.0 || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let view = self.renderer.view_state();
        let clip_x = services::pixel_to_clip_x(x, width);
        let clip_y = services::pixel_to_clip_y(y, height);
        let original_x = services::clip_to_original_x(clip_x, &view);
        let index = services::nearest_index(original_x, self.candles.len());
        Some(RegionPoint {
            pixel_x: x,
            pixel_y: y,
            clip_x,
            clip_y,
            original_x,
            index,
            price: services::price_at_clip_y(clip_y, metrics.price_min, metrics.price_max),
            time: self.candles[index].timestamp.value(),
        })
    }

    fn hit_test(&self, point: &RegionPoint, metrics: &CandleMetrics) -> Option<usize> {
        services::hit_test_candle(point.original_x, metrics, self.candles.len())
    }

    // ---- drawings -------------------------------------------------------

    pub fn drawings(&self) -> &[DrawingShape] {
        &self.drawings
    }

    pub fn drawing_mode(&self) -> DrawingMode {
        self.session.mode()
    }

    pub fn drawing_session(&self) -> &DrawingSession {
        &self.session
    }

    pub fn set_drawing_mode(&mut self, mode: DrawingMode) {
        if self.session.set_mode(mode) {
            self.persist_mode();
            self.events.push(ChartEvent::ModeChanged { mode });
            self.sync_shapes();
        }
    }

    /// Replace the committed shapes, e.g. from the host.
    pub fn set_drawings(&mut self, shapes: Vec<DrawingShape>) {
        self.drawings = shapes.into_iter().filter(|s| !s.is_preview()).collect();
        self.drawings_changed();
    }

    pub fn clear_drawings(&mut self) {
        self.drawings.clear();
        self.drawings_changed();
    }

    fn drawings_changed(&mut self) {
        self.persist_drawings();
        self.events.push(ChartEvent::DrawingsChanged { shapes: self.drawings.clone() });
        self.sync_shapes();
    }

    /// Committed shapes plus the preview go to the renderer.
    fn sync_shapes(&mut self) {
        let mut shapes = self.drawings.clone();
        if let Some(preview) = self.session.preview() {
            shapes.push(preview.clone());
        }
        self.renderer.set_drawing_shapes(shapes);
    }

    fn restore(&mut self) {
        let keys = self.config.composition.storage_keys.clone();
        if let Some(raw) = self.store.load(&keys.drawings) {
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => {
                    let now = get_time_provider().current_timestamp();
                    let total = items.len();
                    self.drawings =
                        items.iter().filter_map(|item| sanitize_stored_shape(item, &mut self.ids, now)).collect();
                    if self.drawings.len() < total {
                        log_warn!(
                            LogComponent::Application("Composition"),
                            "dropped {} invalid stored drawings",
                            total - self.drawings.len()
                        );
                    }
                }
                _ => {
                    log_warn!(LogComponent::Application("Composition"), "stored drawings are not a list, ignoring");
                }
            }
        }
        if let Some(raw) = self.store.load(&keys.drawing_mode) {
            match DrawingMode::from_str(raw.trim().trim_matches('"')) {
                Ok(mode) => {
                    self.session.set_mode(mode);
                }
                Err(_) => log_warn!(LogComponent::Application("Composition"), "unknown drawing mode {:?}", raw),
            }
        }
        self.sync_shapes();
    }

    fn persist_drawings(&self) {
        let key = &self.config.composition.storage_keys.drawings;
        if self.drawings.is_empty() {
            self.store.remove(key);
            return;
        }
        let result: ChartResult<()> = match serde_json::to_string(&self.drawings) {
            Ok(json) => self.store.save(key, &json),
            Err(e) => Err(StorageError::Serialize(e.to_string()).into()),
        };
        if let Err(e) = result {
            get_logger().warn(LogComponent::Application("Composition"), &format!("drawings not saved: {e}"));
        }
    }

    fn persist_mode(&self) {
        let key = &self.config.composition.storage_keys.drawing_mode;
        if let Err(e) = self.store.save(key, self.session.mode().as_ref()) {
            get_logger().warn(LogComponent::Application("Composition"), &format!("drawing mode not saved: {e}"));
        }
    }

    // ---- selection ------------------------------------------------------

    pub fn selection(&self) -> Option<CandleSelection> {
        self.selection
    }

    pub fn selection_history(&self) -> &SelectionHistory {
        &self.selection_history
    }

    pub fn region(&self) -> RegionSelection {
        self.region
    }

    pub fn region_metrics(&self) -> Option<&RegionMetrics> {
        self.region_metrics.as_ref()
    }

    pub fn crosshair(&self) -> Option<&Crosshair> {
        self.crosshair.as_ref()
    }

    fn select(&mut self, index: usize) {
        let selection = if self.selection.is_some_and(|s| s.index == index) {
            None
        } else {
            let selection = CandleSelection { candle: self.candles[index], index };
            self.selection_history.push(selection);
            Some(selection)
        };
        self.selection = selection;
        self.events.push(ChartEvent::CandleSelected { selection });
    }

    // ---- HUD ------------------------------------------------------------

    pub fn hud(&self) -> HudModel {
        HudModel {
            crosshair: self.crosshair.clone(),
            selection: self.selection,
            recent_selections: self.selection_history.items().copied().collect(),
            region: self.region_metrics.clone(),
            price_labels: self.price_labels(),
            time_labels: self.time_labels(),
            performance: self.renderer.performance_stats(),
            status: self.status,
            mode: self.session.mode(),
            custom_zoom: self.custom_zoom,
            can_undo: self.renderer.can_undo_view(),
        }
    }

    /// Evenly spaced price ticks over the fitted price scale. Precision
    /// follows the visible price range.
    fn price_labels(&self) -> Vec<AxisLabel> {
        let (Some(metrics), Some(range)) = (self.renderer.metrics(), self.renderer.visible_range()) else {
            return Vec::new();
        };
        let decimals = price_decimals(range.price_max - range.price_min);
        (0..AXIS_LABELS)
            .map(|i| {
                let position = -1.0 + 2.0 * i as f64 / (AXIS_LABELS - 1) as f64;
                let price = services::price_at_clip_y(position, metrics.price_min, metrics.price_max);
                AxisLabel { position, text: format_price(price, decimals) }
            })
            .collect()
    }

    fn time_labels(&self) -> Vec<AxisLabel> {
        let Some(range) = self.renderer.visible_range() else {
            return Vec::new();
        };
        let view = self.renderer.view_state();
        let count = self.candles.len();
        let span = range.end_index - range.start_index;
        let steps = AXIS_LABELS.min(span + 1);
        let mut labels: Vec<AxisLabel> = Vec::with_capacity(steps);
        for step in 0..steps {
            let index = if steps == 1 { range.start_index } else { range.start_index + span * step / (steps - 1) };
            let position = view.apply_x(services::candle_center_x(index, count));
            let text = format_time_label(self.candles[index].timestamp.value(), view.scale_x);
            if labels.last().is_some_and(|l| l.text == text) {
                continue;
            }
            labels.push(AxisLabel { position, text });
        }
        labels
    }

    /// Tear down renderer state. Persisted drawings are left in place.
    pub fn destroy(&mut self) {
        self.renderer.destroy();
        self.candles.clear();
        self.crosshair = None;
        self.region.reset();
        self.events.clear();
    }
}

impl<B: GraphicsBackend> InputTarget for ChartComposition<B> {
    fn accept_region(&mut self, x: f64, y: f64) -> bool {
        if self.session.mode() != DrawingMode::None {
            return false;
        }
        let Some(point) = self.resolve_point(x, y) else {
            return false;
        };
        self.region.start(point);
        self.events.push(ChartEvent::RegionStart { point });
        true
    }

    fn region_update(&mut self, x: f64, y: f64) {
        let Some(point) = self.resolve_point(x, y) else {
            return;
        };
        if self.region.is_active() {
            self.region.update(point);
            self.events.push(ChartEvent::RegionUpdate { point });
        }
    }

    fn region_end(&mut self, gesture: RegionGestureEnd) {
        let start = self.resolve_point(gesture.start_x, gesture.start_y);
        let end = self.resolve_point(gesture.end_x, gesture.end_y);
        self.events.push(ChartEvent::RegionEnd { start, end, cancelled: gesture.cancelled });

        self.region.finish(&gesture, start, end, self.config.input.region_min_delta_px);
        let metrics = match self.region {
            RegionSelection::Completed { start, end }
                if (end.original_x - start.original_x).abs() >= self.config.composition.min_region_span =>
            {
                self.renderer.zoom_to_range(start.original_x, end.original_x);
                self.custom_zoom = true;
                self.sync_view(false);
                RegionMetrics::from_points(&start, &end, &self.candles)
            }
            _ => {
                self.region.reset();
                None
            }
        };
        // an idle outcome only notifies when it clears an earlier selection
        if metrics.is_some() || self.region_metrics.is_some() {
            self.events.push(ChartEvent::RegionSelected { metrics: metrics.clone() });
        }
        self.region_metrics = metrics;
    }

    fn pan(&mut self, dx: f64) {
        self.pan_pixels(dx);
    }

    fn zoom(&mut self, pixel_x: f64, dy: f64) {
        self.zoom_at_pixel(pixel_x, dy);
    }

    fn hover(&mut self, x: f64, y: f64, is_dragging: bool) {
        if is_dragging {
            self.crosshair = None;
            self.session.hover_suspended();
            self.sync_shapes();
            self.events.push(ChartEvent::PointerHover { crosshair: None });
            return;
        }

        let point = self.resolve_point(x, y);
        self.session.hover(point.map(|p| DrawingPoint::new(p.original_x, p.price)));
        self.sync_shapes();

        self.crosshair = match (point, self.renderer.metrics()) {
            (Some(point), Some(metrics)) => {
                let decimals = self.renderer.visible_range().map_or(2, |r| price_decimals(r.price_max - r.price_min));
                Some(Crosshair {
                    point,
                    candle: self.hit_test(&point, &metrics).map(|i| self.candles[i]),
                    price_label: format_price(point.price, decimals),
                    time_label: format_hud_time(point.time),
                })
            }
            _ => None,
        };
        self.events.push(ChartEvent::PointerHover { crosshair: self.crosshair.clone() });
    }

    fn leave(&mut self) {
        self.crosshair = None;
        self.session.leave();
        self.sync_shapes();
        self.events.push(ChartEvent::PointerLeave);
    }

    fn click(&mut self, x: f64, y: f64) {
        self.events.push(ChartEvent::PointerClick { x, y });
        let Some(point) = self.resolve_point(x, y) else {
            return;
        };

        if self.session.mode() != DrawingMode::None {
            let now = get_time_provider().current_timestamp();
            let ids = &mut self.ids;
            match self.session.click(DrawingPoint::new(point.original_x, point.price), || ids.next_id(now)) {
                DrawingClick::Committed(shape) => {
                    self.drawings.push(shape);
                    self.drawings_changed();
                    return;
                }
                DrawingClick::Started => {
                    self.sync_shapes();
                    return;
                }
                DrawingClick::Ignored => {}
            }
        }

        if let Some(metrics) = self.renderer.metrics()
            && let Some(index) = self.hit_test(&point, &metrics)
        {
            self.select(index);
        }
    }

    fn escape(&mut self) {
        if let Some(mode) = self.session.escape() {
            self.persist_mode();
            self.events.push(ChartEvent::ModeChanged { mode });
        }
        self.sync_shapes();
    }

    fn undo(&mut self) {
        self.undo_view();
    }

    fn reset(&mut self) {
        self.reset_view();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::ManualClock;
    use crate::infrastructure::rendering::RecordingBackend;
    use crate::infrastructure::storage::MemoryDrawingStore;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::from_values(60_000 * i as u64, base, base + 2.0, base - 2.0, base + 1.0, 10.0)
            })
            .collect()
    }

    fn composition(store: Rc<MemoryDrawingStore>) -> ChartComposition<RecordingBackend> {
        let clock = Rc::new(ManualClock::new(0.0));
        let mut chart = ChartComposition::new(RecordingBackend::new(), EngineConfig::default(), store, clock);
        chart.resize(800.0, 400.0, 1.0);
        chart
    }

    #[test]
    fn first_data_centres_on_last_candle() {
        let mut chart = composition(Rc::new(MemoryDrawingStore::new()));
        chart.set_candles(candles(300));
        let view = chart.renderer().view_state();
        assert!(view.scale_x > 1.0);
        assert!(!chart.custom_zoom());
        assert!(matches!(chart.take_events().last(), Some(ChartEvent::ViewChanged { .. })));
    }

    #[test]
    fn manual_pan_suspends_auto_centre() {
        let mut chart = composition(Rc::new(MemoryDrawingStore::new()));
        chart.set_candles(candles(300));
        chart.pan_pixels(-40.0);
        assert!(chart.custom_zoom());
        let view = chart.renderer().view_state();
        chart.set_candles(candles(301));
        assert_eq!(chart.renderer().view_state(), view);
        chart.reset_view();
        assert!(!chart.custom_zoom());
    }

    #[test]
    fn horizontal_drawing_commits_and_persists() {
        let store = Rc::new(MemoryDrawingStore::new());
        let mut chart = composition(store.clone());
        chart.set_candles(candles(10));
        chart.render();
        chart.set_drawing_mode(DrawingMode::Horizontal);
        chart.click(400.0, 200.0);
        assert_eq!(chart.drawings().len(), 1);
        assert!(store.load("webgl_chart_drawings").is_some());
        assert_eq!(store.load("webgl_chart_drawing_mode").as_deref(), Some("horizontal"));

        let restored = composition(store);
        assert_eq!(restored.drawings().len(), 1);
        assert_eq!(restored.drawing_mode(), DrawingMode::Horizontal);
    }

    #[test]
    fn clearing_drawings_removes_key() {
        let store = Rc::new(MemoryDrawingStore::new());
        let mut chart = composition(store.clone());
        chart.set_drawings(vec![DrawingShape::new("a", crate::domain::chart::ShapeKind::Horizontal { price: 1.0 })]);
        assert!(store.load("webgl_chart_drawings").is_some());
        chart.clear_drawings();
        assert!(store.load("webgl_chart_drawings").is_none());
    }

    #[test]
    fn clicking_selected_candle_clears_selection() {
        let mut chart = composition(Rc::new(MemoryDrawingStore::new()));
        chart.set_candles(candles(3));
        chart.reset_view();
        chart.render();
        // centre of the middle candle
        chart.click(400.0, 200.0);
        assert_eq!(chart.selection().map(|s| s.index), Some(1));
        chart.click(400.0, 200.0);
        assert_eq!(chart.selection(), None);
        assert_eq!(chart.selection_history().len(), 1);
    }
}
