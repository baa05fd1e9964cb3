//! `wasm_bindgen` surface of the chart.
//!
//! [`ChartHost`] owns one mounted chart: composition, DOM input, realtime
//! feed and the animation-frame loop. [`ChartApi`] exposes it to JavaScript
//! and the leptos view in `app.rs` drives it directly.

use crate::application::composition::{ChartComposition, ChartEvent, HudModel};
use crate::application::input::CanvasInput;
use crate::application::realtime::{RealtimeDataManager, Subscription, bind_chart};
use crate::application::scheduler::{AnimationFrameScheduler, FrameId, FrameScheduler, PerformanceClock};
use crate::config::{DEFAULT_CONFIG, EngineConfig};
use crate::domain::chart::{ChartType, DrawingMode, DrawingShape, ViewStatePatch};
use crate::domain::errors::{ChartError, ChartResult, InitializationError, ValidationError};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{Candle, IndicatorSpec, MarketDataParser};
use crate::infrastructure::rendering::{GraphicsBackend, WgpuBackend};
use crate::infrastructure::storage::LocalStorageDrawingStore;
use crate::presentation::canvas_surface::CanvasSurface;
use crate::{log_info, log_warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

type SharedComposition = Rc<RefCell<ChartComposition>>;

/// Host-side event observer.
pub type EventObserver = Rc<dyn Fn(&ChartEvent)>;

fn js_to_json(value: &JsValue) -> ChartResult<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text = js_sys::JSON::stringify(value)
        .map_err(|e| ValidationError::Message(format!("not serialisable: {e:?}")))?;
    let text: String = text.into();
    serde_json::from_str(&text).map_err(|e| ValidationError::Message(e.to_string()).into())
}

fn json_to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> ChartResult<T> {
    serde_json::from_value(js_to_json(value)?).map_err(|e| ValidationError::Message(e.to_string()).into())
}

/// Host candle records; invalid entries are dropped.
fn parse_candles(value: &JsValue) -> ChartResult<Vec<Candle>> {
    let Value::Array(records) = js_to_json(value)? else {
        return Err(ValidationError::Candle("expected an array of candles".into()).into());
    };
    let total = records.len();
    let candles: Vec<Candle> = records.iter().filter_map(MarketDataParser::parse_host_candle).collect();
    if candles.len() < total {
        log_warn!(LogComponent::Presentation("ChartApi"), "dropped {} invalid candles", total - candles.len());
    }
    Ok(candles)
}

/// JavaScript callback registered for an event name, with its payload.
fn callback_payload(event: &ChartEvent) -> Option<(&'static str, Result<JsValue, JsValue>)> {
    let payload = match event {
        ChartEvent::ViewChanged { view } => ("viewChange", json_to_js(view)),
        ChartEvent::PointerHover { crosshair } => ("pointerHover", json_to_js(crosshair)),
        ChartEvent::PointerLeave => ("pointerLeave", Ok(JsValue::UNDEFINED)),
        ChartEvent::PointerClick { .. } => ("pointerClick", json_to_js(event)),
        ChartEvent::RegionStart { point } => ("regionStart", json_to_js(point)),
        ChartEvent::RegionUpdate { point } => ("regionUpdate", json_to_js(point)),
        ChartEvent::RegionEnd { .. } => ("regionEnd", json_to_js(event)),
        ChartEvent::CandleSelected { selection } => ("candleSelect", json_to_js(selection)),
        ChartEvent::RegionSelected { metrics } => ("regionSelect", json_to_js(metrics)),
        ChartEvent::StatusChanged { status } => ("statusChange", json_to_js(status)),
        ChartEvent::DrawingsChanged { .. } | ChartEvent::ModeChanged { .. } => return None,
    };
    Some(payload)
}

/// One mounted chart.
pub struct ChartHost {
    composition: SharedComposition,
    scheduler: Rc<AnimationFrameScheduler>,
    surface: RefCell<Option<CanvasSurface<ChartComposition>>>,
    realtime: RefCell<Option<(RealtimeDataManager, Vec<Subscription>)>>,
    callbacks: RefCell<HashMap<&'static str, js_sys::Function>>,
    observers: RefCell<Vec<EventObserver>>,
    frame: Cell<Option<FrameId>>,
    destroyed: Cell<bool>,
}

impl ChartHost {
    /// Acquire the GPU for `canvas`, restore persisted drawings, bind input and
    /// start the frame loop and, when configured, the realtime feed.
    pub async fn mount(canvas: HtmlCanvasElement, config: EngineConfig) -> ChartResult<Rc<Self>> {
        let window = web_sys::window().ok_or(InitializationError::NoWindow)?;
        let dpr = window.device_pixel_ratio().max(1.0);
        let css_width = f64::from(canvas.client_width().max(1));
        let css_height = f64::from(canvas.client_height().max(1));

        let backend = WgpuBackend::new(canvas.clone(), css_width, css_height, dpr).await?;
        let backend: Box<dyn GraphicsBackend> = Box::new(backend);
        let realtime_config = config.realtime.clone();

        let mut composition =
            ChartComposition::new(backend, config, Rc::new(LocalStorageDrawingStore), Rc::new(PerformanceClock));
        composition.resize(css_width, css_height, dpr);
        let composition = Rc::new(RefCell::new(composition));

        let scheduler = Rc::new(AnimationFrameScheduler::new());
        let input_scheduler: Rc<dyn FrameScheduler> = scheduler.clone();
        let input = Rc::new(CanvasInput::new(Rc::clone(&composition), input_scheduler));
        let surface = CanvasSurface::attach(&canvas, input);

        let host = Rc::new(Self {
            composition,
            scheduler,
            surface: RefCell::new(Some(surface)),
            realtime: RefCell::new(None),
            callbacks: RefCell::new(HashMap::new()),
            observers: RefCell::new(Vec::new()),
            frame: Cell::new(None),
            destroyed: Cell::new(false),
        });

        let has_source = realtime_config.websocket_url.is_some() || realtime_config.polling_url.is_some();
        if !realtime_config.symbol.is_empty() && has_source {
            host.connect_realtime(RealtimeDataManager::new(realtime_config));
        }

        Self::schedule_frame(&host);
        log_info!(LogComponent::Presentation("ChartHost"), "chart mounted at {}x{} @{}x", css_width, css_height, dpr);
        Ok(host)
    }

    fn connect_realtime(&self, manager: RealtimeDataManager) {
        let subscriptions = bind_chart(&manager, &self.composition);
        manager.start();
        *self.realtime.borrow_mut() = Some((manager, subscriptions));
    }

    /// Host-supplied history becomes the base the feed appends to.
    fn seed_realtime(&self, candles: Vec<Candle>) {
        let manager = self.realtime.borrow().as_ref().map(|(manager, _)| manager.clone());
        if let Some(manager) = manager {
            manager.set_initial_data(candles);
        }
    }

    fn schedule_frame(host: &Rc<Self>) {
        if host.destroyed.get() {
            return;
        }
        let weak = Rc::downgrade(host);
        let id = host.scheduler.request(Box::new(move || {
            if let Some(host) = weak.upgrade() {
                host.tick();
                Self::schedule_frame(&host);
            }
        }));
        host.frame.set(Some(id));
    }

    /// Render if pending, then deliver events with every borrow released so
    /// callbacks may call back into the chart.
    fn tick(&self) {
        let events = match self.composition.try_borrow_mut() {
            Ok(mut composition) => {
                composition.render();
                composition.take_events()
            }
            Err(_) => return,
        };
        for event in &events {
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: &ChartEvent) {
        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer(event);
        }

        let Some((name, payload)) = callback_payload(event) else {
            return;
        };
        let Some(callback) = self.callbacks.borrow().get(name).cloned() else {
            return;
        };
        let result = payload.and_then(|payload| callback.call1(&JsValue::NULL, &payload));
        if let Err(e) = result {
            log_warn!(LogComponent::Presentation("ChartHost"), "{} callback failed: {:?}", name, e);
        }
    }

    pub fn composition(&self) -> &SharedComposition {
        &self.composition
    }

    pub fn hud(&self) -> HudModel {
        self.composition.borrow().hud()
    }

    pub fn observe(&self, observer: EventObserver) {
        self.observers.borrow_mut().push(observer);
    }

    fn set_callback(&self, name: &'static str, callback: js_sys::Function) {
        self.callbacks.borrow_mut().insert(name, callback);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Abort network tasks, remove listeners, cancel frames and release GPU
    /// resources. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if let Some((manager, subscriptions)) = self.realtime.borrow_mut().take() {
            for subscription in subscriptions {
                subscription.unsubscribe();
            }
            manager.stop();
        }
        if let Some(mut surface) = self.surface.borrow_mut().take() {
            surface.detach();
        }
        if let Some(id) = self.frame.take() {
            self.scheduler.cancel(id);
        }
        self.callbacks.borrow_mut().clear();
        self.observers.borrow_mut().clear();
        if let Ok(mut composition) = self.composition.try_borrow_mut() {
            composition.destroy();
        }
        get_logger().info(LogComponent::Presentation("ChartHost"), "chart destroyed");
    }
}

/// JavaScript handle to a mounted chart.
#[wasm_bindgen]
pub struct ChartApi {
    host: Rc<ChartHost>,
}

#[wasm_bindgen]
impl ChartApi {
    /// Mount on `canvas`. `config` is an optional partial engine configuration.
    pub async fn create(canvas: HtmlCanvasElement, config: JsValue) -> Result<ChartApi, JsValue> {
        let config = match js_to_json(&config)? {
            Value::Null => DEFAULT_CONFIG.clone(),
            value => EngineConfig::from_json(&value.to_string())?,
        };
        let host = ChartHost::mount(canvas, config).await?;
        Ok(Self { host })
    }

    fn with<R>(&self, f: impl FnOnce(&mut ChartComposition) -> R) -> Result<R, JsValue> {
        if self.host.is_destroyed() {
            return Err(JsValue::from_str("chart destroyed"));
        }
        let mut composition = self
            .host
            .composition
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("chart is busy"))?;
        Ok(f(&mut composition))
    }

    #[wasm_bindgen(js_name = renderCandlestick)]
    pub fn render_candlestick(&self, candles: JsValue) -> Result<(), JsValue> {
        self.render_series(ChartType::Candlestick, &candles)
    }

    #[wasm_bindgen(js_name = renderLine)]
    pub fn render_line(&self, candles: JsValue) -> Result<(), JsValue> {
        self.render_series(ChartType::Line, &candles)
    }

    #[wasm_bindgen(js_name = renderArea)]
    pub fn render_area(&self, candles: JsValue) -> Result<(), JsValue> {
        self.render_series(ChartType::Area, &candles)
    }

    fn render_series(&self, chart_type: ChartType, candles: &JsValue) -> Result<(), JsValue> {
        let candles = parse_candles(candles)?;
        self.with(|c| {
            c.set_chart_type(chart_type);
            c.set_candles(candles.clone());
        })?;
        self.host.seed_realtime(candles);
        Ok(())
    }

    pub fn resize(&self, css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Result<(), JsValue> {
        self.with(|c| c.resize(css_width, css_height, device_pixel_ratio))
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, patch: JsValue) -> Result<(), JsValue> {
        let patch = js_to_json(&patch)?;
        self.with(|c| c.update_config(&patch))??;
        Ok(())
    }

    #[wasm_bindgen(js_name = panPixels)]
    pub fn pan_pixels(&self, dx: f64) -> Result<bool, JsValue> {
        self.with(|c| c.pan_pixels(dx))
    }

    #[wasm_bindgen(js_name = zoomAtPixel)]
    pub fn zoom_at_pixel(&self, pixel_x: f64, delta_y: f64) -> Result<bool, JsValue> {
        self.with(|c| c.zoom_at_pixel(pixel_x, delta_y))
    }

    #[wasm_bindgen(js_name = zoomToRange)]
    pub fn zoom_to_range(&self, left: f64, right: f64) -> Result<bool, JsValue> {
        self.with(|c| c.zoom_to_range(left, right))
    }

    #[wasm_bindgen(js_name = centerOnCandle)]
    pub fn center_on_candle(&self, candle_x: f64, visible: f64, total: f64) -> Result<bool, JsValue> {
        self.with(|c| c.center_on_candle(candle_x, visible, total))
    }

    #[wasm_bindgen(js_name = updateViewState)]
    pub fn update_view_state(&self, patch: JsValue) -> Result<bool, JsValue> {
        let patch: ViewStatePatch = from_js(&patch)?;
        self.with(|c| c.update_view_state(patch))
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&self) -> Result<bool, JsValue> {
        self.with(|c| c.reset_view())
    }

    #[wasm_bindgen(js_name = undoView)]
    pub fn undo_view(&self) -> Result<bool, JsValue> {
        self.with(|c| c.undo_view())
    }

    #[wasm_bindgen(js_name = canUndoView)]
    pub fn can_undo_view(&self) -> Result<bool, JsValue> {
        self.with(|c| c.renderer().can_undo_view())
    }

    #[wasm_bindgen(js_name = getViewState)]
    pub fn get_view_state(&self) -> Result<JsValue, JsValue> {
        json_to_js(&self.with(|c| c.renderer().view_state())?)
    }

    #[wasm_bindgen(js_name = getVisibleRange)]
    pub fn get_visible_range(&self) -> Result<JsValue, JsValue> {
        json_to_js(&self.with(|c| c.renderer().visible_range())?)
    }

    #[wasm_bindgen(js_name = setDrawingShapes)]
    pub fn set_drawing_shapes(&self, shapes: JsValue) -> Result<(), JsValue> {
        let shapes: Vec<DrawingShape> = from_js(&shapes)?;
        self.with(|c| c.set_drawings(shapes))
    }

    #[wasm_bindgen(js_name = setDrawingMode)]
    pub fn set_drawing_mode(&self, mode: &str) -> Result<(), JsValue> {
        let mode = DrawingMode::from_str(mode)
            .map_err(|_| ChartError::from(ValidationError::Message(format!("unknown drawing mode {mode:?}"))))?;
        self.with(|c| c.set_drawing_mode(mode))
    }

    #[wasm_bindgen(js_name = clearDrawings)]
    pub fn clear_drawings(&self) -> Result<(), JsValue> {
        self.with(|c| c.clear_drawings())
    }

    #[wasm_bindgen(js_name = setIndicators)]
    pub fn set_indicators(&self, indicators: JsValue) -> Result<(), JsValue> {
        let indicators: Vec<IndicatorSpec> = from_js(&indicators)?;
        self.with(|c| c.set_indicators(indicators))
    }

    #[wasm_bindgen(js_name = enablePerformanceMonitoring)]
    pub fn enable_performance_monitoring(&self, enabled: bool) -> Result<(), JsValue> {
        self.with(|c| c.renderer_mut().enable_performance_monitoring(enabled))
    }

    #[wasm_bindgen(js_name = getPerformanceStats)]
    pub fn get_performance_stats(&self) -> Result<JsValue, JsValue> {
        json_to_js(&self.with(|c| c.renderer().performance_stats())?)
    }

    #[wasm_bindgen(js_name = resetPerformanceStats)]
    pub fn reset_performance_stats(&self) -> Result<(), JsValue> {
        self.with(|c| c.renderer_mut().reset_performance_stats())
    }

    #[wasm_bindgen(js_name = getHud)]
    pub fn get_hud(&self) -> Result<JsValue, JsValue> {
        json_to_js(&self.with(|c| c.hud())?)
    }

    #[wasm_bindgen(js_name = onViewChange)]
    pub fn on_view_change(&self, callback: js_sys::Function) {
        self.host.set_callback("viewChange", callback);
    }

    #[wasm_bindgen(js_name = onPointerHover)]
    pub fn on_pointer_hover(&self, callback: js_sys::Function) {
        self.host.set_callback("pointerHover", callback);
    }

    #[wasm_bindgen(js_name = onPointerLeave)]
    pub fn on_pointer_leave(&self, callback: js_sys::Function) {
        self.host.set_callback("pointerLeave", callback);
    }

    #[wasm_bindgen(js_name = onPointerClick)]
    pub fn on_pointer_click(&self, callback: js_sys::Function) {
        self.host.set_callback("pointerClick", callback);
    }

    #[wasm_bindgen(js_name = onRegionStart)]
    pub fn on_region_start(&self, callback: js_sys::Function) {
        self.host.set_callback("regionStart", callback);
    }

    #[wasm_bindgen(js_name = onRegionUpdate)]
    pub fn on_region_update(&self, callback: js_sys::Function) {
        self.host.set_callback("regionUpdate", callback);
    }

    #[wasm_bindgen(js_name = onRegionEnd)]
    pub fn on_region_end(&self, callback: js_sys::Function) {
        self.host.set_callback("regionEnd", callback);
    }

    #[wasm_bindgen(js_name = onCandleSelect)]
    pub fn on_candle_select(&self, callback: js_sys::Function) {
        self.host.set_callback("candleSelect", callback);
    }

    #[wasm_bindgen(js_name = onRegionSelect)]
    pub fn on_region_select(&self, callback: js_sys::Function) {
        self.host.set_callback("regionSelect", callback);
    }

    #[wasm_bindgen(js_name = onStatusChange)]
    pub fn on_status_change(&self, callback: js_sys::Function) {
        self.host.set_callback("statusChange", callback);
    }

    pub fn destroy(&self) {
        self.host.destroy();
    }
}
