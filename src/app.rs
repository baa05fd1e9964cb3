use leptos::html::Canvas;
use leptos::*;
use std::rc::{Rc, Weak};
use strum::IntoEnumIterator;

use crate::application::composition::{AxisLabel, HudModel};
use crate::config::EngineConfig;
use crate::domain::chart::{CandleSelection, DrawingMode, RegionMetrics};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::Candle;
use crate::presentation::wasm_api::ChartHost;
use crate::time_utils::{format_hud_time, format_price};

const STYLE: &str = r#"
.chart-app { font-family: -apple-system, BlinkMacSystemFont, sans-serif; background: #1a1a1a; color: #ffffff; min-height: 100vh; padding: 16px; }
.chart-toolbar { display: flex; gap: 8px; align-items: center; margin-bottom: 8px; }
.chart-btn { background: #333333; color: #ffffff; border: none; padding: 4px 10px; border-radius: 4px; cursor: pointer; font-size: 12px; }
.chart-btn.active { background: #00aaff; }
.chart-btn:disabled { opacity: 0.4; cursor: default; }
.chart-status { margin-left: auto; font-size: 12px; }
.chart-wrapper { position: relative; width: 100%; height: 520px; }
.chart-canvas { width: 100%; height: 100%; display: block; cursor: crosshair; }
.axis-label { position: absolute; font-size: 11px; font-family: monospace; color: #aaaaaa; pointer-events: none; }
.axis-price { right: 4px; transform: translateY(-50%); }
.axis-time { bottom: 2px; transform: translateX(-50%); }
.chart-tooltip { position: absolute; top: 8px; left: 8px; background: rgba(0, 0, 0, 0.8); padding: 6px 10px; border-radius: 6px; font-family: monospace; font-size: 12px; white-space: pre-line; pointer-events: none; }
.chart-panels { display: flex; gap: 16px; margin-top: 8px; font-size: 12px; font-family: monospace; }
.chart-panel { background: rgba(255, 255, 255, 0.05); border-radius: 6px; padding: 8px; min-width: 200px; }
.chart-error { color: #ff4444; }
"#;

fn candle_summary(candle: &Candle) -> String {
    format!(
        "{}\nO {}  H {}\nL {}  C {}\nV {:.4}",
        format_hud_time(candle.timestamp.value()),
        format_price(candle.ohlcv.open.value(), 2),
        format_price(candle.ohlcv.high.value(), 2),
        format_price(candle.ohlcv.low.value(), 2),
        format_price(candle.ohlcv.close.value(), 2),
        candle.ohlcv.volume.value(),
    )
}

fn region_summary(metrics: &RegionMetrics) -> String {
    format!(
        "{} candles\n{} -> {}\n{} -> {} (range {})",
        metrics.candle_count,
        format_hud_time(metrics.time_start),
        format_hud_time(metrics.time_end),
        format_price(metrics.price_start, 2),
        format_price(metrics.price_end, 2),
        format_price(metrics.price_range, 2),
    )
}

/// Page shell with the chart.
#[component]
pub fn App(config: EngineConfig) -> impl IntoView {
    view! {
        <style>{STYLE}</style>
        <div class="chart-app">
            <ChartView config=config />
        </div>
    }
}

/// Mounts a [`ChartHost`] on its canvas and mirrors the HUD model into signals.
#[component]
pub fn ChartView(config: EngineConfig) -> impl IntoView {
    let canvas_ref = create_node_ref::<Canvas>();
    let hud = create_rw_signal::<Option<HudModel>>(None);
    let error = create_rw_signal::<Option<String>>(None);
    let host = store_value::<Option<Rc<ChartHost>>>(None);

    create_effect(move |mounted: Option<bool>| {
        if mounted == Some(true) {
            return true;
        }
        let Some(canvas) = canvas_ref.get() else {
            return false;
        };
        let canvas: web_sys::HtmlCanvasElement = (*canvas).clone();
        let config = config.clone();
        spawn_local(async move {
            match ChartHost::mount(canvas, config).await {
                Ok(mounted) => {
                    let weak: Weak<ChartHost> = Rc::downgrade(&mounted);
                    mounted.observe(Rc::new(move |_event| {
                        if let Some(host) = weak.upgrade() {
                            hud.set(Some(host.hud()));
                        }
                    }));
                    hud.set(Some(mounted.hud()));
                    host.set_value(Some(mounted));
                }
                Err(e) => {
                    get_logger().error(LogComponent::Presentation("ChartView"), &format!("chart failed to start: {e}"));
                    error.set(Some(e.to_string()));
                }
            }
        });
        true
    });

    on_cleanup(move || {
        if let Some(mounted) = host.get_value() {
            mounted.destroy();
        }
    });

    let with_chart = move |f: &dyn Fn(&ChartHost)| {
        host.with_value(|mounted| {
            if let Some(mounted) = mounted {
                f(mounted);
                hud.set(Some(mounted.hud()));
            }
        });
    };

    let mode_buttons = DrawingMode::iter()
        .map(|mode| {
            let label = match mode {
                DrawingMode::None => "Pan",
                DrawingMode::Trendline => "Trend",
                DrawingMode::Horizontal => "Level",
                DrawingMode::Rectangle => "Box",
            };
            view! {
                <button
                    class="chart-btn"
                    class:active=move || hud.with(|h| h.as_ref().is_some_and(|h| h.mode == mode))
                    on:click=move |_| with_chart(&|mounted| mounted.composition().borrow_mut().set_drawing_mode(mode))
                >
                    {label}
                </button>
            }
        })
        .collect_view();

    view! {
        <div class="chart-toolbar">
            {mode_buttons}
            <button
                class="chart-btn"
                disabled=move || !hud.with(|h| h.as_ref().is_some_and(|h| h.can_undo))
                on:click=move |_| with_chart(&|mounted| {
                    mounted.composition().borrow_mut().undo_view();
                })
            >
                "Undo"
            </button>
            <button
                class="chart-btn"
                on:click=move |_| with_chart(&|mounted| {
                    mounted.composition().borrow_mut().reset_view();
                })
            >
                "Reset"
            </button>
            <button
                class="chart-btn"
                on:click=move |_| with_chart(&|mounted| mounted.composition().borrow_mut().clear_drawings())
            >
                "Clear drawings"
            </button>
            <span class="chart-status">
                {move || hud.with(|h| h.as_ref().map(|h| h.status.to_string()).unwrap_or_default())}
            </span>
        </div>
        <div class="chart-wrapper">
            <canvas class="chart-canvas" node_ref=canvas_ref />
            <AxisLabels hud=hud />
            <Tooltip hud=hud />
        </div>
        {move || error.get().map(|e| view! { <div class="chart-error">{e}</div> })}
        <HudPanels hud=hud />
    }
}

fn clip_to_percent(position: f64) -> f64 {
    (position + 1.0) * 50.0
}

#[component]
fn AxisLabels(hud: RwSignal<Option<HudModel>>) -> impl IntoView {
    let labels = move |pick: fn(&HudModel) -> &Vec<AxisLabel>| {
        hud.with(|h| h.as_ref().map(|h| pick(h).clone()).unwrap_or_default())
    };
    view! {
        {move || labels(|h| &h.price_labels)
            .into_iter()
            .map(|label| {
                let top = format!("{:.2}%", 100.0 - clip_to_percent(label.position));
                view! { <div class="axis-label axis-price" style:top=top>{label.text}</div> }
            })
            .collect_view()}
        {move || labels(|h| &h.time_labels)
            .into_iter()
            .map(|label| {
                let left = format!("{:.2}%", clip_to_percent(label.position));
                view! { <div class="axis-label axis-time" style:left=left>{label.text}</div> }
            })
            .collect_view()}
    }
}

#[component]
fn Tooltip(hud: RwSignal<Option<HudModel>>) -> impl IntoView {
    let text = move || {
        hud.with(|h| {
            let crosshair = h.as_ref()?.crosshair.as_ref()?;
            let mut text = format!("{}  {}", crosshair.time_label, crosshair.price_label);
            if let Some(candle) = &crosshair.candle {
                text.push('\n');
                text.push_str(&candle_summary(candle));
            }
            Some(text)
        })
    };
    view! {
        <Show when=move || text().is_some()>
            <div class="chart-tooltip">{move || text().unwrap_or_default()}</div>
        </Show>
    }
}

#[component]
fn HudPanels(hud: RwSignal<Option<HudModel>>) -> impl IntoView {
    let selection = move || hud.with(|h| h.as_ref().and_then(|h| h.selection));
    let recent = move || hud.with(|h| h.as_ref().map(|h| h.recent_selections.clone()).unwrap_or_default());
    let region = move || hud.with(|h| h.as_ref().and_then(|h| h.region.clone()));
    let performance = move || hud.with(|h| h.as_ref().and_then(|h| h.performance));

    view! {
        <div class="chart-panels">
            <div class="chart-panel">
                <div>"Selection"</div>
                {move || match selection() {
                    Some(CandleSelection { candle, index }) => format!("#{index}\n{}", candle_summary(&candle)),
                    None => "none".to_string(),
                }}
                <div>
                    {move || recent()
                        .into_iter()
                        .map(|s| view! { <div>{format_hud_time(s.candle.timestamp.value())}</div> })
                        .collect_view()}
                </div>
            </div>
            <div class="chart-panel">
                <div>"Region"</div>
                {move || region().map(|m| region_summary(&m)).unwrap_or_else(|| "none".to_string())}
            </div>
            <div class="chart-panel">
                <div>"Frames"</div>
                {move || performance()
                    .map(|p| format!("{:.0} fps (avg {:.0}, min {:.0})", p.current.fps, p.average.fps, p.min.fps))
                    .unwrap_or_else(|| "monitoring off".to_string())}
            </div>
        </div>
    }
}
