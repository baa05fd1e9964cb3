//! Engine configuration. Every field has a default so host JSON may be partial.

use crate::domain::chart::{Color, ScaleBounds};
use crate::domain::errors::{ChartResult, ValidationError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartColors {
    pub background: String,
    pub grid: String,
    pub text: String,
    pub bullish: String,
    pub bearish: String,
    pub line: String,
    pub area: String,
}

impl Default for ChartColors {
    fn default() -> Self {
        Self {
            background: "#1a1a1a".into(),
            grid: "#333333".into(),
            text: "#ffffff".into(),
            bullish: "#00ff88".into(),
            bearish: "#ff4444".into(),
            line: "#00aaff".into(),
            area: "#00aaff".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self { top: 20.0, right: 20.0, bottom: 40.0, left: 60.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartStyle {
    pub colors: ChartColors,
    pub padding: Padding,
    pub clear_color: [f64; 4],
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self { colors: ChartColors::default(), padding: Padding::default(), clear_color: [0.1, 0.1, 0.1, 1.0] }
    }
}

/// Resolved colors for the geometry generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPalette {
    pub bullish: Color,
    pub bearish: Color,
    pub line: Color,
    pub area: Color,
}

impl ChartStyle {
    pub fn palette(&self) -> SeriesPalette {
        SeriesPalette {
            bullish: Color::from_hex_str(&self.colors.bullish),
            bearish: Color::from_hex_str(&self.colors.bearish),
            line: Color::from_hex_str(&self.colors.line),
            area: Color::from_hex_str(&self.colors.area),
        }
    }
}

impl Default for SeriesPalette {
    fn default() -> Self {
        ChartStyle::default().palette()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportLimits {
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self { min_scale: 1.0, max_scale: 5.0 }
    }
}

impl ViewportLimits {
    pub fn bounds(&self) -> ScaleBounds {
        ScaleBounds { min: self.min_scale, max: self.max_scale }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub debounce_ms: f64,
    pub similarity_epsilon: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 50, debounce_ms: 120.0, similarity_epsilon: 0.0005 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineStyleConfig {
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RectangleStyleConfig {
    pub border_color: String,
    pub border_width: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
}

impl Default for RectangleStyleConfig {
    fn default() -> Self {
        Self { border_color: "#F472B6".into(), border_width: 1.5, fill_color: "#F472B6".into(), fill_opacity: 0.12 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DrawingStyles {
    pub trendline: LineStyleConfig,
    pub horizontal: LineStyleConfig,
    pub rectangle: RectangleStyleConfig,
    pub draft_alpha: f64,
}

impl Default for LineStyleConfig {
    fn default() -> Self {
        Self { color: "#FBBF24".into(), width: 2.0 }
    }
}

impl Default for DrawingStyles {
    fn default() -> Self {
        Self {
            trendline: LineStyleConfig::default(),
            horizontal: LineStyleConfig { color: "#38BDF8".into(), width: 2.0 },
            rectangle: RectangleStyleConfig::default(),
            draft_alpha: 0.45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputConfig {
    pub region_min_delta_px: f64,
    pub zoom_sensitivity: f64,
    pub max_zoom_step: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { region_min_delta_px: 6.0, zoom_sensitivity: 0.0015, max_zoom_step: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageKeys {
    pub drawings: String,
    pub drawing_mode: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self { drawings: "webgl_chart_drawings".into(), drawing_mode: "webgl_chart_drawing_mode".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompositionConfig {
    pub target_visible_candles: usize,
    pub selection_history: usize,
    pub custom_zoom_threshold: f64,
    pub min_region_span: f64,
    pub storage_keys: StorageKeys,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            target_visible_candles: 100,
            selection_history: 6,
            custom_zoom_threshold: 0.001,
            min_region_span: 0.001,
            storage_keys: StorageKeys::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    pub max_reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 1_000,
            max_reconnect_attempts: 10,
            max_reconnect_delay_ms: 30_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealtimeConfig {
    pub symbol: String,
    pub websocket_url: Option<String>,
    pub polling_url: Option<String>,
    pub polling_interval_ms: u64,
    pub polling_max_attempts: u32,
    pub polling_retry_delay_ms: u64,
    pub enable_websocket: bool,
    pub enable_polling: bool,
    pub max_candles: usize,
    pub tick_interval_ms: u64,
    pub stream: StreamConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            websocket_url: None,
            polling_url: None,
            polling_interval_ms: 5_000,
            polling_max_attempts: 3,
            polling_retry_delay_ms: 5_000,
            enable_websocket: true,
            enable_polling: true,
            max_candles: 10_000,
            tick_interval_ms: 60_000,
            stream: StreamConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub chart: ChartStyle,
    pub viewport: ViewportLimits,
    pub history: HistoryConfig,
    pub drawings: DrawingStyles,
    pub input: InputConfig,
    pub composition: CompositionConfig,
    pub realtime: RealtimeConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> ChartResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ValidationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a partial JSON patch on top of this configuration. Nested objects
    /// merge key by key; anything else replaces.
    pub fn merged(&self, patch: &Value) -> ChartResult<Self> {
        let mut base = serde_json::to_value(self).map_err(|e| ValidationError::Config(e.to_string()))?;
        merge_json(&mut base, patch);
        let config: EngineConfig =
            serde_json::from_value(base).map_err(|e| ValidationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChartResult<()> {
        let v = &self.viewport;
        if !(v.min_scale > 0.0 && v.min_scale <= v.max_scale && v.max_scale.is_finite()) {
            return Err(ValidationError::Config(format!(
                "scale bounds must satisfy 0 < min <= max, got {}..{}",
                v.min_scale, v.max_scale
            ))
            .into());
        }
        if self.history.max_entries == 0 {
            return Err(ValidationError::Config("history needs at least one entry".into()).into());
        }
        Ok(())
    }
}

fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_json(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"history": {"debounceMs": 200}}"#).unwrap();
        assert_eq!(config.history.debounce_ms, 200.0);
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.realtime.polling_interval_ms, 5_000);
    }

    #[test]
    fn patches_merge_nested_sections() {
        let base = EngineConfig::default();
        let patched = base.merged(&serde_json::json!({"chart": {"colors": {"bullish": "#112233"}}})).unwrap();
        assert_eq!(patched.chart.colors.bullish, "#112233");
        assert_eq!(patched.chart.colors.bearish, base.chart.colors.bearish);
        assert!(base.merged(&serde_json::json!({"viewport": {"minScale": 0}})).is_err());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let err = EngineConfig::from_json(r#"{"viewport": {"minScale": 4, "maxScale": 2}}"#).unwrap_err();
        assert!(err.to_string().starts_with("Validation Error"));
    }
}
