use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Series representation drawn by the renderer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, EnumString, AsRefStr, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    #[display(fmt = "Candlestick")]
    #[strum(serialize = "candlestick")]
    Candlestick,
    #[display(fmt = "Line")]
    #[strum(serialize = "line")]
    Line,
    #[display(fmt = "Area")]
    #[strum(serialize = "area")]
    Area,
}

/// Horizontal data-to-clip transform: `clip_x = scale_x * original_x + translate_x`.
///
/// The vertical fields are carried through history and the host API but the
/// candle geometry is always fitted to the full price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, translate_x: 0.0, translate_y: 0.0 }
    }
}

impl ViewState {
    pub fn apply_x(&self, original_x: f64) -> f64 {
        self.scale_x * original_x + self.translate_x
    }

    pub fn invert_x(&self, clip_x: f64) -> f64 {
        let scale = if self.scale_x == 0.0 { 1.0 } else { self.scale_x };
        (clip_x - self.translate_x) / scale
    }

    /// All four fields within `epsilon` of each other.
    pub fn is_similar(&self, other: &ViewState, epsilon: f64) -> bool {
        (self.scale_x - other.scale_x).abs() < epsilon
            && (self.scale_y - other.scale_y).abs() < epsilon
            && (self.translate_x - other.translate_x).abs() < epsilon
            && (self.translate_y - other.translate_y).abs() < epsilon
    }

    pub fn max_delta(&self, other: &ViewState) -> f64 {
        (self.scale_x - other.scale_x)
            .abs()
            .max((self.scale_y - other.scale_y).abs())
            .max((self.translate_x - other.translate_x).abs())
            .max((self.translate_y - other.translate_y).abs())
    }

    pub fn merge(&self, patch: &ViewStatePatch) -> ViewState {
        ViewState {
            scale_x: patch.scale_x.unwrap_or(self.scale_x),
            scale_y: patch.scale_y.unwrap_or(self.scale_y),
            translate_x: patch.translate_x.unwrap_or(self.translate_x),
            translate_y: patch.translate_y.unwrap_or(self.translate_y),
        }
    }
}

/// Partial view update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatePatch {
    #[serde(default)]
    pub scale_x: Option<f64>,
    #[serde(default)]
    pub scale_y: Option<f64>,
    #[serde(default)]
    pub translate_x: Option<f64>,
    #[serde(default)]
    pub translate_y: Option<f64>,
}

impl ViewStatePatch {
    pub fn horizontal(scale_x: f64, translate_x: f64) -> Self {
        Self { scale_x: Some(scale_x), translate_x: Some(translate_x), ..Default::default() }
    }
}

impl From<ViewState> for ViewStatePatch {
    fn from(v: ViewState) -> Self {
        Self {
            scale_x: Some(v.scale_x),
            scale_y: Some(v.scale_y),
            translate_x: Some(v.translate_x),
            translate_y: Some(v.translate_y),
        }
    }
}

/// Allowed horizontal zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl ScaleBounds {
    /// Non-finite input collapses to the minimum.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if !scale.is_finite() {
            return self.min;
        }
        scale.clamp(self.min, self.max)
    }

    /// Keep `[-1, 1]` covered: `|t| <= max(0, scale - 1)`.
    pub fn clamp_translate(&self, scale: f64, translate: f64) -> f64 {
        let max_translate = (scale - 1.0).max(0.0);
        if translate.is_nan() {
            return 0.0;
        }
        translate.clamp(-max_translate, max_translate)
    }
}

/// Slice of the data currently intersecting the clip window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleRange {
    pub time_start: u64,
    pub time_end: u64,
    pub price_min: f64,
    pub price_max: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub candle_count: usize,
}

/// Layout numbers produced by the candlestick geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleMetrics {
    pub half_width: f64,
    pub candle_spacing: f64,
    pub gap: f64,
    pub price_min: f64,
    pub price_max: f64,
    pub price_range: f64,
}

/// RGBA in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self::rgb(r, g, b)
    }

    /// Parse `#rrggbb` or `#rgb`. Anything else is white.
    pub fn from_hex_str(value: &str) -> Self {
        let hex = value.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Self::WHITE,
        };
        u32::from_str_radix(&expanded, 16).map(Self::from_hex).unwrap_or(Self::WHITE)
    }

    pub fn with_alpha(&self, alpha: f32) -> Self {
        Self { a: alpha, ..*self }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        let c = Color::from_hex_str("#00ff88");
        assert_eq!(c.r, 0.0);
        assert_eq!(c.g, 1.0);
        assert_eq!(Color::from_hex_str("#fff"), Color::WHITE);
        assert_eq!(Color::from_hex_str("nope"), Color::WHITE);
    }

    #[test]
    fn nan_scale_clamps_to_min() {
        let bounds = ScaleBounds::default();
        assert_eq!(bounds.clamp_scale(f64::NAN), 1.0);
        assert_eq!(bounds.clamp_scale(f64::INFINITY), 1.0);
        assert_eq!(bounds.clamp_translate(1.0, 0.3), 0.0);
    }
}
