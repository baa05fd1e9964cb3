use super::backend::RenderPass;
use crate::config::DrawingStyles;
use crate::domain::chart::{CandleMetrics, Color, DrawingShape, ShapeKind, ViewState};

pub const RECT_FILL_KEY: &str = "drawings::rectFill";
pub const RECT_BORDER_KEY: &str = "drawings::rectBorder";
pub const TRENDLINE_KEY: &str = "drawings::trendline";
pub const HORIZONTAL_KEY: &str = "drawings::horizontal";

/// Vertices of one annotation layer, already in clip space.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingBucket {
    pub key: &'static str,
    pub pass: RenderPass,
    pub positions: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Option<Vec<u32>>,
}

impl DrawingBucket {
    fn new(key: &'static str, pass: RenderPass, indexed: bool) -> Self {
        Self { key, pass, positions: Vec::new(), colors: Vec::new(), indices: indexed.then(Vec::new) }
    }
}

/// Clamped price mapping; non-finite prices sit on the bottom edge.
pub fn price_to_clip_y(price: f64, price_min: f64, price_range: f64) -> f32 {
    if !price.is_finite() {
        return -1.0;
    }
    let range = if price_range == 0.0 || !price_range.is_finite() { 1.0 } else { price_range };
    let normalized = ((price - price_min) / range).clamp(0.0, 1.0);
    (-1.0 + normalized * 2.0) as f32
}

fn rgba(hex: &str, alpha_multiplier: f64) -> [f32; 4] {
    let color = Color::from_hex_str(hex);
    color.with_alpha((color.a * alpha_multiplier as f32).clamp(0.0, 1.0)).to_array()
}

/// Build the annotation layers in draw order: rectangle fill, rectangle
/// border, trendlines, horizontals. Empty layers are omitted.
pub fn build_drawing_geometry(
    shapes: &[DrawingShape],
    view: &ViewState,
    metrics: &CandleMetrics,
    styles: &DrawingStyles,
) -> Vec<DrawingBucket> {
    let apply_x = |x: f64| view.apply_x(x) as f32;
    let to_clip_y = |price: f64| price_to_clip_y(price, metrics.price_min, metrics.price_range);

    let mut fill = DrawingBucket::new(RECT_FILL_KEY, RenderPass::Area, true);
    let mut border = DrawingBucket::new(RECT_BORDER_KEY, RenderPass::Wick, false);
    let mut trendlines = DrawingBucket::new(TRENDLINE_KEY, RenderPass::Wick, false);
    let mut horizontals = DrawingBucket::new(HORIZONTAL_KEY, RenderPass::Wick, false);

    for shape in shapes {
        let draft = if shape.is_draft { styles.draft_alpha } else { 1.0 };
        let style = &shape.style;
        match &shape.kind {
            ShapeKind::Trendline { start, end } => {
                let color = rgba(style.color.as_deref().unwrap_or(&styles.trendline.color), draft);
                trendlines.positions.extend([
                    [apply_x(start.original_x), to_clip_y(start.price)],
                    [apply_x(end.original_x), to_clip_y(end.price)],
                ]);
                trendlines.colors.extend([color; 2]);
            }
            ShapeKind::Horizontal { price } => {
                let color = rgba(style.color.as_deref().unwrap_or(&styles.horizontal.color), draft);
                let y = to_clip_y(*price);
                horizontals.positions.extend([[apply_x(-1.0), y], [apply_x(1.0), y]]);
                horizontals.colors.extend([color; 2]);
            }
            ShapeKind::Rectangle { start, end } => {
                let (sx, ex) = (apply_x(start.original_x), apply_x(end.original_x));
                let (sy, ey) = (to_clip_y(start.price), to_clip_y(end.price));
                let (x0, x1, y0, y1) = (sx.min(ex), sx.max(ex), sy.min(ey), sy.max(ey));

                let opacity = style.fill_opacity.unwrap_or(styles.rectangle.fill_opacity);
                let fill_color = rgba(style.fill_color.as_deref().unwrap_or(&styles.rectangle.fill_color), draft * opacity);
                let border_color =
                    rgba(style.border_color.as_deref().unwrap_or(&styles.rectangle.border_color), draft);

                let base = fill.positions.len() as u32;
                fill.positions.extend([[x0, y0], [x1, y0], [x1, y1], [x0, y1]]);
                fill.colors.extend([fill_color; 4]);
                if let Some(indices) = fill.indices.as_mut() {
                    indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
                }

                border.positions.extend([
                    [x0, y0],
                    [x1, y0],
                    [x1, y0],
                    [x1, y1],
                    [x1, y1],
                    [x0, y1],
                    [x0, y1],
                    [x0, y0],
                ]);
                border.colors.extend([border_color; 8]);
            }
        }
    }

    [fill, border, trendlines, horizontals].into_iter().filter(|b| !b.positions.is_empty()).collect()
}
