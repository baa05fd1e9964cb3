use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, EnumIter, EnumString};

/// Id given to the in-progress shape mirrored into the renderer.
pub const PREVIEW_SHAPE_ID: &str = "__preview__";

/// Anchor of a drawing in data space: x in the original `[-1, 1]` range, y as a price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingPoint {
    pub original_x: f64,
    pub price: f64,
}

impl DrawingPoint {
    pub fn new(original_x: f64, price: f64) -> Self {
        Self { original_x, price }
    }

    pub fn is_finite(&self) -> bool {
        self.original_x.is_finite() && self.price.is_finite()
    }
}

/// Per-shape style overrides. Serialised flat next to the geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Trendline { start: DrawingPoint, end: DrawingPoint },
    Horizontal { price: f64 },
    Rectangle { start: DrawingPoint, end: DrawingPoint },
}

/// A user annotation as exchanged with the host and persisted to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingShape {
    pub id: String,
    #[serde(flatten)]
    pub kind: ShapeKind,
    #[serde(flatten)]
    pub style: DrawingStyle,
    #[serde(default, rename = "isDraft", skip_serializing_if = "std::ops::Not::not")]
    pub is_draft: bool,
}

impl DrawingShape {
    pub fn new(id: impl Into<String>, kind: ShapeKind) -> Self {
        Self { id: id.into(), kind, style: DrawingStyle::default(), is_draft: false }
    }

    pub fn preview(kind: ShapeKind) -> Self {
        Self { is_draft: true, ..Self::new(PREVIEW_SHAPE_ID, kind) }
    }

    pub fn is_preview(&self) -> bool {
        self.id == PREVIEW_SHAPE_ID
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DrawingMode {
    #[default]
    None,
    Trendline,
    Horizontal,
    Rectangle,
}

/// Produces unique shape ids of the form `drawing-{millis}-{counter}`.
#[derive(Debug, Default)]
pub struct DrawingIdGenerator {
    counter: u64,
}

impl DrawingIdGenerator {
    pub fn next_id(&mut self, now_ms: u64) -> String {
        self.counter += 1;
        format!("drawing-{}-{}", now_ms, self.counter)
    }
}

fn point_from(value: Option<&Value>) -> Option<DrawingPoint> {
    let value = value?;
    let point = DrawingPoint::new(value.get("originalX")?.as_f64()?, value.get("price")?.as_f64()?);
    point.is_finite().then_some(point)
}

/// Rebuild a stored shape, dropping it when any coordinate is missing or
/// non-finite. A missing id is regenerated. Style overrides and the draft flag
/// are not restored.
pub fn sanitize_stored_shape(raw: &Value, ids: &mut DrawingIdGenerator, now_ms: u64) -> Option<DrawingShape> {
    let obj = raw.as_object()?;
    let kind = match obj.get("type").and_then(Value::as_str)? {
        "trendline" => ShapeKind::Trendline { start: point_from(obj.get("start"))?, end: point_from(obj.get("end"))? },
        "rectangle" => ShapeKind::Rectangle { start: point_from(obj.get("start"))?, end: point_from(obj.get("end"))? },
        "horizontal" => {
            let price = obj.get("price")?.as_f64().filter(|p| p.is_finite())?;
            ShapeKind::Horizontal { price }
        }
        _ => return None,
    };
    let id = match obj.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => ids.next_id(now_ms),
    };
    Some(DrawingShape::new(id, kind))
}

/// Pending two-click gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingDrawing {
    pub mode: DrawingMode,
    pub start: DrawingPoint,
}

/// What a click in drawing mode produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingClick {
    /// First click of a two-point shape.
    Started,
    Committed(DrawingShape),
    /// Drawing mode is off; the click belongs to candle selection.
    Ignored,
}

/// Drawing-mode state: the active tool, the pending first point and the preview.
#[derive(Debug, Clone, Default)]
pub struct DrawingSession {
    mode: DrawingMode,
    pending: Option<PendingDrawing>,
    preview: Option<DrawingShape>,
}

impl DrawingSession {
    pub fn mode(&self) -> DrawingMode {
        self.mode
    }

    pub fn pending(&self) -> Option<&PendingDrawing> {
        self.pending.as_ref()
    }

    pub fn preview(&self) -> Option<&DrawingShape> {
        self.preview.as_ref()
    }

    /// Returns true when the mode changed. A change drops pending state.
    pub fn set_mode(&mut self, mode: DrawingMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        self.pending = None;
        self.preview = None;
        true
    }

    pub fn click(&mut self, point: DrawingPoint, id: impl FnOnce() -> String) -> DrawingClick {
        match self.mode {
            DrawingMode::None => DrawingClick::Ignored,
            DrawingMode::Horizontal => {
                DrawingClick::Committed(DrawingShape::new(id(), ShapeKind::Horizontal { price: point.price }))
            }
            mode @ (DrawingMode::Trendline | DrawingMode::Rectangle) => match self.pending.take() {
                None => {
                    self.pending = Some(PendingDrawing { mode, start: point });
                    self.preview = Some(DrawingShape::preview(two_point(mode, point, point)));
                    DrawingClick::Started
                }
                Some(pending) => {
                    self.preview = None;
                    DrawingClick::Committed(DrawingShape::new(id(), two_point(mode, pending.start, point)))
                }
            },
        }
    }

    /// Update the preview from the hovered data point. `None` means the cursor
    /// is not over a valid point.
    pub fn hover(&mut self, point: Option<DrawingPoint>) {
        let Some(point) = point else {
            if self.pending.is_none() && self.mode == DrawingMode::Horizontal {
                self.preview = None;
            }
            return;
        };
        match (self.mode, self.pending) {
            (DrawingMode::None, None) => self.preview = None,
            (DrawingMode::None, Some(_)) => {}
            (DrawingMode::Horizontal, _) => {
                self.preview = Some(DrawingShape::preview(ShapeKind::Horizontal { price: point.price }));
            }
            (mode, Some(pending)) if pending.mode == mode => {
                self.preview = Some(DrawingShape::preview(two_point(mode, pending.start, point)));
            }
            _ => self.preview = None,
        }
    }

    /// Hover stopped because a drag is in progress.
    pub fn hover_suspended(&mut self) {
        if self.pending.is_none() && self.mode == DrawingMode::Horizontal {
            self.preview = None;
        }
    }

    /// Cursor left the canvas: a pending preview collapses onto its start.
    pub fn leave(&mut self) {
        match self.pending {
            Some(pending) => {
                self.preview = Some(DrawingShape::preview(two_point(pending.mode, pending.start, pending.start)));
            }
            None if self.mode == DrawingMode::Horizontal => self.preview = None,
            None => {}
        }
    }

    /// Escape handling: cancel a pending shape, otherwise leave drawing mode.
    /// Returns the mode change, if any.
    pub fn escape(&mut self) -> Option<DrawingMode> {
        if self.pending.take().is_some() {
            self.preview = None;
            return None;
        }
        self.set_mode(DrawingMode::None).then_some(DrawingMode::None)
    }
}

fn two_point(mode: DrawingMode, start: DrawingPoint, end: DrawingPoint) -> ShapeKind {
    match mode {
        DrawingMode::Rectangle => ShapeKind::Rectangle { start, end },
        _ => ShapeKind::Trendline { start, end },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shape_json_is_flat() {
        let shape = DrawingShape::preview(ShapeKind::Horizontal { price: 10.5 });
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value, json!({"id": "__preview__", "type": "horizontal", "price": 10.5, "isDraft": true}));
    }

    #[test]
    fn sanitize_regenerates_missing_id() {
        let mut ids = DrawingIdGenerator::default();
        let raw = json!({"type": "trendline", "start": {"originalX": 0.1, "price": 5.0}, "end": {"originalX": 0.2, "price": 6.0}});
        let shape = sanitize_stored_shape(&raw, &mut ids, 42).unwrap();
        assert_eq!(shape.id, "drawing-42-1");
    }

    #[test]
    fn two_clicks_commit_a_trendline() {
        let mut session = DrawingSession::default();
        session.set_mode(DrawingMode::Trendline);
        let a = DrawingPoint::new(-0.5, 10.0);
        let b = DrawingPoint::new(0.5, 12.0);
        assert_eq!(session.click(a, || "x".into()), DrawingClick::Started);
        assert!(session.preview().unwrap().is_draft);
        match session.click(b, || "t1".into()) {
            DrawingClick::Committed(shape) => {
                assert_eq!(shape.kind, ShapeKind::Trendline { start: a, end: b });
                assert!(!shape.is_draft);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.preview().is_none());
    }

    #[test]
    fn escape_cancels_then_exits() {
        let mut session = DrawingSession::default();
        session.set_mode(DrawingMode::Rectangle);
        session.click(DrawingPoint::new(0.0, 1.0), || "x".into());
        assert_eq!(session.escape(), None);
        assert_eq!(session.mode(), DrawingMode::Rectangle);
        assert_eq!(session.escape(), Some(DrawingMode::None));
    }
}
