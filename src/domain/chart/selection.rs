use crate::domain::market_data::Candle;
use serde::Serialize;
use std::collections::VecDeque;

/// A canvas point resolved against the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPoint {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub clip_x: f64,
    pub clip_y: f64,
    pub original_x: f64,
    pub index: usize,
    pub price: f64,
    pub time: u64,
}

/// Shift-drag region gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RegionSelection {
    #[default]
    Idle,
    Active { start: RegionPoint, current: RegionPoint },
    Completed { start: RegionPoint, end: RegionPoint },
}

/// Pixel coordinates of a finished region gesture as reported by the input surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionGestureEnd {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub cancelled: bool,
}

impl RegionSelection {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn start(&mut self, point: RegionPoint) {
        *self = Self::Active { start: point, current: point };
    }

    /// Only an active gesture follows the cursor.
    pub fn update(&mut self, point: RegionPoint) {
        if let Self::Active { current, .. } = self {
            *current = point;
        }
    }

    /// Finish an active gesture. A cancelled gesture, a missing endpoint, or a
    /// drag shorter than `min_delta_px` on either axis returns to `Idle`.
    pub fn finish(
        &mut self,
        gesture: &RegionGestureEnd,
        start: Option<RegionPoint>,
        end: Option<RegionPoint>,
        min_delta_px: f64,
    ) {
        if !self.is_active() {
            return;
        }
        *self = match (start, end) {
            (Some(start), Some(end))
                if !gesture.cancelled
                    && (gesture.end_x - gesture.start_x).abs() >= min_delta_px
                    && (gesture.end_y - gesture.start_y).abs() >= min_delta_px =>
            {
                Self::Completed { start, end }
            }
            _ => Self::Idle,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

/// Summary reported to the host for a completed region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMetrics {
    pub start_candle: Candle,
    pub end_candle: Candle,
    pub price_start: f64,
    pub price_end: f64,
    pub price_range: f64,
    pub candle_count: usize,
    pub time_start: u64,
    pub time_end: u64,
}

impl RegionMetrics {
    pub fn from_points(start: &RegionPoint, end: &RegionPoint, candles: &[Candle]) -> Option<Self> {
        let last = candles.len().checked_sub(1)?;
        Some(Self {
            start_candle: candles[start.index.min(last)],
            end_candle: candles[end.index.min(last)],
            price_start: start.price,
            price_end: end.price,
            price_range: (end.price - start.price).abs(),
            candle_count: start.index.abs_diff(end.index) + 1,
            time_start: start.time.min(end.time),
            time_end: start.time.max(end.time),
        })
    }
}

/// The candle picked by a click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandleSelection {
    pub candle: Candle,
    pub index: usize,
}

impl CandleSelection {
    /// Follow the selected candle after the data changed. `None` once it is gone.
    pub fn reconcile(&self, candles: &[Candle]) -> Option<CandleSelection> {
        let ts = self.candle.timestamp;
        let index = match candles.get(self.index) {
            Some(c) if c.timestamp == ts => self.index,
            _ => candles.iter().position(|c| c.timestamp == ts)?,
        };
        Some(CandleSelection { candle: candles[index], index })
    }
}

/// Most recent selections first, unique by timestamp.
#[derive(Debug, Clone)]
pub struct SelectionHistory {
    items: VecDeque<CandleSelection>,
    capacity: usize,
}

impl SelectionHistory {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, selection: CandleSelection) {
        self.items.retain(|s| s.candle.timestamp != selection.candle.timestamp);
        self.items.push_front(selection);
        self.items.truncate(self.capacity);
    }

    pub fn items(&self) -> impl Iterator<Item = &CandleSelection> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(px: f64, index: usize) -> RegionPoint {
        RegionPoint {
            pixel_x: px,
            pixel_y: px,
            clip_x: 0.0,
            clip_y: 0.0,
            original_x: 0.0,
            index,
            price: 1.0,
            time: 0,
        }
    }

    #[test]
    fn short_drag_returns_to_idle() {
        let mut region = RegionSelection::default();
        region.start(point(10.0, 0));
        let gesture = RegionGestureEnd { start_x: 10.0, start_y: 10.0, end_x: 15.0, end_y: 40.0, cancelled: false };
        region.finish(&gesture, Some(point(10.0, 0)), Some(point(15.0, 1)), 6.0);
        assert_eq!(region, RegionSelection::Idle);
    }

    #[test]
    fn history_keeps_six_unique() {
        let mut history = SelectionHistory::new(6);
        for i in 0..8u64 {
            let candle = Candle::from_values(i, 1.0, 1.0, 1.0, 1.0, 0.0);
            history.push(CandleSelection { candle, index: i as usize });
        }
        let again = Candle::from_values(5, 1.0, 1.0, 1.0, 1.0, 0.0);
        history.push(CandleSelection { candle: again, index: 5 });
        assert_eq!(history.len(), 6);
        assert_eq!(history.items().next().unwrap().candle.timestamp.value(), 5);
    }
}
