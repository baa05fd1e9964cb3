pub use super::value_objects::{OHLCV, Price, Timestamp, Volume};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One OHLC bar. Serialises flat: `{timestamp, open, high, low, close, volume}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub ohlcv: OHLCV,
}

impl Candle {
    pub fn new(timestamp: Timestamp, ohlcv: OHLCV) -> Self {
        Self { timestamp, ohlcv }
    }

    pub fn from_values(timestamp: u64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp: Timestamp::from_millis(timestamp),
            ohlcv: OHLCV::new(
                Price::from(open),
                Price::from(high),
                Price::from(low),
                Price::from(close),
                Volume::from(volume),
            ),
        }
    }

    /// A doji (`close == open`) counts as bullish.
    pub fn is_bullish(&self) -> bool {
        self.ohlcv.close >= self.ohlcv.open
    }

    pub fn is_valid(&self) -> bool {
        self.ohlcv.is_valid()
    }

    pub fn body_size(&self) -> Price {
        Price::from((self.ohlcv.close.value() - self.ohlcv.open.value()).abs())
    }

    pub fn price_bounds(&self) -> (f64, f64) {
        let o = &self.ohlcv;
        let lo = o.open.value().min(o.high.value()).min(o.low.value()).min(o.close.value());
        let hi = o.open.value().max(o.high.value()).max(o.low.value()).max(o.close.value());
        (lo, hi)
    }
}

/// A single trade or price update before it is folded into a candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: Timestamp,
    pub price: Price,
    #[serde(default)]
    pub volume: Volume,
}

/// Time-ordered, bounded candle series.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    max_size: usize,
}

impl CandleSeries {
    pub fn new(max_size: usize) -> Self {
        Self { candles: VecDeque::new(), max_size: max_size.max(1) }
    }

    /// Replace the content with the valid entries of `candles`, sorted by time.
    /// A repeated timestamp keeps the candle that comes later in the input.
    pub fn set_initial(&mut self, candles: Vec<Candle>) {
        let mut sorted: Vec<Candle> = candles.into_iter().filter(Candle::is_valid).collect();
        sorted.sort_by_key(|c| c.timestamp);
        self.candles.clear();
        for candle in sorted {
            match self.candles.back_mut() {
                Some(last) if last.timestamp == candle.timestamp => *last = candle,
                _ => self.candles.push_back(candle),
            }
        }
        self.trim();
    }

    /// Insert or replace a candle keeping time order.
    pub fn upsert(&mut self, candle: Candle) {
        if let Some(last) = self.candles.back_mut() {
            if last.timestamp == candle.timestamp {
                *last = candle;
                return;
            }
            if candle.timestamp < last.timestamp {
                self.insert_sorted(candle);
                return;
            }
        }

        self.candles.push_back(candle);
        self.trim();
    }

    /// Apply a batch of updates. Returns how many candles were applied.
    pub fn merge(&mut self, candles: &[Candle]) -> usize {
        for candle in candles {
            self.upsert(*candle);
        }
        candles.len()
    }

    /// Fold a tick into the bucket of `interval_ms` it falls in.
    ///
    /// A tick in the last bucket extends it. A tick in a later bucket opens a
    /// new candle whose open is the previous close. An empty series starts
    /// from the tick alone. Ticks older than the last bucket are dropped.
    pub fn apply_tick(&mut self, tick: &Tick, interval_ms: u64) -> bool {
        let bucket = tick.timestamp.floor_to(interval_ms);
        let price = tick.price.value();
        let volume = tick.volume.value().max(0.0);

        match self.candles.back_mut() {
            Some(last) if last.timestamp == bucket => {
                let o = &mut last.ohlcv;
                o.high = Price::from(o.high.value().max(price));
                o.low = Price::from(o.low.value().min(price));
                o.close = Price::from(price);
                o.volume = Volume::from(o.volume.value() + volume);
                true
            }
            Some(last) if last.timestamp < bucket => {
                let open = last.ohlcv.close.value();
                let candle = Candle::from_values(
                    bucket.value(),
                    open,
                    open.max(price),
                    open.min(price),
                    price,
                    volume,
                );
                self.candles.push_back(candle);
                self.trim();
                true
            }
            Some(_) => false,
            None => {
                self.candles.push_back(Candle::from_values(bucket.value(), price, price, price, price, volume));
                true
            }
        }
    }

    fn insert_sorted(&mut self, candle: Candle) {
        let pos = self.candles.partition_point(|c| c.timestamp < candle.timestamp);
        if pos < self.candles.len() && self.candles[pos].timestamp == candle.timestamp {
            self.candles[pos] = candle;
        } else {
            self.candles.insert(pos, candle);
        }
        self.trim();
    }

    fn trim(&mut self) {
        while self.candles.len() > self.max_size {
            self.candles.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }

    pub fn get_candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    /// Contiguous copy for consumers that need a slice.
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.candles.back().map(|c| c.timestamp)
    }

    pub fn count(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Lowest low and highest high across the series.
    pub fn price_range(&self) -> Option<(Price, Price)> {
        let first = self.candles.front()?;
        let (min, max) = self.candles.iter().fold(
            (first.ohlcv.low.value(), first.ohlcv.high.value()),
            |(min, max), c| (min.min(c.ohlcv.low.value()), max.max(c.ohlcv.high.value())),
        );
        Some((Price::from(min), Price::from(max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: u64, close: f64) -> Candle {
        Candle::from_values(ts, close, close + 1.0, close - 1.0, close, 1.0)
    }

    #[test]
    fn upsert_replaces_same_timestamp() {
        let mut series = CandleSeries::new(10);
        series.upsert(candle(1000, 10.0));
        series.upsert(candle(1000, 12.0));
        assert_eq!(series.count(), 1);
        assert_eq!(series.latest().unwrap().ohlcv.close.value(), 12.0);
    }

    #[test]
    fn older_candle_inserted_in_order() {
        let mut series = CandleSeries::new(10);
        series.upsert(candle(1000, 10.0));
        series.upsert(candle(3000, 10.0));
        series.upsert(candle(2000, 10.0));
        let ts: Vec<u64> = series.get_candles().iter().map(|c| c.timestamp.value()).collect();
        assert_eq!(ts, vec![1000, 2000, 3000]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut series = CandleSeries::new(2);
        series.merge(&[candle(1, 1.0), candle(2, 1.0), candle(3, 1.0)]);
        assert_eq!(series.count(), 2);
        assert_eq!(series.get_candles()[0].timestamp.value(), 2);
    }

    #[test]
    fn tick_extends_then_opens_bucket() {
        let mut series = CandleSeries::new(10);
        series.set_initial(vec![Candle::from_values(60_000, 100.0, 101.0, 99.0, 100.5, 2.0)]);

        let tick = Tick { timestamp: Timestamp::from_millis(90_000), price: Price::from(102.0), volume: Volume::from(1.0) };
        assert!(series.apply_tick(&tick, 60_000));
        let last = *series.latest().unwrap();
        assert_eq!(last.ohlcv.high.value(), 102.0);
        assert_eq!(last.ohlcv.close.value(), 102.0);
        assert_eq!(last.ohlcv.volume.value(), 3.0);

        let next = Tick { timestamp: Timestamp::from_millis(125_000), price: Price::from(98.0), volume: Volume::default() };
        assert!(series.apply_tick(&next, 60_000));
        let opened = series.latest().unwrap();
        assert_eq!(opened.timestamp.value(), 120_000);
        assert_eq!(opened.ohlcv.open.value(), 102.0);
        assert_eq!(opened.ohlcv.low.value(), 98.0);
        assert_eq!(opened.ohlcv.high.value(), 102.0);
    }

    #[test]
    fn set_initial_sorts_and_keeps_the_later_duplicate() {
        let mut series = CandleSeries::new(10);
        series.set_initial(vec![candle(3, 30.0), candle(1, 10.0), candle(3, 90.0)]);
        assert_eq!(series.count(), 2);
        assert_eq!(series.get_candles()[0].timestamp.value(), 1);
        assert_eq!(series.latest().unwrap().ohlcv.close.value(), 90.0);
    }

    #[test]
    fn set_initial_drops_invalid_candles() {
        let mut series = CandleSeries::new(10);
        series.set_initial(vec![
            candle(1, 10.0),
            Candle::from_values(2, 10.0, 9.0, 8.0, 10.5, 1.0),
            Candle::from_values(3, f64::NAN, 11.0, 9.0, 10.0, 1.0),
            candle(4, 12.0),
        ]);
        let stamps: Vec<u64> = series.get_candles().iter().map(|c| c.timestamp.value()).collect();
        assert_eq!(stamps, vec![1, 4]);
    }
}
