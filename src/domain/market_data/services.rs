use super::{Candle, Price, Tick, Timestamp, Volume};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

const STALE_MESSAGE_MS: f64 = 60_000.0;
const LARGE_GAP_MS: u64 = 3_600_000;
const TIMELY_MS: u64 = 300_000;
const SECONDS_THRESHOLD: f64 = 10_000_000_000.0;

/// Outcome of a validation pass. `valid` is true when there are no errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn finish(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors, warnings }
    }
}

/// Ratios in `[0, 1]` describing a candle set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DataQualityMetrics {
    pub completeness: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub overall: f64,
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn positive_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64).filter(|v| is_positive(*v))
}

/// Structural and consistency checks for inbound messages and candle sets.
pub struct DataValidator;

impl DataValidator {
    pub fn validate_message(message: &Value, now_ms: u64) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let Some(obj) = message.as_object() else {
            errors.push("Message must be an object".to_string());
            return ValidationReport::finish(errors, warnings);
        };

        if !obj.get("type").and_then(Value::as_str).is_some_and(|s| !s.is_empty()) {
            errors.push("Message must have a valid type".to_string());
        }
        if !obj.get("symbol").and_then(Value::as_str).is_some_and(|s| !s.is_empty()) {
            errors.push("Message must have a valid symbol".to_string());
        }

        match obj.get("timestamp") {
            None | Some(Value::Null) => {
                warnings.push("No timestamp provided, using current time".to_string());
            }
            Some(raw) => {
                let ts = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => parse_date_string(s),
                    _ => None,
                };
                match ts {
                    Some(ts) if ts.is_finite() && ts > 0.0 => {
                        let age = now_ms as f64 - ts;
                        if age > STALE_MESSAGE_MS {
                            warnings.push(format!("Data is {}s old", (age / 1000.0).round()));
                        }
                    }
                    _ => warnings.push("Invalid timestamp, using current time".to_string()),
                }
            }
        }

        if !obj.get("data").is_some_and(Value::is_object) {
            errors.push("Message must have a data object".to_string());
        }

        ValidationReport::finish(errors, warnings)
    }

    pub fn validate_candles(candles: &[Candle]) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if candles.is_empty() {
            warnings.push("Empty candles array".to_string());
            return ValidationReport::finish(errors, warnings);
        }

        for (i, candle) in candles.iter().enumerate() {
            let o = &candle.ohlcv;
            if candle.timestamp.value() == 0 {
                errors.push(format!("Candle {i}: invalid timestamp"));
            }
            for (name, price) in [("open", o.open), ("high", o.high), ("low", o.low), ("close", o.close)] {
                if !price.is_valid() {
                    errors.push(format!("Candle {i}: invalid {name} price"));
                }
            }
            if o.high.value() < o.open.value().max(o.close.value()) {
                errors.push(format!("Candle {i}: high must be >= max(open, close)"));
            }
            if o.low.value() > o.open.value().min(o.close.value()) {
                errors.push(format!("Candle {i}: low must be <= min(open, close)"));
            }
            if o.high < o.low {
                errors.push(format!("Candle {i}: high must be >= low"));
            }
        }

        if let Some(i) = (1..candles.len()).find(|&i| candles[i].timestamp < candles[i - 1].timestamp) {
            warnings.push(format!("Candles are not sorted by timestamp (index {i})"));
        }

        for pair in candles.windows(2) {
            let gap = pair[1].timestamp.value().saturating_sub(pair[0].timestamp.value());
            if gap > LARGE_GAP_MS {
                warnings.push(format!("Large time gap detected: {} minutes", (gap as f64 / 60_000.0).round()));
            }
        }

        ValidationReport::finish(errors, warnings)
    }

    /// Completeness counts the five required fields; typed candles always have them,
    /// so only a zero timestamp counts as missing.
    pub fn quality_metrics(candles: &[Candle], now_ms: u64) -> DataQualityMetrics {
        if candles.is_empty() {
            return DataQualityMetrics::default();
        }
        let n = candles.len() as f64;

        let present: usize = candles
            .iter()
            .map(|c| {
                let o = &c.ohlcv;
                usize::from(c.timestamp.value() > 0)
                    + [o.open, o.high, o.low, o.close].iter().filter(|p| !p.value().is_nan()).count()
            })
            .sum();
        let completeness = present as f64 / (n * 5.0);

        let consistency = candles.iter().filter(|c| c.is_valid()).count() as f64 / n;

        let timeliness = candles
            .iter()
            .filter(|c| now_ms.saturating_sub(c.timestamp.value()) < TIMELY_MS)
            .count() as f64
            / n;

        let overall = completeness * 0.3 + consistency * 0.5 + timeliness * 0.2;
        DataQualityMetrics { completeness, consistency, timeliness, overall }
    }

    pub fn filter_valid(candles: &[Candle]) -> Vec<Candle> {
        candles.iter().filter(|c| c.timestamp.value() > 0 && c.is_valid()).copied().collect()
    }

    /// Drop later candles sharing a timestamp with an earlier one.
    pub fn remove_duplicates(candles: &[Candle]) -> Vec<Candle> {
        let mut seen = HashSet::new();
        candles.iter().filter(|c| seen.insert(c.timestamp)).copied().collect()
    }

    pub fn sort_by_timestamp(candles: &[Candle]) -> Vec<Candle> {
        let mut sorted = candles.to_vec();
        sorted.sort_by_key(|c| c.timestamp);
        sorted
    }

    /// Filter, dedup, then sort.
    pub fn clean(candles: &[Candle]) -> Vec<Candle> {
        let valid = Self::filter_valid(candles);
        let unique = Self::remove_duplicates(&valid);
        Self::sort_by_timestamp(&unique)
    }
}

/// Candle record from the host: `{timestamp, open, high, low, close, volume?}`.
#[derive(Deserialize)]
struct HostCandle {
    timestamp: u64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Turns loosely typed stream payloads into candles and ticks.
pub struct MarketDataParser;

impl MarketDataParser {
    /// Parse a `candle` message. Open and close are required; high and low are
    /// checked when present and otherwise derived from open and close.
    pub fn parse_candle(message: &Value, now_ms: u64) -> Option<Candle> {
        if message.get("type").and_then(Value::as_str) != Some("candle") {
            return None;
        }
        let data = message.get("data")?.as_object()?;
        let open = data.get("open").and_then(Value::as_f64).filter(|v| is_positive(*v))?;
        let close = data.get("close").and_then(Value::as_f64).filter(|v| is_positive(*v))?;

        let optional = |key: &str| -> Result<Option<f64>, ()> {
            match data.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_f64().filter(|v| is_positive(*v)).map(Some).ok_or(()),
            }
        };
        let high = optional("high").ok()?;
        let low = optional("low").ok()?;
        if high.is_some_and(|h| h < open.max(close)) || low.is_some_and(|l| l > open.min(close)) {
            return None;
        }

        let high = high.unwrap_or(open.max(close)).max(open).max(close);
        let low = low.unwrap_or(open.min(close)).min(open).min(close);
        let volume = data.get("volume").and_then(Value::as_f64).filter(|v| is_positive(*v)).unwrap_or(0.0);
        let timestamp = Self::normalize_timestamp(message.get("timestamp"), now_ms);

        Some(Candle::from_values(timestamp, open, high, low, close, volume))
    }

    /// Parse a `tick` or `price` message.
    pub fn parse_tick(message: &Value, now_ms: u64) -> Option<Tick> {
        let kind = message.get("type").and_then(Value::as_str)?;
        if kind != "tick" && kind != "price" {
            return None;
        }
        let data = message.get("data")?;
        if !data.is_object() {
            return None;
        }
        let price = positive_field(data, "price")?;
        let volume = match data.get("volume") {
            None | Some(Value::Null) => 0.0,
            Some(_) => positive_field(data, "volume")?,
        };

        Some(Tick {
            timestamp: Timestamp::from_millis(Self::normalize_timestamp(message.get("timestamp"), now_ms)),
            price: Price::from(price),
            volume: Volume::from(volume),
        })
    }

    /// Parse a polled candle record: `{timestamp, open, high, low, close, volume?}`
    /// with the same timestamp handling as stream messages.
    pub fn parse_candle_record(record: &Value, now_ms: u64) -> Option<Candle> {
        let wrapped = serde_json::json!({
            "type": "candle",
            "timestamp": record.get("timestamp").cloned().unwrap_or(Value::Null),
            "data": record,
        });
        Self::parse_candle(&wrapped, now_ms)
    }

    /// Parse a candle handed over by the host page. The timestamp is taken as
    /// integer milliseconds as given; the record must satisfy the OHLC rules.
    pub fn parse_host_candle(record: &Value) -> Option<Candle> {
        let host: HostCandle = serde_json::from_value(record.clone()).ok()?;
        let candle = Candle::from_values(host.timestamp, host.open, host.high, host.low, host.close, host.volume);
        candle.is_valid().then_some(candle)
    }

    /// Missing or zero means now, strings go through date parsing, and values
    /// below `1e10` are seconds.
    pub fn normalize_timestamp(raw: Option<&Value>, now_ms: u64) -> u64 {
        match raw {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(ts) if ts.is_finite() && ts > 0.0 => {
                    if ts < SECONDS_THRESHOLD {
                        (ts * 1000.0) as u64
                    } else {
                        ts as u64
                    }
                }
                _ => now_ms,
            },
            Some(Value::String(s)) if !s.is_empty() => {
                parse_date_string(s).filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64).unwrap_or(now_ms)
            }
            _ => now_ms,
        }
    }

    /// Sort ticks and fold them into fixed-width buckets.
    pub fn group_ticks_into_candles(ticks: &[Tick], interval_ms: u64) -> Vec<Candle> {
        let mut sorted = ticks.to_vec();
        sorted.sort_by_key(|t| t.timestamp);

        let mut candles: Vec<Candle> = Vec::new();
        for tick in &sorted {
            let bucket = tick.timestamp.floor_to(interval_ms);
            let price = tick.price.value();
            let volume = tick.volume.value();
            match candles.last_mut() {
                Some(current) if current.timestamp == bucket => {
                    let o = &mut current.ohlcv;
                    o.high = Price::from(o.high.value().max(price));
                    o.low = Price::from(o.low.value().min(price));
                    o.close = Price::from(price);
                    o.volume = Volume::from(o.volume.value() + volume);
                }
                _ => candles.push(Candle::from_values(bucket.value(), price, price, price, price, volume)),
            }
        }
        candles
    }
}

#[cfg(target_arch = "wasm32")]
fn parse_date_string(s: &str) -> Option<f64> {
    let parsed = js_sys::Date::parse(s);
    (!parsed.is_nan()).then_some(parsed)
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_date_string(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candle_without_high_low_is_normalized() {
        let msg = json!({"type": "candle", "symbol": "X", "timestamp": 1_700_000_000, "data": {"open": 10.0, "close": 12.0}});
        let candle = MarketDataParser::parse_candle(&msg, 0).unwrap();
        assert_eq!(candle.timestamp.value(), 1_700_000_000_000);
        assert_eq!(candle.ohlcv.high.value(), 12.0);
        assert_eq!(candle.ohlcv.low.value(), 10.0);
        assert_eq!(candle.ohlcv.volume.value(), 0.0);
    }

    #[test]
    fn inconsistent_high_is_rejected() {
        let msg = json!({"type": "candle", "data": {"open": 10.0, "close": 12.0, "high": 11.0}});
        assert!(MarketDataParser::parse_candle(&msg, 0).is_none());
    }

    #[test]
    fn tick_with_bad_volume_is_rejected() {
        let msg = json!({"type": "tick", "data": {"price": 5.0, "volume": -1.0}});
        assert!(MarketDataParser::parse_tick(&msg, 7).is_none());
        let ok = json!({"type": "price", "data": {"price": 5.0}});
        assert_eq!(MarketDataParser::parse_tick(&ok, 7).unwrap().timestamp.value(), 7);
    }

    #[test]
    fn stale_message_warns() {
        let msg = json!({"type": "tick", "symbol": "X", "timestamp": 1_000.0, "data": {}});
        let report = DataValidator::validate_message(&msg, 121_000);
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["Data is 120s old".to_string()]);
    }
}
