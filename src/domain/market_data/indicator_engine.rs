use super::Candle;
use crate::domain::logging::LogComponent;
use crate::log_warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-candle indicator output; `None` where the window is not yet full.
pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

impl BollingerBands {
    fn empty(len: usize) -> Self {
        Self { upper: vec![None; len], middle: vec![None; len], lower: vec![None; len] }
    }
}

/// Overlay requested by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndicatorSpec {
    Sma { period: usize, #[serde(default)] color: Option<String> },
    Ema { period: usize, #[serde(default)] color: Option<String> },
    Bollinger {
        period: usize,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default)]
        color: Option<String>,
    },
}

fn default_multiplier() -> f64 {
    2.0
}

impl IndicatorSpec {
    /// Buffer-key suffix, e.g. `sma20`.
    pub fn key(&self) -> String {
        match self {
            Self::Sma { period, .. } => format!("sma{period}"),
            Self::Ema { period, .. } => format!("ema{period}"),
            Self::Bollinger { period, .. } => format!("bb{period}"),
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Sma { color, .. } | Self::Ema { color, .. } | Self::Bollinger { color, .. } => color.as_deref(),
        }
    }
}

/// Computes moving-average style indicators over close prices.
pub trait IndicatorBackend {
    fn name(&self) -> &'static str;
    fn sma(&self, closes: &[f64], period: usize) -> Result<Series, String>;
    fn ema(&self, closes: &[f64], period: usize) -> Result<Series, String>;
    fn bollinger(&self, closes: &[f64], period: usize, multiplier: f64) -> Result<BollingerBands, String>;
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.ohlcv.close.value()).collect()
}

/// Reference implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarIndicators;

impl IndicatorBackend for ScalarIndicators {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn sma(&self, closes: &[f64], period: usize) -> Result<Series, String> {
        if period <= 1 {
            return Ok(closes.iter().copied().map(Some).collect());
        }
        let mut out = vec![None; closes.len()];
        let mut sum = 0.0;
        for (i, close) in closes.iter().enumerate() {
            sum += close;
            if i >= period {
                sum -= closes[i - period];
            }
            if i + 1 >= period {
                out[i] = Some(sum / period as f64);
            }
        }
        Ok(out)
    }

    fn ema(&self, closes: &[f64], period: usize) -> Result<Series, String> {
        let Some(&first) = closes.first() else {
            return Ok(Vec::new());
        };
        let smoothing = 2.0 / (period as f64 + 1.0);
        let mut ema = first;
        let mut out = Vec::with_capacity(closes.len());
        out.push(Some(ema));
        for close in &closes[1..] {
            ema = close * smoothing + ema * (1.0 - smoothing);
            out.push(Some(ema));
        }
        Ok(out)
    }

    fn bollinger(&self, closes: &[f64], period: usize, multiplier: f64) -> Result<BollingerBands, String> {
        let mut bands = BollingerBands::empty(closes.len());
        if closes.is_empty() || period < 2 {
            return Ok(bands);
        }
        for i in (period - 1)..closes.len() {
            let (mean, std) = window_stats(&closes[i + 1 - period..=i]);
            bands.middle[i] = Some(mean);
            bands.upper[i] = Some(mean + multiplier * std);
            bands.lower[i] = Some(mean - multiplier * std);
        }
        Ok(bands)
    }
}

fn window_stats(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = (window.iter().map(|v| v * v).sum::<f64>() / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Rayon-backed backend; each output slot is computed from its own window.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelIndicators;

#[cfg(feature = "parallel")]
impl IndicatorBackend for ParallelIndicators {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn sma(&self, closes: &[f64], period: usize) -> Result<Series, String> {
        use rayon::prelude::*;
        if period <= 1 {
            return Ok(closes.iter().copied().map(Some).collect());
        }
        Ok((0..closes.len())
            .into_par_iter()
            .map(|i| (i + 1 >= period).then(|| closes[i + 1 - period..=i].iter().sum::<f64>() / period as f64))
            .collect())
    }

    fn ema(&self, closes: &[f64], period: usize) -> Result<Series, String> {
        // recursive, no data parallelism to exploit
        ScalarIndicators.ema(closes, period)
    }

    fn bollinger(&self, closes: &[f64], period: usize, multiplier: f64) -> Result<BollingerBands, String> {
        use rayon::prelude::*;
        if closes.is_empty() || period < 2 {
            return Ok(BollingerBands::empty(closes.len()));
        }
        let stats: Vec<Option<(f64, f64)>> = (0..closes.len())
            .into_par_iter()
            .map(|i| (i + 1 >= period).then(|| window_stats(&closes[i + 1 - period..=i])))
            .collect();
        let mut bands = BollingerBands::empty(closes.len());
        for (i, s) in stats.into_iter().enumerate() {
            if let Some((mean, std)) = s {
                bands.middle[i] = Some(mean);
                bands.upper[i] = Some(mean + multiplier * std);
                bands.lower[i] = Some(mean - multiplier * std);
            }
        }
        Ok(bands)
    }
}

const ERROR_LOG_THROTTLE_MS: u64 = 5_000;

/// Runs the accelerated backend when present and falls back to the scalar one
/// on error. Fallback errors are logged at most once per key per 5 s.
pub struct IndicatorEngine {
    accelerated: Option<Box<dyn IndicatorBackend>>,
    scalar: ScalarIndicators,
    last_error_log: HashMap<String, u64>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        #[cfg(feature = "parallel")]
        let accelerated: Option<Box<dyn IndicatorBackend>> = Some(Box::new(ParallelIndicators));
        #[cfg(not(feature = "parallel"))]
        let accelerated: Option<Box<dyn IndicatorBackend>> = None;
        Self { accelerated, scalar: ScalarIndicators, last_error_log: HashMap::new() }
    }

    pub fn with_backend(backend: Box<dyn IndicatorBackend>) -> Self {
        Self { accelerated: Some(backend), scalar: ScalarIndicators, last_error_log: HashMap::new() }
    }

    pub fn backend_name(&self) -> &'static str {
        self.accelerated.as_ref().map(|b| b.name()).unwrap_or(self.scalar.name())
    }

    pub fn sma(&mut self, closes: &[f64], period: usize, now_ms: u64) -> Series {
        let attempt = self.accelerated.as_ref().map(|b| b.sma(closes, period));
        self.resolve(attempt, &format!("sma{period}"), now_ms, |s| s.sma(closes, period))
    }

    pub fn ema(&mut self, closes: &[f64], period: usize, now_ms: u64) -> Series {
        let attempt = self.accelerated.as_ref().map(|b| b.ema(closes, period));
        self.resolve(attempt, &format!("ema{period}"), now_ms, |s| s.ema(closes, period))
    }

    pub fn bollinger(&mut self, closes: &[f64], period: usize, multiplier: f64, now_ms: u64) -> BollingerBands {
        let attempt = self.accelerated.as_ref().map(|b| b.bollinger(closes, period, multiplier));
        self.resolve(attempt, &format!("bb{period}"), now_ms, |s| s.bollinger(closes, period, multiplier))
    }

    /// Returns true when an error for `key` should be logged at `now_ms`.
    pub fn should_log_error(&mut self, key: &str, now_ms: u64) -> bool {
        match self.last_error_log.get(key) {
            Some(&last) if now_ms.saturating_sub(last) < ERROR_LOG_THROTTLE_MS => false,
            _ => {
                self.last_error_log.insert(key.to_string(), now_ms);
                true
            }
        }
    }

    fn resolve<T: Default>(
        &mut self,
        attempt: Option<Result<T, String>>,
        key: &str,
        now_ms: u64,
        fallback: impl Fn(&ScalarIndicators) -> Result<T, String>,
    ) -> T {
        match attempt {
            Some(Ok(value)) => return value,
            Some(Err(err)) => {
                if self.should_log_error(key, now_ms) {
                    log_warn!(
                        LogComponent::Domain("Indicators"),
                        "{} failed for {}: {}, using scalar",
                        self.backend_name(),
                        key,
                        err
                    );
                }
            }
            None => {}
        }
        fallback(&self.scalar).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl IndicatorBackend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn sma(&self, _: &[f64], _: usize) -> Result<Series, String> {
            Err("boom".into())
        }
        fn ema(&self, _: &[f64], _: usize) -> Result<Series, String> {
            Err("boom".into())
        }
        fn bollinger(&self, _: &[f64], _: usize, _: f64) -> Result<BollingerBands, String> {
            Err("boom".into())
        }
    }

    #[test]
    fn falls_back_to_scalar() {
        let mut engine = IndicatorEngine::with_backend(Box::new(Failing));
        let out = engine.sma(&[1.0, 2.0, 3.0], 2, 0);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5)]);
    }

    #[test]
    fn error_log_is_throttled() {
        let mut engine = IndicatorEngine::new();
        assert!(engine.should_log_error("sma20", 1_000));
        assert!(!engine.should_log_error("sma20", 5_999));
        assert!(engine.should_log_error("ema9", 5_999));
        assert!(engine.should_log_error("sma20", 6_000));
    }

    #[test]
    fn bollinger_short_period_is_empty() {
        let bands = ScalarIndicators.bollinger(&[1.0, 2.0], 1, 2.0).unwrap();
        assert_eq!(bands.upper, vec![None, None]);
    }
}
