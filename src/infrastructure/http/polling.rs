//! Polling fallback for when the stream is unavailable.

use crate::config::RealtimeConfig;
use crate::domain::errors::{NetworkError, NetworkResult, ValidationError};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{Candle, MarketDataParser};
use crate::{log_debug, log_warn};
use futures::future::{Either, select};
use gloo_net::http::Request;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepted response bodies: a candle array or `{"candle": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PollingPayload {
    Candles(Vec<Value>),
    Single { candle: Value },
}

impl PollingPayload {
    pub fn parse(value: Value) -> Result<Self, ValidationError> {
        Self::deserialize(value).map_err(|e| ValidationError::Message(format!("unexpected polling body: {e}")))
    }

    /// Records that fail validation are dropped; records without a timestamp are stamped `now_ms`.
    pub fn into_candles(self, now_ms: u64) -> Vec<Candle> {
        let records = match self {
            Self::Candles(records) => records,
            Self::Single { candle } => vec![candle],
        };
        let total = records.len();
        let candles: Vec<Candle> =
            records.iter().filter_map(|record| MarketDataParser::parse_candle_record(record, now_ms)).collect();
        if candles.len() < total {
            log_warn!(
                LogComponent::Infrastructure("Polling"),
                "Dropped {} invalid records of {}",
                total - candles.len(),
                total
            );
        }
        candles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Poll again after the regular interval.
    Next(Duration),
    /// Retry after the failure delay.
    Retry(Duration),
    GiveUp,
}

/// Consecutive failure accounting. A success clears the count.
#[derive(Debug, Clone)]
pub struct PollingRetryState {
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
    retry_delay: Duration,
}

impl PollingRetryState {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: config.polling_max_attempts.max(1),
            interval: Duration::from_millis(config.polling_interval_ms),
            retry_delay: Duration::from_millis(config.polling_retry_delay_ms),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_success(&mut self) -> PollOutcome {
        self.attempts = 0;
        PollOutcome::Next(self.interval)
    }

    pub fn on_failure(&mut self) -> PollOutcome {
        self.attempts += 1;
        if self.attempts >= self.max_attempts { PollOutcome::GiveUp } else { PollOutcome::Retry(self.retry_delay) }
    }
}

pub struct PollingFallback {
    url: String,
    symbol: String,
    retry: PollingRetryState,
}

impl PollingFallback {
    /// Polling only targets same-origin paths.
    pub fn new(config: &RealtimeConfig) -> Option<Self> {
        let url = config.polling_url.as_deref().filter(|url| url.starts_with('/'))?;
        Some(Self { url: url.to_string(), symbol: config.symbol.clone(), retry: PollingRetryState::new(config) })
    }

    pub fn query(&self, since: Option<u64>) -> Vec<(&'static str, String)> {
        let mut params = vec![("symbol", self.symbol.clone())];
        if let Some(since) = since.filter(|&ts| ts > 0) {
            params.push(("since", since.to_string()));
        }
        params
    }

    async fn fetch(&self, since: Option<u64>) -> NetworkResult<Value> {
        let request = Request::get(&self.url).query(self.query(since)).send();
        let response = match select(Box::pin(request), Box::pin(gloo_timers::future::sleep(REQUEST_TIMEOUT))).await {
            Either::Left((result, _)) => result.map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?,
            Either::Right(_) => return Err(NetworkError::Timeout.into()),
        };
        if !response.ok() {
            return Err(NetworkError::HttpStatus(response.status()).into());
        }
        Ok(response.json::<Value>().await.map_err(|e| NetworkError::Decode(e.to_string()))?)
    }

    /// Poll until failures exhaust the retry budget. `since` is read before each
    /// request so the cursor follows merged data.
    pub async fn run<S, D>(mut self, mut since: S, mut on_data: D)
    where
        S: FnMut() -> Option<u64>,
        D: FnMut(PollingPayload),
    {
        get_logger().info(LogComponent::Infrastructure("Polling"), &format!("Polling {}", self.url));

        loop {
            let result = self
                .fetch(since())
                .await
                .and_then(|body| PollingPayload::parse(body).map_err(Into::into));

            let outcome = match result {
                Ok(payload) => {
                    on_data(payload);
                    self.retry.on_success()
                }
                Err(e) => {
                    log_warn!(
                        LogComponent::Infrastructure("Polling"),
                        "Poll failed ({}/{}): {}",
                        self.retry.attempts() + 1,
                        self.retry.max_attempts,
                        e
                    );
                    self.retry.on_failure()
                }
            };

            match outcome {
                PollOutcome::Next(delay) | PollOutcome::Retry(delay) => {
                    log_debug!(LogComponent::Infrastructure("Polling"), "Next poll in {:?}", delay);
                    gloo_timers::future::sleep(delay).await;
                }
                PollOutcome::GiveUp => {
                    get_logger().error(LogComponent::Infrastructure("Polling"), "Polling gave up");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_failures_give_up() {
        let mut retry = PollingRetryState::new(&RealtimeConfig::default());
        assert_eq!(retry.on_failure(), PollOutcome::Retry(Duration::from_secs(5)));
        assert_eq!(retry.on_failure(), PollOutcome::Retry(Duration::from_secs(5)));
        assert_eq!(retry.on_failure(), PollOutcome::GiveUp);
    }

    #[test]
    fn success_clears_failures() {
        let mut retry = PollingRetryState::new(&RealtimeConfig::default());
        retry.on_failure();
        retry.on_failure();
        assert_eq!(retry.on_success(), PollOutcome::Next(Duration::from_secs(5)));
        assert_eq!(retry.on_failure(), PollOutcome::Retry(Duration::from_secs(5)));
    }

    #[test]
    fn only_relative_urls_poll() {
        let mut config = RealtimeConfig { symbol: "BTC".into(), ..RealtimeConfig::default() };
        config.polling_url = Some("https://example.com/candles".into());
        assert!(PollingFallback::new(&config).is_none());
        config.polling_url = Some("/api/candles".into());
        let polling = PollingFallback::new(&config).unwrap();
        assert_eq!(polling.query(None), vec![("symbol", "BTC".to_string())]);
        assert_eq!(polling.query(Some(0)).len(), 1);
        assert_eq!(polling.query(Some(42))[1], ("since", "42".to_string()));
    }

    #[test]
    fn payload_shapes() {
        let array = PollingPayload::parse(json!([
            {"timestamp": 1_000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5},
            {"timestamp": 2_000, "open": -1.0, "close": 1.0}
        ]))
        .unwrap();
        assert_eq!(array.into_candles(0).len(), 1);

        let single = PollingPayload::parse(json!({"candle": {"open": 1.0, "close": 2.0}})).unwrap();
        let candles = single.into_candles(7_000);
        assert_eq!(candles[0].timestamp.value(), 7_000);

        assert!(PollingPayload::parse(json!({"status": "ok"})).is_err());
    }
}
