use candle_chart_wasm::domain::market_data::{Candle, CandleSeries};
use quickcheck_macros::quickcheck;

fn candle(minute: u8, close: f64) -> Candle {
    Candle::from_values(u64::from(minute) * 60_000, close, close + 1.0, close - 1.0, close, 1.0)
}

#[quickcheck]
fn merged_series_is_sorted_and_unique(minutes: Vec<u8>) -> bool {
    let mut series = CandleSeries::new(10_000);
    let batch: Vec<Candle> = minutes.iter().enumerate().map(|(i, m)| candle(*m, 10.0 + i as f64)).collect();
    series.merge(&batch);

    let candles = series.to_vec();
    let mut expected: Vec<u8> = minutes.clone();
    expected.sort_unstable();
    expected.dedup();
    candles.len() == expected.len() && candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

#[quickcheck]
fn later_update_wins(minute: u8, first: u16, second: u16) -> bool {
    let (first, second) = (f64::from(first) + 1.0, f64::from(second) + 1.0);
    let mut series = CandleSeries::new(100);
    series.merge(&[candle(minute, first), candle(minute, second)]);
    series.count() == 1 && series.latest().is_some_and(|c| c.ohlcv.close.value() == second)
}

#[test]
fn out_of_order_update_replaces_in_place() {
    let mut series = CandleSeries::new(100);
    series.merge(&[candle(1, 10.0), candle(2, 11.0), candle(3, 12.0)]);
    series.upsert(candle(2, 20.0));
    let closes: Vec<f64> = series.to_vec().iter().map(|c| c.ohlcv.close.value()).collect();
    assert_eq!(closes, vec![10.0, 20.0, 12.0]);
}

#[test]
fn series_is_bounded() {
    let mut series = CandleSeries::new(3);
    series.merge(&(0..5).map(|m| candle(m, 10.0)).collect::<Vec<_>>());
    assert_eq!(series.count(), 3);
    assert_eq!(series.get_candles().front().map(|c| c.timestamp.value()), Some(2 * 60_000));
}
