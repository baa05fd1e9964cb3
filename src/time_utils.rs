//! Label formatting for the HUD and the axes. All times are UTC.

const MS_PER_DAY: u64 = 86_400_000;

/// Civil date from days since the Unix epoch (proleptic Gregorian).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn clock(timestamp: u64) -> (u64, u64, u64) {
    let ms_of_day = timestamp % MS_PER_DAY;
    (ms_of_day / 3_600_000, ms_of_day / 60_000 % 60, ms_of_day / 1_000 % 60)
}

/// Format a timestamp according to zoom level.
///
/// - `zoom >= 2.0` -> `HH:MM`
/// - `1.0 <= zoom < 2.0` -> `DD.MM`
/// - `zoom < 1.0` -> `MM.YYYY`
pub fn format_time_label(timestamp: u64, zoom: f64) -> String {
    let (year, month, day) = civil_from_days((timestamp / MS_PER_DAY) as i64);
    if zoom >= 2.0 {
        let (hours, minutes, _) = clock(timestamp);
        format!("{hours:02}:{minutes:02}")
    } else if zoom >= 1.0 {
        format!("{day:02}.{month:02}")
    } else {
        format!("{month:02}.{year}")
    }
}

/// `HH:MM:SS`, or a placeholder for a missing timestamp.
pub fn format_hud_time(timestamp: u64) -> String {
    if timestamp == 0 {
        return "--:--:--".to_string();
    }
    let (hours, minutes, seconds) = clock(timestamp);
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Decimal places that keep neighbouring axis labels distinct for a visible price range.
pub fn price_decimals(range: f64) -> usize {
    match range.abs() {
        r if !r.is_finite() => 2,
        r if r >= 100.0 => 2,
        r if r >= 1.0 => 3,
        r if r >= 0.01 => 4,
        _ => 5,
    }
}

pub fn format_price(price: f64, decimals: usize) -> String {
    if !price.is_finite() {
        return "--".to_string();
    }
    format!("{price:.decimals$}")
}
