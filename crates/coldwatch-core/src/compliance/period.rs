//! Relative period tokens ("24h", "7d", ...) to absolute cutoffs

use chrono::{DateTime, Duration, Utc};

/// Resolve a period token against the current time.
///
/// Returns `None` for an absent or unrecognized token, which callers treat
/// as "no time filter".
pub fn resolve_period(token: Option<&str>) -> Option<DateTime<Utc>> {
    resolve_period_at(token, Utc::now())
}

/// Resolve a period token against an explicit clock
pub fn resolve_period_at(token: Option<&str>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let token = token?.trim();

    let hours = match token {
        "24h" => 24.0,
        "7d" => 168.0,
        "30d" => 720.0,
        other => match other.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => n,
            _ => {
                tracing::debug!(token = other, "Unrecognized period token, not filtering");
                return None;
            }
        },
    };

    // Millisecond precision keeps fractional hours exact enough for filtering
    let millis = (hours * 3_600_000.0).round() as i64;
    Duration::try_milliseconds(millis).and_then(|d| now.checked_sub_signed(d))
}
