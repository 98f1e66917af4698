use chrono::DateTime;
use chrono::Utc;

/// Whole seconds since the epoch, dropping any sub-second part.
///
/// Truncation goes toward negative infinity, so `-0.5s` becomes `-1`.
pub fn truncate_to_secs(t: DateTime<Utc>) -> i64 {
    t.timestamp()
}
