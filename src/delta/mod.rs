//! Occurrence delta between two versions of the same event.
//!
//! Only update notifications go through here; a create always counts as 1.


use crate::EventRecord;

/// Occurrences `new` adds on top of `old`.
///
/// - both carry a series: series count difference
/// - only `new` carries a series: the full series count, since the series
///   restarts its own accounting independent of the legacy count
/// - otherwise: legacy count difference
///
/// Regressed upstream counts yield a negative value. It is returned as-is.
pub fn updated_occurrences(
    old: &EventRecord,
    new: &EventRecord,
) -> f64 {
    let delta = match (old.series_count(), new.series_count()) {
        (Some(old_count), Some(new_count)) => i64::from(new_count) - i64::from(old_count),
        (None, Some(new_count)) => i64::from(new_count),
        (_, None) => i64::from(new.count()) - i64::from(old.count()),
    };
    delta as f64
}
