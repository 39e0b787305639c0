//! Rotating daily subset for version checks.
//!
//! A catalog larger than one day's batch is split into consecutive windows;
//! day `n` takes window `n mod windows`, so every entry is checked once per
//! cycle.

use chrono::NaiveDate;

/// Number of days since the Unix epoch, used as the rotation index.
pub fn day_index(date: NaiveDate) -> u64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    date.signed_duration_since(epoch).num_days().max(0) as u64
}

/// Pick today's slice of `items`.
///
/// Returns everything when `batch_size` is zero or covers the whole list.
pub fn daily_rotation<T: Clone>(items: &[T], batch_size: usize, day: u64) -> Vec<T> {
    if batch_size == 0 || items.len() <= batch_size {
        return items.to_vec();
    }
    let windows = items.len().div_ceil(batch_size) as u64;
    let start = (day % windows) as usize * batch_size;
    items.iter().skip(start).take(batch_size).cloned().collect()
}
