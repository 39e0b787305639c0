//! Digest send-time computation and idempotency keys.
//!
//! Digests go out at 08:00 in the recipient's own timezone: every day for
//! daily subscribers, on Mondays for weekly ones, on the 1st for monthly
//! ones. The no-tracking reminder goes out on the 15th. All conversion goes
//! through the IANA database in `chrono-tz`.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::types::DbId;

/// Local hour at which scheduled emails are sent.
pub const SEND_HOUR: i64 = 8;

/// Day of month for the no-tracking reminder.
pub const REMINDER_DAY_OF_MONTH: u32 = 15;

/// How far ahead the next qualifying day is searched. A month never has
/// more than 31 days, so this always finds the next 1st or 15th.
const SEARCH_HORIZON_DAYS: usize = 32;

// ---------------------------------------------------------------------------
// DigestFrequency
// ---------------------------------------------------------------------------

/// How often a user wants to receive a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl DigestFrequency {
    pub const ALL: [DigestFrequency; 3] = [
        DigestFrequency::Daily,
        DigestFrequency::Weekly,
        DigestFrequency::Monthly,
    ];

    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestFrequency::Daily => "daily",
            DigestFrequency::Weekly => "weekly",
            DigestFrequency::Monthly => "monthly",
        }
    }

    /// Parse a stored value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(DigestFrequency::Daily),
            "weekly" => Some(DigestFrequency::Weekly),
            "monthly" => Some(DigestFrequency::Monthly),
            _ => None,
        }
    }

    /// Window of history considered for one digest.
    pub fn lookback(&self) -> Duration {
        match self {
            DigestFrequency::Daily => Duration::days(1),
            DigestFrequency::Weekly => Duration::days(7),
            DigestFrequency::Monthly => Duration::days(30),
        }
    }

    /// Whether a digest of this frequency goes out on `date`.
    fn sends_on(&self, date: NaiveDate) -> bool {
        match self {
            DigestFrequency::Daily => true,
            DigestFrequency::Weekly => date.weekday() == Weekday::Mon,
            DigestFrequency::Monthly => date.day() == 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Timezones
// ---------------------------------------------------------------------------

/// Look up an IANA timezone name. Unknown names yield `None`.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// The UTC instant of 08:00 local time on `date` in `tz`.
///
/// Ambiguous local times take the earlier instant; a local time skipped by
/// a DST transition moves forward to the first valid half hour.
pub fn local_send_instant(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN) + Duration::hours(SEND_HOUR);
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => (1..=4)
            .find_map(|step| {
                tz.from_local_datetime(&(naive + Duration::minutes(30 * step)))
                    .earliest()
            })
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    };
    local.with_timezone(&Utc)
}

/// First 08:00 local instant strictly after `now` on a day accepted by
/// `sends_on`.
fn next_send_instant(now: DateTime<Utc>, tz: Tz, sends_on: impl Fn(NaiveDate) -> bool) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    today
        .iter_days()
        .take(SEARCH_HORIZON_DAYS)
        .filter(|d| sends_on(*d))
        .map(|d| local_send_instant(tz, d))
        .find(|instant| *instant > now)
        .unwrap_or_else(|| local_send_instant(tz, today + Duration::days(1)))
}

/// Next digest send time for a user of `frequency` in `tz`.
pub fn compute_scheduled_time(now: DateTime<Utc>, tz: Tz, frequency: DigestFrequency) -> DateTime<Utc> {
    next_send_instant(now, tz, |d| frequency.sends_on(d))
}

/// Next no-tracking reminder time: the 15th at 08:00 local.
pub fn compute_reminder_time(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    next_send_instant(now, tz, |d| d.day() == REMINDER_DAY_OF_MONTH)
}

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

/// Calendar granularity of an idempotency period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodGranularity {
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM`
    Month,
}

/// Period identifier of the local scheduling date of `scheduled_for`.
pub fn period_key(scheduled_for: DateTime<Utc>, tz: Tz, granularity: PeriodGranularity) -> String {
    let local = scheduled_for.with_timezone(&tz).date_naive();
    match granularity {
        PeriodGranularity::Day => local.format("%Y-%m-%d").to_string(),
        PeriodGranularity::Month => local.format("%Y-%m").to_string(),
    }
}

/// Deterministic queue key for one user, email scope and period.
pub fn compute_idempotency_key(user_id: DbId, scope: &str, period: &str) -> String {
    format!("{user_id}:{scope}:{period}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{America, Asia, Europe};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn frequency_round_trip_and_lookback() {
        for f in DigestFrequency::ALL {
            assert_eq!(DigestFrequency::parse(f.as_str()), Some(f));
        }
        assert_eq!(DigestFrequency::parse("hourly"), None);
        assert_eq!(DigestFrequency::Daily.lookback(), Duration::days(1));
        assert_eq!(DigestFrequency::Weekly.lookback(), Duration::days(7));
        assert_eq!(DigestFrequency::Monthly.lookback(), Duration::days(30));
    }

    #[test]
    fn parses_iana_names() {
        assert_eq!(parse_timezone("Europe/Berlin"), Some(Europe::Berlin));
        assert_eq!(parse_timezone("Mars/Olympus"), None);
    }

    #[test]
    fn daily_uses_today_when_still_ahead() {
        // 07:00 CET
        let now = utc(2025, 1, 15, 6, 0);
        let at = compute_scheduled_time(now, Europe::Berlin, DigestFrequency::Daily);
        assert_eq!(at, utc(2025, 1, 15, 7, 0));
    }

    #[test]
    fn daily_rolls_to_tomorrow_after_eight() {
        // 08:30 CET
        let now = utc(2025, 1, 15, 7, 30);
        let at = compute_scheduled_time(now, Europe::Berlin, DigestFrequency::Daily);
        assert_eq!(at, utc(2025, 1, 16, 7, 0));
    }

    #[test]
    fn weekly_targets_next_monday_across_dst() {
        // Wednesday 2025-03-05; US DST starts Sunday 2025-03-09.
        let now = utc(2025, 3, 5, 12, 0);
        let at = compute_scheduled_time(now, America::New_York, DigestFrequency::Weekly);
        assert_eq!(at, utc(2025, 3, 10, 12, 0));
        assert_eq!(at.with_timezone(&America::New_York).weekday(), Weekday::Mon);
    }

    #[test]
    fn weekly_uses_local_date_not_utc_date() {
        // Sunday 23:30 UTC is Monday 08:30 in Tokyo, already past 08:00.
        let now = utc(2025, 3, 9, 23, 30);
        let at = compute_scheduled_time(now, Asia::Tokyo, DigestFrequency::Weekly);
        assert_eq!(at, utc(2025, 3, 16, 23, 0));
        assert_eq!(period_key(at, Asia::Tokyo, PeriodGranularity::Day), "2025-03-17");
    }

    #[test]
    fn monthly_targets_the_first() {
        let now = utc(2025, 1, 15, 0, 0);
        let at = compute_scheduled_time(now, Asia::Kolkata, DigestFrequency::Monthly);
        // 08:00 IST is 02:30 UTC.
        assert_eq!(at, utc(2025, 2, 1, 2, 30));
    }

    #[test]
    fn monthly_on_the_first_before_eight_is_same_day() {
        let now = utc(2025, 2, 1, 1, 0);
        let at = compute_scheduled_time(now, Asia::Kolkata, DigestFrequency::Monthly);
        assert_eq!(at, utc(2025, 2, 1, 2, 30));
    }

    #[test]
    fn reminder_targets_the_fifteenth() {
        let now = utc(2025, 1, 20, 9, 0);
        let at = compute_reminder_time(now, Europe::Berlin);
        assert_eq!(at, utc(2025, 2, 15, 7, 0));
        assert_eq!(period_key(at, Europe::Berlin, PeriodGranularity::Month), "2025-02");
    }

    #[test]
    fn key_is_stable_within_a_week() {
        let tz = Europe::Berlin;
        let monday_a = compute_scheduled_time(utc(2025, 3, 4, 9, 0), tz, DigestFrequency::Weekly);
        let monday_b = compute_scheduled_time(utc(2025, 3, 8, 22, 0), tz, DigestFrequency::Weekly);
        let key_a = compute_idempotency_key(42, "digest", &period_key(monday_a, tz, PeriodGranularity::Day));
        let key_b = compute_idempotency_key(42, "digest", &period_key(monday_b, tz, PeriodGranularity::Day));
        assert_eq!(key_a, key_b);
        assert_eq!(key_a, "42:digest:2025-03-10");
    }

    #[test]
    fn utc_timezone_is_plain() {
        let now = utc(2025, 6, 1, 9, 0);
        let at = compute_scheduled_time(now, Tz::UTC, DigestFrequency::Daily);
        assert_eq!(at, utc(2025, 6, 2, 8, 0));
    }
}
