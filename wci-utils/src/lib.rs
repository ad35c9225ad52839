//! Shared utility functions for WCI crates.

/// Date utility functions
pub mod dates {
    use chrono::{DateTime, Months, NaiveDate, Utc};

    /// Seconds in one day, used for fractional day offsets.
    const SECONDS_PER_DAY: f64 = 86_400.0;

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
    }

    /// Parse a date string in "YYYYMMDD" format (compact cache format)
    pub fn parse_date_compact(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y%m%d")?)
    }

    /// Parse the date formats found in cache snapshots.
    ///
    /// Accepts "YYYY-MM-DD", "YYYYMMDD" and ISO timestamps such as
    /// "2024-03-01T00:00:00Z" (only the date part is kept).
    pub fn parse_flexible(s: &str) -> anyhow::Result<NaiveDate> {
        let s = s.trim();
        if s.len() > 10 && s.as_bytes().get(10).is_some_and(|b| *b == b'T' || *b == b' ') {
            return parse_date(&s[..10]);
        }
        if s.contains('-') {
            parse_date(s)
        } else {
            parse_date_compact(s)
        }
    }

    /// The date `months` calendar months before `now`.
    ///
    /// Falls back to `NaiveDate::MIN` if the subtraction leaves chrono's range.
    pub fn months_before(now: NaiveDate, months: u32) -> NaiveDate {
        now.checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN)
    }

    /// True if `date` falls in the trailing window `(now - months, now]`.
    ///
    /// Dates in the future relative to `now` are outside every window.
    pub fn within_months(date: &NaiveDate, now: NaiveDate, months: u32) -> bool {
        *date > months_before(now, months) && *date <= now
    }

    /// Whole days between `date` and `now`. Negative for future dates.
    pub fn age_in_days(date: &NaiveDate, now: NaiveDate) -> i64 {
        (now - *date).num_days()
    }

    /// Length in days of a window of `months` months ending at `now`.
    pub fn window_days(now: NaiveDate, months: u32) -> i64 {
        (now - months_before(now, months)).num_days().max(1)
    }

    /// Fractional day offset of `at` relative to `now`.
    ///
    /// Points in the past have negative offsets.
    pub fn day_offset(at: &DateTime<Utc>, now: &DateTime<Utc>) -> f64 {
        (*at - *now).num_seconds() as f64 / SECONDS_PER_DAY
    }

}
