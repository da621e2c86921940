//! Pure dueness rules: does a definition owe a new ledger entry at `now`?
//!
//! Calendar comparisons use the UTC calendar. A definition that missed several
//! periods is due exactly once; callers never backfill.

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::domain::RecurringInterval;

pub fn is_due(interval: RecurringInterval, watermark: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match interval {
        RecurringInterval::Daily => now.date_naive() > watermark.date_naive(),
        RecurringInterval::Weekly => {
            let elapsed = now.signed_duration_since(watermark).num_milliseconds();
            elapsed >= 0 && elapsed.div_euclid(Duration::weeks(1).num_milliseconds()) >= 1
        }
        RecurringInterval::Monthly => {
            (now.year(), now.month()) > (watermark.year(), watermark.month())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn daily_boundary_crosses_midnight() {
        let watermark = at(2024, 1, 1, 23, 59, 59);
        assert!(is_due(RecurringInterval::Daily, watermark, at(2024, 1, 2, 0, 0, 1)));
        assert!(!is_due(RecurringInterval::Daily, watermark, at(2024, 1, 1, 23, 59, 0)));
    }

    #[test]
    fn daily_is_due_across_month_and_year_rollover() {
        assert!(is_due(
            RecurringInterval::Daily,
            at(2023, 12, 31, 12, 0, 0),
            at(2024, 1, 1, 0, 0, 0)
        ));
        assert!(is_due(
            RecurringInterval::Daily,
            at(2024, 1, 31, 0, 0, 0),
            at(2024, 2, 1, 0, 0, 0)
        ));
    }

    #[test]
    fn weekly_needs_a_full_week() {
        let watermark = at(2024, 1, 1, 12, 0, 0);
        assert!(!is_due(RecurringInterval::Weekly, watermark, at(2024, 1, 8, 11, 59, 59)));
        assert!(is_due(RecurringInterval::Weekly, watermark, at(2024, 1, 8, 12, 0, 0)));
        assert!(is_due(RecurringInterval::Weekly, watermark, at(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn weekly_is_not_due_when_clock_is_behind_watermark() {
        let watermark = at(2024, 1, 8, 0, 0, 0);
        assert!(!is_due(RecurringInterval::Weekly, watermark, at(2024, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn monthly_boundary_is_calendar_month() {
        let watermark = at(2024, 1, 31, 23, 0, 0);
        assert!(is_due(RecurringInterval::Monthly, watermark, at(2024, 2, 1, 0, 0, 0)));
        assert!(is_due(RecurringInterval::Monthly, at(2024, 1, 1, 0, 0, 0), at(2024, 2, 29, 0, 0, 0)));
        assert!(!is_due(RecurringInterval::Monthly, at(2024, 1, 1, 0, 0, 0), at(2024, 1, 31, 23, 59, 59)));
    }

    #[test]
    fn monthly_handles_year_rollover() {
        assert!(is_due(
            RecurringInterval::Monthly,
            at(2023, 12, 15, 0, 0, 0),
            at(2024, 1, 1, 0, 0, 0)
        ));
        assert!(!is_due(
            RecurringInterval::Monthly,
            at(2024, 3, 15, 0, 0, 0),
            at(2023, 4, 1, 0, 0, 0)
        ));
    }

    #[test]
    fn watermark_equal_to_now_is_never_due() {
        let now = at(2024, 5, 5, 5, 5, 5);
        for interval in [
            RecurringInterval::Daily,
            RecurringInterval::Weekly,
            RecurringInterval::Monthly,
        ] {
            assert!(!is_due(interval, now, now));
        }
    }
}
