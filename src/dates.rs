//! Dates are stored as normalized ISO calendar dates and epoch-millisecond
//! timestamps; display strings are derived at render time so that locale
//! formatting never leaks into query keys.

use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const DISPLAY_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[day] [month repr:short], [year]");

/// Render a date for display, e.g. `"01 Jan, 2025"`.
pub fn display_date(date: Date) -> String {
    date.format(&DISPLAY_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// The full month name for a date, e.g. `"January"`.
///
/// Used for the payment month label, which is computed once at creation
/// time and stored with the payment.
pub fn month_name(date: Date) -> String {
    date.month().to_string()
}

/// Today's date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// The current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    let now = OffsetDateTime::now_utc();
    now.unix_timestamp() * 1_000 + i64::from(now.millisecond())
}

/// Epoch milliseconds for midnight at the start of `date` (UTC).
pub fn start_of_day_millis(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp() * 1_000
}

/// The inclusive epoch-millisecond boundaries covering whole days from
/// `start` through `end`.
///
/// The upper bound is the last millisecond of `end`, so a `BETWEEN` query
/// over the result includes every timestamp recorded on the end date.
pub fn day_range_millis(start: Date, end: Date) -> (i64, i64) {
    let first = start_of_day_millis(start);
    let last = start_of_day_millis(end) + 86_400_000 - 1;
    (first, last)
}

#[cfg(test)]
mod display_tests {
    use time::macros::date;

    use super::{display_date, month_name};

    #[test]
    fn display_date_is_zero_padded() {
        assert_eq!(display_date(date!(2025 - 01 - 01)), "01 Jan, 2025");
    }

    #[test]
    fn display_date_uses_short_month() {
        assert_eq!(display_date(date!(2024 - 12 - 31)), "31 Dec, 2024");
    }

    #[test]
    fn month_name_is_full() {
        assert_eq!(month_name(date!(2025 - 01 - 15)), "January");
        assert_eq!(month_name(date!(2025 - 09 - 15)), "September");
    }
}
