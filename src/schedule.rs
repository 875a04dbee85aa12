use chrono::{Duration, Months, NaiveDate};

use crate::models::Frequency;

/// Next occurrence of an obligation due on `date`.
///
/// Month and year steps clip to the last day of a short target month
/// (Jan 31 -> Feb 28, or Feb 29 in a leap year; Feb 29 + 1 year -> Feb 28).
pub fn next_due(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Weekly => date + Duration::days(7),
        Frequency::Monthly => add_months(date, 1),
        Frequency::Yearly => add_months(date, 12),
    }
}

/// `date` shifted forward by `n` calendar months, clipped to month end.
pub fn add_months(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_add_months(Months::new(n)).unwrap_or(NaiveDate::MAX)
}

/// Calendar month key (`YYYY-MM`) a due date belongs to.
pub fn cycle_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
