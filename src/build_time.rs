//! The moment this crate was built.
//!
//! `build.rs` records the build date and time in the compiler-style layout
//! `"Mmm DD YYYY"` / `"HH:MM:SS"`. A clock with nothing better to go on
//! starts from here, which is always closer to the truth than the epoch.

use crate::calendar::CalendarRecord;

/// Build date, e.g. `"Mar 14 2024"`.
pub const DATE: &str = env!("TIMESOURCE_BUILD_DATE");

/// Build time, e.g. `"15:30:00"`.
pub const TIME: &str = env!("TIMESOURCE_BUILD_TIME");

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// The build timestamp as a calendar record.
///
/// Falls back to the epoch if the stamped strings cannot be parsed or name
/// a year before 2000.
pub fn record() -> CalendarRecord {
    match parse(DATE, TIME) {
        Some(record) if record.is_valid() => record,
        _ => {
            warn!("unusable build timestamp, using epoch");
            CalendarRecord::default()
        }
    }
}

/// Parses a `"Mmm DD YYYY"` date and a `"HH:MM:SS"` time.
///
/// An unknown month name counts as January. The result is normalized, so
/// out-of-range numbers carry rather than fail.
pub fn parse(date: &str, time: &str) -> Option<CalendarRecord> {
    let mut date_parts = date.split_whitespace();
    let month_name = date_parts.next()?;
    let day: u8 = date_parts.next()?.parse().ok()?;
    let year: u16 = date_parts.next()?.parse().ok()?;

    let month = MONTHS
        .iter()
        .position(|m| *m == month_name)
        .map_or(1, |i| i as u8 + 1);

    let mut time_parts = time.trim().split(':');
    let hour: u8 = time_parts.next()?.parse().ok()?;
    let minute: u8 = time_parts.next()?.parse().ok()?;
    let second: u8 = time_parts.next()?.parse().ok()?;

    Some(CalendarRecord::new(year, month, day, hour, minute, second))
}
