//! Human readable renderings of a [`CalendarRecord`].
//!
//! All renderings are `core::fmt::Display` adapters, so they can be written
//! straight into a display driver, a `heapless::String` or a log line
//! without allocating.
//!
//! ```rust
//! use timesource::CalendarRecord;
//!
//! let now = CalendarRecord::new(2024, 3, 14, 9, 5, 7);
//! let mut line = String::new();
//! core::fmt::write(&mut line, format_args!("{} {}", now.date(), now.time())).unwrap();
//! assert_eq!(line, "14/03/2024 09:05");
//! ```

use core::fmt;

use crate::calendar::CalendarRecord;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// `HH:MM`, optionally blinking the separator on odd seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HourMinute {
    hour: u8,
    minute: u8,
    separator: char,
}

impl fmt::Display for HourMinute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}{:02}", self.hour, self.separator, self.minute)
    }
}

/// `DD/MM`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DayMonth {
    day: u8,
    month: u8,
}

impl fmt::Display for DayMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.day, self.month)
    }
}

/// `DD/MM/YYYY`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Date {
    day: u8,
    month: u8,
    year: u16,
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

/// `DD/MM/YYYY HH:MM:SS`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DateTime(CalendarRecord);

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(
            f,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            r.day, r.month, r.year, r.hour, r.minute, r.second
        )
    }
}

impl CalendarRecord {
    /// Hours and minutes as `HH:MM`.
    pub fn time(&self) -> HourMinute {
        HourMinute {
            hour: self.hour,
            minute: self.minute,
            separator: ':',
        }
    }

    /// Hours and minutes for a blinking-colon display.
    ///
    /// The colon is shown on even seconds and replaced by a space on odd
    /// seconds, so refreshing once a second makes it blink.
    pub fn ticking_time(&self) -> HourMinute {
        HourMinute {
            separator: if self.second % 2 == 0 { ':' } else { ' ' },
            ..self.time()
        }
    }

    /// Day and month as `DD/MM`.
    pub fn day_month(&self) -> DayMonth {
        DayMonth {
            day: self.day,
            month: self.month,
        }
    }

    /// Full date as `DD/MM/YYYY`.
    pub fn date(&self) -> Date {
        Date {
            day: self.day,
            month: self.month,
            year: self.year,
        }
    }

    /// Date and time as `DD/MM/YYYY HH:MM:SS`.
    pub fn date_time(&self) -> DateTime {
        DateTime(*self)
    }

    /// English name of the weekday, or `"Unknown"` outside 1-7.
    pub fn weekday_name(&self) -> &'static str {
        match self.weekday {
            1..=7 => WEEKDAY_NAMES[usize::from(self.weekday - 1)],
            _ => "Unknown",
        }
    }
}

impl fmt::Display for CalendarRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.date_time(), f)
    }
}
