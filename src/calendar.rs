//! Calendar arithmetic for the clock sources.
//!
//! This module owns the canonical time value, [`CalendarRecord`], and the
//! conversions between it and [`EpochSeconds`], a plain count of seconds
//! since 2000-01-01T00:00:00.
//!
//! # Features
//!
//! - Gregorian leap-year rule and days-in-month table
//! - Weekday derivation (Zeller's congruence)
//! - Carry propagation for overflowing fields
//! - Exact, bidirectional epoch conversion for every year from 2000 on
//! - Conversion to/from chrono `NaiveDateTime`
//!
//! # Weekday convention
//!
//! Weekdays are numbered 1-7 with 1 = Sunday. Each RTC has its own native
//! numbering; the chip codecs translate at their boundary so chip values
//! never escape into a [`CalendarRecord`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Seconds elapsed since 2000-01-01T00:00:00.
pub type EpochSeconds = u64;

/// First year representable by every clock source.
pub const EPOCH_YEAR: u16 = 2000;

/// Weekday number of Sunday.
pub const SUNDAY: u8 = 1;
/// Weekday number of Monday.
pub const MONDAY: u8 = 2;
/// Weekday number of Tuesday.
pub const TUESDAY: u8 = 3;
/// Weekday number of Wednesday.
pub const WEDNESDAY: u8 = 4;
/// Weekday number of Thursday.
pub const THURSDAY: u8 = 5;
/// Weekday number of Friday.
pub const FRIDAY: u8 = 6;
/// Weekday number of Saturday.
pub const SATURDAY: u8 = 7;

pub(crate) const SECONDS_PER_DAY: u64 = 86_400;
const DAYS_PER_400_YEARS: u64 = 146_097;
const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A broken-down calendar date and time.
///
/// Fields are public so callers can adjust individual values before handing
/// the record back to a clock. Clocks normalize records they are given, so
/// an overflowing field such as `second = 75` is carried rather than
/// rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarRecord {
    /// Absolute year (2000 or later)
    pub year: u16,
    /// Month (1-12)
    pub month: u8,
    /// Day of the month (1-31)
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
    /// Day of the week (1-7, 1 = Sunday)
    pub weekday: u8,
}

impl Default for CalendarRecord {
    fn default() -> Self {
        CalendarRecord {
            year: EPOCH_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            weekday: SATURDAY,
        }
    }
}

impl CalendarRecord {
    /// Builds a normalized record with its weekday derived from the date.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let mut record = CalendarRecord {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday: 0,
        };
        normalize(&mut record);
        record
    }

    /// Converts a count of seconds since the epoch into a record.
    pub fn from_epoch_seconds(seconds: EpochSeconds) -> Self {
        from_epoch_seconds(seconds)
    }

    /// Converts this record into seconds since the epoch.
    pub fn to_epoch_seconds(&self) -> EpochSeconds {
        to_epoch_seconds(self)
    }

    /// Returns a normalized copy of this record.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        normalize(&mut self);
        self
    }

    /// Returns a copy with the weekday recomputed from year, month and day.
    #[must_use]
    pub fn with_derived_weekday(mut self) -> Self {
        self.weekday = weekday(self.year, self.month, self.day);
        self
    }

    /// Checks that every field is inside its calendar range.
    ///
    /// The weekday is not checked; it is always derivable from the date.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.year < EPOCH_YEAR {
            return Err(CalendarError::YearNotAfter1999);
        }
        if !(1..=12).contains(&self.month)
            || self.day == 0
            || self.day > days_in_month(self.year, self.month)
            || self.hour > 23
            || self.minute > 59
            || self.second > 59
        {
            return Err(CalendarError::InvalidDateTime);
        }
        Ok(())
    }

    /// Returns `true` when [`validate`](Self::validate) would succeed.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Returns `true` for Gregorian leap years.
pub const fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` of `year`.
///
/// Months outside 1-12 report 31 days rather than failing.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    if month == 2 && is_leap_year(year) {
        return 29;
    }
    if month >= 1 && month <= 12 {
        DAYS_IN_MONTH[(month - 1) as usize]
    } else {
        31
    }
}

const fn days_in_year(year: u16) -> u64 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Day of the week for a date, 1-7 with 1 = Sunday.
pub fn weekday(year: u16, month: u8, day: u8) -> u8 {
    // January and February count as months 13 and 14 of the previous year
    let (y, m) = if month < 3 {
        (i32::from(year) - 1, i32::from(month) + 12)
    } else {
        (i32::from(year), i32::from(month))
    };
    let k = y % 100;
    let j = y / 100;
    // 0 = Saturday, 1 = Sunday, ..., 6 = Friday
    let h = (i32::from(day) + (13 * (m + 1)) / 5 + k + k / 4 + j / 4 + 5 * j).rem_euclid(7);
    ((h + 6) % 7 + 1) as u8
}

/// Carries overflowing fields upward until every field is in range.
///
/// Seconds carry into minutes, minutes into hours, hours into days, days
/// into months and months into years. The weekday advances once for every
/// day carried out of the hour field; a weekday outside 1-7 is rederived
/// from the resulting date. A day of zero is left untouched.
pub fn normalize(record: &mut CalendarRecord) {
    let mut second = u32::from(record.second);
    let mut minute = u32::from(record.minute);
    let mut hour = u32::from(record.hour);

    minute += second / 60;
    second %= 60;
    hour += minute / 60;
    minute %= 60;
    let carried_days = hour / 24;
    hour %= 24;

    let mut day = u32::from(record.day) + carried_days;
    let mut month = record.month;
    let mut year = record.year;

    while month > 12 {
        month -= 12;
        year = year.saturating_add(1);
    }
    loop {
        let length = u32::from(days_in_month(year, month));
        if day <= length {
            break;
        }
        day -= length;
        month += 1;
        if month > 12 {
            month = 1;
            year = year.saturating_add(1);
        }
    }

    record.second = second as u8;
    record.minute = minute as u8;
    record.hour = hour as u8;
    record.day = day as u8;
    record.month = month;
    record.year = year;

    record.weekday = if (1..=7).contains(&record.weekday) {
        ((u32::from(record.weekday) - 1 + carried_days % 7) % 7 + 1) as u8
    } else {
        weekday(year, month, record.day)
    };
}

/// Seconds since the epoch for a record.
///
/// Years before 2000 count as 2000 and a day of zero counts as the first.
pub fn to_epoch_seconds(record: &CalendarRecord) -> EpochSeconds {
    let mut days: u64 = 0;
    for year in EPOCH_YEAR..record.year {
        days += days_in_year(year);
    }
    for month in 1..record.month {
        days += u64::from(days_in_month(record.year, month));
    }
    days += u64::from(record.day.saturating_sub(1));

    days * SECONDS_PER_DAY
        + u64::from(record.hour) * 3600
        + u64::from(record.minute) * 60
        + u64::from(record.second)
}

/// Calendar record for a count of seconds since the epoch.
///
/// Years past `u16::MAX` saturate.
pub fn from_epoch_seconds(seconds: EpochSeconds) -> CalendarRecord {
    let mut days = seconds / SECONDS_PER_DAY;
    let mut rest = seconds % SECONDS_PER_DAY;

    // 400-year blocks starting at 2000 all share the same leap pattern
    let cycles = days / DAYS_PER_400_YEARS;
    days %= DAYS_PER_400_YEARS;

    let mut year = EPOCH_YEAR;
    while days >= days_in_year(year) {
        days -= days_in_year(year);
        year += 1;
    }

    let mut month = 1;
    while days >= u64::from(days_in_month(year, month)) {
        days -= u64::from(days_in_month(year, month));
        month += 1;
    }

    let hour = rest / 3600;
    rest %= 3600;
    let minute = rest / 60;
    let second = rest % 60;

    let year = u16::try_from(u64::from(year) + cycles * 400).unwrap_or(u16::MAX);
    let day = days as u8 + 1;

    CalendarRecord {
        year,
        month,
        day,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
        weekday: weekday(year, month, day),
    }
}

impl TryFrom<CalendarRecord> for NaiveDateTime {
    type Error = CalendarError;

    fn try_from(record: CalendarRecord) -> Result<Self, Self::Error> {
        NaiveDate::from_ymd_opt(
            i32::from(record.year),
            u32::from(record.month),
            u32::from(record.day),
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(record.hour),
                u32::from(record.minute),
                u32::from(record.second),
            )
        })
        .ok_or(CalendarError::InvalidDateTime)
    }
}

impl TryFrom<NaiveDateTime> for CalendarRecord {
    type Error = CalendarError;

    fn try_from(datetime: NaiveDateTime) -> Result<Self, Self::Error> {
        if datetime.year() < i32::from(EPOCH_YEAR) {
            return Err(CalendarError::YearNotAfter1999);
        }
        let year = u16::try_from(datetime.year()).map_err(|_| CalendarError::YearOutOfRange)?;
        Ok(CalendarRecord {
            year,
            month: datetime.month() as u8,
            day: datetime.day() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
            // leap-second representation folds into :59
            second: datetime.second().min(59) as u8,
            weekday: datetime.weekday().number_from_sunday() as u8,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while validating or converting calendar values.
pub enum CalendarError {
    /// A field is outside its calendar range or the date does not exist
    InvalidDateTime,
    /// The year is before 2000
    YearNotAfter1999,
    /// The year is past what the target can store
    YearOutOfRange,
}
