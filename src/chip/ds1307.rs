//! DS1307 register map and calendar codec.
//!
//! Same register order as the DS3231 but no century flag, so years stop at
//! 2099. Bit 7 of the seconds register is the clock-halt (CH) bit: while it
//! is set the oscillator is stopped, which is how the chip powers up after
//! losing its battery.

use crate::bcd;
use crate::calendar::{self, CalendarError, CalendarRecord, SUNDAY};
use crate::chip::{check_year, digits, finish_decode, hour_of_day};
use crate::registers::{Date, Hours, Minutes, Month, Seconds, TimeRepresentation, Weekday, Year};

/// Register addresses used by this crate.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59) with clock-halt bit
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (1-12 + AM/PM or 0-23)
    Hours = 0x02,
    /// Day register (1-7)
    Day = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12)
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
}

/// Default I2C address.
pub const ADDRESS: u8 = 0x68;

pub(crate) const MAX_YEAR: u16 = 2099;

/// Weekday register value for Sunday; Monday is 1.
const NATIVE_SUNDAY: u8 = 7;

fn to_native_weekday(weekday: u8) -> u8 {
    if weekday == SUNDAY {
        NATIVE_SUNDAY
    } else {
        weekday - 1
    }
}

fn from_native_weekday(native: u8) -> u8 {
    if native == NATIVE_SUNDAY {
        SUNDAY
    } else {
        native + 1
    }
}

/// Encodes a record into the seven calendar registers.
///
/// The clock-halt bit is written clear, so setting the time also starts
/// the oscillator.
pub(crate) fn encode(record: &CalendarRecord) -> Result<[u8; 7], CalendarError> {
    record.validate()?;
    let offset = check_year(record.year, MAX_YEAR)?;

    let mut seconds = Seconds::default();
    seconds.set_stop_flag(false);
    seconds.set_bcd(bcd::encode(record.second));
    let mut minutes = Minutes::default();
    minutes.set_bcd(bcd::encode(record.minute));
    let mut hours = Hours::default();
    hours.set_time_representation(TimeRepresentation::TwentyFourHour);
    hours.set_bcd24(bcd::encode(record.hour));
    let mut day = Weekday::default();
    day.set_day(to_native_weekday(calendar::weekday(
        record.year,
        record.month,
        record.day,
    )));
    let mut date = Date::default();
    date.set_bcd(bcd::encode(record.day));
    let mut month = Month::default();
    month.set_bcd(bcd::encode(record.month));
    let mut year = Year::default();
    year.set_bcd(bcd::encode(offset));

    Ok([
        seconds.into(),
        minutes.into(),
        hours.into(),
        day.into(),
        date.into(),
        month.into(),
        year.into(),
    ])
}

/// Decodes the seven calendar registers into a record.
pub(crate) fn decode(data: [u8; 7]) -> Result<CalendarRecord, CalendarError> {
    let seconds = Seconds::from(data[0]);
    if seconds.stop_flag() {
        debug!("DS1307: clock halt bit set while reading");
    }
    let record = CalendarRecord {
        year: 2000 + u16::from(digits(Year::from(data[6]).bcd())?),
        month: digits(Month::from(data[5]).bcd())?,
        day: digits(Date::from(data[4]).bcd())?,
        hour: hour_of_day(Hours::from(data[2]))?,
        minute: digits(Minutes::from(data[1]).bcd())?,
        second: digits(seconds.bcd())?,
        weekday: 0,
    };
    finish_decode(
        record,
        from_native_weekday(Weekday::from(data[3]).day()),
        MAX_YEAR,
    )
}
