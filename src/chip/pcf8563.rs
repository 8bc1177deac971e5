//! PCF8563 register map and calendar codec.
//!
//! The calendar starts at 0x02 and stores the date before the weekday. Bit
//! 7 of the seconds register is the voltage-low (VL) flag, cleared by any
//! write of the seconds register. Bit 7 of the month register is the
//! century flag: clear for 20xx, set for 19xx. The weekday register counts
//! 0-6 from Sunday. There is no 12-hour mode.

use bitfield::bitfield;

use crate::bcd;
use crate::calendar::{self, CalendarError, CalendarRecord};
use crate::chip::{check_year, digits, finish_decode};
use crate::registers::{Date, Hours, Minutes, Month, Seconds, Weekday, Year};

/// Register addresses used by this crate.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Control/status 1 register
    ControlStatus1 = 0x00,
    /// Control/status 2 register
    ControlStatus2 = 0x01,
    /// Seconds register (0-59) with voltage-low flag
    VlSeconds = 0x02,
    /// Minutes register (0-59)
    Minutes = 0x03,
    /// Hours register (0-23)
    Hours = 0x04,
    /// Date register (1-31)
    Days = 0x05,
    /// Weekday register (0-6)
    Weekdays = 0x06,
    /// Month register (1-12) with century flag
    CenturyMonths = 0x07,
    /// Year register (0-99)
    Years = 0x08,
}

/// Default I2C address.
pub const ADDRESS: u8 = 0x51;

pub(crate) const MAX_YEAR: u16 = 2099;

fn to_native_weekday(weekday: u8) -> u8 {
    weekday - 1
}

fn from_native_weekday(native: u8) -> u8 {
    native + 1
}

bitfield! {
    /// Control/status 1 register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct ControlStatus1(u8);
    impl Debug;
    /// External clock test mode
    pub test1, set_test1: 7;
    /// RTC clock stopped; all dividers held in reset
    pub stop, set_stop: 5;
    /// Power-on reset override
    pub testc, set_testc: 3;
}
from_register_u8!(ControlStatus1);

/// Encodes a record into the seven calendar registers, starting at
/// [`RegAddr::VlSeconds`].
pub(crate) fn encode(record: &CalendarRecord) -> Result<[u8; 7], CalendarError> {
    record.validate()?;
    let offset = check_year(record.year, MAX_YEAR)?;

    let mut seconds = Seconds::default();
    seconds.set_bcd(bcd::encode(record.second));
    let mut minutes = Minutes::default();
    minutes.set_bcd(bcd::encode(record.minute));
    let mut hours = Hours::default();
    hours.set_bcd24(bcd::encode(record.hour));
    let mut date = Date::default();
    date.set_bcd(bcd::encode(record.day));
    let mut day = Weekday::default();
    day.set_day(to_native_weekday(calendar::weekday(
        record.year,
        record.month,
        record.day,
    )));
    let mut month = Month::default();
    month.set_bcd(bcd::encode(record.month));
    month.set_century(false);
    let mut year = Year::default();
    year.set_bcd(bcd::encode(offset));

    Ok([
        seconds.into(),
        minutes.into(),
        hours.into(),
        date.into(),
        day.into(),
        month.into(),
        year.into(),
    ])
}

/// Decodes the seven calendar registers into a record.
///
/// A set century flag decodes to 19xx, which is outside the supported range
/// and reported as [`CalendarError::YearNotAfter1999`].
pub(crate) fn decode(data: [u8; 7]) -> Result<CalendarRecord, CalendarError> {
    let seconds = Seconds::from(data[0]);
    if seconds.stop_flag() {
        debug!("PCF8563: voltage-low flag set, clock integrity not guaranteed");
    }
    let month = Month::from(data[5]);
    let century: u16 = if month.century() { 1900 } else { 2000 };
    let record = CalendarRecord {
        year: century + u16::from(digits(Year::from(data[6]).bcd())?),
        month: digits(month.bcd())?,
        day: digits(Date::from(data[3]).bcd())?,
        hour: digits(Hours::from(data[2]).bcd24())?,
        minute: digits(Minutes::from(data[1]).bcd())?,
        second: digits(seconds.bcd())?,
        weekday: 0,
    };
    finish_decode(
        record,
        from_native_weekday(Weekday::from(data[4]).day()),
        MAX_YEAR,
    )
}
