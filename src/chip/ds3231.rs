//! DS3231 register map and calendar codec.
//!
//! The DS3231 keeps seconds through year at 0x00-0x06. Bit 7 of the month
//! register is the century flag, which extends the range to 2199. The
//! weekday register counts 1-7 and this crate numbers it from Monday.
//! Besides the calendar the chip has a temperature sensor and an
//! oscillator-stop flag that records a loss of power.

use bitfield::bitfield;

use crate::bcd;
use crate::calendar::{self, CalendarError, CalendarRecord, SUNDAY};
use crate::chip::{check_year, digits, finish_decode, hour_of_day};
use crate::registers::{Date, Hours, Minutes, Month, Seconds, TimeRepresentation, Weekday, Year};

/// Register addresses used by this crate.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59)
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (1-12 + AM/PM or 0-23)
    Hours = 0x02,
    /// Day register (1-7)
    Day = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12) with century flag
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register
    Control = 0x0E,
    /// Control/Status register
    ControlStatus = 0x0F,
    /// Temperature MSB register
    MSBTemp = 0x11,
    /// Temperature LSB register
    LSBTemp = 0x12,
}

/// Default I2C address.
pub const ADDRESS: u8 = 0x68;

/// Last year the two year digits plus the century flag can hold.
pub(crate) const MAX_YEAR: u16 = 2199;

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

/// Oscillator control for the DS3231 (EOSC, active low).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ocillator {
    /// Oscillator is enabled
    Enabled = 0,
    /// Oscillator is stopped while running on battery
    Disabled = 1,
}
impl From<u8> for Ocillator {
    /// Creates an Ocillator from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => Ocillator::Enabled,
            1 => Ocillator::Disabled,
            _ => panic!("Invalid value for Ocillator: {}", v),
        }
    }
}
impl From<Ocillator> for u8 {
    /// Converts an Ocillator to its raw register value.
    fn from(v: Ocillator) -> Self {
        v as u8
    }
}

bitfield! {
    /// Control register for device configuration.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// Oscillator enable/disable control
    pub from into Ocillator, oscillator_enable, set_oscillator_enable: 7, 7;
    /// Enable square wave output on battery power
    pub battery_backed_square_wave, set_battery_backed_square_wave: 6;
    /// Force temperature conversion
    pub convert_temperature, set_convert_temperature: 5;
    /// Square wave output frequency selection
    pub square_wave_frequency, set_square_wave_frequency: 4, 3;
    /// INT/SQW pin function control
    pub interrupt_control, set_interrupt_control: 2;
    /// Enable alarm 2 interrupt
    pub alarm2_interrupt_enable, set_alarm2_interrupt_enable: 1;
    /// Enable alarm 1 interrupt
    pub alarm1_interrupt_enable, set_alarm1_interrupt_enable: 0;
}
from_register_u8!(Control);

bitfield! {
    /// Status register for device state and flags.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Status(u8);
    impl Debug;
    /// Oscillator stop flag, set when the oscillator stopped (power loss)
    pub oscillator_stop_flag, set_oscillator_stop_flag: 7;
    /// Enable 32kHz output
    pub enable_32khz_output, set_enable_32khz_output: 3;
    /// Device busy flag
    pub busy, set_busy: 2;
    /// Alarm 2 triggered flag
    pub alarm2_flag, set_alarm2_flag: 1;
    /// Alarm 1 triggered flag
    pub alarm1_flag, set_alarm1_flag: 0;
}
from_register_u8!(Status);

bitfield! {
    /// Temperature register (integer part).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Temperature(u8);
    impl Debug;
    /// Temperature value (-128 to +127)
    pub i8, temperature, set_temperature: 7, 0;
}
from_register_u8!(Temperature);

bitfield! {
    /// Temperature fraction register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct TemperatureFraction(u8);
    impl Debug;
    /// Fraction in quarter degrees (0-3)
    pub quarters, set_quarters: 7, 6;
}
from_register_u8!(TemperatureFraction);

/// Encodes a record into the seven calendar registers.
pub(crate) fn encode(record: &CalendarRecord) -> Result<[u8; 7], CalendarError> {
    record.validate()?;
    let offset = check_year(record.year, MAX_YEAR)?;
    let (century, year_digits) = if offset > 99 {
        (true, offset - 100)
    } else {
        (false, offset)
    };

    let mut seconds = Seconds::default();
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
    month.set_century(century);
    let mut year = Year::default();
    year.set_bcd(bcd::encode(year_digits));

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
    let month = Month::from(data[5]);
    let century = if month.century() { 100 } else { 0 };
    let record = CalendarRecord {
        year: 2000 + century + u16::from(digits(Year::from(data[6]).bcd())?),
        month: digits(month.bcd())?,
        day: digits(Date::from(data[4]).bcd())?,
        hour: hour_of_day(Hours::from(data[2]))?,
        minute: digits(Minutes::from(data[1]).bcd())?,
        second: digits(Seconds::from(data[0]).bcd())?,
        weekday: 0,
    };
    finish_decode(
        record,
        from_native_weekday(Weekday::from(data[3]).day()),
        MAX_YEAR,
    )
}
