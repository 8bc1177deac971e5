//! Register layouts shared by the supported RTCs.
//!
//! DS3231, DS1307 and PCF8563 all keep their calendar in seven consecutive
//! BCD registers. The digits sit in the same bit positions on all three;
//! what differs is the order of the registers, the flag bits squeezed in
//! next to the digits and the weekday numbering. This module defines the
//! common bitfield shapes. Chip specific registers live with their codec
//! under [`crate::chip`].

use bitfield::bitfield;

/// Hour register format on chips that support a 12-hour mode.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeRepresentation {
    /// 24-hour format (0-23)
    TwentyFourHour = 0,
    /// 12-hour format (1-12 + AM/PM)
    TwelveHour = 1,
}
impl From<u8> for TimeRepresentation {
    /// Creates a `TimeRepresentation` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => TimeRepresentation::TwentyFourHour,
            1 => TimeRepresentation::TwelveHour,
            _ => panic!("Invalid value for TimeRepresentation: {}", v),
        }
    }
}
impl From<TimeRepresentation> for u8 {
    /// Converts a `TimeRepresentation` to its raw register value.
    fn from(v: TimeRepresentation) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register (0-59).
    ///
    /// Bit 7 is the DS1307 clock-halt (CH) bit and the PCF8563
    /// voltage-low (VL) bit. It is unused on the DS3231.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Chip specific stop/integrity flag
    pub stop_flag, set_stop_flag: 7;
    /// Seconds as two BCD digits
    pub bcd, set_bcd: 6, 0;
}
from_register_u8!(Seconds);

bitfield! {
    /// Minutes register (0-59).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// Minutes as two BCD digits
    pub bcd, set_bcd: 6, 0;
}
from_register_u8!(Minutes);

bitfield! {
    /// Hours register with format selection.
    ///
    /// The PCF8563 has no 12-hour mode; only [`bcd24`](Self::bcd24) is
    /// meaningful there.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// Time representation format (12/24 hour)
    pub from into TimeRepresentation, time_representation, set_time_representation: 6, 6;
    /// PM flag (12-hour) or 20-hour bit (24-hour)
    pub pm_or_twenty_hours, set_pm_or_twenty_hours: 5, 5;
    /// Tens place of hours
    pub ten_hours, set_ten_hours: 4, 4;
    /// Ones place of hours
    pub hours, set_hours: 3, 0;
    /// Hours as two BCD digits in 24-hour format
    pub bcd24, set_bcd24: 5, 0;
}
from_register_u8!(Hours);

impl Hours {
    /// Decoded hour of day (0-23) regardless of the register format.
    pub fn hour_of_day(&self) -> u8 {
        let hours = 10 * self.ten_hours() + self.hours();
        match self.time_representation() {
            TimeRepresentation::TwentyFourHour => hours + 20 * self.pm_or_twenty_hours(),
            TimeRepresentation::TwelveHour => {
                let is_pm = self.pm_or_twenty_hours() != 0;
                match (hours, is_pm) {
                    (12, false) => 0,    // 12 AM = 0:xx
                    (12, true) => 12,    // 12 PM = 12:xx
                    (h, false) => h,     // 1-11 AM = 1-11:xx
                    (h, true) => h + 12, // 1-11 PM = 13-23:xx
                }
            }
        }
    }
}

bitfield! {
    /// Day of week register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Weekday(u8);
    impl Debug;
    /// Day of week in the chip's own numbering
    pub day, set_day: 2, 0;
}
from_register_u8!(Weekday);

bitfield! {
    /// Date register (1-31).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Date(u8);
    impl Debug;
    /// Date as two BCD digits
    pub bcd, set_bcd: 5, 0;
}
from_register_u8!(Date);

bitfield! {
    /// Month register (1-12) with century flag.
    ///
    /// On the DS3231 a set century flag means 21xx. On the PCF8563 it means
    /// 19xx. The DS1307 has no century flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Month(u8);
    impl Debug;
    /// Century flag
    pub century, set_century: 7;
    /// Month as two BCD digits
    pub bcd, set_bcd: 4, 0;
}
from_register_u8!(Month);

bitfield! {
    /// Year register (0-99).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Year(u8);
    impl Debug;
    /// Year within the century as two BCD digits
    pub bcd, set_bcd: 7, 0;
}
from_register_u8!(Year);
