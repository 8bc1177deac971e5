//! Date and time for small embedded systems, from either a software clock
//! or an I2C real-time clock.
//!
//! [`TimeSource`] presents one calendar interface over two kinds of clock:
//!
//! * [`SoftwareClock`] integrates a millisecond tick counter, corrected by
//!   a drift factor and saved to persistent storage so it survives a
//!   restart.
//! * [`RegisterCodec`] reads and writes the calendar registers of a DS3231,
//!   DS1307 or PCF8563 over any [`embedded_hal::i2c::I2c`] bus.
//!
//! The active clock is chosen at construction and can be changed later with
//! [`TimeSource::switch_mode`], which carries the current time over.
//!
//! Times are exchanged as [`CalendarRecord`]s. Weekdays run 1-7 starting
//! on Sunday whatever the chip stores natively. Supported years start at
//! 2000.
//!
//! # Example
//!
//! ```rust,ignore
//! use timesource::{ChipKind, ClockConfig, RegisterCodec, SoftwareClock, TimeSource};
//!
//! let soft = SoftwareClock::new(ticks, eeprom, ClockConfig::default());
//! let rtc = RegisterCodec::new(i2c, ChipKind::Ds3231);
//! let mut clock = TimeSource::external(soft, rtc);
//! clock.begin()?;
//! let now = clock.now()?;
//! println!("{} {}", now.weekday_name(), now.date_time());
//! ```
//!
//! # Features
//!
//! * `log`: log through the `log` facade
//! * `defmt`: log through `defmt` and derive `defmt::Format`
//! * `temperature_f32`: [`TemperatureReading::as_f32`]
#![no_std]

#[macro_use]
mod fmt;
#[macro_use]
mod registers;

pub mod bcd;
pub mod build_time;
pub mod calendar;
pub mod chip;
pub mod format;
pub mod soft_clock;

use embedded_hal::i2c::I2c;

pub use calendar::{CalendarError, CalendarRecord, EpochSeconds};
pub use chip::{ChipKind, RegisterCodec, TemperatureReading};
pub use soft_clock::{ClockConfig, ClockState, SoftwareClock, Storage, TickSource};

/// Errors reported by a [`TimeSource`] or [`RegisterCodec`].
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// No device acknowledged at the configured address
    BusUnavailable,
    /// An I2C transfer failed part way
    BusTransactionFailed(E),
    /// The active clock cannot do this
    UnsupportedCapability,
    /// A calendar value was invalid or out of range
    DateTime(CalendarError),
    /// A drift factor was NaN or outside the plausible band
    InvalidDriftFactor,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::BusTransactionFailed(e)
    }
}

/// Which clock a [`TimeSource`] reads and writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// The software clock
    Internal,
    /// The I2C real-time clock
    External,
}

/// One calendar interface over a software clock and an optional RTC chip.
pub struct TimeSource<I2C: I2c, T: TickSource, S: Storage> {
    soft: SoftwareClock<T, S>,
    rtc: Option<RegisterCodec<I2C>>,
    mode: Mode,
    initialized: bool,
    last: CalendarRecord,
}

impl<I2C: I2c, T: TickSource, S: Storage> TimeSource<I2C, T, S> {
    /// A time source that only has the software clock.
    pub fn internal(soft: SoftwareClock<T, S>) -> Self {
        Self {
            soft,
            rtc: None,
            mode: Mode::Internal,
            initialized: false,
            last: CalendarRecord::default(),
        }
    }

    /// A time source reading the RTC chip.
    pub fn external(soft: SoftwareClock<T, S>, rtc: RegisterCodec<I2C>) -> Self {
        Self::new(soft, rtc, Mode::External)
    }

    /// A time source with both clocks, starting in `mode`.
    pub fn new(soft: SoftwareClock<T, S>, rtc: RegisterCodec<I2C>, mode: Mode) -> Self {
        Self {
            soft,
            rtc: Some(rtc),
            mode,
            initialized: false,
            last: CalendarRecord::default(),
        }
    }

    /// Starts the active clock.
    ///
    /// In external mode the chip must acknowledge a probe before its
    /// oscillator is (re)started, otherwise [`Error::BusUnavailable`] is
    /// returned. Calling this again once it succeeded does nothing.
    pub fn begin(&mut self) -> Result<(), Error<I2C::Error>> {
        if self.initialized {
            return Ok(());
        }
        match self.mode {
            Mode::Internal => self.soft.begin(),
            Mode::External => {
                let rtc = self.rtc_mut()?;
                if !rtc.probe() {
                    error!("no RTC answering at {:#x}", rtc.address());
                    return Err(Error::BusUnavailable);
                }
                rtc.initialize()?;
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// The clock currently in use.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the active clock is ticking.
    ///
    /// In external mode this probes the bus; in internal mode it reports
    /// whether the software clock has a baseline.
    pub fn is_running(&mut self) -> bool {
        match self.mode {
            Mode::Internal => self.soft.is_running(),
            Mode::External => self.rtc.as_mut().is_some_and(|rtc| rtc.probe()),
        }
    }

    /// Reads the current time from the active clock.
    ///
    /// On failure the last known time is left as it was.
    pub fn now(&mut self) -> Result<CalendarRecord, Error<I2C::Error>> {
        let record = match self.mode {
            Mode::Internal => self.soft.now(),
            Mode::External => self.rtc_mut()?.read_calendar()?,
        };
        self.last = record;
        Ok(record)
    }

    /// The time returned by the last successful read or write.
    pub fn last_known(&self) -> CalendarRecord {
        self.last
    }

    /// Sets the active clock.
    ///
    /// The record is normalized and its weekday derived from the date
    /// before it is checked and stored.
    pub fn set(&mut self, record: &CalendarRecord) -> Result<(), Error<I2C::Error>> {
        let record = record.normalized().with_derived_weekday();
        record.validate().map_err(Error::DateTime)?;
        match self.mode {
            Mode::Internal => self.soft.set(&record),
            Mode::External => self.rtc_mut()?.write_calendar(&record)?,
        }
        self.last = record;
        Ok(())
    }

    /// Sets the active clock from individual fields.
    pub fn set_date_time(
        &mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.set(&CalendarRecord::new(year, month, day, hour, minute, second))
    }

    /// Sets the active clock to the moment the crate was built.
    pub fn set_from_build_time(&mut self) -> Result<(), Error<I2C::Error>> {
        self.set(&build_time::record())
    }

    /// Current year.
    pub fn year(&mut self) -> Result<u16, Error<I2C::Error>> {
        Ok(self.now()?.year)
    }

    /// Current month (1-12).
    pub fn month(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.month)
    }

    /// Current day of the month (1-31).
    pub fn day(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.day)
    }

    /// Current hour (0-23).
    pub fn hour(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.hour)
    }

    /// Current minute (0-59).
    pub fn minute(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.minute)
    }

    /// Current second (0-59).
    pub fn second(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.second)
    }

    /// Current weekday (1-7, 1 is Sunday).
    pub fn weekday(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.now()?.weekday)
    }

    /// Shifts the software clock by `offset_ms`.
    pub fn adjust(&mut self, offset_ms: i64) -> Result<(), Error<I2C::Error>> {
        self.require_internal()?;
        self.soft.adjust(offset_ms);
        Ok(())
    }

    /// Sets the software clock's drift factor.
    pub fn calibrate(&mut self, factor: f32) -> Result<(), Error<I2C::Error>> {
        self.require_internal()?;
        self.soft
            .calibrate(factor)
            .map_err(|_| Error::InvalidDriftFactor)
    }

    /// The software clock's correction in milliseconds per hour.
    pub fn drift_ms_per_hour(&self) -> Result<f32, Error<I2C::Error>> {
        self.require_internal()?;
        Ok(self.soft.drift_ms_per_hour())
    }

    /// Reads the RTC temperature sensor (DS3231 only).
    pub fn temperature(&mut self) -> Result<TemperatureReading, Error<I2C::Error>> {
        self.active_rtc()?.temperature()
    }

    /// Whether the RTC lost power since its time was last set (DS3231 only).
    pub fn lost_power(&mut self) -> Result<bool, Error<I2C::Error>> {
        self.active_rtc()?.lost_power()
    }

    /// Makes `target` the active clock and copies the current time to it.
    ///
    /// The time is read from the clock being left, the new clock is
    /// started and then set. Whole seconds carry over; the software
    /// clock's sub-second remainder does not. If any step fails the
    /// previous mode stays active.
    pub fn switch_mode(&mut self, target: Mode) -> Result<(), Error<I2C::Error>> {
        if target == self.mode {
            return Ok(());
        }
        if self.rtc.is_none() {
            return Err(Error::UnsupportedCapability);
        }
        let record = self.now()?;
        let previous = (self.mode, self.initialized);
        self.mode = target;
        self.initialized = false;
        let result = self.begin().and_then(|()| self.set(&record));
        if result.is_err() {
            warn!("switching to {:?} failed", target);
            (self.mode, self.initialized) = previous;
        } else {
            info!("switched to {:?}", target);
        }
        result
    }

    /// Gives back the clocks.
    pub fn release(self) -> (SoftwareClock<T, S>, Option<RegisterCodec<I2C>>) {
        (self.soft, self.rtc)
    }

    fn rtc_mut(&mut self) -> Result<&mut RegisterCodec<I2C>, Error<I2C::Error>> {
        self.rtc.as_mut().ok_or(Error::UnsupportedCapability)
    }

    fn active_rtc(&mut self) -> Result<&mut RegisterCodec<I2C>, Error<I2C::Error>> {
        match self.mode {
            Mode::Internal => Err(Error::UnsupportedCapability),
            Mode::External => self.rtc_mut(),
        }
    }

    fn require_internal(&self) -> Result<(), Error<I2C::Error>> {
        match self.mode {
            Mode::Internal => Ok(()),
            Mode::External => Err(Error::UnsupportedCapability),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use crate::soft_clock::tests::{state, FakeStorage, FakeTicks};
    use alloc::vec;
    use alloc::vec::Vec;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x68;

    // 2024-03-14 15:30:00 in DS3231 register order
    const REGISTERS: [u8; 7] = [0x00, 0x30, 0x15, 0x04, 0x14, 0x03, 0x24];

    fn record() -> CalendarRecord {
        CalendarRecord::new(2024, 3, 14, 15, 30, 0)
    }

    fn soft_clock<'a>(
        ticks: &'a FakeTicks,
        storage: &'a mut FakeStorage,
    ) -> SoftwareClock<&'a FakeTicks, &'a mut FakeStorage> {
        SoftwareClock::new(ticks, storage, ClockConfig::default())
    }

    #[test]
    fn test_begin_probes_and_initializes_once() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0E], vec![0x1C]),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        clock.begin().unwrap();
        clock.begin().unwrap();
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_begin_without_device() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![]).with_error(ErrorKind::Other),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        assert!(matches!(clock.begin(), Err(Error::BusUnavailable)));
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_external_read_and_field_getters() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], Vec::from(REGISTERS)),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], Vec::from(REGISTERS)),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], Vec::from(REGISTERS)),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        assert_eq!(clock.now().unwrap(), record());
        assert_eq!(clock.year().unwrap(), 2024);
        assert_eq!(clock.weekday().unwrap(), calendar::THURSDAY);
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_failed_read_keeps_last_known_time() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], Vec::from(REGISTERS)),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], Vec::from(REGISTERS))
                .with_error(ErrorKind::Other),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        clock.now().unwrap();
        assert!(matches!(
            clock.now(),
            Err(Error::BusTransactionFailed(ErrorKind::Other))
        ));
        assert_eq!(clock.last_known(), record());
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_external_set_normalizes() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write(
                DEVICE_ADDRESS,
                vec![0x00, 0x00, 0x30, 0x15, 0x04, 0x14, 0x03, 0x24],
            ),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0F], vec![0x00]),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        // 14:89:60 carries to 15:30:00
        clock.set_date_time(2024, 3, 14, 14, 89, 60).unwrap();
        assert_eq!(clock.last_known(), record());
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_set_rejects_dates_before_2000() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mut clock: TimeSource<I2cMock, _, _> =
            TimeSource::internal(soft_clock(&ticks, &mut storage));
        assert!(matches!(
            clock.set_date_time(1999, 12, 31, 0, 0, 0),
            Err(Error::DateTime(CalendarError::YearNotAfter1999))
        ));
        assert!(matches!(
            clock.set_date_time(2024, 3, 0, 0, 0, 0),
            Err(Error::DateTime(CalendarError::InvalidDateTime))
        ));
    }

    #[test]
    fn test_internal_clock_advances_with_ticks() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mut clock: TimeSource<I2cMock, _, _> =
            TimeSource::internal(soft_clock(&ticks, &mut storage));
        clock.begin().unwrap();
        assert!(clock.is_running());
        clock.set(&record()).unwrap();
        ticks.advance(61_500);
        assert_eq!(clock.now().unwrap(), CalendarRecord::new(2024, 3, 14, 15, 31, 1));
        assert_eq!(clock.minute().unwrap(), 31);
    }

    #[test]
    fn test_internal_only_operations() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::with_state(&state(0, 1.0));
        let mut clock: TimeSource<I2cMock, _, _> =
            TimeSource::internal(soft_clock(&ticks, &mut storage));
        clock.begin().unwrap();
        clock.adjust(5_000).unwrap();
        assert_eq!(clock.second().unwrap(), 5);
        clock.calibrate(1.05).unwrap();
        assert!(clock.drift_ms_per_hour().unwrap() > 0.0);
        assert!(matches!(
            clock.calibrate(2.0),
            Err(Error::InvalidDriftFactor)
        ));
        assert!(matches!(
            clock.temperature(),
            Err(Error::UnsupportedCapability)
        ));
        assert!(matches!(clock.lost_power(), Err(Error::UnsupportedCapability)));
        assert!(matches!(
            clock.switch_mode(Mode::External),
            Err(Error::UnsupportedCapability)
        ));
        assert_eq!(clock.mode(), Mode::Internal);
    }

    #[test]
    fn test_external_only_operations() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x11], vec![0x19, 0x40]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x0F], vec![0x80]),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        assert_eq!(clock.temperature().unwrap().quarter_degrees(), 101);
        assert!(clock.lost_power().unwrap());
        assert!(matches!(clock.adjust(10), Err(Error::UnsupportedCapability)));
        assert!(matches!(
            clock.drift_ms_per_hour(),
            Err(Error::UnsupportedCapability)
        ));
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_switch_from_external_to_internal() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::with_state(&state(0, 1.0));
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x00],
            Vec::from(REGISTERS),
        )]);
        let rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let mut clock = TimeSource::external(soft_clock(&ticks, &mut storage), rtc);
        clock.switch_mode(Mode::Internal).unwrap();
        assert_eq!(clock.mode(), Mode::Internal);
        assert_eq!(clock.now().unwrap(), record());
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_switch_from_internal_to_external() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write(0x51, vec![]),
            I2cTrans::write_read(0x51, vec![0x00], vec![0x00]),
            I2cTrans::write(0x51, vec![0x02, 0x00, 0x30, 0x15, 0x14, 0x04, 0x03, 0x24]),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        let mut clock = TimeSource::new(soft_clock(&ticks, &mut storage), rtc, Mode::Internal);
        clock.set(&record()).unwrap();
        clock.switch_mode(Mode::External).unwrap();
        assert_eq!(clock.mode(), Mode::External);
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_failed_switch_keeps_previous_mode() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mock = I2cMock::new(&[
            I2cTrans::write(0x51, vec![]).with_error(ErrorKind::Other),
        ]);
        let rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        let mut clock = TimeSource::new(soft_clock(&ticks, &mut storage), rtc, Mode::Internal);
        clock.set(&record()).unwrap();
        assert!(matches!(
            clock.switch_mode(Mode::External),
            Err(Error::BusUnavailable)
        ));
        assert_eq!(clock.mode(), Mode::Internal);
        assert_eq!(clock.now().unwrap(), record());
        let (_, rtc) = clock.release();
        rtc.unwrap().release().done();
    }

    #[test]
    fn test_set_from_build_time() {
        let ticks = FakeTicks::default();
        let mut storage = FakeStorage::default();
        let mut clock: TimeSource<I2cMock, _, _> =
            TimeSource::internal(soft_clock(&ticks, &mut storage));
        clock.set_from_build_time().unwrap();
        assert_eq!(clock.now().unwrap(), build_time::record());
    }
}
