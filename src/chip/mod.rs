//! Register codecs for the supported RTC chips.
//!
//! A [`RegisterCodec`] talks to one chip over I2C and exchanges
//! [`CalendarRecord`]s with it. The chip family is a closed set, so the
//! codec carries a [`ChipKind`] and dispatches with a `match` rather than
//! through a trait object. Each family's register order, flag bits and
//! weekday numbering live in its own module.
//!
//! # Example
//!
//! ```rust,ignore
//! use timesource::chip::{ChipKind, RegisterCodec};
//!
//! let mut rtc = RegisterCodec::new(i2c, ChipKind::Ds3231);
//! rtc.initialize()?;
//! let now = rtc.read_calendar()?;
//! ```

pub mod ds1307;
pub mod ds3231;
pub mod pcf8563;

use embedded_hal::i2c::I2c;

use crate::bcd;
use crate::calendar::{CalendarError, CalendarRecord, EPOCH_YEAR};
use crate::registers::Hours;
use crate::Error;

/// Number of consecutive calendar registers on every supported chip.
pub const CALENDAR_REGISTERS: usize = 7;

/// The supported RTC families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipKind {
    /// Maxim DS3231, temperature compensated, century flag
    Ds3231,
    /// Maxim DS1307
    Ds1307,
    /// NXP PCF8563
    Pcf8563,
}

impl ChipKind {
    /// The chip's fixed I2C address.
    pub const fn default_address(self) -> u8 {
        match self {
            ChipKind::Ds3231 => ds3231::ADDRESS,
            ChipKind::Ds1307 => ds1307::ADDRESS,
            ChipKind::Pcf8563 => pcf8563::ADDRESS,
        }
    }

    /// Address of the first calendar register (seconds).
    pub const fn base_register(self) -> u8 {
        match self {
            ChipKind::Ds3231 => ds3231::RegAddr::Seconds as u8,
            ChipKind::Ds1307 => ds1307::RegAddr::Seconds as u8,
            ChipKind::Pcf8563 => pcf8563::RegAddr::VlSeconds as u8,
        }
    }

    /// Last year the chip can store.
    pub const fn max_year(self) -> u16 {
        match self {
            ChipKind::Ds3231 => ds3231::MAX_YEAR,
            ChipKind::Ds1307 => ds1307::MAX_YEAR,
            ChipKind::Pcf8563 => pcf8563::MAX_YEAR,
        }
    }

    /// Encodes a record into the chip's calendar register block.
    pub fn encode(
        self,
        record: &CalendarRecord,
    ) -> Result<[u8; CALENDAR_REGISTERS], CalendarError> {
        match self {
            ChipKind::Ds3231 => ds3231::encode(record),
            ChipKind::Ds1307 => ds1307::encode(record),
            ChipKind::Pcf8563 => pcf8563::encode(record),
        }
    }

    /// Decodes the chip's calendar register block into a record.
    pub fn decode(self, data: [u8; CALENDAR_REGISTERS]) -> Result<CalendarRecord, CalendarError> {
        match self {
            ChipKind::Ds3231 => ds3231::decode(data),
            ChipKind::Ds1307 => ds1307::decode(data),
            ChipKind::Pcf8563 => pcf8563::decode(data),
        }
    }
}

/// Year offset from 2000 if `year` fits the chip.
pub(crate) fn check_year(year: u16, max_year: u16) -> Result<u8, CalendarError> {
    if year < EPOCH_YEAR {
        return Err(CalendarError::YearNotAfter1999);
    }
    if year > max_year {
        return Err(CalendarError::YearOutOfRange);
    }
    u8::try_from(year - EPOCH_YEAR).map_err(|_| CalendarError::YearOutOfRange)
}

/// Decimal value of a masked BCD field.
pub(crate) fn digits(byte: u8) -> Result<u8, CalendarError> {
    bcd::decode_checked(byte).ok_or(CalendarError::InvalidDateTime)
}

/// Hour of day from an hours register in either 12 or 24-hour format.
pub(crate) fn hour_of_day(hours: Hours) -> Result<u8, CalendarError> {
    digits(hours.hours())?;
    Ok(hours.hour_of_day())
}

/// Validates a freshly decoded record and fills in its weekday.
///
/// The weekday is always derived from the date. The chip's own weekday
/// register is a free running counter that may never have been set, so a
/// disagreement is only logged.
pub(crate) fn finish_decode(
    mut record: CalendarRecord,
    chip_weekday: u8,
    max_year: u16,
) -> Result<CalendarRecord, CalendarError> {
    record.validate()?;
    check_year(record.year, max_year)?;
    record = record.with_derived_weekday();
    if record.weekday != chip_weekday {
        debug!(
            "weekday register reads {} but date falls on {}",
            chip_weekday,
            record.weekday
        );
    }
    Ok(record)
}

/// A DS3231 temperature sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureReading {
    /// Whole degrees Celsius (two's complement)
    pub integer: i8,
    /// Additional quarter degrees (0-3)
    pub quarters: u8,
}

impl TemperatureReading {
    /// Temperature in units of 0.25 °C.
    pub fn quarter_degrees(&self) -> i16 {
        i16::from(self.integer) * 4 + i16::from(self.quarters)
    }

    /// Temperature in degrees Celsius.
    #[cfg(feature = "temperature_f32")]
    pub fn as_f32(&self) -> f32 {
        f32::from(self.quarter_degrees()) / 4.0
    }
}

/// Calendar access to one RTC chip over I2C.
pub struct RegisterCodec<I2C: I2c> {
    i2c: I2C,
    address: u8,
    kind: ChipKind,
}

impl<I2C: I2c> RegisterCodec<I2C> {
    /// Creates a codec for `kind` at its default address.
    pub fn new(i2c: I2C, kind: ChipKind) -> Self {
        Self::with_address(i2c, kind, kind.default_address())
    }

    /// Creates a codec for `kind` at a non-standard address.
    pub fn with_address(i2c: I2C, kind: ChipKind, address: u8) -> Self {
        Self { i2c, address, kind }
    }

    /// The chip family this codec drives.
    pub fn kind(&self) -> ChipKind {
        self.kind
    }

    /// The I2C address in use.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Checks whether a device acknowledges at the configured address.
    ///
    /// Issues a zero-length write; any bus error counts as absent.
    pub fn probe(&mut self) -> bool {
        self.i2c.write(self.address, &[]).is_ok()
    }

    fn read_register<R: From<u8>>(&mut self, reg: u8) -> Result<R, Error<I2C::Error>> {
        let mut data = [0];
        self.i2c.write_read(self.address, &[reg], &mut data)?;
        Ok(R::from(data[0]))
    }

    fn write_register<R: Into<u8>>(&mut self, reg: u8, value: R) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.address, &[reg, value.into()])?;
        Ok(())
    }

    /// Restarts a stopped oscillator.
    ///
    /// Each chip has its own stop bit: EOSC in the DS3231 control register,
    /// CH in the DS1307 seconds register and STOP in the PCF8563
    /// control/status 1 register. The bit is only written when it is set,
    /// so calling this on every start-up is harmless.
    pub fn initialize(&mut self) -> Result<(), Error<I2C::Error>> {
        match self.kind {
            ChipKind::Ds3231 => {
                let reg = ds3231::RegAddr::Control as u8;
                let mut control: ds3231::Control = self.read_register(reg)?;
                debug!("DS3231: control: {:#x}", u8::from(control));
                if control.oscillator_enable() == ds3231::Ocillator::Disabled {
                    info!("DS3231: enabling stopped oscillator");
                    control.set_oscillator_enable(ds3231::Ocillator::Enabled);
                    self.write_register(reg, control)?;
                }
            }
            ChipKind::Ds1307 => {
                let reg = ds1307::RegAddr::Seconds as u8;
                let mut seconds: crate::registers::Seconds = self.read_register(reg)?;
                if seconds.stop_flag() {
                    info!("DS1307: clearing clock halt");
                    seconds.set_stop_flag(false);
                    self.write_register(reg, seconds)?;
                }
            }
            ChipKind::Pcf8563 => {
                let reg = pcf8563::RegAddr::ControlStatus1 as u8;
                let mut control: pcf8563::ControlStatus1 = self.read_register(reg)?;
                if control.stop() {
                    info!("PCF8563: releasing STOP");
                    control.set_stop(false);
                    self.write_register(reg, control)?;
                }
            }
        }
        Ok(())
    }

    /// Reads the calendar in a single sequential transfer.
    ///
    /// Nothing is returned unless the whole block was read and decoded, so
    /// a failed transfer never yields a partially updated record.
    pub fn read_calendar(&mut self) -> Result<CalendarRecord, Error<I2C::Error>> {
        let mut data = [0; CALENDAR_REGISTERS];
        self.i2c
            .write_read(self.address, &[self.kind.base_register()], &mut data)?;
        debug!("{:?}: read registers {:?}", self.kind, data);
        self.kind.decode(data).map_err(Error::DateTime)
    }

    /// Writes the calendar in a single sequential transfer.
    ///
    /// On the DS3231 the oscillator-stop flag is cleared afterwards, since
    /// the chip now holds a valid time.
    pub fn write_calendar(&mut self, record: &CalendarRecord) -> Result<(), Error<I2C::Error>> {
        let data = self.kind.encode(record).map_err(Error::DateTime)?;
        debug!("{:?}: writing registers {:?}", self.kind, data);
        let mut frame = [0; CALENDAR_REGISTERS + 1];
        frame[0] = self.kind.base_register();
        frame[1..].copy_from_slice(&data);
        self.i2c.write(self.address, &frame)?;

        if self.kind == ChipKind::Ds3231 {
            let reg = ds3231::RegAddr::ControlStatus as u8;
            let mut status: ds3231::Status = self.read_register(reg)?;
            if status.oscillator_stop_flag() {
                status.set_oscillator_stop_flag(false);
                self.write_register(reg, status)?;
            }
        }
        Ok(())
    }

    /// Reads the DS3231 temperature sensor.
    ///
    /// Other chips have no sensor and report
    /// [`Error::UnsupportedCapability`].
    pub fn temperature(&mut self) -> Result<TemperatureReading, Error<I2C::Error>> {
        if self.kind != ChipKind::Ds3231 {
            return Err(Error::UnsupportedCapability);
        }
        let mut data = [0; 2];
        self.i2c.write_read(
            self.address,
            &[ds3231::RegAddr::MSBTemp as u8],
            &mut data,
        )?;
        Ok(TemperatureReading {
            integer: ds3231::Temperature::from(data[0]).temperature(),
            quarters: ds3231::TemperatureFraction::from(data[1]).quarters(),
        })
    }

    /// Whether the DS3231 oscillator stopped since the time was last set.
    ///
    /// Other chips report [`Error::UnsupportedCapability`].
    pub fn lost_power(&mut self) -> Result<bool, Error<I2C::Error>> {
        if self.kind != ChipKind::Ds3231 {
            return Err(Error::UnsupportedCapability);
        }
        let status: ds3231::Status = self.read_register(ds3231::RegAddr::ControlStatus as u8)?;
        Ok(status.oscillator_stop_flag())
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use alloc::vec;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DS3231_ADDRESS: u8 = 0x68;
    const PCF8563_ADDRESS: u8 = 0x51;

    fn record() -> CalendarRecord {
        CalendarRecord::new(2024, 3, 14, 15, 30, 0)
    }

    #[test]
    fn test_default_addresses() {
        assert_eq!(ChipKind::Ds3231.default_address(), 0x68);
        assert_eq!(ChipKind::Ds1307.default_address(), 0x68);
        assert_eq!(ChipKind::Pcf8563.default_address(), 0x51);
        assert_eq!(ChipKind::Pcf8563.base_register(), 0x02);
        assert_eq!(ChipKind::Ds3231.max_year(), 2199);
    }

    #[test]
    fn test_every_chip_roundtrips_a_record() {
        for kind in [ChipKind::Ds3231, ChipKind::Ds1307, ChipKind::Pcf8563] {
            let data = kind.encode(&record()).unwrap();
            assert_eq!(kind.decode(data).unwrap(), record(), "{:?}", kind);
        }
    }

    #[test]
    fn test_read_calendar() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DS3231_ADDRESS,
            vec![0x00],
            vec![0x00, 0x30, 0x15, 0x04, 0x14, 0x03, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert_eq!(rtc.read_calendar().unwrap(), record());
        rtc.release().done();
    }

    #[test]
    fn test_read_calendar_pcf8563_starts_at_seconds_register() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            PCF8563_ADDRESS,
            vec![0x02],
            vec![0x00, 0x30, 0x15, 0x14, 0x04, 0x03, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        assert_eq!(rtc.read_calendar().unwrap(), record());
        rtc.release().done();
    }

    #[test]
    fn test_read_calendar_bus_failure() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DS3231_ADDRESS,
            vec![0x00],
            vec![0; 7],
        )
        .with_error(ErrorKind::Other)]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert!(matches!(
            rtc.read_calendar(),
            Err(Error::BusTransactionFailed(ErrorKind::Other))
        ));
        rtc.release().done();
    }

    #[test]
    fn test_read_calendar_invalid_registers() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DS3231_ADDRESS,
            vec![0x00],
            vec![0x00, 0x00, 0x00, 0x01, 0x01, 0x13, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert!(matches!(
            rtc.read_calendar(),
            Err(Error::DateTime(CalendarError::InvalidDateTime))
        ));
        rtc.release().done();
    }

    #[test]
    fn test_read_calendar_rejects_non_decimal_digits() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DS3231_ADDRESS,
            vec![0x00],
            vec![0x00, 0x4A, 0x15, 0x04, 0x14, 0x03, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert!(matches!(
            rtc.read_calendar(),
            Err(Error::DateTime(CalendarError::InvalidDateTime))
        ));
        rtc.release().done();
    }

    #[test]
    fn test_write_calendar_ds3231_clears_oscillator_stop_flag() {
        let mock = I2cMock::new(&[
            I2cTrans::write(
                DS3231_ADDRESS,
                vec![0x00, 0x00, 0x30, 0x15, 0x04, 0x14, 0x03, 0x24],
            ),
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0F], vec![0x88]),
            I2cTrans::write(DS3231_ADDRESS, vec![0x0F, 0x08]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        rtc.write_calendar(&record()).unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_write_calendar_ds1307() {
        let mock = I2cMock::new(&[I2cTrans::write(
            DS3231_ADDRESS,
            vec![0x00, 0x00, 0x30, 0x15, 0x04, 0x14, 0x03, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds1307);
        rtc.write_calendar(&record()).unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_write_calendar_pcf8563() {
        let mock = I2cMock::new(&[I2cTrans::write(
            PCF8563_ADDRESS,
            vec![0x02, 0x00, 0x30, 0x15, 0x14, 0x04, 0x03, 0x24],
        )]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        rtc.write_calendar(&record()).unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_write_calendar_rejects_out_of_range_year() {
        let mock = I2cMock::new(&[]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        let late = CalendarRecord::new(2100, 1, 1, 0, 0, 0);
        assert!(matches!(
            rtc.write_calendar(&late),
            Err(Error::DateTime(CalendarError::YearOutOfRange))
        ));
        rtc.release().done();
    }

    #[test]
    fn test_initialize_ds3231_enables_oscillator() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0E], vec![0x9C]),
            I2cTrans::write(DS3231_ADDRESS, vec![0x0E, 0x1C]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        rtc.initialize().unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_initialize_is_idempotent_when_running() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0E], vec![0x1C]),
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0E], vec![0x1C]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        rtc.initialize().unwrap();
        rtc.initialize().unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_initialize_ds1307_clears_clock_halt() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x00], vec![0xA7]),
            I2cTrans::write(DS3231_ADDRESS, vec![0x00, 0x27]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds1307);
        rtc.initialize().unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_initialize_pcf8563_releases_stop() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(PCF8563_ADDRESS, vec![0x00], vec![0x20]),
            I2cTrans::write(PCF8563_ADDRESS, vec![0x00, 0x00]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Pcf8563);
        rtc.initialize().unwrap();
        rtc.release().done();
    }

    #[test]
    fn test_probe() {
        let mock = I2cMock::new(&[
            I2cTrans::write(DS3231_ADDRESS, vec![]),
            I2cTrans::write(DS3231_ADDRESS, vec![]).with_error(ErrorKind::Other),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert!(rtc.probe());
        assert!(!rtc.probe());
        rtc.release().done();
    }

    #[test]
    fn test_temperature() {
        let mock = I2cMock::new(&[
            // 25.25 °C
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x11], vec![0x19, 0x40]),
            // -0.25 °C
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x11], vec![0xFF, 0xC0]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        let warm = rtc.temperature().unwrap();
        assert_eq!(warm.integer, 25);
        assert_eq!(warm.quarters, 1);
        assert_eq!(warm.quarter_degrees(), 101);
        let cold = rtc.temperature().unwrap();
        assert_eq!(cold.quarter_degrees(), -1);
        rtc.release().done();
    }

    #[cfg(feature = "temperature_f32")]
    #[test]
    fn test_temperature_f32() {
        let reading = TemperatureReading {
            integer: 25,
            quarters: 3,
        };
        assert_eq!(reading.as_f32(), 25.75);
    }

    #[test]
    fn test_unsupported_capabilities() {
        for kind in [ChipKind::Ds1307, ChipKind::Pcf8563] {
            let mut rtc = RegisterCodec::new(I2cMock::new(&[]), kind);
            assert!(matches!(
                rtc.temperature(),
                Err(Error::UnsupportedCapability)
            ));
            assert!(matches!(rtc.lost_power(), Err(Error::UnsupportedCapability)));
            rtc.release().done();
        }
    }

    #[test]
    fn test_lost_power() {
        let mock = I2cMock::new(&[
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0F], vec![0x80]),
            I2cTrans::write_read(DS3231_ADDRESS, vec![0x0F], vec![0x00]),
        ]);
        let mut rtc = RegisterCodec::new(mock, ChipKind::Ds3231);
        assert!(rtc.lost_power().unwrap());
        assert!(!rtc.lost_power().unwrap());
        rtc.release().done();
    }
}
