//! A calendar clock kept in software.
//!
//! [`SoftwareClock`] integrates a free running millisecond counter into
//! seconds since the epoch. The counter is scaled by a drift factor so a
//! crystal that is known to run fast or slow can be corrected, and the
//! clock state is written to persistent storage so the time survives a
//! restart (minus however long the device was off).
//!
//! Elapsed time is computed with wrapping subtraction, so a single wrap of
//! the counter between two reads is harmless. Reads re-baseline the clock
//! at the current tick and carry the sub-second remainder, so frequent
//! reads do not lose time to truncation.

use core::fmt::Debug;

use crate::build_time;
use crate::calendar::{CalendarRecord, EpochSeconds};

/// Lowest drift factor accepted as plausible.
pub const DRIFT_MIN: f32 = 0.9;
/// Highest drift factor accepted as plausible.
pub const DRIFT_MAX: f32 = 1.1;

/// Size of the persisted clock record in bytes.
pub const RECORD_LEN: usize = 16;

const RECORD_MARKER: u8 = 0xA5;
const MILLIS_PER_HOUR: f32 = 3_600_000.0;

/// A monotonic millisecond counter that wraps at `u32::MAX`.
pub trait TickSource {
    /// Milliseconds since some arbitrary point, typically power-on.
    fn millis(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn millis(&self) -> u32 {
        (**self).millis()
    }
}

/// Byte addressed persistent storage such as an EEPROM.
///
/// There are no transactional guarantees; a torn write is detected by the
/// record checksum.
pub trait Storage {
    /// Storage error type
    type Error: Debug;

    /// Fills `buf` from `offset`.
    fn load(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes `data` at `offset`.
    fn store(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    type Error = S::Error;

    fn load(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).load(offset, buf)
    }

    fn store(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        (**self).store(offset, data)
    }
}

/// Software clock configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Where the clock record lives in storage
    pub storage_offset: usize,
    /// Seconds of clock time between automatic saves, 0 to save only on
    /// explicit changes
    pub persist_interval: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            storage_offset: 0,
            persist_interval: 3600,
        }
    }
}

/// A drift factor outside [`DRIFT_MIN`]..=[`DRIFT_MAX`] or NaN.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriftFactorError;

/// Checks that a drift factor lies in the plausible band.
pub fn check_drift_factor(factor: f32) -> Result<f32, DriftFactorError> {
    if (DRIFT_MIN..=DRIFT_MAX).contains(&factor) {
        Ok(factor)
    } else {
        Err(DriftFactorError)
    }
}

/// The baseline the clock integrates from.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockState {
    /// Epoch seconds at `reference_tick`
    pub reference_epoch_seconds: EpochSeconds,
    /// Tick counter value the baseline was taken at
    pub reference_tick: u32,
    /// Multiplier applied to elapsed ticks
    pub drift_factor: f32,
    /// Milliseconds past `reference_epoch_seconds` not yet carried
    pub sub_second_ms: u16,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            reference_epoch_seconds: 0,
            reference_tick: 0,
            drift_factor: 1.0,
            sub_second_ms: 0,
        }
    }
}

impl ClockState {
    /// Serializes the persistent part of the state.
    ///
    /// The reference tick is left out: the counter restarts with the
    /// device, so a restored clock re-baselines at the current tick.
    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let mut record = [0; RECORD_LEN];
        record[0] = RECORD_MARKER;
        record[1..9].copy_from_slice(&self.reference_epoch_seconds.to_le_bytes());
        record[9..13].copy_from_slice(&self.drift_factor.to_bits().to_le_bytes());
        record[13..15].copy_from_slice(&self.sub_second_ms.to_le_bytes());
        record[15] = 0u8.wrapping_sub(checksum(&record[..RECORD_LEN - 1]));
        record
    }

    /// Restores a state from a persisted record.
    ///
    /// Returns `None` if the marker or checksum is wrong. The drift factor
    /// is returned as stored; the caller decides whether it is plausible.
    pub fn from_record(record: &[u8; RECORD_LEN], reference_tick: u32) -> Option<Self> {
        if record[0] != RECORD_MARKER || checksum(record) != 0 {
            return None;
        }
        let mut epoch = [0; 8];
        epoch.copy_from_slice(&record[1..9]);
        let mut drift = [0; 4];
        drift.copy_from_slice(&record[9..13]);
        Some(Self {
            reference_epoch_seconds: u64::from_le_bytes(epoch),
            reference_tick,
            drift_factor: f32::from_bits(u32::from_le_bytes(drift)),
            sub_second_ms: u16::from_le_bytes([record[13], record[14]]) % 1000,
        })
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Calendar time integrated from a tick counter.
pub struct SoftwareClock<T: TickSource, S: Storage> {
    ticks: T,
    storage: S,
    config: ClockConfig,
    state: ClockState,
    running: bool,
    last_persisted: EpochSeconds,
    persist_pending: bool,
}

impl<T: TickSource, S: Storage> SoftwareClock<T, S> {
    /// Creates a stopped clock. Call [`begin`](Self::begin) to restore or
    /// seed the time.
    pub fn new(ticks: T, storage: S, config: ClockConfig) -> Self {
        Self {
            ticks,
            storage,
            config,
            state: ClockState::default(),
            running: false,
            last_persisted: 0,
            persist_pending: false,
        }
    }

    /// Restores the clock from storage, or seeds it from the build time
    /// when there is no usable record.
    ///
    /// Does nothing if the clock is already running.
    pub fn begin(&mut self) {
        if self.running {
            return;
        }
        let now = self.ticks.millis();
        let mut record = [0; RECORD_LEN];
        let restored = match self.storage.load(self.config.storage_offset, &mut record) {
            Ok(()) => ClockState::from_record(&record, now),
            Err(_) => {
                warn!("clock record could not be loaded");
                None
            }
        };

        match restored {
            Some(mut state) => {
                self.running = true;
                if check_drift_factor(state.drift_factor).is_err() {
                    warn!("persisted drift factor is implausible, resetting to 1.0");
                    state.drift_factor = 1.0;
                    self.state = state;
                    self.persist();
                } else {
                    self.state = state;
                    self.last_persisted = state.reference_epoch_seconds;
                }
                debug!("clock restored at {}", self.state.reference_epoch_seconds);
            }
            None => {
                info!("no valid clock record, seeding from build time");
                self.set(&build_time::record());
            }
        }
    }

    /// Whether the clock has a baseline.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current calendar time. Starts the clock first if needed.
    pub fn now(&mut self) -> CalendarRecord {
        CalendarRecord::from_epoch_seconds(self.epoch_seconds())
    }

    /// Current time as seconds since the epoch. Starts the clock first if
    /// needed.
    pub fn epoch_seconds(&mut self) -> EpochSeconds {
        if !self.running {
            self.begin();
        }
        self.refresh();
        let due = self.config.persist_interval != 0
            && self.state.reference_epoch_seconds
                >= self
                    .last_persisted
                    .saturating_add(u64::from(self.config.persist_interval));
        if due || self.persist_pending {
            self.persist();
        }
        self.state.reference_epoch_seconds
    }

    /// Sets the clock. The record is normalized first.
    pub fn set(&mut self, record: &CalendarRecord) {
        self.set_epoch_seconds(record.normalized().to_epoch_seconds());
    }

    /// Sets the clock to a number of seconds since the epoch.
    pub fn set_epoch_seconds(&mut self, seconds: EpochSeconds) {
        self.state.reference_epoch_seconds = seconds;
        self.state.sub_second_ms = 0;
        self.state.reference_tick = self.ticks.millis();
        self.running = true;
        self.persist();
    }

    /// Sets the clock to the moment the crate was built.
    pub fn set_from_build_time(&mut self) {
        self.set(&build_time::record());
    }

    /// Shifts the clock by `offset_ms`, clamping at the epoch. Starts the
    /// clock first if needed.
    pub fn adjust(&mut self, offset_ms: i64) {
        if !self.running {
            self.begin();
        }
        self.refresh();
        let current = i128::from(self.state.reference_epoch_seconds) * 1000
            + i128::from(self.state.sub_second_ms);
        let target = (current + i128::from(offset_ms)).max(0);
        self.state.reference_epoch_seconds =
            u64::try_from(target / 1000).unwrap_or(EpochSeconds::MAX);
        self.state.sub_second_ms = (target % 1000) as u16;
        self.persist();
    }

    /// The multiplier applied to elapsed ticks.
    pub fn drift_factor(&self) -> f32 {
        self.state.drift_factor
    }

    /// Replaces the drift factor.
    ///
    /// Time elapsed so far is accounted at the old factor. The new factor
    /// must lie in [`DRIFT_MIN`]..=[`DRIFT_MAX`]. Starts the clock first if
    /// needed.
    pub fn calibrate(&mut self, factor: f32) -> Result<(), DriftFactorError> {
        let factor = check_drift_factor(factor)?;
        if !self.running {
            self.begin();
        }
        self.refresh();
        self.state.drift_factor = factor;
        self.persist();
        Ok(())
    }

    /// Correction applied per hour of ticks, in milliseconds.
    ///
    /// Positive when the clock is advanced faster than the ticks.
    pub fn drift_ms_per_hour(&self) -> f32 {
        (self.state.drift_factor - 1.0) * MILLIS_PER_HOUR
    }

    /// A copy of the current baseline.
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Gives back the tick source and storage.
    pub fn release(self) -> (T, S) {
        (self.ticks, self.storage)
    }

    fn refresh(&mut self) {
        let now = self.ticks.millis();
        let elapsed = now.wrapping_sub(self.state.reference_tick);
        let scaled = (f64::from(elapsed) * f64::from(self.state.drift_factor)) as u64
            + u64::from(self.state.sub_second_ms);
        self.state.reference_epoch_seconds = self
            .state
            .reference_epoch_seconds
            .saturating_add(scaled / 1000);
        self.state.sub_second_ms = (scaled % 1000) as u16;
        self.state.reference_tick = now;
    }

    fn persist(&mut self) {
        let record = self.state.to_record();
        match self.storage.store(self.config.storage_offset, &record) {
            Ok(()) => {
                self.last_persisted = self.state.reference_epoch_seconds;
                self.persist_pending = false;
            }
            Err(_) => {
                if !self.persist_pending {
                    warn!("clock record could not be saved, keeping time in memory");
                }
                self.persist_pending = true;
            }
        }
    }
}
