//! Logging shims.
//!
//! The crate logs through `defmt` or `log` depending on which feature is
//! enabled. With neither, the macros expand to a borrow of their arguments
//! so call sites compile the same way in every configuration.
#![allow(unused_macros)]

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        macro_rules! trace {
            ($($arg:tt)+) => { ::defmt::trace!($($arg)+) };
        }
        macro_rules! debug {
            ($($arg:tt)+) => { ::defmt::debug!($($arg)+) };
        }
        macro_rules! info {
            ($($arg:tt)+) => { ::defmt::info!($($arg)+) };
        }
        macro_rules! warn {
            ($($arg:tt)+) => { ::defmt::warn!($($arg)+) };
        }
        macro_rules! error {
            ($($arg:tt)+) => { ::defmt::error!($($arg)+) };
        }
    } else if #[cfg(feature = "log")] {
        macro_rules! trace {
            ($($arg:tt)+) => { ::log::trace!($($arg)+) };
        }
        macro_rules! debug {
            ($($arg:tt)+) => { ::log::debug!($($arg)+) };
        }
        macro_rules! info {
            ($($arg:tt)+) => { ::log::info!($($arg)+) };
        }
        macro_rules! warn {
            ($($arg:tt)+) => { ::log::warn!($($arg)+) };
        }
        macro_rules! error {
            ($($arg:tt)+) => { ::log::error!($($arg)+) };
        }
    } else {
        macro_rules! trace {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x ),*); }};
        }
        macro_rules! debug {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x ),*); }};
        }
        macro_rules! info {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x ),*); }};
        }
        macro_rules! warn {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x ),*); }};
        }
        macro_rules! error {
            ($s:literal $(, $x:expr)* $(,)?) => {{ let _ = ($( & $x ),*); }};
        }
    }
}
