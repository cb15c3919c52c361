//! Core value types for political ad statistics.
//!
//! Turns one raw archive record into a normalized [`record::AdRecord`] and
//! provides the read-side helpers used by reporting. Nothing here performs
//! I/O beyond what [`settings`] needs to locate its defaults.

pub mod categories;
pub mod currency;
pub mod dates;
pub mod distribution;
pub mod error;
pub mod estimate;
pub mod record;
pub mod settings;
pub mod stored;
