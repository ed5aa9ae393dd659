//! Fixed-width binary record for the history log.
//!
//! Binary format (little-endian, no padding):
//! - temperature: 4 bytes (f32, °C)
//! - humidity: 4 bytes (f32, %RH)
//! - pressure: 4 bytes (f32, hPa)
//! - timestamp: 8 bytes (i64, seconds since epoch, UTC)
//!
//! Record `i` of the log always starts at byte `i * RECORD_SIZE`, so any record
//! can be read with a single seek.

use core::fmt::Display;

use thiserror_no_std::Error;

/// Size of one encoded [`SensorRecord`] in bytes.
pub const RECORD_SIZE: usize = 20;

const TEMPERATURE: core::ops::Range<usize> = 0..4;
const HUMIDITY: core::ops::Range<usize> = 4..8;
const PRESSURE: core::ops::Range<usize> = 8..12;
const TIMESTAMP: core::ops::Range<usize> = 12..20;

/// Fewer bytes than one full record were available.
///
/// Produced for a tail entry that was only partially written before a power
/// loss.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("corrupt record: {available} of {} bytes available", RECORD_SIZE)]
pub struct CorruptRecord {
    pub available: usize,
}

/// One timestamped environmental sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorRecord {
    /// Temperature in °C
    pub temperature: f32,
    /// Relative humidity in %
    pub humidity: f32,
    /// Barometric pressure in hPa
    pub pressure: f32,
    /// Seconds since epoch (UTC)
    pub timestamp: i64,
}

impl Display for SensorRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[SensorRecord] timestamp: {}, temperature: {:.1}°C, humidity: {:.0}%, pressure: {:.0} hPa",
            self.timestamp, self.temperature, self.humidity, self.pressure
        )
    }
}

impl SensorRecord {
    /// Create a new record
    pub const fn new(temperature: f32, humidity: f32, pressure: f32, timestamp: i64) -> Self {
        Self {
            temperature,
            humidity,
            pressure,
            timestamp,
        }
    }

    /// Byte offset of the record at `index` within the log.
    pub const fn offset_of(index: usize) -> u64 {
        index as u64 * RECORD_SIZE as u64
    }

    /// Converts the record to its on-storage form.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];

        bytes[TEMPERATURE].copy_from_slice(&self.temperature.to_le_bytes());
        bytes[HUMIDITY].copy_from_slice(&self.humidity.to_le_bytes());
        bytes[PRESSURE].copy_from_slice(&self.pressure.to_le_bytes());
        bytes[TIMESTAMP].copy_from_slice(&self.timestamp.to_le_bytes());

        bytes
    }

    /// Decodes a record from the first [`RECORD_SIZE`] bytes of `bytes`.
    ///
    /// Extra trailing bytes are ignored; a short slice is a [`CorruptRecord`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptRecord> {
        if bytes.len() < RECORD_SIZE {
            return Err(CorruptRecord {
                available: bytes.len(),
            });
        }

        let mut word = [0u8; 4];
        let mut wide = [0u8; 8];

        word.copy_from_slice(&bytes[TEMPERATURE]);
        let temperature = f32::from_le_bytes(word);
        word.copy_from_slice(&bytes[HUMIDITY]);
        let humidity = f32::from_le_bytes(word);
        word.copy_from_slice(&bytes[PRESSURE]);
        let pressure = f32::from_le_bytes(word);
        wide.copy_from_slice(&bytes[TIMESTAMP]);
        let timestamp = i64::from_le_bytes(wide);

        Ok(Self {
            temperature,
            humidity,
            pressure,
            timestamp,
        })
    }
}
