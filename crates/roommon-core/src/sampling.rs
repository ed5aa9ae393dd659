//! One background sampling episode: read the sensor, log the record.

use log::{error, info};
use thiserror_no_std::Error;

use crate::storage::{BlockStorage, SensorRecord, StorageManager, StoreError};

/// One set of environment readings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Hectopascals
    pub pressure: f32,
}

/// Trait for the sensor that feeds the history.
pub trait EnvironmentSensor {
    type Error: core::fmt::Debug;

    /// Take one measurement.
    fn read(&mut self) -> Result<Readings, Self::Error>;
}

#[derive(Error, Debug)]
pub enum SampleError<S, E> {
    #[error("sensor read failed: {0:?}")]
    Sensor(S),
    #[error("failed to store sample: {0}")]
    Store(StoreError<E>),
}

/// Read `sensor` and append the result stamped with `now`.
///
/// A failed sensor read leaves the store untouched.
pub fn record_sample<S, T, const K: usize>(
    store: &mut StorageManager<S, K>,
    sensor: &mut T,
    now: i64,
) -> Result<SensorRecord, SampleError<T::Error, S::Error>>
where
    S: BlockStorage,
    T: EnvironmentSensor,
{
    let readings = sensor.read().map_err(|e| {
        error!(" Sensor read failed: {:?}", e);
        SampleError::Sensor(e)
    })?;

    let record = SensorRecord::new(
        readings.temperature,
        readings.humidity,
        readings.pressure,
        now,
    );
    store.append(record).map_err(SampleError::Store)?;

    info!(" Sampled {}", record);
    Ok(record)
}
