use crate::storage::SensorRecord;

/// Channel of a [`SensorRecord`] that can be graphed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
}

impl SensorType {
    /// Extract this channel's value from a record
    pub fn value_of(self, record: &SensorRecord) -> f32 {
        match self {
            Self::Temperature => record.temperature,
            Self::Humidity => record.humidity,
            Self::Pressure => record.pressure,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temp",
            Self::Humidity => "Humid",
            Self::Pressure => "Press",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Pressure => "hPa",
        }
    }
}
