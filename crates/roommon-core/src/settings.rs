//! Persisted user settings.

use alloc::vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::storage::BlockStorage;

/// File the settings live in, next to the history log.
pub const SETTINGS_FILE: &str = "settings.bin";

/// Anything larger than this is not a settings file.
const MAX_SETTINGS_LEN: u64 = 64;

#[derive(Error, Debug)]
pub enum SettingsError<E> {
    #[error("settings I/O failed: {0:?}")]
    Io(E),
    #[error("failed to encode settings: {0}")]
    Encode(postcard::Error),
}

/// User settings that survive power cycles.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Daylight saving time is in effect
    pub summer_time: bool,
    /// Epoch seconds of the last successful clock sync; 0 for never
    pub last_time_sync: i64,
}

impl Settings {
    /// Load settings from `storage`.
    ///
    /// Never fails: a missing, unreadable or undecodable file yields the
    /// defaults.
    pub fn load<S: BlockStorage>(storage: &mut S) -> Self {
        let len = match storage.len(SETTINGS_FILE) {
            Ok(Some(len)) if len > 0 && len <= MAX_SETTINGS_LEN => len as usize,
            Ok(Some(len)) => {
                warn!(" Ignoring settings file of {} bytes", len);
                return Self::default();
            }
            Ok(None) => {
                info!(" No settings file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(" Failed to stat settings: {:?}", e);
                return Self::default();
            }
        };

        let mut buf = vec![0u8; len];
        let read = match storage.read_at(SETTINGS_FILE, 0, &mut buf) {
            Ok(read) => read,
            Err(e) => {
                warn!(" Failed to read settings: {:?}", e);
                return Self::default();
            }
        };

        match postcard::from_bytes(&buf[..read]) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(" Settings file is corrupt ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Replace the stored settings with `self`.
    pub fn save<S: BlockStorage>(&self, storage: &mut S) -> Result<(), SettingsError<S::Error>> {
        let bytes = postcard::to_allocvec(self).map_err(SettingsError::Encode)?;

        storage.remove(SETTINGS_FILE).map_err(SettingsError::Io)?;
        storage
            .write_at(SETTINGS_FILE, 0, &bytes)
            .map_err(SettingsError::Io)?;

        info!(" Settings saved");
        Ok(())
    }
}
