use log::{debug, error, info, warn};

use super::record::{RECORD_SIZE, SensorRecord};
use super::{BlockStorage, StoreError};

/// Durable, append-only sequence of [`SensorRecord`]s in a single file.
///
/// The log owns the storage handle. `count` only ever covers fully written
/// records; a partial record left at the end of the file by a power loss is
/// invisible and gets overwritten by the next append.
///
/// Until a mount succeeds `count` says nothing about what is on the medium, so
/// an unmounted log mounts again before its first write.
pub struct AppendLog<S: BlockStorage> {
    storage: S,
    file_name: &'static str,
    count: usize,
    mounted: bool,
}

impl<S: BlockStorage> AppendLog<S> {
    /// Create an unmounted log (`count == 0`) over `storage`.
    pub fn new(storage: S, file_name: &'static str) -> Self {
        Self {
            storage,
            file_name,
            count: 0,
            mounted: false,
        }
    }

    /// Derive `count` from the stored byte length.
    ///
    /// A missing file is an empty log. On error `count` is left at 0 and the
    /// log stays unmounted.
    pub fn mount(&mut self) -> Result<usize, S::Error> {
        self.unmount();

        let Some(len) = self.storage.len(self.file_name)? else {
            info!(" No history file '{}', starting empty", self.file_name);
            self.mounted = true;
            return Ok(0);
        };

        let partial = len % RECORD_SIZE as u64;
        if partial != 0 {
            warn!(
                " Dropping {} trailing bytes of a partially written record in '{}'",
                partial, self.file_name
            );
        }

        self.count = (len / RECORD_SIZE as u64) as usize;
        self.mounted = true;
        info!(" Mounted '{}' with {} records", self.file_name, self.count);
        Ok(self.count)
    }

    /// Number of fully written records.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `count` reflects the stored length.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Forget the stored length, e.g. after the medium went away.
    pub fn unmount(&mut self) {
        self.count = 0;
        self.mounted = false;
    }

    /// Read the record at `index`.
    pub fn read_at(&mut self, index: usize) -> Result<SensorRecord, StoreError<S::Error>> {
        if index >= self.count {
            return Err(StoreError::OutOfRange {
                index,
                count: self.count,
            });
        }

        let mut buf = [0u8; RECORD_SIZE];
        let read = self
            .storage
            .read_at(self.file_name, SensorRecord::offset_of(index), &mut buf)
            .map_err(StoreError::Io)?;

        SensorRecord::from_bytes(&buf[..read]).map_err(|e| {
            warn!(" Record {} unreadable: {}", index, e);
            StoreError::CorruptRecord { index }
        })
    }

    /// Durably write `record` after the last full record and return its index.
    ///
    /// An unmounted log is mounted first so existing records are never
    /// overwritten. On failure `count` is unchanged.
    pub fn append(&mut self, record: &SensorRecord) -> Result<usize, StoreError<S::Error>> {
        if !self.mounted {
            self.mount().map_err(StoreError::Io)?;
        }
        let index = self.count;

        if let Err(e) = self.storage.write_at(
            self.file_name,
            SensorRecord::offset_of(index),
            &record.to_bytes(),
        ) {
            error!(" Failed to append record #{} to '{}': {:?}", index, self.file_name, e);
            return Err(StoreError::Io(e));
        }

        self.count += 1;
        debug!(" Logged #{}", self.count);
        Ok(index)
    }

    /// Delete all records.
    pub fn clear(&mut self) -> Result<(), StoreError<S::Error>> {
        self.storage
            .remove(self.file_name)
            .map_err(StoreError::Io)?;
        self.count = 0;
        self.mounted = true;
        info!(" History cleared");
        Ok(())
    }

    /// Stored byte length, without touching `count`.
    pub(super) fn stored_len(&mut self) -> Result<Option<u64>, S::Error> {
        self.storage.len(self.file_name)
    }

    /// Adopt a record count already checked against the stored length.
    pub(super) fn restore_count(&mut self, count: usize) {
        self.count = count;
        self.mounted = true;
    }

    /// Read-only access to the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[cfg(test)]
    pub(crate) fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Give back the storage handle.
    pub fn into_storage(self) -> S {
        self.storage
    }
}
