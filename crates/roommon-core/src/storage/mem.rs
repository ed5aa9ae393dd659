//! RAM-backed [`BlockStorage`] with I/O accounting and fault injection.
//!
//! Counts storage reads and simulates failed or torn writes, so bounded scans
//! and power-loss handling can be checked off-target.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use thiserror_no_std::Error;

use super::BlockStorage;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("read failed")]
    ReadFailed,
    #[error("write failed")]
    WriteFailed,
    #[error("write torn after {0} bytes")]
    TornWrite(usize),
}

#[derive(Debug, Default)]
pub struct MemStorage {
    files: BTreeMap<String, Vec<u8>>,
    reads: usize,
    lowest_read: Option<u64>,
    unavailable: bool,
    fail_reads: bool,
    fail_writes: bool,
    tear_next_write: Option<usize>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the named file's contents.
    pub fn insert_file(&mut self, name: &str, bytes: Vec<u8>) {
        self.files.insert(name.to_string(), bytes);
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn file_len(&self, name: &str) -> Option<u64> {
        self.files.get(name).map(|f| f.len() as u64)
    }

    /// Number of `read_at` calls since creation or the last [`reset_reads`].
    ///
    /// [`reset_reads`]: MemStorage::reset_reads
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Smallest byte offset passed to `read_at` since the last reset.
    pub fn lowest_read_offset(&self) -> Option<u64> {
        self.lowest_read
    }

    pub fn reset_reads(&mut self) {
        self.reads = 0;
        self.lowest_read = None;
    }

    /// Make every operation fail as if the medium were missing.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Make every `read_at` fail while lengths stay visible.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every write fail without touching the data.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make the next write persist only its first `bytes` bytes and fail.
    pub fn tear_next_write(&mut self, bytes: usize) {
        self.tear_next_write = Some(bytes);
    }

    fn check_available(&self) -> Result<(), MemError> {
        if self.unavailable {
            Err(MemError::Unavailable)
        } else {
            Ok(())
        }
    }
}

fn splice(file: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if file.len() < end {
        file.resize(end, 0);
    }
    file[offset..end].copy_from_slice(data);
}

impl BlockStorage for MemStorage {
    type Error = MemError;

    fn len(&mut self, name: &str) -> Result<Option<u64>, Self::Error> {
        self.check_available()?;
        Ok(self.file_len(name))
    }

    fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.check_available()?;
        if self.fail_reads {
            return Err(MemError::ReadFailed);
        }
        self.reads += 1;
        self.lowest_read = Some(self.lowest_read.map_or(offset, |low| low.min(offset)));

        let Some(file) = self.files.get(name) else {
            return Ok(0);
        };
        let start = (offset as usize).min(file.len());
        let n = buf.len().min(file.len() - start);
        buf[..n].copy_from_slice(&file[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, name: &str, offset: u64, data: &[u8]) -> Result<(), Self::Error> {
        self.check_available()?;
        if self.fail_writes {
            return Err(MemError::WriteFailed);
        }

        let file = self.files.entry(name.to_string()).or_default();
        let offset = offset as usize;

        if let Some(torn) = self.tear_next_write.take() {
            let torn = torn.min(data.len());
            splice(file, offset, &data[..torn]);
            return Err(MemError::TornWrite(torn));
        }

        splice(file, offset, data);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        self.check_available()?;
        self.files.remove(name);
        Ok(())
    }
}
