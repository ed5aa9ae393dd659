use embedded_sdmmc::{BlockDevice, Error, Mode, SdCard, TimeSource, VolumeIdx, VolumeManager};

use super::BlockStorage;

/// [`BlockStorage`] on the first FAT volume of an SD card (or any other
/// `embedded-sdmmc` block device).
///
/// Every operation opens the volume, the root directory and the file, and
/// closes them again before returning, so nothing is left open across deep
/// sleep. File names must be 8.3.
///
/// These operations are blocking, as are the display operations that share
/// the SPI bus.
pub struct SdCardStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    volume_mgr: VolumeManager<D, T, 4, 4, 1>,
}

impl<S, DL, T> SdCardStorage<SdCard<S, DL>, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    DL: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    /// Storage on an SPI-attached SD card
    pub fn from_sd_card(spi: S, delay: DL, ts: T) -> Self {
        Self::new(SdCard::new(spi, delay), ts)
    }
}

impl<D, T> SdCardStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    /// Create a new SD card storage manager
    pub fn new(block_device: D, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(block_device, ts);

        Self { volume_mgr }
    }
}

impl<D, T> BlockStorage for SdCardStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    type Error = Error<D::Error>;

    fn len(&mut self, name: &str) -> Result<Option<u64>, Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        let len = match root_dir.open_file_in_dir(name, Mode::ReadOnly) {
            Ok(file) => {
                let len = file.length();
                file.close()?;
                Some(u64::from(len))
            }
            Err(Error::NotFound) => None,
            Err(e) => return Err(e),
        };

        root_dir.close()?;
        volume0.close()?;

        Ok(len)
    }

    fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        let file = match root_dir.open_file_in_dir(name, Mode::ReadOnly) {
            Ok(file) => file,
            Err(Error::NotFound) => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut filled = 0;
        if offset < u64::from(file.length()) {
            // FAT file sizes are 32-bit, so the offset fits
            file.seek_from_start(offset as u32)?;

            while filled < buf.len() {
                let bytes_read = file.read(&mut buf[filled..])?;
                if bytes_read == 0 {
                    break; // EOF
                }
                filled += bytes_read;
            }
        }

        // Explicitly close resources
        file.close()?;
        root_dir.close()?;
        volume0.close()?;

        Ok(filled)
    }

    fn write_at(&mut self, name: &str, offset: u64, data: &[u8]) -> Result<(), Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, Mode::ReadWriteCreateOrAppend)?;

        file.seek_from_start(offset as u32)?;
        file.write(data)?;

        // Closing flushes the directory entry; errors here mean the write may
        // not be durable
        file.close()?;
        root_dir.close()?;
        volume0.close()?;

        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        match root_dir.delete_file_in_dir(name) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        root_dir.close()?;
        volume0.close()?;

        Ok(())
    }
}
