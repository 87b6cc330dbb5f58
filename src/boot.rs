/// Boot record parsing and boot disk detection
///
/// The first six bytes of sector 1 form the boot record the OS reads before
/// loading the rest of the boot sectors:
/// - 0x00: flag (0 for a bootable disk)
/// - 0x01: number of sectors to load
/// - 0x02: load address (u16)
/// - 0x04: init address (u16)

use crate::error::{AtrError, Result};
use crate::image::DiskImage;
use std::fmt;

/// Top of the RAM the OS can load boot sectors into
pub const BOOT_MAX_RAM: usize = 0xC000;

/// Lowest sensible load address (above page zero, stack and OS workspace)
pub const BOOT_MIN_LOAD_ADDRESS: usize = 0x0200;

/// Size of the boot record
pub const BOOT_RECORD_SIZE: usize = 6;

/// Decoded boot record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    /// Boot flag
    pub flag: u8,
    /// Sectors to load
    pub sector_count: u8,
    /// Load address
    pub load_address: u16,
    /// Initialization address
    pub init_address: u16,
}

impl BootRecord {
    /// Parse the boot record from the start of sector 1
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BOOT_RECORD_SIZE {
            return Err(AtrError::invalid_format(format!(
                "Boot record needs {} bytes, got {}",
                BOOT_RECORD_SIZE,
                data.len()
            )));
        }
        Ok(Self {
            flag: data[0],
            sector_count: data[1],
            load_address: u16::from_le_bytes([data[2], data[3]]),
            init_address: u16::from_le_bytes([data[4], data[5]]),
        })
    }

    /// Read the boot record of an image
    pub fn from_image(image: &DiskImage) -> Result<Self> {
        Self::parse(image.read_sector(1)?)
    }

    /// First two bytes are 0xFFFF, the signature of a binary load file
    pub fn is_executable(&self) -> bool {
        self.flag == 0xFF && self.sector_count == 0xFF
    }

    /// Check the record describes something the OS could actually boot
    ///
    /// The boot sectors have to fit below [`BOOT_MAX_RAM`] since nothing can
    /// be banked in until they have finished loading.
    pub fn check(&self, sector_size: usize) -> Result<()> {
        if self.is_executable() {
            return Err(AtrError::invalid_format("Appears to be an executable"));
        }

        let count = self.sector_count as usize;
        let load = self.load_address as usize;
        let max_sectors = BOOT_MAX_RAM.saturating_sub(load) / sector_size.max(1);
        if count < 1 || count > max_sectors {
            return Err(AtrError::invalid_format(format!(
                "Number of boot sectors out of range: {}",
                count
            )));
        }
        if load < BOOT_MIN_LOAD_ADDRESS || load + count * sector_size > BOOT_MAX_RAM {
            return Err(AtrError::invalid_format(format!(
                "Bad boot load address: ${:04X}",
                load
            )));
        }
        Ok(())
    }

    /// Bytes covered by the boot sectors
    pub fn boot_length(&self, sector_size: usize) -> usize {
        self.sector_count as usize * sector_size
    }
}

impl fmt::Display for BootRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flag ${:02X}, {} sectors, load ${:04X}, init ${:04X}",
            self.flag, self.sector_count, self.load_address, self.init_address
        )
    }
}

/// Check whether an image is a plausible boot disk
///
/// Returns the boot record when the image passes.
pub fn detect_boot_disk(image: &DiskImage) -> Result<BootRecord> {
    let record = BootRecord::from_image(image)?;
    record.check(image.header().sector_size_of(1)?)?;
    Ok(record)
}

/// Read the code loaded by the boot record (sectors 1..=count)
pub fn read_boot_code(image: &DiskImage, record: &BootRecord) -> Result<Vec<u8>> {
    let count = (record.sector_count as usize).max(1);
    Ok(image.read_sectors(1, count)?.to_vec())
}
