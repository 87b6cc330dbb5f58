/// Logical sector records and the DOS 2 sector link encoding

use crate::error::{AtrError, Result};
use crate::format::constants::{DOS2_MAX_FILE_NUM, DOS2_SECTOR_LINK_SIZE};

/// A logical data sector belonging to a file chain
///
/// The payload may be shorter than the physical sector; the remaining
/// bytes of the physical sector hold the link to the next sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorRecord {
    /// Assigned sector number (0 until allocated)
    pub sector_num: usize,
    /// File (directory slot) number owning this sector
    pub file_num: usize,
    /// Next sector in the chain (0 = end of chain)
    pub next_sector_num: usize,
    /// Payload bytes
    data: Vec<u8>,
}

impl SectorRecord {
    /// Create an unnumbered record holding `data`
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            sector_num: 0,
            file_num: 0,
            next_sector_num: 0,
            data,
        }
    }

    /// Get a reference to the payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of payload bytes used
    pub fn used(&self) -> usize {
        self.data.len()
    }

    /// Encode as a physical DOS 2 data sector of `sector_size` bytes
    ///
    /// Layout of the final three bytes:
    /// - `cap`: file number in bits 7-2, high bits of next sector in bits 1-0
    /// - `cap + 1`: low byte of next sector
    /// - `cap + 2`: payload bytes used
    pub fn encode(&self, sector_size: usize) -> Result<Vec<u8>> {
        let cap = sector_size - DOS2_SECTOR_LINK_SIZE;
        if self.data.len() > cap {
            return Err(AtrError::invalid_file(format!(
                "Sector {} payload of {} bytes exceeds {}",
                self.sector_num,
                self.data.len(),
                cap
            )));
        }
        if self.file_num > DOS2_MAX_FILE_NUM || self.next_sector_num > 0x3FF {
            return Err(AtrError::invalid_file(format!(
                "Sector link out of range (file {}, next {})",
                self.file_num, self.next_sector_num
            )));
        }

        let mut raw = vec![0u8; sector_size];
        raw[..self.data.len()].copy_from_slice(&self.data);
        raw[cap] = ((self.file_num as u8) << 2) | ((self.next_sector_num >> 8) & 0x03) as u8;
        raw[cap + 1] = (self.next_sector_num & 0xFF) as u8;
        raw[cap + 2] = self.data.len() as u8;
        Ok(raw)
    }

    /// Decode a physical DOS 2 data sector
    pub fn decode(sector_num: usize, raw: &[u8]) -> Result<Self> {
        if raw.len() <= DOS2_SECTOR_LINK_SIZE {
            return Err(AtrError::invalid_file(format!(
                "Sector {} too small for a link",
                sector_num
            )));
        }
        let cap = raw.len() - DOS2_SECTOR_LINK_SIZE;
        let file_num = (raw[cap] >> 2) as usize;
        let next_sector_num = (((raw[cap] & 0x03) as usize) << 8) | raw[cap + 1] as usize;
        let used = raw[cap + 2] as usize;
        if used > cap {
            return Err(AtrError::invalid_file(format!(
                "Sector {} claims {} bytes used, max {}",
                sector_num, used, cap
            )));
        }

        Ok(Self {
            sector_num,
            file_num,
            next_sector_num,
            data: raw[..used].to_vec(),
        })
    }
}

impl std::fmt::Display for SectorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector {} (file {}, {} bytes, next {})",
            self.sector_num,
            self.file_num,
            self.used(),
            self.next_sector_num
        )
    }
}
