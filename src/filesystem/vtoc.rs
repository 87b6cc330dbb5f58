/// DOS 2 Volume Table Of Contents (free sector bitmap)
///
/// VTOC sector layout:
/// - 0x00: DOS code (2)
/// - 0x01: total usable sectors (u16)
/// - 0x03: free sectors (u16)
/// - 0x0A: bitmap, one bit per sector 0-719, bit 7 of byte 0x0A is sector 0,
///   a set bit means the sector is free

use crate::error::{AtrError, Result};
use crate::format::constants::*;
use log::{debug, warn};

/// Free sector map decoded from the VTOC sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtoc {
    /// Original VTOC sector bytes; non-bitmap fields are carried through
    raw: Vec<u8>,
    /// One entry per sector number, true = free
    sector_map: Vec<bool>,
    /// Sectors at or above this number are never handed out
    limit: usize,
}

impl Vtoc {
    /// Blank VTOC with every sector marked used
    pub fn new(sector_size: usize) -> Self {
        let mut raw = vec![0u8; sector_size.max(SD_SECTOR_SIZE)];
        raw[0] = DOS2_VTOC_CODE;
        Self {
            raw,
            sector_map: vec![false; DOS2_VTOC_BITMAP_SECTORS],
            limit: DOS2_VTOC_BITMAP_SECTORS,
        }
    }

    /// VTOC of a freshly formatted disk whose last sector is `last_sector`
    ///
    /// Boot, VTOC and directory sectors stay marked used, as does sector 720
    /// which DOS 2 cannot address in its bitmap.
    pub fn formatted(sector_size: usize, last_sector: usize) -> Self {
        let mut vtoc = Self::new(sector_size);
        vtoc.limit = (last_sector + 1).min(DOS2_VTOC_BITMAP_SECTORS);
        let reserved = DOS2_VTOC_SECTOR..DOS2_DIRECTORY_SECTOR + DOS2_DIRECTORY_SECTORS;
        for sector in DOS2_BOOT_SECTORS + 1..vtoc.limit {
            if !reserved.contains(&sector) {
                vtoc.sector_map[sector] = true;
            }
        }
        let total = vtoc.free_count() as u16;
        vtoc.raw[1..3].copy_from_slice(&total.to_le_bytes());
        vtoc.raw = vtoc.pack();
        vtoc
    }

    /// Decode the bitmap out of a VTOC sector
    pub fn unpack(raw: &[u8]) -> Result<Self> {
        let bitmap_len = DOS2_VTOC_BITMAP_SECTORS / 8;
        if raw.len() < DOS2_VTOC_BITMAP_OFFSET + bitmap_len {
            return Err(AtrError::invalid_format(format!(
                "VTOC needs {} bytes, got {}",
                DOS2_VTOC_BITMAP_OFFSET + bitmap_len,
                raw.len()
            )));
        }

        let bitmap = &raw[DOS2_VTOC_BITMAP_OFFSET..DOS2_VTOC_BITMAP_OFFSET + bitmap_len];
        let sector_map = (0..DOS2_VTOC_BITMAP_SECTORS)
            .map(|sector| bitmap[sector / 8] & (0x80 >> (sector % 8)) != 0)
            .collect();

        Ok(Self {
            raw: raw.to_vec(),
            sector_map,
            limit: DOS2_VTOC_BITMAP_SECTORS,
        })
    }

    /// Encode the bitmap and free count back into the VTOC sector
    ///
    /// The stored count is the number of set bits in the bitmap, so an
    /// unpacked sector packs back to the same bytes.
    pub fn pack(&self) -> Vec<u8> {
        let mut raw = self.raw.clone();
        let free = self.sector_map.iter().filter(|free| **free).count() as u16;
        raw[3..5].copy_from_slice(&free.to_le_bytes());

        let bitmap = &mut raw[DOS2_VTOC_BITMAP_OFFSET..DOS2_VTOC_BITMAP_OFFSET + DOS2_VTOC_BITMAP_SECTORS / 8];
        bitmap.fill(0);
        for (sector, _) in self.sector_map.iter().enumerate().filter(|(_, free)| **free) {
            bitmap[sector / 8] |= 0x80 >> (sector % 8);
        }
        raw
    }

    /// Never hand out sectors past the end of the image
    pub fn restrict_to(&mut self, last_sector: usize) {
        self.limit = (last_sector + 1).min(DOS2_VTOC_BITMAP_SECTORS);
    }

    /// DOS code byte
    pub fn dos_code(&self) -> u8 {
        self.raw[0]
    }

    /// Total usable sectors as recorded in the VTOC
    pub fn total_sectors(&self) -> usize {
        u16::from_le_bytes([self.raw[1], self.raw[2]]) as usize
    }

    /// Free sector count as recorded in the VTOC (not recomputed)
    pub fn recorded_free(&self) -> usize {
        u16::from_le_bytes([self.raw[3], self.raw[4]]) as usize
    }

    /// Check if a sector is free
    pub fn is_free(&self, sector: usize) -> bool {
        self.sector_map.get(sector).copied().unwrap_or(false)
    }

    /// Iterate over allocatable free sectors, lowest first
    ///
    /// Sector 0 does not exist on disk, so it is never offered even if the
    /// bitmap claims it is free.
    pub fn iter_free(&self) -> impl Iterator<Item = usize> + '_ {
        (1..self.limit).filter(move |&sector| self.sector_map[sector])
    }

    /// Number of free sectors
    pub fn free_count(&self) -> usize {
        self.iter_free().count()
    }

    /// Reserve `num` sectors, lowest numbered first
    ///
    /// Returns them in allocation order, which becomes the chain order. Either
    /// all `num` sectors are reserved or none are.
    pub fn reserve(&mut self, num: usize) -> Result<Vec<usize>> {
        let order: Vec<usize> = self.iter_free().take(num).collect();
        if order.len() < num {
            return Err(AtrError::NotEnoughSpace {
                needed: num,
                available: order.len(),
            });
        }

        for &sector in &order {
            self.sector_map[sector] = false;
        }
        debug!("sectors reserved: {:?}", order);
        Ok(order)
    }

    /// Mark sectors free again
    pub fn release(&mut self, sectors: &[usize]) {
        for &sector in sectors {
            match self.sector_map.get_mut(sector) {
                Some(entry) => *entry = true,
                None => warn!("sector {} is outside the VTOC bitmap", sector),
            }
        }
        debug!("sectors released: {:?}", sectors);
    }

    /// Rows of the bitmap grouped by track, for display
    pub fn track_rows(&self, sectors_per_track: usize) -> Vec<Vec<bool>> {
        self.sector_map[1..]
            .chunks(sectors_per_track.max(1))
            .map(|row| row.to_vec())
            .collect()
    }
}
