/// Builder for creating blank ATR/XFD images

use crate::error::Result;
use crate::format::constants::*;
use crate::format::{Header, ImageFormat};
use crate::image::DiskImage;

/// Builder for constructing images
///
/// This is the "new header" factory: it selects the target container format
/// and density for a freshly created image.
pub struct DiskImageBuilder {
    format: ImageFormat,
    sector_size: usize,
    num_sectors: usize,
    short_boot_sectors: bool,
}

impl DiskImageBuilder {
    /// Create a new builder with default values (single density ATR)
    pub fn new() -> Self {
        Self {
            format: ImageFormat::Atr,
            sector_size: SD_SECTOR_SIZE,
            num_sectors: SD_IMAGE_SIZE / SD_SECTOR_SIZE,
            short_boot_sectors: false,
        }
    }

    /// Set the container format
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set sector size
    pub fn sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Set the number of sectors
    pub fn num_sectors(mut self, num_sectors: usize) -> Self {
        self.num_sectors = num_sectors;
        self
    }

    /// 720 sectors of 128 bytes (810 drive)
    pub fn single_density(self) -> Self {
        self.sector_size(SD_SECTOR_SIZE)
            .num_sectors(SD_IMAGE_SIZE / SD_SECTOR_SIZE)
    }

    /// 1040 sectors of 128 bytes (1050 drive)
    pub fn enhanced_density(self) -> Self {
        self.sector_size(SD_SECTOR_SIZE)
            .num_sectors(ED_IMAGE_SIZE / SD_SECTOR_SIZE)
    }

    /// 720 sectors of 256 bytes, the first three stored as 128 bytes
    pub fn double_density(mut self) -> Self {
        self.short_boot_sectors = true;
        self.sector_size(DD_SECTOR_SIZE).num_sectors(720)
    }

    /// Size of the sector data this builder will lay out
    fn data_len(&self) -> usize {
        if self.short_boot_sectors && self.sector_size == DD_SECTOR_SIZE {
            let initial = DD_INITIAL_SECTORS.min(self.num_sectors);
            initial * SD_SECTOR_SIZE + (self.num_sectors - initial) * self.sector_size
        } else {
            self.num_sectors * self.sector_size
        }
    }

    /// Build the header only
    pub fn build_header(&self) -> Result<Header> {
        Header::new(self.format, self.data_len(), self.sector_size)
    }

    /// Build the image with the specified configuration
    pub fn build(self) -> Result<DiskImage> {
        Ok(DiskImage::create(self.build_header()?))
    }
}

impl Default for DiskImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
