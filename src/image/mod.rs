/// ATR/XFD image data structures

/// Image builder for creating blank images
pub mod builder;
/// Logical sector records
pub mod sector;

pub use builder::DiskImageBuilder;
pub use sector::SectorRecord;

use crate::error::{AtrError, Result};
use crate::filesystem::transaction::TransactionState;
use crate::format::{detect_format, Header, ImageFormat};
use log::{debug, warn};
use std::ops::Range;
use std::path::Path;

/// Main disk image container
///
/// Owns the raw bytes of the image (header included) and addresses them as
/// numbered sectors through the [`Header`].
#[derive(Debug, Clone)]
pub struct DiskImage {
    /// Raw image bytes, header included
    pub(crate) data: Vec<u8>,
    /// Parsed header and geometry
    pub(crate) header: Header,
    /// Has the image been modified?
    pub(crate) changed: bool,
    /// Original filename if loaded from disk
    pub(crate) filename: Option<String>,
    /// State of the transaction holding this image, if any
    pub(crate) transaction: TransactionState,
}

impl DiskImage {
    /// Open an ATR or XFD file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::io::reader::read_image(path)
    }

    /// Wrap raw image bytes, detecting the format from the signature
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let format = detect_format(&data);
        let header = match format {
            ImageFormat::Atr => {
                let mut header = Header::decode(&data)?;
                let actual = data.len() - header.header_len();
                if actual != header.image_size {
                    warn!(
                        "ATR header declares {} bytes of sector data but image has {}",
                        header.image_size, actual
                    );
                    header.fit_to_size(actual)?;
                }
                header
            }
            ImageFormat::Xfd => {
                if data.is_empty() {
                    return Err(AtrError::invalid_format("Empty image"));
                }
                Header::new(ImageFormat::Xfd, data.len(), crate::format::SD_SECTOR_SIZE)?
            }
        };
        debug!("opened {}", header);

        Ok(Self {
            data,
            header,
            changed: false,
            filename: None,
            transaction: TransactionState::Idle,
        })
    }

    /// Create a new blank image with the given header
    pub fn create(header: Header) -> Self {
        let mut data = header.encode();
        data.resize(header.header_len() + header.image_size, 0);
        Self {
            data,
            header,
            changed: true, // Newly created image is considered changed
            filename: None,
            transaction: TransactionState::Idle,
        }
    }

    /// Create a new builder for constructing images
    pub fn builder() -> DiskImageBuilder {
        DiskImageBuilder::new()
    }

    /// Get the container format
    pub fn format(&self) -> ImageFormat {
        self.header.format
    }

    /// Get the header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Get the original filename if loaded from disk
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Raw image bytes, header included
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image and return its raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Number of addressable sectors
    pub fn sector_count(&self) -> usize {
        self.header.max_sectors
    }

    /// Byte range covered by `count` sectors starting at `sector`
    fn sector_range(&self, sector: usize, count: usize) -> Result<Range<usize>> {
        let (start, len) = self.contiguous_region(sector, count)?;
        if start + len > self.data.len() {
            return Err(AtrError::SectorOutOfRange {
                sector: sector + count.saturating_sub(1),
                first: self.header.starting_sector_label,
                last: self.header.last_sector(),
            });
        }
        Ok(start..start + len)
    }

    /// Offset and total length of a run of `count` sectors
    ///
    /// Sector sizes are summed one by one since the boot sectors of a double
    /// density image are smaller than the rest.
    pub fn contiguous_region(&self, sector: usize, count: usize) -> Result<(usize, usize)> {
        let (start, _) = self.header.sector_to_offset(sector)?;
        let mut total = 0;
        for next in sector..sector + count {
            total += self.header.sector_size_of(next)?;
        }
        Ok((start, total))
    }

    /// Read a single sector
    pub fn read_sector(&self, sector: usize) -> Result<&[u8]> {
        self.read_sectors(sector, sector)
    }

    /// Read the contiguous sectors `start..=end`
    pub fn read_sectors(&self, start: usize, end: usize) -> Result<&[u8]> {
        if end < start {
            return Err(self.header.out_of_range(end));
        }
        let range = self.sector_range(start, end - start + 1)?;
        Ok(&self.data[range])
    }

    /// Write a single sector; `data` must be exactly the sector's size
    pub fn write_sector(&mut self, sector: usize, data: &[u8]) -> Result<()> {
        let range = self.sector_range(sector, 1)?;
        if range.len() != data.len() {
            return Err(AtrError::SizeMismatch {
                sector,
                expected: range.len(),
                actual: data.len(),
            });
        }
        debug!("writing sector {} ({} bytes)", sector, data.len());
        self.data[range].copy_from_slice(data);
        self.changed = true;
        Ok(())
    }

    /// Write consecutive sectors starting at `start`
    ///
    /// The data must cover whole sectors; the run is validated before any
    /// byte is copied.
    pub fn write_sectors(&mut self, start: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut count = 0;
        let mut covered = 0;
        while covered < data.len() {
            covered += self.header.sector_size_of(start + count)?;
            count += 1;
        }
        let range = self.sector_range(start, count)?;
        if range.len() != data.len() {
            return Err(AtrError::SizeMismatch {
                sector: start,
                expected: range.len(),
                actual: data.len(),
            });
        }
        debug!("writing sectors {}..{} ({} bytes)", start, start + count, data.len());
        self.data[range].copy_from_slice(data);
        self.changed = true;
        Ok(())
    }

    /// Iterate over (sector number, byte offset, size) for every sector
    pub fn iter_sectors(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let first = self.header.starting_sector_label;
        (first..first + self.header.max_sectors).filter_map(move |sector| {
            self.header
                .sector_to_offset(sector)
                .ok()
                .map(|(pos, size)| (sector, pos, size))
        })
    }

    /// Create a copy of this image in another container format
    ///
    /// The sector data is kept as is; only the header changes.
    pub fn as_new_format(&self, format: ImageFormat) -> Result<Self> {
        let sectors = &self.data[self.header.header_len()..];
        let mut header = Header::new(format, sectors.len(), self.header.sector_size)?;
        header.crc = self.header.crc;
        header.flags = self.header.flags;

        let mut data = header.encode();
        data.extend_from_slice(sectors);
        Ok(Self {
            data,
            header,
            changed: true,
            filename: None,
            transaction: TransactionState::Idle,
        })
    }

    /// Save the image to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        crate::io::writer::write_image(self, path)?;
        self.changed = false;
        Ok(())
    }

    /// Check if the image has been modified
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Mark the image as unchanged
    pub fn mark_unchanged(&mut self) {
        self.changed = false;
    }

    /// Get the total capacity of the sector data in bytes
    pub fn total_capacity(&self) -> usize {
        self.header.image_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DD_SHORT_BOOT_IMAGE_SIZE, SD_IMAGE_SIZE};

    #[test]
    fn test_create_image() {
        let image = DiskImage::builder().build().unwrap();

        assert_eq!(image.format(), ImageFormat::Atr);
        assert_eq!(image.sector_count(), 720);
        assert_eq!(image.as_bytes().len(), 16 + SD_IMAGE_SIZE);
        assert!(image.is_changed());
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let image = DiskImage::builder().build().unwrap();
        let bytes = image.into_bytes();
        let reopened = DiskImage::from_bytes(bytes.clone()).unwrap();

        assert_eq!(reopened.format(), ImageFormat::Atr);
        assert_eq!(reopened.as_bytes(), bytes.as_slice());
        assert!(!reopened.is_changed());
    }

    #[test]
    fn test_from_bytes_xfd() {
        let image = DiskImage::from_bytes(vec![0u8; SD_IMAGE_SIZE]).unwrap();
        assert_eq!(image.format(), ImageFormat::Xfd);
        assert_eq!(image.sector_count(), 720);
        assert!(DiskImage::from_bytes(Vec::new()).is_err());
    }

    #[test]
    fn test_header_size_disagreement_uses_actual_data() {
        let mut bytes = DiskImage::builder().build().unwrap().into_bytes();
        bytes.truncate(16 + 100 * 128);
        let image = DiskImage::from_bytes(bytes).unwrap();
        assert_eq!(image.sector_count(), 100);
    }

    #[test]
    fn test_read_write_sector() {
        let mut image = DiskImage::builder().build().unwrap();

        let test_data = vec![0x42; 128];
        image.write_sector(5, &test_data).unwrap();

        let read_data = image.read_sector(5).unwrap();
        assert_eq!(read_data, test_data.as_slice());
        assert_eq!(&image.as_bytes()[16 + 4 * 128..16 + 5 * 128], test_data.as_slice());
    }

    #[test]
    fn test_write_wrong_size_is_rejected() {
        let mut image = DiskImage::builder().build().unwrap();
        image.mark_unchanged();
        let before = image.as_bytes().to_vec();

        let result = image.write_sector(5, &[0x42; 100]);
        assert!(matches!(result, Err(AtrError::SizeMismatch { expected: 128, actual: 100, .. })));
        assert_eq!(image.as_bytes(), before.as_slice());
        assert!(!image.is_changed());
    }

    #[test]
    fn test_write_invalid_sector() {
        let mut image = DiskImage::builder().build().unwrap();
        let result = image.write_sector(721, &[0; 128]);
        assert!(matches!(result, Err(AtrError::SectorOutOfRange { .. })));
    }

    #[test]
    fn test_contiguous_region_mixed_sizes() {
        let image = DiskImage::builder().double_density().build().unwrap();
        assert_eq!(image.header().image_size, DD_SHORT_BOOT_IMAGE_SIZE);

        // Three 128 byte boot sectors then 256 byte sectors
        assert_eq!(image.contiguous_region(1, 3).unwrap(), (16, 384));
        assert_eq!(image.contiguous_region(2, 3).unwrap(), (16 + 128, 128 + 128 + 256));
        assert_eq!(image.read_sectors(1, 4).unwrap().len(), 640);
    }

    #[test]
    fn test_write_sectors_run() {
        let mut image = DiskImage::builder().build().unwrap();
        let data: Vec<u8> = (0..384).map(|i| i as u8).collect();
        image.write_sectors(10, &data).unwrap();
        assert_eq!(image.read_sectors(10, 12).unwrap(), data.as_slice());

        // Partial sector at the end is rejected before anything is written
        let before = image.as_bytes().to_vec();
        assert!(image.write_sectors(20, &[1u8; 200]).is_err());
        assert_eq!(image.as_bytes(), before.as_slice());

        // Run that walks off the end of the disk
        assert!(image.write_sectors(720, &[1u8; 256]).is_err());
        assert_eq!(image.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_empty_and_reversed_runs() {
        let mut image = DiskImage::builder().build().unwrap();
        image.mark_unchanged();

        assert_eq!(image.contiguous_region(10, 0).unwrap(), (16 + 9 * 128, 0));
        assert_eq!(image.contiguous_region(10, 2).unwrap(), (16 + 9 * 128, 256));
        assert!(matches!(
            image.read_sectors(10, 5),
            Err(AtrError::SectorOutOfRange { sector: 5, .. })
        ));

        let before = image.as_bytes().to_vec();
        image.write_sectors(10, &[]).unwrap();
        assert_eq!(image.as_bytes(), before.as_slice());
        assert!(!image.is_changed());
    }

    #[test]
    fn test_as_new_format() {
        let mut image = DiskImage::builder().build().unwrap();
        image.write_sector(1, &[7u8; 128]).unwrap();

        let xfd = image.as_new_format(ImageFormat::Xfd).unwrap();
        assert_eq!(xfd.format(), ImageFormat::Xfd);
        assert_eq!(xfd.as_bytes().len(), SD_IMAGE_SIZE);
        assert_eq!(xfd.read_sector(1).unwrap(), &[7u8; 128][..]);

        let atr = xfd.as_new_format(ImageFormat::Atr).unwrap();
        assert_eq!(atr.as_bytes(), image.as_bytes());
    }

    #[test]
    fn test_iter_sectors() {
        let image = DiskImage::builder().double_density().build().unwrap();
        let sectors: Vec<_> = image.iter_sectors().collect();
        assert_eq!(sectors.len(), 720);
        assert_eq!(sectors[0], (1, 16, 128));
        assert_eq!(sectors[3], (4, 16 + 384, 256));
    }
}
