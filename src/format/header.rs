/// Image header codec and sector addressing
///
/// ATR header layout (16 bytes, little-endian):
/// - 0x00: magic 0x0296
/// - 0x02: image size in 16-byte paragraphs, low word
/// - 0x04: sector size
/// - 0x06: image size in paragraphs, high byte
/// - 0x07: CRC (u32)
/// - 0x0B: unused (u32)
/// - 0x0F: flags
///
/// XFD images are the same sector data with no header at all.

use crate::error::{AtrError, Result};
use crate::format::constants::*;
use crate::format::ImageFormat;

/// Parsed image header plus the sector geometry derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Container format
    pub format: ImageFormat,
    /// Size of the sector data in bytes (excluding the header)
    pub image_size: usize,
    /// Size of regular sectors
    pub sector_size: usize,
    /// Size of the leading boot sectors, when they differ from `sector_size`
    pub initial_sector_size: usize,
    /// Number of leading boot sectors using `initial_sector_size`
    pub num_initial_sectors: usize,
    /// Number of the first sector
    pub starting_sector_label: usize,
    /// Number of addressable sectors
    pub max_sectors: usize,
    /// Sectors per track
    pub sectors_per_track: usize,
    /// CRC field (ATR only)
    pub crc: u32,
    /// Unused field (ATR only)
    pub unused: u32,
    /// Flags field (ATR only)
    pub flags: u8,
}

impl Header {
    fn empty(format: ImageFormat, sector_size: usize) -> Self {
        Self {
            format,
            image_size: 0,
            sector_size,
            initial_sector_size: 0,
            num_initial_sectors: 0,
            starting_sector_label: 1,
            max_sectors: 0,
            sectors_per_track: SECTORS_PER_TRACK,
            crc: 0,
            unused: 0,
            flags: 0,
        }
    }

    /// Create a header for `data_len` bytes of sector data
    ///
    /// `sector_size` is only a hint for sizes that do not identify their own
    /// density.
    pub fn new(format: ImageFormat, data_len: usize, sector_size: usize) -> Result<Self> {
        if sector_size != SD_SECTOR_SIZE && sector_size != DD_SECTOR_SIZE {
            return Err(AtrError::invalid_format(format!(
                "Unsupported sector size {}",
                sector_size
            )));
        }
        let mut header = Self::empty(format, sector_size);
        header.fit_to_size(data_len)?;
        Ok(header)
    }

    /// Decode a 16 byte ATR header
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ATR_HEADER_SIZE {
            return Err(AtrError::invalid_format(format!(
                "ATR header needs {} bytes, got {}",
                ATR_HEADER_SIZE,
                bytes.len()
            )));
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != ATR_MAGIC {
            return Err(AtrError::invalid_format(format!(
                "Bad ATR signature 0x{:04X}",
                magic
            )));
        }

        let pars = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let sector_size = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        let pars_high = bytes[6] as usize;
        let image_size = (pars_high * 0x1_0000 + pars) * ATR_PARAGRAPH_SIZE;

        let mut header = Self::new(ImageFormat::Atr, image_size, sector_size)?;
        header.crc = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        header.unused = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);
        header.flags = bytes[15];
        Ok(header)
    }

    /// Encode the header into its on-disk form (empty for XFD)
    pub fn encode(&self) -> Vec<u8> {
        match self.format {
            ImageFormat::Xfd => Vec::new(),
            ImageFormat::Atr => {
                let mut raw = vec![0u8; ATR_HEADER_SIZE];
                let paragraphs = self.image_size / ATR_PARAGRAPH_SIZE;
                raw[0..2].copy_from_slice(&ATR_MAGIC.to_le_bytes());
                raw[2..4].copy_from_slice(&((paragraphs & 0xFFFF) as u16).to_le_bytes());
                raw[4..6].copy_from_slice(&(self.sector_size as u16).to_le_bytes());
                raw[6] = ((paragraphs >> 16) & 0xFF) as u8;
                raw[7..11].copy_from_slice(&self.crc.to_le_bytes());
                raw[11..15].copy_from_slice(&self.unused.to_le_bytes());
                raw[15] = self.flags;
                raw
            }
        }
    }

    /// Number of header bytes preceding sector 1
    pub fn header_len(&self) -> usize {
        self.format.header_len()
    }

    /// Derive the sector geometry from the size of the sector data
    pub fn fit_to_size(&mut self, size: usize) -> Result<()> {
        let (sector_size, initial_size, num_initial) = match size {
            SD_IMAGE_SIZE => (SD_SECTOR_SIZE, 0, 0),
            DD_IMAGE_SIZE => (DD_SECTOR_SIZE, 0, 0),
            DD_SHORT_BOOT_IMAGE_SIZE => (DD_SECTOR_SIZE, SD_SECTOR_SIZE, DD_INITIAL_SECTORS),
            _ if self.sector_size == DD_SECTOR_SIZE
                && size > DD_INITIAL_SECTORS * SD_SECTOR_SIZE
                && (size - DD_INITIAL_SECTORS * SD_SECTOR_SIZE) % DD_SECTOR_SIZE == 0 =>
            {
                (DD_SECTOR_SIZE, SD_SECTOR_SIZE, DD_INITIAL_SECTORS)
            }
            _ => (self.sector_size, 0, 0),
        };

        let initial_bytes = initial_size * num_initial;
        if size < initial_bytes || sector_size == 0 {
            return Err(AtrError::invalid_format(format!(
                "Image size {} too small",
                size
            )));
        }

        self.image_size = size;
        self.sector_size = sector_size;
        self.initial_sector_size = initial_size;
        self.num_initial_sectors = num_initial;
        self.max_sectors = (size - initial_bytes) / sector_size + num_initial;
        self.sectors_per_track = if self.max_sectors == ED_IMAGE_SIZE / SD_SECTOR_SIZE {
            ED_SECTORS_PER_TRACK
        } else {
            SECTORS_PER_TRACK
        };
        Ok(())
    }

    /// Reject XFD images whose size is not one of the common densities
    pub fn strict_check(&self) -> Result<()> {
        if self.format == ImageFormat::Xfd && !XFD_KNOWN_SIZES.contains(&self.image_size) {
            return Err(AtrError::invalid_format(format!(
                "Uncommon size of XFD file: {}",
                self.image_size
            )));
        }
        Ok(())
    }

    /// Last valid sector number
    pub fn last_sector(&self) -> usize {
        (self.starting_sector_label + self.max_sectors).saturating_sub(1)
    }

    /// Check whether a sector number lies inside the image
    pub fn sector_is_valid(&self, sector: usize) -> bool {
        sector >= self.starting_sector_label
            && sector < self.starting_sector_label + self.max_sectors
    }

    pub(crate) fn out_of_range(&self, sector: usize) -> AtrError {
        AtrError::SectorOutOfRange {
            sector,
            first: self.starting_sector_label,
            last: self.last_sector(),
        }
    }

    /// Size in bytes of a sector
    pub fn sector_size_of(&self, sector: usize) -> Result<usize> {
        self.sector_to_offset(sector).map(|(_, size)| size)
    }

    /// Translate a sector number into (byte offset into the image, size)
    pub fn sector_to_offset(&self, sector: usize) -> Result<(usize, usize)> {
        if !self.sector_is_valid(sector) {
            return Err(self.out_of_range(sector));
        }

        let index = sector - self.starting_sector_label;
        let (pos, size) = if index < self.num_initial_sectors {
            (index * self.initial_sector_size, self.initial_sector_size)
        } else {
            let initial_bytes = self.num_initial_sectors * self.initial_sector_size;
            (
                initial_bytes + (index - self.num_initial_sectors) * self.sector_size,
                self.sector_size,
            )
        };
        Ok((pos + self.header_len(), size))
    }

    /// Sector number from a track and sector within the track (both 0-based)
    pub fn sector_from_track(&self, track: usize, sector: usize) -> usize {
        track * self.sectors_per_track + sector + self.starting_sector_label
    }

    /// Track and sector within the track (both 0-based) from a sector number
    pub fn track_from_sector(&self, sector: usize) -> (usize, usize) {
        let index = sector.saturating_sub(self.starting_sector_label);
        (index / self.sectors_per_track, index % self.sectors_per_track)
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.format {
            ImageFormat::Atr => write!(
                f,
                "ATR Disk Image (size={} ({}x{}b), crc={} flags={} unused={})",
                self.image_size, self.max_sectors, self.sector_size, self.crc, self.flags, self.unused
            ),
            ImageFormat::Xfd => write!(
                f,
                "XFD Disk Image (size={} ({}x{}b))",
                self.image_size, self.max_sectors, self.sector_size
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_offsets() {
        let header = Header::new(ImageFormat::Atr, 130 * 128, 128).unwrap();
        assert_eq!(header.max_sectors, 130);
        assert_eq!(header.sector_to_offset(1).unwrap(), (16, 128));
        assert_eq!(header.sector_to_offset(2).unwrap(), (144, 128));
        assert_eq!(header.sector_to_offset(130).unwrap(), (16 + 129 * 128, 128));
    }

    #[test]
    fn test_out_of_range() {
        let header = Header::new(ImageFormat::Atr, SD_IMAGE_SIZE, 128).unwrap();
        assert!(matches!(
            header.sector_to_offset(0),
            Err(AtrError::SectorOutOfRange { sector: 0, .. })
        ));
        assert!(header.sector_to_offset(720).is_ok());
        assert!(matches!(
            header.sector_to_offset(721),
            Err(AtrError::SectorOutOfRange { sector: 721, first: 1, last: 720 })
        ));
    }

    #[test]
    fn test_double_density_boot_sectors() {
        let header = Header::new(ImageFormat::Atr, DD_SHORT_BOOT_IMAGE_SIZE, 256).unwrap();
        assert_eq!(header.max_sectors, 720);
        assert_eq!(header.num_initial_sectors, 3);
        assert_eq!(header.sector_to_offset(1).unwrap(), (16, 128));
        assert_eq!(header.sector_to_offset(3).unwrap(), (16 + 256, 128));
        assert_eq!(header.sector_to_offset(4).unwrap(), (16 + 384, 256));
        assert_eq!(header.sector_to_offset(5).unwrap(), (16 + 384 + 256, 256));
        assert_eq!(header.sector_to_offset(720).unwrap(), (16 + 384 + 716 * 256, 256));
    }

    #[test]
    fn test_xfd_has_no_header() {
        let header = Header::new(ImageFormat::Xfd, SD_IMAGE_SIZE, 128).unwrap();
        assert!(header.encode().is_empty());
        assert_eq!(header.sector_to_offset(1).unwrap(), (0, 128));
        assert!(header.strict_check().is_ok());

        let odd = Header::new(ImageFormat::Xfd, 1000 * 128, 128).unwrap();
        assert!(odd.strict_check().is_err());
    }

    #[test]
    fn test_encode_decode() {
        let mut header = Header::new(ImageFormat::Atr, DD_SHORT_BOOT_IMAGE_SIZE, 256).unwrap();
        header.flags = 1;
        let raw = header.encode();
        assert_eq!(&raw[0..2], &[0x96, 0x02]);
        assert_eq!(u16::from_le_bytes([raw[4], raw[5]]), 256);

        let decoded = Header::decode(&raw).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_bad_magic() {
        let raw = [0u8; 16];
        assert!(matches!(Header::decode(&raw), Err(AtrError::InvalidFormat(_))));
        assert!(Header::decode(&[0x96, 0x02]).is_err());
    }

    #[test]
    fn test_large_image_paragraphs() {
        // 16MB image needs the high paragraph byte
        let header = Header::new(ImageFormat::Atr, 65535 * 256, 256).unwrap();
        let raw = header.encode();
        assert_ne!(raw[6], 0);
        assert_eq!(Header::decode(&raw).unwrap().image_size, 65535 * 256);
    }

    #[test]
    fn test_track_conversion() {
        let header = Header::new(ImageFormat::Atr, SD_IMAGE_SIZE, 128).unwrap();
        assert_eq!(header.track_from_sector(1), (0, 0));
        assert_eq!(header.track_from_sector(19), (1, 0));
        assert_eq!(header.sector_from_track(20, 0), 361);

        let enhanced = Header::new(ImageFormat::Atr, ED_IMAGE_SIZE, 128).unwrap();
        assert_eq!(enhanced.max_sectors, 1040);
        assert_eq!(enhanced.sectors_per_track, 26);
    }
}
