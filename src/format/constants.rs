/// ATR/XFD format magic numbers and Atari DOS 2 layout constants

/// ATR header signature (little-endian 0x0296, "NICKATARI" sum)
pub const ATR_MAGIC: u16 = 0x0296;

/// Size of the ATR header
pub const ATR_HEADER_SIZE: usize = 16;

/// Bytes per ATR size paragraph
pub const ATR_PARAGRAPH_SIZE: usize = 16;

/// Single density sector size
pub const SD_SECTOR_SIZE: usize = 128;

/// Double density sector size
pub const DD_SECTOR_SIZE: usize = 256;

/// Number of 128-byte boot sectors leading a double density image
pub const DD_INITIAL_SECTORS: usize = 3;

/// Single density data size (720 x 128)
pub const SD_IMAGE_SIZE: usize = 92_160;

/// Enhanced density data size (1040 x 128)
pub const ED_IMAGE_SIZE: usize = 133_120;

/// Double density data size with full-size boot sectors (720 x 256)
pub const DD_IMAGE_SIZE: usize = 184_320;

/// Double density data size with 128-byte boot sectors (3 x 128 + 717 x 256)
pub const DD_SHORT_BOOT_IMAGE_SIZE: usize = 183_936;

/// Data sizes accepted by the strict XFD check
pub const XFD_KNOWN_SIZES: [usize; 4] = [
    SD_IMAGE_SIZE,
    ED_IMAGE_SIZE,
    DD_SHORT_BOOT_IMAGE_SIZE,
    DD_IMAGE_SIZE,
];

/// Sectors per track, single and double density
pub const SECTORS_PER_TRACK: usize = 18;

/// Sectors per track, enhanced density
pub const ED_SECTORS_PER_TRACK: usize = 26;

/// Number of boot sectors reserved by DOS 2
pub const DOS2_BOOT_SECTORS: usize = 3;

/// VTOC sector
pub const DOS2_VTOC_SECTOR: usize = 360;

/// First directory sector
pub const DOS2_DIRECTORY_SECTOR: usize = 361;

/// Number of directory sectors
pub const DOS2_DIRECTORY_SECTORS: usize = 8;

/// Size of one directory entry
pub const DOS2_DIRENT_SIZE: usize = 16;

/// Directory entries per sector (only the first 128 bytes hold entries)
pub const DOS2_DIRENTS_PER_SECTOR: usize = SD_SECTOR_SIZE / DOS2_DIRENT_SIZE;

/// Maximum directory entries
pub const DOS2_MAX_DIRENTS: usize = DOS2_DIRECTORY_SECTORS * DOS2_DIRENTS_PER_SECTOR;

/// DOS code stored in the first VTOC byte
pub const DOS2_VTOC_CODE: u8 = 2;

/// Offset of the sector bitmap within the VTOC
pub const DOS2_VTOC_BITMAP_OFFSET: usize = 10;

/// Sectors covered by the VTOC bitmap (0..=719)
pub const DOS2_VTOC_BITMAP_SECTORS: usize = 720;

/// Bytes of link information trailing each data sector
pub const DOS2_SECTOR_LINK_SIZE: usize = 3;

/// Highest file number that fits in a sector link
pub const DOS2_MAX_FILE_NUM: usize = 63;
