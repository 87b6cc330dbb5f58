/// Filesystem implementations

/// Sector chains
pub mod chain;
/// DOS 2 directory table
pub mod directory;
/// Atari DOS 2 filesystem
pub mod dos2;
/// Static filesystem registry
pub mod registry;
/// Snapshot based transactions
pub mod transaction;
/// Free sector map
pub mod vtoc;

pub use chain::{SectorChainBuilder, SectorList};
pub use directory::{parse_filename, Dirent, DirentFlags, Directory};
pub use dos2::AtariDosFileSystem;
pub use registry::{detect_filesystem, mount, FileSystemEntry, FILESYSTEMS};
pub use transaction::{Transaction, TransactionState};
pub use vtoc::Vtoc;

use crate::error::Result;
use crate::image::DiskImage;

/// Kind of file to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    /// Regular DOS 2 file
    #[default]
    Normal,
    /// DOS 2 file with the locked (read-only) bit set
    Locked,
}

impl FileType {
    /// Directory status byte for a new entry of this type
    pub fn flags(&self) -> u8 {
        match self {
            FileType::Normal => DirentFlags::IN_USE | DirentFlags::DOS2,
            FileType::Locked => DirentFlags::IN_USE | DirentFlags::DOS2 | DirentFlags::LOCKED,
        }
    }
}

/// File attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// Locked (read-only) flag
    pub locked: bool,
    /// Written by DOS 2 rather than DOS 1
    pub dos2: bool,
    /// Left open for output
    pub open_for_output: bool,
}

impl From<DirentFlags> for FileAttributes {
    fn from(flags: DirentFlags) -> Self {
        Self {
            locked: flags.locked(),
            dos2: flags.dos2(),
            open_for_output: flags.opened_output(),
        }
    }
}

/// Directory listing entry
///
/// Entries whose sector chain cannot be followed are still listed, with
/// `error` describing the problem and a size of zero.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Filename ("NAME.EXT")
    pub name: String,
    /// Directory slot
    pub index: usize,
    /// Sectors recorded in the directory
    pub sectors: usize,
    /// First sector of the chain
    pub start_sector: usize,
    /// File size in bytes
    pub size: usize,
    /// File attributes
    pub attributes: FileAttributes,
    /// Why the file could not be read, if it can't
    pub error: Option<String>,
}

impl DirEntry {
    /// Listing entry for a readable file
    pub fn from_dirent(dirent: &Dirent) -> Self {
        Self {
            name: dirent.filename(),
            index: dirent.file_num,
            sectors: dirent.sector_count,
            start_sector: dirent.starting_sector,
            size: dirent.length,
            attributes: dirent.flags.into(),
            error: None,
        }
    }

    /// Placeholder for a file whose chain is broken
    pub fn unreadable(dirent: &Dirent, error: String) -> Self {
        Self {
            size: 0,
            error: Some(error),
            ..Self::from_dirent(dirent)
        }
    }

    /// Whether the file contents can be read
    pub fn is_readable(&self) -> bool {
        self.error.is_none()
    }
}

/// Filesystem information
#[derive(Debug, Clone)]
pub struct FileSystemInfo {
    /// Filesystem type name
    pub fs_type: String,
    /// Total usable sectors
    pub total_sectors: usize,
    /// Free sectors
    pub free_sectors: usize,
    /// Physical sector size in bytes
    pub sector_size: usize,
    /// Payload bytes per data sector
    pub payload_size: usize,
    /// Files in the directory
    pub files: usize,
    /// Directory slots available
    pub directory_capacity: usize,
}

impl FileSystemInfo {
    /// Free space in payload bytes
    pub fn free_bytes(&self) -> usize {
        self.free_sectors * self.payload_size
    }
}

/// Filesystem trait for accessing files on disk images
///
/// Mutating operations either complete or leave the image untouched.
pub trait FileSystem {
    /// Mount the filesystem held by an image
    fn from_image(image: DiskImage) -> Result<Self>
    where
        Self: Sized;

    /// Filesystem name
    fn name(&self) -> &'static str;

    /// List the files in the directory
    fn list_files(&self) -> Vec<DirEntry>;

    /// Read a file's contents
    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Write a new file
    fn write_file(&mut self, name: &str, file_type: FileType, data: &[u8]) -> Result<()>;

    /// Delete a file
    fn delete_file(&mut self, name: &str) -> Result<()>;

    /// Get filesystem information
    fn info(&self) -> FileSystemInfo;

    /// Underlying image
    fn image(&self) -> &DiskImage;

    /// Mutable access to the underlying image, for saving
    fn image_mut(&mut self) -> &mut DiskImage;

    /// Serialize the image to bytes
    fn save(&self) -> Vec<u8> {
        self.image().as_bytes().to_vec()
    }
}
