use thiserror::Error;

/// Result type alias for disk image operations
pub type Result<T> = std::result::Result<T, AtrError>;

/// Errors that can occur when working with ATR/XFD images
#[derive(Debug, Error)]
pub enum AtrError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unrecognized image or filesystem format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Sector number outside the image
    #[error("Sector {sector} out of range ({first}-{last})")]
    SectorOutOfRange {
        /// Requested sector number
        sector: usize,
        /// First valid sector number
        first: usize,
        /// Last valid sector number
        last: usize,
    },

    /// Data written to a sector run does not match its size
    #[error("Sector {sector} run expects {expected} bytes, got {actual}")]
    SizeMismatch {
        /// First sector of the run
        sector: usize,
        /// Bytes covered by the run
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Not enough free sectors for the requested allocation
    #[error("Not enough space on disk: need {needed} sectors, {available} available")]
    NotEnoughSpace {
        /// Sectors requested
        needed: usize,
        /// Sectors free
        available: usize,
    },

    /// Every directory slot is in use
    #[error("No space in directory (capacity {capacity})")]
    NoSpaceInDirectory {
        /// Directory slot capacity
        capacity: usize,
    },

    /// A file with this name already exists
    #[error("File already exists: {0}")]
    FileExists(String),

    /// File not found in filesystem
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File is locked and cannot be deleted
    #[error("File locked: {0}")]
    FileLocked(String),

    /// On-disk metadata of a file is inconsistent
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Invalid filename
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

impl AtrError {
    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        AtrError::InvalidFormat(message.into())
    }

    /// Create an invalid file error
    pub fn invalid_file<S: Into<String>>(message: S) -> Self {
        AtrError::InvalidFile(message.into())
    }

    /// True for the allocation failures raised before anything is written
    pub fn is_out_of_space(&self) -> bool {
        matches!(
            self,
            AtrError::NotEnoughSpace { .. } | AtrError::NoSpaceInDirectory { .. }
        )
    }
}
