/// ATR/XFD format constants and header codec

/// Format constants
pub mod constants;
/// Image header encoding and sector addressing
pub mod header;

pub use constants::*;
pub use header::Header;

/// Disk image container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// ATR image with a 16 byte header
    Atr,
    /// XFD raw sector dump, no header
    Xfd,
}

impl ImageFormat {
    /// Get the magic bytes for this format
    pub fn magic_bytes(&self) -> &'static [u8] {
        match self {
            ImageFormat::Atr => &[0x96, 0x02],
            ImageFormat::Xfd => &[], // XFD has no magic bytes
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Atr => "ATR",
            ImageFormat::Xfd => "XFD",
        }
    }

    /// Length of the header preceding sector 1
    pub fn header_len(&self) -> usize {
        match self {
            ImageFormat::Atr => ATR_HEADER_SIZE,
            ImageFormat::Xfd => 0,
        }
    }

    /// Parse a format name as typed by a user ("atr", "xfd")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "atr" => Some(ImageFormat::Atr),
            "xfd" => Some(ImageFormat::Xfd),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the image format from the leading bytes
///
/// Anything without the ATR signature is treated as a headerless XFD dump;
/// whether its size makes sense is checked when the header is fitted.
pub fn detect_format(data: &[u8]) -> ImageFormat {
    if data.len() >= ATR_HEADER_SIZE && data.starts_with(ImageFormat::Atr.magic_bytes()) {
        ImageFormat::Atr
    } else {
        ImageFormat::Xfd
    }
}
