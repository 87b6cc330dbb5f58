/// ATR/XFD file reader

use crate::error::Result;
use crate::format::ImageFormat;
use crate::image::DiskImage;
use log::{info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Guess the container format from a file extension
pub fn format_from_extension<P: AsRef<Path>>(path: P) -> Option<ImageFormat> {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_name)
}

/// Read an ATR or XFD file from disk
///
/// The format is taken from the file contents; a mismatching extension is
/// only reported.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<DiskImage> {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string());

    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let mut image = DiskImage::from_bytes(data)?;
    if let Some(expected) = format_from_extension(path) {
        if expected != image.format() {
            warn!(
                "{} has a .{} extension but contains {} data",
                path.display(),
                expected.name().to_ascii_lowercase(),
                image.format()
            );
        }
    }
    if image.format() == ImageFormat::Xfd {
        if let Err(e) = image.header().strict_check() {
            warn!("{}: {}", path.display(), e);
        }
    }

    info!("read {} ({})", path.display(), image.header());
    image.filename = filename;
    Ok(image)
}
