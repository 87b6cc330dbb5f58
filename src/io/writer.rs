/// ATR/XFD file writer

use crate::error::Result;
use crate::image::DiskImage;
use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write an image to disk exactly as held in memory
///
/// ATR images are written with their header; XFD images are a bare sector
/// dump.
pub fn write_image<P: AsRef<Path>>(image: &DiskImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    file.write_all(image.as_bytes())?;
    file.flush()?;
    info!(
        "wrote {} ({} bytes, {})",
        path.display(),
        image.as_bytes().len(),
        image.format()
    );
    Ok(())
}
