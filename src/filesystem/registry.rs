/// Static table of known filesystems
///
/// Filesystems are probed in table order; the first whose probe accepts the
/// image is mounted.

use crate::error::{AtrError, Result};
use crate::filesystem::{AtariDosFileSystem, FileSystem};
use crate::image::DiskImage;
use log::debug;

/// One registered filesystem
#[derive(Debug, Clone, Copy)]
pub struct FileSystemEntry {
    /// Display name
    pub name: &'static str,
    /// Cheap check whether an image carries this filesystem
    pub probe: fn(&DiskImage) -> bool,
    /// Mount the filesystem
    pub mount: fn(DiskImage) -> Result<Box<dyn FileSystem>>,
}

fn mount_dos2(image: DiskImage) -> Result<Box<dyn FileSystem>> {
    Ok(Box::new(AtariDosFileSystem::mount(image)?))
}

/// Known filesystems, in probe order
pub static FILESYSTEMS: &[FileSystemEntry] = &[FileSystemEntry {
    name: "Atari DOS 2",
    probe: AtariDosFileSystem::probe,
    mount: mount_dos2,
}];

/// Find the first registered filesystem that accepts the image
pub fn detect_filesystem(image: &DiskImage) -> Option<&'static FileSystemEntry> {
    let found = FILESYSTEMS.iter().find(|entry| (entry.probe)(image));
    debug!(
        "filesystem probe: {}",
        found.map(|entry| entry.name).unwrap_or("none")
    );
    found
}

/// Mount whichever registered filesystem the image carries
///
/// On failure the image is handed back alongside the error so callers can
/// keep working with raw sectors.
pub fn mount(image: DiskImage) -> std::result::Result<Box<dyn FileSystem>, (DiskImage, AtrError)> {
    match detect_filesystem(&image) {
        Some(entry) => {
            let fallback = image.clone();
            (entry.mount)(image).map_err(|e| (fallback, e))
        }
        None => Err((
            image,
            AtrError::invalid_format("No recognized filesystem"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_dos2() {
        let image = DiskImage::builder().build().unwrap();
        assert!(detect_filesystem(&image).is_none());

        let formatted = AtariDosFileSystem::format(image).unwrap().into_image();
        let entry = detect_filesystem(&formatted).unwrap();
        assert_eq!(entry.name, "Atari DOS 2");
    }

    #[test]
    fn test_mount_returns_image_on_failure() {
        let image = DiskImage::builder().build().unwrap();
        let bytes = image.as_bytes().to_vec();

        let Err((image, error)) = mount(image) else {
            panic!("blank image should not mount");
        };
        assert_eq!(image.as_bytes(), bytes.as_slice());
        assert!(matches!(error, AtrError::InvalidFormat(_)));
    }

    #[test]
    fn test_mount_boxed() {
        let image = DiskImage::builder().build().unwrap();
        let image = AtariDosFileSystem::format(image).unwrap().into_image();

        let fs = mount(image).map_err(|(_, e)| e).unwrap();
        assert_eq!(fs.name(), "Atari DOS 2");
        assert_eq!(fs.info().free_sectors, 707);
    }
}
