/*!
# atrmanager

A Rust library for reading and writing Atari 8-bit ATR and XFD disk images
with Atari DOS 2 filesystem support.

## Features

- Read and write ATR (16 byte header) and XFD (raw dump) images
- Single, enhanced and double density geometry, including the three short
  boot sectors of double density disks
- Atari DOS 2 filesystem: list, read, write and delete files
- All-or-nothing file writes: a failed write leaves the image untouched
- Idiomatic Rust API with comprehensive error handling

## Quick Start

```rust,no_run
use atrmanager::{AtariDosFileSystem, DiskImage, FileType, ImageFormat};

// Create a blank single density image and format it
let image = DiskImage::builder().single_density().build()?;
let mut fs = AtariDosFileSystem::format(image)?;

// Write and read back a file
fs.write_file("HELLO.TXT", FileType::Normal, b"HELLO, ATARI")?;
let contents = fs.read_file("HELLO.TXT")?;
assert_eq!(contents, b"HELLO, ATARI");

for entry in fs.list_files() {
    println!("{}: {} bytes", entry.name, entry.size);
}

// Save as an XFD dump
let mut xfd = fs.image().as_new_format(ImageFormat::Xfd)?;
xfd.save("hello.xfd")?;

// Open an existing image
let image = DiskImage::open("game.atr")?;
let sector = image.read_sector(360)?;
# Ok::<(), atrmanager::AtrError>(())
```

## Modules

- `format`: ATR header codec, geometry and layout constants
- `image`: Disk image sector addressing and the image builder
- `filesystem`: Atari DOS 2 filesystem, VTOC, directory and transactions
- `boot`: Boot record parsing
- `map`: VTOC sector map rendering
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Boot record parsing and boot disk detection
pub mod boot;
/// Error types and Result alias
pub mod error;
/// Filesystem implementations (Atari DOS 2)
pub mod filesystem;
/// ATR/XFD format header and constants
pub mod format;
/// Core image data structures (DiskImage, SectorRecord)
pub mod image;
/// I/O operations for reading and writing image files
pub mod io;
/// Sector map visualization
pub mod map;

// Re-export common types
pub use boot::{detect_boot_disk, BootRecord};
pub use error::{AtrError, Result};
pub use filesystem::{
    detect_filesystem, AtariDosFileSystem, DirEntry, Dirent, DirentFlags, Directory,
    FileAttributes, FileSystem, FileSystemInfo, FileType, SectorChainBuilder, SectorList,
    Transaction, TransactionState, Vtoc,
};
pub use format::{detect_format, Header, ImageFormat};
pub use image::{DiskImage, DiskImageBuilder, SectorRecord};
