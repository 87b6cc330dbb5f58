/// I/O operations for reading and writing ATR/XFD files

/// Reader implementation for ATR/XFD files
pub mod reader;
/// Writer implementation for ATR/XFD files
pub mod writer;

pub use reader::{format_from_extension, read_image};
pub use writer::write_image;
