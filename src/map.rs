/// Sector map visualization

use crate::filesystem::Vtoc;
use crate::format::constants::*;
use std::fmt::Write;

/// ANSI color codes for sector map
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
    pub const BRIGHT_YELLOW: &str = "\x1b[93m";
    pub const BRIGHT_CYAN: &str = "\x1b[96m";
}

const BLOCK_FREE: &str = "\u{2591}"; // ░ - Light shade
const BLOCK_USED: &str = "\u{2593}"; // ▓ - Dark shade

/// What a sector holds, as far as the map is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorUse {
    /// Boot sectors 1-3
    Boot,
    /// VTOC or directory
    System,
    /// Allocated to a file
    Used,
    /// Free in the VTOC
    Free,
}

impl SectorUse {
    fn classify(sector: usize, free: bool) -> Self {
        if (1..=DOS2_BOOT_SECTORS).contains(&sector) {
            SectorUse::Boot
        } else if (DOS2_VTOC_SECTOR..DOS2_DIRECTORY_SECTOR + DOS2_DIRECTORY_SECTORS).contains(&sector) {
            SectorUse::System
        } else if free {
            SectorUse::Free
        } else {
            SectorUse::Used
        }
    }

    fn color(&self) -> &'static str {
        match self {
            SectorUse::Boot => colors::BRIGHT_YELLOW,
            SectorUse::System => colors::BRIGHT_CYAN,
            SectorUse::Used => colors::BRIGHT_WHITE,
            SectorUse::Free => colors::DARK_WHITE,
        }
    }

    fn block(&self) -> &'static str {
        match self {
            SectorUse::Free => BLOCK_FREE,
            _ => BLOCK_USED,
        }
    }
}

/// Render the VTOC as a grid: one column per track, one row per sector
/// position with the first sector of each track at the bottom
pub fn render_vtoc_map(vtoc: &Vtoc, sectors_per_track: usize, color: bool) -> String {
    let tracks = vtoc.track_rows(sectors_per_track);
    let mut out = String::new();

    let _ = writeln!(out, "=== VTOC Map ({} free) ===", vtoc.free_count());
    if color {
        let _ = writeln!(
            out,
            "Legend: {}Boot{} {}System{} {}Used{} {}Free{}",
            colors::BRIGHT_YELLOW, colors::RESET,
            colors::BRIGHT_CYAN, colors::RESET,
            colors::BRIGHT_WHITE, colors::RESET,
            colors::DARK_WHITE, colors::RESET
        );
    } else {
        let _ = writeln!(out, "Legend: {} Used {} Free", BLOCK_USED, BLOCK_FREE);
    }
    out.push('\n');

    for position in (0..sectors_per_track).rev() {
        let _ = write!(out, "{:>2} ", position);
        for (track_num, track) in tracks.iter().enumerate() {
            match track.get(position) {
                Some(&free) => {
                    let sector = track_num * sectors_per_track + position + 1;
                    let kind = SectorUse::classify(sector, free);
                    if color {
                        let _ = write!(out, "{}{}{}", kind.color(), kind.block(), colors::RESET);
                    } else {
                        out.push_str(kind.block());
                    }
                }
                None => out.push(' '),
            }
        }
        out.push('\n');
    }

    // Track numbers every 5 columns
    out.push_str("   ");
    let mut column = 0;
    while column < tracks.len() {
        if column % 5 == 0 {
            let label = column.to_string();
            let width = label.len().min(tracks.len() - column);
            out.push_str(&label[..width]);
            column += width;
        } else {
            out.push(' ');
            column += 1;
        }
    }
    out.push('\n');
    out
}

/// Print the VTOC map to stdout
pub fn draw_vtoc_map(vtoc: &Vtoc, sectors_per_track: usize) {
    print!("{}", render_vtoc_map(vtoc, sectors_per_track, true));
}
