/// DOS 2 directory
///
/// Directory format:
/// - Sectors 361-368
/// - 8 entries of 16 bytes in the first 128 bytes of each sector
/// - Max 64 directory entries
///
/// Entry layout:
/// - 0x00: status flags
/// - 0x01: sector count (u16)
/// - 0x03: starting sector (u16)
/// - 0x05: filename, 8 bytes space padded
/// - 0x0D: extension, 3 bytes space padded

use crate::error::{AtrError, Result};
use crate::filesystem::chain::SectorList;
use crate::filesystem::FileType;
use crate::format::constants::*;
use log::debug;
use std::collections::BTreeMap;

/// Directory entry status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirentFlags(pub u8);

impl DirentFlags {
    /// Entry deleted
    pub const DELETED: u8 = 0x80;
    /// Entry in use
    pub const IN_USE: u8 = 0x40;
    /// File locked (read-only)
    pub const LOCKED: u8 = 0x20;
    /// Created by DOS 2
    pub const DOS2: u8 = 0x02;
    /// File open for output
    pub const OPENED_OUTPUT: u8 = 0x01;

    /// Create flags from a raw byte
    #[inline]
    pub fn new(value: u8) -> Self {
        DirentFlags(value)
    }

    /// Entry has never been used
    #[inline]
    pub fn is_unused(&self) -> bool {
        self.0 == 0
    }

    /// Check if deleted bit is set
    #[inline]
    pub fn deleted(&self) -> bool {
        (self.0 & Self::DELETED) != 0
    }

    /// In use and not deleted
    #[inline]
    pub fn in_use(&self) -> bool {
        (self.0 & Self::IN_USE) != 0 && !self.deleted()
    }

    /// Check if locked bit is set
    #[inline]
    pub fn locked(&self) -> bool {
        (self.0 & Self::LOCKED) != 0
    }

    /// Check if DOS 2 bit is set
    #[inline]
    pub fn dos2(&self) -> bool {
        (self.0 & Self::DOS2) != 0
    }

    /// Check if the file was left open for output
    #[inline]
    pub fn opened_output(&self) -> bool {
        (self.0 & Self::OPENED_OUTPUT) != 0
    }
}

/// Split and validate a DOS filename into 8 character name and 3 character extension
///
/// Names are upper-cased; they must start with a letter and contain only
/// letters and digits.
pub fn parse_filename(filename: &str) -> Result<(String, String)> {
    let upper = filename.trim().to_ascii_uppercase();
    let (name, ext) = match upper.split_once('.') {
        Some((name, ext)) => (name.to_string(), ext.to_string()),
        None => (upper.clone(), String::new()),
    };

    let valid_chars = |s: &str| s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    if name.len() > 8 || ext.len() > 3 || !starts_with_letter || !valid_chars(&name) || !valid_chars(&ext) {
        return Err(AtrError::InvalidFilename(filename.to_string()));
    }
    Ok((name, ext))
}

/// DOS 2 directory entry (16 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    /// Directory slot index, also the file number stored in each data sector
    pub file_num: usize,
    /// Status flags
    pub flags: DirentFlags,
    /// Number of sectors in the file's chain
    pub sector_count: usize,
    /// First sector of the chain
    pub starting_sector: usize,
    /// Filename without extension
    pub basename: String,
    /// Extension
    pub ext: String,
    /// File length in bytes, known once the chain has been walked
    pub length: usize,
}

impl Dirent {
    /// Create a new in-use entry for `filename` at `file_num`
    pub fn new(file_num: usize, filename: &str, file_type: FileType) -> Result<Self> {
        let (basename, ext) = parse_filename(filename)?;
        Ok(Self {
            file_num,
            flags: DirentFlags::new(file_type.flags()),
            sector_count: 0,
            starting_sector: 0,
            basename,
            ext,
            length: 0,
        })
    }

    /// Parse a directory entry from 16 bytes
    ///
    /// Returns `None` for entries that were never used.
    pub fn parse(data: &[u8], file_num: usize) -> Option<Self> {
        if data.len() < DOS2_DIRENT_SIZE {
            return None;
        }

        let flags = DirentFlags::new(data[0]);
        if flags.is_unused() {
            return None;
        }

        let text = |bytes: &[u8]| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches([' ', '\0'])
                .to_string()
        };

        Some(Self {
            file_num,
            flags,
            sector_count: u16::from_le_bytes([data[1], data[2]]) as usize,
            starting_sector: u16::from_le_bytes([data[3], data[4]]) as usize,
            basename: text(&data[5..13]),
            ext: text(&data[13..16]),
            length: 0,
        })
    }

    /// Encode into 16 bytes
    pub fn encode(&self) -> [u8; DOS2_DIRENT_SIZE] {
        let mut raw = [b' '; DOS2_DIRENT_SIZE];
        raw[0] = self.flags.0;
        raw[1..3].copy_from_slice(&(self.sector_count as u16).to_le_bytes());
        raw[3..5].copy_from_slice(&(self.starting_sector as u16).to_le_bytes());
        for (dst, src) in raw[5..13].iter_mut().zip(self.basename.bytes()) {
            *dst = src;
        }
        for (dst, src) in raw[13..16].iter_mut().zip(self.ext.bytes()) {
            *dst = src;
        }
        raw
    }

    /// Blank record for a slot that has never been used
    pub fn encode_empty() -> [u8; DOS2_DIRENT_SIZE] {
        [0u8; DOS2_DIRENT_SIZE]
    }

    /// Full filename, "NAME.EXT" or "NAME"
    pub fn filename(&self) -> String {
        if self.ext.is_empty() {
            self.basename.clone()
        } else {
            format!("{}.{}", self.basename, self.ext)
        }
    }

    /// In use and not deleted
    pub fn in_use(&self) -> bool {
        self.flags.in_use()
    }

    /// Status text for listings
    pub fn status(&self) -> String {
        let mut status = Vec::new();
        if self.flags.deleted() {
            status.push("DEL");
        }
        if self.flags.locked() {
            status.push("LOCK");
        }
        if self.flags.opened_output() {
            status.push("OUT");
        }
        if !self.flags.dos2() {
            status.push("DOS1");
        }
        status.join(" ")
    }

    /// Record where a freshly linked chain lives
    pub fn update_sector_info(&mut self, sector_list: &SectorList) {
        self.sector_count = sector_list.len();
        self.starting_sector = sector_list.first_sector();
        self.length = sector_list.file_length();
    }

    /// Mark the entry deleted; name and chain pointer are left in place
    pub fn mark_deleted(&mut self) {
        self.flags = DirentFlags::new(DirentFlags::DELETED);
    }
}

impl std::fmt::Display for Dirent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        write!(
            f,
            "File #{:<2} {}{:<12} {:>3} sectors",
            self.file_num,
            if status.is_empty() { String::new() } else { format!("({}) ", status) },
            self.filename(),
            self.sector_count
        )
    }
}

/// Directory slots keyed by index
///
/// Slots never written to disk are simply absent from the map and are
/// encoded as blank records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    slots: BTreeMap<usize, Dirent>,
    capacity: usize,
    sector_size: usize,
}

impl Directory {
    /// Create an empty directory for a disk with `sector_size` byte sectors
    pub fn new(sector_size: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            capacity: DOS2_MAX_DIRENTS,
            sector_size,
        }
    }

    /// Decode the concatenated directory sectors
    pub fn decode(raw: &[u8], sector_size: usize) -> Self {
        let mut directory = Self::new(sector_size);
        let mut index = 0;

        for sector in raw.chunks(sector_size).take(DOS2_DIRECTORY_SECTORS) {
            for entry in sector[..SD_SECTOR_SIZE.min(sector.len())].chunks(DOS2_DIRENT_SIZE) {
                if let Some(dirent) = Dirent::parse(entry, index) {
                    directory.slots.insert(index, dirent);
                }
                index += 1;
            }
        }

        directory
    }

    /// Maximum number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All decoded slots (in use and deleted) in index order
    pub fn iter(&self) -> impl Iterator<Item = &Dirent> {
        self.slots.values()
    }

    /// In-use entries in index order
    pub fn iter_in_use(&self) -> impl Iterator<Item = &Dirent> {
        self.slots.values().filter(|d| d.in_use())
    }

    /// Get a slot by index
    pub fn get(&self, file_num: usize) -> Option<&Dirent> {
        self.slots.get(&file_num)
    }

    /// Get a mutable slot by index
    pub fn get_mut(&mut self, file_num: usize) -> Option<&mut Dirent> {
        self.slots.get_mut(&file_num)
    }

    /// Lowest slot index that is not in use
    ///
    /// The capacity is a hard limit; the directory never grows past it.
    pub fn find_free_slot(&self) -> Result<usize> {
        (0..self.capacity)
            .find(|index| !self.slots.get(index).is_some_and(|d| d.in_use()))
            .ok_or(AtrError::NoSpaceInDirectory {
                capacity: self.capacity,
            })
    }

    /// Allocate a slot for a new file and return its entry
    ///
    /// The entry has no sectors yet; store it again with [`Directory::set`]
    /// once its chain is linked.
    pub fn add(&mut self, filename: &str, file_type: FileType) -> Result<Dirent> {
        let (basename, ext) = parse_filename(filename)?;
        if self
            .iter_in_use()
            .any(|d| d.basename == basename && d.ext == ext)
        {
            return Err(AtrError::FileExists(filename.to_string()));
        }

        let index = self.find_free_slot()?;
        let dirent = Dirent::new(index, filename, file_type)?;
        self.set(dirent.clone());
        Ok(dirent)
    }

    /// Store an entry at its slot
    pub fn set(&mut self, dirent: Dirent) {
        debug!("set dirent #{}: {}", dirent.file_num, dirent);
        self.slots.insert(dirent.file_num, dirent);
    }

    /// Find an in-use entry by filename (case-insensitive)
    ///
    /// Names are normalized the same way as in [`Directory::add`], so "FOO."
    /// finds "FOO". Names DOS would not accept are compared as typed.
    pub fn find(&self, filename: &str) -> Result<&Dirent> {
        let found = match parse_filename(filename) {
            Ok((basename, ext)) => self
                .iter_in_use()
                .find(|d| d.basename == basename && d.ext == ext),
            Err(_) => {
                let wanted = filename.trim().to_ascii_uppercase();
                self.iter_in_use().find(|d| d.filename() == wanted)
            }
        };
        found.ok_or_else(|| AtrError::FileNotFound(filename.to_string()))
    }

    /// Mark an entry not in use
    pub fn remove(&mut self, file_num: usize) -> Result<()> {
        let dirent = self
            .slots
            .get_mut(&file_num)
            .filter(|d| d.in_use())
            .ok_or_else(|| AtrError::FileNotFound(format!("#{}", file_num)))?;
        dirent.mark_deleted();
        Ok(())
    }

    /// Encode every slot into directory sectors
    ///
    /// Gaps before a used slot are written as blank records. Records are
    /// packed into the 128 byte entry area of each sector; a sector is flushed
    /// as soon as the next record would not fit. Each returned sector is
    /// padded to the disk's sector size.
    pub fn serialize(&self) -> Vec<Vec<u8>> {
        let entry_area = DOS2_DIRENTS_PER_SECTOR * DOS2_DIRENT_SIZE;
        let mut sectors = Vec::new();
        let mut current: Vec<u8> = Vec::with_capacity(self.sector_size);

        let mut store = |encoded: &[u8], current: &mut Vec<u8>| {
            if current.len() + encoded.len() > entry_area {
                sectors.push(std::mem::take(current));
            }
            current.extend_from_slice(encoded);
        };

        let mut next_index = 0;
        for (&index, dirent) in &self.slots {
            for _missing in next_index..index {
                store(&Dirent::encode_empty(), &mut current);
            }
            store(&dirent.encode(), &mut current);
            next_index = index + 1;
        }
        if !current.is_empty() {
            sectors.push(current);
        }

        for sector in &mut sectors {
            sector.resize(self.sector_size.max(entry_area), 0);
        }
        sectors
    }

    /// Sector number for the n-th serialized directory sector
    pub fn sector_number(index: usize) -> usize {
        DOS2_DIRECTORY_SECTOR + index
    }
}
