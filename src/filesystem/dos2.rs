/// Atari DOS 2 filesystem
///
/// Boot sectors 1-3, VTOC at sector 360 and the directory in sectors 361-368.
/// File data lives in singly linked sector chains; the last three bytes of
/// each data sector carry the owning file number, the next sector and the
/// number of payload bytes used.

use crate::error::{AtrError, Result};
use crate::filesystem::chain::{SectorChainBuilder, SectorList};
use crate::filesystem::directory::{Dirent, Directory};
use crate::filesystem::transaction::Transaction;
use crate::filesystem::vtoc::Vtoc;
use crate::filesystem::{DirEntry, FileSystem, FileSystemInfo, FileType};
use crate::format::constants::*;
use crate::image::{DiskImage, SectorRecord};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Last sector used by DOS 2 metadata
const LAST_METADATA_SECTOR: usize = DOS2_DIRECTORY_SECTOR + DOS2_DIRECTORY_SECTORS - 1;

/// A disk image mounted as a DOS 2 filesystem
///
/// The VTOC and directory are decoded projections of the image bytes. They
/// are only replaced after a mutation has been committed to the image.
#[derive(Debug, Clone)]
pub struct AtariDosFileSystem {
    image: DiskImage,
    vtoc: Vtoc,
    directory: Directory,
    /// Files whose chains could not be followed, by directory slot
    errors: BTreeMap<usize, String>,
}

impl AtariDosFileSystem {
    /// Open raw image bytes (ATR or XFD) as a DOS 2 filesystem
    pub fn open(raw: Vec<u8>) -> Result<Self> {
        Self::mount(DiskImage::from_bytes(raw)?)
    }

    /// Mount the DOS 2 filesystem on an image
    pub fn mount(image: DiskImage) -> Result<Self> {
        check_layout(&image)?;
        let vtoc = read_vtoc(&image)?;
        if vtoc.dos_code() != DOS2_VTOC_CODE {
            return Err(AtrError::invalid_format(format!(
                "VTOC DOS code {} is not DOS 2",
                vtoc.dos_code()
            )));
        }

        let mut fs = Self {
            directory: Directory::new(image.header().sector_size),
            image,
            vtoc,
            errors: BTreeMap::new(),
        };
        fs.reload()?;
        info!(
            "mounted DOS 2 filesystem: {} files, {} free sectors",
            fs.directory.iter_in_use().count(),
            fs.vtoc.free_count()
        );
        Ok(fs)
    }

    /// Lay down an empty DOS 2 filesystem and mount it
    ///
    /// Boot sectors are left as they are; the VTOC is rebuilt and every
    /// directory sector is cleared.
    pub fn format(mut image: DiskImage) -> Result<Self> {
        check_layout(&image)?;
        let sector_size = image.header().sector_size_of(DOS2_VTOC_SECTOR)?;
        let vtoc = Vtoc::formatted(sector_size, image.header().last_sector());

        Transaction::run(&mut image, |image| {
            image.write_sector(DOS2_VTOC_SECTOR, &vtoc.pack())?;
            for index in 0..DOS2_DIRECTORY_SECTORS {
                let sector = Directory::sector_number(index);
                let size = image.header().sector_size_of(sector)?;
                image.write_sector(sector, &vec![0u8; size])?;
            }
            Ok(())
        })?;
        info!("formatted DOS 2 filesystem, {} free sectors", vtoc.free_count());

        Self::mount(image)
    }

    /// Quick check whether an image looks like DOS 2
    pub fn probe(image: &DiskImage) -> bool {
        check_layout(image).is_ok()
            && image
                .read_sector(DOS2_VTOC_SECTOR)
                .map(|vtoc| vtoc[0] == DOS2_VTOC_CODE)
                .unwrap_or(false)
    }

    /// Rebuild the VTOC and directory projections from the image bytes
    fn reload(&mut self) -> Result<()> {
        let mut vtoc = read_vtoc(&self.image)?;
        vtoc.restrict_to(self.image.header().last_sector());

        let (first, count) = self
            .image
            .contiguous_region(DOS2_DIRECTORY_SECTOR, DOS2_DIRECTORY_SECTORS)?;
        let raw = &self.image.as_bytes()[first..first + count];
        let mut directory = Directory::decode(raw, self.image.header().sector_size);

        let mut errors = BTreeMap::new();
        let in_use: Vec<usize> = directory.iter_in_use().map(|d| d.file_num).collect();
        for file_num in in_use {
            let Some(dirent) = directory.get_mut(file_num) else {
                continue;
            };
            match self.sector_list(dirent) {
                Ok(list) => dirent.length = list.file_length(),
                Err(e) => {
                    warn!("{}: {}", dirent.filename(), e);
                    errors.insert(file_num, e.to_string());
                }
            }
        }

        self.vtoc = vtoc;
        self.directory = directory;
        self.errors = errors;
        Ok(())
    }

    /// Underlying image
    pub fn image(&self) -> &DiskImage {
        &self.image
    }

    /// Release the underlying image
    pub fn into_image(self) -> DiskImage {
        self.image
    }

    /// Decoded free sector map
    pub fn vtoc(&self) -> &Vtoc {
        &self.vtoc
    }

    /// Decoded directory
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Payload bytes in each data sector
    pub fn payload_capacity(&self) -> usize {
        self.image.header().sector_size - DOS2_SECTOR_LINK_SIZE
    }

    /// True if every in-use directory entry has a readable chain
    ///
    /// Disks that fail this are often boot disks with no real filesystem.
    pub fn all_sane(&self) -> bool {
        self.errors.is_empty()
    }

    /// Listing of every in-use file
    pub fn list_files(&self) -> Vec<DirEntry> {
        self.directory
            .iter_in_use()
            .map(|dirent| match self.errors.get(&dirent.file_num) {
                Some(error) => DirEntry::unreadable(dirent, error.clone()),
                None => DirEntry::from_dirent(dirent),
            })
            .collect()
    }

    /// Follow the sector chain of a directory entry
    ///
    /// Every sector must belong to the entry's file number and the chain must
    /// end after exactly `sector_count` sectors.
    pub fn sector_list(&self, dirent: &Dirent) -> Result<SectorList> {
        let header = self.image.header();
        let mut records = Vec::with_capacity(dirent.sector_count);
        let mut sector = dirent.starting_sector;

        while sector != 0 {
            if records.len() >= dirent.sector_count {
                return Err(AtrError::invalid_file(format!(
                    "{}: chain longer than {} sectors",
                    dirent.filename(),
                    dirent.sector_count
                )));
            }
            if !header.sector_is_valid(sector) {
                return Err(AtrError::invalid_file(format!(
                    "{}: chain points at sector {} outside the image",
                    dirent.filename(),
                    sector
                )));
            }

            let record = SectorRecord::decode(sector, self.image.read_sector(sector)?)?;
            if record.file_num != dirent.file_num {
                return Err(AtrError::invalid_file(format!(
                    "{}: sector {} belongs to file {}, expected {}",
                    dirent.filename(),
                    sector,
                    record.file_num,
                    dirent.file_num
                )));
            }
            sector = record.next_sector_num;
            records.push(record);
        }

        if records.len() != dirent.sector_count {
            return Err(AtrError::invalid_file(format!(
                "{}: chain has {} sectors, directory says {}",
                dirent.filename(),
                records.len(),
                dirent.sector_count
            )));
        }
        Ok(SectorList::from_records(records))
    }

    /// Read a file's contents
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let dirent = self.directory.find(name)?;
        let list = self.sector_list(dirent)?;
        let mut data = Vec::with_capacity(list.file_length());
        for record in &list {
            data.extend_from_slice(record.data());
        }
        debug!("read {} ({} bytes)", dirent.filename(), data.len());
        Ok(data)
    }

    /// Write a new file
    ///
    /// Either the whole file lands on disk (data sectors, VTOC and directory)
    /// or the image is left byte for byte as it was.
    pub fn write_file(&mut self, name: &str, file_type: FileType, data: &[u8]) -> Result<Dirent> {
        let mut directory = self.directory.clone();
        let mut vtoc = self.vtoc.clone();
        let builder = SectorChainBuilder::new(self.payload_capacity());

        let dirent = Transaction::run(&mut self.image, |image| {
            let mut dirent = directory.add(name, file_type)?;
            let mut list = builder.build(data);
            let order = vtoc.reserve(list.len())?;
            list.link(&order, dirent.file_num)?;
            dirent.update_sector_info(&list);
            directory.set(dirent.clone());

            write_sector_list(image, &list)?;
            write_metadata(image, &vtoc, &directory)?;
            Ok(dirent)
        })?;

        self.reload()?;
        info!(
            "wrote {} ({} bytes, {} sectors from {})",
            dirent.filename(),
            data.len(),
            dirent.sector_count,
            dirent.starting_sector
        );
        Ok(dirent)
    }

    /// Delete a file, freeing its sectors
    ///
    /// The directory slot is marked deleted; the data sectors keep their
    /// contents.
    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let dirent = self.directory.find(name)?.clone();
        if dirent.flags.locked() {
            return Err(AtrError::FileLocked(dirent.filename()));
        }
        let list = self.sector_list(&dirent)?;

        let mut directory = self.directory.clone();
        let mut vtoc = self.vtoc.clone();
        Transaction::run(&mut self.image, |image| {
            vtoc.release(&list.sector_numbers());
            directory.remove(dirent.file_num)?;
            write_metadata(image, &vtoc, &directory)
        })?;

        self.reload()?;
        info!("deleted {} ({} sectors freed)", dirent.filename(), list.len());
        Ok(())
    }

    /// Serialize the image to bytes
    pub fn save(&self) -> Vec<u8> {
        self.image.as_bytes().to_vec()
    }

    /// Filesystem summary
    pub fn info(&self) -> FileSystemInfo {
        FileSystemInfo {
            fs_type: "Atari DOS 2".to_string(),
            total_sectors: self.vtoc.total_sectors(),
            free_sectors: self.vtoc.free_count(),
            sector_size: self.image.header().sector_size,
            payload_size: self.payload_capacity(),
            files: self.directory.iter_in_use().count(),
            directory_capacity: self.directory.capacity(),
        }
    }
}

impl FileSystem for AtariDosFileSystem {
    fn from_image(image: DiskImage) -> Result<Self> {
        Self::mount(image)
    }

    fn name(&self) -> &'static str {
        "Atari DOS 2"
    }

    fn list_files(&self) -> Vec<DirEntry> {
        AtariDosFileSystem::list_files(self)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        AtariDosFileSystem::read_file(self, name)
    }

    fn write_file(&mut self, name: &str, file_type: FileType, data: &[u8]) -> Result<()> {
        AtariDosFileSystem::write_file(self, name, file_type, data).map(|_| ())
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        AtariDosFileSystem::delete_file(self, name)
    }

    fn info(&self) -> FileSystemInfo {
        AtariDosFileSystem::info(self)
    }

    fn image(&self) -> &DiskImage {
        &self.image
    }

    fn image_mut(&mut self) -> &mut DiskImage {
        &mut self.image
    }
}

/// The image must reach past the last directory sector
fn check_layout(image: &DiskImage) -> Result<()> {
    if image.header().last_sector() < LAST_METADATA_SECTOR {
        return Err(AtrError::invalid_format(format!(
            "{} sectors is too small for DOS 2 (needs {})",
            image.sector_count(),
            LAST_METADATA_SECTOR
        )));
    }
    Ok(())
}

fn read_vtoc(image: &DiskImage) -> Result<Vtoc> {
    Vtoc::unpack(image.read_sector(DOS2_VTOC_SECTOR)?)
}

fn write_sector_list(image: &mut DiskImage, list: &SectorList) -> Result<()> {
    for record in list {
        let size = image.header().sector_size_of(record.sector_num)?;
        image.write_sector(record.sector_num, &record.encode(size)?)?;
    }
    Ok(())
}

fn write_metadata(image: &mut DiskImage, vtoc: &Vtoc, directory: &Directory) -> Result<()> {
    image.write_sector(DOS2_VTOC_SECTOR, &vtoc.pack())?;
    for (index, sector) in directory.serialize().iter().enumerate() {
        image.write_sector(Directory::sector_number(index), sector)?;
    }
    Ok(())
}
