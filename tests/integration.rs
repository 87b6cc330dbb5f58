/// Integration tests for atrmanager

use atrmanager::*;
use proptest::prelude::*;

fn formatted_sd() -> AtariDosFileSystem {
    let image = DiskImage::builder()
        .single_density()
        .build()
        .expect("Failed to build image");
    AtariDosFileSystem::format(image).expect("Failed to format image")
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("atrmanager-{}-{}", std::process::id(), name))
}

#[test]
fn test_small_atr_addressing() {
    // 130 sectors of 128 bytes
    let mut raw = vec![0u8; 16 + 130 * 128];
    raw[0] = 0x96;
    raw[1] = 0x02;
    raw[2..4].copy_from_slice(&((130 * 128 / 16) as u16).to_le_bytes());
    raw[4..6].copy_from_slice(&128u16.to_le_bytes());

    let image = DiskImage::from_bytes(raw).expect("Failed to open image");
    assert_eq!(image.format(), ImageFormat::Atr);
    assert_eq!(image.sector_count(), 130);
    assert_eq!(image.header().sector_to_offset(1).unwrap(), (16, 128));
    assert_eq!(image.header().sector_to_offset(130).unwrap(), (16 + 129 * 128, 128));
    assert!(matches!(
        image.read_sector(131),
        Err(AtrError::SectorOutOfRange { sector: 131, first: 1, last: 130 })
    ));
    assert!(image.read_sector(0).is_err());
}

#[test]
fn test_double_density_addressing() {
    let image = DiskImage::from_bytes(vec![0u8; 183_936]).expect("Failed to open XFD");
    let header = image.header();

    assert_eq!(image.format(), ImageFormat::Xfd);
    assert_eq!(image.sector_count(), 720);
    assert_eq!(header.sector_to_offset(1).unwrap(), (0, 128));
    assert_eq!(header.sector_to_offset(3).unwrap(), (256, 128));
    assert_eq!(header.sector_to_offset(4).unwrap(), (384, 256));
    assert_eq!(header.sector_to_offset(720).unwrap(), (384 + 716 * 256, 256));
}

#[test]
fn test_formatted_disk_vtoc() {
    let fs = formatted_sd();
    let vtoc = fs.vtoc();

    assert_eq!(vtoc.free_count(), 707);
    assert_eq!(vtoc.iter_free().next(), Some(4));
    assert!(!vtoc.is_free(360));

    let raw = fs.image().read_sector(360).unwrap();
    assert_eq!(raw[0], 2);
    assert_eq!(u16::from_le_bytes([raw[3], raw[4]]), 707);
    // Sectors 0-3 used, 4-7 free
    assert_eq!(raw[10], 0x0F);
}

#[test]
fn test_write_three_sector_file() {
    let mut fs = formatted_sd();
    let data: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();

    let dirent = fs
        .write_file("TEST.DAT", FileType::Normal, &data)
        .expect("Failed to write file");
    assert_eq!(dirent.sector_count, 3);
    assert_eq!(dirent.starting_sector, 4);

    let used: Vec<u8> = (4..=6)
        .map(|sector| fs.image().read_sector(sector).unwrap()[127])
        .collect();
    assert_eq!(used, vec![125, 125, 50]);

    let next: Vec<u8> = (4..=6)
        .map(|sector| fs.image().read_sector(sector).unwrap()[126])
        .collect();
    assert_eq!(next, vec![5, 6, 0]);

    assert_eq!(fs.read_file("TEST.DAT").unwrap(), data);
    assert_eq!(fs.vtoc().free_count(), 704);

    let dir = fs.image().read_sector(361).unwrap();
    assert_eq!(dir[0], 0x42);
    assert_eq!(u16::from_le_bytes([dir[1], dir[2]]), 3);
    assert_eq!(u16::from_le_bytes([dir[3], dir[4]]), 4);
    assert_eq!(&dir[5..16], b"TEST    DAT");
}

#[test]
fn test_delete_and_rewrite() {
    let mut fs = formatted_sd();
    fs.write_file("FIRST", FileType::Normal, &[1; 400]).unwrap();
    fs.write_file("SECOND", FileType::Normal, &[2; 100]).unwrap();
    fs.delete_file("FIRST").unwrap();

    let names: Vec<String> = fs.list_files().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["SECOND".to_string()]);

    // The freed slot and the freed sectors are reused lowest first
    let dirent = fs.write_file("THIRD", FileType::Normal, &[3; 10]).unwrap();
    assert_eq!(dirent.file_num, 0);
    assert_eq!(dirent.starting_sector, 4);
    assert_eq!(fs.read_file("SECOND").unwrap(), vec![2; 100]);
}

#[test]
fn test_delete_frees_chain_and_slot() {
    let mut fs = formatted_sd();
    fs.write_file("A", FileType::Normal, &[1; 10]).unwrap();
    let b = fs.write_file("B", FileType::Normal, &[2; 300]).unwrap();
    assert_eq!(b.file_num, 1);
    assert_eq!(b.starting_sector, 5);
    assert!(!fs.vtoc().is_free(7));

    fs.delete_file("B").unwrap();
    assert!(fs.vtoc().is_free(5));
    assert!(fs.vtoc().is_free(6));
    assert!(fs.vtoc().is_free(7));

    let slot = fs.directory().get(1).unwrap();
    assert!(!slot.in_use());
    assert!(slot.flags.deleted());
    assert_eq!(fs.image().read_sector(361).unwrap()[16], 0x80);
    assert_eq!(fs.directory().find_free_slot().unwrap(), 1);
}

#[test]
fn test_out_of_space_leaves_image_untouched() {
    let mut fs = formatted_sd();
    fs.write_file("FILLER", FileType::Normal, &vec![0xEE; 703 * 125])
        .unwrap();
    assert_eq!(fs.vtoc().free_count(), 4);

    let before = fs.save();
    let err = fs
        .write_file("BIG", FileType::Normal, &vec![0x11; 10 * 125])
        .unwrap_err();
    assert!(err.is_out_of_space());
    assert_eq!(err.to_string(), "Not enough space on disk: need 10 sectors, 4 available");
    assert_eq!(fs.save(), before);
    assert!(fs.read_file("BIG").is_err());
}

#[test]
fn test_directory_full() {
    let mut fs = formatted_sd();
    for i in 0..64 {
        fs.write_file(&format!("F{}", i), FileType::Normal, &[i as u8])
            .unwrap();
    }
    let before = fs.save();
    assert!(matches!(
        fs.write_file("ONEMORE", FileType::Normal, &[0]),
        Err(AtrError::NoSpaceInDirectory { capacity: 64 })
    ));
    assert_eq!(fs.save(), before);
    assert_eq!(fs.list_files().len(), 64);
}

#[test]
fn test_save_and_reopen() {
    let mut fs = formatted_sd();
    fs.write_file("README.TXT", FileType::Locked, b"HELLO FROM DISK")
        .unwrap();

    let path = temp_path("reopen.atr");
    let mut image = fs.into_image();
    image.save(&path).expect("Failed to save image");
    assert!(!image.is_changed());

    let reopened = DiskImage::open(&path).expect("Failed to reopen image");
    assert_eq!(reopened.filename(), path.file_name().and_then(|n| n.to_str()));
    assert_eq!(reopened.as_bytes(), image.as_bytes());

    let fs = AtariDosFileSystem::mount(reopened).unwrap();
    let files = fs.list_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].attributes.locked);
    assert_eq!(fs.read_file("README.TXT").unwrap(), b"HELLO FROM DISK");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_xfd_conversion_keeps_files() {
    let mut fs = formatted_sd();
    fs.write_file("KEEP.BIN", FileType::Normal, &[0x5A; 700]).unwrap();

    let xfd = fs.image().as_new_format(ImageFormat::Xfd).unwrap();
    assert_eq!(xfd.as_bytes().len(), 92_160);

    let fs = AtariDosFileSystem::open(xfd.into_bytes()).unwrap();
    assert_eq!(fs.image().format(), ImageFormat::Xfd);
    assert_eq!(fs.read_file("KEEP.BIN").unwrap(), vec![0x5A; 700]);
}

#[test]
fn test_registry_mount() {
    let image = formatted_sd().into_image();
    let entry = detect_filesystem(&image).expect("DOS 2 not detected");
    assert_eq!(entry.name, "Atari DOS 2");

    let mut fs = (entry.mount)(image).unwrap();
    fs.write_file("VIA.DYN", FileType::Normal, &[9; 20]).unwrap();
    assert_eq!(fs.read_file("VIA.DYN").unwrap(), vec![9; 20]);
    assert_eq!(fs.info().files, 1);
}

#[test]
fn test_boot_record_on_formatted_disk() {
    let mut image = DiskImage::builder().build().unwrap();
    let mut boot = vec![0u8; 3 * 128];
    boot[..6].copy_from_slice(&[0x00, 0x03, 0x00, 0x07, 0x40, 0x15]);
    image.write_sectors(1, &boot).unwrap();

    let fs = AtariDosFileSystem::format(image).unwrap();
    let record = detect_boot_disk(fs.image()).unwrap();
    assert_eq!(record.load_address, 0x0700);
    assert_eq!(record.init_address, 0x1540);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn header_encode_decode(sectors in 1usize..1500, double in any::<bool>()) {
        let sector_size = if double { 256 } else { 128 };
        let header = Header::new(ImageFormat::Atr, sectors * sector_size, sector_size).unwrap();
        let decoded = Header::decode(&header.encode()).unwrap();
        prop_assert_eq!(decoded.image_size, header.image_size);
        prop_assert_eq!(decoded.sector_size, header.sector_size);
        prop_assert_eq!(decoded.max_sectors, header.max_sectors);
    }

    #[test]
    fn vtoc_pack_unpack(free in proptest::collection::btree_set(1usize..720, 0..200)) {
        let mut vtoc = Vtoc::new(128);
        let sectors: Vec<usize> = free.iter().copied().collect();
        vtoc.release(&sectors);

        let decoded = Vtoc::unpack(&vtoc.pack()).unwrap();
        prop_assert_eq!(decoded.free_count(), free.len());
        prop_assert_eq!(decoded.iter_free().collect::<Vec<_>>(), sectors);
    }

    #[test]
    fn vtoc_raw_bytes_roundtrip(
        bitmap in proptest::collection::vec(any::<u8>(), 90),
        total in any::<u16>(),
        tail in proptest::collection::vec(any::<u8>(), 28),
    ) {
        let free: u32 = bitmap.iter().map(|byte| byte.count_ones()).sum();
        let mut raw = vec![2u8];
        raw.extend_from_slice(&total.to_le_bytes());
        raw.extend_from_slice(&(free as u16).to_le_bytes());
        raw.extend_from_slice(&[0; 5]);
        raw.extend_from_slice(&bitmap);
        raw.extend_from_slice(&tail);
        prop_assert_eq!(raw.len(), 128);

        prop_assert_eq!(Vtoc::unpack(&raw).unwrap().pack(), raw);
    }

    #[test]
    fn allocation_is_deterministic(used in proptest::collection::vec(1usize..2000, 0..6)) {
        let run = || {
            let mut fs = formatted_sd();
            for (i, len) in used.iter().enumerate() {
                fs.write_file(&format!("F{}", i), FileType::Normal, &vec![i as u8; *len]).unwrap();
            }
            fs.save()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn write_then_delete_restores_free_set(len in 0usize..5000) {
        let mut fs = formatted_sd();
        fs.write_file("KEEP", FileType::Normal, &[1; 300]).unwrap();
        let before: Vec<usize> = fs.vtoc().iter_free().collect();

        fs.write_file("TEMP.DAT", FileType::Normal, &vec![0xAB; len]).unwrap();
        prop_assert_eq!(fs.read_file("TEMP.DAT").unwrap().len(), len);
        fs.delete_file("TEMP.DAT").unwrap();

        prop_assert_eq!(fs.vtoc().iter_free().collect::<Vec<_>>(), before);
    }

    #[test]
    fn failed_write_leaves_bytes_unchanged(extra in 1usize..50) {
        let mut fs = formatted_sd();
        fs.write_file("FILL", FileType::Normal, &vec![0; 700 * 125]).unwrap();
        let free = fs.vtoc().free_count();
        let before = fs.save();

        let result = fs.write_file("OVER", FileType::Normal, &vec![1; (free + extra) * 125]);
        prop_assert!(result.is_err());
        prop_assert_eq!(fs.save(), before);
    }
}
