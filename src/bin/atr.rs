/// Interactive ATR console application

use atrmanager::filesystem::registry;
use atrmanager::*;
use log::debug;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "boot",
                "convert",
                "create",
                "delete",
                "dir",
                "exit",
                "export",
                "format",
                "help",
                "import",
                "info",
                "ls",
                "map",
                "open",
                "quit",
                "read",
                "read-sector",
                "rm",
                "save",
                "vtoc",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only the command name is completed
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// An open image, mounted if it carries a known filesystem
enum Session {
    Raw(DiskImage),
    Mounted(Box<dyn FileSystem>),
}

impl Session {
    fn new(image: DiskImage) -> Self {
        match registry::mount(image) {
            Ok(fs) => {
                println!("Filesystem: {}", fs.name());
                Session::Mounted(fs)
            }
            Err((image, e)) => {
                println!("No filesystem mounted ({}); raw sector access only", e);
                Session::Raw(image)
            }
        }
    }

    fn image(&self) -> &DiskImage {
        match self {
            Session::Raw(image) => image,
            Session::Mounted(fs) => fs.image(),
        }
    }

    fn image_mut(&mut self) -> &mut DiskImage {
        match self {
            Session::Raw(image) => image,
            Session::Mounted(fs) => fs.image_mut(),
        }
    }

    fn filesystem(&mut self) -> Option<&mut Box<dyn FileSystem>> {
        match self {
            Session::Raw(_) => None,
            Session::Mounted(fs) => Some(fs),
        }
    }
}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".atrmanager_history");
        p
    })
}

fn main() {
    env_logger::init();

    println!("=== ATRManager ===");
    println!("Interactive console for exploring Atari ATR and XFD disk images.");
    println!("Type 'help' for available commands\n");

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            std::process::exit(1);
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut session: Option<Session> = None;

    loop {
        let input = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();
        debug!("command: {:?}", parts);

        match command.as_str() {
            "help" => print_help(),
            "quit" | "exit" => break,
            "open" => {
                if parts.len() < 2 {
                    println!("Usage: open <path>");
                    continue;
                }
                match DiskImage::open(&parts[1]) {
                    Ok(image) => {
                        println!("Opened: {}", parts[1]);
                        session = Some(Session::new(image));
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "create" => {
                let density = parts.get(1).map(|s| s.to_lowercase());
                let format = match parts.get(2) {
                    Some(name) => match ImageFormat::from_name(name) {
                        Some(format) => format,
                        None => {
                            println!("Unknown format '{}', expected atr or xfd", name);
                            continue;
                        }
                    },
                    None => ImageFormat::Atr,
                };
                let builder = match density.as_deref() {
                    None | Some("sd") => DiskImage::builder().single_density(),
                    Some("ed") => DiskImage::builder().enhanced_density(),
                    Some("dd") => DiskImage::builder().double_density(),
                    Some(other) => {
                        println!("Unknown density '{}', expected sd, ed or dd", other);
                        continue;
                    }
                };
                match builder.format(format).build().and_then(AtariDosFileSystem::format) {
                    Ok(fs) => {
                        println!(
                            "Created new {} image ({} sectors), formatted for DOS 2",
                            fs.image().format(),
                            fs.image().sector_count()
                        );
                        session = Some(Session::Mounted(Box::new(fs)));
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "format" => {
                let Some(current) = session.take() else {
                    println!("No image loaded");
                    continue;
                };
                let image = current.image().clone();
                match AtariDosFileSystem::format(image) {
                    Ok(fs) => {
                        println!("Formatted: {} free sectors", fs.vtoc().free_count());
                        session = Some(Session::Mounted(Box::new(fs)));
                    }
                    Err(e) => {
                        println!("Error: {}", e);
                        session = Some(current);
                    }
                }
            }
            "info" => match session {
                Some(ref session) => print_info(session),
                None => println!("No image loaded"),
            },
            "dir" | "ls" => match session.as_mut().and_then(Session::filesystem) {
                Some(fs) => list_files(&**fs),
                None => println!("No filesystem mounted"),
            },
            "read" => {
                if parts.len() < 2 {
                    println!("Usage: read <filename>");
                    continue;
                }
                match session.as_mut().and_then(Session::filesystem) {
                    Some(fs) => match fs.read_file(&parts[1]) {
                        Ok(data) => {
                            println!("{} ({} bytes):", parts[1].to_uppercase(), data.len());
                            print_hex_dump(&data, 512);
                        }
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("No filesystem mounted"),
                }
            }
            "export" => {
                if parts.len() < 2 {
                    println!("Usage: export <filename> [output_path]");
                    continue;
                }
                let output = parts.get(2).cloned().unwrap_or_else(|| parts[1].clone());
                match session.as_mut().and_then(Session::filesystem) {
                    Some(fs) => match fs.read_file(&parts[1]) {
                        Ok(data) => match std::fs::write(&output, &data) {
                            Ok(()) => println!("Exported {} bytes to {}", data.len(), output),
                            Err(e) => println!("Error writing {}: {}", output, e),
                        },
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("No filesystem mounted"),
                }
            }
            "import" => {
                if parts.len() < 2 {
                    println!("Usage: import <host_path> [disk_name] [locked]");
                    continue;
                }
                let name = parts.get(2).cloned().unwrap_or_else(|| disk_name_for(&parts[1]));
                let file_type = if parts.iter().skip(3).any(|p| p.eq_ignore_ascii_case("locked")) {
                    FileType::Locked
                } else {
                    FileType::Normal
                };
                let data = match std::fs::read(&parts[1]) {
                    Ok(data) => data,
                    Err(e) => {
                        println!("Error reading {}: {}", parts[1], e);
                        continue;
                    }
                };
                match session.as_mut().and_then(Session::filesystem) {
                    Some(fs) => match fs.write_file(&name, file_type, &data) {
                        Ok(()) => println!("Imported {} bytes as {}", data.len(), name.to_uppercase()),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("No filesystem mounted"),
                }
            }
            "delete" | "rm" => {
                if parts.len() < 2 {
                    println!("Usage: delete <filename>");
                    continue;
                }
                match session.as_mut().and_then(Session::filesystem) {
                    Some(fs) => match fs.delete_file(&parts[1]) {
                        Ok(()) => println!("Deleted {}", parts[1].to_uppercase()),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("No filesystem mounted"),
                }
            }
            "vtoc" | "map" => match session {
                Some(ref session) => {
                    let image = session.image();
                    match image.read_sector(360).and_then(Vtoc::unpack) {
                        Ok(vtoc) => map::draw_vtoc_map(&vtoc, image.header().sectors_per_track),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                None => println!("No image loaded"),
            },
            "boot" => match session {
                Some(ref session) => match BootRecord::from_image(session.image()) {
                    Ok(record) => {
                        println!("Boot record: {}", record);
                        match detect_boot_disk(session.image()) {
                            Ok(_) => println!("Looks bootable"),
                            Err(e) => println!("Not bootable: {}", e),
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("No image loaded"),
            },
            "read-sector" => {
                let Some(ref session) = session else {
                    println!("No image loaded");
                    continue;
                };
                let Some(sector) = parts.get(1).and_then(|s| parse_number(s)) else {
                    println!("Usage: read-sector <sector>");
                    continue;
                };
                match session.image().read_sector(sector) {
                    Ok(data) => {
                        println!("Sector {} ({} bytes):", sector, data.len());
                        print_hex_dump(data, data.len());
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "convert" => {
                let Some(format) = parts.get(1).and_then(|s| ImageFormat::from_name(s)) else {
                    println!("Usage: convert <atr|xfd>");
                    continue;
                };
                let Some(current) = session.take() else {
                    println!("No image loaded");
                    continue;
                };
                match current.image().as_new_format(format) {
                    Ok(image) => {
                        println!("Converted to {}", format);
                        session = Some(Session::new(image));
                    }
                    Err(e) => {
                        println!("Error: {}", e);
                        session = Some(current);
                    }
                }
            }
            "save" => {
                let Some(ref mut session) = session else {
                    println!("No image loaded");
                    continue;
                };
                let path = match parts.get(1) {
                    Some(path) => path.clone(),
                    None => match session.image().filename() {
                        Some(name) => name.to_string(),
                        None => {
                            println!("Usage: save <path>");
                            continue;
                        }
                    },
                };
                match session.image_mut().save(&path) {
                    Ok(()) => println!("Saved: {}", path),
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", command);
            }
        }
    }

    if let Some(history_path) = history_path() {
        let _ = rl.save_history(&history_path);
    }
    println!("Goodbye!");
}

fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse "360", "$168" or "0x168"
fn parse_number(s: &str) -> Option<usize> {
    if let Some(hex) = s.strip_prefix('$').or_else(|| s.strip_prefix("0x")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// DOS name for a host file: upper-cased 8.3 from the file name
fn disk_name_for(host_path: &str) -> String {
    let file_name = std::path::Path::new(host_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(host_path);
    let (stem, ext) = file_name.split_once('.').unwrap_or((file_name, ""));
    let clean = |s: &str, max: usize| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(max)
            .collect::<String>()
            .to_ascii_uppercase()
    };
    let stem = clean(stem, 8);
    let ext = clean(ext, 3);
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  open <path>                     - Open an ATR or XFD image (use quotes for paths with spaces)");
    println!("  create [sd|ed|dd] [atr|xfd]     - Create a new DOS 2 formatted image");
    println!("  format                          - Lay down an empty DOS 2 filesystem");
    println!("  info                            - Show image and filesystem information");
    println!("  dir, ls                         - List files on disk");
    println!("  read <filename>                 - Hex dump a file");
    println!("  export <filename> [output_path] - Export a file to the host filesystem");
    println!("  import <host_path> [name] [locked] - Import a host file");
    println!("  delete, rm <filename>           - Delete a file");
    println!("  vtoc, map                       - Visual map of the free sector table");
    println!("  boot                            - Show the boot record");
    println!("  read-sector <sector>            - Hex dump a sector (decimal, $hex or 0xhex)");
    println!("  convert <atr|xfd>               - Change the container format");
    println!("  save [path]                     - Save image to file");
    println!("  help                            - Show this help");
    println!("  quit, exit                      - Exit");
}

fn print_info(session: &Session) {
    let image = session.image();
    let header = image.header();
    println!("Format:       {}", image.format());
    if let Some(name) = image.filename() {
        println!("Filename:     {}", name);
    }
    println!("Sectors:      {}", image.sector_count());
    println!("Sector size:  {}", header.sector_size);
    if header.num_initial_sectors > 0 {
        println!(
            "Boot sectors: {} x {} bytes",
            header.num_initial_sectors, header.initial_sector_size
        );
    }
    println!("Image size:   {} bytes", header.image_size);
    println!("Modified:     {}", if image.is_changed() { "yes" } else { "no" });

    if let Session::Mounted(fs) = session {
        let info = fs.info();
        println!();
        println!("Filesystem:   {}", info.fs_type);
        println!("Files:        {} of {}", info.files, info.directory_capacity);
        println!("Total:        {} sectors", info.total_sectors);
        println!(
            "Free:         {} sectors ({} bytes)",
            info.free_sectors,
            info.free_bytes()
        );
    }
}

fn list_files(fs: &dyn FileSystem) {
    let files = fs.list_files();
    if files.is_empty() {
        println!("No files");
        return;
    }

    println!("{:<3} {:<12} {:>7} {:>8} {:>6}  {}", "#", "Name", "Sectors", "Size", "Start", "Flags");
    for entry in &files {
        let mut flags = Vec::new();
        if entry.attributes.locked {
            flags.push("locked");
        }
        if !entry.attributes.dos2 {
            flags.push("dos1");
        }
        if entry.attributes.open_for_output {
            flags.push("open");
        }
        println!(
            "{:<3} {:<12} {:>7} {:>8} {:>6}  {}",
            entry.index,
            entry.name,
            entry.sectors,
            entry.size,
            entry.start_sector,
            flags.join(" ")
        );
        if let Some(ref error) = entry.error {
            println!("      ! {}", error);
        }
    }

    let info = fs.info();
    println!("{} free sectors", info.free_sectors);
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);
        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        // ATASCII shares printable ASCII
        let text: String = chunk
            .iter()
            .map(|&b| if (32..127).contains(&b) { b as char } else { '.' })
            .collect();
        println!(" |{}|", text);
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}
