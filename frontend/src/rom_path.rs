//! Locate a ROM set on disk: a `.zip` archive, a directory holding
//! `fairyland.zip`, or a directory of loose chip files.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use cathode_machines::fairyland::ROM_SET_NAME;
use cathode_machines::rom_loader::{LoadError, RomSet};

pub fn load_rom_set(path: &Path) -> Result<RomSet, LoadError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return load_zip(path);
    }

    if path.is_dir() {
        let archive = path.join(format!("{ROM_SET_NAME}.zip"));
        if archive.is_file() {
            return load_zip(&archive);
        }
        return RomSet::from_directory(path);
    }

    Err(LoadError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("ROM path not found: {}", path.display()),
    )))
}

fn invalid_zip(e: zip::result::ZipError) -> LoadError {
    LoadError::Io(io::Error::new(io::ErrorKind::InvalidData, format!("bad ZIP: {e}")))
}

fn load_zip(path: &Path) -> Result<RomSet, LoadError> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?)).map_err(invalid_zip)?;

    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid_zip)?;
        if entry.is_dir() {
            continue;
        }
        // Archives made by some tools nest the chips in a folder
        let name = entry
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        files.push((name, data));
    }
    log::debug!("{}: {} files", path.display(), files.len());
    Ok(RomSet::from_entries(files))
}
