//! The headless sub-commands.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use cathode_core::core::AddressSpace;
use cathode_machines::fairyland::hiscore::{FileStore, PersistenceError, ScoreStore};
use cathode_machines::fairyland::video::{SCREEN_HEIGHT, SCREEN_WIDTH, VideoRenderer};
use cathode_machines::fairyland::{GFX_ROM, ROM_REGIONS};
use cathode_machines::rom_loader::{LoadError, RomRegion, RomSet};
use log::{error, info};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Scores(#[from] PersistenceError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("PNG encoding: {0}")]
    Png(#[from] png::EncodingError),
    #[error("RAM dump must be {expected} bytes, got {actual}")]
    DumpSize { expected: usize, actual: usize },
    #[error("no {0} given and none configured")]
    Unconfigured(&'static str),
    #[error("{0} ROM region(s) failed verification")]
    Verify(usize),
}

fn load_region(
    region: &RomRegion,
    roms: &RomSet,
    skip_checksums: bool,
) -> Result<Vec<u8>, LoadError> {
    if skip_checksums {
        region.load_skip_checksums(roms)
    } else {
        region.load(roms)
    }
}

/// Load every region of the manifest, reporting each failure.
pub fn verify(roms: &RomSet, print_digests: bool, skip_checksums: bool) -> Result<(), CliError> {
    let mut failures = 0;
    for (label, region) in ROM_REGIONS {
        if print_digests {
            for (file, digest) in region.digests(roms) {
                println!("{label:<6} {file:<12} {}", digest.as_deref().unwrap_or("missing"));
            }
        }
        match load_region(region, roms, skip_checksums) {
            Ok(image) => info!("{label}: {} bytes ok", image.len()),
            Err(e) => {
                error!("{label}: {e}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(CliError::Verify(failures));
    }
    println!("all {} regions ok", ROM_REGIONS.len());
    Ok(())
}

/// Print the persisted leaderboard, one ranked line per entry.
pub fn scores(path: &Path) -> Result<(), CliError> {
    let entries = FileStore::new(path).load()?;
    if entries.is_empty() {
        println!("no scores in {}", path.display());
    }
    for (rank, entry) in entries.iter().enumerate() {
        println!("{:>2}. {entry}", rank + 1);
    }
    Ok(())
}

/// Rasterise a main-bus snapshot into an RGB24 frame.
pub fn rasterise(gfx_rom: &[u8], dump: &[u8], cheat: bool) -> Result<Vec<u8>, CliError> {
    if dump.len() != AddressSpace::CPU_SIZE {
        return Err(CliError::DumpSize {
            expected: AddressSpace::CPU_SIZE,
            actual: dump.len(),
        });
    }
    let mut ram = AddressSpace::new(AddressSpace::CPU_SIZE);
    ram.load(0, dump);
    let mut video = VideoRenderer::new(gfx_rom);
    video.render(&ram, cheat);
    Ok(video.frame().to_vec())
}

pub fn render(
    roms: &RomSet,
    dump_path: &Path,
    output: &Path,
    cheat: bool,
    skip_checksums: bool,
) -> Result<(), CliError> {
    let gfx = load_region(&GFX_ROM, roms, skip_checksums)?;
    let dump = std::fs::read(dump_path).map_err(|source| CliError::Io {
        path: dump_path.to_path_buf(),
        source,
    })?;
    let frame = rasterise(&gfx, &dump, cheat)?;
    write_png(output, &frame)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn write_png(path: &Path, rgb: &[u8]) -> Result<(), CliError> {
    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), SCREEN_WIDTH, SCREEN_HEIGHT);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgb)?;
    writer.finish()?;
    Ok(())
}
