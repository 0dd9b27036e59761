use std::path::PathBuf;
use std::process::ExitCode;

use cathode_machines::rom_loader::RomSet;
use clap::{Parser, Subcommand};
use log::error;

mod commands;
mod config;
mod rom_path;

use commands::CliError;
use config::Config;

/// Headless tools for the Fairyland board: firmware checks, leaderboard
/// inspection, and video snapshots.
#[derive(Parser)]
#[command(name = "cathode", version)]
struct Cli {
    /// Config file (default: <config dir>/cathode/cathode.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and check every firmware region
    Verify {
        /// ZIP archive, directory holding fairyland.zip, or loose files
        rom_path: Option<PathBuf>,
        /// Print the MD5 of every chip file found
        #[arg(long)]
        print_digests: bool,
        /// Check sizes only
        #[arg(long)]
        skip_checksums: bool,
    },
    /// Print the persisted high-score table
    Scores {
        file: Option<PathBuf>,
    },
    /// Rasterise a 64 KiB main-bus RAM dump to a PNG
    Render {
        rom_path: Option<PathBuf>,
        #[arg(long)]
        ram: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Inverted palette
        #[arg(long)]
        cheat: bool,
        #[arg(long)]
        skip_checksums: bool,
    },
}

fn rom_set(given: Option<PathBuf>, config: &Config) -> Result<RomSet, CliError> {
    let path = given
        .or_else(|| config.rom_path.clone())
        .ok_or(CliError::Unconfigured("ROM path"))?;
    Ok(rom_path::load_rom_set(&path)?)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Verify {
            rom_path,
            print_digests,
            skip_checksums,
        } => {
            let roms = rom_set(rom_path, &config)?;
            commands::verify(&roms, print_digests, skip_checksums || config.skip_checksums)
        }
        Command::Scores { file } => {
            let path = file
                .or_else(|| config.score_file())
                .ok_or(CliError::Unconfigured("score file"))?;
            commands::scores(&path)
        }
        Command::Render {
            rom_path,
            ram,
            output,
            cheat,
            skip_checksums,
        } => {
            let roms = rom_set(rom_path, &config)?;
            commands::render(
                &roms,
                &ram,
                &output,
                cheat,
                skip_checksums || config.skip_checksums,
            )
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
