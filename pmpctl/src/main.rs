// SPDX-License-Identifier: MIT

mod cmd;
mod config;
mod device;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEVICE_ENV, FileConfig, Overrides, Settings};
use crate::utils::LogLevel;

#[derive(Parser)]
#[command(name = "pmpctl", version, about = "PMP300 player manager", long_about = None)]
struct Cli {
    /// Serial device of the bridge (e.g. /dev/ttyACM0, COM3)
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Work on the SmartMedia card instead of internal memory
    #[arg(long, global = true)]
    external: bool,

    /// Settings file (default: ./pmpctl.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print protocol details and extra columns
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the bridge and the player step by step
    Test,
    /// Show capacity and usage of the selected storage
    Info,
    /// List files in playback order
    #[command(alias = "ls")]
    List {
        /// Read ID3 tags and bitrate of each file
        #[arg(long)]
        tags: bool,
    },
    /// Upload local files
    #[command(aliases = ["put", "push"])]
    Upload {
        /// Files or glob patterns
        #[arg(required_unless_present = "directory")]
        patterns: Vec<String>,
        /// Upload every .mp3 in the working directory
        #[arg(long, conflicts_with = "patterns")]
        directory: bool,
    },
    /// Download a file from the player
    Download {
        name: String,
        /// Output path (default: the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete files by name
    #[command(aliases = ["rm", "remove"])]
    Delete {
        #[arg(required_unless_present = "all")]
        names: Vec<String>,
        /// Delete every file
        #[arg(long, conflicts_with = "names")]
        all: bool,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Move a file to another playback position (1-based)
    #[command(alias = "mv")]
    Move { from: usize, to: usize },
    /// Rename a file in place
    Rename { old: String, new: String },
    /// Write an empty directory, erasing every file
    Format {
        /// Write and verify every block first (slow)
        #[arg(long)]
        check_bad_blocks: bool,
        /// Medium capacity in 32 KB blocks, when it cannot be read back
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=8192))]
        blocks: Option<u16>,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Storage media commands
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
    /// Print both directory headers, even corrupt ones
    DumpHeaders,
    /// Verify directory consistency
    Check,
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum StorageCommands {
    /// Capacity and usage of internal and external storage
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    utils::log::init(level);

    if let Commands::Version = cli.command {
        println!("pmpctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let file = FileConfig::load(cli.config.as_deref())?;
    let capacity = match &cli.command {
        Commands::Format { blocks, .. } => *blocks,
        _ => None,
    };
    let overrides = Overrides {
        device: cli.device,
        external: cli.external,
        capacity,
    };
    let settings = Settings::resolve(&overrides, std::env::var(DEVICE_ENV).ok(), file);

    if let Commands::Test = cli.command {
        return cmd::device::test(&settings);
    }

    let mut s = device::open_session(&settings)?;
    match cli.command {
        Commands::Info => cmd::device::info(&mut s)?,
        Commands::List { tags } => cmd::files::list(&mut s, tags)?,
        Commands::Upload {
            patterns,
            directory,
        } => {
            let paths = cmd::files::upload_sources(&patterns, directory)?;
            cmd::files::upload(&mut s, &paths)?
        }
        Commands::Download { name, output } => cmd::files::download(&mut s, &name, output)?,
        Commands::Delete { names, all, force } => cmd::files::delete(&mut s, &names, all, force)?,
        Commands::Move { from, to } => cmd::files::move_entry(&mut s, from, to)?,
        Commands::Rename { old, new } => cmd::files::rename(&mut s, &old, &new)?,
        Commands::Format {
            check_bad_blocks,
            force,
            ..
        } => cmd::device::format(&mut s, check_bad_blocks, force)?,
        Commands::Storage {
            command: StorageCommands::List,
        } => cmd::device::storage_list(&mut s)?,
        Commands::DumpHeaders => cmd::device::dump_headers(&mut s)?,
        Commands::Check => cmd::device::check(&mut s)?,
        Commands::Test | Commands::Version => {}
    }

    Ok(())
}
