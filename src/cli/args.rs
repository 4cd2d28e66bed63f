//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::AddAllRoot;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Zip archives and file watching
#[derive(Parser, Debug)]
#[command(
    name = "zipwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Build and extract zip archives, watch files for changes",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive a directory tree
    Zip {
        /// Directory to archive
        dir: PathBuf,

        /// Archive file to create (overwritten if present)
        output: PathBuf,

        /// Where entries are rooted (overrides config)
        #[arg(long, value_enum)]
        root: Option<AddAllRoot>,
    },

    /// Extract every entry of an archive
    Unzip {
        /// Archive to extract
        archive: PathBuf,

        /// Destination directory (created if missing)
        dest: PathBuf,

        /// Delete the archive after a complete extraction
        #[arg(long)]
        delete: bool,
    },

    /// List archive entries in archive order
    List {
        archive: PathBuf,
    },

    /// Write one entry to stdout
    Cat {
        archive: PathBuf,

        /// Entry name inside the archive
        entry: String,
    },

    /// Print a line whenever one of the files changes
    #[command(
        after_help = "Runs until stdin is closed (Ctrl-D) or the process is interrupted."
    )]
    Watch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Display active settings
    Config,
}
