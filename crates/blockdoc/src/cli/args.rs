//! Command-line argument structures and enums

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blockdoc")]
#[command(version)]
#[command(about = "Convert block document snapshots to HTML, plain text and clipboard payloads", long_about = None)]
pub struct Cli {
    /// Codec config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a snapshot JSON file
    #[command(alias = "e")]
    Export {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Html)]
        format: Format,

        /// Directory holding image blobs, named by source id
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Read an HTML or plain text file into snapshot JSON
    #[command(alias = "i")]
    Import {
        /// Input file
        file: PathBuf,

        /// Input format (default: guessed from the extension)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the clipboard bundle for every content block of a snapshot
    Clipboard {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Print only the item with this MIME type
        #[arg(long)]
        only: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// HTML page
    Html,
    /// Plain text
    Text,
}

impl Format {
    /// Guess from a file extension; anything unknown is plain text.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("html" | "htm") => Format::Html,
            _ => Format::Text,
        }
    }
}
