/// Clap argument definitions
mod args;

/// `clipboard` command
mod clipboard;

/// `export` and `import` commands
mod convert;

/// Shared CLI utilities
mod util;

use clap::Parser;

use blockdoc_core::config::CodecConfig;

/// Helper to run async operations in sync context
fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

pub use args::Cli;
use args::{Commands, Format};

/// Main entry point for the CLI
pub fn run_cli() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match CodecConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("✗ Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => CodecConfig::default(),
    };

    let success = match cli.command {
        Commands::Export {
            snapshot,
            format,
            assets,
            output,
        } => convert::handle_export(&config, &snapshot, format, assets.as_deref(), output.as_deref()),

        Commands::Import {
            file,
            format,
            output,
        } => {
            let format = format.unwrap_or_else(|| Format::from_path(&file));
            convert::handle_import(&config, &file, format, output.as_deref())
        }

        Commands::Clipboard { snapshot, only } => {
            clipboard::handle_clipboard(&config, &snapshot, only.as_deref())
        }
    };

    if !success {
        std::process::exit(1);
    }
}
