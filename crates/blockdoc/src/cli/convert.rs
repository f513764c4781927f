//! CLI handlers for export and import commands

use std::path::Path;
use std::sync::Arc;

use blockdoc_core::{BlockDocError, Result};
use blockdoc_core::adapter::{AssetsManager, DirBlobStore, HtmlAdapter, PlainTextAdapter};
use blockdoc_core::config::CodecConfig;
use blockdoc_core::snapshot::BlockSnapshot;

use crate::cli::args::Format;
use crate::cli::block_on;
use crate::cli::util::{read_snapshot, write_output};

/// Handle the export command
/// Returns true on success, false on error
pub fn handle_export(
    config: &CodecConfig,
    snapshot: &Path,
    format: Format,
    assets: Option<&Path>,
    output: Option<&Path>,
) -> bool {
    let result = read_snapshot(snapshot)
        .and_then(|tree| render(config, &tree, format, assets))
        .and_then(|rendered| write_output(output, &rendered));

    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("✗ Failed to export {}: {}", snapshot.display(), e);
            false
        }
    }
}

/// Handle the import command
/// Returns true on success, false on error
pub fn handle_import(
    config: &CodecConfig,
    file: &Path,
    format: Format,
    output: Option<&Path>,
) -> bool {
    let result = std::fs::read_to_string(file)
        .map_err(BlockDocError::from)
        .and_then(|input| parse(config, &input, format))
        .and_then(|tree| tree.to_json_pretty())
        .and_then(|json| write_output(output, &json));

    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("✗ Failed to import {}: {}", file.display(), e);
            false
        }
    }
}

fn render(
    config: &CodecConfig,
    tree: &BlockSnapshot,
    format: Format,
    assets: Option<&Path>,
) -> Result<String> {
    match format {
        Format::Html => {
            let mut adapter = HtmlAdapter::new(config.clone());
            if let Some(dir) = assets {
                let blobs = Arc::new(DirBlobStore::new(dir));
                adapter = adapter.with_assets(AssetsManager::new(blobs, config));
            }
            Ok(block_on(adapter.from_snapshot(tree))?.file)
        }
        Format::Text => Ok(PlainTextAdapter::new().render(tree)),
    }
}

fn parse(config: &CodecConfig, input: &str, format: Format) -> Result<BlockSnapshot> {
    match format {
        Format::Html => HtmlAdapter::new(config.clone()).to_snapshot(input),
        Format::Text => Ok(PlainTextAdapter::new().parse(input)),
    }
}
