//! CLI handler for the clipboard command

use std::path::Path;
use std::sync::Arc;

use blockdoc_core::Result;
use blockdoc_core::adapter::HtmlAdapter;
use blockdoc_core::clipboard::{ClipboardBundle, ClipboardPipeline, ServiceRegistry, select_all};
use blockdoc_core::config::CodecConfig;

use crate::cli::block_on;
use crate::cli::util::read_snapshot;

/// Handle the clipboard command
/// Returns true on success, false on error
pub fn handle_clipboard(config: &CodecConfig, snapshot: &Path, only: Option<&str>) -> bool {
    let bundle = match build_bundle(config, snapshot) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("✗ Failed to build clipboard for {}: {}", snapshot.display(), e);
            return false;
        }
    };

    match only {
        Some(mime) => match bundle.get(mime) {
            Some(data) => {
                println!("{}", data);
                true
            }
            None => {
                let available: Vec<&str> = bundle.items.iter().map(|item| item.mime.as_str()).collect();
                eprintln!("✗ No '{}' item. Available: {}", mime, available.join(", "));
                false
            }
        },
        None => {
            for item in &bundle.items {
                println!("{}", item.mime);
                println!("{}", "=".repeat(item.mime.len()));
                println!("{}", item.data);
                println!();
            }
            true
        }
    }
}

fn build_bundle(config: &CodecConfig, snapshot: &Path) -> Result<ClipboardBundle> {
    let tree = read_snapshot(snapshot)?;
    let selected = select_all(&tree);
    let pipeline = ClipboardPipeline::new(
        Arc::new(ServiceRegistry::with_builtin_services()),
        HtmlAdapter::new(config.clone()),
    );
    let payload = block_on(pipeline.build_payload(&selected, None))?;
    pipeline.bundle(&payload)
}
