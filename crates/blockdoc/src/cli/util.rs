//! Shared utilities for CLI commands

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use blockdoc_core::Result;
use blockdoc_core::snapshot::BlockSnapshot;

/// Read and parse a snapshot JSON file.
pub fn read_snapshot(path: &Path) -> Result<BlockSnapshot> {
    let json = fs::read_to_string(path)?;
    BlockSnapshot::from_json(&json)
}

/// Write to `output`, or to stdout when no file was given.
pub fn write_output(output: Option<&Path>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_snapshot_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(read_snapshot(&path).is_err());
    }

    #[test]
    fn test_write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/page.html");

        write_output(Some(&path), "<p>x</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>x</p>");
    }
}
