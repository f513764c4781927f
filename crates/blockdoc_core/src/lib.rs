#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]
#![warn(missing_docs)]

/// Codec configuration
pub mod config;

/// Error (common error types)
pub mod error;

/// Rich text runs and inline attributes
pub mod text;

/// Property bags
pub mod props;

/// Schema registry (flavours, defaults, validators)
pub mod schema;

/// Block store (replicated block document)
pub mod store;

/// Snapshots (portable block trees)
pub mod snapshot;

/// Format adapters (HTML, plain text, JSON)
pub mod adapter;

/// Clipboard pipeline (selection → multi-MIME bundle, and paste)
pub mod clipboard;

pub use error::{BlockDocError, Result};

#[cfg(test)]
pub mod test_utils;
