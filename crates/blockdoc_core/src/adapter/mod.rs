//! Format adapters.
//!
//! An adapter converts a [`BlockSnapshot`] tree to an external format and,
//! where the format carries enough structure, back again:
//!
//! | Adapter              | MIME          | Direction            |
//! | -------------------- | ------------- | -------------------- |
//! | [`HtmlAdapter`]      | `text/html`   | both (structural)    |
//! | [`PlainTextAdapter`] | `text/plain`  | both (text only)     |
//! | [`JsonAdapter`]      | private MIME  | both (lossless)      |
//!
//! Export is deterministic: the same snapshot and the same assets always
//! produce the same bytes.

pub mod assets;
pub mod highlight;
mod html;
mod text;

pub use assets::{AssetsManager, BlobStore, BoxFuture, MemoryBlobStore, sniff_extension};
#[cfg(not(target_arch = "wasm32"))]
pub use assets::DirBlobStore;
pub use html::{HtmlAdapter, ResolvedAssets, escape_html, render_rich_text};
pub use text::PlainTextAdapter;

use crate::error::Result;
use crate::snapshot::BlockSnapshot;

/// The output of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOutput {
    /// The encoded document
    pub file: String,
}

/// A snapshot codec for one format.
pub trait Adapter: Send + Sync {
    /// MIME type of the format.
    fn mime(&self) -> &str;

    /// Encode a snapshot tree.
    fn from_snapshot<'a>(&'a self, snapshot: &'a BlockSnapshot) -> BoxFuture<'a, Result<AdapterOutput>>;

    /// Decode a document into a snapshot tree.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BlockDocError::MalformedSnapshot`] if the input
    /// cannot be turned into a tree.
    fn to_snapshot(&self, input: &str) -> Result<BlockSnapshot>;
}

/// Snapshot JSON under a private MIME type.
///
/// The only exactly lossless codec: `to_snapshot(from_snapshot(s)) == s`.
#[derive(Debug, Clone)]
pub struct JsonAdapter {
    mime: String,
    pretty: bool,
}

impl JsonAdapter {
    /// Create an adapter advertising `mime`.
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            pretty: false,
        }
    }

    /// Indent the output.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Encode synchronously.
    pub fn encode(&self, snapshot: &BlockSnapshot) -> Result<String> {
        if self.pretty {
            snapshot.to_json_pretty()
        } else {
            snapshot.to_json()
        }
    }
}

impl Adapter for JsonAdapter {
    fn mime(&self) -> &str {
        &self.mime
    }

    fn from_snapshot<'a>(&'a self, snapshot: &'a BlockSnapshot) -> BoxFuture<'a, Result<AdapterOutput>> {
        Box::pin(async move {
            Ok(AdapterOutput {
                file: self.encode(snapshot)?,
            })
        })
    }

    fn to_snapshot(&self, input: &str) -> Result<BlockSnapshot> {
        BlockSnapshot::from_json(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockDocError;
    use crate::store::ImportOptions;
    use crate::test_utils::{create_test_store, sample_page_snapshot};
    use futures_lite::future::block_on;

    #[test]
    fn test_json_adapter_is_lossless() {
        let adapter = JsonAdapter::new("blocksuite/page");
        let snapshot = sample_page_snapshot();

        let output = block_on(adapter.from_snapshot(&snapshot)).unwrap();
        assert_eq!(adapter.to_snapshot(&output.file).unwrap(), snapshot);
        assert_eq!(adapter.mime(), "blocksuite/page");
    }

    #[test]
    fn test_json_adapter_keeps_unknown_text_attributes() {
        let adapter = JsonAdapter::new("blocksuite/page");
        let input = r#"{"type":"block","id":"p","flavour":"affine:paragraph","props":{"text":{"$blocksuite:internal:text$":true,"delta":[{"insert":"x","attributes":{"color":"red"}}]}},"children":[]}"#;

        let snapshot = adapter.to_snapshot(input).unwrap();
        let run = &snapshot.text().unwrap().runs()[0];
        assert_eq!(run.attributes.as_ref().unwrap().extra["color"], "red");

        let output = block_on(adapter.from_snapshot(&snapshot)).unwrap();
        assert!(output.file.contains(r#""attributes":{"color":"red"}"#));
        assert_eq!(adapter.to_snapshot(&output.file).unwrap(), snapshot);

        let store = create_test_store();
        let id = store
            .import_snapshot(&snapshot, None, ImportOptions::default())
            .unwrap();
        let stored = crate::snapshot::encode(&store, &id).unwrap();
        assert_eq!(stored.text(), snapshot.text());
    }

    #[test]
    fn test_json_adapter_pretty() {
        let adapter = JsonAdapter::new("x").pretty();
        let file = adapter.encode(&sample_page_snapshot()).unwrap();
        assert!(file.contains("\n  \"id\""));
    }

    #[test]
    fn test_json_adapter_rejects_garbage() {
        let adapter = JsonAdapter::new("x");
        assert!(matches!(
            adapter.to_snapshot("[1, 2]"),
            Err(BlockDocError::MalformedSnapshot(_))
        ));
    }
}
