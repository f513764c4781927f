//! Selection → clipboard bundle, and back.
//!
//! Copy turns an ordered list of selected blocks (plus an optional text
//! selection) into three synchronized representations:
//!
//! - `text/plain`: the text of each top-level group, joined by newlines
//! - `text/html`: the rendered groups followed by an HTML comment carrying
//!   the structured payload, for targets that only keep HTML
//! - the private MIME type (`blocksuite/page` by default): a JSON array with
//!   one snapshot per top-level group
//!
//! Paste reads the richest representation available and imports it with
//! fresh ids.

mod service;

pub use service::{BlockService, BuiltinService, ServiceRegistry, TextRange};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::adapter::{HtmlAdapter, PlainTextAdapter, ResolvedAssets};
use crate::error::{BlockDocError, Result};
use crate::schema::{BlockRole, Flavour};
use crate::snapshot::BlockSnapshot;
use crate::store::{BlockStore, ImportOptions};

/// MIME type of the plain text item.
pub const TEXT_MIME: &str = "text/plain";

/// MIME type of the HTML item.
pub const HTML_MIME: &str = "text/html";

const CUSTOM_DATA_PREFIX: &str = "<!--blockdoc-clipboard ";

/// One position inside a block's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPoint {
    /// Block holding the point
    pub block_id: String,
    /// Character offset
    pub index: usize,
    /// Selected characters from `index`
    pub length: usize,
}

/// A text selection across one or more blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSelection {
    /// Start point, in the first selected block.
    pub from: TextPoint,
    /// End point when the selection spans blocks.
    pub to: Option<TextPoint>,
}

impl TextSelection {
    /// Offset where the selection ends in the last block.
    pub fn end_offset(&self) -> usize {
        match &self.to {
            Some(to) => to.index + to.length,
            None => self.from.index + self.from.length,
        }
    }
}

/// A selected block with its text range and the selected blocks below it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedBlock<'a> {
    /// The block as it appears in the source tree
    pub node: &'a BlockSnapshot,
    /// Part of the block's own text to include
    pub range: TextRange,
    /// Selected descendants, grouped
    pub children: Vec<SelectedBlock<'a>>,
}

impl<'a> SelectedBlock<'a> {
    /// A block and all of its descendants, text untrimmed.
    pub fn whole(node: &'a BlockSnapshot) -> Self {
        Self {
            node,
            range: TextRange::FULL,
            children: node.children.iter().map(SelectedBlock::whole).collect(),
        }
    }
}

/// One representation in a clipboard bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClipboardItem {
    /// MIME type
    pub mime: String,
    /// Payload for that type
    pub data: String,
}

/// Every representation of one copy, written as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardBundle {
    /// Items in preference order for the writer
    pub items: Vec<ClipboardItem>,
}

impl ClipboardBundle {
    /// Data of the first item with this MIME type.
    pub fn get(&self, mime: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.mime == mime)
            .map(|item| item.data.as_str())
    }
}

/// The three payloads of a copy, before bundling.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardPayload {
    /// Plain text, groups joined by newlines
    pub text: String,
    /// Rendered groups plus the embedded structured data
    pub html: String,
    /// One snapshot per top-level group
    pub structured: Vec<BlockSnapshot>,
}

/// Destination and source of clipboard bundles.
pub trait ClipboardSink: Send + Sync {
    /// Replace the clipboard contents with all items at once.
    fn write(&self, bundle: ClipboardBundle) -> Result<()>;

    /// Current contents, if any.
    fn read(&self) -> Result<Option<ClipboardBundle>>;
}

/// Process-local clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: RwLock<Option<ClipboardBundle>>,
}

impl MemoryClipboard {
    /// An empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write(&self, bundle: ClipboardBundle) -> Result<()> {
        *self.contents.write().unwrap() = Some(bundle);
        Ok(())
    }

    fn read(&self) -> Result<Option<ClipboardBundle>> {
        Ok(self.contents.read().unwrap().clone())
    }
}

/// Rebuild the forest of selected blocks from a flat, document-ordered
/// selection.
///
/// A block becomes the child of an earlier selected block when it appears in
/// that block's leading run of selected children; the scan of a block's
/// children stops at the first child that is not selected. Without a text
/// selection, paragraphs and list items take their whole subtree.
pub fn group_selection<'a>(
    selected: &'a [BlockSnapshot],
    text: Option<&TextSelection>,
) -> Vec<SelectedBlock<'a>> {
    let selected_ids: HashSet<&str> = selected.iter().map(|node| node.id.as_str()).collect();
    let mut parent_of: HashMap<&str, &str> = HashMap::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut expanded: HashSet<usize> = HashSet::new();
    let mut slots: Vec<Option<(SelectedBlock<'a>, Option<usize>)>> = Vec::with_capacity(selected.len());

    let last = selected.len().saturating_sub(1);
    for (i, node) in selected.iter().enumerate() {
        for child in &node.children {
            if !selected_ids.contains(child.id.as_str()) {
                break;
            }
            parent_of.insert(child.id.as_str(), node.id.as_str());
        }

        let parent = parent_of
            .get(node.id.as_str())
            .and_then(|parent| index_of.get(parent))
            .copied();
        index_of.insert(node.id.as_str(), i);

        // Already covered by an expanded ancestor.
        if parent.is_some_and(|p| expanded.contains(&p)) {
            expanded.insert(i);
            slots.push(None);
            continue;
        }

        let range = TextRange {
            begin: if i == 0 { text.map(|t| t.from.index) } else { None },
            end: if i == last { text.map(TextSelection::end_offset) } else { None },
        };
        let expand = text.is_none()
            && matches!(Flavour::parse(&node.flavour), Some(Flavour::Paragraph | Flavour::List));
        let block = if expand {
            expanded.insert(i);
            SelectedBlock {
                range,
                ..SelectedBlock::whole(node)
            }
        } else {
            SelectedBlock {
                node,
                range,
                children: Vec::new(),
            }
        };
        slots.push(Some((block, parent)));
    }

    // Children always come after their parent, so a reverse pass can move
    // each block into its parent.
    let mut roots = Vec::new();
    for i in (0..slots.len()).rev() {
        let Some((block, parent)) = slots[i].take() else {
            continue;
        };
        match parent.and_then(|p| slots[p].as_mut()) {
            Some((parent_block, _)) => parent_block.children.insert(0, block),
            None => roots.push(block),
        }
    }
    roots.reverse();
    roots
}

/// Every content block of a tree, in document order, for select-all.
pub fn select_all(root: &BlockSnapshot) -> Vec<BlockSnapshot> {
    root.iter()
        .filter(|node| {
            Flavour::parse(&node.flavour).is_none_or(|flavour| flavour.role() == BlockRole::Content)
        })
        .cloned()
        .collect()
}

/// Builds clipboard bundles from selections and reads them back.
#[derive(Debug, Clone)]
pub struct ClipboardPipeline {
    services: Arc<ServiceRegistry>,
    html: HtmlAdapter,
    text: PlainTextAdapter,
    mime: String,
}

impl ClipboardPipeline {
    /// The private MIME type comes from the adapter's config.
    pub fn new(services: Arc<ServiceRegistry>, html: HtmlAdapter) -> Self {
        let mime = html.config().clipboard_mime.clone();
        Self {
            services,
            html,
            text: PlainTextAdapter::new(),
            mime,
        }
    }

    /// The private MIME type.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Convert a selection into its three payloads.
    ///
    /// Blocks whose flavour has no registered service are skipped with a
    /// warning. Image assets for the whole selection are resolved
    /// concurrently before rendering.
    pub async fn build_payload(
        &self,
        selected: &[BlockSnapshot],
        text: Option<&TextSelection>,
    ) -> Result<ClipboardPayload> {
        let groups = group_selection(selected, text);
        let assets = self.html.resolve_assets(selected).await;

        let mut converted = Vec::new();
        for group in &groups {
            converted.extend(self.convert(group, &assets)?);
        }

        let mut html = self.html.join_fragments(
            converted
                .iter()
                .map(|block| (&block.structured, block.html.as_str())),
        );
        let texts: Vec<String> = converted.iter().map(|block| block.text.clone()).collect();
        let structured: Vec<BlockSnapshot> = converted.into_iter().map(|block| block.structured).collect();

        let json = serde_json::to_string(&structured)?;
        html.push_str(&custom_data_fragment(&self.mime, &json));
        log::debug!("Built clipboard payload with {} groups", structured.len());

        Ok(ClipboardPayload {
            text: texts.join("\n"),
            html,
            structured,
        })
    }

    /// Bundle a payload as clipboard items.
    pub fn bundle(&self, payload: &ClipboardPayload) -> Result<ClipboardBundle> {
        Ok(ClipboardBundle {
            items: vec![
                ClipboardItem {
                    mime: TEXT_MIME.to_string(),
                    data: payload.text.clone(),
                },
                ClipboardItem {
                    mime: HTML_MIME.to_string(),
                    data: payload.html.clone(),
                },
                ClipboardItem {
                    mime: self.mime.clone(),
                    data: serde_json::to_string(&payload.structured)?,
                },
            ],
        })
    }

    /// Build the bundle for a selection and write it in one step.
    pub async fn copy(
        &self,
        sink: &dyn ClipboardSink,
        selected: &[BlockSnapshot],
        text: Option<&TextSelection>,
    ) -> Result<ClipboardBundle> {
        let payload = self.build_payload(selected, text).await?;
        let bundle = self.bundle(&payload)?;
        sink.write(bundle.clone())?;
        Ok(bundle)
    }

    /// Read snapshots from a bundle.
    ///
    /// Preference order: the private MIME item, the structured data embedded
    /// in the HTML item, the HTML markup, the plain text.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::MalformedSnapshot`] if structured data is
    /// present but cannot be decoded.
    pub fn read_snapshots(&self, bundle: &ClipboardBundle) -> Result<Vec<BlockSnapshot>> {
        if let Some(json) = bundle.get(&self.mime) {
            return parse_structured(json);
        }
        if let Some(html) = bundle.get(HTML_MIME) {
            if let Some(json) = extract_custom_data(html, &self.mime)? {
                return parse_structured(&json);
            }
            return Ok(self.html.to_blocks(html));
        }
        match bundle.get(TEXT_MIME) {
            Some(text) => Ok(self.text.parse_blocks(text)),
            None => Ok(Vec::new()),
        }
    }

    /// Import a bundle's blocks under `parent` starting at `index`, with fresh
    /// ids. Returns the new root ids.
    ///
    /// Every snapshot is validated before anything is written.
    pub fn paste(
        &self,
        store: &BlockStore,
        bundle: &ClipboardBundle,
        parent: &str,
        index: usize,
    ) -> Result<Vec<String>> {
        let snapshots = self.read_snapshots(bundle)?;
        for snapshot in &snapshots {
            snapshot.validate(store.registry())?;
        }

        let options = ImportOptions {
            regenerate_ids: true,
        };
        snapshots
            .iter()
            .enumerate()
            .map(|(offset, snapshot)| {
                store.import_snapshot(snapshot, Some((parent, index + offset)), options)
            })
            .collect()
    }

    fn convert(&self, block: &SelectedBlock<'_>, assets: &ResolvedAssets) -> Result<Option<Converted>> {
        let service = match self.services.get(&block.node.flavour) {
            Ok(service) => service,
            Err(e @ BlockDocError::UnsupportedFlavour(_)) => {
                log::warn!("Skipping block {} on copy: {}", block.node.id, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut converted = Vec::new();
        for child in &block.children {
            converted.extend(self.convert(child, assets)?);
        }
        let children_html = self.html.join_fragments(
            converted
                .iter()
                .map(|child| (&child.structured, child.html.as_str())),
        );
        let mut children_text = Vec::new();
        let mut children = Vec::new();
        for child in converted {
            if !child.text.is_empty() {
                children_text.push(child.text);
            }
            children.push(child.structured);
        }

        Ok(Some(Converted {
            html: service.to_html_fragment(block.node, block.range, &children_html, &self.html, assets)?,
            text: service.to_plain_text(block.node, block.range, &children_text)?,
            structured: service.to_structured(block.node, block.range, children)?,
        }))
    }
}

struct Converted {
    html: String,
    text: String,
    structured: BlockSnapshot,
}

fn parse_structured(json: &str) -> Result<Vec<BlockSnapshot>> {
    serde_json::from_str(json).map_err(|e| BlockDocError::MalformedSnapshot(e.to_string()))
}

/// `<!--blockdoc-clipboard type="<mime>" data="<base64 json>"-->`
fn custom_data_fragment(mime: &str, json: &str) -> String {
    format!(
        "{}type=\"{}\" data=\"{}\"-->",
        CUSTOM_DATA_PREFIX,
        mime,
        STANDARD.encode(json)
    )
}

/// The JSON embedded in HTML for `mime`, if present.
fn extract_custom_data(html: &str, mime: &str) -> Result<Option<String>> {
    let type_attr = format!("type=\"{}\"", mime);
    for (start, _) in html.match_indices(CUSTOM_DATA_PREFIX) {
        let rest = &html[start + CUSTOM_DATA_PREFIX.len()..];
        let Some(end) = rest.find("-->") else {
            break;
        };
        let comment = &rest[..end];
        if !comment.starts_with(&type_attr) {
            continue;
        }
        let Some(data) = comment
            .split_once("data=\"")
            .and_then(|(_, tail)| tail.split_once('"'))
            .map(|(data, _)| data)
        else {
            continue;
        };
        let bytes = STANDARD
            .decode(data)
            .map_err(|e| BlockDocError::MalformedSnapshot(format!("clipboard data: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| BlockDocError::MalformedSnapshot(format!("clipboard data: {}", e)))?;
        return Ok(Some(json));
    }
    Ok(None)
}
