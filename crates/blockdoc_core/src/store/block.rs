//! Block nodes and their layout inside the replicated document.
//!
//! ```text
//! Y.Doc
//! └── Y.Map "blocks"
//!     └── "<id>" → Y.Map
//!         ├── "sys:id"        → "<id>"
//!         ├── "sys:flavour"   → "affine:paragraph"
//!         ├── "sys:children"  → Y.Array ["<child id>", ...]
//!         ├── "prop:text"     → Y.Text (formatted runs)
//!         └── "prop:type"     → "\"text\"" (JSON encoded)
//! ```
//!
//! Rich text props are replicated text types so concurrent edits merge per
//! character; every other prop is a JSON string, last writer wins per key.

use std::sync::Arc;

use indexmap::IndexMap;
use yrs::types::Attrs;
use yrs::types::text::YChange;
use yrs::{
    Any, Array, ArrayPrelim, Doc, Map, MapPrelim, MapRef, OffsetKind, Options, Out, ReadTxn, Text,
    TextPrelim, TextRef, TransactionMut,
};

use crate::props::{PropValue, Props};
use crate::text::{RichText, TextAttributes, TextRun};

pub(crate) const KEY_ID: &str = "sys:id";
pub(crate) const KEY_FLAVOUR: &str = "sys:flavour";
pub(crate) const KEY_CHILDREN: &str = "sys:children";
pub(crate) const PROP_PREFIX: &str = "prop:";

/// An owned read of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    /// Unique, stable id
    pub id: String,
    /// Flavour tag
    pub flavour: String,
    /// Property bag
    pub props: Props,
    /// Ordered child ids
    pub children: Vec<String>,
}

impl BlockNode {
    /// The `text` prop, if the block carries rich text.
    pub fn text(&self) -> Option<&RichText> {
        self.props.get("text").and_then(PropValue::as_text)
    }

    /// A string prop.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(PropValue::as_str)
    }
}

/// A document whose text offsets are UTF-8 byte positions.
pub(crate) fn new_doc() -> Doc {
    Doc::with_options(Options {
        offset_kind: OffsetKind::Bytes,
        ..Options::default()
    })
}

/// Read the block map stored under `id`.
pub(crate) fn block_ref<T: ReadTxn>(txn: &T, blocks: &MapRef, id: &str) -> Option<MapRef> {
    match blocks.get(txn, id) {
        Some(Out::YMap(block)) => Some(block),
        _ => None,
    }
}

fn out_as_string(out: Out) -> Option<String> {
    match out {
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

/// Ordered child ids of a block.
pub(crate) fn read_children<T: ReadTxn>(txn: &T, block: &MapRef) -> Vec<String> {
    match block.get(txn, KEY_CHILDREN) {
        Some(Out::YArray(children)) => children.iter(txn).filter_map(out_as_string).collect(),
        _ => Vec::new(),
    }
}

/// Flavour tag of a block.
pub(crate) fn read_flavour<T: ReadTxn>(txn: &T, block: &MapRef) -> Option<String> {
    block.get(txn, KEY_FLAVOUR).and_then(out_as_string)
}

/// Runs of a replicated text.
pub(crate) fn read_text<T: ReadTxn>(txn: &T, text: &TextRef) -> RichText {
    let runs = text.diff(txn, YChange::identity).into_iter().filter_map(|chunk| {
        let insert = out_as_string(chunk.insert)?;
        let attributes = chunk.attributes.as_deref().and_then(attributes_from_yrs);
        Some(TextRun { insert, attributes })
    });
    RichText::from_runs(runs)
}

/// Every `prop:` entry of a block.
pub(crate) fn read_props<T: ReadTxn>(txn: &T, block: &MapRef) -> Props {
    let mut props = Props::new();
    for (key, value) in block.iter(txn) {
        let Some(name) = key.strip_prefix(PROP_PREFIX) else {
            continue;
        };
        let prop = match value {
            Out::YText(text) => PropValue::Text(read_text(txn, &text)),
            Out::Any(Any::String(json)) => match serde_json::from_str(&json) {
                Ok(value) => PropValue::Value(value),
                Err(e) => {
                    log::warn!("Skipping unreadable prop '{}': {}", name, e);
                    continue;
                }
            },
            _ => continue,
        };
        props.insert(name.to_string(), prop);
    }
    props.sort_keys();
    props
}

/// Full owned read of a block.
pub(crate) fn read_block<T: ReadTxn>(txn: &T, id: &str, block: &MapRef) -> Option<BlockNode> {
    Some(BlockNode {
        id: id.to_string(),
        flavour: read_flavour(txn, block)?,
        props: read_props(txn, block),
        children: read_children(txn, block),
    })
}

/// Insert a fresh block map with its system keys.
pub(crate) fn insert_block(
    txn: &mut TransactionMut,
    blocks: &MapRef,
    id: &str,
    flavour: &str,
    children: &[String],
) -> MapRef {
    let block = blocks.insert(txn, id, MapPrelim::default());
    block.insert(txn, KEY_ID, id.to_string());
    block.insert(txn, KEY_FLAVOUR, flavour.to_string());
    let list = block.insert(txn, KEY_CHILDREN, ArrayPrelim::default());
    for (index, child) in children.iter().enumerate() {
        list.insert(txn, index as u32, child.clone());
    }
    block
}

/// Write one prop. Rich text is updated in place with a minimal diff.
pub(crate) fn write_prop(txn: &mut TransactionMut, block: &MapRef, key: &str, value: &PropValue) {
    let slot = format!("{}{}", PROP_PREFIX, key);
    match value {
        PropValue::Text(new) => {
            let text = match block.get(&*txn, &slot) {
                Some(Out::YText(existing)) => existing,
                _ => block.insert(txn, slot.as_str(), TextPrelim::new("")),
            };
            let old = read_text(&*txn, &text);
            apply_text_diff(txn, &text, &old, new);
        }
        PropValue::Value(json) => {
            let encoded = json.to_string();
            let unchanged = matches!(
                block.get(&*txn, &slot),
                Some(Out::Any(Any::String(current))) if *current == *encoded
            );
            if !unchanged {
                block.insert(txn, slot.as_str(), encoded);
            }
        }
    }
}

/// Whether a prop slot holds a value.
pub(crate) fn has_prop<T: ReadTxn>(txn: &T, block: &MapRef, key: &str) -> bool {
    block.contains_key(txn, &format!("{}{}", PROP_PREFIX, key))
}

/// Replace `old` with `new` in a replicated text, touching only the changed
/// middle section (common prefix and suffix of characters and formats are kept).
fn apply_text_diff(txn: &mut TransactionMut, text: &TextRef, old: &RichText, new: &RichText) {
    let old_chars = old.chars_with_attributes();
    let new_chars = new.chars_with_attributes();

    let prefix = old_chars
        .iter()
        .zip(new_chars.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let remaining_old = old_chars.len() - prefix;
    let remaining_new = new_chars.len() - prefix;
    let suffix = old_chars[prefix..]
        .iter()
        .rev()
        .zip(new_chars[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .take(remaining_old.min(remaining_new))
        .count();

    // Offsets are UTF-8 byte positions.
    let start: u32 = old_chars[..prefix]
        .iter()
        .map(|(c, _)| c.len_utf8() as u32)
        .sum();
    let removed: u32 = old_chars[prefix..old_chars.len() - suffix]
        .iter()
        .map(|(c, _)| c.len_utf8() as u32)
        .sum();
    if removed > 0 {
        text.remove_range(txn, start, removed);
    }

    let mut position = start;
    let inserted = &new_chars[prefix..new_chars.len() - suffix];
    for chunk in inserted.chunk_by(|(_, a), (_, b)| a == b) {
        let content: String = chunk.iter().map(|(c, _)| *c).collect();
        let attributes = chunk[0].1.as_ref().map(attributes_to_yrs).unwrap_or_default();
        text.insert_with_attributes(txn, position, &content, attributes);
        position += content.len() as u32;
    }
}

const KNOWN_ATTRIBUTES: [&str; 6] = ["bold", "italic", "underline", "strike", "code", "link"];

fn attributes_to_yrs(attributes: &TextAttributes) -> Attrs {
    let mut attrs = Attrs::new();
    let flags = [
        ("bold", attributes.bold),
        ("italic", attributes.italic),
        ("underline", attributes.underline),
        ("strike", attributes.strike),
        ("code", attributes.code),
    ];
    for (name, set) in flags {
        if set {
            attrs.insert(Arc::from(name), Any::Bool(true));
        }
    }
    if let Some(link) = &attributes.link {
        attrs.insert(Arc::from("link"), Any::String(Arc::from(link.as_str())));
    }
    for (name, value) in &attributes.extra {
        match serde_json::from_value::<Any>(value.clone()) {
            Ok(any) => {
                attrs.insert(Arc::from(name.as_str()), any);
            }
            Err(e) => log::warn!("Dropping text attribute '{}': {}", name, e),
        }
    }
    attrs
}

fn attributes_from_yrs(attrs: &Attrs) -> Option<TextAttributes> {
    let flag = |name: &str| matches!(attrs.get(name), Some(Any::Bool(true)));
    let attributes = TextAttributes {
        bold: flag("bold"),
        italic: flag("italic"),
        underline: flag("underline"),
        strike: flag("strike"),
        code: flag("code"),
        link: match attrs.get("link") {
            Some(Any::String(href)) => Some(href.to_string()),
            _ => None,
        },
        extra: extra_attributes(attrs),
    };
    (!attributes.is_empty()).then_some(attributes)
}

/// Attributes without a dedicated field, sorted by name.
fn extra_attributes(attrs: &Attrs) -> IndexMap<String, serde_json::Value> {
    let mut extra: Vec<(String, serde_json::Value)> = attrs
        .iter()
        .filter(|(name, value)| !KNOWN_ATTRIBUTES.contains(&&***name) && **value != Any::Null)
        .filter_map(|(name, value)| Some((name.to_string(), serde_json::to_value(value).ok()?)))
        .collect();
    extra.sort_by(|a, b| a.0.cmp(&b.0));
    extra.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yrs::Transact;

    fn roundtrip(initial: &RichText, updated: &RichText) -> RichText {
        let doc = new_doc();
        let map = doc.get_or_insert_map("blocks");
        let block = {
            let mut txn = doc.transact_mut();
            let block = insert_block(&mut txn, &map, "b", "affine:paragraph", &[]);
            write_prop(&mut txn, &block, "text", &PropValue::Text(initial.clone()));
            block
        };
        {
            let mut txn = doc.transact_mut();
            write_prop(&mut txn, &block, "text", &PropValue::Text(updated.clone()));
        }
        let txn = doc.transact();
        read_props(&txn, &block)["text"].as_text().unwrap().clone()
    }

    #[test]
    fn test_text_diff_preserves_formatting() {
        let initial = RichText::from_runs(vec![
            TextRun::plain("aaa"),
            TextRun::styled("bbb", TextAttributes::bold()),
            TextRun::plain("ccc"),
        ]);
        let updated = RichText::from_runs(vec![
            TextRun::plain("aaa"),
            TextRun::styled("bXb", TextAttributes::bold()),
            TextRun::plain("cccd"),
        ]);

        assert_eq!(roundtrip(&initial, &updated), updated);
    }

    #[test]
    fn test_unrendered_attributes_are_replicated() {
        let mut colored = TextAttributes::bold();
        colored.extra.insert("color".to_string(), serde_json::json!("red"));
        colored.extra.insert("reference".to_string(), serde_json::json!({ "pageId": "p1" }));
        let updated = RichText::from_runs(vec![
            TextRun::plain("plain "),
            TextRun::styled("red", colored),
        ]);

        assert_eq!(roundtrip(&RichText::from_plain("plain"), &updated), updated);
    }

    #[test]
    fn test_text_diff_handles_multibyte_characters() {
        let initial = RichText::from_plain("héllo wörld");
        let updated = RichText::from_runs(vec![
            TextRun::plain("héllo "),
            TextRun::styled("wörld", TextAttributes::italic()),
            TextRun::plain("!"),
        ]);

        assert_eq!(roundtrip(&initial, &updated), updated);
    }

    #[test]
    fn test_json_props_are_read_back() {
        let doc = new_doc();
        let map = doc.get_or_insert_map("blocks");
        let mut txn = doc.transact_mut();
        let block = insert_block(
            &mut txn,
            &map,
            "b",
            "affine:image",
            &["c1".to_string(), "c2".to_string()],
        );
        write_prop(&mut txn, &block, "width", &PropValue::from(640i64));
        write_prop(&mut txn, &block, "caption", &PropValue::from("a cat"));

        let node = read_block(&txn, "b", &block).unwrap();
        assert_eq!(node.flavour, "affine:image");
        assert_eq!(node.children, vec!["c1", "c2"]);
        assert_eq!(node.props["width"], PropValue::from(640i64));
        assert_eq!(node.prop_str("caption"), Some("a cat"));
    }
}
