//! Portable block snapshots.
//!
//! A [`BlockSnapshot`] is the storage-independent projection of a block
//! subtree. It owns no reference into the live store and serializes as
//!
//! ```text
//! { "type": "block", "id": "...", "flavour": "...", "props": {...}, "children": [...] }
//! ```

mod encoder;

pub use encoder::{BlockSource, encode, encode_node};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{BlockDocError, Result};
use crate::props::{PropValue, Props, is_reserved_key};
use crate::schema::SchemaRegistry;
use crate::text::RichText;

/// The snapshot node tag. Always `"block"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SnapshotKind {
    #[default]
    #[serde(rename = "block")]
    Block,
}

/// Immutable projection of one block and its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlockSnapshot {
    #[serde(rename = "type", default)]
    pub kind: SnapshotKind,

    pub id: String,

    pub flavour: String,

    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub props: Props,

    #[serde(default)]
    pub children: Vec<BlockSnapshot>,
}

impl BlockSnapshot {
    /// Create a snapshot node.
    pub fn new(
        id: impl Into<String>,
        flavour: impl Into<String>,
        props: Props,
        children: Vec<BlockSnapshot>,
    ) -> Self {
        Self {
            kind: SnapshotKind::Block,
            id: id.into(),
            flavour: flavour.into(),
            props,
            children,
        }
    }

    /// Parse snapshot JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::MalformedSnapshot`] if the JSON does not have
    /// the snapshot shape.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BlockDocError::MalformedSnapshot(e.to_string()))
    }

    /// Interpret an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| BlockDocError::MalformedSnapshot(e.to_string()))
    }

    /// Compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The `text` prop, if present.
    pub fn text(&self) -> Option<&RichText> {
        self.props.get("text").and_then(PropValue::as_text)
    }

    /// A string prop.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(PropValue::as_str)
    }

    /// This node and every descendant, in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockSnapshot> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Number of nodes in the tree, this one included.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Check the whole tree against the schema registry.
    ///
    /// Every flavour must be registered, ids must be unique, no reserved key
    /// may appear in props, and each node's props (after default filling)
    /// must pass the flavour's validator.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::MalformedSnapshot`] describing the first
    /// offending node.
    pub fn validate(&self, registry: &SchemaRegistry) -> Result<()> {
        let mut seen = HashSet::new();
        for node in self.iter() {
            if node.id.is_empty() {
                return Err(BlockDocError::MalformedSnapshot(format!(
                    "block of flavour '{}' has an empty id",
                    node.flavour
                )));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(BlockDocError::MalformedSnapshot(format!(
                    "duplicate block id '{}'",
                    node.id
                )));
            }
            if let Some(key) = node.props.keys().find(|key| is_reserved_key(key)) {
                return Err(BlockDocError::MalformedSnapshot(format!(
                    "block '{}' uses reserved prop key '{}'",
                    node.id, key
                )));
            }

            let schema = registry.lookup(&node.flavour).map_err(|e| {
                BlockDocError::MalformedSnapshot(format!("block '{}': {}", node.id, e))
            })?;
            let mut props = node.props.clone();
            for (key, value) in schema.defaults() {
                props.entry(key).or_insert(value);
            }
            schema.validate(&props).map_err(|e| {
                BlockDocError::MalformedSnapshot(format!("block '{}': {}", node.id, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::props_from;
    use crate::test_utils::sample_page_snapshot;

    #[test]
    fn test_parse_reference_shape() {
        let json = r#"{
            "type": "block",
            "id": "block:Bdn8Yvqcny",
            "flavour": "affine:paragraph",
            "props": {
                "type": "text",
                "text": { "$blocksuite:internal:text$": true, "delta": [{ "insert": "aaa" }] }
            },
            "children": []
        }"#;
        let snapshot = BlockSnapshot::from_json(json).unwrap();

        assert_eq!(snapshot.kind, SnapshotKind::Block);
        assert_eq!(snapshot.flavour, "affine:paragraph");
        assert_eq!(snapshot.text().unwrap().plain_text(), "aaa");
    }

    #[test]
    fn test_wrong_type_tag_is_malformed() {
        let json = r#"{ "type": "page", "id": "x", "flavour": "affine:page", "props": {}, "children": [] }"#;
        assert!(matches!(
            BlockSnapshot::from_json(json),
            Err(BlockDocError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let snapshot = sample_page_snapshot();
        let json = snapshot.to_json().unwrap();
        assert_eq!(BlockSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_iter_is_pre_order() {
        let snapshot = sample_page_snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"block:page"));
        assert_eq!(ids.len(), snapshot.node_count());
        let note = ids.iter().position(|id| *id == "block:note").unwrap();
        let first_paragraph = ids.iter().position(|id| *id == "block:p1").unwrap();
        assert!(note < first_paragraph);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_unknown_flavours() {
        let registry = SchemaRegistry::with_builtin_flavours();

        let duplicate = BlockSnapshot::new(
            "a",
            "affine:note",
            Props::new(),
            vec![BlockSnapshot::new("a", "affine:divider", Props::new(), vec![])],
        );
        assert!(matches!(
            duplicate.validate(&registry),
            Err(BlockDocError::MalformedSnapshot(msg)) if msg.contains("duplicate")
        ));

        let unknown = BlockSnapshot::new("a", "affine:database", Props::new(), vec![]);
        assert!(matches!(
            unknown.validate(&registry),
            Err(BlockDocError::MalformedSnapshot(_))
        ));

        let bad_props = BlockSnapshot::new(
            "a",
            "affine:paragraph",
            props_from([("type", "h9")]),
            vec![],
        );
        assert!(bad_props.validate(&registry).is_err());

        assert!(sample_page_snapshot().validate(&registry).is_ok());
    }
}
