//! Block store → snapshot projection.

use std::collections::HashSet;

use super::BlockSnapshot;
use crate::error::{BlockDocError, Result};
use crate::props;
use crate::store::BlockNode;

/// Anything that can hand out owned block reads by id.
pub trait BlockSource {
    /// Read one block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BlockDocError::NodeNotFound`] for unknown ids.
    fn block(&self, id: &str) -> Result<BlockNode>;
}

/// Encode the subtree rooted at `id`.
pub fn encode(source: &impl BlockSource, id: &str) -> Result<BlockSnapshot> {
    let node = source.block(id)?;
    encode_node(source, &node)
}

/// Encode an already read node and its descendants.
///
/// Props are copied by value (rich text runs included) with keys sorted, and
/// asset ids are carried as opaque strings. Children keep their order.
///
/// # Errors
///
/// Returns [`BlockDocError::InvalidChildReference`] if a block lists one of
/// its own ancestors as a child.
pub fn encode_node(source: &impl BlockSource, node: &BlockNode) -> Result<BlockSnapshot> {
    encode_within(source, node, &mut HashSet::new())
}

fn encode_within(
    source: &impl BlockSource,
    node: &BlockNode,
    ancestors: &mut HashSet<String>,
) -> Result<BlockSnapshot> {
    ancestors.insert(node.id.clone());
    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        if ancestors.contains(child) {
            return Err(BlockDocError::InvalidChildReference {
                parent: node.id.clone(),
                child: child.clone(),
            });
        }
        let child = source.block(child)?;
        children.push(encode_within(source, &child, ancestors)?);
    }
    ancestors.remove(&node.id);

    Ok(BlockSnapshot::new(
        node.id.clone(),
        node.flavour.clone(),
        props::sorted(&node.props),
        children,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::props::props_from;
    use crate::test_utils::create_test_store;
    use crate::text::{RichText, TextAttributes, TextRun};

    #[test]
    fn test_encode_preserves_order_and_count() {
        let store = create_test_store();
        let a = store
            .create_node("affine:paragraph", props_from([("text", RichText::from_plain("a"))]), &[])
            .unwrap();
        let b = store
            .create_node("affine:paragraph", props_from([("text", RichText::from_plain("b"))]), &[])
            .unwrap();
        let c = store.create_node("affine:divider", Default::default(), &[]).unwrap();
        let note = store
            .create_node("affine:note", Default::default(), &[c.clone(), a.clone(), b.clone()])
            .unwrap();

        let snapshot = encode(&store, &note).unwrap();

        let child_ids: Vec<&str> = snapshot.children.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(child_ids, vec![c.as_str(), a.as_str(), b.as_str()]);
        assert_eq!(snapshot.node_count(), 4);
        assert_eq!(snapshot.children[1].text().unwrap().plain_text(), "a");
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let store = create_test_store();
        let text = RichText::from_runs(vec![
            TextRun::plain("aaa"),
            TextRun::styled("bbb", TextAttributes::bold()),
        ]);
        let id = store
            .create_node("affine:paragraph", props_from([("text", text.clone())]), &[])
            .unwrap();

        let snapshot = encode(&store, &id).unwrap();
        store
            .update_props(&id, props_from([("text", RichText::from_plain("changed"))]))
            .unwrap();

        assert_eq!(snapshot.text(), Some(&text));
    }

    #[test]
    fn test_asset_ids_are_opaque() {
        let store = create_test_store();
        let id = store
            .create_node(
                "affine:image",
                props_from([("sourceId", "YXXTjRmLlNyiOUnHb8nAIvUP6V7PAXhwW9F5_tc2LGs=")]),
                &[],
            )
            .unwrap();

        let snapshot = encode(&store, &id).unwrap();
        assert_eq!(
            snapshot.prop_str("sourceId"),
            Some("YXXTjRmLlNyiOUnHb8nAIvUP6V7PAXhwW9F5_tc2LGs=")
        );
        assert_eq!(snapshot.prop_str("caption"), Some(""));
    }

    #[test]
    fn test_encode_missing_node_fails() {
        let store = create_test_store();
        assert!(encode(&store, "nope").is_err());
    }

    struct Blocks(HashMap<String, BlockNode>);

    impl BlockSource for Blocks {
        fn block(&self, id: &str) -> Result<BlockNode> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| BlockDocError::NodeNotFound(id.to_string()))
        }
    }

    #[test]
    fn test_cyclic_source_is_rejected() {
        let node = |id: &str, child: &str| BlockNode {
            id: id.to_string(),
            flavour: "affine:paragraph".to_string(),
            props: Default::default(),
            children: vec![child.to_string()],
        };
        let source = Blocks(
            [("a".to_string(), node("a", "b")), ("b".to_string(), node("b", "a"))]
                .into_iter()
                .collect(),
        );

        assert!(matches!(
            encode(&source, "a"),
            Err(BlockDocError::InvalidChildReference { parent, child }) if parent == "b" && child == "a"
        ));
    }

    #[test]
    fn test_shared_child_across_siblings_is_not_a_cycle() {
        let leaf = BlockNode {
            id: "leaf".to_string(),
            flavour: "affine:divider".to_string(),
            props: Default::default(),
            children: vec![],
        };
        let root = BlockNode {
            id: "root".to_string(),
            flavour: "affine:note".to_string(),
            props: Default::default(),
            children: vec!["leaf".to_string(), "leaf".to_string()],
        };
        let source = Blocks(
            [("leaf".to_string(), leaf), ("root".to_string(), root)]
                .into_iter()
                .collect(),
        );

        assert_eq!(encode(&source, "root").unwrap().children.len(), 2);
    }
}
