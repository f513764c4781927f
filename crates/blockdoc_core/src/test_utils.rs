//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::props::{PropValue, Props, props_from};
use crate::schema::{Flavour, SchemaRegistry};
use crate::snapshot::BlockSnapshot;
use crate::store::{AutoIncrementIdGenerator, BlockStore, MemoryStorage};
use crate::text::{RichText, TextAttributes, TextRun};

/// An empty store with the built-in flavours and sequential ids
/// (`block:0`, `block:1`, ...).
pub fn create_test_store() -> BlockStore {
    BlockStore::new(
        Arc::new(SchemaRegistry::with_builtin_flavours()),
        Arc::new(MemoryStorage::new()),
    )
    .with_id_generator(Arc::new(AutoIncrementIdGenerator::new()))
}

/// A block with every default prop filled, so it equals what the store
/// encodes after an import.
pub fn block(id: &str, flavour: Flavour, overrides: Props, children: Vec<BlockSnapshot>) -> BlockSnapshot {
    let mut props = flavour.defaults();
    props.extend(overrides);
    BlockSnapshot::new(id, flavour.as_str(), props, children)
}

/// `page → [surface, note → [paragraph, list, code]]`.
///
/// The note is always `children[1]` and its first block is `block:p1`.
pub fn sample_page_snapshot() -> BlockSnapshot {
    let text = RichText::from_runs(vec![
        TextRun::plain("hello "),
        TextRun::styled("world", TextAttributes::bold()),
    ]);

    block(
        "block:page",
        Flavour::Page,
        Props::new(),
        vec![
            block("block:surface", Flavour::Surface, Props::new(), vec![]),
            block(
                "block:note",
                Flavour::Note,
                Props::new(),
                vec![
                    block("block:p1", Flavour::Paragraph, props_from([("text", text)]), vec![]),
                    block(
                        "block:l1",
                        Flavour::List,
                        props_from([("text", RichText::from_plain("item"))]),
                        vec![],
                    ),
                    block(
                        "block:c1",
                        Flavour::Code,
                        props_from([
                            ("language", PropValue::from("python")),
                            ("text", RichText::from_plain("import this").into()),
                        ]),
                        vec![],
                    ),
                ],
            ),
        ],
    )
}
