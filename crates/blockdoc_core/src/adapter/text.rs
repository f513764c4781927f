//! Plain text adapter.
//!
//! Export writes one line per text block. Nested children are indented by two
//! spaces and list items carry a marker (`- `, `1. `, `[ ] `, `[x] `). Import
//! reads one paragraph per line.

use std::sync::Arc;

use super::assets::BoxFuture;
use super::{Adapter, AdapterOutput};
use crate::error::Result;
use crate::schema::Flavour;
use crate::snapshot::BlockSnapshot;
use crate::store::{IdGenerator, UuidIdGenerator};
use crate::text::RichText;

const INDENT: &str = "  ";

/// Snapshot ↔ plain text.
#[derive(Clone)]
pub struct PlainTextAdapter {
    ids: Arc<dyn IdGenerator>,
}

impl Default for PlainTextAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlainTextAdapter {
    /// Create an adapter that assigns random ids on import.
    pub fn new() -> Self {
        Self {
            ids: Arc::new(UuidIdGenerator),
        }
    }

    /// Id source for imported blocks.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Render a tree.
    pub fn render(&self, snapshot: &BlockSnapshot) -> String {
        self.render_blocks(std::slice::from_ref(snapshot))
    }

    /// Render sibling blocks, one line per text block.
    pub fn render_blocks(&self, nodes: &[BlockSnapshot]) -> String {
        let mut lines = Vec::new();
        write_blocks(nodes, 0, &mut lines);
        lines.join("\n")
    }

    /// Read text into `page → [surface, note → paragraphs]`.
    pub fn parse(&self, text: &str) -> BlockSnapshot {
        let page_id = self.ids.next_id();
        let surface_id = self.ids.next_id();
        let note_id = self.ids.next_id();
        let paragraphs = self.parse_blocks(text);

        BlockSnapshot::new(
            page_id,
            Flavour::Page.as_str(),
            Flavour::Page.defaults(),
            vec![
                BlockSnapshot::new(
                    surface_id,
                    Flavour::Surface.as_str(),
                    Flavour::Surface.defaults(),
                    vec![],
                ),
                BlockSnapshot::new(note_id, Flavour::Note.as_str(), Flavour::Note.defaults(), paragraphs),
            ],
        )
    }

    /// Read text into bare paragraphs.
    pub fn parse_blocks(&self, text: &str) -> Vec<BlockSnapshot> {
        text.lines()
            .map(|line| {
                let mut props = Flavour::Paragraph.defaults();
                props.insert("text".to_string(), RichText::from_plain(line).into());
                BlockSnapshot::new(self.ids.next_id(), Flavour::Paragraph.as_str(), props, vec![])
            })
            .collect()
    }
}

impl Adapter for PlainTextAdapter {
    fn mime(&self) -> &str {
        "text/plain"
    }

    fn from_snapshot<'a>(&'a self, snapshot: &'a BlockSnapshot) -> BoxFuture<'a, Result<AdapterOutput>> {
        Box::pin(async move {
            Ok(AdapterOutput {
                file: self.render(snapshot),
            })
        })
    }

    fn to_snapshot(&self, input: &str) -> Result<BlockSnapshot> {
        Ok(self.parse(input))
    }
}

impl std::fmt::Debug for PlainTextAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainTextAdapter").finish_non_exhaustive()
    }
}

fn write_blocks(nodes: &[BlockSnapshot], depth: usize, lines: &mut Vec<String>) {
    let mut number = 0;
    for node in nodes {
        let numbered =
            node.flavour == Flavour::List.as_str() && node.prop_str("type") == Some("numbered");
        number = if numbered { number + 1 } else { 0 };
        write_block(node, depth, number, lines);
    }
}

fn write_block(node: &BlockSnapshot, depth: usize, number: usize, lines: &mut Vec<String>) {
    let indent = INDENT.repeat(depth);
    let text = node.text().map(RichText::plain_text).unwrap_or_default();

    match Flavour::parse(&node.flavour) {
        Some(Flavour::Page | Flavour::Surface | Flavour::Note) | None => {
            write_blocks(&node.children, depth, lines);
            return;
        }
        Some(Flavour::Paragraph) => lines.push(format!("{}{}", indent, text)),
        Some(Flavour::List) => {
            let marker = match node.prop_str("type") {
                Some("numbered") => format!("{}. ", number),
                Some("todo") => {
                    let checked = node.props.get("checked").and_then(|v| v.as_bool());
                    let marker = if checked == Some(true) { "[x] " } else { "[ ] " };
                    marker.to_string()
                }
                _ => "- ".to_string(),
            };
            lines.push(format!("{}{}{}", indent, marker, text));
        }
        Some(Flavour::Code) => {
            lines.extend(text.split('\n').map(|line| format!("{}{}", indent, line)));
        }
        Some(Flavour::Image) => match node.prop_str("caption") {
            Some(caption) if !caption.is_empty() => lines.push(format!("{}{}", indent, caption)),
            _ => {}
        },
        Some(Flavour::Divider) => lines.push(format!("{}---", indent)),
    }
    write_blocks(&node.children, depth + 1, lines);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::{PropValue, props_from};
    use crate::store::AutoIncrementIdGenerator;
    use crate::test_utils::sample_page_snapshot;

    fn list(id: &str, kind: &str, text: &str, children: Vec<BlockSnapshot>) -> BlockSnapshot {
        BlockSnapshot::new(
            id,
            "affine:list",
            props_from([
                ("type", PropValue::from(kind)),
                ("text", RichText::from_plain(text).into()),
                ("checked", PropValue::from(id.ends_with('x'))),
            ]),
            children,
        )
    }

    #[test]
    fn test_lists_are_marked_and_nested() {
        let nodes = vec![
            list("a", "numbered", "one", vec![list("b", "bulleted", "inner", vec![])]),
            list("c", "numbered", "two", vec![]),
            list("dx", "todo", "done", vec![]),
            list("e", "todo", "open", vec![]),
        ];
        assert_eq!(
            PlainTextAdapter::new().render_blocks(&nodes),
            "1. one\n  - inner\n2. two\n[x] done\n[ ] open"
        );
    }

    #[test]
    fn test_page_renders_note_content() {
        let text = PlainTextAdapter::new().render(&sample_page_snapshot());
        assert!(!text.is_empty());
        assert!(!text.starts_with(' '));
    }

    #[test]
    fn test_parse_one_paragraph_per_line() {
        let adapter =
            PlainTextAdapter::new().with_id_generator(Arc::new(AutoIncrementIdGenerator::new()));
        let page = adapter.parse("first\n\nthird\n");

        let note = &page.children[1];
        assert_eq!(note.children.len(), 3);
        assert_eq!(note.children[0].id, "block:3");
        assert_eq!(note.children[2].text().unwrap().plain_text(), "third");
        assert!(note.children[1].text().unwrap().is_empty());
    }

    #[test]
    fn test_export_then_import_keeps_lines() {
        let adapter = PlainTextAdapter::new();
        let page = adapter.parse("a\nb");
        assert_eq!(adapter.render(&page), "a\nb");
    }
}
