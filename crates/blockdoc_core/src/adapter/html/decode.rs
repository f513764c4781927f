//! HTML → snapshot.

use super::dom::{self, Element, Node};
use crate::error::Result;
use crate::props::{PropValue, Props};
use crate::schema::{Flavour, LIST_TYPES};
use crate::snapshot::BlockSnapshot;
use crate::store::IdGenerator;
use crate::text::{RichText, TextAttributes, TextRun};

const SKIPPED: [&str; 8] = ["head", "style", "script", "title", "meta", "link", "input", "template"];

const INLINE: [&str; 17] = [
    "a", "b", "strong", "i", "em", "u", "s", "del", "strike", "code", "span", "br", "label",
    "mark", "small", "sub", "sup",
];

/// Decode a document into `page → [surface, note → blocks]`.
pub(super) fn decode_page(html: &str, ids: &dyn IdGenerator) -> Result<BlockSnapshot> {
    let nodes = dom::parse(html);
    let title = nodes
        .iter()
        .find_map(|node| match node {
            Node::Element(element) if element.name == "title" => Some(element),
            Node::Element(element) => element.find("title"),
            _ => None,
        })
        .map(|title| RichText::from_plain(title.text_content().trim()))
        .unwrap_or_default();

    let page_id = ids.next_id();
    let surface_id = ids.next_id();
    let note_id = ids.next_id();
    let blocks = Decoder { ids }.blocks(&nodes);
    log::debug!("Decoded {} top-level blocks from HTML", blocks.len());

    let mut page_props = Flavour::Page.defaults();
    page_props.insert("title".to_string(), title.into());

    Ok(BlockSnapshot::new(
        page_id,
        Flavour::Page.as_str(),
        page_props,
        vec![
            BlockSnapshot::new(
                surface_id,
                Flavour::Surface.as_str(),
                Flavour::Surface.defaults(),
                vec![],
            ),
            BlockSnapshot::new(
                note_id,
                Flavour::Note.as_str(),
                Flavour::Note.defaults(),
                blocks,
            ),
        ],
    ))
}

/// Decode a fragment into content blocks.
pub(super) fn decode_blocks(html: &str, ids: &dyn IdGenerator) -> Vec<BlockSnapshot> {
    Decoder { ids }.blocks(&dom::parse(html))
}

struct Decoder<'a> {
    ids: &'a dyn IdGenerator,
}

impl Decoder<'_> {
    fn block(&self, flavour: Flavour, overrides: Props, children: Vec<BlockSnapshot>) -> BlockSnapshot {
        let mut props = flavour.defaults();
        props.extend(overrides);
        BlockSnapshot::new(self.ids.next_id(), flavour.as_str(), props, children)
    }

    /// Reserve an id before decoding children, so ids follow document order.
    fn block_with_id(
        &self,
        id: String,
        flavour: Flavour,
        overrides: Props,
        children: Vec<BlockSnapshot>,
    ) -> BlockSnapshot {
        let mut props = flavour.defaults();
        props.extend(overrides);
        BlockSnapshot::new(id, flavour.as_str(), props, children)
    }

    fn blocks(&self, nodes: &[Node]) -> Vec<BlockSnapshot> {
        let mut out = Vec::new();
        let mut pending = RichText::new();

        for node in nodes {
            match node {
                Node::Comment(_) => {}
                Node::Text(text) => {
                    if !pending.is_empty() || !text.trim().is_empty() {
                        pending.push(TextRun::plain(text.as_str()));
                    }
                }
                Node::Element(element) if INLINE.contains(&element.name.as_str()) => {
                    inline(std::slice::from_ref(node), &TextAttributes::default(), &mut pending);
                }
                Node::Element(element) => {
                    self.flush(&mut pending, &mut out);
                    self.element(element, &mut out);
                }
            }
        }
        self.flush(&mut pending, &mut out);
        out
    }

    fn flush(&self, pending: &mut RichText, out: &mut Vec<BlockSnapshot>) {
        let text = std::mem::take(pending);
        if !text.plain_text().trim().is_empty() {
            out.push(self.block(Flavour::Paragraph, text_props("text", text), vec![]));
        }
    }

    fn element(&self, element: &Element, out: &mut Vec<BlockSnapshot>) {
        let name = element.name.as_str();
        if SKIPPED.contains(&name) {
            return;
        }

        match name {
            "div" if element.has_class("affine-paragraph-block-container") => {
                out.push(self.paragraph_container(element));
            }
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" => {
                let mut text = RichText::new();
                inline(&element.children, &TextAttributes::default(), &mut text);
                out.push(self.block(Flavour::Paragraph, text_props(paragraph_type(name), text), vec![]));
            }
            "ul" | "ol" => out.extend(self.list(element)),
            "pre" => out.push(self.code(element)),
            "figure" | "img" => out.extend(self.image(element)),
            "hr" => out.push(self.block(Flavour::Divider, Props::new(), vec![])),
            _ => out.extend(self.blocks(&element.children)),
        }
    }

    fn paragraph_container(&self, element: &Element) -> BlockSnapshot {
        let id = self.ids.next_id();
        let (kind, text) = element
            .elements()
            .find(|child| {
                matches!(
                    child.name.as_str(),
                    "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote"
                )
            })
            .map(|child| {
                let mut text = RichText::new();
                inline(&child.children, &TextAttributes::default(), &mut text);
                (paragraph_type(&child.name), text)
            })
            .unwrap_or(("text", RichText::new()));

        let children = element
            .elements()
            .filter(|child| child.has_class("affine-block-children-container"))
            .flat_map(|child| self.blocks(&child.children))
            .collect();

        self.block_with_id(id, Flavour::Paragraph, text_props(kind, text), children)
    }

    fn list(&self, element: &Element) -> Vec<BlockSnapshot> {
        let declared = element
            .class_with_prefix("affine-list-")
            .filter(|kind| LIST_TYPES.contains(kind))
            .map(str::to_string);

        element
            .elements()
            .filter(|child| child.name == "li")
            .map(|item| {
                let id = self.ids.next_id();
                let checkbox = item.elements().find(|child| {
                    child.name == "input" && child.attr("type") == Some("checkbox")
                });
                let kind = match (&declared, element.name.as_str()) {
                    (Some(kind), _) => kind.clone(),
                    (None, "ol") => "numbered".to_string(),
                    (None, _) if checkbox.is_some() => "todo".to_string(),
                    (None, _) => "bulleted".to_string(),
                };

                let mut text = RichText::new();
                let mut children = Vec::new();
                for node in &item.children {
                    match node {
                        Node::Element(child) if child.name == "label" => {
                            inline(&child.children, &TextAttributes::default(), &mut text);
                        }
                        Node::Element(child) if child.name == "p" && text.is_empty() => {
                            inline(&child.children, &TextAttributes::default(), &mut text);
                        }
                        Node::Element(child) if child.name == "input" => {}
                        Node::Element(child) if child.name == "ul" || child.name == "ol" => {
                            children.extend(self.list(child));
                        }
                        Node::Element(child) if child.has_class("affine-block-children-container") => {
                            children.extend(self.blocks(&child.children));
                        }
                        Node::Element(child) if !INLINE.contains(&child.name.as_str()) => {
                            self.element(child, &mut children);
                        }
                        _ => inline(std::slice::from_ref(node), &TextAttributes::default(), &mut text),
                    }
                }

                let mut props = text_props(&kind, text);
                props.insert(
                    "checked".to_string(),
                    checkbox.is_some_and(|input| input.has_attr("checked")).into(),
                );
                self.block_with_id(id, Flavour::List, props, children)
            })
            .collect()
    }

    fn code(&self, element: &Element) -> BlockSnapshot {
        let code = element.find("code");
        let language = [Some(element), code]
            .into_iter()
            .flatten()
            .find_map(|el| {
                el.class_with_prefix("code-")
                    .or_else(|| el.class_with_prefix("language-"))
            })
            .map(PropValue::from)
            .unwrap_or(PropValue::Value(serde_json::Value::Null));

        let mut props = Props::new();
        props.insert("language".to_string(), language);
        props.insert(
            "text".to_string(),
            RichText::from_plain(&element.text_content()).into(),
        );
        self.block(Flavour::Code, props, vec![])
    }

    fn image(&self, element: &Element) -> Option<BlockSnapshot> {
        let img = if element.name == "img" {
            element
        } else {
            element.find("img")?
        };
        let src = img.attr("src").filter(|src| !src.is_empty())?;
        let file = src.rsplit('/').next().unwrap_or(src);
        let source_id = match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file,
        };
        let caption = element
            .find("figcaption")
            .map(|caption| caption.text_content())
            .unwrap_or_default();

        let mut props = Props::new();
        props.insert("sourceId".to_string(), source_id.into());
        props.insert("caption".to_string(), caption.into());
        Some(self.block(Flavour::Image, props, vec![]))
    }
}

fn paragraph_type(tag: &str) -> &str {
    match tag {
        "blockquote" => "quote",
        "p" => "text",
        heading => heading,
    }
}

fn text_props(kind: &str, text: RichText) -> Props {
    let mut props = Props::new();
    props.insert("type".to_string(), kind.into());
    props.insert("text".to_string(), text.into());
    props
}

/// Accumulate inline content, mapping formatting tags onto attributes.
fn inline(nodes: &[Node], attributes: &TextAttributes, out: &mut RichText) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(TextRun {
                insert: text.clone(),
                attributes: Some(attributes.clone()),
            }),
            Node::Comment(_) => {}
            Node::Element(element) => {
                let mut nested = attributes.clone();
                match element.name.as_str() {
                    "br" => {
                        out.push(TextRun::plain("\n"));
                        continue;
                    }
                    "input" | "script" | "style" => continue,
                    "strong" | "b" => nested.bold = true,
                    "em" | "i" => nested.italic = true,
                    "u" => nested.underline = true,
                    "s" | "del" | "strike" => nested.strike = true,
                    "code" => nested.code = true,
                    "a" => {
                        if let Some(href) = element.attr("href") {
                            nested.link = Some(href.to_string());
                        }
                    }
                    _ => {}
                }
                inline(&element.children, &nested, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AutoIncrementIdGenerator;

    fn decode(html: &str) -> Vec<BlockSnapshot> {
        decode_blocks(html, &AutoIncrementIdGenerator::new())
    }

    #[test]
    fn test_page_shape_and_title() {
        let page = decode_page(
            "<html><head><title>Notes</title></head><body><p>hi</p></body></html>",
            &AutoIncrementIdGenerator::new(),
        )
        .unwrap();

        assert_eq!(page.id, "block:0");
        assert_eq!(page.props["title"].as_text().unwrap().plain_text(), "Notes");
        assert_eq!(page.children[0].flavour, "affine:surface");
        assert_eq!(page.children[1].flavour, "affine:note");
        assert_eq!(page.children[1].children[0].id, "block:3");
        assert_eq!(page.children[1].children[0].text().unwrap().plain_text(), "hi");
    }

    #[test]
    fn test_inline_formatting() {
        let blocks = decode("<p>aaa<strong>bbb</strong><a href=\"https://affine.pro/\"><em>c</em></a><br>d</p>");
        let text = blocks[0].text().unwrap();

        assert_eq!(
            text.runs(),
            &[
                TextRun::plain("aaa"),
                TextRun::styled("bbb", TextAttributes::bold()),
                TextRun::styled(
                    "c",
                    TextAttributes {
                        italic: true,
                        link: Some("https://affine.pro/".to_string()),
                        ..Default::default()
                    }
                ),
                TextRun::plain("\nd"),
            ]
        );
    }

    #[test]
    fn test_headings_and_quotes() {
        let blocks = decode("<h3>t</h3><blockquote>q</blockquote>");
        assert_eq!(blocks[0].prop_str("type"), Some("h3"));
        assert_eq!(blocks[1].prop_str("type"), Some("quote"));
    }

    #[test]
    fn test_loose_text_becomes_paragraphs() {
        let blocks = decode("<div>  lead <b>in</b><hr>tail</div>");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].text().unwrap().plain_text(), "  lead in");
        assert_eq!(blocks[1].flavour, "affine:divider");
        assert_eq!(blocks[2].text().unwrap().plain_text(), "tail");
    }

    #[test]
    fn test_plain_lists() {
        let blocks = decode("<ol><li>one<ul><li>nested</li></ul></li><li>two</li></ol>");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].prop_str("type"), Some("numbered"));
        assert_eq!(blocks[0].text().unwrap().plain_text(), "one");
        assert_eq!(blocks[0].children[0].prop_str("type"), Some("bulleted"));
        assert_eq!(blocks[1].props["checked"].as_bool(), Some(false));
    }

    #[test]
    fn test_todo_items() {
        let blocks = decode(
            "<ul><li><input type=\"checkbox\" checked><label>done</label></li><li><input type=\"checkbox\">open</li></ul>",
        );
        assert_eq!(blocks[0].prop_str("type"), Some("todo"));
        assert_eq!(blocks[0].props["checked"].as_bool(), Some(true));
        assert_eq!(blocks[0].text().unwrap().plain_text(), "done");
        assert_eq!(blocks[1].props["checked"].as_bool(), Some(false));
        assert_eq!(blocks[1].text().unwrap().plain_text(), "open");
    }

    #[test]
    fn test_code_language_from_class() {
        let blocks = decode("<pre><code class=\"language-rust\">fn main() {}\n</code></pre><pre>x</pre>");
        assert_eq!(blocks[0].prop_str("language"), Some("rust"));
        assert_eq!(blocks[0].text().unwrap().plain_text(), "fn main() {}\n");
        assert!(blocks[1].props["language"].is_null());
    }

    #[test]
    fn test_images() {
        let blocks = decode(
            "<figure><img src=\"assets/abc=.png\"><figcaption>cap</figcaption></figure><img src=\"\">",
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].prop_str("sourceId"), Some("abc="));
        assert_eq!(blocks[0].prop_str("caption"), Some("cap"));
        assert_eq!(blocks[0].props["width"].as_value(), Some(&serde_json::json!(0)));
    }

    #[test]
    fn test_scripts_and_styles_are_ignored() {
        let blocks = decode("<style>p { color: red }</style><script>alert(1)</script><p>x</p>");
        assert_eq!(blocks.len(), 1);
    }
}
