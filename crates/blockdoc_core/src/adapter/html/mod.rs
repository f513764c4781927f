//! HTML adapter.
//!
//! # Export
//!
//! Page, note and surface blocks emit no markup. Text blocks emit their own
//! fragment followed by a children container, which is present even when the
//! block has no children:
//!
//! ```html
//! <div class="affine-paragraph-block-container">
//!   <p>aaa</p>
//!   <div class="affine-block-children-container" style="padding-left: 26px;"></div>
//! </div>
//! ```
//!
//! Consecutive sibling list items of the same list type share one list
//! element. Code blocks get one styled span per token. Images are emitted
//! only when their blob resolves.
//!
//! # Import
//!
//! [`HtmlAdapter::to_snapshot`] reads both our own markup and ordinary HTML
//! (paragraphs, headings, quotes, lists, `pre`, images, rules) into a page
//! snapshot: page → surface + note → blocks.

mod decode;
mod dom;

use std::collections::HashMap;
use std::sync::Arc;

use super::assets::{AssetsManager, BoxFuture};
use super::highlight;
use super::{Adapter, AdapterOutput};
use crate::config::{BODY_MARKER, CodecConfig};
use crate::error::{BlockDocError, Result};
use crate::schema::Flavour;
use crate::snapshot::{self, BlockSnapshot};
use crate::store::{BlockStore, IdGenerator, UuidIdGenerator};
use crate::text::{RichText, TextAttributes};

/// Asset paths resolved ahead of rendering, keyed by blob id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    paths: HashMap<String, String>,
}

impl ResolvedAssets {
    /// No assets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved path.
    pub fn insert(&mut self, id: impl Into<String>, path: impl Into<String>) {
        self.paths.insert(id.into(), path.into());
    }

    /// The path of a blob, if it resolved.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(String::as_str)
    }
}

/// Snapshot ↔ HTML.
#[derive(Clone)]
pub struct HtmlAdapter {
    config: CodecConfig,
    assets: Option<AssetsManager>,
    ids: Arc<dyn IdGenerator>,
}

impl HtmlAdapter {
    /// Create an adapter without an asset resolver. Images are omitted.
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            assets: None,
            ids: Arc::new(UuidIdGenerator),
        }
    }

    /// Resolve image blobs through `assets`.
    pub fn with_assets(mut self, assets: AssetsManager) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Id source for imported blocks.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The codec settings.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Render a full page document.
    pub async fn from_snapshot(&self, snapshot: &BlockSnapshot) -> Result<AdapterOutput> {
        let body = self.render_body(snapshot).await?;
        Ok(AdapterOutput {
            file: self.config.page_template().replacen(BODY_MARKER, &body, 1),
        })
    }

    /// Encode a live subtree of a store and render it.
    pub async fn from_store(&self, store: &BlockStore, id: &str) -> Result<AdapterOutput> {
        let snapshot = snapshot::encode(store, id)?;
        self.from_snapshot(&snapshot).await
    }

    /// Render the body markup only, without the page template.
    pub async fn render_body(&self, snapshot: &BlockSnapshot) -> Result<String> {
        let assets = self.resolve_assets(std::slice::from_ref(snapshot)).await;
        Ok(self.render_blocks(std::slice::from_ref(snapshot), &assets))
    }

    /// Resolve every image blob in the given trees concurrently.
    ///
    /// Failures are logged and left out; the matching images are not rendered.
    pub async fn resolve_assets(&self, roots: &[BlockSnapshot]) -> ResolvedAssets {
        let mut resolved = ResolvedAssets::new();
        let Some(assets) = &self.assets else {
            return resolved;
        };

        let ids = roots
            .iter()
            .flat_map(BlockSnapshot::iter)
            .filter(|node| node.flavour == Flavour::Image.as_str())
            .filter_map(|node| node.prop_str("sourceId"));
        for (id, result) in assets.prefetch(ids).await {
            match result {
                Ok(path) => resolved.insert(id, path),
                Err(e) => log::warn!("Skipping image: {}", e),
            }
        }
        resolved
    }

    /// Render sibling blocks, grouping list runs.
    pub fn render_blocks(&self, nodes: &[BlockSnapshot], assets: &ResolvedAssets) -> String {
        let mut out = String::new();
        self.write_blocks(nodes, assets, &mut out);
        out
    }

    /// Render one block around children markup that was produced elsewhere.
    ///
    /// The node's own `children` are ignored. A list item is wrapped in its
    /// own list element; [`HtmlAdapter::join_fragments`] merges those again.
    pub fn render_fragment(
        &self,
        node: &BlockSnapshot,
        children_markup: &str,
        assets: &ResolvedAssets,
    ) -> String {
        let mut out = String::new();
        self.write_block(node, Children::Markup(children_markup), assets, &mut out);
        out
    }

    /// Concatenate sibling fragments, merging consecutive list items of one
    /// type into a single list element as [`HtmlAdapter::render_blocks`] does.
    ///
    /// A list fragment not shaped like [`HtmlAdapter::render_fragment`]
    /// output is kept as is and ends the current run.
    pub fn join_fragments<'a, I>(&self, fragments: I) -> String
    where
        I: IntoIterator<Item = (&'a BlockSnapshot, &'a str)>,
    {
        let mut out = String::new();
        let mut open: Option<&str> = None;
        for (node, fragment) in fragments {
            let item = list_type(node).and_then(|kind| {
                let mut head = String::new();
                self.open_list(kind, &mut head);
                let mut tail = String::new();
                close_list(kind, &mut tail);
                fragment
                    .strip_prefix(head.as_str())
                    .and_then(|rest| rest.strip_suffix(tail.as_str()))
                    .map(|inner| (kind, inner))
            });
            match item {
                Some((kind, inner)) => {
                    if open != Some(kind) {
                        if let Some(previous) = open {
                            close_list(previous, &mut out);
                        }
                        self.open_list(kind, &mut out);
                        open = Some(kind);
                    }
                    out.push_str(inner);
                }
                None => {
                    if let Some(previous) = open.take() {
                        close_list(previous, &mut out);
                    }
                    out.push_str(fragment);
                }
            }
        }
        if let Some(previous) = open {
            close_list(previous, &mut out);
        }
        out
    }

    fn write_blocks(&self, nodes: &[BlockSnapshot], assets: &ResolvedAssets, out: &mut String) {
        let mut i = 0;
        while i < nodes.len() {
            if let Some(kind) = list_type(&nodes[i]) {
                let run = nodes[i..]
                    .iter()
                    .take_while(|node| list_type(node) == Some(kind))
                    .count();
                self.open_list(kind, out);
                for item in &nodes[i..i + run] {
                    self.write_list_item(item, kind, Children::Blocks(&item.children), assets, out);
                }
                close_list(kind, out);
                i += run;
            } else {
                let node = &nodes[i];
                self.write_block(node, Children::Blocks(&node.children), assets, out);
                i += 1;
            }
        }
    }

    fn write_block(
        &self,
        node: &BlockSnapshot,
        children: Children<'_>,
        assets: &ResolvedAssets,
        out: &mut String,
    ) {
        let empty = RichText::new();
        let text = node.text().unwrap_or(&empty);

        match Flavour::parse(&node.flavour) {
            Some(Flavour::Page | Flavour::Surface | Flavour::Note) => {
                self.write_children_inline(children, assets, out);
            }
            Some(Flavour::Paragraph) => {
                let tag = match node.prop_str("type").unwrap_or("text") {
                    heading @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => heading,
                    "quote" => "blockquote",
                    _ => "p",
                };
                out.push_str("<div class=\"affine-paragraph-block-container\">");
                out.push_str(&format!("<{}>{}</{}>", tag, render_rich_text(text), tag));
                self.write_children(children, assets, out);
                out.push_str("</div>");
            }
            Some(Flavour::List) => {
                let kind = list_type(node).unwrap_or("bulleted");
                self.open_list(kind, out);
                self.write_list_item(node, kind, children, assets, out);
                close_list(kind, out);
            }
            Some(Flavour::Code) => {
                write_code(node.prop_str("language"), &text.plain_text(), out);
                self.write_children_inline(children, assets, out);
            }
            Some(Flavour::Image) => {
                let source = node.prop_str("sourceId").unwrap_or_default();
                match assets.get(source) {
                    Some(path) => {
                        let file = path.rsplit('/').next().unwrap_or(path);
                        out.push_str(&format!(
                            "<figure class=\"affine-image-block-container\"><img src=\"{}\" alt=\"{}\">",
                            escape_html(path),
                            escape_html(file)
                        ));
                        match node.prop_str("caption") {
                            Some(caption) if !caption.is_empty() => out.push_str(&format!(
                                "<figcaption>{}</figcaption>",
                                escape_html(caption)
                            )),
                            _ => {}
                        }
                        out.push_str("</figure>");
                    }
                    None => log::warn!("Image {} has no resolved asset, omitting", node.id),
                }
                self.write_children_inline(children, assets, out);
            }
            Some(Flavour::Divider) => {
                out.push_str("<hr>");
                self.write_children_inline(children, assets, out);
            }
            None => {
                log::warn!(
                    "{}, rendering children only",
                    BlockDocError::UnsupportedFlavour(node.flavour.clone())
                );
                self.write_children_inline(children, assets, out);
            }
        }
    }

    fn open_list(&self, kind: &str, out: &mut String) {
        out.push_str(&format!(
            "<div class=\"affine-list-block-container\"><{} class=\"affine-list-{}\">",
            list_tag(kind),
            kind
        ));
    }

    fn write_list_item(
        &self,
        item: &BlockSnapshot,
        kind: &str,
        children: Children<'_>,
        assets: &ResolvedAssets,
        out: &mut String,
    ) {
        let empty = RichText::new();
        let text = render_rich_text(item.text().unwrap_or(&empty));
        out.push_str("<li>");
        if kind == "todo" {
            let checked = item
                .props
                .get("checked")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let id = escape_html(&item.id);
            out.push_str(&format!(
                "<input type=\"checkbox\" id=\"{}\"{}><label for=\"{}\">{}</label>",
                id,
                if checked { " checked" } else { "" },
                id,
                text
            ));
        } else {
            out.push_str(&text);
        }
        self.write_children(children, assets, out);
        out.push_str("</li>");
    }

    /// Children inside the indentation container.
    fn write_children(&self, children: Children<'_>, assets: &ResolvedAssets, out: &mut String) {
        out.push_str(&format!(
            "<div class=\"affine-block-children-container\" style=\"padding-left: {}px;\">",
            self.config.children_indent_px
        ));
        self.write_children_inline(children, assets, out);
        out.push_str("</div>");
    }

    /// Children without a container.
    fn write_children_inline(&self, children: Children<'_>, assets: &ResolvedAssets, out: &mut String) {
        match children {
            Children::Blocks(nodes) => self.write_blocks(nodes, assets, out),
            Children::Markup(markup) => out.push_str(markup),
        }
    }

    /// Parse HTML into a page snapshot.
    pub fn to_snapshot(&self, html: &str) -> Result<BlockSnapshot> {
        decode::decode_page(html, self.ids.as_ref())
    }

    /// Parse an HTML fragment into top-level blocks, without the page wrapper.
    pub fn to_blocks(&self, html: &str) -> Vec<BlockSnapshot> {
        decode::decode_blocks(html, self.ids.as_ref())
    }
}

impl Adapter for HtmlAdapter {
    fn mime(&self) -> &str {
        "text/html"
    }

    fn from_snapshot<'a>(&'a self, snapshot: &'a BlockSnapshot) -> BoxFuture<'a, Result<AdapterOutput>> {
        Box::pin(HtmlAdapter::from_snapshot(self, snapshot))
    }

    fn to_snapshot(&self, input: &str) -> Result<BlockSnapshot> {
        HtmlAdapter::to_snapshot(self, input)
    }
}

impl std::fmt::Debug for HtmlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlAdapter")
            .field("config", &self.config)
            .field("assets", &self.assets)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Children<'a> {
    Blocks(&'a [BlockSnapshot]),
    Markup(&'a str),
}

fn list_tag(kind: &str) -> &'static str {
    if kind == "numbered" { "ol" } else { "ul" }
}

fn close_list(kind: &str, out: &mut String) {
    out.push_str(&format!("</{}></div>", list_tag(kind)));
}

/// The list type of a list block, `None` for other flavours.
fn list_type(node: &BlockSnapshot) -> Option<&str> {
    (node.flavour == Flavour::List.as_str()).then(|| node.prop_str("type").unwrap_or("bulleted"))
}

fn write_code(language: Option<&str>, code: &str, out: &mut String) {
    const SPAN: &str = "<span style=\"word-wrap: break-word;";
    match language.filter(|l| !l.is_empty()) {
        Some(language) => {
            out.push_str(&format!(
                "<pre><code class=\"code-{}\">",
                escape_html(language)
            ));
            let tokens = highlight::highlight(language, code).unwrap_or_else(|| {
                log::debug!("No token classifier for '{}'", language);
                vec![highlight::Token {
                    text: code.to_string(),
                    color: highlight::DEFAULT,
                }]
            });
            for token in tokens.into_iter().filter(|t| !t.text.is_empty()) {
                out.push_str(&format!(
                    "{} color: {};\">{}</span>",
                    SPAN,
                    token.color,
                    escape_html(&token.text)
                ));
            }
        }
        None => {
            out.push_str("<pre><code>");
            if !code.is_empty() {
                out.push_str(&format!("{}\">{}</span>", SPAN, escape_html(code)));
            }
        }
    }
    out.push_str("</code></pre>");
}

/// Escape text for use in element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render runs as inline markup.
///
/// Tags nest in a fixed order, innermost first: `code`, `a`, `strong`, `em`,
/// `u`, `del`. Equal attribute sets therefore always produce equal markup.
pub fn render_rich_text(text: &RichText) -> String {
    let mut out = String::new();
    for run in text.runs() {
        let mut html = escape_html(&run.insert);
        if let Some(attributes) = &run.attributes {
            html = wrap_inline(html, attributes);
        }
        out.push_str(&html);
    }
    out
}

fn wrap_inline(mut html: String, attributes: &TextAttributes) -> String {
    if attributes.code {
        html = format!("<code>{}</code>", html);
    }
    if let Some(href) = &attributes.link {
        html = format!("<a href=\"{}\">{}</a>", escape_html(href), html);
    }
    for (set, tag) in [
        (attributes.bold, "strong"),
        (attributes.italic, "em"),
        (attributes.underline, "u"),
        (attributes.strike, "del"),
    ] {
        if set {
            html = format!("<{}>{}</{}>", tag, html, tag);
        }
    }
    html
}
