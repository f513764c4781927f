//! Per-flavour block services used by the clipboard pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::{HtmlAdapter, ResolvedAssets};
use crate::error::{BlockDocError, Result};
use crate::schema::Flavour;
use crate::snapshot::BlockSnapshot;

/// Character range of a block's own text to include.
///
/// `None` bounds mean the start or end of the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextRange {
    /// First character, inclusive
    pub begin: Option<usize>,
    /// Last character, exclusive
    pub end: Option<usize>,
}

impl TextRange {
    /// The whole text.
    pub const FULL: TextRange = TextRange {
        begin: None,
        end: None,
    };

    /// True when neither bound is set.
    pub fn is_full(&self) -> bool {
        self.begin.is_none() && self.end.is_none()
    }
}

/// Clipboard converters for one flavour.
///
/// Each converter receives the block itself (its `children` are not
/// consulted) along with the already converted output of its selected
/// children.
pub trait BlockService: Send + Sync {
    /// The flavour this service handles.
    fn flavour(&self) -> &str;

    /// HTML for the block, wrapping `children_html`.
    fn to_html_fragment(
        &self,
        node: &BlockSnapshot,
        range: TextRange,
        children_html: &str,
        html: &HtmlAdapter,
        assets: &ResolvedAssets,
    ) -> Result<String>;

    /// Plain text for the block followed by `children_text`.
    fn to_plain_text(&self, node: &BlockSnapshot, range: TextRange, children_text: &[String]) -> Result<String>;

    /// Snapshot of the block carrying `children`.
    fn to_structured(
        &self,
        node: &BlockSnapshot,
        range: TextRange,
        children: Vec<BlockSnapshot>,
    ) -> Result<BlockSnapshot>;
}

/// Converters for the built-in flavours.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinService {
    flavour: Flavour,
}

impl BuiltinService {
    /// Service for one built-in flavour.
    pub fn new(flavour: Flavour) -> Self {
        Self { flavour }
    }

    /// A copy of `node` with its text cut to `range` and the given children.
    fn sliced(&self, node: &BlockSnapshot, range: TextRange, children: Vec<BlockSnapshot>) -> BlockSnapshot {
        let mut props = node.props.clone();
        if !range.is_full()
            && let Some(text) = node.text()
        {
            props.insert("text".to_string(), text.slice(range.begin, range.end).into());
        }
        BlockSnapshot::new(node.id.clone(), node.flavour.clone(), props, children)
    }
}

impl BlockService for BuiltinService {
    fn flavour(&self) -> &str {
        self.flavour.as_str()
    }

    fn to_html_fragment(
        &self,
        node: &BlockSnapshot,
        range: TextRange,
        children_html: &str,
        html: &HtmlAdapter,
        assets: &ResolvedAssets,
    ) -> Result<String> {
        let node = self.sliced(node, range, Vec::new());
        Ok(html.render_fragment(&node, children_html, assets))
    }

    fn to_plain_text(&self, node: &BlockSnapshot, range: TextRange, children_text: &[String]) -> Result<String> {
        let own = match self.flavour {
            Flavour::Paragraph | Flavour::List | Flavour::Code => node
                .text()
                .map(|text| text.slice(range.begin, range.end).plain_text()),
            Flavour::Image => node
                .prop_str("caption")
                .filter(|caption| !caption.is_empty())
                .map(str::to_string),
            Flavour::Divider => Some("---".to_string()),
            Flavour::Page | Flavour::Surface | Flavour::Note => None,
        };
        Ok(own
            .into_iter()
            .chain(children_text.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn to_structured(
        &self,
        node: &BlockSnapshot,
        range: TextRange,
        children: Vec<BlockSnapshot>,
    ) -> Result<BlockSnapshot> {
        Ok(self.sliced(node, range, children))
    }
}

/// Flavour → service map, built once and shared read-only.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn BlockService>>,
}

impl ServiceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry serving every built-in flavour.
    pub fn with_builtin_services() -> Self {
        let mut registry = Self::new();
        for flavour in Flavour::ALL {
            registry.register(Arc::new(BuiltinService::new(flavour)));
        }
        registry
    }

    /// Add or replace the service for its flavour.
    pub fn register(&mut self, service: Arc<dyn BlockService>) -> &mut Self {
        self.services.insert(service.flavour().to_string(), service);
        self
    }

    /// The service for a flavour.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::UnsupportedFlavour`] if none is registered.
    pub fn get(&self, flavour: &str) -> Result<&dyn BlockService> {
        self.services
            .get(flavour)
            .map(|service| service.as_ref())
            .ok_or_else(|| BlockDocError::UnsupportedFlavour(flavour.to_string()))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flavours: Vec<&str> = self.services.keys().map(String::as_str).collect();
        flavours.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("flavours", &flavours)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::props::{PropValue, props_from};
    use crate::text::{RichText, TextAttributes, TextRun};

    fn paragraph(text: RichText) -> BlockSnapshot {
        BlockSnapshot::new(
            "p",
            "affine:paragraph",
            props_from([("type", PropValue::from("text")), ("text", text.into())]),
            vec![],
        )
    }

    #[test]
    fn test_unregistered_flavour() {
        let registry = ServiceRegistry::new();
        assert!(matches!(
            registry.get("affine:paragraph"),
            Err(BlockDocError::UnsupportedFlavour(_))
        ));
        assert!(ServiceRegistry::with_builtin_services().get("affine:code").is_ok());
    }

    #[test]
    fn test_html_fragment_slices_text() {
        let service = BuiltinService::new(Flavour::Paragraph);
        let text = RichText::from_runs(vec![
            TextRun::plain("hello "),
            TextRun::styled("world", TextAttributes::bold()),
        ]);
        let html = service
            .to_html_fragment(
                &paragraph(text),
                TextRange {
                    begin: Some(4),
                    end: Some(8),
                },
                "",
                &HtmlAdapter::new(CodecConfig::default()),
                &ResolvedAssets::new(),
            )
            .unwrap();
        assert!(html.contains("<p>o <strong>wo</strong></p>"));
    }

    #[test]
    fn test_plain_text_joins_children() {
        let service = BuiltinService::new(Flavour::Paragraph);
        let text = service
            .to_plain_text(
                &paragraph(RichText::from_plain("parent")),
                TextRange::FULL,
                &["a".to_string(), "b".to_string()],
            )
            .unwrap();
        assert_eq!(text, "parent\na\nb");
    }

    #[test]
    fn test_structured_keeps_props_and_children() {
        let service = BuiltinService::new(Flavour::Paragraph);
        let child = paragraph(RichText::from_plain("c"));
        let node = service
            .to_structured(
                &paragraph(RichText::from_plain("abcdef")),
                TextRange {
                    begin: None,
                    end: Some(3),
                },
                vec![child.clone()],
            )
            .unwrap();
        assert_eq!(node.text().unwrap().plain_text(), "abc");
        assert_eq!(node.prop_str("type"), Some("text"));
        assert_eq!(node.children, vec![child]);
    }
}
