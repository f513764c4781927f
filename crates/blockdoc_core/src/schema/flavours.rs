//! Built-in flavours.
//!
//! Default props mirror what a freshly created block of each kind carries in
//! a page snapshot.

use serde_json::{Value, json};

use super::{BlockRole, BlockSchema};
use crate::props::{PropValue, Props, props_from};
use crate::text::RichText;

/// The closed set of built-in flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavour {
    Page,
    Surface,
    Note,
    Paragraph,
    List,
    Code,
    Image,
    Divider,
}

/// Paragraph `type` values.
pub(crate) const PARAGRAPH_TYPES: [&str; 8] = ["text", "quote", "h1", "h2", "h3", "h4", "h5", "h6"];

/// List `type` values.
pub(crate) const LIST_TYPES: [&str; 4] = ["bulleted", "numbered", "todo", "toggle"];

impl Flavour {
    /// Every built-in flavour.
    pub const ALL: [Flavour; 8] = [
        Flavour::Page,
        Flavour::Surface,
        Flavour::Note,
        Flavour::Paragraph,
        Flavour::List,
        Flavour::Code,
        Flavour::Image,
        Flavour::Divider,
    ];

    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavour::Page => "affine:page",
            Flavour::Surface => "affine:surface",
            Flavour::Note => "affine:note",
            Flavour::Paragraph => "affine:paragraph",
            Flavour::List => "affine:list",
            Flavour::Code => "affine:code",
            Flavour::Image => "affine:image",
            Flavour::Divider => "affine:divider",
        }
    }

    /// Parse a wire tag. Returns `None` for flavours outside the built-in set.
    pub fn parse(flavour: &str) -> Option<Flavour> {
        Flavour::ALL.into_iter().find(|f| f.as_str() == flavour)
    }

    /// Structural role.
    pub fn role(&self) -> BlockRole {
        match self {
            Flavour::Page => BlockRole::Root,
            Flavour::Surface | Flavour::Note => BlockRole::Hub,
            _ => BlockRole::Content,
        }
    }

    /// Whether blocks of this flavour hold a `text` prop.
    pub fn has_text(&self) -> bool {
        matches!(self, Flavour::Paragraph | Flavour::List | Flavour::Code)
    }

    /// Fresh default props.
    pub fn defaults(&self) -> Props {
        match self {
            Flavour::Page => props_from([("title", RichText::new())]),
            Flavour::Surface => props_from([("elements", json!({}))]),
            Flavour::Note => props_from([
                ("xywh", PropValue::from("[0,0,800,95]")),
                (
                    "background",
                    PropValue::from("--affine-background-secondary-color"),
                ),
                ("index", PropValue::from("a0")),
                ("hidden", PropValue::from(false)),
            ]),
            Flavour::Paragraph => props_from([
                ("type", PropValue::from("text")),
                ("text", PropValue::from(RichText::new())),
            ]),
            Flavour::List => props_from([
                ("type", PropValue::from("bulleted")),
                ("text", PropValue::from(RichText::new())),
                ("checked", PropValue::from(false)),
                ("collapsed", PropValue::from(false)),
            ]),
            Flavour::Code => props_from([
                ("language", PropValue::Value(Value::Null)),
                ("text", PropValue::from(RichText::new())),
            ]),
            Flavour::Image => props_from([
                ("sourceId", PropValue::from("")),
                ("caption", PropValue::from("")),
                ("width", PropValue::from(0i64)),
                ("height", PropValue::from(0i64)),
                ("index", PropValue::from("a0")),
                ("xywh", PropValue::from("[0,0,0,0]")),
                ("rotate", PropValue::from(0i64)),
            ]),
            Flavour::Divider => Props::new(),
        }
    }

    /// Validate a complete bag of props for this flavour.
    pub fn validate(&self, props: &Props) -> Result<(), String> {
        match self {
            Flavour::Page => expect_text(props, "title"),
            Flavour::Surface => expect_object(props, "elements"),
            Flavour::Note => {
                expect_string(props, "xywh")?;
                expect_string(props, "background")?;
                expect_bool(props, "hidden")
            }
            Flavour::Paragraph => {
                expect_one_of(props, "type", &PARAGRAPH_TYPES)?;
                expect_text(props, "text")
            }
            Flavour::List => {
                expect_one_of(props, "type", &LIST_TYPES)?;
                expect_text(props, "text")?;
                expect_bool(props, "checked")?;
                expect_bool(props, "collapsed")
            }
            Flavour::Code => {
                match props.get("language") {
                    None => {}
                    Some(value) if value.is_null() || value.as_str().is_some() => {}
                    Some(_) => return Err("'language' must be a string or null".to_string()),
                }
                expect_text(props, "text")
            }
            Flavour::Image => {
                expect_string(props, "sourceId")?;
                expect_string(props, "caption")?;
                for key in ["width", "height", "rotate"] {
                    expect_number(props, key)?;
                }
                Ok(())
            }
            Flavour::Divider => Ok(()),
        }
    }

    /// Schema entry for the registry.
    pub fn schema(self) -> BlockSchema {
        BlockSchema::new(
            self.as_str(),
            self.role(),
            move || self.defaults(),
            move |props| self.validate(props),
        )
    }
}

fn expect_text(props: &Props, key: &str) -> Result<(), String> {
    match props.get(key) {
        None | Some(PropValue::Text(_)) => Ok(()),
        Some(_) => Err(format!("'{}' must be rich text", key)),
    }
}

fn expect_string(props: &Props, key: &str) -> Result<(), String> {
    match props.get(key) {
        None => Ok(()),
        Some(value) if value.as_str().is_some() => Ok(()),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

fn expect_bool(props: &Props, key: &str) -> Result<(), String> {
    match props.get(key) {
        None => Ok(()),
        Some(value) if value.as_bool().is_some() => Ok(()),
        Some(_) => Err(format!("'{}' must be a boolean", key)),
    }
}

fn expect_number(props: &Props, key: &str) -> Result<(), String> {
    match props.get(key) {
        None | Some(PropValue::Value(Value::Number(_))) => Ok(()),
        Some(_) => Err(format!("'{}' must be a number", key)),
    }
}

fn expect_object(props: &Props, key: &str) -> Result<(), String> {
    match props.get(key) {
        None | Some(PropValue::Value(Value::Object(_))) => Ok(()),
        Some(_) => Err(format!("'{}' must be an object", key)),
    }
}

fn expect_one_of(props: &Props, key: &str, allowed: &[&str]) -> Result<(), String> {
    match props.get(key) {
        None => Ok(()),
        Some(value) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            _ => Err(format!("'{}' must be one of {}", key, allowed.join(", "))),
        },
    }
}
