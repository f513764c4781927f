//! Codec configuration.
//!
//! [`CodecConfig`] holds the knobs of the format adapters and the clipboard
//! pipeline. It is persisted as TOML; every field has a default, so an empty
//! file is a valid config.
//!
//! # Example
//!
//! ```ignore
//! use blockdoc_core::config::CodecConfig;
//!
//! let config = CodecConfig::from_toml_str("children_indent_px = 32")?;
//! assert_eq!(config.asset_dir, "assets");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Marker replaced by the rendered body inside a page template.
pub const BODY_MARKER: &str = "<!--HtmlTemplate-->";

/// Settings shared by the adapters and the clipboard pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Left padding of a block's children container, in pixels
    pub children_indent_px: u32,

    /// Directory prefix of resolved asset paths
    pub asset_dir: String,

    /// Extension used when a blob's type cannot be detected
    pub default_asset_extension: String,

    /// Private MIME key of the structured clipboard payload
    pub clipboard_mime: String,

    /// Placeholder left in the page template where the title goes
    pub title_placeholder: String,

    /// Surrounding HTML document. Must contain [`BODY_MARKER`].
    /// When unset the built-in template is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_template: Option<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            children_indent_px: 26,
            asset_dir: "assets".to_string(),
            default_asset_extension: "blob".to_string(),
            clipboard_mime: "blocksuite/page".to_string(),
            title_placeholder: "<!--PageTitlePlaceholder-->".to_string(),
            page_template: None,
        }
    }
}

impl CodecConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load config from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Save config to a TOML file, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// The page template with the title placeholder in place.
    pub fn page_template(&self) -> String {
        match &self.page_template {
            Some(template) => template.clone(),
            None => format!(
                "<!doctype html><html><head><style>{}</style></head><body>\
                 <div style=\"width: 70vw; margin: 60px auto;\">{}{}</div></body></html>",
                CHECKBOX_STYLE, self.title_placeholder, BODY_MARKER
            ),
        }
    }
}

/// Checkbox styling for todo list items.
const CHECKBOX_STYLE: &str = "input[type='checkbox'] {display: none;}\
label:before {background: rgb(30, 150, 235);border-radius: 3px;height: 16px;width: 16px;\
display: inline-block;cursor: pointer;}\
input[type='checkbox'] + label:before {content: '';background: rgb(30, 150, 235);\
color: #fff;font-size: 16px;line-height: 16px;text-align: center;}\
input[type='checkbox']:checked + label:before {content: '✓';}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(CodecConfig::from_toml_str("").unwrap(), CodecConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = CodecConfig::from_toml_str(
            "children_indent_px = 32\nclipboard_mime = \"x-app/blocks\"\n",
        )
        .unwrap();
        assert_eq!(config.children_indent_px, 32);
        assert_eq!(config.clipboard_mime, "x-app/blocks");
        assert_eq!(config.asset_dir, "assets");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = CodecConfig::from_toml_str("children_indent_px = \"wide\"").unwrap_err();
        assert!(matches!(err, crate::error::BlockDocError::ConfigParse(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codec.toml");
        let config = CodecConfig {
            page_template: Some(format!("<main>{}</main>", BODY_MARKER)),
            ..CodecConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(CodecConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_builtin_template_shape() {
        let template = CodecConfig::default().page_template();
        assert!(template.starts_with("<!doctype html><html><head><style>"));
        assert!(template.ends_with(
            "<div style=\"width: 70vw; margin: 60px auto;\"><!--PageTitlePlaceholder--><!--HtmlTemplate--></div></body></html>"
        ));
    }
}
