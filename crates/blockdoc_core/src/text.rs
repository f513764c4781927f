//! Rich text values.
//!
//! A [`RichText`] is an ordered list of [`TextRun`]s ("delta"). Each run is a
//! maximal span of text sharing one attribute set, so two adjacent runs never
//! carry identical attributes. Concatenating every run's `insert` yields the
//! plain text.
//!
//! On the wire a rich text prop is shaped as
//!
//! ```text
//! { "$blocksuite:internal:text$": true, "delta": [{ "insert": "..", "attributes": {..} }] }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Marker key identifying a rich text value inside a snapshot prop bag.
pub const INTERNAL_TEXT_MARKER: &str = "$blocksuite:internal:text$";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accepts `true`, `false` or `null` (a removed format) for a formatting flag.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<bool> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or(false))
}

/// Inline formatting attached to a run.
///
/// Attributes are independent and may co-occur (a run can be bold and a link
/// at the same time). Attributes this crate does not render (colors,
/// references, ...) are carried in `extra` so they survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TextAttributes {
    #[serde(default, skip_serializing_if = "is_false", deserialize_with = "deserialize_flag")]
    pub bold: bool,

    #[serde(default, skip_serializing_if = "is_false", deserialize_with = "deserialize_flag")]
    pub italic: bool,

    #[serde(default, skip_serializing_if = "is_false", deserialize_with = "deserialize_flag")]
    pub underline: bool,

    #[serde(default, skip_serializing_if = "is_false", deserialize_with = "deserialize_flag")]
    pub strike: bool,

    #[serde(default, skip_serializing_if = "is_false", deserialize_with = "deserialize_flag")]
    pub code: bool,

    /// Link target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(flatten)]
    #[ts(skip)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl TextAttributes {
    /// Bold only
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Default::default()
        }
    }

    /// Italic only
    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Default::default()
        }
    }

    /// Inline code only
    pub fn code() -> Self {
        Self {
            code: true,
            ..Default::default()
        }
    }

    /// Link only
    pub fn link(href: impl Into<String>) -> Self {
        Self {
            link: Some(href.into()),
            ..Default::default()
        }
    }

    /// True when no formatting is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A span of text with one attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TextRun {
    pub insert: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<TextAttributes>,
}

impl TextRun {
    /// A run without formatting.
    pub fn plain(insert: impl Into<String>) -> Self {
        Self {
            insert: insert.into(),
            attributes: None,
        }
    }

    /// A run with the given formatting. Empty attributes are stored as `None`.
    pub fn styled(insert: impl Into<String>, attributes: TextAttributes) -> Self {
        Self {
            insert: insert.into(),
            attributes: if attributes.is_empty() {
                None
            } else {
                Some(attributes)
            },
        }
    }

    fn same_format(&self, other: &TextRun) -> bool {
        self.attributes == other.attributes
    }
}

#[derive(Serialize, Deserialize)]
struct RichTextRepr {
    #[serde(rename = "$blocksuite:internal:text$")]
    marker: bool,
    delta: Vec<TextRun>,
}

/// An ordered list of maximal runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RichTextRepr", try_from = "RichTextRepr")]
pub struct RichText {
    delta: Vec<TextRun>,
}

impl From<RichText> for RichTextRepr {
    fn from(text: RichText) -> Self {
        Self {
            marker: true,
            delta: text.delta,
        }
    }
}

impl TryFrom<RichTextRepr> for RichText {
    type Error = String;

    fn try_from(repr: RichTextRepr) -> Result<Self, Self::Error> {
        if !repr.marker {
            return Err(format!("'{}' must be true", INTERNAL_TEXT_MARKER));
        }
        Ok(RichText::from_runs(repr.delta))
    }
}

impl RichText {
    /// Empty text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text made of a single unformatted run.
    pub fn from_plain(text: &str) -> Self {
        Self::from_runs(vec![TextRun::plain(text)])
    }

    /// Build from runs, dropping empty inserts and merging neighbours that
    /// share an attribute set.
    pub fn from_runs(runs: impl IntoIterator<Item = TextRun>) -> Self {
        let mut text = Self::new();
        for run in runs {
            text.push(run);
        }
        text
    }

    /// Append a run, merging it into the last one when formats match.
    pub fn push(&mut self, run: TextRun) {
        if run.insert.is_empty() {
            return;
        }
        let run = match run.attributes {
            Some(mut attrs) => {
                // A null value removes the format.
                attrs.extra.retain(|_, value| !value.is_null());
                TextRun::styled(run.insert, attrs)
            }
            None => run,
        };
        match self.delta.last_mut() {
            Some(last) if last.same_format(&run) => last.insert.push_str(&run.insert),
            _ => self.delta.push(run),
        }
    }

    /// The runs in order.
    pub fn runs(&self) -> &[TextRun] {
        &self.delta
    }

    /// Concatenation of every run's text.
    pub fn plain_text(&self) -> String {
        self.delta.iter().map(|run| run.insert.as_str()).collect()
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.delta.iter().map(|run| run.insert.chars().count()).sum()
    }

    /// True when there is no text.
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }

    /// The sub-text between character offsets `start` (inclusive) and `end`
    /// (exclusive). Missing bounds mean the start or end of the text; bounds
    /// past the end are clamped.
    pub fn slice(&self, start: Option<usize>, end: Option<usize>) -> RichText {
        let total = self.len();
        let start = start.unwrap_or(0).min(total);
        let end = end.unwrap_or(total).clamp(start, total);

        let mut out = RichText::new();
        let mut offset = 0;
        for run in &self.delta {
            let run_len = run.insert.chars().count();
            let run_start = offset;
            let run_end = offset + run_len;
            offset = run_end;

            if run_end <= start || run_start >= end {
                continue;
            }
            let from = start.saturating_sub(run_start);
            let to = (end - run_start).min(run_len);
            let insert: String = run.insert.chars().skip(from).take(to - from).collect();
            out.push(TextRun {
                insert,
                attributes: run.attributes.clone(),
            });
        }
        out
    }

    /// Flatten into one entry per character, for diffing.
    pub(crate) fn chars_with_attributes(&self) -> Vec<(char, Option<TextAttributes>)> {
        self.delta
            .iter()
            .flat_map(|run| run.insert.chars().map(|c| (c, run.attributes.clone())))
            .collect()
    }
}

impl From<&str> for RichText {
    fn from(text: &str) -> Self {
        RichText::from_plain(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_runs_with_different_formats_stay_separate() {
        let text = RichText::from_runs(vec![
            TextRun::styled("aaa", TextAttributes::bold()),
            TextRun::plain("bbb"),
        ]);

        assert_eq!(text.runs().len(), 2);
        assert_eq!(text.plain_text(), "aaabbb");
    }

    #[test]
    fn test_equal_formats_merge() {
        let text = RichText::from_runs(vec![
            TextRun::plain("aaa"),
            TextRun::styled("bbb", TextAttributes::default()),
            TextRun::plain(""),
            TextRun::plain("ccc"),
        ]);

        assert_eq!(text.runs(), &[TextRun::plain("aaabbbccc")]);
    }

    #[test]
    fn test_slice_keeps_formatting() {
        let text = RichText::from_runs(vec![
            TextRun::plain("hello "),
            TextRun::styled("world", TextAttributes::italic()),
        ]);

        let suffix = text.slice(Some(4), None);
        assert_eq!(
            suffix.runs(),
            &[
                TextRun::plain("o "),
                TextRun::styled("world", TextAttributes::italic())
            ]
        );

        let prefix = text.slice(None, Some(2));
        assert_eq!(prefix.plain_text(), "he");

        let middle = text.slice(Some(5), Some(8));
        assert_eq!(middle.plain_text(), " wo");
        assert_eq!(middle.runs().len(), 2);
    }

    #[test]
    fn test_slice_out_of_range_is_clamped() {
        let text = RichText::from_plain("abc");
        assert_eq!(text.slice(Some(10), None).plain_text(), "");
        assert_eq!(text.slice(Some(2), Some(1)).plain_text(), "");
        assert_eq!(text.slice(None, Some(99)).plain_text(), "abc");
    }

    #[test]
    fn test_slice_counts_characters_not_bytes() {
        let text = RichText::from_plain("héllo");
        assert_eq!(text.len(), 5);
        assert_eq!(text.slice(Some(1), Some(3)).plain_text(), "él");
    }

    #[test]
    fn test_wire_shape() {
        let text = RichText::from_runs(vec![
            TextRun::plain("aaa "),
            TextRun::styled("bbb", TextAttributes::link("https://affine.pro/")),
        ]);
        let json = serde_json::to_value(&text).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "$blocksuite:internal:text$": true,
                "delta": [
                    { "insert": "aaa " },
                    { "insert": "bbb", "attributes": { "link": "https://affine.pro/" } }
                ]
            })
        );

        let back: RichText = serde_json::from_value(json).unwrap();
        assert_eq!(back, text);
    }

    #[test]
    fn test_null_attributes_are_unset() {
        let json = serde_json::json!({
            "$blocksuite:internal:text$": true,
            "delta": [{ "insert": "x", "attributes": { "bold": null } }]
        });
        let text: RichText = serde_json::from_value(json).unwrap();
        assert_eq!(text.runs(), &[TextRun::plain("x")]);
    }

    #[test]
    fn test_marker_must_be_true() {
        let json = serde_json::json!({ "$blocksuite:internal:text$": false, "delta": [] });
        assert!(serde_json::from_value::<RichText>(json).is_err());
    }
}
