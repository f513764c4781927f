//! Property bags.
//!
//! Every block carries a [`Props`] map from property name to [`PropValue`].
//! A value is either a rich text ([`RichText`]) or any other JSON value.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::text::{INTERNAL_TEXT_MARKER, RichText};

/// Ordered property bag. Equality ignores insertion order.
pub type Props = IndexMap<String, PropValue>;

/// Keys owned by the store. They are never settable through props.
pub const SYS_KEYS: [&str; 3] = ["id", "flavour", "children"];

/// Whether a prop key is reserved for the store.
pub fn is_reserved_key(key: &str) -> bool {
    SYS_KEYS.contains(&key) || key.starts_with("sys:")
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Replicated rich text
    Text(RichText),
    /// Any other value (primitive or nested structure)
    Value(Value),
}

impl PropValue {
    /// The rich text, if this is a text value.
    pub fn as_text(&self) -> Option<&RichText> {
        match self {
            PropValue::Text(text) => Some(text),
            PropValue::Value(_) => None,
        }
    }

    /// The string, if this is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is a JSON boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Value(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The JSON value, if this is not a rich text.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(value) => Some(value),
            PropValue::Text(_) => None,
        }
    }

    /// True for JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Value(Value::Null))
    }

    /// Convert to a plain JSON value (rich text keeps its wire shape).
    pub fn to_json(&self) -> Value {
        match self {
            PropValue::Text(text) => serde_json::to_value(text).unwrap_or(Value::Null),
            PropValue::Value(value) => value.clone(),
        }
    }

    /// Interpret a JSON value, recognising the rich text wire shape.
    pub fn from_json(value: Value) -> Result<Self, String> {
        let is_text = value
            .get(INTERNAL_TEXT_MARKER)
            .is_some_and(|marker| marker.as_bool() == Some(true));
        if is_text {
            let text: RichText = serde_json::from_value(value).map_err(|e| e.to_string())?;
            return Ok(PropValue::Text(text));
        }
        Ok(PropValue::Value(value))
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Text(text) => text.serialize(serializer),
            PropValue::Value(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        PropValue::from_json(value).map_err(D::Error::custom)
    }
}

impl From<RichText> for PropValue {
    fn from(text: RichText) -> Self {
        PropValue::Text(text)
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        PropValue::Value(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Value(Value::String(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Value(Value::Bool(value))
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Value(Value::from(value))
    }
}

/// Build a [`Props`] bag from key/value pairs.
pub fn props_from<I, K, V>(pairs: I) -> Props
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<PropValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// A copy of the bag with keys sorted, for deterministic output.
pub fn sorted(props: &Props) -> Props {
    let mut out = props.clone();
    out.sort_keys();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{TextAttributes, TextRun};
    use serde_json::json;

    #[test]
    fn test_rich_text_is_recognised() {
        let props: Props = serde_json::from_value(json!({
            "type": "text",
            "text": {
                "$blocksuite:internal:text$": true,
                "delta": [{ "insert": "aaa", "attributes": { "bold": true } }]
            }
        }))
        .unwrap();

        assert_eq!(props["type"].as_str(), Some("text"));
        let text = props["text"].as_text().unwrap();
        assert_eq!(
            text.runs(),
            &[TextRun::styled("aaa", TextAttributes::bold())]
        );
    }

    #[test]
    fn test_objects_without_marker_stay_json() {
        let value = PropValue::from_json(json!({ "elements": {} })).unwrap();
        assert!(value.as_text().is_none());
        assert_eq!(value.to_json(), json!({ "elements": {} }));
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("id"));
        assert!(is_reserved_key("children"));
        assert!(is_reserved_key("sys:flavour"));
        assert!(!is_reserved_key("text"));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = props_from([("a", 1i64), ("b", 2i64)]);
        let b = props_from([("b", 2i64), ("a", 1i64)]);
        assert_eq!(a, b);
    }
}
