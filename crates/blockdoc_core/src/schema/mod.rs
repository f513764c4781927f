//! Schema registry.
//!
//! Each flavour registers a defaults factory and a property validator. The
//! registry is populated once at startup and then shared read-only
//! (`Arc<SchemaRegistry>`) with the store and the adapters.

mod flavours;

pub use flavours::Flavour;
pub(crate) use flavours::LIST_TYPES;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BlockDocError, Result};
use crate::props::Props;

/// Produces a fresh default property bag.
pub type DefaultsFactory = Arc<dyn Fn() -> Props + Send + Sync>;

/// Checks a complete property bag, returning a reason on rejection.
pub type PropsValidator = Arc<dyn Fn(&Props) -> std::result::Result<(), String> + Send + Sync>;

/// Structural role of a flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    /// Document root (page)
    Root,
    /// Structural container emitting no markup of its own (note, surface)
    Hub,
    /// Content-bearing block
    Content,
}

/// Schema entry for one flavour.
#[derive(Clone)]
pub struct BlockSchema {
    flavour: String,
    role: BlockRole,
    defaults: DefaultsFactory,
    validator: PropsValidator,
}

impl BlockSchema {
    /// Create a schema entry.
    pub fn new<D, V>(flavour: impl Into<String>, role: BlockRole, defaults: D, validator: V) -> Self
    where
        D: Fn() -> Props + Send + Sync + 'static,
        V: Fn(&Props) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            flavour: flavour.into(),
            role,
            defaults: Arc::new(defaults),
            validator: Arc::new(validator),
        }
    }

    /// The flavour tag.
    pub fn flavour(&self) -> &str {
        &self.flavour
    }

    /// The structural role.
    pub fn role(&self) -> BlockRole {
        self.role
    }

    /// A fresh bag of default props.
    pub fn defaults(&self) -> Props {
        (self.defaults)()
    }

    /// Validate a full property bag.
    pub fn validate(&self, props: &Props) -> Result<()> {
        (self.validator)(props).map_err(|reason| BlockDocError::InvalidProps {
            flavour: self.flavour.clone(),
            reason,
        })
    }
}

impl fmt::Debug for BlockSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockSchema")
            .field("flavour", &self.flavour)
            .field("role", &self.role)
            .finish()
    }
}

/// Lookup table from flavour to schema.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, BlockSchema>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in flavour.
    pub fn with_builtin_flavours() -> Self {
        let mut registry = Self::new();
        for flavour in Flavour::ALL {
            registry.register_schema(flavour.schema());
        }
        registry
    }

    /// Register a content flavour. Replaces any previous entry.
    pub fn register<D, V>(&mut self, flavour: &str, defaults: D, validator: V) -> &mut Self
    where
        D: Fn() -> Props + Send + Sync + 'static,
        V: Fn(&Props) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.register_schema(BlockSchema::new(
            flavour,
            BlockRole::Content,
            defaults,
            validator,
        ))
    }

    /// Register a prepared schema entry. Replaces any previous entry.
    pub fn register_schema(&mut self, schema: BlockSchema) -> &mut Self {
        log::debug!("Registering schema for {}", schema.flavour());
        self.schemas.insert(schema.flavour.clone(), schema);
        self
    }

    /// Look up a flavour.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::UnknownFlavour`] if the flavour is not registered.
    pub fn lookup(&self, flavour: &str) -> Result<&BlockSchema> {
        self.schemas
            .get(flavour)
            .ok_or_else(|| BlockDocError::UnknownFlavour(flavour.to_string()))
    }

    /// Whether the flavour is registered.
    pub fn contains(&self, flavour: &str) -> bool {
        self.schemas.contains_key(flavour)
    }

    /// Registered flavours, sorted.
    pub fn flavours(&self) -> Vec<&str> {
        let mut flavours: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        flavours.sort_unstable();
        flavours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::{PropValue, props_from};

    #[test]
    fn test_lookup_unknown_flavour_fails() {
        let registry = SchemaRegistry::with_builtin_flavours();
        let err = registry.lookup("affine:embed-youtube").unwrap_err();
        assert!(matches!(err, BlockDocError::UnknownFlavour(f) if f == "affine:embed-youtube"));
    }

    #[test]
    fn test_register_custom_flavour() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "custom:callout",
            || props_from([("emoji", "💡")]),
            |props| match props.get("emoji") {
                Some(value) if value.as_str().is_some() => Ok(()),
                _ => Err("emoji must be a string".to_string()),
            },
        );

        let schema = registry.lookup("custom:callout").unwrap();
        assert_eq!(schema.role(), BlockRole::Content);
        assert_eq!(schema.defaults()["emoji"].as_str(), Some("💡"));

        let bad = props_from([("emoji", PropValue::from(true))]);
        assert!(matches!(
            schema.validate(&bad),
            Err(BlockDocError::InvalidProps { .. })
        ));
    }

    #[test]
    fn test_defaults_are_fresh_each_call() {
        let registry = SchemaRegistry::with_builtin_flavours();
        let schema = registry.lookup("affine:paragraph").unwrap();

        let mut first = schema.defaults();
        first.insert("type".to_string(), "h1".into());
        let second = schema.defaults();

        assert_eq!(second["type"].as_str(), Some("text"));
    }

    #[test]
    fn test_builtin_flavours_registered() {
        let registry = SchemaRegistry::with_builtin_flavours();
        assert_eq!(
            registry.flavours(),
            vec![
                "affine:code",
                "affine:divider",
                "affine:image",
                "affine:list",
                "affine:note",
                "affine:page",
                "affine:paragraph",
                "affine:surface",
            ]
        );
        assert_eq!(
            registry.lookup("affine:note").unwrap().role(),
            BlockRole::Hub
        );
    }
}
