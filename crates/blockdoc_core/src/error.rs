use serde::Serialize;
use thiserror::Error;

/// Unified error type for blockdoc operations
#[derive(Debug, Error)]
pub enum BlockDocError {
    // Schema errors
    #[error("Unknown flavour '{0}'")]
    UnknownFlavour(String),

    #[error("Invalid props for '{flavour}': {reason}")]
    InvalidProps { flavour: String, reason: String },

    // Structural errors
    #[error("Invalid child reference '{child}' on block '{parent}'")]
    InvalidChildReference { parent: String, child: String },

    #[error("Block '{0}' not found")]
    NodeNotFound(String),

    #[error("Block id '{0}' already exists")]
    DuplicateId(String),

    // Codec errors
    #[error("Unsupported flavour '{0}'")]
    UnsupportedFlavour(String),

    #[error("Failed to resolve asset '{id}': {reason}")]
    AssetResolutionFailure { id: String, reason: String },

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // Replicated document errors
    #[error("CRDT error: {0}")]
    Crdt(String),

    // IO / serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Result type alias for blockdoc operations
pub type Result<T> = std::result::Result<T, BlockDocError>;

/// A serializable representation of BlockDocError for IPC
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated block, flavour or asset id (if applicable)
    pub id: Option<String>,
}

impl From<&BlockDocError> for SerializableError {
    fn from(err: &BlockDocError) -> Self {
        let kind = match err {
            BlockDocError::UnknownFlavour(_) => "UnknownFlavour",
            BlockDocError::InvalidProps { .. } => "InvalidProps",
            BlockDocError::InvalidChildReference { .. } => "InvalidChildReference",
            BlockDocError::NodeNotFound(_) => "NodeNotFound",
            BlockDocError::DuplicateId(_) => "DuplicateId",
            BlockDocError::UnsupportedFlavour(_) => "UnsupportedFlavour",
            BlockDocError::AssetResolutionFailure { .. } => "AssetResolutionFailure",
            BlockDocError::MalformedSnapshot(_) => "MalformedSnapshot",
            BlockDocError::Crdt(_) => "Crdt",
            BlockDocError::Json(_) => "Json",
            BlockDocError::Io(_) => "Io",
            BlockDocError::ConfigParse(_) => "ConfigParse",
            BlockDocError::ConfigSerialize(_) => "ConfigSerialize",
        }
        .to_string();

        let id = match err {
            BlockDocError::UnknownFlavour(flavour) => Some(flavour.clone()),
            BlockDocError::UnsupportedFlavour(flavour) => Some(flavour.clone()),
            BlockDocError::InvalidProps { flavour, .. } => Some(flavour.clone()),
            BlockDocError::InvalidChildReference { child, .. } => Some(child.clone()),
            BlockDocError::NodeNotFound(id) => Some(id.clone()),
            BlockDocError::DuplicateId(id) => Some(id.clone()),
            BlockDocError::AssetResolutionFailure { id, .. } => Some(id.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            id,
        }
    }
}

impl From<BlockDocError> for SerializableError {
    fn from(err: BlockDocError) -> Self {
        SerializableError::from(&err)
    }
}

impl BlockDocError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }

    /// Whether this error is a structural violation that must reach the caller.
    ///
    /// Codec-level errors (unsupported flavour, unresolved asset) are degraded
    /// per node instead.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BlockDocError::InvalidChildReference { .. }
                | BlockDocError::NodeNotFound(_)
                | BlockDocError::DuplicateId(_)
                | BlockDocError::MalformedSnapshot(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializable_error_carries_kind_and_id() {
        let err = BlockDocError::InvalidChildReference {
            parent: "block:a".to_string(),
            child: "block:missing".to_string(),
        };
        let serializable = err.to_serializable();

        assert_eq!(serializable.kind, "InvalidChildReference");
        assert_eq!(serializable.id.as_deref(), Some("block:missing"));
        assert!(serializable.message.contains("block:missing"));
    }

    #[test]
    fn test_structural_classification() {
        assert!(BlockDocError::NodeNotFound("x".into()).is_structural());
        assert!(BlockDocError::MalformedSnapshot("bad".into()).is_structural());
        assert!(!BlockDocError::UnsupportedFlavour("affine:embed".into()).is_structural());
    }
}
