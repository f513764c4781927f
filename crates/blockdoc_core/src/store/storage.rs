//! Persistence for the replicated document: a compacted state plus a log of
//! the updates made since that state was saved.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOrigin {
    /// A mutation made through this store
    Local,
    /// An incremental update from a peer
    Remote,
    /// A full state received during the initial handshake
    Sync,
}

impl UpdateOrigin {
    /// Lowercase name, as logged.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOrigin::Local => "local",
            UpdateOrigin::Remote => "remote",
            UpdateOrigin::Sync => "sync",
        }
    }
}

impl std::fmt::Display for UpdateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged binary update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Position in the log; increases across all documents of one storage
    pub seq: u64,
    /// Encoded yrs update (v1)
    pub data: Vec<u8>,
    /// Where it came from
    pub origin: UpdateOrigin,
    /// Unix time in milliseconds
    pub recorded_at: i64,
}

/// Backend holding block documents by name.
pub trait CrdtStorage: Send + Sync {
    /// The last saved state, if any.
    fn load_state(&self, doc: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the saved state.
    ///
    /// The state covers every logged update, so the log is cleared.
    fn save_state(&self, doc: &str, state: &[u8]) -> Result<()>;

    /// Log an update and return its sequence number.
    fn append_update(&self, doc: &str, update: &[u8], origin: UpdateOrigin) -> Result<u64>;

    /// Updates logged since the last save, oldest first.
    fn updates(&self, doc: &str) -> Result<Vec<UpdateRecord>>;
}
