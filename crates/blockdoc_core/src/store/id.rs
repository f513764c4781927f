//! Block id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh block ids.
pub trait IdGenerator: Send + Sync {
    /// Produce a new id, never returned before by this generator.
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. Safe across independent actors.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential ids `block:0`, `block:1`, ... for deterministic output.
#[derive(Debug)]
pub struct AutoIncrementIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl AutoIncrementIdGenerator {
    /// Ids of the form `block:<n>`.
    pub fn new() -> Self {
        Self::with_prefix("block:")
    }

    /// Ids of the form `<prefix><n>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl Default for AutoIncrementIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for AutoIncrementIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_increment_is_sequential() {
        let generator = AutoIncrementIdGenerator::new();
        assert_eq!(generator.next_id(), "block:0");
        assert_eq!(generator.next_id(), "block:1");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let generator = UuidIdGenerator;
        assert_ne!(generator.next_id(), generator.next_id());
    }
}
