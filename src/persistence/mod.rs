use std::collections::HashMap;

pub mod file;

pub use file::{FilePersistence, PersistenceError};

/// Boundary to durable storage for per-conversation selections.
///
/// `load` is consulted once, when a conversation's record is first created;
/// `save` runs on every committed change and is fire-and-forget from the
/// store's perspective. Implementations report failures through logging
/// rather than to the store.
pub trait SelectionPersistence {
    fn load(&self, context_key: &str) -> Option<Vec<String>>;
    fn save(&mut self, context_key: &str, selected: &[String]);
}

/// In-memory adapter for tests and embedders that handle durability
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    snapshots: HashMap<String, Vec<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, context_key: &str) -> Option<&[String]> {
        self.snapshots.get(context_key).map(Vec::as_slice)
    }
}

impl SelectionPersistence for MemoryPersistence {
    fn load(&self, context_key: &str) -> Option<Vec<String>> {
        self.snapshots.get(context_key).cloned()
    }

    fn save(&mut self, context_key: &str, selected: &[String]) {
        self.snapshots
            .insert(context_key.to_string(), selected.to_vec());
    }
}
