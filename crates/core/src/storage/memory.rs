use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::ScopeStore;
use crate::errors::CoreError;

/// In-memory `ScopeStore` for tests and ephemeral embedding.
///
/// Durability here means "survives for the lifetime of the store object" —
/// the atomic-replacement and absent-scope semantics match the contract
/// exactly, which is what the components' tests exercise.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes currently stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ScopeStore for MemoryStore {
    fn load(&self, scope_key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.lock().get(scope_key).cloned())
    }

    fn save(&self, scope_key: &str, document: &str) -> Result<(), CoreError> {
        self.lock()
            .insert(scope_key.to_string(), document.to_string());
        Ok(())
    }

    fn remove(&self, scope_key: &str) -> Result<(), CoreError> {
        self.lock().remove(scope_key);
        Ok(())
    }
}
