use crate::errors::CoreError;

/// Durable, scope-qualified JSON document store.
///
/// One scope key maps to one JSON document (the serialized alert set or
/// portfolio list for a user). The contract both components rely on:
///
/// - `save` makes the document durable before returning — no batching across
///   calls, and each save is a single atomic replacement of the whole document.
/// - `load` returning `None` is a valid, non-error result for a scope that has
///   never been written.
/// - Concurrent writers to the same scope key are not a design concern: a
///   scope has a single owning component.
///
/// Injected into both components as `Arc<dyn ScopeStore>` so tests can swap in
/// an in-memory implementation.
pub trait ScopeStore: Send + Sync {
    /// Read the document stored under `scope_key`, if any.
    fn load(&self, scope_key: &str) -> Result<Option<String>, CoreError>;

    /// Durably replace the document stored under `scope_key`.
    fn save(&self, scope_key: &str, document: &str) -> Result<(), CoreError>;

    /// Delete the document stored under `scope_key`. Idempotent.
    fn remove(&self, scope_key: &str) -> Result<(), CoreError>;
}
