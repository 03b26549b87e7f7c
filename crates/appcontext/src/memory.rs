//! In-memory context backend

use crate::context_trait::ContextStoreTrait;
use crate::error::AppContextError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory key/value backend shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryContextStore {
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    faults: Arc<Mutex<HashMap<&'static str, String>>>,
}

impl MemoryContextStore {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `operation` (`put`, `get`, `keys`, `delete_prefix`) fail.
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn inject_fault(&self, operation: &'static str, message: impl Into<String>) {
        self.faults.lock().unwrap().insert(operation, message.into());
    }

    /// Clear a fault set with [`MemoryContextStore::inject_fault`]
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn clear_fault(&self, operation: &'static str) {
        self.faults.lock().unwrap().remove(operation);
    }

    /// Total number of keys held
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether no keys are held
    #[cfg(feature = "test-util")]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_fault(&self, operation: &'static str) -> Result<(), AppContextError> {
        let faults = self
            .faults
            .lock()
            .map_err(|e| AppContextError::Store(format!("fault table poisoned: {e}")))?;
        faults
            .get(operation)
            .map_or(Ok(()), |message| Err(AppContextError::Store(message.clone())))
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, AppContextError> {
        self.entries
            .lock()
            .map_err(|e| AppContextError::Store(format!("context store poisoned: {e}")))
    }
}

#[async_trait::async_trait]
impl ContextStoreTrait for MemoryContextStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), AppContextError> {
        self.check_fault("put")?;
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppContextError> {
        self.check_fault("get")?;
        Ok(self.entries()?.get(key).cloned())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AppContextError> {
        self.check_fault("keys")?;
        Ok(self
            .entries()?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), AppContextError> {
        self.check_fault("delete_prefix")?;
        self.entries()?.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}
