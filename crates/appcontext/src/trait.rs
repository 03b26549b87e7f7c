//! Key/value backend trait for mocking
//!
//! The AppContext tree is flattened onto a plain key/value store (etcd in
//! production deployments). This trait is the seam between the two.

use crate::error::AppContextError;

/// Trait for the key/value backend holding AppContext trees
///
/// Keys are `/`-separated paths that always end with `/`.
#[async_trait::async_trait]
pub trait ContextStoreTrait: Send + Sync {
    /// Blind upsert
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), AppContextError>;

    /// Value at `key`, if present
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppContextError>;

    /// Every key starting with `prefix`, in lexicographic order
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AppContextError>;

    /// Delete every key starting with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<(), AppContextError>;
}
