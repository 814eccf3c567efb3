//! Settings persistence bridge.

use crate::error::Result;
use async_trait::async_trait;

/// Whole-document settings storage.
///
/// The core serializes its settings as one JSON document and always reads
/// and writes it in full. Implementations only need to move the blob.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::ConfigStore;
///
/// async fn reset(store: &dyn ConfigStore) -> Result<()> {
///     store.save("{}").await
/// }
/// ```
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the stored document, or `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    async fn save(&self, document: &str) -> Result<()>;
}
