use async_trait::async_trait;
use movies_indexer_shared::Watermark;

use crate::errors::CheckpointError;

/// Trait for interacting with the checkpoint store.
///
/// This trait provides an abstraction over the durable slot holding the
/// synchronization watermark.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last persisted watermark, or `None` when it was never saved or the stored
    /// state is missing or unreadable.
    async fn load(&self) -> Option<Watermark>;

    /// Persist the watermark. A crash mid-save leaves either the previous or
    /// the new value, never a torn one.
    async fn save(&self, watermark: Watermark) -> Result<(), CheckpointError>;
}
