use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::key::BlobKey;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Key-addressed blob storage.
///
/// Blobs are never reachable by an external URL; all reads are mediated by
/// the owning service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store data from an async reader under the given key.
    ///
    /// Returns the number of bytes written.
    async fn write(&self, key: &BlobKey, reader: BoxReader) -> Result<u64, StorageError>;

    /// Retrieve a blob as a streaming async reader.
    async fn read_stream(&self, key: &BlobKey) -> Result<BoxReader, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError>;

    /// Delete a blob by key.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError>;

    /// The filesystem path a blob lives at (or would live at).
    fn path_for(&self, key: &BlobKey) -> PathBuf;
}
