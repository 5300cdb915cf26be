//! Content store contract
//!
//! The download engine never touches stored artifacts directly. It asks a [`ContentStore`]
//! to open a writer, delete, copy, and list content hashes, and derives every dedup
//! decision from what the store reports. Two implementations are provided:
//!
//! - [`FsStore`]: artifacts are files under a root directory, names map to relative paths
//! - [`MemoryStore`]: artifacts live in a process-local map (tests, dry runs)
//!
//! A store must give read-after-write consistency: once the writer returned by
//! [`ContentStore::open_writer`] has been shut down, [`ContentStore::list_content_hashes`]
//! reports the hash of the written bytes.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::io::AsyncWrite;

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// MD5 digest of an artifact's content
pub type ContentHash = [u8; 16];

/// Writable stream for a new artifact; `shutdown()` finalizes it
pub type ObjectWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Storage backend for downloaded artifacts
///
/// Names are `/`-separated paths such as `RouteViewIPv4/2017/06/20240102T000000Z-file.gz`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Open a writer that creates or replaces the artifact `name`
    async fn open_writer(&self, name: &str) -> Result<ObjectWriter, StoreError>;

    /// Remove the artifact `name`
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Copy artifact `src` to `dst`, replacing `dst` if it exists
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// Content hash of every artifact whose name starts with `prefix`
    async fn list_content_hashes(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, ContentHash>, StoreError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
