//! In-memory content store

use super::{ContentHash, ContentStore, ObjectWriter};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

type Objects = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Content store backed by a process-local map
///
/// Cloning shares the underlying objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Objects,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an artifact directly, bypassing the writer
    pub fn insert(
        &self,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<(), StoreError> {
        self.lock()?.insert(name.into(), content.into());
        Ok(())
    }

    /// Content of an artifact, if present
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(name).cloned()
    }

    /// Whether an artifact exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All artifact names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.objects
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn open_writer(&self, name: &str) -> Result<ObjectWriter, StoreError> {
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            buf: Vec::new(),
            objects: self.objects.clone(),
        }))
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let mut objects = self.lock()?;
        let content = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(src.to_string()))?;
        objects.insert(dst.to_string(), content);
        Ok(())
    }

    async fn list_content_hashes(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, ContentHash>, StoreError> {
        let objects = self.lock()?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, content)| (name.clone(), md5::compute(content).0))
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Buffers writes and publishes the artifact on shutdown
struct MemoryWriter {
    name: String,
    buf: Vec<u8>,
    objects: Objects,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let content = std::mem::take(&mut self.buf);
        let result = self
            .objects
            .lock()
            .map(|mut objects| {
                objects.insert(self.name.clone(), content);
            })
            .map_err(|_| std::io::Error::other("memory store lock poisoned"));
        Poll::Ready(result)
    }
}
