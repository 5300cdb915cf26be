//! Shared test helpers: a content store with injectable failures and a recording sink.

use crate::error::StoreError;
use crate::notify::NotificationSink;
use crate::store::{ContentHash, ContentStore, MemoryStore, ObjectWriter};
use crate::types::CycleNotification;
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Wraps a [`MemoryStore`] and fails selected operations by artifact name.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    write_fail_suffix: Option<String>,
    delete_fail_suffix: Option<String>,
    copy_fails: bool,
    list_fail_prefix: Option<String>,
    pub(crate) deletes: Arc<AtomicU32>,
    pub(crate) copies: Arc<AtomicU32>,
}

impl FlakyStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Writers for names ending in `suffix` fail on the first write
    pub(crate) fn fail_writes_for(mut self, suffix: &str) -> Self {
        self.write_fail_suffix = Some(suffix.to_string());
        self
    }

    /// Deleting names ending in `suffix` fails
    pub(crate) fn fail_deletes_for(mut self, suffix: &str) -> Self {
        self.delete_fail_suffix = Some(suffix.to_string());
        self
    }

    /// Every copy fails
    pub(crate) fn fail_copies(mut self) -> Self {
        self.copy_fails = true;
        self
    }

    /// Listing exactly `prefix` fails
    pub(crate) fn fail_list_for(mut self, prefix: &str) -> Self {
        self.list_fail_prefix = Some(prefix.to_string());
        self
    }
}

#[async_trait]
impl ContentStore for FlakyStore {
    async fn open_writer(&self, name: &str) -> Result<ObjectWriter, StoreError> {
        if self
            .write_fail_suffix
            .as_deref()
            .is_some_and(|s| name.ends_with(s))
        {
            return Ok(Box::new(FailingWriter));
        }
        self.inner.open_writer(name).await
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self
            .delete_fail_suffix
            .as_deref()
            .is_some_and(|s| name.ends_with(s))
        {
            return Err(StoreError::Backend("couldn't delete file".to_string()));
        }
        self.inner.delete(name).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        if self.copy_fails {
            return Err(StoreError::Backend("copy refused".to_string()));
        }
        self.inner.copy(src, dst).await
    }

    async fn list_content_hashes(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, ContentHash>, StoreError> {
        if self.list_fail_prefix.as_deref() == Some(prefix) {
            return Err(StoreError::Backend("listing unavailable".to_string()));
        }
        self.inner.list_content_hashes(prefix).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

struct FailingWriter;

impl AsyncWrite for FailingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Err(std::io::Error::other("example copy error")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Notification sink that keeps every published message
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    messages: Arc<Mutex<Vec<CycleNotification>>>,
}

impl RecordingSink {
    pub(crate) fn published(&self) -> Vec<CycleNotification> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, notification: &CycleNotification) -> crate::error::Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(notification.clone());
        }
        Ok(())
    }
}
