use crate::model::{ContentStatus, Identity, StatusKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("status store unavailable: {0}")]
    Unavailable(String),

    #[error("status write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Per-user content status table (watched videos, bookmarks).
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn upsert(&self, status: ContentStatus) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(
        &self,
        user: &Identity,
        content_id: &str,
        kind: StatusKind,
    ) -> Result<bool, StoreError>;

    async fn list(&self, user: &Identity) -> Result<Vec<ContentStatus>, StoreError>;
}

type StatusKey = (Identity, String, StatusKind);

#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    rows: Mutex<BTreeMap<StatusKey, ContentStatus>>,
    fail_next: AtomicU32,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` operations fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let outage = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn upsert(&self, status: ContentStatus) -> Result<(), StoreError> {
        self.check_available()?;
        if status.content_id.is_empty() {
            return Err(StoreError::Rejected("empty content id".to_string()));
        }
        let key = (
            status.user_id.clone(),
            status.content_id.clone(),
            status.kind,
        );
        self.rows.lock().await.insert(key, status);
        Ok(())
    }

    async fn delete(
        &self,
        user: &Identity,
        content_id: &str,
        kind: StatusKind,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let key = (user.clone(), content_id.to_string(), kind);
        Ok(self.rows.lock().await.remove(&key).is_some())
    }

    async fn list(&self, user: &Identity) -> Result<Vec<ContentStatus>, StoreError> {
        self.check_available()?;
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| &row.user_id == user)
            .cloned()
            .collect())
    }
}
