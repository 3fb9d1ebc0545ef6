use crate::model::{ContentStatus, StatusKind};
use crate::provisioner::{IdentityProvisioner, ProvisionError};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::store::{StatusStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Watched/bookmark toggles. Writes go through the provisioner; reads never
/// create an identity.
pub struct ProgressTracker {
    provisioner: Arc<IdentityProvisioner>,
    store: Arc<dyn StatusStore>,
    retry: RetryPolicy,
}

impl ProgressTracker {
    pub fn new(
        provisioner: Arc<IdentityProvisioner>,
        store: Arc<dyn StatusStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provisioner,
            store,
            retry,
        }
    }

    /// Marks (`on = true`) or unmarks `content_id`. Returns whether the store
    /// changed: an upsert always counts, a delete only if a row existed.
    pub async fn set_status(
        &self,
        content_id: &str,
        kind: StatusKind,
        on: bool,
    ) -> Result<bool, TrackerError> {
        let store = &self.store;
        let retry = self.retry;

        let written = self
            .provisioner
            .with_identity(|user| async move {
                debug!(%user, content_id, ?kind, on, "writing content status");
                if on {
                    retry_with_backoff(retry, StoreError::is_transient, || {
                        store.upsert(ContentStatus {
                            user_id: user.clone(),
                            content_id: content_id.to_string(),
                            kind,
                            updated_at: Utc::now(),
                        })
                    })
                    .await
                    .map(|()| true)
                } else {
                    retry_with_backoff(retry, StoreError::is_transient, || {
                        store.delete(&user, content_id, kind)
                    })
                    .await
                }
            })
            .await??;

        Ok(written)
    }

    pub async fn statuses(&self) -> Result<Vec<ContentStatus>, TrackerError> {
        match self.provisioner.session().identity().await {
            Some(user) => Ok(self.store.list(&user).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn is_marked(&self, content_id: &str, kind: StatusKind) -> Result<bool, TrackerError> {
        Ok(self
            .statuses()
            .await?
            .iter()
            .any(|s| s.content_id == content_id && s.kind == kind))
    }
}
