mod memory;

pub use memory::{MemoryAuth, SignInBehavior};

use crate::model::Identity;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("anonymous sign-in rejected: {0}")]
    SignInRejected(String),

    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// The backend-as-a-service authentication client, seen from the provisioner.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<(), AuthError>;

    async fn current_identity(&self) -> Result<Option<Identity>, AuthError>;

    /// Session-change broadcast. Advisory only: callers re-read
    /// [`AuthBackend::current_identity`] instead of trusting it.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
