use crate::attempt::ProvisioningAttempt;
use crate::auth::{AuthBackend, AuthError};
use crate::model::Identity;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

/// How long to wait for the session broadcast before re-reading anyway.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub settle_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("anonymous sign-in failed: {0}")]
    SignIn(#[source] AuthError),

    #[error("sign-in reported success but no identity is available")]
    IdentityUnavailable,
}

#[derive(Debug, Default)]
struct SessionCache {
    identity: Option<Identity>,
    last_attempt: Option<ProvisioningAttempt>,
}

/// Advisory cached identity shared by every write path in the process.
///
/// Provisioning is serialized by a separate gate (which also numbers the
/// attempts), so concurrent writers with no identity wait for one sign-in
/// while reads of the cache never wait on the backend.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    cache: Arc<RwLock<SessionCache>>,
    gate: Arc<Mutex<u64>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            cache: Arc::new(RwLock::new(SessionCache {
                identity: Some(identity),
                last_attempt: None,
            })),
            gate: Arc::default(),
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.cache.read().await.identity.clone()
    }

    /// Forget the cached identity, e.g. after the user signs out.
    pub async fn clear(&self) {
        self.cache.write().await.identity = None;
    }

    pub async fn last_attempt(&self) -> Option<ProvisioningAttempt> {
        self.cache.read().await.last_attempt.clone()
    }

    async fn record(&self, attempt: ProvisioningAttempt, identity: Option<Identity>) {
        let mut cache = self.cache.write().await;
        if identity.is_some() {
            cache.identity = identity;
        }
        cache.last_attempt = Some(attempt);
    }
}

/// Gateway for writes that need a server-validated identity. Provisions an
/// anonymous session on first use.
pub struct IdentityProvisioner {
    backend: Arc<dyn AuthBackend>,
    session: SessionState,
    config: ProvisionerConfig,
}

impl IdentityProvisioner {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        session: SessionState,
        config: ProvisionerConfig,
    ) -> Self {
        Self {
            backend,
            session,
            config,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub async fn ensure_identity(&self) -> Result<Identity, ProvisionError> {
        if let Some(identity) = self.session.identity().await {
            return Ok(identity);
        }

        let mut attempts = self.session.gate.lock().await;
        // Another writer may have finished provisioning while we waited.
        if let Some(identity) = self.session.identity().await {
            return Ok(identity);
        }

        *attempts += 1;
        let mut attempt = ProvisioningAttempt::start(*attempts);
        let result = self.provision(&mut attempt).await;

        match &result {
            Ok(identity) => {
                info!(attempt_id = attempt.attempt_id, identity = %identity, "anonymous identity provisioned");
            }
            Err(err) => {
                warn!(attempt_id = attempt.attempt_id, error = %err, "identity provisioning failed");
            }
        }
        self.session.record(attempt, result.clone().ok()).await;
        result
    }

    /// Runs `action` exactly once with a valid identity. The action is never
    /// invoked when provisioning fails.
    pub async fn with_identity<F, Fut, R>(&self, action: F) -> Result<R, ProvisionError>
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future<Output = R>,
    {
        let identity = self.ensure_identity().await?;
        Ok(action(identity).await)
    }

    /// Like [`IdentityProvisioner::with_identity`], but a provisioning
    /// failure becomes `None` so the calling interaction silently no-ops.
    pub async fn run_or_skip<F, Fut, R>(&self, action: F) -> Option<R>
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future<Output = R>,
    {
        match self.with_identity(action).await {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "skipping write without identity");
                None
            }
        }
    }

    async fn provision(
        &self,
        attempt: &mut ProvisioningAttempt,
    ) -> Result<Identity, ProvisionError> {
        // Subscribe first so a broadcast racing the sign-in reply is not lost,
        // and mark whatever the channel holds now as already seen.
        let mut rx = self.backend.subscribe();
        rx.borrow_and_update();

        attempt.on_sign_in_started();
        debug!(attempt_id = attempt.attempt_id, "no cached identity, signing in anonymously");
        if let Err(err) = self.backend.sign_in_anonymously().await {
            attempt.on_sign_in_failed(err.to_string());
            return Err(ProvisionError::SignIn(err));
        }

        let notified = self.wait_for_session(&mut rx).await;
        attempt.on_signed_in(notified);
        if !notified {
            debug!(
                attempt_id = attempt.attempt_id,
                timeout_ms = self.config.settle_timeout.as_millis() as u64,
                "no session broadcast, re-reading identity"
            );
        }

        let identity = match self.backend.current_identity().await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "identity read after sign-in failed");
                None
            }
        };
        attempt.on_identity_read(identity.clone());
        identity.ok_or(ProvisionError::IdentityUnavailable)
    }

    /// Waits for a session broadcast sent after sign-in started.
    async fn wait_for_session(&self, rx: &mut watch::Receiver<Option<Identity>>) -> bool {
        let wait = async {
            while rx.changed().await.is_ok() {
                if rx.borrow_and_update().is_some() {
                    return true;
                }
            }
            false
        };
        tokio::time::timeout(self.config.settle_timeout, wait)
            .await
            .unwrap_or(false)
    }
}
