use super::{AuthBackend, AuthError};
use crate::model::Identity;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInBehavior {
    Succeed,
    Fail(String),
    /// Reports success but never establishes a session.
    SucceedWithoutSession,
}

/// In-process auth backend. Hands out `anon-<n>` identities.
#[derive(Debug)]
pub struct MemoryAuth {
    session: Mutex<Option<Identity>>,
    notifier: watch::Sender<Option<Identity>>,
    behavior: Mutex<SignInBehavior>,
    notify: AtomicBool,
    fail_reads: AtomicBool,
    latency: Option<Duration>,
    sign_in_calls: AtomicUsize,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(None);
        Self {
            session: Mutex::new(None),
            notifier,
            behavior: Mutex::new(SignInBehavior::Succeed),
            notify: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            latency: None,
            sign_in_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(self, behavior: SignInBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            ..self
        }
    }

    /// Sign-in takes `latency` before completing.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sessions change without any broadcast.
    pub fn without_notifications(self) -> Self {
        self.notify.store(false, Ordering::SeqCst);
        self
    }

    /// Session reads fail with [`AuthError::Unavailable`].
    pub fn with_failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub async fn set_behavior(&self, behavior: SignInBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub async fn sign_out(&self) {
        *self.session.lock().await = None;
        self.broadcast(None);
    }

    fn broadcast(&self, identity: Option<Identity>) {
        if self.notify.load(Ordering::SeqCst) {
            self.notifier.send_replace(identity);
        }
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn sign_in_anonymously(&self) -> Result<(), AuthError> {
        let call = self.sign_in_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let behavior = self.behavior.lock().await.clone();
        match behavior {
            SignInBehavior::Succeed => {
                let identity = Identity::new(format!("anon-{call}"));
                *self.session.lock().await = Some(identity.clone());
                self.broadcast(Some(identity));
                Ok(())
            }
            SignInBehavior::Fail(reason) => Err(AuthError::SignInRejected(reason)),
            SignInBehavior::SucceedWithoutSession => Ok(()),
        }
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AuthError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("session read failed".to_string()));
        }
        Ok(self.session.lock().await.clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.notifier.subscribe()
    }
}
