use crate::model::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    NoIdentity,
    Provisioning,
    Provisioned,
    ProvisioningFailed,
}

/// One just-in-time anonymous sign-in, from the first write that needed an
/// identity to its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningAttempt {
    pub attempt_id: u64,
    pub state: ProvisionState,
    pub requested_at: DateTime<Utc>,
    pub signed_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notified: bool,
    pub identity: Option<Identity>,
    pub error: Option<String>,
}

impl ProvisioningAttempt {
    pub fn start(attempt_id: u64) -> Self {
        Self {
            attempt_id,
            state: ProvisionState::NoIdentity,
            requested_at: Utc::now(),
            signed_in_at: None,
            completed_at: None,
            notified: false,
            identity: None,
            error: None,
        }
    }

    pub fn on_sign_in_started(&mut self) {
        if self.state != ProvisionState::NoIdentity {
            return;
        }
        self.state = ProvisionState::Provisioning;
    }

    pub fn on_sign_in_failed(&mut self, reason: impl Into<String>) {
        if self.state != ProvisionState::Provisioning {
            return;
        }
        self.fail(reason.into());
    }

    pub fn on_signed_in(&mut self, notified: bool) {
        if self.state != ProvisionState::Provisioning {
            return;
        }
        self.signed_in_at = Some(Utc::now());
        self.notified = notified;
    }

    pub fn on_identity_read(&mut self, identity: Option<Identity>) {
        if self.state != ProvisionState::Provisioning || self.signed_in_at.is_none() {
            return;
        }
        match identity {
            Some(identity) => {
                self.state = ProvisionState::Provisioned;
                self.identity = Some(identity);
                self.error = None;
                self.completed_at = Some(Utc::now());
            }
            None => self.fail("identity_missing_after_sign_in".to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ProvisionState::Provisioned | ProvisionState::ProvisioningFailed
        )
    }

    fn fail(&mut self, reason: String) {
        self.state = ProvisionState::ProvisioningFailed;
        self.error = Some(reason);
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_provisioned() {
        let mut attempt = ProvisioningAttempt::start(1);
        attempt.on_sign_in_started();
        assert_eq!(attempt.state, ProvisionState::Provisioning);

        attempt.on_signed_in(true);
        attempt.on_identity_read(Some(Identity::new("anon-1")));

        assert_eq!(attempt.state, ProvisionState::Provisioned);
        assert_eq!(attempt.identity, Some(Identity::new("anon-1")));
        assert!(attempt.notified);
        assert!(attempt.is_terminal());
    }

    #[test]
    fn missing_identity_after_sign_in_fails() {
        let mut attempt = ProvisioningAttempt::start(2);
        attempt.on_sign_in_started();
        attempt.on_signed_in(false);
        attempt.on_identity_read(None);

        assert_eq!(attempt.state, ProvisionState::ProvisioningFailed);
        assert_eq!(
            attempt.error.as_deref(),
            Some("identity_missing_after_sign_in")
        );
    }

    #[test]
    fn out_of_order_transitions_are_ignored() {
        let mut attempt = ProvisioningAttempt::start(3);
        attempt.on_identity_read(Some(Identity::new("early")));
        assert_eq!(attempt.state, ProvisionState::NoIdentity);

        attempt.on_sign_in_started();
        attempt.on_sign_in_failed("rejected");
        attempt.on_signed_in(true);
        assert_eq!(attempt.state, ProvisionState::ProvisioningFailed);
        assert!(attempt.signed_in_at.is_none());
    }
}
