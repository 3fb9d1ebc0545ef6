pub mod attempt;
pub mod auth;
pub mod eval;
pub mod matcher;
pub mod model;
pub mod provisioner;
pub mod retry;
pub mod storage;
pub mod store;
pub mod tracker;

pub use attempt::{ProvisionState, ProvisioningAttempt};
pub use auth::{AuthBackend, AuthError, MemoryAuth, SignInBehavior};
pub use eval::{evaluate_cases, CaseExpectation, EvalCase, EvalOutcome, EvalSummary};
pub use matcher::{
    find_match, normalize, tokenize, Matcher, MatcherConfig, DEFAULT_MIN_TOKEN_LEN,
    DEFAULT_PERSONA_BONUS, DEFAULT_PREFIX_WINDOW, DEFAULT_THRESHOLD,
};
pub use model::{
    ContentStatus, Decision, FaqAnswer, FaqEntry, Identity, MatchKind, MatchOutcome, MatchQuery,
    StatusKind,
};
pub use provisioner::{
    IdentityProvisioner, ProvisionError, ProvisionerConfig, SessionState, DEFAULT_SETTLE_TIMEOUT,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use storage::{load_entries_jsonl, save_entries_jsonl};
pub use store::{MemoryStatusStore, StatusStore, StoreError};
pub use tracker::{ProgressTracker, TrackerError};

/// Pass rate the bundled evaluation set is expected to clear.
pub const DEFAULT_REQUIRED_PASS_RATE: f32 = 0.85;
