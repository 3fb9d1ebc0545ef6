use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload shown to the reader on a hit. The matcher never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaqAnswer {
    pub acknowledgment: String,
    pub evidence: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: FaqAnswer,
    #[serde(default)]
    pub persona_tags: Vec<String>,
}

impl FaqEntry {
    pub fn has_persona(&self, persona: &str) -> bool {
        self.persona_tags.iter().any(|tag| tag == persona)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub text: String,
    pub active_persona: Option<String>,
}

impl MatchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            active_persona: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.active_persona = Some(persona.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Hit,
    Miss,
}

/// Which rule produced the reported candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Substring,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub entry_id: Option<String>,
    pub score: f32,
    pub decision: Decision,
    pub kind: Option<MatchKind>,
}

impl MatchOutcome {
    pub fn miss() -> Self {
        Self {
            entry_id: None,
            score: 0.0,
            decision: Decision::Miss,
            kind: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.decision == Decision::Hit
    }
}

/// Server-validated principal used for writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Watched,
    Bookmarked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStatus {
    pub user_id: Identity,
    pub content_id: String,
    pub kind: StatusKind,
    pub updated_at: DateTime<Utc>,
}
