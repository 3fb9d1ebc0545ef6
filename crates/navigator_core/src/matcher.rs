use crate::model::{Decision, FaqEntry, MatchKind, MatchOutcome, MatchQuery};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Tokens this short or shorter are dropped before scoring.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;
/// How much of a question a pasted query may match as a prefix fragment.
pub const DEFAULT_PREFIX_WINDOW: usize = 30;
pub const DEFAULT_PERSONA_BONUS: f32 = 0.5;
pub const DEFAULT_THRESHOLD: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub min_token_len: usize,
    pub prefix_window: usize,
    pub persona_bonus: f32,
    pub threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            prefix_window: DEFAULT_PREFIX_WINDOW,
            persona_bonus: DEFAULT_PERSONA_BONUS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MatcherConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits already-normalized text on whitespace, keeping distinct tokens
/// longer than `min_len` characters in first-seen order.
pub fn tokenize(normalized: &str, min_len: usize) -> Vec<&str> {
    let mut seen = HashSet::new();
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > min_len)
        .filter(|token| seen.insert(*token))
        .collect()
}

fn char_prefix(text: &str, window: usize) -> &str {
    match text.char_indices().nth(window) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

struct Selection<'a> {
    entry: &'a FaqEntry,
    score: f32,
    kind: MatchKind,
}

/// Keyword/substring FAQ matcher. Pure: no I/O, no shared state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Returns the single accepted entry, or `None` for no match.
    pub fn find_match<'a>(
        &self,
        query: &MatchQuery,
        candidates: &'a [FaqEntry],
    ) -> Option<&'a FaqEntry> {
        match self.select(query, candidates) {
            Some(sel) if self.accepts(&sel) => Some(sel.entry),
            _ => None,
        }
    }

    /// Same decision as [`Matcher::find_match`], with the score and rule that
    /// produced it. A keyword miss still reports the best candidate seen.
    pub fn decide(&self, query: &MatchQuery, candidates: &[FaqEntry]) -> MatchOutcome {
        let Some(sel) = self.select(query, candidates) else {
            return MatchOutcome::miss();
        };

        let decision = if self.accepts(&sel) {
            Decision::Hit
        } else {
            Decision::Miss
        };

        MatchOutcome {
            entry_id: Some(sel.entry.id.clone()),
            score: sel.score,
            decision,
            kind: Some(sel.kind),
        }
    }

    fn accepts(&self, sel: &Selection<'_>) -> bool {
        match sel.kind {
            MatchKind::Substring => true,
            MatchKind::Keyword => sel.score >= self.config.threshold,
        }
    }

    fn select<'a>(&self, query: &MatchQuery, candidates: &'a [FaqEntry]) -> Option<Selection<'a>> {
        let normalized = normalize(&query.text);
        if normalized.is_empty() {
            // "" is a substring of every question.
            return None;
        }
        let tokens = tokenize(&normalized, self.config.min_token_len);
        let persona = query.active_persona.as_deref();

        let questions: Vec<String> = candidates.iter().map(|c| normalize(&c.question)).collect();

        for (entry, question) in candidates.iter().zip(&questions) {
            if normalized.contains(question.as_str())
                || char_prefix(question, self.config.prefix_window).contains(normalized.as_str())
            {
                debug!(entry_id = %entry.id, "substring match");
                return Some(Selection {
                    entry,
                    score: self.score(&tokens, persona, entry, question),
                    kind: MatchKind::Substring,
                });
            }
        }

        let mut best: Option<Selection<'a>> = None;
        for (entry, question) in candidates.iter().zip(&questions) {
            let score = self.score(&tokens, persona, entry, question);
            let current = best.as_ref().map(|b| b.score).unwrap_or(0.0);
            if score > current {
                best = Some(Selection {
                    entry,
                    score,
                    kind: MatchKind::Keyword,
                });
            }
        }

        if let Some(sel) = &best {
            debug!(
                entry_id = %sel.entry.id,
                score = sel.score,
                threshold = self.config.threshold,
                "best keyword candidate"
            );
        }
        best
    }

    fn score(
        &self,
        tokens: &[&str],
        persona: Option<&str>,
        entry: &FaqEntry,
        normalized_question: &str,
    ) -> f32 {
        let keyword_hits = tokens
            .iter()
            .filter(|token| normalized_question.contains(**token))
            .count() as f32;

        let bonus = match persona {
            Some(p) if entry.has_persona(p) => self.config.persona_bonus,
            _ => 0.0,
        };

        keyword_hits + bonus
    }
}

/// [`Matcher::find_match`] with the default configuration.
pub fn find_match<'a>(query: &MatchQuery, candidates: &'a [FaqEntry]) -> Option<&'a FaqEntry> {
    Matcher::default().find_match(query, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FaqAnswer;

    fn mk_entry(id: &str, question: &str, personas: &[&str]) -> FaqEntry {
        FaqEntry {
            id: id.to_string(),
            question: question.to_string(),
            answer: FaqAnswer {
                acknowledgment: format!("ack-{id}"),
                evidence: String::new(),
                sources: Vec::new(),
            },
            persona_tags: personas.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn nimitz() -> Vec<FaqEntry> {
        vec![mk_entry(
            "nimitz",
            "How did the Nimitz encounter unfold?",
            &["skeptic"],
        )]
    }

    #[test]
    fn substring_short_circuit_wins_over_scoring() {
        let entries = vec![
            mk_entry("aaro", "What is AARO?", &[]),
            mk_entry("uap", "What is UAP?", &[]),
        ];
        let hit = find_match(&MatchQuery::new("what is aaro"), &entries).expect("hit");
        assert_eq!(hit.id, "aaro");

        let outcome = Matcher::default().decide(&MatchQuery::new("what is aaro"), &entries);
        assert_eq!(outcome.kind, Some(MatchKind::Substring));
        assert_eq!(outcome.decision, Decision::Hit);
    }

    #[test]
    fn pasted_question_inside_longer_query_matches() {
        let entries = vec![mk_entry("uap", "What is UAP?", &[])];
        let query = MatchQuery::new("  Hi there! WHAT IS UAP? I keep hearing it  ");
        assert_eq!(find_match(&query, &entries).map(|e| e.id.as_str()), Some("uap"));
    }

    #[test]
    fn prefix_window_limits_fragment_matching() {
        let entries = vec![mk_entry(
            "grusch",
            "What did David Grusch tell Congress under oath in July 2023?",
            &[],
        )];
        // Fragment within the first 30 characters.
        assert!(find_match(&MatchQuery::new("david grusch"), &entries).is_some());
        // Fragment beyond the window falls through to keyword scoring, where
        // only "oath" overlaps.
        assert!(find_match(&MatchQuery::new("sworn oath"), &entries).is_none());
    }

    #[test]
    fn one_keyword_is_below_threshold() {
        let outcome = Matcher::default().decide(&MatchQuery::new("tell me about nimitz"), &nimitz());
        assert_eq!(outcome.decision, Decision::Miss);
        assert_eq!(outcome.entry_id.as_deref(), Some("nimitz"));
        assert!((outcome.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn two_keywords_reach_threshold() {
        let entries = nimitz();
        let hit = find_match(&MatchQuery::new("nimitz encounter details"), &entries);
        assert_eq!(hit.map(|e| e.id.as_str()), Some("nimitz"));
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let outcome = Matcher::default().decide(&MatchQuery::new("nimitz nimitz NIMITZ"), &nimitz());
        assert_eq!(outcome.decision, Decision::Miss);
        assert!((outcome.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tokenize_drops_short_and_duplicate_tokens() {
        assert_eq!(
            tokenize("what is the nimitz what nimitz tape", 3),
            vec!["what", "nimitz", "tape"]
        );
    }

    #[test]
    fn persona_bonus_alone_never_crosses_threshold() {
        let query = MatchQuery::new("nimitz footage please").with_persona("skeptic");
        let outcome = Matcher::default().decide(&query, &nimitz());
        assert!((outcome.score - 1.5).abs() < 1e-6);
        assert_eq!(outcome.decision, Decision::Miss);
    }

    #[test]
    fn persona_bonus_breaks_keyword_ties() {
        let entries = vec![
            mk_entry("radar", "Nimitz encounter radar data", &[]),
            mk_entry("pilots", "Nimitz encounter pilot testimony", &["researcher"]),
        ];
        let query = MatchQuery::new("explain nimitz encounter").with_persona("researcher");
        let hit = find_match(&query, &entries).expect("hit");
        assert_eq!(hit.id, "pilots");
    }

    #[test]
    fn ties_keep_earliest_candidate() {
        let entries = vec![
            mk_entry("radar", "Nimitz encounter radar data", &[]),
            mk_entry("pilots", "Nimitz encounter pilot testimony", &[]),
        ];
        let query = MatchQuery::new("explain nimitz encounter");
        assert_eq!(find_match(&query, &entries).map(|e| e.id.as_str()), Some("radar"));
    }

    #[test]
    fn short_tokens_never_score() {
        let entries = vec![mk_entry("uap", "Why are the UAP files sealed?", &[])];
        let outcome = Matcher::default().decide(&MatchQuery::new("why are the uap so odd"), &entries);
        assert_eq!(outcome, MatchOutcome::miss());
    }

    #[test]
    fn empty_inputs_are_misses() {
        let entries = nimitz();
        assert!(find_match(&MatchQuery::new("nimitz encounter"), &[]).is_none());
        assert!(find_match(&MatchQuery::new(""), &entries).is_none());
        assert!(find_match(&MatchQuery::new("   \t "), &entries).is_none());
    }

    #[test]
    fn prefix_window_is_char_based() {
        let entries = vec![mk_entry(
            "accents",
            "¿Qué vio la tripulación del portaaviones Nimitz?",
            &[],
        )];
        let outcome = Matcher::default().decide(&MatchQuery::new("tripulación"), &entries);
        assert_eq!(outcome.decision, Decision::Hit);
        assert_eq!(outcome.kind, Some(MatchKind::Substring));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let entries = vec![
            mk_entry("radar", "Nimitz encounter radar data", &[]),
            mk_entry("pilots", "Nimitz encounter pilot testimony", &["skeptic"]),
        ];
        let query = MatchQuery::new("pilot testimony from nimitz").with_persona("skeptic");
        let matcher = Matcher::default();
        let first = matcher.decide(&query, &entries);
        for _ in 0..10 {
            assert_eq!(matcher.decide(&query, &entries), first);
        }
    }

    #[test]
    fn threshold_is_configurable() {
        let matcher = Matcher::new(MatcherConfig::default().with_threshold(1.0));
        let entries = nimitz();
        let hit = matcher.find_match(&MatchQuery::new("tell me about nimitz"), &entries);
        assert!(hit.is_some());
    }
}
