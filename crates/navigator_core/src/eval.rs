use crate::matcher::Matcher;
use crate::model::{Decision, FaqEntry, MatchKind, MatchQuery};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    #[serde(default)]
    pub persona: Option<String>,
    pub expected_decision: Decision,
    #[serde(default)]
    pub expected_faq_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub case_id: String,
    pub passed: bool,
    pub actual_decision: Decision,
    pub actual_faq_id: Option<String>,
    pub kind: Option<MatchKind>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f32,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    pub fn meets(&self, required_pass_rate: f32) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

pub struct CaseExpectation;

impl CaseExpectation {
    /// The expected id is only checked on hits; a miss may still report
    /// its best keyword candidate.
    pub fn matches(
        expected_decision: Decision,
        expected_faq_id: Option<&str>,
        actual_decision: Decision,
        actual_faq_id: Option<&str>,
    ) -> bool {
        if expected_decision != actual_decision {
            return false;
        }

        match (expected_decision, expected_faq_id) {
            (Decision::Hit, Some(expected)) => actual_faq_id == Some(expected),
            _ => true,
        }
    }
}

pub fn evaluate_cases(matcher: &Matcher, entries: &[FaqEntry], cases: &[EvalCase]) -> EvalSummary {
    let outcomes: Vec<EvalOutcome> = cases
        .iter()
        .map(|case| {
            let query = MatchQuery {
                text: case.question.clone(),
                active_persona: case.persona.clone(),
            };
            let result = matcher.decide(&query, entries);

            let passed = CaseExpectation::matches(
                case.expected_decision,
                case.expected_faq_id.as_deref(),
                result.decision,
                result.entry_id.as_deref(),
            );

            EvalOutcome {
                case_id: case.case_id.clone(),
                passed,
                actual_decision: result.decision,
                actual_faq_id: result.entry_id,
                kind: result.kind,
                score: result.score,
            }
        })
        .collect();

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let failed = total.saturating_sub(passed);
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f32 / total as f32
    };

    EvalSummary {
        total,
        passed,
        failed,
        pass_rate,
        outcomes,
    }
}
