use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::question::Response;
use crate::utils::time::{elapsed_seconds, exceeds_limit};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Completed => "COMPLETED",
            AttemptStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }

    /// Both terminal states are absorbing.
    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        matches!(
            (self, next),
            (AttemptStatus::InProgress, AttemptStatus::Completed)
                | (AttemptStatus::InProgress, AttemptStatus::TimedOut)
        )
    }
}

/// Per-question grading detail kept for audit and review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub question_type: String,
    pub is_correct: bool,
    pub points_earned: u32,
    pub max_points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Raw answers while the attempt is open, graded results once it is closed.
/// Completion converts one into the other and there is no way back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum AttemptResponses {
    InProgress(HashMap<String, Response>),
    Graded(Vec<QuestionResult>),
}

impl Default for AttemptResponses {
    fn default() -> Self {
        AttemptResponses::InProgress(HashMap::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub enrollment_id: String,
    pub assessment_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds.
    #[serde(default)]
    pub time_spent: Option<u64>,
    #[serde(default)]
    pub responses: AttemptResponses,
    /// Percentage, set on completion.
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl Attempt {
    pub fn start(enrollment_id: &str, assessment_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            enrollment_id: enrollment_id.to_string(),
            assessment_id: assessment_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
            time_spent: None,
            responses: AttemptResponses::default(),
            score: None,
            passed: None,
        }
    }

    /// Stored raw answers; empty once graded.
    pub fn pending_responses(&self) -> Vec<Response> {
        match &self.responses {
            AttemptResponses::InProgress(map) => map.values().cloned().collect(),
            AttemptResponses::Graded(_) => Vec::new(),
        }
    }

    /// Last write wins per question. Returns the number of distinct answered questions.
    pub fn upsert_response(&mut self, response: Response) -> usize {
        match &mut self.responses {
            AttemptResponses::InProgress(map) => {
                map.insert(response.question_id.clone(), response);
                map.len()
            }
            AttemptResponses::Graded(results) => results.len(),
        }
    }

    pub fn replace_responses(&mut self, responses: Vec<Response>) {
        let map = responses
            .into_iter()
            .map(|r| (r.question_id.clone(), r))
            .collect::<HashMap<_, _>>();
        self.responses = AttemptResponses::InProgress(map);
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        elapsed_seconds(self.started_at, now)
    }

    pub fn is_past_limit(&self, limit_seconds: u64, now: DateTime<Utc>) -> bool {
        exceeds_limit(self.started_at, now, limit_seconds)
    }
}

/// Outcome returned by completion (directly, via bulk submit or via a timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: String,
    pub status: AttemptStatus,
    /// Raw points earned.
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub passed: bool,
    pub time_spent: u64,
    pub completed_at: DateTime<Utc>,
    /// Present only when the assessment allows showing results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionResult>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitAnswerOutcome {
    #[serde(rename_all = "camelCase")]
    Recorded { success: bool, answered_count: usize },
    /// The time limit had already elapsed; the answer was dropped and the
    /// attempt closed.
    TimedOut(AttemptResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerValue;

    fn response(question_id: &str, index: u64) -> Response {
        Response {
            question_id: question_id.to_string(),
            value: Some(AnswerValue::Index(index)),
            time_spent: None,
        }
    }

    #[test]
    fn attempt_status_transitions() {
        assert!(AttemptStatus::InProgress.can_transition_to(AttemptStatus::Completed));
        assert!(AttemptStatus::InProgress.can_transition_to(AttemptStatus::TimedOut));
        assert!(!AttemptStatus::Completed.can_transition_to(AttemptStatus::TimedOut));
        assert!(!AttemptStatus::TimedOut.can_transition_to(AttemptStatus::InProgress));
        assert!(!AttemptStatus::Completed.can_transition_to(AttemptStatus::Completed));
    }

    #[test]
    fn upsert_keeps_one_entry_per_question() {
        let mut attempt = Attempt::start("enr-1", "as-1", Utc::now());
        assert_eq!(attempt.upsert_response(response("q1", 0)), 1);
        assert_eq!(attempt.upsert_response(response("q2", 1)), 2);
        assert_eq!(attempt.upsert_response(response("q1", 3)), 2);

        let stored = attempt
            .pending_responses()
            .into_iter()
            .find(|r| r.question_id == "q1")
            .unwrap();
        assert_eq!(stored.value, Some(AnswerValue::Index(3)));
    }

    #[test]
    fn replace_responses_discards_previous_answers() {
        let mut attempt = Attempt::start("enr-1", "as-1", Utc::now());
        attempt.upsert_response(response("q1", 0));
        attempt.replace_responses(vec![response("q2", 1)]);

        let pending = attempt.pending_responses();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].question_id, "q2");
    }

    #[test]
    fn attempt_ids_are_v7_uuids() {
        let attempt = Attempt::start("enr-1", "as-1", Utc::now());
        let parsed = Uuid::parse_str(&attempt.id).expect("attempt id should be a uuid");
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn time_limit_is_not_truncated_to_whole_seconds() {
        let now = Utc::now();
        let attempt = Attempt::start("enr", "as", now - chrono::Duration::milliseconds(60_800));
        assert_eq!(attempt.elapsed_seconds(now), 60);
        assert!(attempt.is_past_limit(60, now));
        assert!(!attempt.is_past_limit(61, now));
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&AttemptStatus::TimedOut).unwrap();
        assert_eq!(json, "\"TIMED_OUT\"");
    }
}
