//! Per-kind grading strategies.
//!
//! Every question kind carries its own typed payload, and grading dispatches
//! with an exhaustive `match` over [`QuestionKind`]. A missing response always
//! grades to zero regardless of kind.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::GradingPolicy;
use crate::models::question::{
    AnswerValue, MatchingPayload, MultipleChoicePayload, Question, QuestionKind,
    ShortAnswerPayload, TrueFalsePayload,
};

pub const ESSAY_REVIEW_FEEDBACK: &str = "requires manual review";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub is_correct: bool,
    pub earned_points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl GradeResult {
    fn no_response() -> Self {
        Self {
            is_correct: false,
            earned_points: 0,
            feedback: None,
        }
    }

    fn binary(is_correct: bool, points: u32) -> Self {
        Self {
            is_correct,
            earned_points: if is_correct { points } else { 0 },
            feedback: None,
        }
    }

    fn zero_with_feedback(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            earned_points: 0,
            feedback: Some(feedback.into()),
        }
    }
}

/// Grading strategy implemented by each typed question payload.
pub trait QuestionHandler {
    fn grade(&self, points: u32, value: &AnswerValue, policy: &GradingPolicy) -> GradeResult;

    /// Authoring-time sanity check. Not consulted while grading.
    fn validate(&self) -> bool;
}

impl QuestionHandler for MultipleChoicePayload {
    fn grade(&self, points: u32, value: &AnswerValue, _policy: &GradingPolicy) -> GradeResult {
        let AnswerValue::Index(index) = value else {
            return GradeResult::binary(false, points);
        };
        let index = *index as usize;

        let is_correct = self.correct_index == Some(index)
            || self.options.get(index).is_some_and(|option| option.is_correct);
        GradeResult::binary(is_correct, points)
    }

    fn validate(&self) -> bool {
        if self.options.len() < 2 || self.options.iter().any(|o| o.text.trim().is_empty()) {
            return false;
        }
        match self.correct_index {
            Some(index) => index < self.options.len(),
            None => self.options.iter().any(|o| o.is_correct),
        }
    }
}

impl QuestionHandler for TrueFalsePayload {
    fn grade(&self, points: u32, value: &AnswerValue, _policy: &GradingPolicy) -> GradeResult {
        let is_correct = matches!(value, AnswerValue::Bool(answer) if *answer == self.correct_answer);
        GradeResult::binary(is_correct, points)
    }

    fn validate(&self) -> bool {
        true
    }
}

impl QuestionHandler for ShortAnswerPayload {
    fn grade(&self, points: u32, value: &AnswerValue, policy: &GradingPolicy) -> GradeResult {
        if self.keywords.is_empty() {
            return GradeResult::zero_with_feedback("No keywords configured for this question");
        }
        let AnswerValue::Text(text) = value else {
            return GradeResult::zero_with_feedback("Expected a text response");
        };

        let answer = text.to_lowercase();
        let matched = self
            .keywords
            .iter()
            .filter(|keyword| answer.contains(&keyword.to_lowercase()))
            .count();
        let score = matched as f64 / self.keywords.len() as f64;

        GradeResult {
            is_correct: score >= policy.short_answer_threshold,
            earned_points: scale_points(points, score),
            feedback: Some(format!(
                "Matched {} of {} keywords",
                matched,
                self.keywords.len()
            )),
        }
    }

    fn validate(&self) -> bool {
        !self.keywords.is_empty() && self.keywords.iter().all(|k| !k.trim().is_empty())
    }
}

impl QuestionHandler for MatchingPayload {
    fn grade(&self, points: u32, value: &AnswerValue, _policy: &GradingPolicy) -> GradeResult {
        if self.pairs.is_empty() {
            return GradeResult::zero_with_feedback("No pairs configured for this question");
        }
        let AnswerValue::Pairs(submitted) = value else {
            return GradeResult::zero_with_feedback("Expected a list of pairs");
        };

        let submitted: HashSet<_> = submitted.iter().collect();
        let correct_pairs = self
            .pairs
            .iter()
            .filter(|pair| submitted.contains(pair))
            .count();
        let score = correct_pairs as f64 / self.pairs.len() as f64;

        GradeResult {
            // Partial matches still earn points but never count as correct.
            is_correct: correct_pairs == self.pairs.len(),
            earned_points: scale_points(points, score),
            feedback: Some(format!(
                "{} of {} pairs matched",
                correct_pairs,
                self.pairs.len()
            )),
        }
    }

    fn validate(&self) -> bool {
        if self.pairs.is_empty() {
            return false;
        }
        let mut lefts = HashSet::new();
        self.pairs.iter().all(|pair| {
            !pair.left.trim().is_empty()
                && !pair.right.trim().is_empty()
                && lefts.insert(pair.left.as_str())
        })
    }
}

fn scale_points(points: u32, score: f64) -> u32 {
    (points as f64 * score).round() as u32
}

/// Grades one question. `None` is the no-response sentinel.
pub fn grade(
    question: &Question,
    response: Option<&AnswerValue>,
    policy: &GradingPolicy,
) -> GradeResult {
    let Some(value) = response else {
        return GradeResult::no_response();
    };

    match &question.kind {
        QuestionKind::MultipleChoice(payload) => payload.grade(question.points, value, policy),
        QuestionKind::TrueFalse(payload) => payload.grade(question.points, value, policy),
        QuestionKind::ShortAnswer(payload) => payload.grade(question.points, value, policy),
        QuestionKind::Matching(payload) => payload.grade(question.points, value, policy),
        QuestionKind::Essay => GradeResult::zero_with_feedback(ESSAY_REVIEW_FEEDBACK),
        QuestionKind::Unsupported { type_tag } => {
            tracing::warn!(
                "No grading handler for question {} of type {}; awarding zero credit",
                question.id,
                type_tag
            );
            GradeResult::zero_with_feedback(format!("Unsupported question type: {}", type_tag))
        }
    }
}

pub fn validate_question(question: &Question) -> bool {
    match &question.kind {
        QuestionKind::MultipleChoice(payload) => payload.validate(),
        QuestionKind::TrueFalse(payload) => payload.validate(),
        QuestionKind::ShortAnswer(payload) => payload.validate(),
        QuestionKind::Matching(payload) => payload.validate(),
        QuestionKind::Essay => true,
        QuestionKind::Unsupported { .. } => false,
    }
}

/// Reviewer-supplied essay grade. Points are clamped to `[0, question.points]`.
pub fn grade_essay_manually(
    question: &Question,
    awarded_points: i64,
    policy: &GradingPolicy,
) -> GradeResult {
    let max_points = question.points;
    let earned_points = awarded_points.clamp(0, max_points as i64) as u32;
    let is_correct =
        max_points > 0 && earned_points as f64 >= policy.essay_pass_ratio * max_points as f64;

    GradeResult {
        is_correct,
        earned_points,
        feedback: Some(format!("Manually graded: {} of {}", earned_points, max_points)),
    }
}
