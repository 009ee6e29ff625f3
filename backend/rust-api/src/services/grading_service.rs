use std::collections::HashMap;

use crate::config::GradingPolicy;
use crate::models::attempt::QuestionResult;
use crate::models::question::{Question, Response};

use super::question_handlers;

/// Totals for one graded question set.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingOutcome {
    pub total_points: u32,
    pub max_points: u32,
    /// Unrounded; `passed` is decided on this value.
    pub percentage: f64,
    pub passed: bool,
    /// One entry per question, in question order.
    pub results: Vec<QuestionResult>,
}

impl GradingOutcome {
    pub fn rounded_percentage(&self) -> u32 {
        self.percentage.round() as u32
    }
}

/// Routes each question to its handler and totals the results.
#[derive(Debug, Clone, Default)]
pub struct GradingService {
    policy: GradingPolicy,
}

impl GradingService {
    pub fn new(policy: GradingPolicy) -> Self {
        Self { policy }
    }

    /// Pure and deterministic: the same inputs always produce the same outcome.
    /// Responses are matched by question id; the last response for an id wins.
    pub fn grade_attempt(
        &self,
        questions: &[Question],
        responses: &[Response],
        passing_score: u32,
    ) -> GradingOutcome {
        let by_question: HashMap<&str, &Response> = responses
            .iter()
            .map(|r| (r.question_id.as_str(), r))
            .collect();

        let mut total_points = 0u32;
        let mut max_points = 0u32;
        let mut results = Vec::with_capacity(questions.len());

        for question in questions {
            let answer = by_question
                .get(question.id.as_str())
                .and_then(|r| r.value.as_ref());
            let grade = question_handlers::grade(question, answer, &self.policy);

            tracing::debug!(
                "Graded question {} ({}): correct={}, points={}/{}",
                question.id,
                question.kind.type_tag(),
                grade.is_correct,
                grade.earned_points,
                question.points
            );

            total_points = total_points.saturating_add(grade.earned_points);
            max_points = max_points.saturating_add(question.points);
            results.push(QuestionResult {
                question_id: question.id.clone(),
                question_type: question.kind.type_tag().to_string(),
                is_correct: grade.is_correct,
                points_earned: grade.earned_points,
                max_points: question.points,
                feedback: grade.feedback,
                explanation: question.explanation.clone(),
            });
        }

        let percentage = if max_points > 0 {
            100.0 * total_points as f64 / max_points as f64
        } else {
            0.0
        };

        GradingOutcome {
            total_points,
            max_points,
            percentage,
            passed: percentage >= passing_score as f64,
            results,
        }
    }
}
