use crate::error::{CoreError, CoreResult};
use crate::metrics::{record_attempt_event, record_question_graded};
use crate::models::{
    Assessment, AnswerValue, Attempt, AttemptResponses, AttemptResult, AttemptStatus, Enrollment,
    Response, SubmitAnswerOutcome,
};
use crate::services::{AppState, GradingService};
use crate::store::{AssessmentSource, AttemptFilter, AttemptStore, EnrollmentReadModel, StatusFilter};
use chrono::Utc;
use std::sync::Arc;

/// Drives attempts through `IN_PROGRESS -> COMPLETED | TIMED_OUT`.
pub struct AttemptService {
    assessments: Arc<dyn AssessmentSource>,
    attempts: Arc<dyn AttemptStore>,
    enrollments: Arc<dyn EnrollmentReadModel>,
    grading: GradingService,
}

impl AttemptService {
    pub fn new(state: &AppState) -> Self {
        Self {
            assessments: state.assessments.clone(),
            attempts: state.attempts.clone(),
            enrollments: state.enrollments.clone(),
            grading: GradingService::new(state.config.grading.clone()),
        }
    }

    /// Opens an attempt, or returns the one already in progress for the pair.
    pub async fn start_attempt(
        &self,
        enrollment_id: &str,
        assessment_id: &str,
    ) -> CoreResult<Attempt> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        let assessment = self.load_assessment(assessment_id).await?;

        if assessment.standard_id != enrollment.standard_id {
            tracing::warn!(
                "Assessment {} (standard {}) rejected for enrollment {} (standard {})",
                assessment.id,
                assessment.standard_id,
                enrollment.id,
                enrollment.standard_id
            );
            return Err(CoreError::DomainMismatch {
                assessment_id: assessment.id,
                standard_id: enrollment.standard_id,
            });
        }

        let pair = AttemptFilter::for_pair(enrollment_id, assessment_id);
        let used = self
            .attempts
            .count_attempts(&pair.clone().with_status(StatusFilter::Terminal))
            .await?;

        if used >= u64::from(assessment.allowed_attempts) {
            tracing::warn!(
                "Attempt quota exhausted: enrollment={}, assessment={}, used={}/{}",
                enrollment_id,
                assessment_id,
                used,
                assessment.allowed_attempts
            );
            record_attempt_event("rejected");
            return Err(CoreError::QuotaExceeded {
                allowed: assessment.allowed_attempts,
                used,
            });
        }

        let open = pair.with_status(StatusFilter::Is(AttemptStatus::InProgress));
        if let Some(existing) = self.attempts.find_first_attempt(&open).await? {
            tracing::info!(
                "Resuming attempt {} for enrollment {}",
                existing.id,
                enrollment_id
            );
            record_attempt_event("resumed");
            return Ok(existing);
        }

        let attempt = Attempt::start(enrollment_id, assessment_id, Utc::now());
        self.attempts.create_attempt(&attempt).await?;

        record_attempt_event("started");
        tracing::info!(
            "Attempt started: {} (enrollment={}, assessment={}, attempt {} of {})",
            attempt.id,
            enrollment_id,
            assessment_id,
            used + 1,
            assessment.allowed_attempts
        );

        Ok(attempt)
    }

    /// Records one answer. Past the time limit the answer is dropped and the
    /// attempt is closed as `TIMED_OUT` instead.
    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        value: Option<AnswerValue>,
        time_spent: Option<u64>,
    ) -> CoreResult<SubmitAnswerOutcome> {
        let mut attempt = self.load_open_attempt(attempt_id).await?;
        let assessment = self.load_assessment(&attempt.assessment_id).await?;

        if let Some(limit) = assessment.time_limit {
            let now = Utc::now();
            if attempt.is_past_limit(limit, now) {
                let elapsed = attempt.elapsed_seconds(now);
                tracing::warn!(
                    "Attempt {} exceeded time limit ({}s > {}s), closing as timed out",
                    attempt.id,
                    elapsed,
                    limit
                );
                let result = self.finish(attempt, &assessment, true).await?;
                return Ok(SubmitAnswerOutcome::TimedOut(result));
            }
        }

        let answered_count = attempt.upsert_response(Response {
            question_id: question_id.to_string(),
            value,
            time_spent,
        });
        self.save_open_attempt(&attempt).await?;

        tracing::debug!(
            "Answer recorded: attempt={}, question={}, answered={}",
            attempt.id,
            question_id,
            answered_count
        );

        Ok(SubmitAnswerOutcome::Recorded {
            success: true,
            answered_count,
        })
    }

    /// Replaces the stored answers with `answers` and completes the attempt.
    pub async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: Vec<Response>,
        time_spent: Option<u64>,
    ) -> CoreResult<AttemptResult> {
        let mut attempt = self.load_open_attempt(attempt_id).await?;
        let assessment = self.load_assessment(&attempt.assessment_id).await?;

        attempt.replace_responses(answers);
        if time_spent.is_some() {
            attempt.time_spent = time_spent;
        }

        self.finish(attempt, &assessment, false).await
    }

    pub async fn complete_attempt(
        &self,
        attempt_id: &str,
        timed_out: bool,
    ) -> CoreResult<AttemptResult> {
        let attempt = self.load_open_attempt(attempt_id).await?;
        let assessment = self.load_assessment(&attempt.assessment_id).await?;

        self.finish(attempt, &assessment, timed_out).await
    }

    pub async fn get_attempt_by_id(&self, attempt_id: &str) -> CoreResult<Attempt> {
        self.attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Attempt", attempt_id))
    }

    /// Attempts for the pair, newest first.
    pub async fn list_attempts(
        &self,
        enrollment_id: &str,
        assessment_id: &str,
    ) -> CoreResult<Vec<Attempt>> {
        let attempts = self
            .attempts
            .list_attempts(&AttemptFilter::for_pair(enrollment_id, assessment_id))
            .await?;
        Ok(attempts)
    }

    /// How many more attempts `start_attempt` will open for the pair.
    pub async fn remaining_attempts(
        &self,
        enrollment_id: &str,
        assessment_id: &str,
    ) -> CoreResult<u32> {
        let assessment = self.load_assessment(assessment_id).await?;
        let used = self
            .attempts
            .count_attempts(
                &AttemptFilter::for_pair(enrollment_id, assessment_id)
                    .with_status(StatusFilter::Terminal),
            )
            .await?;

        let remaining = u64::from(assessment.allowed_attempts).saturating_sub(used);
        Ok(u32::try_from(remaining).unwrap_or(u32::MAX))
    }

    /// Grades and closes an open attempt in a single write. Nothing is
    /// persisted if grading cannot run.
    async fn finish(
        &self,
        mut attempt: Attempt,
        assessment: &Assessment,
        timed_out: bool,
    ) -> CoreResult<AttemptResult> {
        let next = if timed_out {
            AttemptStatus::TimedOut
        } else {
            AttemptStatus::Completed
        };
        if !attempt.status.can_transition_to(next) {
            return Err(CoreError::InvalidState(format!(
                "Attempt {} is {} and cannot become {}",
                attempt.id,
                attempt.status.as_str(),
                next.as_str()
            )));
        }

        let now = Utc::now();
        let time_spent = attempt
            .time_spent
            .unwrap_or_else(|| attempt.elapsed_seconds(now));

        let outcome = self.grading.grade_attempt(
            &assessment.questions,
            &attempt.pending_responses(),
            assessment.passing_score,
        );
        let percentage = outcome.rounded_percentage();

        attempt.status = next;
        attempt.completed_at = Some(now);
        attempt.time_spent = Some(time_spent);
        attempt.score = Some(percentage);
        attempt.passed = Some(outcome.passed);
        attempt.responses = AttemptResponses::Graded(outcome.results.clone());

        self.save_open_attempt(&attempt).await?;

        for result in &outcome.results {
            record_question_graded(&result.question_type, result.is_correct);
        }
        record_attempt_event(if timed_out { "timed_out" } else { "completed" });

        tracing::info!(
            "Attempt {} {}: {}/{} points ({}%), passed={}",
            attempt.id,
            next.as_str(),
            outcome.total_points,
            outcome.max_points,
            percentage,
            outcome.passed
        );

        Ok(AttemptResult {
            attempt_id: attempt.id,
            status: next,
            score: outcome.total_points,
            max_score: outcome.max_points,
            percentage,
            passed: outcome.passed,
            time_spent,
            completed_at: now,
            questions: assessment.show_results.then_some(outcome.results),
        })
    }

    async fn load_open_attempt(&self, attempt_id: &str) -> CoreResult<Attempt> {
        let attempt = self.get_attempt_by_id(attempt_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(CoreError::InvalidState(format!(
                "Attempt {} is already {}",
                attempt.id,
                attempt.status.as_str()
            )));
        }
        Ok(attempt)
    }

    /// A concurrent submit may have closed the attempt since it was loaded.
    async fn save_open_attempt(&self, attempt: &Attempt) -> CoreResult<()> {
        if !self.attempts.update_open_attempt(attempt).await? {
            return Err(CoreError::InvalidState(format!(
                "Attempt {} is no longer in progress",
                attempt.id
            )));
        }
        Ok(())
    }

    async fn load_assessment(&self, assessment_id: &str) -> CoreResult<Assessment> {
        self.assessments
            .get_assessment(assessment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Assessment", assessment_id))
    }

    async fn load_enrollment(&self, enrollment_id: &str) -> CoreResult<Enrollment> {
        self.enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment", enrollment_id))
    }
}
