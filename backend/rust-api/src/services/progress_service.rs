use crate::config::ProgressPolicy;
use crate::error::{CoreError, CoreResult};
use crate::metrics::PROGRESS_RECALCULATIONS_TOTAL;
use crate::models::{
    CompletionCount, DocumentStatus, Enrollment, EnrollmentStatus, LessonKind, LessonProgress,
    Module, ModuleProgress, ModuleStatus, NextLesson, ProgressSummary, ProgressUpdate,
    TimeEstimate,
};
use crate::services::AppState;
use crate::store::{AssessmentSource, AttemptFilter, AttemptStore, EnrollmentReadModel, StatusFilter};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// Derives module and enrollment progress from completed lessons.
pub struct ProgressService {
    assessments: Arc<dyn AssessmentSource>,
    attempts: Arc<dyn AttemptStore>,
    enrollments: Arc<dyn EnrollmentReadModel>,
    policy: ProgressPolicy,
}

fn module_lessons(module: &Module, completed: &HashSet<String>) -> CompletionCount {
    let done = module
        .lessons
        .iter()
        .filter(|lesson| completed.contains(&lesson.id))
        .count();
    CompletionCount::new(done as u32, module.lessons.len() as u32)
}

fn sum_counts(counts: impl Iterator<Item = CompletionCount>) -> CompletionCount {
    counts.fold(CompletionCount::default(), |acc, c| {
        CompletionCount::new(acc.completed + c.completed, acc.total + c.total)
    })
}

impl ProgressService {
    pub fn new(state: &AppState) -> Self {
        Self {
            assessments: state.assessments.clone(),
            attempts: state.attempts.clone(),
            enrollments: state.enrollments.clone(),
            policy: state.config.progress.clone(),
        }
    }

    /// Rewrites every module progress row and the enrollment's overall
    /// progress. Rows are written one at a time; a storage failure partway
    /// leaves earlier rows updated.
    pub async fn recalculate_progress(&self, enrollment_id: &str) -> CoreResult<ProgressUpdate> {
        let result = self.recalculate(enrollment_id).await;

        let status = if result.is_ok() { "success" } else { "error" };
        PROGRESS_RECALCULATIONS_TOTAL
            .with_label_values(&[status])
            .inc();

        result
    }

    async fn recalculate(&self, enrollment_id: &str) -> CoreResult<ProgressUpdate> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        let modules = self.enrollments.list_modules(&enrollment.standard_id).await?;
        let completed = self.enrollments.completed_lesson_ids(enrollment_id).await?;
        let now = Utc::now();

        for module in &modules {
            let lessons = module_lessons(module, &completed);
            let row = ModuleProgress {
                enrollment_id: enrollment_id.to_string(),
                module_id: module.id.clone(),
                status: ModuleStatus::from_count(&lessons),
                progress: lessons.percent(),
                updated_at: now,
            };
            self.enrollments.save_module_progress(&row).await?;
        }

        let lessons = sum_counts(modules.iter().map(|m| module_lessons(m, &completed)));

        // COMPLETED is absorbing
        let (status, completed_at) = match enrollment.status {
            EnrollmentStatus::Completed => (EnrollmentStatus::Completed, None),
            EnrollmentStatus::InProgress if lessons.is_complete() => {
                tracing::info!(
                    "Enrollment {} reached 100% ({}/{} lessons)",
                    enrollment_id,
                    lessons.completed,
                    lessons.total
                );
                (EnrollmentStatus::Completed, Some(now))
            }
            EnrollmentStatus::InProgress => (EnrollmentStatus::InProgress, None),
        };

        let update = ProgressUpdate {
            overall_progress: lessons.percent(),
            status,
        };
        self.enrollments
            .update_enrollment_progress(enrollment_id, &update, completed_at)
            .await?;

        tracing::info!(
            "Progress recalculated: enrollment={}, lessons={}/{}, overall={}%, status={}",
            enrollment_id,
            lessons.completed,
            lessons.total,
            update.overall_progress,
            update.status.as_str()
        );

        Ok(update)
    }

    /// Marks a lesson complete and recalculates. Repeating a completion is a
    /// no-op apart from the recalculation.
    pub async fn record_lesson_completion(
        &self,
        enrollment_id: &str,
        lesson_id: &str,
    ) -> CoreResult<ProgressUpdate> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        let modules = self.enrollments.list_modules(&enrollment.standard_id).await?;

        let known = modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .any(|lesson| lesson.id == lesson_id);
        if !known {
            return Err(CoreError::not_found("Lesson", lesson_id));
        }

        let recorded = self
            .enrollments
            .record_lesson_completion(&LessonProgress {
                enrollment_id: enrollment_id.to_string(),
                lesson_id: lesson_id.to_string(),
                completed_at: Utc::now(),
            })
            .await?;

        if recorded {
            tracing::info!("Lesson {} completed for enrollment {}", lesson_id, enrollment_id);
        } else {
            tracing::debug!(
                "Lesson {} already completed for enrollment {}",
                lesson_id,
                enrollment_id
            );
        }

        self.recalculate_progress(enrollment_id).await
    }

    pub async fn get_progress_summary(&self, enrollment_id: &str) -> CoreResult<ProgressSummary> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        let modules = self.enrollments.list_modules(&enrollment.standard_id).await?;
        let completed = self.enrollments.completed_lesson_ids(enrollment_id).await?;

        let per_module: Vec<CompletionCount> = modules
            .iter()
            .map(|m| module_lessons(m, &completed))
            .collect();

        let module_count = CompletionCount::new(
            per_module.iter().filter(|c| c.is_complete()).count() as u32,
            modules.len() as u32,
        );
        let lessons = sum_counts(per_module.iter().copied());

        let videos = modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .filter(|lesson| lesson.kind == LessonKind::Video);
        let video_count = videos.fold(CompletionCount::default(), |acc, lesson| {
            let done = u32::from(completed.contains(&lesson.id));
            CompletionCount::new(acc.completed + done, acc.total + 1)
        });

        let assessments = self.assessment_counts(&enrollment).await?;

        let documents = self.enrollments.list_documents(enrollment_id).await?;
        let document_count = CompletionCount::new(
            documents
                .iter()
                .filter(|d| d.status == DocumentStatus::Completed)
                .count() as u32,
            documents.len() as u32,
        );

        // Weighted by module duration, unlike overall progress.
        let total_minutes: u32 = modules.iter().map(|m| m.estimated_minutes).sum();
        let completed_minutes: u32 = modules
            .iter()
            .zip(&per_module)
            .filter(|(_, count)| count.is_complete())
            .map(|(m, _)| m.estimated_minutes)
            .sum();

        let next_lesson = modules
            .iter()
            .zip(&per_module)
            .filter(|(_, count)| !count.is_complete())
            .find_map(|(module, _)| {
                module
                    .lessons
                    .iter()
                    .find(|lesson| !completed.contains(&lesson.id))
                    .map(|lesson| NextLesson {
                        module_id: module.id.clone(),
                        module_title: module.title.clone(),
                        lesson_id: lesson.id.clone(),
                        lesson_title: lesson.title.clone(),
                    })
            });

        let certification_ready = module_count.completed == module_count.total
            && assessments.meets_ratio(self.policy.assessment_pass_ratio)
            && document_count.meets_ratio(self.policy.document_completion_ratio);

        Ok(ProgressSummary {
            enrollment_id: enrollment.id.clone(),
            overall_progress: lessons.percent(),
            status: enrollment.status,
            modules: module_count,
            lessons,
            videos: video_count,
            assessments,
            documents: document_count,
            time: TimeEstimate {
                completed_minutes,
                total_minutes,
                remaining_minutes: total_minutes.saturating_sub(completed_minutes),
            },
            next_lesson,
            certification_ready,
        })
    }

    /// Distinct assessments of the standard with at least one passed attempt.
    async fn assessment_counts(&self, enrollment: &Enrollment) -> CoreResult<CompletionCount> {
        let assessment_ids: HashSet<String> = self
            .assessments
            .list_assessment_ids(&enrollment.standard_id)
            .await?
            .into_iter()
            .collect();

        let attempts = self
            .attempts
            .list_attempts(
                &AttemptFilter::for_enrollment(&enrollment.id).with_status(StatusFilter::Terminal),
            )
            .await?;

        let passed: HashSet<&str> = attempts
            .iter()
            .filter(|a| a.passed == Some(true))
            .map(|a| a.assessment_id.as_str())
            .filter(|id| assessment_ids.contains(*id))
            .collect();

        Ok(CompletionCount::new(
            passed.len() as u32,
            assessment_ids.len() as u32,
        ))
    }

    async fn load_enrollment(&self, enrollment_id: &str) -> CoreResult<Enrollment> {
        self.enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment", enrollment_id))
    }
}
