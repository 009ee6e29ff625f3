//! Persistence collaborators consumed by the services.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{
    Assessment, Attempt, AttemptStatus, Enrollment, LessonProgress, Module, ModuleProgress,
    PortfolioDocument, ProgressUpdate,
};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    Is(AttemptStatus),
    /// Anything other than `IN_PROGRESS`.
    Terminal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptFilter {
    pub enrollment_id: Option<String>,
    pub assessment_id: Option<String>,
    pub status: StatusFilter,
}

impl AttemptFilter {
    pub fn for_pair(enrollment_id: &str, assessment_id: &str) -> Self {
        Self {
            enrollment_id: Some(enrollment_id.to_string()),
            assessment_id: Some(assessment_id.to_string()),
            status: StatusFilter::Any,
        }
    }

    pub fn for_enrollment(enrollment_id: &str) -> Self {
        Self {
            enrollment_id: Some(enrollment_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, attempt: &Attempt) -> bool {
        let status_ok = match self.status {
            StatusFilter::Any => true,
            StatusFilter::Is(status) => attempt.status == status,
            StatusFilter::Terminal => attempt.status.is_terminal(),
        };

        status_ok
            && self
                .enrollment_id
                .as_deref()
                .is_none_or(|id| id == attempt.enrollment_id)
            && self
                .assessment_id
                .as_deref()
                .is_none_or(|id| id == attempt.assessment_id)
    }
}

/// Read source for assessments and their canonical question sets.
#[async_trait]
pub trait AssessmentSource: Send + Sync {
    async fn get_assessment(&self, assessment_id: &str) -> Result<Option<Assessment>>;

    /// Ids of all assessments attached to a standard.
    async fn list_assessment_ids(&self, standard_id: &str) -> Result<Vec<String>>;
}

/// Attempt persistence. `find_first` and `list` return newest attempts first.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<()>;

    async fn get_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>>;

    /// Overwrites a stored attempt only while it is still `IN_PROGRESS`.
    /// Returns false when nothing open matched.
    async fn update_open_attempt(&self, attempt: &Attempt) -> Result<bool>;

    async fn count_attempts(&self, filter: &AttemptFilter) -> Result<u64>;

    async fn find_first_attempt(&self, filter: &AttemptFilter) -> Result<Option<Attempt>>;

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>>;
}

/// Enrollment, curriculum and portfolio state read by the progress aggregator,
/// with write-back for the derived progress fields.
#[async_trait]
pub trait EnrollmentReadModel: Send + Sync {
    async fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>>;

    /// Modules of a standard in declared order, lessons included.
    async fn list_modules(&self, standard_id: &str) -> Result<Vec<Module>>;

    async fn completed_lesson_ids(&self, enrollment_id: &str) -> Result<HashSet<String>>;

    /// Returns false when the lesson was already recorded as complete.
    async fn record_lesson_completion(&self, progress: &LessonProgress) -> Result<bool>;

    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()>;

    async fn update_enrollment_progress(
        &self,
        enrollment_id: &str,
        update: &ProgressUpdate,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn list_documents(&self, enrollment_id: &str) -> Result<Vec<PortfolioDocument>>;
}
