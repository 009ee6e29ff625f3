use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::InProgress => "IN_PROGRESS",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }
}

/// A subject's registration in one competency standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub standard_id: String,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub overall_progress: u32,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonKind {
    Video,
    Reading,
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub kind: LessonKind,
    pub order: u32,
}

/// Module of a standard with its lessons in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(rename = "_id")]
    pub id: String,
    pub standard_id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ModuleStatus {
    /// Follows the rounded percentage stored alongside the status.
    pub fn from_count(count: &CompletionCount) -> Self {
        let progress = count.percent();
        if progress >= 100 {
            ModuleStatus::Completed
        } else if progress > 0 {
            ModuleStatus::InProgress
        } else {
            ModuleStatus::NotStarted
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub enrollment_id: String,
    pub module_id: String,
    pub status: ModuleStatus,
    pub progress: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub enrollment_id: String,
    pub lesson_id: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Submitted,
    Completed,
}

/// Portfolio document the subject produces for the standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub enrollment_id: String,
    pub template_code: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub overall_progress: u32,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCount {
    pub completed: u32,
    pub total: u32,
}

impl CompletionCount {
    pub fn new(completed: u32, total: u32) -> Self {
        Self { completed, total }
    }

    /// Percentage rounded to the nearest integer; zero when there is nothing to complete.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (100.0 * self.completed as f64 / self.total as f64).round() as u32
    }

    /// True once the rounded percentage reaches 100.
    pub fn is_complete(&self) -> bool {
        self.percent() >= 100
    }

    /// True when `completed >= ratio * total`.
    pub fn meets_ratio(&self, ratio: f64) -> bool {
        self.completed as f64 >= ratio * self.total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextLesson {
    pub module_id: String,
    pub module_title: String,
    pub lesson_id: String,
    pub lesson_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEstimate {
    pub completed_minutes: u32,
    pub total_minutes: u32,
    pub remaining_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub enrollment_id: String,
    pub overall_progress: u32,
    pub status: EnrollmentStatus,
    pub modules: CompletionCount,
    pub lessons: CompletionCount,
    pub videos: CompletionCount,
    /// `completed` counts distinct assessments with at least one passed attempt.
    pub assessments: CompletionCount,
    pub documents: CompletionCount,
    pub time: TimeEstimate,
    pub next_lesson: Option<NextLesson>,
    pub certification_ready: bool,
}
