pub mod assessment;
pub mod attempt;
pub mod enrollment;
pub mod question;

pub use assessment::{Assessment, AssessmentDocument};
pub use attempt::{
    Attempt, AttemptResponses, AttemptResult, AttemptStatus, QuestionResult, SubmitAnswerOutcome,
};
pub use enrollment::{
    CompletionCount, Enrollment, EnrollmentStatus, Lesson, LessonKind, LessonProgress, Module,
    ModuleProgress, ModuleStatus, NextLesson, PortfolioDocument, DocumentStatus, ProgressSummary,
    ProgressUpdate, TimeEstimate,
};
pub use question::{AnswerValue, MatchPair, Question, QuestionKind, Response, StoredQuestion};
