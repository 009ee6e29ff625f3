use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    error::{Error as MongoError, ErrorKind},
    options::ReplaceOptions,
    Collection, Database,
};
use std::collections::HashSet;

use super::{AssessmentSource, AttemptFilter, AttemptStore, EnrollmentReadModel, StatusFilter};
use crate::metrics::track_db_operation;
use crate::models::{
    Assessment, AssessmentDocument, Attempt, AttemptStatus, Enrollment, LessonProgress, Module,
    ModuleProgress, PortfolioDocument, ProgressUpdate,
};
use crate::utils::retry::{retry_async_when, RetryConfig};

const ASSESSMENTS: &str = "assessments";
const ATTEMPTS: &str = "assessment_attempts";
const ENROLLMENTS: &str = "enrollments";
const MODULES: &str = "modules";
const LESSON_PROGRESS: &str = "lesson_progress";
const MODULE_PROGRESS: &str = "module_progress";
const DOCUMENTS: &str = "portfolio_documents";

/// MongoDB-backed implementation of every store trait.
#[derive(Clone)]
pub struct MongoStore {
    mongo: Database,
    retry: RetryConfig,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self {
            mongo,
            retry: RetryConfig::default(),
        }
    }

    fn attempts(&self) -> Collection<Attempt> {
        self.mongo.collection(ATTEMPTS)
    }

    /// Runs an idempotent read, retrying only transient driver errors.
    async fn read<T, F, Fut>(&self, operation: &str, collection: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MongoError>>,
    {
        track_db_operation(operation, collection, async {
            retry_async_when(&self.retry, &f, is_transient)
                .await
                .with_context(|| format!("Failed to {} in {}", operation, collection))
        })
        .await
    }
}

fn is_transient(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } | ErrorKind::ServerSelection { .. }
    ) || err.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
}

fn open_attempt_doc(attempt_id: &str) -> Document {
    doc! {
        "_id": attempt_id,
        "status": AttemptStatus::InProgress.as_str(),
    }
}

fn attempt_filter_doc(filter: &AttemptFilter) -> Document {
    let mut query = Document::new();
    if let Some(enrollment_id) = &filter.enrollment_id {
        query.insert("enrollmentId", enrollment_id);
    }
    if let Some(assessment_id) = &filter.assessment_id {
        query.insert("assessmentId", assessment_id);
    }
    match filter.status {
        StatusFilter::Any => {}
        StatusFilter::Is(status) => {
            query.insert("status", status.as_str());
        }
        StatusFilter::Terminal => {
            query.insert(
                "status",
                doc! { "$ne": AttemptStatus::InProgress.as_str() },
            );
        }
    }
    query
}

#[async_trait]
impl AssessmentSource for MongoStore {
    async fn get_assessment(&self, assessment_id: &str) -> Result<Option<Assessment>> {
        let collection: Collection<AssessmentDocument> = self.mongo.collection(ASSESSMENTS);
        let doc = self
            .read("find_one", ASSESSMENTS, || async {
                collection.find_one(doc! { "_id": assessment_id }).await
            })
            .await?;

        Ok(doc.map(Assessment::from))
    }

    async fn list_assessment_ids(&self, standard_id: &str) -> Result<Vec<String>> {
        let collection: Collection<Document> = self.mongo.collection(ASSESSMENTS);
        let docs: Vec<Document> = self
            .read("find", ASSESSMENTS, || async {
                collection
                    .find(doc! { "standardId": standard_id })
                    .projection(doc! { "_id": 1 })
                    .await?
                    .try_collect()
                    .await
            })
            .await?;

        docs.iter()
            .map(|d| {
                d.get_str("_id")
                    .map(str::to_string)
                    .map_err(|_| anyhow!("Assessment has non-string _id"))
            })
            .collect()
    }
}

#[async_trait]
impl AttemptStore for MongoStore {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<()> {
        let collection = self.attempts();
        track_db_operation("insert_one", ATTEMPTS, async {
            collection
                .insert_one(attempt)
                .await
                .context("Failed to insert attempt")?;
            Ok(())
        })
        .await?;

        tracing::debug!("Attempt stored: id={}", attempt.id);
        Ok(())
    }

    async fn get_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>> {
        let collection = self.attempts();
        self.read("find_one", ATTEMPTS, || async {
            collection.find_one(doc! { "_id": attempt_id }).await
        })
        .await
    }

    async fn update_open_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let collection = self.attempts();
        let filter = open_attempt_doc(&attempt.id);
        let result = track_db_operation("replace_one", ATTEMPTS, async {
            collection
                .replace_one(filter, attempt)
                .await
                .context("Failed to update attempt")
        })
        .await?;

        Ok(result.matched_count > 0)
    }

    async fn count_attempts(&self, filter: &AttemptFilter) -> Result<u64> {
        let collection = self.attempts();
        let query = attempt_filter_doc(filter);
        self.read("count_documents", ATTEMPTS, || async {
            collection.count_documents(query.clone()).await
        })
        .await
    }

    async fn find_first_attempt(&self, filter: &AttemptFilter) -> Result<Option<Attempt>> {
        let collection = self.attempts();
        let query = attempt_filter_doc(filter);
        // v7 ids sort by creation time
        self.read("find_one", ATTEMPTS, || async {
            collection
                .find_one(query.clone())
                .sort(doc! { "_id": -1 })
                .await
        })
        .await
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>> {
        let collection = self.attempts();
        let query = attempt_filter_doc(filter);
        self.read("find", ATTEMPTS, || async {
            collection
                .find(query.clone())
                .sort(doc! { "_id": -1 })
                .await?
                .try_collect()
                .await
        })
        .await
    }
}

#[async_trait]
impl EnrollmentReadModel for MongoStore {
    async fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>> {
        let collection: Collection<Enrollment> = self.mongo.collection(ENROLLMENTS);
        self.read("find_one", ENROLLMENTS, || async {
            collection.find_one(doc! { "_id": enrollment_id }).await
        })
        .await
    }

    async fn list_modules(&self, standard_id: &str) -> Result<Vec<Module>> {
        let collection: Collection<Module> = self.mongo.collection(MODULES);
        let mut modules: Vec<Module> = self
            .read("find", MODULES, || async {
                collection
                    .find(doc! { "standardId": standard_id })
                    .sort(doc! { "order": 1 })
                    .await?
                    .try_collect()
                    .await
            })
            .await?;

        for module in &mut modules {
            module.lessons.sort_by_key(|lesson| lesson.order);
        }
        Ok(modules)
    }

    async fn completed_lesson_ids(&self, enrollment_id: &str) -> Result<HashSet<String>> {
        let collection: Collection<LessonProgress> = self.mongo.collection(LESSON_PROGRESS);
        let rows: Vec<LessonProgress> = self
            .read("find", LESSON_PROGRESS, || async {
                collection
                    .find(doc! { "enrollmentId": enrollment_id })
                    .await?
                    .try_collect()
                    .await
            })
            .await?;

        Ok(rows.into_iter().map(|row| row.lesson_id).collect())
    }

    async fn record_lesson_completion(&self, progress: &LessonProgress) -> Result<bool> {
        let collection: Collection<LessonProgress> = self.mongo.collection(LESSON_PROGRESS);
        let filter = doc! {
            "enrollmentId": &progress.enrollment_id,
            "lessonId": &progress.lesson_id,
        };
        let completed_at =
            bson::to_bson(&progress.completed_at).context("Failed to serialize completedAt")?;

        // $setOnInsert keeps the first completion timestamp
        let result = track_db_operation("update_one", LESSON_PROGRESS, async {
            collection
                .update_one(
                    filter,
                    doc! { "$setOnInsert": { "completedAt": completed_at } },
                )
                .upsert(true)
                .await
                .context("Failed to record lesson completion")
        })
        .await?;

        Ok(result.upserted_id.is_some())
    }

    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()> {
        let collection: Collection<ModuleProgress> = self.mongo.collection(MODULE_PROGRESS);
        track_db_operation("replace_one", MODULE_PROGRESS, async {
            collection
                .replace_one(
                    doc! {
                        "enrollmentId": &progress.enrollment_id,
                        "moduleId": &progress.module_id,
                    },
                    progress,
                )
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await
                .context("Failed to save module progress")?;
            Ok(())
        })
        .await
    }

    async fn update_enrollment_progress(
        &self,
        enrollment_id: &str,
        update: &ProgressUpdate,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let collection: Collection<Enrollment> = self.mongo.collection(ENROLLMENTS);
        let mut set = doc! {
            "overallProgress": update.overall_progress as i64,
            "status": update.status.as_str(),
        };
        if let Some(completed_at) = completed_at {
            set.insert(
                "completedAt",
                bson::to_bson(&completed_at).context("Failed to serialize completedAt")?,
            );
        }

        let result = track_db_operation("update_one", ENROLLMENTS, async {
            collection
                .update_one(doc! { "_id": enrollment_id }, doc! { "$set": set })
                .await
                .context("Failed to update enrollment progress")
        })
        .await?;

        if result.matched_count == 0 {
            return Err(anyhow!("Enrollment {} not found for update", enrollment_id));
        }
        Ok(())
    }

    async fn list_documents(&self, enrollment_id: &str) -> Result<Vec<PortfolioDocument>> {
        let collection: Collection<PortfolioDocument> = self.mongo.collection(DOCUMENTS);
        self.read("find", DOCUMENTS, || async {
            collection
                .find(doc! { "enrollmentId": enrollment_id })
                .await?
                .try_collect()
                .await
        })
        .await
    }
}
