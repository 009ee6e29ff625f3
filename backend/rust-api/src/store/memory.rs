use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{AssessmentSource, AttemptFilter, AttemptStore, EnrollmentReadModel};
use crate::models::{
    Assessment, Attempt, AttemptStatus, Enrollment, LessonProgress, Module, ModuleProgress, PortfolioDocument,
    ProgressUpdate,
};

#[derive(Default)]
struct State {
    assessments: HashMap<String, Assessment>,
    // Keyed by v7 id, so iteration order is creation order.
    attempts: BTreeMap<String, Attempt>,
    enrollments: HashMap<String, Enrollment>,
    modules: Vec<Module>,
    lesson_progress: HashMap<(String, String), LessonProgress>,
    module_progress: HashMap<(String, String), ModuleProgress>,
    documents: Vec<PortfolioDocument>,
}

/// Process-local store implementing every store trait. Used by tests and by
/// embedders that do not need durable storage.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_assessment(&self, assessment: Assessment) {
        let mut state = self.state.write().await;
        state.assessments.insert(assessment.id.clone(), assessment);
    }

    pub async fn insert_enrollment(&self, enrollment: Enrollment) {
        let mut state = self.state.write().await;
        state.enrollments.insert(enrollment.id.clone(), enrollment);
    }

    pub async fn insert_module(&self, module: Module) {
        let mut state = self.state.write().await;
        state.modules.push(module);
    }

    pub async fn insert_document(&self, document: PortfolioDocument) {
        let mut state = self.state.write().await;
        state.documents.push(document);
    }

    /// Stores an attempt as-is, bypassing the lifecycle rules.
    pub async fn insert_attempt(&self, attempt: Attempt) {
        let mut state = self.state.write().await;
        state.attempts.insert(attempt.id.clone(), attempt);
    }

    pub async fn module_progress(
        &self,
        enrollment_id: &str,
        module_id: &str,
    ) -> Option<ModuleProgress> {
        let state = self.state.read().await;
        state
            .module_progress
            .get(&(enrollment_id.to_string(), module_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl AssessmentSource for InMemoryStore {
    async fn get_assessment(&self, assessment_id: &str) -> Result<Option<Assessment>> {
        let state = self.state.read().await;
        Ok(state.assessments.get(assessment_id).cloned())
    }

    async fn list_assessment_ids(&self, standard_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .assessments
            .values()
            .filter(|a| a.standard_id == standard_id)
            .map(|a| a.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl AttemptStore for InMemoryStore {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<()> {
        let mut state = self.state.write().await;
        if state.attempts.contains_key(&attempt.id) {
            return Err(anyhow!("Attempt {} already exists", attempt.id));
        }
        state.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>> {
        let state = self.state.read().await;
        Ok(state.attempts.get(attempt_id).cloned())
    }

    async fn update_open_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.status == AttemptStatus::InProgress => {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_attempts(&self, filter: &AttemptFilter) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.attempts.values().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn find_first_attempt(&self, filter: &AttemptFilter) -> Result<Option<Attempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .rev()
            .find(|a| filter.matches(a))
            .cloned())
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .rev()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentReadModel for InMemoryStore {
    async fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>> {
        let state = self.state.read().await;
        Ok(state.enrollments.get(enrollment_id).cloned())
    }

    async fn list_modules(&self, standard_id: &str) -> Result<Vec<Module>> {
        let state = self.state.read().await;
        let mut modules: Vec<Module> = state
            .modules
            .iter()
            .filter(|m| m.standard_id == standard_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order);
        for module in &mut modules {
            module.lessons.sort_by_key(|lesson| lesson.order);
        }
        Ok(modules)
    }

    async fn completed_lesson_ids(&self, enrollment_id: &str) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .lesson_progress
            .values()
            .filter(|p| p.enrollment_id == enrollment_id)
            .map(|p| p.lesson_id.clone())
            .collect())
    }

    async fn record_lesson_completion(&self, progress: &LessonProgress) -> Result<bool> {
        let mut state = self.state.write().await;
        let key = (progress.enrollment_id.clone(), progress.lesson_id.clone());
        if state.lesson_progress.contains_key(&key) {
            return Ok(false);
        }
        state.lesson_progress.insert(key, progress.clone());
        Ok(true)
    }

    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()> {
        let mut state = self.state.write().await;
        state.module_progress.insert(
            (progress.enrollment_id.clone(), progress.module_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    async fn update_enrollment_progress(
        &self,
        enrollment_id: &str,
        update: &ProgressUpdate,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let enrollment = state
            .enrollments
            .get_mut(enrollment_id)
            .ok_or_else(|| anyhow!("Enrollment {} not found for update", enrollment_id))?;

        enrollment.overall_progress = update.overall_progress;
        enrollment.status = update.status;
        if completed_at.is_some() {
            enrollment.completed_at = completed_at;
        }
        Ok(())
    }

    async fn list_documents(&self, enrollment_id: &str) -> Result<Vec<PortfolioDocument>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }
}
