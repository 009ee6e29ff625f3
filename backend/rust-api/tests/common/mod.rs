#![allow(dead_code)]

use chrono::Utc;
use competency_api::{
    config::Config,
    models::{
        Assessment, AssessmentDocument, DocumentStatus, Enrollment, EnrollmentStatus, Lesson,
        LessonKind, Module, PortfolioDocument, StoredQuestion,
    },
    services::AppState,
    store::InMemoryStore,
    AttemptService, ProgressService,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const STANDARD_ID: &str = "std-fire-safety";
pub const OTHER_STANDARD_ID: &str = "std-first-aid";

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub attempts: AttemptService,
    pub progress: ProgressService,
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(InMemoryStore::new());
    let state = AppState::in_memory(Config::default(), store.clone());

    TestApp {
        store,
        attempts: AttemptService::new(&state),
        progress: ProgressService::new(&state),
    }
}

pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub fn enrollment(standard_id: &str) -> Enrollment {
    Enrollment {
        id: unique_id("enr"),
        user_id: unique_id("user"),
        standard_id: standard_id.to_string(),
        status: EnrollmentStatus::InProgress,
        overall_progress: 0,
        enrolled_at: Utc::now(),
        completed_at: None,
    }
}

pub struct AssessmentSpec {
    pub allowed_attempts: u32,
    pub time_limit: Option<u64>,
    pub show_results: bool,
    pub passing_score: u32,
}

impl Default for AssessmentSpec {
    fn default() -> Self {
        Self {
            allowed_attempts: 3,
            time_limit: None,
            show_results: true,
            passing_score: 70,
        }
    }
}

/// Two 10-point true/false questions, `q1` and `q2`, both answered `true`.
/// Built from the stored document shape so the question payloads are parsed
/// the same way as a database load.
pub fn true_false_assessment(standard_id: &str, spec: AssessmentSpec) -> Assessment {
    let question = |id: &str| StoredQuestion {
        id: id.to_string(),
        question_type: "TRUE_FALSE".to_string(),
        points: None,
        payload: json!({ "correctAnswer": true }),
        explanation: Some(format!("{} is true", id)),
    };

    Assessment::from(AssessmentDocument {
        id: unique_id("as"),
        standard_id: standard_id.to_string(),
        title: "Evacuation basics".to_string(),
        questions: vec![question("q1"), question("q2")],
        passing_score: spec.passing_score,
        allowed_attempts: spec.allowed_attempts,
        time_limit: spec.time_limit,
        show_results: spec.show_results,
    })
}

pub fn module(
    standard_id: &str,
    id: &str,
    order: u32,
    estimated_minutes: u32,
    lessons: &[(&str, LessonKind)],
) -> Module {
    Module {
        id: id.to_string(),
        standard_id: standard_id.to_string(),
        title: format!("Module {}", id),
        order,
        estimated_minutes,
        lessons: lessons
            .iter()
            .enumerate()
            .map(|(i, (lesson_id, kind))| Lesson {
                id: lesson_id.to_string(),
                title: format!("Lesson {}", lesson_id),
                kind: *kind,
                order: i as u32 + 1,
            })
            .collect(),
    }
}

pub fn document(enrollment_id: &str, template_code: &str, status: DocumentStatus) -> PortfolioDocument {
    PortfolioDocument {
        id: unique_id("doc"),
        enrollment_id: enrollment_id.to_string(),
        template_code: template_code.to_string(),
        status,
    }
}

/// Seeds an enrollment plus a matching assessment and returns both.
pub async fn seed_enrollment_with_assessment(
    app: &TestApp,
    spec: AssessmentSpec,
) -> (Enrollment, Assessment) {
    let enrollment = enrollment(STANDARD_ID);
    let assessment = true_false_assessment(STANDARD_ID, spec);
    app.store.insert_enrollment(enrollment.clone()).await;
    app.store.insert_assessment(assessment.clone()).await;
    (enrollment, assessment)
}
