use crate::config::Config;
use crate::store::{AssessmentSource, AttemptStore, EnrollmentReadModel, InMemoryStore, MongoStore};
use mongodb::{bson::doc, Client as MongoClient};
use std::sync::Arc;

/// Shared configuration and store handles the services are built from.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub assessments: Arc<dyn AssessmentSource>,
    pub attempts: Arc<dyn AttemptStore>,
    pub enrollments: Arc<dyn EnrollmentReadModel>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Checking MongoDB connection...");

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            mongo.run_command(doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;

        tracing::info!("MongoDB connection established: {}", config.mongo_database);

        let store = Arc::new(MongoStore::new(mongo));
        Ok(Self::with_stores(config, store.clone(), store.clone(), store))
    }

    pub fn with_stores(
        config: Config,
        assessments: Arc<dyn AssessmentSource>,
        attempts: Arc<dyn AttemptStore>,
        enrollments: Arc<dyn EnrollmentReadModel>,
    ) -> Self {
        Self {
            config,
            assessments,
            attempts,
            enrollments,
        }
    }

    pub fn in_memory(config: Config, store: Arc<InMemoryStore>) -> Self {
        Self::with_stores(config, store.clone(), store.clone(), store)
    }
}

pub mod attempt_service;
pub mod grading_service;
pub mod progress_service;
pub mod question_handlers;

pub use attempt_service::AttemptService;
pub use grading_service::{GradingOutcome, GradingService};
pub use progress_service::ProgressService;
