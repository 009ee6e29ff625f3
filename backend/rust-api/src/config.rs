use serde::Deserialize;
use std::env;

/// Certification readiness thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgressPolicy {
    pub assessment_pass_ratio: f64,
    pub document_completion_ratio: f64,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            assessment_pass_ratio: 0.8,
            document_completion_ratio: 0.8,
        }
    }
}

/// Grading thresholds shared by the question handlers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GradingPolicy {
    pub short_answer_threshold: f64,
    pub essay_pass_ratio: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            short_answer_threshold: 0.7,
            essay_pass_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub progress: ProgressPolicy,
    pub grading: GradingPolicy,
    /// Dump Prometheus text to stdout when a batch run exits.
    pub print_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "competency".to_string(),
            progress: ProgressPolicy::default(),
            grading: GradingPolicy::default(),
            print_metrics: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__ overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let progress_defaults = defaults.progress;
        let progress = ProgressPolicy {
            assessment_pass_ratio: read_ratio(
                &settings,
                "progress.assessment_pass_ratio",
                progress_defaults.assessment_pass_ratio,
            )?,
            document_completion_ratio: read_ratio(
                &settings,
                "progress.document_completion_ratio",
                progress_defaults.document_completion_ratio,
            )?,
        };

        let grading_defaults = defaults.grading;
        let grading = GradingPolicy {
            short_answer_threshold: read_ratio(
                &settings,
                "grading.short_answer_threshold",
                grading_defaults.short_answer_threshold,
            )?,
            essay_pass_ratio: read_ratio(
                &settings,
                "grading.essay_pass_ratio",
                grading_defaults.essay_pass_ratio,
            )?,
        };

        let print_metrics = match settings.get_bool("metrics.print") {
            Ok(value) => value,
            Err(config::ConfigError::NotFound(_)) => env::var("PRINT_METRICS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.print_metrics),
            Err(e) => return Err(e),
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            progress,
            grading,
            print_metrics,
        })
    }
}

fn read_ratio(
    settings: &config::Config,
    key: &str,
    default: f64,
) -> Result<f64, config::ConfigError> {
    let value = match settings.get_float(key) {
        Ok(value) => value,
        Err(config::ConfigError::NotFound(_)) => return Ok(default),
        Err(e) => return Err(e),
    };

    if !(0.0..=1.0).contains(&value) {
        return Err(config::ConfigError::Message(format!(
            "{} must be between 0 and 1, got {}",
            key, value
        )));
    }
    Ok(value)
}
