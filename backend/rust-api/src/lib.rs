pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use services::{AppState, AttemptService, GradingService, ProgressService};
