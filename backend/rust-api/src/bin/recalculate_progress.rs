use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use competency_api::{config::Config, metrics::render_metrics, services::AppState, ProgressService};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "competency_api=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Recomputes stored progress for the enrollment ids given as arguments.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let enrollment_ids: Vec<String> = std::env::args().skip(1).collect();
    if enrollment_ids.is_empty() {
        bail!("usage: recalculate-progress <enrollment-id>...");
    }

    let config = Config::load().context("Failed to load configuration")?;
    let print_metrics = config.print_metrics;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;

    let app_state = AppState::new(config, mongo_client)
        .await
        .context("Failed to initialize app state")?;

    let progress = ProgressService::new(&app_state);

    let mut failures = 0usize;
    for enrollment_id in &enrollment_ids {
        match progress.recalculate_progress(enrollment_id).await {
            Ok(update) => tracing::info!(
                "{}: {}% ({})",
                enrollment_id,
                update.overall_progress,
                update.status.as_str()
            ),
            Err(e) => {
                failures += 1;
                tracing::error!("{}: recalculation failed [{}]: {}", enrollment_id, e.code(), e);
            }
        }
    }

    if print_metrics {
        let rendered = render_metrics().context("Failed to render metrics")?;
        print!("{}", rendered);
    }

    if failures > 0 {
        bail!(
            "{} of {} enrollments failed to recalculate",
            failures,
            enrollment_ids.len()
        );
    }

    Ok(())
}
