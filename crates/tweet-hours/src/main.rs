mod bootstrap;

use anyhow::{Context, Result};
use hours_core::settings::Settings;
use hours_data::pipeline::run_job;

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level)?;
    tracing::info!("tweet-hours v{} starting", env!("CARGO_PKG_VERSION"));

    let job = settings.job_config()?;
    bootstrap::setup_thread_pool(job.threads).context("failed to start worker pool")?;

    let outcome = run_job(&job)
        .with_context(|| format!("job over {} failed", job.input.display()))?;

    tracing::debug!(
        "Finished at {} with {} counted records",
        outcome.summary.generated_at,
        outcome.histogram.total()
    );

    Ok(())
}
