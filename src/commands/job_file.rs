use crate::jobs::{load_jobs, BacktestJob};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::fs;

pub async fn ensure_job_file(path: &Path) -> Result<()> {
    if fs::metadata(path).await.is_ok() {
        return Ok(());
    }

    Err(anyhow!(
        "Job file not found at {}. Provide a JSON job file or a snapshot produced by `export-snapshot`.",
        path.display()
    ))
}

pub async fn load_job_file(path: &Path) -> Result<Vec<BacktestJob>> {
    ensure_job_file(path).await?;
    let owned = path.to_path_buf();
    let jobs = tokio::task::spawn_blocking(move || load_jobs(&owned))
        .await
        .context("Job loading task panicked")??;
    if jobs.is_empty() {
        return Err(anyhow!("Job file {} contains no jobs", path.display()));
    }
    Ok(jobs)
}

/// Writes pretty JSON to `output`, or to stdout when no path is given.
pub async fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await.with_context(|| {
                        format!("Failed to create output directory {}", parent.display())
                    })?;
                }
            }
            fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
