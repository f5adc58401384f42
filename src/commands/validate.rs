use crate::commands::job_file::load_job_file;
use crate::context::AppContext;
use crate::validation::validate_with;
use anyhow::{anyhow, Result};
use log::{info, warn};
use std::path::Path;

pub async fn run(app: &AppContext, job_file: &Path) -> Result<()> {
    let jobs = load_job_file(job_file).await?;
    let mut failures = 0usize;
    for job in &jobs {
        match validate_with(&job.signal, app.settings()) {
            Ok(()) => info!("{} ({}): valid", job.id, job.signal.symbol),
            Err(err) => {
                failures += 1;
                warn!("{} ({}): {}", job.id, job.signal.symbol, err);
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} signal(s) failed validation",
            failures,
            jobs.len()
        ));
    }
    info!("All {} signal(s) passed validation", jobs.len());
    Ok(())
}
