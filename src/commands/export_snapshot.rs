use crate::commands::job_file::load_job_file;
use crate::jobs::save_snapshot;
use anyhow::Result;
use log::info;
use std::path::Path;

pub async fn run(job_file: &Path, output_path: &Path) -> Result<()> {
    info!(
        "Generating job snapshot at {} from {}",
        output_path.display(),
        job_file.display()
    );

    let jobs = load_job_file(job_file).await?;
    save_snapshot(&jobs, output_path)?;
    info!(
        "Job snapshot with {} job(s) successfully written to {}",
        jobs.len(),
        output_path.display()
    );

    Ok(())
}
