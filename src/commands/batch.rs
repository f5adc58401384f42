use crate::batch::{run_batch, StatusCounts};
use crate::commands::job_file::{load_job_file, write_json};
use crate::context::AppContext;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::Path;
use std::time::Instant;

pub async fn run(app: &AppContext, job_file: &Path, output: Option<&Path>) -> Result<()> {
    let jobs = load_job_file(job_file).await?;
    info!(
        "Running {} backtest(s) from {} on {} thread(s)",
        jobs.len(),
        job_file.display(),
        rayon::current_num_threads()
    );

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let started = Instant::now();
    let settings = *app.settings();
    let progress = pb.clone();
    let outcomes =
        tokio::task::spawn_blocking(move || run_batch(&jobs, &settings, Some(&progress))).await?;
    pb.finish_with_message("Backtesting completed");

    let counts = StatusCounts::from_outcomes(&outcomes);
    info!(
        "Completed {} backtest(s) in {:.2}s: {} success, {} failure, {} expired, {} incomplete",
        counts.total(),
        started.elapsed().as_secs_f64(),
        counts.completed_success,
        counts.completed_failure,
        counts.expired,
        counts.incomplete_data
    );

    write_json(&outcomes, output).await
}
