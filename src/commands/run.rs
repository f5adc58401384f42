use crate::commands::job_file::{load_job_file, write_json};
use crate::context::AppContext;
use crate::evaluator::run_backtest_with;
use crate::events::LogObserver;
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, job_file: &Path, output: Option<&Path>) -> Result<()> {
    let mut jobs = load_job_file(job_file).await?;
    if jobs.len() != 1 {
        return Err(anyhow!(
            "{} holds {} jobs; use `batch` to backtest more than one signal",
            job_file.display(),
            jobs.len()
        ));
    }
    let job = jobs.remove(0);
    let data_quality = job.resolved_data_quality();
    info!(
        "Backtesting {} ({} candle(s), data quality {}%)",
        job.signal.symbol,
        job.candles.len(),
        data_quality.score
    );

    let result = run_backtest_with(
        &job.signal,
        &job.candles,
        data_quality,
        app.settings(),
        &mut LogObserver,
    );
    write_json(&result, output).await
}
