use crate::config::BacktestSettings;
use crate::evaluator::run_backtest_with;
use crate::events::LogObserver;
use crate::jobs::BacktestJob;
use crate::models::{BacktestResult, BacktestStatus};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub job_id: String,
    pub symbol: String,
    pub result: BacktestResult,
}

/// Per-status counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub completed_success: usize,
    pub completed_failure: usize,
    pub expired: usize,
    pub incomplete_data: usize,
}

impl StatusCounts {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.result.status {
                BacktestStatus::CompletedSuccess => counts.completed_success += 1,
                BacktestStatus::CompletedFailure => counts.completed_failure += 1,
                BacktestStatus::Expired => counts.expired += 1,
                BacktestStatus::IncompleteData => counts.incomplete_data += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.completed_success + self.completed_failure + self.expired + self.incomplete_data
    }
}

/// Runs every job on the rayon pool. Jobs share nothing, so outcomes are
/// identical to sequential runs and come back in input order.
pub fn run_batch(
    jobs: &[BacktestJob],
    settings: &BacktestSettings,
    progress: Option<&ProgressBar>,
) -> Vec<BatchOutcome> {
    jobs.par_iter()
        .map(|job| {
            let result = run_backtest_with(
                &job.signal,
                &job.candles,
                job.resolved_data_quality(),
                settings,
                &mut LogObserver,
            );
            if let Some(pb) = progress {
                pb.inc(1);
            }
            BatchOutcome {
                job_id: job.id.clone(),
                symbol: job.signal.symbol.clone(),
                result,
            }
        })
        .collect()
}
