use crate::data_quality::assess_data_quality;
use crate::models::{Candle, DataQuality, TradeSignal};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const JOB_SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_EXTENSION: &str = "bin";

/// One backtest request: a signal, the candles fetched for its window and
/// the upstream completeness score when one was computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestJob {
    #[serde(default)]
    pub id: String,
    pub signal: TradeSignal,
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub data_quality: Option<DataQuality>,
}

impl BacktestJob {
    /// Falls back to scoring the candles against the signal window when no
    /// upstream score was supplied.
    pub fn resolved_data_quality(&self) -> DataQuality {
        self.data_quality.unwrap_or_else(|| {
            assess_data_quality(
                &self.candles,
                self.signal.generated_at,
                self.signal.expires_at(),
                self.signal.timeframe,
            )
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobDocument {
    Many(Vec<BacktestJob>),
    One(Box<BacktestJob>),
}

#[derive(Serialize, Deserialize)]
struct JobSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    jobs: Vec<BacktestJob>,
}

/// Loads jobs from a JSON document (one job or an array) or, for `.bin`
/// files, from a binary snapshot.
pub fn load_jobs<P: AsRef<Path>>(path: P) -> Result<Vec<BacktestJob>> {
    let path = path.as_ref();
    let is_snapshot = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(SNAPSHOT_EXTENSION))
        .unwrap_or(false);
    let jobs = if is_snapshot {
        load_snapshot(path)?
    } else {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        parse_jobs_json(&raw)
            .with_context(|| format!("Invalid job file {}", path.display()))?
    };
    Ok(assign_missing_ids(jobs))
}

pub fn parse_jobs_json(raw: &str) -> Result<Vec<BacktestJob>> {
    let document: JobDocument =
        serde_json::from_str(raw).map_err(|error| anyhow!("Invalid job JSON: {}", error))?;
    Ok(match document {
        JobDocument::Many(jobs) => jobs,
        JobDocument::One(job) => vec![*job],
    })
}

pub fn save_snapshot<P: AsRef<Path>>(jobs: &[BacktestJob], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory {}", parent.display())
            })?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Unable to create job snapshot at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let snapshot = JobSnapshot {
        version: JOB_SNAPSHOT_VERSION,
        generated_at: Utc::now(),
        jobs: jobs.to_vec(),
    };
    bincode::serialize_into(&mut writer, &snapshot)
        .context("Failed to serialize job snapshot")?;
    writer
        .flush()
        .context("Failed to flush job snapshot to disk")?;
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<BacktestJob>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open job snapshot at {}", path.display()))?;
    let snapshot: JobSnapshot = bincode::deserialize_from(BufReader::new(file))
        .context("Snapshot decode failed")?;
    if snapshot.version != JOB_SNAPSHOT_VERSION {
        return Err(anyhow!(
            "Job snapshot version mismatch (found {}, expected {})",
            snapshot.version,
            JOB_SNAPSHOT_VERSION
        ));
    }
    Ok(snapshot.jobs)
}

fn assign_missing_ids(jobs: Vec<BacktestJob>) -> Vec<BacktestJob> {
    jobs.into_iter()
        .enumerate()
        .map(|(idx, mut job)| {
            if job.id.trim().is_empty() {
                job.id = format!("{}_{}", job.signal.symbol, idx);
            }
            job
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNAL_JSON: &str = r#"{
        "symbol": "SOL",
        "entryPrice": 100,
        "tp1Price": 105,
        "tp2Price": 110,
        "tp3Price": 120,
        "tp1Allocation": 50,
        "tp2Allocation": 30,
        "tp3Allocation": 20,
        "stopLossPrice": 95,
        "timeframe": "1h",
        "timeframeHours": 4,
        "generatedAt": "2024-05-01T00:00:00Z"
    }"#;

    #[test]
    fn single_job_document_is_accepted() {
        let raw = format!(
            r#"{{ "signal": {}, "candles": [], "dataQuality": 88 }}"#,
            SIGNAL_JSON
        );
        let jobs = parse_jobs_json(&raw).expect("single job parses");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].data_quality, Some(DataQuality::new(88.0)));
    }

    #[test]
    fn job_arrays_get_default_ids_and_assessed_quality() {
        let raw = format!(
            r#"[{{ "id": "keep-me", "signal": {s} }}, {{ "signal": {s}, "candles": [
                {{ "timestamp": "2024-05-01T00:00:00Z", "open": 100, "high": 101, "low": 99, "close": 100 }},
                {{ "timestamp": "2024-05-01T01:00:00Z", "open": 100, "high": 101, "low": 99, "close": 100 }}
            ] }}]"#,
            s = SIGNAL_JSON
        );
        let jobs = assign_missing_ids(parse_jobs_json(&raw).expect("array parses"));
        assert_eq!(jobs[0].id, "keep-me");
        assert_eq!(jobs[1].id, "SOL_1");
        assert_eq!(jobs[1].candles[0].volume, 0.0);
        assert_eq!(jobs[1].resolved_data_quality().score, 50.0);
        assert_eq!(jobs[0].resolved_data_quality().score, 0.0);
    }

    #[test]
    fn malformed_json_reports_context() {
        let err = parse_jobs_json("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid job JSON"), "{err}");
    }
}
