use anyhow::{Context, Result};
use backtester::commands::{batch, export_snapshot, run, validate};
use backtester::context::AppContext;
use backtester::jobs::{load_jobs, load_snapshot};
use backtester::BacktestSettings;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Once;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn new(name: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "signal-backtester-{}-{}",
            name,
            std::process::id()
        ));
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn signal_json(symbol: &str, tp3_allocation: u32) -> String {
    format!(
        r#"{{
            "symbol": "{symbol}",
            "entryPrice": 2000,
            "tp1Price": 2100,
            "tp2Price": 2200,
            "tp3Price": 2300,
            "tp1Allocation": 50,
            "tp2Allocation": 25,
            "tp3Allocation": {tp3_allocation},
            "stopLossPrice": 1900,
            "timeframe": "4h",
            "timeframeHours": 16,
            "generatedAt": "2024-07-01T00:00:00Z"
        }}"#
    )
}

fn candles_json(highs: &[f64]) -> String {
    let rows: Vec<String> = highs
        .iter()
        .enumerate()
        .map(|(idx, high)| {
            format!(
                r#"{{ "timestamp": "2024-07-01T{:02}:00:00Z", "open": 2000, "high": {}, "low": 1950, "close": 2000, "volume": 5 }}"#,
                idx * 4,
                high
            )
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

fn jobs_json() -> String {
    format!(
        r#"[
            {{ "id": "eth-win", "signal": {}, "candles": {}, "dataQuality": 100 }},
            {{ "id": "eth-idle", "signal": {}, "candles": {} }},
            {{ "id": "eth-bad", "signal": {}, "candles": {}, "dataQuality": 100 }}
        ]"#,
        signal_json("ETH", 25),
        candles_json(&[2050.0, 2150.0, 2250.0, 2350.0, 2000.0]),
        signal_json("ETH", 25),
        candles_json(&[2010.0, 2020.0, 2030.0, 2040.0, 2050.0]),
        signal_json("ETH", 10),
        candles_json(&[2050.0]),
    )
}

fn app() -> AppContext {
    AppContext::with_settings(BacktestSettings::default())
}

#[tokio::test]
async fn snapshot_export_and_batch_run_agree_with_json_input() -> Result<()> {
    ensure_test_env();
    let scratch = ScratchDir::new("batch")?;
    let json_path = scratch.file("jobs.json");
    let snapshot_path = scratch.file("nested/jobs.bin");
    let output_path = scratch.file("out/results.json");
    fs::write(&json_path, jobs_json())?;

    export_snapshot::run(&json_path, &snapshot_path).await?;
    let from_snapshot = load_snapshot(&snapshot_path)?;
    let from_json = load_jobs(&json_path)?;
    assert_eq!(from_snapshot.len(), 3);
    assert_eq!(
        serde_json::to_value(&from_snapshot)?,
        serde_json::to_value(&from_json)?
    );

    batch::run(&app(), &snapshot_path, Some(output_path.as_path())).await?;
    let rendered = fs::read_to_string(&output_path).context("batch output missing")?;
    let outcomes: Vec<Value> = serde_json::from_str(&rendered)?;
    assert_eq!(outcomes.len(), 3);

    assert_eq!(outcomes[0]["jobId"], "eth-win");
    assert_eq!(outcomes[0]["result"]["status"], "completed_success");
    assert_eq!(outcomes[0]["result"]["profitLossUsd"], 50.0 + 50.0 + 75.0);

    // No upstream score: the candles cover the 16h window at 4h resolution.
    assert_eq!(outcomes[1]["jobId"], "eth-idle");
    assert_eq!(outcomes[1]["result"]["status"], "expired");
    assert_eq!(outcomes[1]["result"]["dataQualityScore"], 100.0);

    assert_eq!(outcomes[2]["result"]["status"], "incomplete_data");
    assert_eq!(
        outcomes[2]["result"]["errorMessage"],
        "Allocations must sum to 100% (got 85%)"
    );
    Ok(())
}

#[tokio::test]
async fn run_command_rejects_multi_job_files_and_writes_single_result() -> Result<()> {
    ensure_test_env();
    let scratch = ScratchDir::new("run")?;
    let many = scratch.file("many.json");
    fs::write(&many, jobs_json())?;
    let err = run::run(&app(), &many, None).await.unwrap_err();
    assert!(err.to_string().contains("use `batch`"), "{err}");

    let single = scratch.file("single.json");
    fs::write(
        &single,
        format!(
            r#"{{ "signal": {}, "candles": {}, "dataQuality": 80 }}"#,
            signal_json("ETH", 25),
            candles_json(&[2120.0, 2000.0])
        ),
    )?;
    let output = scratch.file("single-result.json");
    run::run(&app(), &single, Some(output.as_path())).await?;
    let result: Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert_eq!(result["status"], "completed_success");
    assert_eq!(result["tp1Hit"], true);
    assert_eq!(result["tp2Hit"], false);
    assert!(result["warningMessage"]
        .as_str()
        .unwrap_or_default()
        .contains("Partial fills: TP1 hit"));
    Ok(())
}

#[tokio::test]
async fn validate_command_counts_failures() -> Result<()> {
    ensure_test_env();
    let scratch = ScratchDir::new("validate")?;
    let path = scratch.file("jobs.json");
    fs::write(&path, jobs_json())?;
    let err = validate::run(&app(), &path).await.unwrap_err();
    assert_eq!(err.to_string(), "1 of 3 signal(s) failed validation");

    let missing = scratch.file("missing.json");
    let err = validate::run(&app(), &missing).await.unwrap_err();
    assert!(err.to_string().starts_with("Job file not found"), "{err}");
    Ok(())
}
