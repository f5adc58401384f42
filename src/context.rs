use crate::config::BacktestSettings;
use anyhow::{Context, Result};
use log::{debug, info};

/// Process-wide state handed to every command.
#[derive(Clone, Debug)]
pub struct AppContext {
    settings: BacktestSettings,
}

impl AppContext {
    /// Reads `BACKTEST_*` settings from the environment, after merging a
    /// `.env` file when one is present.
    pub fn initialize() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment overrides from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err).context("Failed to read .env file"),
        }
        let settings = BacktestSettings::from_env().context("Invalid backtest settings")?;
        info!(
            "Backtest settings: minimum data quality {}%, allocation tolerance {}, gap multiplier {}x",
            settings.min_data_quality, settings.allocation_tolerance, settings.gap_multiplier
        );
        Ok(Self { settings })
    }

    pub fn with_settings(settings: BacktestSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }
}
