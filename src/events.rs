use crate::data_quality::DataGap;
use crate::models::{BacktestStatus, TargetLevel};
use crate::validation::ValidationError;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

/// Diagnostic emitted while a backtest runs. Observers see events in the
/// order they happen; they never influence the result.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestEvent {
    ValidationPassed {
        symbol: String,
    },
    ValidationFailed {
        symbol: String,
        error: ValidationError,
    },
    DataRejected {
        symbol: String,
        reason: String,
    },
    GapDetected {
        symbol: String,
        gap: DataGap,
    },
    StopLossHit {
        symbol: String,
        at: DateTime<Utc>,
        price: f64,
        loss_usd: f64,
        closed_allocation: f64,
    },
    TargetHit {
        symbol: String,
        level: TargetLevel,
        at: DateTime<Utc>,
        price: f64,
        profit_usd: f64,
    },
    WindowClosed {
        symbol: String,
        expired_at: DateTime<Utc>,
    },
    Finished {
        symbol: String,
        status: BacktestStatus,
        profit_loss_usd: f64,
    },
}

pub trait BacktestObserver {
    fn on_event(&mut self, event: &BacktestEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl BacktestObserver for LogObserver {
    fn on_event(&mut self, event: &BacktestEvent) {
        match event {
            BacktestEvent::ValidationPassed { symbol } => {
                info!("Trade signal for {} passed validation", symbol);
            }
            BacktestEvent::ValidationFailed { symbol, error } => {
                error!("Trade signal for {} failed validation: {}", symbol, error);
            }
            BacktestEvent::DataRejected { symbol, reason } => {
                error!("Backtest for {} aborted: {}", symbol, reason);
            }
            BacktestEvent::GapDetected { symbol, gap } => {
                warn!("{}: {}", symbol, gap.describe());
            }
            BacktestEvent::StopLossHit {
                symbol,
                at,
                price,
                loss_usd,
                closed_allocation,
            } => {
                info!(
                    "{} stop loss hit at {} ({}): closed {}% for ${:.2}",
                    symbol,
                    at.to_rfc3339(),
                    price,
                    closed_allocation,
                    loss_usd
                );
            }
            BacktestEvent::TargetHit {
                symbol,
                level,
                at,
                price,
                profit_usd,
            } => {
                info!(
                    "{} {} hit at {} ({}): +${:.2}",
                    symbol,
                    level,
                    at.to_rfc3339(),
                    price,
                    profit_usd
                );
            }
            BacktestEvent::WindowClosed { symbol, expired_at } => {
                debug!(
                    "{} trade window closed at {}",
                    symbol,
                    expired_at.to_rfc3339()
                );
            }
            BacktestEvent::Finished {
                symbol,
                status,
                profit_loss_usd,
            } => {
                info!(
                    "Backtest for {} finished: {} (P/L ${:.2})",
                    symbol, status, profit_loss_usd
                );
            }
        }
    }
}

/// Keeps every event so callers can store or render the trail.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Vec<BacktestEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[BacktestEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<BacktestEvent> {
        self.events
    }
}

impl BacktestObserver for EventRecorder {
    fn on_event(&mut self, event: &BacktestEvent) {
        self.events.push(event.clone());
    }
}
