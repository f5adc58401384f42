use crate::config::BacktestSettings;
use crate::data_quality::{detect_gap, minutes, DataGap};
use crate::events::{BacktestEvent, BacktestObserver, LogObserver};
use crate::models::{
    BacktestResult, BacktestStatus, Candle, DataQuality, TakeProfit, TargetLevel, TradeSignal,
};
use crate::validation::validate_with;
use chrono::{DateTime, Utc};
use log::debug;

/// Where the chronological scan stands. Every state other than `Scanning`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    StoppedOut { at: DateTime<Utc> },
    TargetsExhausted { at: DateTime<Utc> },
    WindowClosed,
    DataExhausted { last_candle_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
struct Tranche {
    target: TakeProfit,
    hit_at: Option<DateTime<Utc>>,
}

/// Running accounting for one trade. Prices are per unit, so P/L is in
/// dollars per unit of the underlying.
struct TradeLedger<'a> {
    signal: &'a TradeSignal,
    tranches: [Tranche; 3],
    stop_loss_at: Option<DateTime<Utc>>,
    remaining_allocation: f64,
    profit_loss_usd: f64,
}

impl<'a> TradeLedger<'a> {
    fn new(signal: &'a TradeSignal) -> Self {
        let tranches = signal.take_profits().map(|target| Tranche {
            target,
            hit_at: None,
        });
        Self {
            signal,
            tranches,
            stop_loss_at: None,
            remaining_allocation: 100.0,
            profit_loss_usd: 0.0,
        }
    }

    /// Applies one in-window candle. The stop loss is checked before any
    /// target so a candle touching both closes the trade at the stop.
    fn apply(&mut self, candle: &Candle, observer: &mut dyn BacktestObserver) -> ScanState {
        let signal = self.signal;

        if self.stop_loss_at.is_none() && candle.low <= signal.stop_loss_price {
            let loss = (signal.stop_loss_price - signal.entry_price)
                * (self.remaining_allocation / 100.0);
            self.profit_loss_usd += loss;
            self.stop_loss_at = Some(candle.timestamp);
            observer.on_event(&BacktestEvent::StopLossHit {
                symbol: signal.symbol.clone(),
                at: candle.timestamp,
                price: signal.stop_loss_price,
                loss_usd: loss,
                closed_allocation: self.remaining_allocation,
            });
            return ScanState::StoppedOut {
                at: candle.timestamp,
            };
        }

        for tranche in self.tranches.iter_mut() {
            if tranche.hit_at.is_some() || candle.high < tranche.target.price {
                continue;
            }
            let target = tranche.target;
            let profit = (target.price - signal.entry_price) * (target.allocation / 100.0);
            self.profit_loss_usd += profit;
            self.remaining_allocation -= target.allocation;
            tranche.hit_at = Some(candle.timestamp);
            observer.on_event(&BacktestEvent::TargetHit {
                symbol: signal.symbol.clone(),
                level: target.level,
                at: candle.timestamp,
                price: target.price,
                profit_usd: profit,
            });
            if target.level == TargetLevel::Tp3 {
                return ScanState::TargetsExhausted {
                    at: candle.timestamp,
                };
            }
        }

        ScanState::Scanning
    }

    fn hit_at(&self, level: TargetLevel) -> Option<DateTime<Utc>> {
        self.tranches[level.index()].hit_at
    }

    fn hit_levels(&self) -> Vec<TargetLevel> {
        self.tranches
            .iter()
            .filter(|tranche| tranche.hit_at.is_some())
            .map(|tranche| tranche.target.level)
            .collect()
    }
}

/// Backtests `signal` against `candles` with default settings, logging
/// diagnostics through the `log` facade.
pub fn run_backtest(
    signal: &TradeSignal,
    candles: &[Candle],
    data_quality: DataQuality,
) -> BacktestResult {
    run_backtest_with(
        signal,
        candles,
        data_quality,
        &BacktestSettings::default(),
        &mut LogObserver,
    )
}

/// Total over its inputs: every failure is reported through the returned
/// result's status and messages.
pub fn run_backtest_with(
    signal: &TradeSignal,
    candles: &[Candle],
    data_quality: DataQuality,
    settings: &BacktestSettings,
    observer: &mut dyn BacktestObserver,
) -> BacktestResult {
    if let Err(error) = validate_with(signal, settings) {
        let message = error.to_string();
        observer.on_event(&BacktestEvent::ValidationFailed {
            symbol: signal.symbol.clone(),
            error,
        });
        return finish(signal, BacktestResult::incomplete(message, 0.0), observer);
    }
    observer.on_event(&BacktestEvent::ValidationPassed {
        symbol: signal.symbol.clone(),
    });

    if candles.is_empty() {
        let reason = format!("No historical price data available for {}", signal.symbol);
        return reject(signal, reason, 0.0, observer);
    }

    if !data_quality.passes(settings.min_data_quality) {
        let reason = format!(
            "Insufficient data quality: {}% (minimum {}% required)",
            data_quality.score, settings.min_data_quality
        );
        return reject(signal, reason, data_quality.score, observer);
    }

    let expiry = signal.expires_at();
    let mut ledger = TradeLedger::new(signal);
    let mut gaps: Vec<DataGap> = Vec::new();
    let mut previous: Option<&Candle> = None;
    let mut skipped_before_window = 0usize;
    let mut state = ScanState::Scanning;

    for candle in candles {
        if candle.timestamp < signal.generated_at {
            skipped_before_window += 1;
            continue;
        }
        if candle.timestamp > expiry {
            state = ScanState::WindowClosed;
            break;
        }

        if let Some(prev) = previous {
            if let Some(gap) = detect_gap(prev, candle, signal.timeframe, settings.gap_multiplier)
            {
                observer.on_event(&BacktestEvent::GapDetected {
                    symbol: signal.symbol.clone(),
                    gap: gap.clone(),
                });
                gaps.push(gap);
            }
        }
        previous = Some(candle);

        state = ledger.apply(candle, observer);
        if state != ScanState::Scanning {
            break;
        }
    }

    if skipped_before_window > 0 {
        debug!(
            "Skipped {} candle(s) for {} dated before the signal was generated",
            skipped_before_window, signal.symbol
        );
    }

    if state == ScanState::Scanning {
        // With no processed candle every candle predated the window.
        state = ScanState::DataExhausted {
            last_candle_at: previous.map_or(expiry, |candle| candle.timestamp),
        };
    }
    if state == ScanState::WindowClosed {
        observer.on_event(&BacktestEvent::WindowClosed {
            symbol: signal.symbol.clone(),
            expired_at: expiry,
        });
    }

    let result = settle(signal, &ledger, state, expiry, &gaps, data_quality);
    finish(signal, result, observer)
}

fn settle(
    signal: &TradeSignal,
    ledger: &TradeLedger<'_>,
    state: ScanState,
    expiry: DateTime<Utc>,
    gaps: &[DataGap],
    data_quality: DataQuality,
) -> BacktestResult {
    let final_event_at = match state {
        ScanState::StoppedOut { at } | ScanState::TargetsExhausted { at } => at,
        ScanState::WindowClosed => expiry,
        ScanState::DataExhausted { last_candle_at } => last_candle_at,
        ScanState::Scanning => expiry,
    };
    let trade_duration_minutes = minutes(final_event_at - signal.generated_at);

    let mut warnings = Vec::new();
    if let Some(gap_warning) = summarize_gaps(gaps) {
        warnings.push(gap_warning);
    }

    let hit_levels = ledger.hit_levels();
    let status = if ledger.stop_loss_at.is_some() {
        BacktestStatus::CompletedFailure
    } else if hit_levels.len() == TargetLevel::ALL.len() {
        BacktestStatus::CompletedSuccess
    } else if !hit_levels.is_empty() {
        let labels: Vec<&str> = hit_levels.iter().map(|level| level.label()).collect();
        let ended = match state {
            ScanState::DataExhausted { .. } => "when price data ran out",
            _ => "at window end",
        };
        warnings.push(format!(
            "Partial fills: {} hit ({}% of position still open {})",
            labels.join(", "),
            ledger.remaining_allocation,
            ended
        ));
        BacktestStatus::CompletedSuccess
    } else {
        warnings.push(format!(
            "Expired after {} minutes without hitting any targets",
            trade_duration_minutes
        ));
        BacktestStatus::Expired
    };

    let profit_loss_usd = ledger.profit_loss_usd;
    BacktestResult {
        status,
        tp1_hit: ledger.hit_at(TargetLevel::Tp1).is_some(),
        tp1_hit_at: ledger.hit_at(TargetLevel::Tp1),
        tp2_hit: ledger.hit_at(TargetLevel::Tp2).is_some(),
        tp2_hit_at: ledger.hit_at(TargetLevel::Tp2),
        tp3_hit: ledger.hit_at(TargetLevel::Tp3).is_some(),
        tp3_hit_at: ledger.hit_at(TargetLevel::Tp3),
        stop_loss_hit: ledger.stop_loss_at.is_some(),
        stop_loss_hit_at: ledger.stop_loss_at,
        profit_loss_usd,
        profit_loss_percentage: profit_loss_usd / signal.entry_price * 100.0,
        trade_duration_minutes,
        data_quality_score: data_quality.score,
        remaining_allocation: ledger.remaining_allocation,
        error_message: None,
        warning_message: if warnings.is_empty() {
            None
        } else {
            Some(warnings.join("; "))
        },
    }
}

fn summarize_gaps(gaps: &[DataGap]) -> Option<String> {
    match gaps {
        [] => None,
        [gap] => Some(gap.describe()),
        _ => {
            let largest = gaps
                .iter()
                .max_by(|a, b| a.gap_minutes.total_cmp(&b.gap_minutes))?;
            Some(format!(
                "{} data gaps detected; largest {}",
                gaps.len(),
                largest.describe()
            ))
        }
    }
}

fn reject(
    signal: &TradeSignal,
    reason: String,
    data_quality_score: f64,
    observer: &mut dyn BacktestObserver,
) -> BacktestResult {
    observer.on_event(&BacktestEvent::DataRejected {
        symbol: signal.symbol.clone(),
        reason: reason.clone(),
    });
    finish(
        signal,
        BacktestResult::incomplete(reason, data_quality_score),
        observer,
    )
}

fn finish(
    signal: &TradeSignal,
    result: BacktestResult,
    observer: &mut dyn BacktestObserver,
) -> BacktestResult {
    observer.on_event(&BacktestEvent::Finished {
        symbol: signal.symbol.clone(),
        status: result.status,
        profit_loss_usd: result.profit_loss_usd,
    });
    result
}
