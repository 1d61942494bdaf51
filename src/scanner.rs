//! Scan orchestration
//!
//! One rayon task per symbol: fetch, validate, compute indicators, evaluate
//! every trade day in range. Tasks share nothing mutable; their outputs are
//! concatenated after the join and then totally ordered, so the report does
//! not depend on worker count or completion order.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    evaluator::{PatternEvaluator, SignalResult},
    indicators::{IndicatorFrame, ADV_PERIOD, WARMUP_BARS},
    params::{ScanParameters, SortOrder},
    report::ScanSummary,
    source::{BarSource, FetchError},
    validate_series, Result, ScanError, OHLCV,
};

pub const DEFAULT_WORKERS: usize = 8;

/// Fewer bars than this and a symbol is skipped as insufficient data
pub const MIN_BARS: usize = ADV_PERIOD + 2;

/// Calendar-day slack for weekends and market holidays
const LEAD_IN_PAD_DAYS: u64 = 10;

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`Scanner`]. All configuration is checked in
/// [`ScannerBuilder::build`], before any bar is fetched.
pub struct ScannerBuilder<S: BarSource> {
    source: S,
    params: ScanParameters,
    workers: usize,
    range: Option<(NaiveDate, NaiveDate)>,
}

impl<S: BarSource> ScannerBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            params: ScanParameters::default(),
            workers: DEFAULT_WORKERS,
            range: None,
        }
    }

    pub fn params(mut self, params: ScanParameters) -> Self {
        self.params = params;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Trade days to evaluate, inclusive on both ends
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn build(self) -> Result<Scanner<S>> {
        let evaluator = PatternEvaluator::new(self.params)?;
        if self.workers == 0 {
            return Err(ScanError::InvalidConfig("workers must be > 0".into()));
        }
        let (start, end) = self
            .range
            .ok_or_else(|| ScanError::InvalidConfig("date range not set".into()))?;
        if start > end {
            return Err(ScanError::InvalidConfig(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Scanner {
            source: self.source,
            evaluator,
            workers: self.workers,
            start,
            end,
        })
    }
}

// ============================================================
// SCANNER
// ============================================================

/// A symbol dropped from the scan because its bars could not be used
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: ScanError,
}

/// Everything a run produced
#[derive(Debug)]
pub struct ScanReport {
    /// Sorted date descending, then by the preset's secondary key
    pub signals: Vec<SignalResult>,
    pub summary: ScanSummary,
    pub failures: Vec<SymbolFailure>,
    /// Symbols with too little history to evaluate
    pub skipped_insufficient: Vec<String>,
}

impl ScanReport {
    /// True when the scan ran but nothing qualified
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

pub struct Scanner<S: BarSource> {
    source: S,
    evaluator: PatternEvaluator,
    workers: usize,
    start: NaiveDate,
    end: NaiveDate,
}

impl<S: BarSource> Scanner<S> {
    pub fn params(&self) -> &ScanParameters {
        self.evaluator.params()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    /// Calendar days fetched before `start` so that indicators and the
    /// position window are defined from the first trade day on.
    pub fn lead_in_days(&self) -> u64 {
        let p = self.params();
        // trading days -> calendar days
        let warmup = (WARMUP_BARS as u64 * 7).div_ceil(5) + LEAD_IN_PAD_DAYS;
        let window = u64::from(p.abs_lookback_days.get()) + u64::from(p.abs_exclude_days);
        warmup.max(window) + LEAD_IN_PAD_DAYS
    }

    /// Scan every symbol of `universe` on the worker pool.
    ///
    /// Duplicate symbols are scanned once. Per-symbol fetch and data
    /// problems end up in the report; only configuration problems fail the
    /// whole run.
    pub fn run<Sym: AsRef<str> + Sync>(&self, universe: &[Sym]) -> Result<ScanReport> {
        let mut seen = HashSet::new();
        let symbols: Vec<&str> = universe
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty() && seen.insert(*s))
            .collect();
        if symbols.is_empty() {
            return Err(ScanError::InvalidConfig("universe is empty".into()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| ScanError::InvalidConfig(format!("thread pool: {e}")))?;

        info!(
            symbols = symbols.len(),
            workers = self.workers,
            source = self.source.name(),
            start = %self.start,
            end = %self.end,
            "scan started"
        );
        let started = Instant::now();

        let outcomes: Vec<(&str, Result<Vec<SignalResult>>)> = pool.install(|| {
            symbols
                .par_iter()
                .map(|&symbol| (symbol, self.scan_symbol(symbol)))
                .collect()
        });

        let mut signals = Vec::new();
        let mut failures = Vec::new();
        let mut skipped_insufficient = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(mut hits) => signals.append(&mut hits),
                Err(ScanError::InsufficientData { need, got }) => {
                    debug!(symbol, need, got, "skipped: insufficient data");
                    skipped_insufficient.push(symbol.to_string());
                }
                Err(error) => {
                    warn!(symbol, %error, "symbol skipped");
                    failures.push(SymbolFailure {
                        symbol: symbol.to_string(),
                        error,
                    });
                }
            }
        }

        sort_signals(&mut signals, self.params().sort_by);
        let summary = ScanSummary::new(
            &signals,
            symbols.len(),
            failures.len(),
            skipped_insufficient.len(),
        );

        info!(
            signals = signals.len(),
            symbols_hit = summary.unique_symbols,
            failed = failures.len(),
            skipped = skipped_insufficient.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );

        Ok(ScanReport {
            signals,
            summary,
            failures,
            skipped_insufficient,
        })
    }

    /// Evaluate an already-loaded series over the scanner's date range.
    pub fn scan_series<T: OHLCV>(&self, symbol: &str, bars: &[T]) -> Result<Vec<SignalResult>> {
        validate_series(bars)?;
        if bars.len() < MIN_BARS {
            return Err(ScanError::InsufficientData {
                need: MIN_BARS,
                got: bars.len(),
            });
        }
        let frame = IndicatorFrame::compute(bars);
        let first = frame.dates.partition_point(|d| *d < self.start).max(2);
        let last = frame.dates.partition_point(|d| *d <= self.end);
        if first >= last {
            return Ok(Vec::new());
        }
        Ok(self.evaluator.evaluate_range(symbol, &frame, first..last))
    }

    fn scan_symbol(&self, symbol: &str) -> Result<Vec<SignalResult>> {
        let fetch_start = self
            .start
            .checked_sub_days(Days::new(self.lead_in_days()))
            .unwrap_or(NaiveDate::MIN);

        let bars = self
            .source
            .fetch_daily_bars(symbol, fetch_start, self.end)
            .map_err(|source| ScanError::Fetch {
                symbol: symbol.to_string(),
                source,
            })?;
        if bars.is_empty() {
            return Err(ScanError::Fetch {
                symbol: symbol.to_string(),
                source: FetchError::Empty,
            });
        }
        debug!(symbol, bars = bars.len(), "fetched");
        self.scan_series(symbol, &bars)
    }
}

/// Date descending, then symbol ascending or close descending.
/// Ties on close fall back to symbol so the order is total.
pub fn sort_signals(signals: &mut [SignalResult], order: SortOrder) {
    signals.sort_by(|a, b| {
        b.date.cmp(&a.date).then_with(|| match order {
            SortOrder::Symbol => a.symbol.cmp(&b.symbol),
            SortOrder::CloseDesc => b
                .close
                .total_cmp(&a.close)
                .then_with(|| a.symbol.cmp(&b.symbol)),
        })
        .then_with(|| a.trigger.cmp(&b.trigger))
    });
}

// ============================================================
// TESTS
// ============================================================
