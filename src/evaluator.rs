//! Two-stage trigger/gate evaluation
//!
//! For a candidate trade day `d0` the evaluator looks at three rows: `d0`,
//! `d1` (one trading day earlier) and `d2` (two trading days earlier).
//!
//! 1. A trigger row (`d1`, or `d2` in [`TriggerMode::D1OrD2`]) must pass the
//!    liquidity pre-check and the mold. `d1` wins when both qualify.
//! 2. The chosen row must be green enough, otherwise the date is rejected.
//!    A non-green `d1` never hands the trigger to `d2`.
//! 3. Optionally `d1` must exceed `d2` on high and close.
//! 4. The `d1` close must sit low enough in its trailing range.
//! 5. `d0` must gap away from the prior close and open above EMA9.
//!
//! Any undefined input rejects the date. Nothing here returns an error.

use std::fmt;
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    indicators::{ratio, IndicatorFrame, IndicatorRow},
    params::{RangeBasis, ScanParameters, TriggerMode},
    window::WindowStats,
    Result,
};

/// Which prior day acted as the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerTag {
    #[serde(rename = "D-1")]
    D1,
    #[serde(rename = "D-2")]
    D2,
}

impl TriggerTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerTag::D1 => "D-1",
            TriggerTag::D2 => "D-2",
        }
    }
}

impl fmt::Display for TriggerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One qualifying (symbol, date), with the values the decision used.
///
/// Numbers are rounded to the preset's display precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub date: NaiveDate,
    pub trigger: TriggerTag,
    pub trigger_date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
    pub gap_over_atr: f64,
    pub open_over_ema9: f64,
    pub body_over_atr: f64,
    pub vol_signal: f64,
    pub slope_ema9_5d: f64,
    pub high_over_ema9_div_atr: f64,
    pub adv20_usd: f64,
    pub position: f64,
}

/// Round for display. Comparisons never see rounded values.
#[inline]
pub fn round_to(value: f64, decimals: u8) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// `value >= min`, false for undefined values
#[inline]
fn at_least(value: f64, min: f64) -> bool {
    value.is_finite() && value >= min
}

#[derive(Debug, Clone)]
pub struct PatternEvaluator {
    params: ScanParameters,
}

impl PatternEvaluator {
    /// Validates the parameters up front
    pub fn new(params: ScanParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    #[inline]
    pub fn params(&self) -> &ScanParameters {
        &self.params
    }

    /// Evaluate the candidate trade day at `index`.
    pub fn evaluate(
        &self,
        symbol: &str,
        frame: &IndicatorFrame,
        index: usize,
    ) -> Option<SignalResult> {
        if index < 2 {
            return None;
        }
        let p = &self.params;
        let d0 = frame.row(index)?;
        let d1 = frame.row(index - 1)?;
        let d2 = frame.row(index - 2)?;

        let (trigger, rx) = self.select_trigger(&d1, &d2)?;
        if !self.is_green_trigger(&rx) {
            return None;
        }

        if p.enforce_d1_above_d2 && !(d1.high > d2.high && d1.close > d2.close) {
            return None;
        }

        let window = WindowStats::compute(
            frame,
            d0.date,
            d1.close,
            p.abs_lookback_days.get(),
            p.abs_exclude_days,
        )?;
        let position = window.position?;
        if position > p.pos_abs_max.get() {
            return None;
        }

        if !self.passes_gate(&d0, &d1) {
            return None;
        }

        let dp = p.display_decimals;
        Some(SignalResult {
            symbol: symbol.to_string(),
            date: d0.date,
            trigger,
            trigger_date: rx.date,
            open: round_to(d0.open, dp),
            close: round_to(d0.close, dp),
            volume: d0.volume,
            gap_over_atr: round_to(d0.gap_over_atr, dp),
            open_over_ema9: round_to(d0.open_over_ema9, dp),
            body_over_atr: round_to(rx.body_over_atr, dp),
            vol_signal: round_to(vol_signal(&rx), dp),
            slope_ema9_5d: round_to(rx.slope_ema9_5d, dp),
            high_over_ema9_div_atr: round_to(rx.high_over_ema9_div_atr, dp),
            adv20_usd: round_to(rx.adv20_usd, dp),
            position: round_to(position, dp),
        })
    }

    /// Evaluate every index in `range`, in order.
    pub fn evaluate_range(
        &self,
        symbol: &str,
        frame: &IndicatorFrame,
        range: Range<usize>,
    ) -> Vec<SignalResult> {
        range
            .filter_map(|i| self.evaluate(symbol, frame, i))
            .collect()
    }

    /// Pick the trigger row; the most recent qualifying row wins.
    pub fn select_trigger(
        &self,
        d1: &IndicatorRow,
        d2: &IndicatorRow,
    ) -> Option<(TriggerTag, IndicatorRow)> {
        if self.is_trigger(d1) {
            return Some((TriggerTag::D1, *d1));
        }
        match self.params.trigger_mode {
            TriggerMode::D1OrD2 if self.is_trigger(d2) => Some((TriggerTag::D2, *d2)),
            _ => None,
        }
    }

    /// Liquidity pre-check and mold on one candidate row.
    pub fn is_trigger(&self, rx: &IndicatorRow) -> bool {
        self.passes_liquidity(rx) && self.passes_mold(rx)
    }

    pub fn passes_liquidity(&self, rx: &IndicatorRow) -> bool {
        let p = &self.params;
        at_least(rx.prev_close, p.price_min)
            && at_least(rx.adv20_usd, p.adv20_min_usd)
            && p.d1_volume_min.map_or(true, |min| at_least(rx.prev_volume, min))
    }

    pub fn passes_mold(&self, rx: &IndicatorRow) -> bool {
        let p = &self.params;
        let range = match p.range_basis {
            RangeBasis::HighLow => rx.high - rx.low,
            RangeBasis::TrueRange => rx.true_range,
        };
        at_least(ratio(range, rx.atr), p.atr_mult)
            && at_least(vol_signal(rx), p.vol_mult)
            && at_least(rx.slope_ema9_5d, p.slope5d_min)
            && at_least(rx.high_over_ema9_div_atr, p.high_ema9_mult)
    }

    pub fn is_green_trigger(&self, rx: &IndicatorRow) -> bool {
        at_least(rx.body_over_atr, self.params.d1_green_atr_min)
    }

    /// Trade-day conditions on `d0`
    pub fn passes_gate(&self, d0: &IndicatorRow, d1: &IndicatorRow) -> bool {
        let p = &self.params;
        at_least(d0.gap_over_atr, p.gap_div_atr_min)
            && at_least(d0.open_over_ema9, p.open_over_ema9_min)
            && (!p.require_open_above_d1_high || d0.open > d1.high)
    }
}

/// `max(volume, prev_volume) / vol_avg14`; undefined without a previous day.
fn vol_signal(rx: &IndicatorRow) -> f64 {
    if !rx.prev_volume.is_finite() {
        return f64::NAN;
    }
    ratio(rx.volume.max(rx.prev_volume), rx.vol_avg14)
}

// ============================================================
// TESTS
// ============================================================
