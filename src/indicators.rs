//! Indicator engine
//!
//! Pure transforms from an ordered bar series to parallel indicator
//! columns. Undefined values are `f64::NAN` (never a silent zero); use
//! [`defined`] to turn a cell into an `Option`.
//!
//! Every "prior information" field (ATR, volume average, ADV20 and the
//! `prev_*` columns) is shifted by one bar, so the value stored at index `i`
//! only depends on bars `0..i`.

use chrono::NaiveDate;

use crate::{OHLCVExt, OHLCV};

pub const EMA_FAST_SPAN: usize = 9;
pub const EMA_SLOW_SPAN: usize = 20;
pub const ATR_PERIOD: usize = 14;
pub const VOL_AVG_PERIOD: usize = 14;
pub const ADV_PERIOD: usize = 20;
pub const SLOPE_LAG: usize = 5;

/// Index of the first row at which every shifted field can be defined.
pub const WARMUP_BARS: usize = max_usize(max_usize(ATR_PERIOD, VOL_AVG_PERIOD), ADV_PERIOD) + 1;

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

// ============================================================
// PRIMITIVES
// ============================================================

/// `Some(value)` when the cell holds a finite number
#[inline]
pub fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Division that yields NaN instead of inf/NaN garbage for a zero or
/// undefined denominator.
#[inline]
pub fn ratio(num: f64, den: f64) -> f64 {
    if num.is_finite() && den.is_finite() && den != 0.0 {
        num / den
    } else {
        f64::NAN
    }
}

/// Exponential moving average, `ewm(span, adjust=False)`.
///
/// Seeded with the first finite observation; a NaN input carries the
/// previous value forward.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for &v in values {
        state = match (state, v.is_finite()) {
            (None, true) => Some(v),
            (Some(prev), true) => Some(alpha * v + (1.0 - alpha) * prev),
            (s, false) => s,
        };
        out.push(state.unwrap_or(f64::NAN));
    }
    out
}

/// Trailing mean over `window` values with min periods = `window`.
/// Any NaN inside the window makes that output NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return f64::NAN;
            }
            let slice = &values[i + 1 - window..=i];
            if slice.iter().any(|v| !v.is_finite()) {
                f64::NAN
            } else {
                slice.iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

/// Lag a column by `periods`, filling the head with NaN.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= periods { values[i - periods] } else { f64::NAN })
        .collect()
}

/// Percent change against the value `periods` rows earlier.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < periods {
                return f64::NAN;
            }
            let base = values[i - periods];
            ratio(values[i] - base, base) * 100.0
        })
        .collect()
}

// ============================================================
// INDICATOR FRAME
// ============================================================

/// Columnar indicator store for one symbol
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub prev_close: Vec<f64>,
    pub prev_volume: Vec<f64>,
    pub true_range: Vec<f64>,
    pub ema9: Vec<f64>,
    pub ema20: Vec<f64>,
    pub atr: Vec<f64>,
    pub vol_avg14: Vec<f64>,
    pub adv20_usd: Vec<f64>,
    pub slope_ema9_5d: Vec<f64>,
    pub high_over_ema9_div_atr: Vec<f64>,
    pub gap_over_atr: Vec<f64>,
    pub open_over_ema9: Vec<f64>,
    pub body_over_atr: Vec<f64>,
}

impl IndicatorFrame {
    pub fn compute<T: OHLCV>(bars: &[T]) -> Self {
        let n = bars.len();
        let column = |f: fn(&T) -> f64| bars.iter().map(f).collect::<Vec<f64>>();

        let dates = bars.iter().map(|b| b.date()).collect();
        let open = column(T::open);
        let high = column(T::high);
        let low = column(T::low);
        let close = column(T::close);
        let volume = column(T::volume);
        let dollar_volume = column(|b| b.dollar_volume());
        let body = column(|b| b.body());

        let prev_close = shift(&close, 1);
        let prev_volume = shift(&volume, 1);
        let true_range: Vec<f64> = bars
            .iter()
            .zip(&prev_close)
            .map(|(bar, &pc)| bar.true_range(defined(pc)))
            .collect();

        let ema9 = ema(&close, EMA_FAST_SPAN);
        let ema20 = ema(&close, EMA_SLOW_SPAN);
        let atr = shift(&rolling_mean(&true_range, ATR_PERIOD), 1);
        let vol_avg14 = shift(&rolling_mean(&volume, VOL_AVG_PERIOD), 1);
        let adv20_usd = shift(&rolling_mean(&dollar_volume, ADV_PERIOD), 1);
        let slope_ema9_5d = pct_change(&ema9, SLOPE_LAG);

        let per_row = |f: &dyn Fn(usize) -> f64| (0..n).map(f).collect::<Vec<f64>>();
        let high_over_ema9_div_atr = per_row(&|i| ratio(high[i] - ema9[i], atr[i]));
        let gap_over_atr = per_row(&|i| ratio((open[i] - prev_close[i]).abs(), atr[i]));
        let open_over_ema9 = per_row(&|i| ratio(open[i], ema9[i]));
        let body_over_atr = per_row(&|i| ratio(body[i], atr[i]));

        Self {
            dates,
            open,
            high,
            low,
            close,
            volume,
            prev_close,
            prev_volume,
            true_range,
            ema9,
            ema20,
            atr,
            vol_avg14,
            adv20_usd,
            slope_ema9_5d,
            high_over_ema9_div_atr,
            gap_over_atr,
            open_over_ema9,
            body_over_atr,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Row view at `index`
    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorRow {
            date: self.dates[index],
            open: self.open[index],
            high: self.high[index],
            low: self.low[index],
            close: self.close[index],
            volume: self.volume[index],
            prev_close: self.prev_close[index],
            prev_volume: self.prev_volume[index],
            true_range: self.true_range[index],
            ema9: self.ema9[index],
            ema20: self.ema20[index],
            atr: self.atr[index],
            vol_avg14: self.vol_avg14[index],
            adv20_usd: self.adv20_usd[index],
            slope_ema9_5d: self.slope_ema9_5d[index],
            high_over_ema9_div_atr: self.high_over_ema9_div_atr[index],
            gap_over_atr: self.gap_over_atr[index],
            open_over_ema9: self.open_over_ema9[index],
            body_over_atr: self.body_over_atr[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = IndicatorRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Position of `date` in the series
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

/// One bar plus its derived fields. NaN marks an undefined value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub prev_close: f64,
    pub prev_volume: f64,
    pub true_range: f64,
    pub ema9: f64,
    pub ema20: f64,
    pub atr: f64,
    pub vol_avg14: f64,
    pub adv20_usd: f64,
    pub slope_ema9_5d: f64,
    pub high_over_ema9_div_atr: f64,
    pub gap_over_atr: f64,
    pub open_over_ema9: f64,
    pub body_over_atr: f64,
}

// ============================================================
// TESTS
// ============================================================
