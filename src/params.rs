//! Scan parameters, presets and parameter metadata
//!
//! A scanner preset is nothing more than a [`ScanParameters`] value: the
//! pipeline is identical for every preset and only the thresholds differ.
//! The metadata table ([`PARAMS`]) drives validation, named overrides and
//! the `edgescan presets` listing.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use edgescan::params::{PresetCatalog, ScanParameters};
//!
//! let catalog = PresetCatalog::builtin();
//! let base = catalog.get("backside_b").unwrap();
//!
//! let mut overrides = HashMap::new();
//! overrides.insert("atr_mult", 1.2);
//! let tuned = base.with_overrides(&overrides).unwrap();
//! assert_eq!(tuned.atr_mult, 1.2);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Period, Ratio, Result, ScanError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Value in 0.0..=1.0
  Ratio,
  /// Positive integer day count
  Period,
  /// Non-negative integer
  Count,
  /// Real-valued threshold
  Threshold,
  /// Boolean switch, 0 or 1
  Flag,
}

/// Metadata for a single scan parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "atr_mult")
  pub name: &'static str,
  pub param_type: ParamType,
  /// Accepted range, inclusive
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn new(
    name: &'static str,
    param_type: ParamType,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(ScanError::InvalidConfig(format!("{} must be finite, got {value}", self.name)));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(ScanError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period | ParamType::Count if value.fract() != 0.0 => {
        Err(ScanError::InvalidValue("day counts must be whole numbers"))
      },
      ParamType::Flag if value != 0.0 && value != 1.0 => {
        Err(ScanError::InvalidValue("flags must be 0 or 1"))
      },
      _ => Ok(()),
    }
  }

  /// Look up metadata by parameter name
  pub fn find(name: &str) -> Option<&'static ParamMeta> {
    PARAMS.iter().find(|m| m.name == name)
  }
}

/// Every numeric or boolean field of [`ScanParameters`]
pub const PARAMS: &[ParamMeta] = &[
  ParamMeta::new("price_min", ParamType::Threshold, (0.0, 1e6), "Minimum previous close of the trigger row"),
  ParamMeta::new("adv20_min_usd", ParamType::Threshold, (0.0, 1e12), "Minimum 20-day average dollar volume of the trigger row"),
  ParamMeta::new("abs_lookback_days", ParamType::Period, (1.0, 5000.0), "Calendar days in the position window"),
  ParamMeta::new("abs_exclude_days", ParamType::Count, (0.0, 365.0), "Calendar days before D0 excluded from the position window"),
  ParamMeta::new("pos_abs_max", ParamType::Ratio, (0.0, 1.0), "Maximum position of the D-1 close within the window"),
  ParamMeta::new("atr_mult", ParamType::Threshold, (0.0, 50.0), "Minimum trigger range / ATR"),
  ParamMeta::new("vol_mult", ParamType::Threshold, (0.0, 100.0), "Minimum max(volume, previous volume) / average volume"),
  ParamMeta::new("d1_volume_min", ParamType::Threshold, (0.0, 1e12), "Minimum previous-day volume of the trigger row"),
  ParamMeta::new("slope5d_min", ParamType::Threshold, (-100.0, 1000.0), "Minimum 5-day EMA9 slope in percent"),
  ParamMeta::new("high_ema9_mult", ParamType::Threshold, (-50.0, 50.0), "Minimum (high - EMA9) / ATR of the trigger row"),
  ParamMeta::new("gap_div_atr_min", ParamType::Threshold, (0.0, 50.0), "Minimum D0 gap / ATR"),
  ParamMeta::new("open_over_ema9_min", ParamType::Threshold, (0.0, 10.0), "Minimum D0 open / EMA9"),
  ParamMeta::new("d1_green_atr_min", ParamType::Threshold, (-50.0, 50.0), "Minimum trigger body / ATR"),
  ParamMeta::new("enforce_d1_above_d2", ParamType::Flag, (0.0, 1.0), "Require D-1 high and close above D-2"),
  ParamMeta::new("require_open_above_d1_high", ParamType::Flag, (0.0, 1.0), "Require D0 open above the D-1 high"),
  ParamMeta::new("display_decimals", ParamType::Count, (0.0, 6.0), "Decimal places of emitted values"),
];

// ============================================================
// ENUMS
// ============================================================

/// Which prior rows may act as the trigger day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode {
  #[serde(rename = "D1_only", alias = "d1_only")]
  D1Only,
  #[serde(rename = "D1_or_D2", alias = "d1_or_d2")]
  D1OrD2,
}

impl fmt::Display for TriggerMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerMode::D1Only => f.write_str("D1_only"),
      TriggerMode::D1OrD2 => f.write_str("D1_or_D2"),
    }
  }
}

/// Range measure compared against `atr_mult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBasis {
  /// High minus low of the trigger row
  HighLow,
  /// True range of the trigger row (includes the gap from the prior close)
  TrueRange,
}

/// Secondary ordering of the result table (primary is always date descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
  Symbol,
  CloseDesc,
}

// ============================================================
// SCAN PARAMETERS
// ============================================================

/// Threshold set for one scan run
///
/// Fields missing from a preset file fall back to the Backside B values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanParameters {
  pub price_min: f64,
  pub adv20_min_usd: f64,
  pub abs_lookback_days: Period,
  pub abs_exclude_days: u32,
  pub pos_abs_max: Ratio,
  pub trigger_mode: TriggerMode,
  pub range_basis: RangeBasis,
  pub atr_mult: f64,
  pub vol_mult: f64,
  pub d1_volume_min: Option<f64>,
  pub slope5d_min: f64,
  pub high_ema9_mult: f64,
  pub gap_div_atr_min: f64,
  pub open_over_ema9_min: f64,
  pub d1_green_atr_min: f64,
  pub enforce_d1_above_d2: bool,
  pub require_open_above_d1_high: bool,
  pub display_decimals: u8,
  pub sort_by: SortOrder,
}

impl Default for ScanParameters {
  fn default() -> Self {
    Self::backside_b()
  }
}

impl ScanParameters {
  /// Backside B: D-1 or D-2 trigger off a low position in the 1000-day range
  pub fn backside_b() -> Self {
    Self {
      price_min: 8.0,
      adv20_min_usd: 30_000_000.0,
      abs_lookback_days: Period::new_const(1000),
      abs_exclude_days: 10,
      pos_abs_max: Ratio::new_const(0.75),
      trigger_mode: TriggerMode::D1OrD2,
      range_basis: RangeBasis::TrueRange,
      atr_mult: 0.9,
      vol_mult: 0.9,
      d1_volume_min: Some(15_000_000.0),
      slope5d_min: 3.0,
      high_ema9_mult: 1.05,
      gap_div_atr_min: 0.75,
      open_over_ema9_min: 0.9,
      d1_green_atr_min: 0.30,
      enforce_d1_above_d2: true,
      require_open_above_d1_high: true,
      display_decimals: 2,
      sort_by: SortOrder::Symbol,
    }
  }

  /// Half A+: single D-1 trigger, stricter extension and volume signature
  pub fn half_a_plus() -> Self {
    Self {
      price_min: 5.0,
      adv20_min_usd: 10_000_000.0,
      abs_lookback_days: Period::new_const(1000),
      abs_exclude_days: 10,
      pos_abs_max: Ratio::new_const(0.5),
      trigger_mode: TriggerMode::D1Only,
      range_basis: RangeBasis::HighLow,
      atr_mult: 1.0,
      vol_mult: 1.5,
      d1_volume_min: Some(5_000_000.0),
      slope5d_min: 5.0,
      high_ema9_mult: 1.25,
      gap_div_atr_min: 0.5,
      open_over_ema9_min: 1.0,
      d1_green_atr_min: 0.5,
      enforce_d1_above_d2: true,
      require_open_above_d1_high: false,
      display_decimals: 3,
      sort_by: SortOrder::CloseDesc,
    }
  }

  /// Current value of a named parameter, as f64
  pub fn value_of(&self, name: &str) -> Option<f64> {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    Some(match name {
      "price_min" => self.price_min,
      "adv20_min_usd" => self.adv20_min_usd,
      "abs_lookback_days" => self.abs_lookback_days.get() as f64,
      "abs_exclude_days" => self.abs_exclude_days as f64,
      "pos_abs_max" => self.pos_abs_max.get(),
      "atr_mult" => self.atr_mult,
      "vol_mult" => self.vol_mult,
      // unset behaves like a zero floor
      "d1_volume_min" => self.d1_volume_min.unwrap_or(0.0),
      "slope5d_min" => self.slope5d_min,
      "high_ema9_mult" => self.high_ema9_mult,
      "gap_div_atr_min" => self.gap_div_atr_min,
      "open_over_ema9_min" => self.open_over_ema9_min,
      "d1_green_atr_min" => self.d1_green_atr_min,
      "enforce_d1_above_d2" => flag(self.enforce_d1_above_d2),
      "require_open_above_d1_high" => flag(self.require_open_above_d1_high),
      "display_decimals" => self.display_decimals as f64,
      _ => return None,
    })
  }

  /// Set a named parameter from an f64, validating against [`PARAMS`]
  pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
    let meta = ParamMeta::find(name).ok_or_else(|| ScanError::UnknownParameter(name.to_string()))?;
    meta.validate(value)?;
    match name {
      "price_min" => self.price_min = value,
      "adv20_min_usd" => self.adv20_min_usd = value,
      "abs_lookback_days" => self.abs_lookback_days = Period::new(value as u32)?,
      "abs_exclude_days" => self.abs_exclude_days = value as u32,
      "pos_abs_max" => self.pos_abs_max = Ratio::new(value)?,
      "atr_mult" => self.atr_mult = value,
      "vol_mult" => self.vol_mult = value,
      "d1_volume_min" => self.d1_volume_min = Some(value),
      "slope5d_min" => self.slope5d_min = value,
      "high_ema9_mult" => self.high_ema9_mult = value,
      "gap_div_atr_min" => self.gap_div_atr_min = value,
      "open_over_ema9_min" => self.open_over_ema9_min = value,
      "d1_green_atr_min" => self.d1_green_atr_min = value,
      "enforce_d1_above_d2" => self.enforce_d1_above_d2 = value == 1.0,
      "require_open_above_d1_high" => self.require_open_above_d1_high = value == 1.0,
      "display_decimals" => self.display_decimals = value as u8,
      _ => return Err(ScanError::UnknownParameter(name.to_string())),
    }
    Ok(())
  }

  /// Copy with named overrides applied. Missing names keep their value.
  pub fn with_overrides(&self, overrides: &HashMap<&str, f64>) -> Result<Self> {
    let mut params = self.clone();
    // sorted so the first reported error is stable
    let mut names: Vec<_> = overrides.keys().copied().collect();
    names.sort_unstable();
    for name in names {
      params.set(name, overrides[name])?;
    }
    params.validate()?;
    Ok(params)
  }

  /// Check every field against its metadata
  pub fn validate(&self) -> Result<()> {
    for meta in PARAMS {
      if let Some(value) = self.value_of(meta.name) {
        meta.validate(value)?;
      }
    }
    Ok(())
  }
}

// ============================================================
// PRESET CATALOG
// ============================================================

/// Named presets, loadable from JSON: `{ "name": { ...fields... }, ... }`
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
  presets: BTreeMap<String, ScanParameters>,
}

impl PresetCatalog {
  /// The presets compiled into the crate
  pub fn builtin() -> Self {
    let mut presets = BTreeMap::new();
    presets.insert("backside_b".to_string(), ScanParameters::backside_b());
    presets.insert("half_a_plus".to_string(), ScanParameters::half_a_plus());
    Self { presets }
  }

  pub fn from_json_str(json: &str) -> Result<Self> {
    let presets: BTreeMap<String, ScanParameters> =
      serde_json::from_str(json).map_err(|e| ScanError::InvalidConfig(format!("preset file: {e}")))?;
    for (name, params) in &presets {
      params
        .validate()
        .map_err(|e| ScanError::InvalidConfig(format!("preset {name}: {e}")))?;
    }
    Ok(Self { presets })
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  /// Add presets from `other`, replacing same-named entries
  pub fn merge(&mut self, other: PresetCatalog) {
    self.presets.extend(other.presets);
  }

  pub fn get(&self, name: &str) -> Result<&ScanParameters> {
    self.presets.get(name).ok_or_else(|| {
      ScanError::InvalidConfig(format!(
        "unknown preset '{name}' (available: {})",
        self.names().collect::<Vec<_>>().join(", ")
      ))
    })
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.presets.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ScanParameters)> {
    self.presets.iter().map(|(k, v)| (k.as_str(), v))
  }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_presets_validate() {
    for (name, params) in PresetCatalog::builtin().iter() {
      assert!(params.validate().is_ok(), "{name} should validate");
    }
  }

  #[test]
  fn test_meta_covers_every_field() {
    let params = ScanParameters::default();
    for meta in PARAMS {
      assert!(params.value_of(meta.name).is_some(), "{} has no accessor", meta.name);
    }
  }

  #[test]
  fn test_validate_threshold() {
    let meta = ParamMeta::find("atr_mult").unwrap();
    assert!(meta.validate(0.9).is_ok());
    assert!(meta.validate(-0.1).is_err());
    assert!(meta.validate(f64::NAN).is_err());
  }

  #[test]
  fn test_validate_period_and_flag() {
    let period = ParamMeta::find("abs_lookback_days").unwrap();
    assert!(period.validate(1000.0).is_ok());
    assert!(period.validate(0.0).is_err());
    assert!(period.validate(10.5).is_err());

    let flag = ParamMeta::find("enforce_d1_above_d2").unwrap();
    assert!(flag.validate(1.0).is_ok());
    assert!(flag.validate(0.5).is_err());
  }

  #[test]
  fn test_overrides() {
    let mut overrides = HashMap::new();
    overrides.insert("atr_mult", 1.5);
    overrides.insert("enforce_d1_above_d2", 0.0);
    overrides.insert("d1_volume_min", 1_000_000.0);

    let params = ScanParameters::backside_b().with_overrides(&overrides).unwrap();
    assert_eq!(params.atr_mult, 1.5);
    assert!(!params.enforce_d1_above_d2);
    assert_eq!(params.d1_volume_min, Some(1_000_000.0));
    assert_eq!(params.vol_mult, ScanParameters::backside_b().vol_mult);
  }

  #[test]
  fn test_unknown_override_rejected() {
    let mut overrides = HashMap::new();
    overrides.insert("atr_multiplier", 1.5);
    let err = ScanParameters::backside_b().with_overrides(&overrides).unwrap_err();
    assert!(matches!(err, ScanError::UnknownParameter(_)));
  }

  #[test]
  fn test_out_of_range_override_rejected() {
    let mut overrides = HashMap::new();
    overrides.insert("pos_abs_max", 1.5);
    assert!(ScanParameters::backside_b().with_overrides(&overrides).is_err());
  }

  #[test]
  fn test_catalog_from_json_partial_preset() {
    let json = r#"{
      "loose": { "atr_mult": 0.5, "trigger_mode": "D1_only", "sort_by": "close_desc" }
    }"#;
    let catalog = PresetCatalog::from_json_str(json).unwrap();
    let loose = catalog.get("loose").unwrap();
    assert_eq!(loose.atr_mult, 0.5);
    assert_eq!(loose.trigger_mode, TriggerMode::D1Only);
    assert_eq!(loose.sort_by, SortOrder::CloseDesc);
    // unspecified fields come from Backside B
    assert_eq!(loose.price_min, 8.0);
  }

  #[test]
  fn test_catalog_rejects_unknown_trigger_mode() {
    let json = r#"{ "bad": { "trigger_mode": "D3" } }"#;
    let err = PresetCatalog::from_json_str(json).unwrap_err();
    assert!(err.is_configuration());
  }

  #[test]
  fn test_catalog_rejects_unknown_field() {
    let json = r#"{ "bad": { "atr_mul": 1.0 } }"#;
    assert!(PresetCatalog::from_json_str(json).is_err());
  }

  #[test]
  fn test_catalog_rejects_negative_lookback() {
    let json = r#"{ "bad": { "abs_lookback_days": -5 } }"#;
    assert!(PresetCatalog::from_json_str(json).is_err());
  }

  #[test]
  fn test_catalog_rejects_negative_threshold() {
    let json = r#"{ "bad": { "gap_div_atr_min": -1.0 } }"#;
    let err = PresetCatalog::from_json_str(json).unwrap_err();
    assert!(err.to_string().contains("gap_div_atr_min"));
  }

  #[test]
  fn test_catalog_unknown_preset_lists_names() {
    let err = PresetCatalog::builtin().get("nope").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("backside_b") && msg.contains("half_a_plus"));
  }

  #[test]
  fn test_trigger_mode_roundtrip_names() {
    assert_eq!(serde_json::to_string(&TriggerMode::D1OrD2).unwrap(), "\"D1_or_D2\"");
    assert_eq!(TriggerMode::D1Only.to_string(), "D1_only");
  }
}
