use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use edgescan::params::{PresetCatalog, ScanParameters, TriggerMode};

#[derive(Parser, Debug)]
#[command(
    name = "edgescan",
    version,
    about = "Daily gap-pattern scanner (Backside B / Half A+)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a universe of symbols over a date range
    Scan(ScanArgs),
    /// List the available presets and their parameters
    Presets(PresetsArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Preset to start from
    #[arg(long, default_value = "backside_b")]
    pub preset: String,

    /// JSON file with extra presets ({"name": {...fields...}})
    #[arg(long = "presets", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub presets_file: Option<PathBuf>,

    /// Override one parameter, e.g. `--set atr_mult=1.2` (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, f64)>,

    /// Override the preset's trigger mode
    #[arg(long = "trigger-mode", value_enum)]
    pub trigger_mode: Option<TriggerModeValue>,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',', conflicts_with = "universe")]
    pub symbols: Vec<String>,

    /// File with one symbol per line ('#' starts a comment)
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub universe: Option<PathBuf>,

    /// First trade day to evaluate (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last trade day to evaluate (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Where bars come from
    #[arg(long, value_enum, default_value = "csv")]
    pub source: SourceKind,

    /// Directory of <SYMBOL>.csv files for `--source csv`
    #[arg(long = "data-dir", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Polygon.io API key for `--source polygon`
    #[arg(long = "api-key", env = "POLYGON_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Polygon requests per minute across all workers (omit for no limit)
    #[arg(long = "rate-limit", value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout-secs", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Number of worker threads
    #[arg(long, default_value_t = edgescan::scanner::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Output file (stdout when omitted)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "csv")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct PresetsArgs {
    /// JSON file with extra presets
    #[arg(long = "presets", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub presets_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Csv,
    Polygon,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TriggerModeValue {
    #[value(name = "d1_only", alias = "D1_only")]
    D1Only,
    #[value(name = "d1_or_d2", alias = "D1_or_D2")]
    D1OrD2,
}

impl From<TriggerModeValue> for TriggerMode {
    fn from(value: TriggerModeValue) -> Self {
        match value {
            TriggerModeValue::D1Only => TriggerMode::D1Only,
            TriggerModeValue::D1OrD2 => TriggerMode::D1OrD2,
        }
    }
}

/// `name=value`; flags also accept `true`/`false`
fn parse_override(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let value = match value.trim() {
        "true" => 1.0,
        "false" => 0.0,
        v => v
            .parse::<f64>()
            .map_err(|e| format!("bad value for {name}: {e}"))?,
    };
    Ok((name.trim().to_string(), value))
}

pub fn load_catalog(extra: Option<&PathBuf>) -> Result<PresetCatalog> {
    let mut catalog = PresetCatalog::builtin();
    if let Some(path) = extra {
        let loaded = PresetCatalog::from_path(path)
            .with_context(|| format!("failed to load presets from {}", path.display()))?;
        catalog.merge(loaded);
    }
    Ok(catalog)
}

impl ScanArgs {
    /// Preset, then `--set` overrides, then `--trigger-mode`
    pub fn resolve_params(&self) -> Result<ScanParameters> {
        let catalog = load_catalog(self.presets_file.as_ref())?;
        let base = catalog.get(&self.preset)?;
        let overrides: HashMap<&str, f64> = self
            .overrides
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        let mut params = base
            .with_overrides(&overrides)
            .context("invalid --set override")?;
        if let Some(mode) = self.trigger_mode {
            params.trigger_mode = mode.into();
        }
        Ok(params)
    }

    pub fn resolve_universe(&self) -> Result<Vec<String>> {
        let mut symbols: Vec<String> = match &self.universe {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read universe {}", path.display()))?
                .lines()
                .map(|line| line.split('#').next().unwrap_or_default().trim())
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            None => self.symbols.iter().map(|s| s.trim().to_string()).collect(),
        };
        symbols.retain(|s| !s.is_empty());
        for s in &mut symbols {
            *s = s.to_ascii_uppercase();
        }
        if symbols.is_empty() {
            bail!("no symbols given: use --symbols or --universe");
        }
        Ok(symbols)
    }
}
