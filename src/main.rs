mod cli;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, OutputFormat, PresetsArgs, ScanArgs, SourceKind};
use edgescan::prelude::*;
use edgescan::params::PARAMS;
use edgescan::source::PolygonConfig;

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the result table
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing: {err}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    match cli.command {
        Commands::Scan(args) => run_scan(&args),
        Commands::Presets(args) => list_presets(&args),
    }
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let params = args.resolve_params()?;
    let universe = args.resolve_universe()?;

    let source: Box<dyn BarSource> = match args.source {
        SourceKind::Csv => {
            let dir = args
                .data_dir
                .as_ref()
                .context("--data-dir is required with --source csv")?;
            Box::new(CsvBarSource::new(dir))
        }
        SourceKind::Polygon => {
            let key = args
                .api_key
                .clone()
                .context("--api-key or POLYGON_API_KEY is required with --source polygon")?;
            let mut config = PolygonConfig::new(key);
            config.timeout = Duration::from_secs(args.timeout_secs);
            config.requests_per_minute = args.rate_limit;
            Box::new(PolygonClient::new(config).context("failed to build Polygon client")?)
        }
    };

    let scanner = ScannerBuilder::new(source)
        .params(params)
        .workers(args.workers)
        .date_range(args.start, args.end)
        .build()
        .context("invalid scan configuration")?;

    let report = scanner.run(universe.as_slice())?;

    match &args.out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_report(BufWriter::new(file), &report, args.format)?;
            info!(path = %path.display(), "results written");
        }
        None => write_report(io::stdout().lock(), &report, args.format)?,
    }

    if report.is_empty() {
        info!(
            scanned = report.summary.symbols_scanned,
            failed = report.summary.symbols_failed,
            "no signals"
        );
    }
    if report.summary.symbols_failed == report.summary.symbols_scanned {
        bail!("every symbol failed to load");
    }
    Ok(())
}

fn write_report<W: Write>(mut out: W, report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(&mut out, &report.signals)?,
        OutputFormat::Json => {
            write_json(&mut out, report)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn list_presets(args: &PresetsArgs) -> Result<()> {
    let catalog = cli::load_catalog(args.presets_file.as_ref())?;
    let mut out = io::stdout().lock();
    for (name, params) in catalog.iter() {
        writeln!(
            out,
            "{name}  (trigger_mode={}, range_basis={:?}, sort_by={:?})",
            params.trigger_mode, params.range_basis, params.sort_by
        )?;
        for meta in PARAMS {
            let value = match (meta.name, params.d1_volume_min) {
                ("d1_volume_min", None) => "unset".to_string(),
                _ => params
                    .value_of(meta.name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            };
            writeln!(out, "  {:<28}{:>14}  {}", meta.name, value, meta.description)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
