use std::{fs, path::Path};

use anyhow::{Context, Result};
use clap::Parser;
use lhgeo_pipeline::{estimate_geometry, EstimationConfig, EstimationReport, Recording};

/// Base station geometry estimation from recorded lighthouse angles.
#[derive(Debug, Parser)]
#[command(author, version, about = "Lighthouse base station geometry estimation")]
struct Args {
    /// Path to a JSON array of recordings.
    #[arg(long)]
    input: String,

    /// Optional path to a JSON EstimationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn write_report_json(report: &EstimationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn run_estimation_from_files(input_path: &str, config_path: Option<&str>) -> Result<String> {
    let recordings: Vec<Recording> = load_json_file(Path::new(input_path))?;

    let config = if let Some(cfg_path) = config_path {
        load_json_file::<EstimationConfig>(Path::new(cfg_path))?
    } else {
        EstimationConfig::default()
    };

    let report = estimate_geometry(&recordings, &config)?;
    log::info!("{}", report.summary.trim_end());
    write_report_json(&report)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = run_estimation_from_files(&args.input, args.config.as_deref())?;
    println!("{}", json);
    Ok(())
}
