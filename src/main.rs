//! `vtat`: validate a JSONL annotation export and print a per-annotation summary.
//!
//! Usage: `vtat <annotations.jsonl> [--config <config.json>] [--dense <out.jsonl>]`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vtat::config::EngineConfig;
use vtat::format::{self, ExportOptions, WarningSeverity};

/// Validate a JSONL annotation export and summarize each annotation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSONL file to read
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Engine configuration (defaults to the user config file)
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Also write a dense export with every interpolated frame
    #[arg(short = 'd', long = "dense", value_name = "OUT")]
    dense_out: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> EngineConfig {
    match path {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Ignoring config {}: {}", path.display(), e);
                EngineConfig::default()
            }
        },
        None => EngineConfig::load_from_default_path().unwrap_or_default(),
    }
}

fn run(args: &Args) -> Result<(), vtat::Error> {
    let imported = format::read_jsonl(&args.input)?;
    for warning in &imported.warnings {
        match warning.severity {
            WarningSeverity::Info => log::info!("{}", warning.message),
            WarningSeverity::Warning => log::warn!("{}", warning.message),
        }
    }
    let store = imported.into_store();

    println!("{} annotations in {}", store.len(), args.input.display());
    for annotation in store.iter() {
        let seq = &annotation.sequence;
        let (first, last) = seq.keyframe_range();
        println!(
            "  #{:<4} {:<10} keyframes={:<4} span=[{}, {}] interpolated={:<6} visible={}/{}",
            annotation.id,
            seq.tracking_source().as_str(),
            seq.keyframe_count(),
            first,
            last,
            seq.interpolated_frame_count(),
            seq.visible_frame_count(),
            seq.total_frames()
        );
    }

    if let Some(out) = &args.dense_out {
        let result = format::write_jsonl(&store, out, &ExportOptions::new().dense(true))?;
        println!(
            "Wrote {} boxes for {} annotations to {}",
            result.boxes_exported,
            result.annotations_exported,
            out.display()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = load_config(args.config.as_ref());
    env_logger::Builder::new()
        .filter_level(config.preferences.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
