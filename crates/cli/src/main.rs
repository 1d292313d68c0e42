use std::fs;
use std::path::PathBuf;
use std::process;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;

use proctorguard_core::pipeline::analysis_engine::AnalysisEngine;

/// Suspicious-activity analysis for interview frames.
#[derive(Parser)]
#[command(name = "proctorguard")]
struct Cli {
    /// Frame images, analyzed in order as one session's stream.
    inputs: Vec<PathBuf>,

    /// Session identifier for temporal state (movement baselines).
    #[arg(long, default_value = "default")]
    session: String,

    /// Treat inputs as base64/data-URL payload text files instead of binary
    /// images.
    #[arg(long)]
    payload: bool,

    /// Pretty-print the JSON reports.
    #[arg(long)]
    pretty: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let engine = AnalysisEngine::new();
    if !engine.detection_available() {
        log::warn!("no detection backend available; reports will carry the disabled payload");
    }

    for input in &cli.inputs {
        let payload = if cli.payload {
            fs::read_to_string(input)?
        } else {
            STANDARD.encode(fs::read(input)?)
        };

        let report = engine.analyze(&cli.session, &payload);
        let json = if cli.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{json}");

        if report.suspicious_activity {
            log::info!(
                "{}: suspicious activity ({})",
                input.display(),
                report.violations.join("; ")
            );
        }
    }

    engine.end_session(&cli.session);
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.inputs.is_empty() {
        return Err("At least one input frame is required".into());
    }
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    Ok(())
}
