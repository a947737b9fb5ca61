mod scenario;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Builder;
use log::error;

use dslab_reconf::config::EngineConfig;
use dslab_reconf::ReconfigurationEngine;

use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Computes reconfiguration plan for a datacenter scenario
struct Args {
    /// Path to YAML file with scenario
    scenario: PathBuf,

    /// Path to YAML file with engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the plan as JSON
    #[arg(short, long)]
    json: bool,
}

fn main() -> ExitCode {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether a destination was found.
fn run(args: &Args) -> Result<bool, String> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(&path.to_string_lossy()).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };
    let scenario = Scenario::from_file(&args.scenario)?;
    let request = scenario.request()?;
    let engine = ReconfigurationEngine::new(config);
    let result = engine.solve(&request).map_err(|e| e.to_string())?;

    let Some(destination) = &result.destination else {
        let reason = if result.statistics.timed_out {
            "search limit reached"
        } else {
            "no destination satisfies the rules"
        };
        println!("{} ({})", reason, result.statistics);
        return Ok(false);
    };
    if args.json {
        let json = serde_json::to_string_pretty(&result.plan).map_err(|e| e.to_string())?;
        println!("{}", json);
    } else {
        println!("SOURCE\n{}\n", request.source());
        println!("DESTINATION\n{}\n", destination);
        println!("PLAN");
        print!("{}", result.plan);
        println!("\n{}", result.statistics);
    }
    Ok(true)
}
