// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod runner;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use labwired_rtos::Rtos;
use labwired_rtos_config::{load_scenario, SimConfig};
use runner::{ScenarioRunner, StepOutcome};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(author, version, about = "LabWired RTOS simulator", long_about = None)]
struct Cli {
    /// Log every executed step
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a scenario script (YAML) against a fresh simulator.
    Run(RunArgs),

    /// Print the state snapshot of a freshly configured simulator.
    Snapshot(SnapshotArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the scenario script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Simulator config (YAML); takes precedence over the script's `config`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to write result.json
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SnapshotArgs {
    /// Simulator config (YAML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunResult {
    result_schema_version: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    steps_executed: usize,
    failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    steps: Vec<StepOutcome>,
    script_hash: String,
    snapshot: serde_json::Value,
    config: RunConfig,
}

#[derive(Debug, Serialize)]
struct RunConfig {
    script: PathBuf,
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the snapshot JSON; logs go to stderr.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Snapshot(args) => run_snapshot(args),
    }
}

fn load_rtos(config_path: Option<&Path>) -> anyhow::Result<Rtos> {
    let config = match config_path {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    Rtos::from_config(&config)
}

fn run_snapshot(args: SnapshotArgs) -> ExitCode {
    let rtos = match load_rtos(args.config.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let json = rtos
        .snapshot_json()
        .and_then(|value| serde_json::to_string_pretty(&value));
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Failed to serialize snapshot: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_scenario(args: RunArgs) -> ExitCode {
    let script = match load_scenario(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, args.config.clone(), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let config_path = args.config.clone().or_else(|| {
        script
            .config
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_script_path(&args.script, s))
    });

    let rtos = match load_rtos(config_path.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, config_path, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!(
        "Running scenario {} ({} steps)",
        script.name.as_deref().unwrap_or("<unnamed>"),
        script.steps.len()
    );

    let mut runner = ScenarioRunner::new(rtos);
    let steps: Vec<StepOutcome> = script
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| runner.run_step(index, step))
        .collect();

    let failures = steps.iter().filter(|s| !s.passed).count();
    let status = if failures == 0 { "pass" } else { "fail" };
    info!(
        "Scenario {}: {} of {} steps passed",
        status,
        steps.len() - failures,
        steps.len()
    );

    let snapshot = match runner.rtos().snapshot_json() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to serialize snapshot: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        scenario: script.name.clone(),
        steps_executed: steps.len(),
        failures,
        message: None,
        steps,
        script_hash: script_hash(&args.script),
        snapshot,
        config: RunConfig {
            script: args.script.clone(),
            config: config_path,
        },
    };
    write_result(args.output_dir.as_deref(), &result);

    if failures == 0 {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_ASSERT_FAIL)
    }
}

fn script_hash(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        }
        Err(_) => String::new(),
    }
}

fn write_config_error_outputs(args: &RunArgs, config_path: Option<PathBuf>, message: String) {
    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        scenario: None,
        steps_executed: 0,
        failures: 0,
        message: Some(message),
        steps: vec![],
        script_hash: script_hash(&args.script),
        snapshot: serde_json::Value::Null,
        config: RunConfig {
            script: args.script.clone(),
            config: config_path,
        },
    };
    write_result(args.output_dir.as_deref(), &result);
}

fn write_result(output_dir: Option<&Path>, result: &RunResult) {
    let Some(output_dir) = output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }
    let result_path = output_dir.join("result.json");
    match std::fs::File::create(&result_path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}
