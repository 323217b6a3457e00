//! MAPGEN CLI
//!
//! Compile, run and inspect the standard recipe from the command line.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};
use config::GenerationArgs;
use mapgen_runtime::{Engine, EngineConfig, EngineError};
use mapgen_standard::standard_recipe;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mapgen")]
#[command(about = "MAPGEN - Deterministic map generation pipeline", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the recipe into an execution plan
    Compile {
        #[command(flatten)]
        generation: GenerationArgs,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile and run against the in-memory host
    Run {
        #[command(flatten)]
        generation: GenerationArgs,
        /// Compile twice and require identical fingerprints
        #[arg(long)]
        verify: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stages, steps, tags and artifacts
    Describe {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Print compile errors, then fail
fn report_engine_error(error: EngineError) -> color_eyre::Report {
    if let EngineError::Compile(failure) = &error {
        eprint!("{}", output::compile_errors(failure));
    }
    error.into()
}

fn compile(generation: &GenerationArgs, json: bool) -> Result<()> {
    let env = generation.load_env()?;
    let overrides = generation.load_overrides()?;
    let engine = Engine::new(standard_recipe()?);
    let plan = engine.compile(&env, &overrides).map_err(report_engine_error)?;
    info!(fingerprint = %plan.fingerprint().short(), steps = plan.len(), "Plan compiled");
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{}", output::plan_summary(&plan));
    }
    Ok(())
}

fn run(generation: &GenerationArgs, verify: bool, json: bool) -> Result<()> {
    let env = generation.load_env()?;
    let overrides = generation.load_overrides()?;
    let engine = Engine::new(standard_recipe()?)
        .with_config(EngineConfig::default().with_verify_determinism(verify));
    let world = engine
        .generate_mock(&env, &overrides)
        .map_err(report_engine_error)?;
    let report = &world.report;
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", output::run_report(report));
    }
    if !report.success {
        let failed: Vec<String> = report.failures().map(|o| o.step_id.to_string()).collect();
        bail!("run failed at {}", failed.join(", "));
    }
    Ok(())
}

fn describe(json: bool) -> Result<()> {
    let recipe = standard_recipe()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output::describe_json(&recipe))?);
    } else {
        println!("{}", output::describe(&recipe));
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Compile { generation, json } => compile(&generation, json),
        Commands::Run {
            generation,
            verify,
            json,
        } => run(&generation, verify, json),
        Commands::Describe { json } => describe(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "mapgen", "run", "--seed", "9", "--width", "16", "--verify", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Run {
                generation, verify, ..
            } => {
                assert!(verify);
                assert_eq!(generation.seed, Some(9));
                assert_eq!(generation.width, Some(16));
                assert_eq!(generation.height, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_commands_succeed_with_defaults() {
        let generation = GenerationArgs::default();
        compile(&generation, true).unwrap();
        run(&generation, true, false).unwrap();
        describe(false).unwrap();
    }
}
