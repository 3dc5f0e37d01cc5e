//! Command-line runner for patientflow scenarios.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use patientflow::prelude::*;
use patientflow::core::init_simulation_logging_with_level;
use tracing::info;

/// Patient flow discrete-event simulation
#[derive(Parser, Debug)]
#[command(name = "patientflow")]
#[command(about = "Run healthcare queueing scenarios and summarise their trials")]
#[command(version)]
struct Args {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn", env = "PATIENTFLOW_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a trial of a scenario file or a bundled preset
    Run {
        /// Scenario TOML file
        #[arg(required_unless_present = "preset", conflicts_with = "preset")]
        scenario: Option<PathBuf>,

        /// Bundled scenario name
        #[arg(long)]
        preset: Option<String>,

        /// Number of replications (defaults to the scenario's own)
        #[arg(long, short = 'n')]
        replications: Option<usize>,

        /// Override the scenario's base seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the trial table as CSV
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write the trial table and aggregates as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the patient records of the first replication as CSV
        #[arg(long)]
        patients: Option<PathBuf>,
    },
    /// Print cross-run statistics of a saved trial CSV
    Summarize {
        /// Trial CSV written by `run --output`
        input: PathBuf,
    },
    /// Print a bundled scenario as TOML
    Preset {
        /// Preset name; omit to list them
        name: Option<String>,

        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_simulation_logging_with_level(&args.log_level);

    match execute(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Run {
            scenario,
            preset: preset_name,
            replications,
            seed,
            output,
            json,
            patients,
        } => {
            let mut config = match (scenario, preset_name) {
                (Some(path), _) => ScenarioConfig::load(path)?,
                (None, Some(name)) => preset(&name)?,
                (None, None) => return Err("either a scenario file or --preset is required".into()),
            };
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let replications = replications.unwrap_or(config.replications);

            info!(scenario = %config.name, replications, "Running trial");
            let table = trial(&config, replications)?;
            print_summary(&config.name, &table)?;

            if let Some(path) = output {
                table.export_csv(&path)?;
                println!("Trial table written to {}", path.display());
            }
            if let Some(path) = json {
                table.export_json(&path, true)?;
                println!("Trial JSON written to {}", path.display());
            }
            if let Some(path) = patients {
                let report = single_run_detailed(&config, 0)?;
                report.patients.export_csv(&path)?;
                println!(
                    "{} patient records written to {}",
                    report.patients.len(),
                    path.display()
                );
            }
        }
        Command::Summarize { input } => {
            let table = TrialResultTable::import_csv(&input)?;
            print_summary(&input.display().to_string(), &table)?;
        }
        Command::Preset { name: None, .. } => {
            for name in PRESET_NAMES {
                println!("{name}");
            }
        }
        Command::Preset {
            name: Some(name),
            output,
        } => {
            let config = preset(&name)?;
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("Scenario '{name}' written to {}", path.display());
                }
                None => print!("{}", config.to_toml_string()?),
            }
        }
    }
    Ok(())
}

fn print_summary(title: &str, table: &TrialResultTable) -> Result<(), MetricsError> {
    println!("{title}: {} replications", table.len());
    let width = table.columns().iter().map(String::len).max().unwrap_or(0);
    for (column, summary) in table.aggregates()? {
        println!("  {column:<width$}  {summary}");
    }
    Ok(())
}
