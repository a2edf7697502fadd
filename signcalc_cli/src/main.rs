//! # Signcalc CLI
//!
//! JSON in, JSON out runner for the design engine.
//!
//! ```text
//! signcalc solve request.json
//! signcalc batch requests.json --workers 4
//! signcalc sections --moment-kipin 600 --family HSS_SQUARE --length-ft 20
//! signcalc tradeoff --moment-kipin 600 --length-ft 20 --primary weight
//! signcalc calibrate observations.json --store constants.json --publish
//! signcalc constants --store constants.json
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `warn`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use signcalc_core::calibration::{tune, CalibrationReport, DepthCalibrationModel, Observation, TuningSettings};
use signcalc_core::foundation::DepthInput;
use signcalc_core::section_filter::{SectionQuery, StrengthRequirement};
use signcalc_core::standards::sections::SectionFamily;
use signcalc_core::standards::store::ConstantsStore;
use signcalc_core::{
    file_io, load_constants_store, save_constants_store, BatchOrchestrator, CalcError, CalcResult, DesignEngine,
    DesignRequest, EngineSettings, FileLock, StandardsSnapshot,
};

#[derive(Parser)]
#[command(name = "signcalc", version, about = "Sign structure design engine")]
struct Cli {
    /// Engine settings JSON
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Published constants history JSON
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Constants version to run against (default: latest in the store)
    #[arg(long = "constants-version", global = true)]
    constants_version: Option<String>,

    /// Compact JSON output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Design one sign
    Solve { request: PathBuf },
    /// Design every sign in a JSON array
    Batch {
        requests: PathBuf,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// List catalog sections that satisfy a demand
    Sections {
        #[arg(long, conflicts_with = "sx_in3")]
        moment_kipin: Option<f64>,
        #[arg(long)]
        sx_in3: Option<f64>,
        #[arg(long)]
        family: Option<String>,
        #[arg(long)]
        length_ft: Option<f64>,
    },
    /// Pareto front of pole sections (cost, weight, margin)
    Tradeoff {
        #[arg(long)]
        moment_kipin: f64,
        #[arg(long)]
        length_ft: f64,
        #[arg(long)]
        family: Option<String>,
        #[arg(long, default_value = "cost")]
        primary: String,
    },
    /// Tune the lateral bearing ratio against observed embedment depths
    Calibrate {
        observations: PathBuf,
        #[arg(long, default_value = "")]
        note: String,
        /// Publish the result as a new constants version (needs --store)
        #[arg(long)]
        publish: bool,
    },
    /// Show the constants table and version history
    Constants,
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> CalcResult<()> {
    let text = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(CalcError::serialization)?;
    println!("{}", text);
    Ok(())
}

fn open_store(path: Option<&Path>) -> CalcResult<ConstantsStore> {
    match path {
        Some(p) if p.exists() => load_constants_store(p),
        _ => Ok(ConstantsStore::default()),
    }
}

fn build_engine(cli: &Cli) -> CalcResult<DesignEngine> {
    let settings = match &cli.settings {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };
    let store = open_store(cli.store.as_deref())?;
    let constants = match &cli.constants_version {
        Some(v) => store.version(v)?,
        None => store.current()?,
    };
    let snapshot = StandardsSnapshot::builtin()?.with_constants(constants);
    info!(
        constants = snapshot.constants_version(),
        catalog = snapshot.catalog_version(),
        "engine ready"
    );
    DesignEngine::new(snapshot, settings)
}

fn parse_family(code: Option<&str>) -> CalcResult<Option<SectionFamily>> {
    code.map(SectionFamily::from_code).transpose()
}

fn run(cli: Cli) -> CalcResult<()> {
    match &cli.command {
        Command::Solve { request } => {
            let engine = build_engine(&cli)?;
            let request: DesignRequest = file_io::load_json(request)?;
            print_json(&engine.solve(&request), cli.compact)
        }
        Command::Batch { requests, workers } => {
            let mut engine = build_engine(&cli)?;
            if workers.is_some() {
                let mut settings = engine.settings().clone();
                settings.batch.workers = *workers;
                engine = DesignEngine::new(engine.snapshot().clone(), settings)?;
            }
            let requests: Vec<DesignRequest> = file_io::load_json(requests)?;
            let orchestrator = BatchOrchestrator::new(Arc::new(engine))?;
            print_json(&orchestrator.run(&requests), cli.compact)
        }
        Command::Sections {
            moment_kipin,
            sx_in3,
            family,
            length_ft,
        } => {
            let requirement = match (moment_kipin, sx_in3) {
                (Some(mu), _) => StrengthRequirement::Moment { mu_kipin: *mu },
                (None, Some(sx)) => StrengthRequirement::SectionModulus { sx_in3: *sx },
                (None, None) => return Err(CalcError::missing_field("moment_kipin or sx_in3")),
            };
            let mut query = SectionQuery::new(requirement);
            if let Some(f) = parse_family(family.as_deref())? {
                query = query.with_family(f);
            }
            if let Some(l) = length_ft {
                query = query.with_unbraced_length(*l);
            }
            let engine = build_engine(&cli)?;
            print_json(&engine.select_sections(&query), cli.compact)
        }
        Command::Tradeoff {
            moment_kipin,
            length_ft,
            family,
            primary,
        } => {
            let engine = build_engine(&cli)?;
            let family = parse_family(family.as_deref())?;
            print_json(
                &engine.pole_tradeoff(*moment_kipin, *length_ft, family, primary),
                cli.compact,
            )
        }
        Command::Calibrate {
            observations,
            note,
            publish,
        } => {
            let observations: Vec<Observation<DepthInput>> = file_io::load_json(observations)?;
            let model = DepthCalibrationModel {
                settings: match &cli.settings {
                    Some(path) => EngineSettings::load(path)?.depth,
                    None => Default::default(),
                },
            };

            // Hold the lock from read to write so two publishers cannot interleave
            let _lock = match (&cli.store, *publish) {
                (Some(path), true) => Some(FileLock::acquire(path, whoami())?),
                (None, true) => return Err(CalcError::missing_field("store")),
                _ => None,
            };
            let store = open_store(cli.store.as_deref())?;
            let current = store.current()?;
            let suggestion = tune(&model, &observations, &current, &TuningSettings::default())?;
            let report = CalibrationReport::new(&current.version, vec![suggestion], note);
            if *publish {
                if let Some(table) = report.publish(&store)? {
                    if let Some(path) = &cli.store {
                        save_constants_store(&store, path)?;
                    }
                    info!(version = %table.version, "published");
                }
            }
            print_json(&report, cli.compact)
        }
        Command::Constants => {
            let store = open_store(cli.store.as_deref())?;
            let table = match &cli.constants_version {
                Some(v) => store.version(v)?,
                None => store.current()?,
            };
            print_json(
                &serde_json::json!({
                    "versions": store.versions()?,
                    "table": table.as_ref(),
                }),
                cli.compact,
            )
        }
    }
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "signcalc".to_string())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            match serde_json::to_string_pretty(&e) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", e),
            }
            ExitCode::FAILURE
        }
    }
}
