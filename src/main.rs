//! carbonrun CLI Entry Point
//!
//! Provides command-line interface for harness runs.
//!
//! # Usage
//!
//! ```bash
//! # Run a suite
//! carbonrun suite.yaml
//!
//! # Override the project label and sink path
//! carbonrun suite.yaml --project nightly --output /data/emissions.csv
//!
//! # Also write the aggregated report as JSON
//! carbonrun suite.yaml --report results/report.json
//!
//! # Continue past failing units and report all outcomes
//! carbonrun suite.yaml --keep-going
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use log::{error, info};

use carbonrun::execution::WorkloadRunner;
use carbonrun::metering::{CpuEnergySensor, EmissionsSink, DEFAULT_SINK_PATH};
use carbonrun::report::SessionReport;
use carbonrun::suite::parser::load_suite;
use carbonrun::{APP_NAME, VERSION};

/// Default suite file used when none is specified.
const DEFAULT_SUITE: &str = "suite.yaml";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    suite_path: String,
    project: Option<String>,
    output: Option<PathBuf>,
    report_path: Option<PathBuf>,
    keep_going: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suite_path: DEFAULT_SUITE.to_string(),
            project: None,
            output: None,
            report_path: None,
            keep_going: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Sequential Workload Harness with Energy Metering");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: carbonrun [OPTIONS] <SUITE_FILE>");
    println!();
    println!("Arguments:");
    println!("  <SUITE_FILE>        Path to suite YAML file (default: {})", DEFAULT_SUITE);
    println!();
    println!("Options:");
    println!("  --project NAME      Override the suite's project label");
    println!("  --output PATH       Emissions sink path (default: results/emissions.csv)");
    println!("  --report PATH       Write the aggregated report as JSON");
    println!("  --keep-going        Continue past failing units and report all outcomes");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  carbonrun suite.yaml");
    println!("  carbonrun suite.yaml --project nightly --output /data/emissions.csv");
    println!("  carbonrun suite.yaml --keep-going --report results/report.json");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--keep-going" => {
                config.keep_going = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--project" => {
                i += 1;
                if i >= args.len() {
                    return Err("--project requires a name argument".to_string());
                }
                config.project = Some(args[i].clone());
            }
            "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("--output requires a path argument".to_string());
                }
                config.output = Some(PathBuf::from(&args[i]));
            }
            "--report" => {
                i += 1;
                if i >= args.len() {
                    return Err("--report requires a path argument".to_string());
                }
                config.report_path = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                // Positional argument
                match positional_index {
                    0 => config.suite_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Prints a report summary and optionally persists it as JSON.
fn emit_report(report: &SessionReport, report_path: &Option<PathBuf>) {
    println!();
    println!("{}", report.summary());

    if let Some(path) = report_path {
        if let Err(e) = report.save(path) {
            error!("Failed to write report to {}: {}", path.display(), e);
        }
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    // Load suite
    info!("Loading suite: {}", config.suite_path);
    let suite = load_suite(&config.suite_path).map_err(|e| {
        error!("Failed to load suite: {}", e);
        format!("Could not load suite from '{}': {}", config.suite_path, e)
    })?;

    let project = config
        .project
        .unwrap_or_else(|| suite.project.clone());

    let sink_path = config
        .output
        .or_else(|| suite.output_file.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| DEFAULT_SINK_PATH.clone());

    info!(
        "Suite loaded: {} units, project '{}', sink {}",
        suite.len(),
        project,
        sink_path.display()
    );

    if config.keep_going {
        info!("Mode: KEEP GOING (failing units do not halt the run)");
    }

    // Create and configure runner
    let mut runner = WorkloadRunner::new();
    runner.set_continue_on_failure(config.keep_going);

    let sink = EmissionsSink::new(sink_path);
    let sensor = Box::new(CpuEnergySensor::new());

    // Execute the suite
    let start_time = Instant::now();
    let result = runner.run(&suite.units, &project, sink, sensor);
    let total_time = start_time.elapsed();

    match result {
        Ok(report) => {
            println!();
            if report.all_succeeded() {
                println!("Suite completed successfully");
            } else {
                println!("Suite completed with failures");
            }
            println!("Total execution time: {:.2?}", total_time);

            emit_report(&report, &config.report_path);

            let failed = report.failed_units();
            if failed.is_empty() {
                Ok(())
            } else {
                Err(format!(
                    "{} workload(s) failed: {}",
                    failed.len(),
                    failed.join(", ")
                )
                .into())
            }
        }
        Err(run_error) => {
            // Best-effort partial results: everything measured before
            // the failure is still reported.
            if let Some(report) = run_error.report() {
                emit_report(report, &config.report_path);
            }

            if let Some(stop_failure) = run_error.stop_failure() {
                error!("Sensor also failed to stop: {}", stop_failure);
            }

            Err(Box::new(run_error))
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
