// Declare modules
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod models;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod setup;
pub mod tap;
pub mod transform;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::process::ExitCode;
use std::time::Instant;

use self::cli::{Cli, Commands, RunArgs};
use self::config::Overrides;
use self::error::HarnessError;
use self::executor::Executor;
use self::formatter::OutputGenerator;
use self::models::{HarnessConfig, RunReport};
use self::resolver::ModuleResolver;
use self::scanner::{describe_roots, filter_by_paths, Scanner};
use self::setup::run_setup_files;

/// Initializes components and orchestrates data flow.
pub fn run() -> Result<ExitCode> {
    // 1. Parse Args
    let args = Cli::parse();

    // 2. Resolve Configuration (fatal errors stop here, before discovery)
    let overrides = match &args.command {
        Commands::Run(run) => Overrides {
            pass_with_no_tests: run.pass_with_no_tests,
            max_workers: run.jobs,
        },
        _ => Overrides::default(),
    };
    let config = config::load(args.config.as_deref(), &overrides)?;

    // 3. Dispatch
    match args.command {
        Commands::Run(run) => run_tests(&config, &run),
        Commands::List { patterns } => {
            let discovery = Scanner::new(&config)?.scan();
            let tests = filter_by_paths(discovery.tests, &patterns);
            if !tests.is_empty() {
                println!("{}", OutputGenerator::generate_list(&tests));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { specifier, from } => {
            let from_dir = match from {
                Some(dir) if dir.is_relative() => env::current_dir()
                    .context("Failed to get current directory")?
                    .join(dir),
                Some(dir) => dir,
                None => config.root_dir.clone(),
            };
            let resolved = ModuleResolver::from_config(&config).resolve(&specifier, &from_dir)?;
            println!("{}", resolved.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            println!("{}", OutputGenerator::format_json(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_tests(config: &HarnessConfig, args: &RunArgs) -> Result<ExitCode> {
    // Discover
    let discovery = Scanner::new(config)?.scan();
    let scanned = discovery.scanned;
    let tests = filter_by_paths(discovery.tests, &args.patterns);

    // Empty-suite policy
    if tests.is_empty() {
        if !config.pass_with_no_tests {
            return Err(HarnessError::NoTests {
                roots: describe_roots(&config.roots),
                searched: scanned,
            }
            .into());
        }
        log::warn!("No tests found, exiting with code 0");
        print_report(&RunReport::empty(), args.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    // Setup runs to completion before any test file starts
    let executor = Executor::new(config)?;
    let started = Instant::now();
    let setup_count = run_setup_files(config, executor.transformer())?;
    log::debug!("{} setup files done", setup_count);

    // Execute
    let files = executor.run_all(&tests)?;
    let report = RunReport::new(files, started.elapsed());
    print_report(&report, args.json)?;

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    let output = if json {
        OutputGenerator::format_json(report)?
    } else {
        OutputGenerator::generate_report(report)
    };
    println!("{}", output);
    Ok(())
}

/// Exit code for an error that escaped `run`.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let code = err.downcast_ref::<HarnessError>().map_or(2, HarnessError::exit_code);
    ExitCode::from(code)
}
