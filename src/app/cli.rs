use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Discover and run the test files declared in harness.toml"
)]
pub struct Cli {
    /// Configuration file to load (defaults to ./harness.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run setup files, then every discovered test file
    Run(RunArgs),

    /// Print the test files that would run
    List {
        /// Only keep files whose path contains one of these strings
        patterns: Vec<String>,
    },

    /// Resolve a module specifier the way setup files are resolved
    Resolve {
        specifier: String,

        /// Directory relative specifiers start from (defaults to the root dir)
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Print the loaded configuration as JSON
    Config,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Only run files whose path contains one of these strings
    pub patterns: Vec<String>,

    /// Succeed when no test file matches
    #[arg(long)]
    pub pass_with_no_tests: bool,

    /// Number of test files run in parallel
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}
