//! Top-level CLI definition and dispatch.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use thiserror::Error;

use scenario_tester::core::config::Config;
use scenario_tester::core::errors::ScenarioError;
use scenario_tester::listing::{self, ListParams, OutputParams};
use scenario_tester::logger::{self, ActivityLog};
use scenario_tester::scenario::{PrepareOptions, ScenarioRegistry};

/// Scenario tester: enumerate and materialize scenario matrices.
#[derive(Debug, Parser)]
#[command(
    name = "scenario-tester",
    author,
    version,
    about = "Enumerate and materialize scenario matrices for integration tests",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Echo lifecycle events to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors and requested data only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the name of every scenario defined by the given manifests.
    List(ListArgs),
    /// Write one scenario to a directory.
    Output(OutputArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("sources").required(true).multiple(true).args(["files", "require"])))]
struct SourceArgs {
    /// Glob(s) of scenario manifests to load.
    #[arg(long, num_args = 1.., value_name = "GLOB")]
    files: Vec<String>,
    /// Manifest(s) to load before the globbed ones.
    #[arg(long, num_args = 1.., value_name = "PATH")]
    require: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ListArgs {
    #[command(flatten)]
    sources: SourceArgs,
    /// Print a CI job matrix; `%s` in the template is replaced by each name.
    #[arg(long, value_name = "TEMPLATE")]
    matrix: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct OutputArgs {
    #[command(flatten)]
    sources: SourceArgs,
    /// Substring of the scenario name to write.
    #[arg(long, value_name = "NAME")]
    scenario: String,
    /// Directory to write the scenario into.
    #[arg(long, value_name = "DIR")]
    outdir: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) => 3,
        }
    }
}

impl From<ScenarioError> for CliError {
    fn from(err: ScenarioError) -> Self {
        if err.is_usage_error() {
            Self::User(err.to_string())
        } else if matches!(err, ScenarioError::Serialization { .. }) {
            Self::Internal(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    if let Command::Completions(args) = &cli.command {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(args.shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let verbose = !cli.quiet && (cli.verbose || config.logging.verbose);
    logger::install(ActivityLog::from_config(&config.logging).verbose(verbose));
    if verbose {
        match &config.source {
            Some(path) => eprintln!("[ST] config: {}", path.display()),
            None => eprintln!("[ST] config: defaults"),
        }
    }

    let cwd = env::current_dir()?;
    match &cli.command {
        Command::List(args) => run_list(&cwd, args),
        Command::Output(args) => run_output(cli, &config, &cwd, args),
        Command::Completions(_) => Ok(()),
    }
}

fn list_params(cwd: &Path, sources: &SourceArgs) -> ListParams {
    ListParams {
        files: sources.files.clone(),
        require: sources.require.clone(),
        cwd: cwd.to_path_buf(),
    }
}

fn run_list(cwd: &Path, args: &ListArgs) -> Result<(), CliError> {
    let scenarios = listing::list(&list_params(cwd, &args.sources), ScenarioRegistry::global())?;
    let rendered = listing::render_list(&scenarios, args.matrix.as_deref())?;
    write_stdout(&rendered)
}

fn run_output(
    cli: &Cli,
    config: &Config,
    cwd: &Path,
    args: &OutputArgs,
) -> Result<(), CliError> {
    let params = OutputParams {
        list: list_params(cwd, &args.sources),
        scenario: args.scenario.clone(),
        outdir: args.outdir.clone(),
        prepare: PrepareOptions::from_config(config),
    };
    let report = listing::output(&params, ScenarioRegistry::global())?;
    if !cli.quiet {
        write_stdout(&format!(
            "Found scenario {}\n{} {}\n",
            report.scenario.bold(),
            "Wrote successfully to".green(),
            args.outdir.display()
        ))?;
    }
    Ok(())
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
