//! solbuild: compiles a tree of solidity sources into a single artifact bundle

use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use solbuild::{BuildConfig, CacheMode, DiagnosticsPolicy, Solc};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

const DEFAULT_SOURCES: &str = "source/contracts";
const DEFAULT_OUTPUT: &str = "output/contracts/contracts.json";

#[derive(Debug, Parser)]
#[command(name = "solbuild", version, about = "Incremental solidity builds", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile the sources unless nothing changed since the last build
    Build(BuildArgs),

    /// Show whether the artifact bundle is up to date
    Status {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Debug, Args)]
struct ProjectArgs {
    /// Build configuration file (json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root directory of the solidity sources
    #[arg(long, value_name = "DIR")]
    sources: Option<PathBuf>,

    /// The artifact bundle to write
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Additional substring or glob of source paths to skip
    #[arg(long, value_name = "PAT")]
    exclude: Vec<String>,

    /// The solc binary to use
    #[arg(long, env = "SOLC_PATH", value_name = "PATH")]
    solc: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Number of optimizer runs
    #[arg(long, value_name = "N")]
    runs: Option<usize>,

    /// Compile even if no source changed
    #[arg(long)]
    force: bool,

    /// Detect changes by content instead of modification time
    #[arg(long, conflicts_with = "force")]
    content_hash: bool,

    /// Only abort on errors, warnings are logged
    #[arg(long)]
    allow_warnings: bool,
}

impl ProjectArgs {
    /// Loads the config file, if any, and applies the command line overrides
    fn config(&self) -> Result<BuildConfig> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load(path)
                .wrap_err_with(|| format!("failed to load config {}", path.display()))?,
            None => BuildConfig::new(DEFAULT_SOURCES, DEFAULT_OUTPUT),
        };
        if let Some(sources) = &self.sources {
            config.contract_source_root = sources.clone();
        }
        if let Some(out) = &self.out {
            config.contract_output_path = out.clone();
        }
        config.exclude.extend(self.exclude.iter().cloned());
        if let Some(solc) = &self.solc {
            config.solc = Some(solc.clone());
        }
        Ok(config)
    }
}

impl BuildArgs {
    fn config(&self) -> Result<BuildConfig> {
        let mut config = self.project.config()?;
        if let Some(runs) = self.runs {
            config.optimizer_runs = runs;
        }
        if self.force {
            config.cache = CacheMode::Disabled;
        } else if self.content_hash {
            config.cache = CacheMode::ContentHash;
        }
        if self.allow_warnings {
            config.diagnostics = DiagnosticsPolicy::AbortOnError;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build(args) => build(args.config()?),
        Commands::Status { project } => status(project.config()?),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("solbuild=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("solbuild=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn build(config: BuildConfig) -> Result<()> {
    let project = config.project()?;
    let output = project
        .compile()
        .wrap_err_with(|| format!("failed to build {}", config.contract_source_root.display()))?;
    if output.is_unchanged() {
        println!("No files changed, compilation skipped");
    } else {
        println!(
            "{} {} contracts to {}",
            Paint::green("Compiled"),
            output.bundle().len(),
            config.contract_output_path.display()
        );
    }
    Ok(())
}

fn status(config: BuildConfig) -> Result<()> {
    let project = config.project()?;
    println!("{}", solc_version(&project.compiler));
    if project.is_cache_valid() {
        println!("{} {}", Paint::green("Up to date:"), config.contract_output_path.display());
        return Ok(())
    }
    match project.uncached_files() {
        Ok(files) => {
            println!("{} {} changed files", Paint::yellow("Stale:"), files.len());
            for file in files {
                println!("  {}", file.display());
            }
        }
        Err(err) => {
            println!("{} {}", Paint::yellow("Not built:"), err);
        }
    }
    Ok(())
}

/// The version of the configured solc, or why it could not be determined
fn solc_version(solc: &Solc) -> String {
    match solc.version() {
        Ok(version) => format!("{} {}", Paint::green("solc"), version),
        Err(err) => format!("{} {} ({})", Paint::yellow("solc not found:"), solc.0.display(), err),
    }
}
