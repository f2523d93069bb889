#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, WrapErr};
use solmc_ast::Program;
use solmc_harness::{DefaultCollaborators, translate};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "solmc", version, about = "Translate annotated contract ASTs into C verification models")]
struct Cli {
    /// Log debug output from every stage.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Translate a JSON-encoded program into a C model
    Translate {
        /// Annotated AST exported by the front end
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model configuration; defaults to the nearest `solmc.toml`
        #[arg(long)]
        config: Option<PathBuf>,

        /// Advance block number and timestamp together
        #[arg(long, default_value_t = false)]
        lockstep_time: bool,

        /// Number of model addresses
        #[arg(long)]
        addresses: Option<u64>,

        /// Contract to instantiate as an actor (repeatable)
        #[arg(long = "actor")]
        actors: Vec<String>,
    },

    /// Print the runtime header the generated models include
    Runtime {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_program(path: &Path) -> miette::Result<Program> {
    let raw = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .into_diagnostic()
        .wrap_err_with(|| format!("{} is not an annotated program", path.display()))
}

fn write_output(output: Option<&Path>, text: &str) -> miette::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "model written");
            Ok(())
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Translate {
            input,
            output,
            config,
            lockstep_time,
            addresses,
            actors,
        } => {
            let overrides = Overrides {
                lockstep_time,
                address_count: addresses,
                actors,
            };
            let config = config::resolve_config(&input, config.as_deref(), overrides)?;
            let program = read_program(&input)?;
            config::check_actors(&config, &program)?;

            let collab = DefaultCollaborators::build(&program);
            let model = translate(&program, &config, collab.collaborators())?;
            write_output(output.as_deref(), &model.to_string())
        }
        Cmd::Runtime { output } => write_output(output.as_deref(), &solmc_backend_c::runtime_header()),
    }
}
