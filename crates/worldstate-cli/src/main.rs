use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod world;

use config::Config;

/// worldstate: Maintenance tool for the persisted worldstate document.
///
/// Inspect and migrate the stored document, and compute or apply
/// structural patches between two snapshots.
#[derive(Parser)]
#[command(name = "worldstate", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to `worldstate.toml` if it exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored version and pending migrations.
    Status {
        /// Path to the state file.
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Run pending migrations on the state file.
    Migrate {
        /// Path to the state file.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Directory holding uploaded files.
        #[arg(long)]
        files_root: Option<PathBuf>,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,

        /// Skip the backup copy of the state file.
        #[arg(long)]
        no_backup: bool,
    },

    /// List all registered migrations.
    Migrations,

    /// Print the patch that turns one JSON document into another.
    Diff {
        /// The earlier snapshot.
        old: PathBuf,

        /// The later snapshot.
        new: PathBuf,
    },

    /// Apply a patch produced by `diff` and print the result.
    Apply {
        /// The snapshot the patch was computed against.
        base: PathBuf,

        /// The `{ patch, deletedKeys }` file.
        patch: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    init_tracing(&config.log);

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Status { state } => commands::status(&config.with_overrides(state, None)),
        Commands::Migrate {
            state,
            files_root,
            yes,
            no_backup,
        } => commands::migrate(&config.with_overrides(state, files_root), yes, no_backup).await,
        Commands::Migrations => commands::migrations(),
        Commands::Diff { old, new } => commands::diff(&old, &new),
        Commands::Apply { base, patch } => commands::apply(&base, &patch),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Log to stderr so command output stays machine readable.
fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
