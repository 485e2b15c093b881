//! examkit CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examkit", version, about = "Terminal assessment session driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test interactively
    Run {
        /// Path to a .toml exam definition
        #[arg(long)]
        exam: PathBuf,

        /// User id the attempt is recorded under
        #[arg(long)]
        user: String,

        /// Directory attempt records are stored in
        #[arg(long, default_value = "./examkit-attempts")]
        store: PathBuf,

        /// Shuffle seed for a reproducible question order
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Validate an exam definition file
    Validate {
        /// Path to a .toml exam definition
        #[arg(long)]
        exam: PathBuf,
    },

    /// List stored attempts
    History {
        /// Directory attempt records are stored in
        #[arg(long, default_value = "./examkit-attempts")]
        store: PathBuf,

        /// Only show attempts for this user
        #[arg(long)]
        user: Option<String>,
    },

    /// Create a starter exam definition
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examkit=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            exam,
            user,
            store,
            seed,
        } => commands::run::execute(exam, user, store, seed).await,
        Commands::Validate { exam } => commands::validate::execute(exam),
        Commands::History { store, user } => commands::history::execute(store, user),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
