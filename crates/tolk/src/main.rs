//! tolk - human-supervised translation agent

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;
mod review;

use commands::{
    chat_command, init_command, segment_command, setup_command, status_command, ChatArgs,
};

/// tolk - translate documents with an agent, one reviewed segment at a time
#[derive(Parser)]
#[command(name = "tolk")]
#[command(about = "◆ Human-supervised translation agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and data directory
    Init,
    /// Interactive setup wizard
    Setup,
    /// Show configuration status
    Status,
    /// Start a translation session
    Chat {
        /// Send one message, then exit
        #[arg(short, long)]
        message: Option<String>,
        /// Workspace directory (overrides the config)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Accept every draft without review
        #[arg(long)]
        auto_approve: bool,
        /// Target language (overrides the config)
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Split a file into translatable segments
    Segment {
        /// File to segment
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (label, result) = match cli.command {
        Commands::Init => ("Init", init_command().await),
        Commands::Setup => ("Setup", setup_command().await),
        Commands::Status => ("Status", status_command().await),
        Commands::Chat {
            message,
            dir,
            auto_approve,
            language,
        } => {
            let args = ChatArgs {
                message,
                dir,
                auto_approve,
                language,
            };
            ("Chat", chat_command(args).await)
        }
        Commands::Segment { file } => ("Segment", segment_command(&file).await),
    };

    if let Err(e) = result {
        error!("{} failed: {:#}", label, e);
        std::process::exit(1);
    }
}
