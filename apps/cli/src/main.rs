//! zipfetch CLI - Download a zip archive and unpack it
//!
//! Streams an archive over HTTP with live progress, extracts it into a
//! destination folder and removes the archive afterwards. A failed or
//! interrupted run leaves nothing behind.

mod commands;
mod output;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

/// zipfetch - Download and unpack zip archives
#[derive(Parser)]
#[command(name = "zipfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human", env = "ZIPFETCH_OUTPUT")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true, env = "ZIPFETCH_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Download an archive and extract it
    Fetch(FetchArgs),

    /// Remove a leftover archive and destination folder
    Clean {
        /// Archive file to delete
        #[arg(long, env = "ZIPFETCH_ARCHIVE")]
        archive: PathBuf,

        /// Destination folder to delete
        #[arg(long, env = "ZIPFETCH_DEST")]
        dest: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// URL of the zip archive
    #[arg(env = "ZIPFETCH_URL")]
    url: Url,

    /// Folder to extract into
    #[arg(short, long, env = "ZIPFETCH_DEST")]
    dest: PathBuf,

    /// Where to keep the archive while extracting [default: next to the destination]
    #[arg(short, long, env = "ZIPFETCH_ARCHIVE")]
    archive: Option<PathBuf>,

    /// Expected SHA-256 of the archive, hex encoded
    #[arg(long, env = "ZIPFETCH_SHA256")]
    sha256: Option<String>,

    /// Give up on the download after this many seconds
    #[arg(long, env = "ZIPFETCH_TIMEOUT")]
    timeout: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, env = "ZIPFETCH_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Largest write to the archive file, in bytes
    #[arg(long, env = "ZIPFETCH_CHUNK_SIZE")]
    chunk_size: Option<usize>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Fetch(args) => commands::fetch(args, cli.output).await,

        Commands::Clean { archive, dest } => {
            commands::clean(&archive, &dest, cli.output).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "zipfetch", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
