//! raglens CLI: run RAG evaluations from the terminal.
//!
//! Scores a running RAG service with an LLM judge and prints the aggregate
//! retrieval and generation reports.

mod commands;
mod progress;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// raglens: LLM-judged evaluation for RAG services
#[derive(Parser, Debug)]
#[command(name = "raglens", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./raglens.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress progress bars and non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the retrieval and generation evaluations
    Eval {
        /// JSON fixtures file (uses the built-in set if omitted)
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        /// Run only one of the two evaluations
        #[arg(long, value_enum)]
        only: Option<EvalScope>,

        /// Seed for the noisy query generator
        #[arg(long)]
        seed: Option<u64>,

        /// Also write both reports to this file as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload every PDF in a directory to the RAG service
    Upload {
        /// Directory containing the documents
        dir: PathBuf,

        /// Chunk size passed to the indexer
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Ask the RAG service one question
    Ask {
        question: String,

        #[arg(short, long)]
        temperature: Option<f64>,

        /// Number of documents to retrieve
        #[arg(short, long)]
        n_docs: Option<usize>,
    },
    /// Print the built-in fixtures as JSON
    Fixtures,
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EvalScope {
    Retrieval,
    Generation,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env (or the requested file) before reading configuration
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "raglens", "raglens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "raglens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let config = raglens_core::config::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    commands::handle_command(cli.command, config, cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_eval_flags() {
        let cli = Cli::try_parse_from([
            "raglens", "-v", "eval", "--only", "retrieval", "--seed", "42", "-o", "out.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Eval {
                fixtures,
                only,
                seed,
                output,
            } => {
                assert!(fixtures.is_none());
                assert_eq!(only, Some(EvalScope::Retrieval));
                assert_eq!(seed, Some(42));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ask_with_global_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "raglens",
            "ask",
            "What are Python generators?",
            "--n-docs",
            "3",
            "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Ask { n_docs: Some(3), temperature: None, .. }
        ));
    }

    #[test]
    fn test_upload_requires_dir() {
        assert!(Cli::try_parse_from(["raglens", "upload"]).is_err());
    }

    #[test]
    fn test_unknown_scope_rejected() {
        assert!(Cli::try_parse_from(["raglens", "eval", "--only", "both"]).is_err());
    }
}
