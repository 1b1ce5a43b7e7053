// Datachat - tool-calling data assistant
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use datachat::config::{load_config, Config};
use datachat::logging::init_tracing;
use datachat::orchestrator::{TurnRequest, TurnStatus};
use datachat::server::{self, AppState};
use datachat::session::{new_session_id, SessionStore, DEFAULT_TITLE};
use datachat::sql::{seed_demo, Database, SeedOptions};

#[derive(Parser)]
#[command(name = "datachat")]
#[command(author, version, about = "Ask questions about your data; the model answers with SQL and file tools")]
struct Cli {
    /// Configuration file (default: ~/.datachat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Bind address, overrides the configuration
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one turn and print its events as NDJSON
    Ask {
        message: String,
        /// Continue an existing chat
        #[arg(long)]
        session: Option<String>,
    },
    /// Create the demo schema and fill it with deterministic data
    Seed {
        /// Delete existing rows first
        #[arg(long)]
        reset: bool,
        #[arg(long, default_value_t = 50)]
        customers: usize,
        #[arg(long, default_value_t = 40)]
        products: usize,
        #[arg(long, default_value_t = 300)]
        orders: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
                config.validate()?;
            }
            server::serve(&config).await
        }
        Command::Ask { message, session } => ask(&config, message, session).await,
        Command::Seed {
            reset,
            customers,
            products,
            orders,
        } => {
            seed(
                &config,
                SeedOptions {
                    customers,
                    products,
                    orders,
                    reset,
                },
            )
            .await
        }
    }
}

async fn ask(config: &Config, message: String, session: Option<String>) -> Result<()> {
    let state = AppState::from_config(config)?;
    let session_id = session.unwrap_or_else(new_session_id);
    state
        .store
        .create(&session_id, Some(DEFAULT_TITLE), Some(state.orchestrator.model().to_string()))
        .await?;
    let history = state.store.load(&session_id).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            ctrl_c.cancel();
        }
    });

    let mut handle = state.orchestrator.start_turn(
        TurnRequest::new(session_id.clone(), message).with_history(history),
        cancel,
    );

    let mut stdout = std::io::stdout().lock();
    while let Some(event) = handle.events.recv().await {
        stdout.write_all(event.to_ndjson_line().as_bytes())?;
        stdout.flush()?;
    }
    drop(stdout);

    let outcome = handle.outcome.await.context("Turn task failed")?;
    eprintln!(
        "session {} | {} | {} model call(s)",
        session_id,
        outcome.status.as_str(),
        outcome.cycles
    );

    match outcome.status {
        TurnStatus::Failed(err) => Err(err.into()),
        _ => Ok(()),
    }
}

async fn seed(config: &Config, options: SeedOptions) -> Result<()> {
    let path = config.database_path();
    let database = Database::open(&path)?;
    let summary = seed_demo(&database, options).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    eprintln!("Seeded {}", path.display());
    Ok(())
}
