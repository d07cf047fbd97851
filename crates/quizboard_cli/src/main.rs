use anyhow::Context;
use clap::{Parser, Subcommand};
use quizboard_core::{LoggingConfig, QuizboardConfig};
use quizboard_gateway::GatewayServer;
use quizboard_store::{ProgressionEngine, SqliteStore};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "QUIZBOARD_CONFIG", default_value = "quizboard.toml")]
    config: String,

    /// SQLite database path (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print a leaderboard as JSON
    Leaderboard {
        /// Category name, or "overall"
        #[arg(default_value = "overall")]
        category: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print app-wide statistics as JSON
    Stats,
    /// Print a user's profile as JSON
    Profile { user_id: String },
}

fn init_tracing(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &cfg.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "quizboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if cfg.json {
                builder.json().with_writer(writer).init();
            } else {
                builder.with_ansi(false).with_writer(writer).init();
            }
            Some(guard)
        }
        None => {
            if cfg.json {
                builder.json().with_writer(std::io::stderr).init();
            } else {
                builder.with_writer(std::io::stderr).init();
            }
            None
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = QuizboardConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.store.db_path = db;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _log_guard = init_tracing(&config.logging);

    info!("Opening store at {}...", config.store.db_path);
    let db = Arc::new(
        SqliteStore::with_config(&config.store)
            .await
            .with_context(|| format!("Failed to open database {}", config.store.db_path))?,
    );
    let engine = Arc::new(
        ProgressionEngine::new(db, config.progression.clone())
            .await
            .context("Failed to initialise progression engine")?,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = GatewayServer::new(engine, &config.server.host, config.server.port);
            info!("Starting Quizboard API on {}", server.addr());
            tokio::select! {
                res = server.serve() => res?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
        Command::Leaderboard { category, limit } => {
            print_json(&engine.get_leaderboard(&category, limit).await?)?;
        }
        Command::Stats => {
            print_json(&engine.get_app_stats().await?)?;
        }
        Command::Profile { user_id } => {
            print_json(&engine.get_profile(&user_id).await?)?;
        }
    }

    Ok(())
}
