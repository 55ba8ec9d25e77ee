//! # docchat CLI
//!
//! The `docchat` binary initializes the database and runs the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{config, db, migrate, server};

/// docchat — a retrieval-augmented document chat service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with database, upload, index, model, and server settings.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — upload documents and chat with them via retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// sessions, messages). This command is idempotent.
    Init,

    /// Start the HTTP API server.
    ///
    /// Serves document upload, session management, and RAG queries on the
    /// configured bind address.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("database initialized at {}", config.db.path.display());
        }
        Commands::Serve => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            server::run_server(&config, pool).await?;
        }
    }

    Ok(())
}
