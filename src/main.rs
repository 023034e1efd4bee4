//! # CRM Filler CLI (`crmf`)
//!
//! ## Usage
//!
//! ```bash
//! crmf --config ./config/crm.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crmf init` | Create the data directory and any missing collection files |
//! | `crmf state` | Print all four collections as JSON |
//! | `crmf extract <file>` | Propose CRM changes for a meeting (`-` reads stdin) |
//! | `crmf apply <file>` | Merge a saved extraction or table payload into the store |
//! | `crmf serve` | Start the HTTP server |
//!
//! JSON goes to stdout; logs go to stderr. Set `RUST_LOG` to change the
//! log filter (default `crm_filler=info,tower_http=info`).

use clap::{Parser, Subcommand};
use crm_filler::config::{self, Config};
use crm_filler::import::read_apply_payload;
use crm_filler::json_store::JsonFileStore;
use crm_filler::llm::DisabledGenerator;
use crm_filler::server;
use crm_filler::service::CrmService;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// CRM Filler CLI: turn meeting notes into CRM updates.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crm.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crmf",
    about = "CRM Filler: turn meeting notes into structured CRM updates",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and empty collection files.
    ///
    /// Existing files are never touched, so running it twice is safe.
    Init,

    /// Print the current contents of all four collections.
    State,

    /// Extract proposed changes from meeting notes.
    Extract {
        /// Notes file, or `-` for stdin.
        input: PathBuf,

        /// Company named in the meeting.
        #[arg(long)]
        company: Option<String>,

        /// Contact named in the meeting.
        #[arg(long)]
        contact: Option<String>,

        /// Apply the proposals right away.
        #[arg(long)]
        apply: bool,
    },

    /// Apply a saved extraction result or table payload.
    Apply {
        /// JSON file, or `-` for stdin.
        input: PathBuf,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_filler=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = JsonFileStore::new(&cfg.store);
            let created = store.init()?;
            for path in &created {
                println!("created {}", path.display());
            }
            println!("Data directory ready: {}", store.dir().display());
        }
        Commands::State => {
            let state = offline_service(&cfg).state().await?;
            print_json(&state)?;
        }
        Commands::Extract {
            input,
            company,
            contact,
            apply,
        } => {
            let notes = read_input(&input)?;
            let service = CrmService::from_config(&cfg)?;
            let extracted = service
                .run_extraction(&notes, company.as_deref(), contact.as_deref())
                .await?;

            if apply {
                let outcome = service.run_apply(&extracted).await?;
                print_json(&json!({
                    "extracted": extracted,
                    "mapping": outcome.mapping,
                    "warnings": outcome.warnings,
                }))?;
            } else {
                print_json(&extracted)?;
            }
        }
        Commands::Apply { input } => {
            let payload: serde_json::Value = serde_json::from_str(&read_input(&input)?)?;
            let extraction = read_apply_payload(payload)?;
            let outcome = offline_service(&cfg).run_apply(&extraction).await?;
            print_json(&json!({
                "mapping": outcome.mapping,
                "warnings": outcome.warnings,
            }))?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Service for commands that never call the model.
fn offline_service(cfg: &Config) -> CrmService {
    CrmService::with_generator(cfg, Arc::new(DisabledGenerator))
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
