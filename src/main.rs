//! BETBOOK — token betting ledger with admin-settled events
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the ledger from disk (or creates a fresh one), and serves the
//! HTTP API until Ctrl+C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use betbook::access::AccessControl;
use betbook::api::{self, ApiState};
use betbook::config::AppConfig;
use betbook::ledger::Ledger;
use betbook::storage::JsonFileStore;

const BANNER: &str = r#"
 ____  _____ _____ ____   ___   ___  _  __
| __ )| ____|_   _| __ ) / _ \ / _ \| |/ /
|  _ \|  _|   | | |  _ \| | | | | | | ' /
| |_) | |___  | | | |_) | |_| | |_| | . \
|____/|_____| |_| |____/ \___/ \___/|_|\_\

  Token betting ledger
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Initialise structured logging before config so load warnings show
    init_logging();

    let cfg = load_config()?;

    println!("{BANNER}");
    info!(
        state_file = %cfg.ledger.state_file,
        starting_balance = %cfg.ledger.starting_balance,
        odds_mode = %cfg.odds.default_mode,
        margin = %cfg.odds.margin,
        "BETBOOK starting up"
    );

    // -- Restore or create the ledger ------------------------------------

    let store = JsonFileStore::new(&cfg.ledger.state_file);
    info!(path = %store.path().display(), "Using JSON snapshot store");
    let ledger = Ledger::open(Box::new(store), cfg.ledger.clone(), cfg.odds.clone())?;
    info!(
        users = ledger.users().len(),
        events = ledger.events().len(),
        tokens = %ledger.state().tokens_in_circulation(),
        "Ledger ready"
    );

    let admin_code = cfg.admin_code();
    if admin_code.is_none() {
        warn!(
            env = ?cfg.ledger.admin_code_env,
            "No admin code configured — admin signup and promotion are disabled"
        );
    }

    let access = AccessControl::new(admin_code).with_session_ttl(cfg.ledger.session_ttl());
    let state = Arc::new(ApiState::new(ledger, access));

    // -- Serve -----------------------------------------------------------

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| {
            format!("Invalid server address {}:{}", cfg.server.host, cfg.server.port)
        })?;

    info!("Serving. Press Ctrl+C to stop.");
    api::serve(state.clone(), addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received.");
    })
    .await?;

    // Save final state
    let ledger = state.ledger.lock().await;
    ledger.persist()?;
    info!(
        users = ledger.users().len(),
        events = ledger.events().len(),
        tokens = %ledger.state().tokens_in_circulation(),
        "BETBOOK shut down cleanly."
    );

    Ok(())
}

/// Load `BETBOOK_CONFIG` (or `config.toml`), falling back to defaults
/// when the default file is absent.
fn load_config() -> Result<AppConfig> {
    match std::env::var("BETBOOK_CONFIG") {
        Ok(path) => AppConfig::load(&path),
        Err(_) if std::path::Path::new("config.toml").exists() => AppConfig::load("config.toml"),
        Err(_) => {
            warn!("config.toml not found, using built-in defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("betbook=info"));

    let json_logging = std::env::var("BETBOOK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
