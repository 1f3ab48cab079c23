//! obslog server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), merged
//! with `OBSLOG_`-prefixed environment variables, opens the message
//! database and the configured exposure registries, and serves the JSON
//! API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use obslog_api::{AppState, ServerConfig};
use obslog_core::message::SITE_ID_LEN;
use obslog_store_sqlite::{SqliteMessageStore, SqliteRegistry};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Exposure log web service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("OBSLOG"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.site_id.len() > SITE_ID_LEN {
    anyhow::bail!(
      "site_id {:?} too long; max length={SITE_ID_LEN}",
      server_cfg.site_id
    );
  }
  if server_cfg.registries.is_empty() {
    anyhow::bail!("at least one registry database must be configured");
  }

  // Open the message store.
  let store = SqliteMessageStore::open(&server_cfg.db_path)
    .await
    .with_context(|| {
      format!("failed to open message database at {:?}", server_cfg.db_path)
    })?;

  // Open the exposure registries, in configured search order.
  let mut registries = Vec::with_capacity(server_cfg.registries.len());
  for path in &server_cfg.registries {
    let registry = SqliteRegistry::open(path)
      .await
      .with_context(|| format!("failed to open registry at {path:?}"))?;
    registries.push(registry);
  }
  let registry_uris: Vec<String> = server_cfg
    .registries
    .iter()
    .map(|path| path.display().to_string())
    .collect();

  // Build application state.
  let state = AppState {
    site_id:       server_cfg.site_id.clone(),
    store:         Arc::new(store),
    registries:    Arc::new(registries),
    registry_uris: Arc::new(registry_uris),
  };

  let app = obslog_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
