//! ovation-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, connects the hosted identity service adapter, and serves
//! the JSON API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use ovation_api::AppState;
use ovation_auth_http::{HttpIdentityProvider, ProviderConfig};
use ovation_core::{
  config::EngineConfig,
  vote::{Artist, ArtistId},
};
use ovation_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ovation voting API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// An artist catalog entry seeded at startup.
#[derive(Debug, Clone, Deserialize)]
struct ArtistSeed {
  id:   String,
  name: String,
  #[serde(default = "default_active")]
  active: bool,
}

fn default_active() -> bool { true }

/// Runtime server configuration, deserialised from `config.toml` plus the
/// `OVATION_`-prefixed environment.
#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  host:       String,
  port:       u16,
  store_path: PathBuf,
  auth:       ProviderConfig,
  #[serde(default)]
  engine:     EngineConfig,
  #[serde(default)]
  artists:    Vec<ArtistSeed>,
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
    .add_source(config::Environment::with_prefix("OVATION").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open the store and seed the artist catalog.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;
  let store = Arc::new(store);

  for seed in &server_cfg.artists {
    let artist_id = ArtistId::new(&seed.id)
      .with_context(|| format!("invalid artist id {:?} in config", seed.id))?;
    store
      .upsert_artist(Artist {
        artist_id,
        name: seed.name.clone(),
        is_active: seed.active,
      })
      .await
      .context("failed to seed artist catalog")?;
  }

  // Connect the identity service adapter and build application state.
  let provider = HttpIdentityProvider::new(server_cfg.auth.clone())
    .context("failed to build identity service client")?;
  let state = AppState::new(provider, store, server_cfg.engine.clone());

  let app = ovation_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
