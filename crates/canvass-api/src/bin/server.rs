//! `server`: the canvass system of record.
//!
//! Settings come from a TOML file (`--config`, default `config.toml`, may be
//! absent) with `CANVASS_*` environment variables layered on top, e.g.
//! `CANVASS_PORT=9000` or `CANVASS_STORE_PATH=~/canvass.db`.
//!
//! Run with `--hash-password` to turn a password read from stdin into the
//! argon2 PHC string expected in `auth_password_hash`.

use std::{
  io::{self, BufRead, Write},
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use canvass_api::{AppState, ServerConfig};
use canvass_store_sqlite::SqliteRecordStore;
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "canvass API server")]
struct Cli {
  /// TOML settings file; a missing file is not an error.
  #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
  config: PathBuf,

  /// Listen on this port instead of the configured one.
  #[arg(long)]
  port: Option<u16>,

  /// Read a password from stdin, print its argon2 hash and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    println!("{}", hash_password(&prompt_password()?)?);
    return Ok(());
  }

  let mut settings = load_settings(&cli.config)?;
  if let Some(port) = cli.port {
    settings.port = port;
  }
  serve(settings).await
}

fn load_settings(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("CANVASS"))
    .build()
    .with_context(|| format!("reading settings from {}", path.display()))?
    .try_deserialize()
    .context("invalid server settings")
}

async fn serve(settings: ServerConfig) -> anyhow::Result<()> {
  let store_path = home_relative(&settings.store_path);
  let store = SqliteRecordStore::open(&store_path)
    .await
    .with_context(|| format!("opening store at {}", store_path.display()))?;

  let mut state = AppState::new(Arc::new(store)).with_min_area(settings.min_territory_area_m2);
  if let Some(auth) = settings.auth() {
    state = state.with_auth(auth);
  } else {
    tracing::warn!("auth_username/auth_password_hash not set; /api is open");
  }
  let app = canvass_api::router(state).layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", settings.host, settings.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("binding {address}"))?;
  tracing::info!(%address, store = %store_path.display(), "canvass server listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;
  tracing::info!("server stopped");
  Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where there is one.
async fn shutdown_signal() {
  let interrupt = async {
    if let Err(err) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %err, "cannot listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(err) => {
        tracing::error!(error = %err, "cannot listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = interrupt => tracing::info!("interrupted; shutting down"),
    () = terminate => tracing::info!("terminated; shutting down"),
  }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| anyhow!("hashing password: {e}"))
}

fn prompt_password() -> anyhow::Result<String> {
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line).context("reading password")?;
  let password = line.trim_end_matches(['\r', '\n']);
  if password.is_empty() {
    return Err(anyhow!("empty password"));
  }
  Ok(password.to_owned())
}

/// `~/x` → `$HOME/x`; anything else is returned as is.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
