//! Wiring for the `rollcall` server binary: configuration, store, ML client,
//! admin bootstrap and the HTTP application.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::PasswordHash;
use axum::Router;
use rollcall_api::{AppState, api_router};
use rollcall_core::{
  Error as CoreError,
  attendance::AttendanceService,
  model::{NewUser, Role},
  repo::Repositories,
  store::DocumentStore,
  token::{Algorithm, TokenCodec},
};
use rollcall_ml::{MlClient, MlConfig};
use rollcall_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                String,
  #[serde(default = "defaults::port")]
  pub port:                u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:          PathBuf,
  pub token_secret:        String,
  /// One of `HS256`, `HS384`, `HS512`.
  #[serde(default = "defaults::token_algorithm")]
  pub token_algorithm:     String,
  #[serde(default = "defaults::token_ttl_minutes")]
  pub token_ttl_minutes:   i64,
  #[serde(default = "defaults::ml_base_url")]
  pub ml_base_url:         String,
  #[serde(default = "defaults::ml_timeout_secs")]
  pub ml_timeout_secs:     u64,
  /// When both admin fields are set, this account is ensured at startup.
  #[serde(default)]
  pub admin_email:         Option<String>,
  /// PHC string produced by `rollcall --hash-password`.
  #[serde(default)]
  pub admin_password_hash: Option<String>,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".into() }
  pub fn port() -> u16 { 8080 }
  pub fn store_path() -> PathBuf { PathBuf::from("rollcall.db") }
  pub fn token_algorithm() -> String { "HS256".into() }
  pub fn token_ttl_minutes() -> i64 { rollcall_api::DEFAULT_TOKEN_TTL_MINUTES }
  pub fn ml_base_url() -> String { "http://127.0.0.1:5000".into() }
  pub fn ml_timeout_secs() -> u64 { 10 }
}

impl ServerConfig {
  /// Load from an optional TOML file overlaid by `ROLLCALL_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ROLLCALL"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn token_codec(&self) -> anyhow::Result<TokenCodec> {
    let algorithm: Algorithm = self
      .token_algorithm
      .parse()
      .map_err(|_| anyhow::anyhow!("unknown token algorithm {:?}", self.token_algorithm))?;
    Ok(TokenCodec::new(self.token_secret.as_bytes(), algorithm)?)
  }

  pub fn ml_client(&self) -> anyhow::Result<MlClient> {
    MlClient::new(MlConfig {
      base_url: self.ml_base_url.clone(),
      timeout:  self.ml_timeout(),
    })
    .context("failed to build ML client")
  }

  pub fn ml_timeout(&self) -> Duration { Duration::from_secs(self.ml_timeout_secs) }

  pub fn token_ttl(&self) -> anyhow::Result<chrono::Duration> {
    if self.token_ttl_minutes <= 0 {
      anyhow::bail!("token_ttl_minutes must be positive");
    }
    chrono::Duration::try_minutes(self.token_ttl_minutes).context("token_ttl_minutes is too large")
  }
}

// ─── Admin bootstrap ──────────────────────────────────────────────────────────

/// Make sure `email` exists and holds the admin role.
///
/// An existing account is promoted but keeps its password; a new one is
/// created with `password_hash`.
pub async fn bootstrap_admin<S: DocumentStore>(
  repos: &Repositories<S>,
  email: &str,
  password_hash: &str,
) -> anyhow::Result<()> {
  PasswordHash::new(password_hash)
    .map_err(|e| anyhow::anyhow!("admin_password_hash is not a PHC string: {e}"))?;
  let email = email.trim().to_lowercase();

  if let Some(user) = repos.users.get_by_email(&email).await? {
    if user.role != Role::Admin {
      repos.users.set_role(user.id, Role::Admin).await?;
      tracing::info!(user = %user.id, "promoted bootstrap account to admin");
    }
    return Ok(());
  }

  let created = repos
    .users
    .create(NewUser {
      name:          "admin".into(),
      email,
      password_hash: password_hash.to_owned(),
      role:          Role::Admin,
    })
    .await;
  match created {
    Ok(user) => tracing::info!(user = %user.id, "created bootstrap admin"),
    // Another instance got there first.
    Err(CoreError::AlreadyExists { .. }) => {}
    Err(e) => return Err(e.into()),
  }
  Ok(())
}

// ─── Application ──────────────────────────────────────────────────────────────

/// Open the store, run the admin bootstrap and build the traced router.
pub async fn build_app(config: &ServerConfig) -> anyhow::Result<Router> {
  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let repos = Repositories::new(Arc::new(store));

  if let (Some(email), Some(hash)) = (&config.admin_email, &config.admin_password_hash) {
    bootstrap_admin(&repos, email, hash).await?;
  }

  let service = AttendanceService::new(
    repos,
    Arc::new(config.token_codec()?),
    Arc::new(config.ml_client()?),
  )
  .with_timeout(config.ml_timeout());
  let state = AppState::new(service).with_token_ttl(config.token_ttl()?);

  Ok(api_router(state).layer(TraceLayer::new_for_http()))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
