use std::sync::Arc;

use chrono::Duration;
use ordermate_agent::llm::LlmError;
use ordermate_agent::providers::client_from_config;
use ordermate_agent::runtime::{ConversationRuntime, RuntimeDeps, RuntimeError};
use ordermate_core::config::{AppConfig, ConfigError, LoadOptions};
use ordermate_core::ports::SessionStore;
use ordermate_db::repositories::{SqlCatalogRepository, SqlOrderRepository};
use ordermate_db::{connect_from_config, migrations, DbPool, VersionedSessionStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<ConversationRuntime>,
    pub sessions: Arc<dyn SessionStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("conversation runtime setup failed: {0}")]
    Runtime(#[from] RuntimeError),
}

#[allow(dead_code)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        llm_model = %config.llm.model,
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let ttl = Duration::seconds(i64::try_from(config.session.ttl_secs).unwrap_or(i64::MAX));
    let sessions: Arc<dyn SessionStore> =
        Arc::new(VersionedSessionStore::sqlite(db_pool.clone(), ttl));
    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let client = client_from_config(&config.llm)?;

    let runtime = ConversationRuntime::builder(RuntimeDeps {
        tenants: catalog.clone(),
        menus: catalog,
        sessions: sessions.clone(),
        orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
    })
    .configured(&config, Some(client))?
    .build()?;

    Ok(Application { config, db_pool, runtime: Arc::new(runtime), sessions })
}
