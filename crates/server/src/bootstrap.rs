use std::sync::Arc;

use itinera_agent::{
    openai::OpenAiCompatibleClient,
    prompt::{PromptEngine, PromptError},
    runtime::{AgentRuntime, RuntimeSettings},
    tools::ToolRegistry,
    LlmClient, LlmError,
};
use itinera_core::config::AppConfig;
use itinera_db::{
    connect_with_settings, migrations, DbPool, SqlQuotaRepository, SqlTripItemRepository,
};
use thiserror::Error;
use tracing::info;

use crate::auth::{verifier_from_config, AuthError};
use crate::chat::ChatState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chat: ChatState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("prompt setup failed: {0}")]
    Prompt(#[from] PromptError),
    #[error("auth setup failed: {0}")]
    Auth(#[from] AuthError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
    bootstrap_with_llm(config, llm).await
}

/// Wires storage, quota, auth and the planning runtime around a model client.
pub async fn bootstrap_with_llm(
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        auth_mode = ?config.auth.mode,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let settings = RuntimeSettings::from_config(&config.chat, &config.llm);
    let tools = ToolRegistry::new(
        Arc::new(SqlTripItemRepository::new(db_pool.clone())),
        settings.tool_timeout,
    );
    let runtime = AgentRuntime::new(llm, tools, PromptEngine::new()?, settings);

    let chat = ChatState {
        runtime: Arc::new(runtime),
        auth: verifier_from_config(&config.auth)?,
        quota: Arc::new(SqlQuotaRepository::new(db_pool.clone())),
        daily_request_limit: config.chat.daily_request_limit,
    };

    Ok(Application { config, db_pool, chat })
}
