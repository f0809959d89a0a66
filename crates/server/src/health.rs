use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use itinera_db::DbPool;
use serde::Serialize;
use tracing::warn;

const PLANNER_TABLES: [&str; 3] = ["trip_item", "trip_item_location", "chat_usage"];

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let schema = if database.is_ready() {
        schema_check(&state.db_pool).await
    } else {
        HealthCheck::degraded("skipped: database unreachable")
    };
    let ready = database.is_ready() && schema.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck::ready("itinera chat gateway is accepting requests"),
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::ready("database query succeeded"),
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "database health query failed"
            );
            HealthCheck::degraded(format!("database query failed: {error}"))
        }
    }
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    let present = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?, ?, ?)",
    )
    .bind(PLANNER_TABLES[0])
    .bind(PLANNER_TABLES[1])
    .bind(PLANNER_TABLES[2])
    .fetch_one(pool)
    .await;

    match present {
        Ok(count) if count == PLANNER_TABLES.len() as i64 => {
            HealthCheck::ready("planner tables are migrated")
        }
        Ok(count) => HealthCheck::degraded(format!(
            "{count} of {} planner tables present; run migrations",
            PLANNER_TABLES.len()
        )),
        Err(error) => HealthCheck::degraded(format!("schema query failed: {error}")),
    }
}
