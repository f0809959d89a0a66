use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use itinera_agent::runtime::{AgentRuntime, PlanningSession};
use itinera_core::domain::conversation::ConversationTurn;
use itinera_core::domain::profile::{parse_birth_date, UserProfile};
use itinera_core::domain::trip::TripId;
use itinera_core::errors::{ApplicationError, DomainError};
use itinera_db::repositories::{QuotaDecision, QuotaRepository};

use crate::auth::AuthVerifier;

#[derive(Clone)]
pub struct ChatState {
    pub runtime: Arc<AgentRuntime>,
    pub auth: Arc<dyn AuthVerifier>,
    pub quota: Arc<dyn QuotaRepository>,
    pub daily_request_limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    pub trip_id: String,
    pub name: String,
    pub gender: String,
    pub birth_date: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub content: String,
    pub remaining_requests: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type Rejection = (StatusCode, Json<ErrorBody>);

/// `OPTIONS` requests are answered by the CORS layer before routing.
pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/", post(chat))
        .with_state(state)
        .layer(cors_layer())
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods([Method::POST, Method::OPTIONS]).allow_headers([
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
    ])
}

pub async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatResponseBody>, Rejection> {
    let correlation_id = Uuid::new_v4().to_string();
    let today = Utc::now().date_naive();

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| reject(ApplicationError::MissingCredentials, &correlation_id))?;

    let identity = state
        .auth
        .verify(authorization)
        .await
        .map_err(|error| reject(ApplicationError::InvalidCredentials(error.to_string()), &correlation_id))?;

    // Body is validated before quota is consumed.
    let session = parse_session(&body, today, &correlation_id)
        .map_err(|error| reject(error, &correlation_id))?;

    let remaining_requests = match state
        .quota
        .check_and_consume(&identity.user_id, state.daily_request_limit, today)
        .await
    {
        Ok(QuotaDecision::Remaining(remaining)) => remaining,
        Ok(QuotaDecision::Exhausted) => {
            return Err(reject(ApplicationError::QuotaExceeded, &correlation_id));
        }
        Err(error) => {
            return Err(reject(ApplicationError::QuotaUnavailable(error.to_string()), &correlation_id));
        }
    };

    let reply = state
        .runtime
        .plan(session)
        .await
        .map_err(|error| reject(ApplicationError::Integration(error.to_string()), &correlation_id))?;

    info!(
        event_name = "gateway.chat.completed",
        correlation_id = %correlation_id,
        tool_rounds = reply.tool_rounds,
        remaining_requests,
        "chat request completed"
    );

    Ok(Json(ChatResponseBody { content: reply.content, remaining_requests }))
}

fn parse_session(
    body: &[u8],
    today: NaiveDate,
    correlation_id: &str,
) -> Result<PlanningSession, ApplicationError> {
    let request: ChatRequestBody = serde_json::from_slice(body)
        .map_err(|error| ApplicationError::Validation(format!("malformed body: {error}")))?;

    if request.message.trim().is_empty() {
        return Err(ApplicationError::Validation("message must not be blank".to_string()));
    }
    let trip_id = request.trip_id.trim();
    if trip_id.is_empty() {
        return Err(ApplicationError::Validation("trip_id must not be blank".to_string()));
    }

    let birth_date = parse_birth_date(&request.birth_date).map_err(DomainError::from)?;
    let profile = UserProfile::new(request.name, request.gender, birth_date, request.interests)
        .context_on(today)
        .map_err(DomainError::from)?;

    Ok(PlanningSession {
        trip_id: TripId(trip_id.to_string()),
        profile,
        history: request.history,
        message: request.message,
        correlation_id: correlation_id.to_string(),
    })
}

fn reject(error: ApplicationError, correlation_id: &str) -> Rejection {
    let interface = error.into_interface(correlation_id);
    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    warn!(
        event_name = "gateway.chat.rejected",
        correlation_id = %interface.correlation_id(),
        status = status.as_u16(),
        reason = %interface,
        "chat request rejected"
    );

    (status, Json(ErrorBody { error: interface.user_message() }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use itinera_agent::llm::{ChatRequest, ChatResponse, LlmClient, LlmError};
    use itinera_agent::prompt::PromptEngine;
    use itinera_agent::runtime::{AgentRuntime, RuntimeSettings};
    use itinera_agent::tools::ToolRegistry;
    use itinera_core::config::StaticToken;
    use itinera_db::repositories::{
        InMemoryQuotaRepository, InMemoryTripItemRepository, QuotaDecision, QuotaRepository,
        RepositoryError,
    };

    use super::{router, ChatState};
    use crate::auth::StaticTokenVerifier;

    struct CountingLlm {
        reply: String,
        calls: AtomicUsize,
    }

    impl CountingLlm {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse::text(self.reply.clone()))
        }
    }

    struct FixedQuota(QuotaDecision);

    #[async_trait]
    impl QuotaRepository for FixedQuota {
        async fn check_and_consume(
            &self,
            _user_id: &str,
            _daily_limit: u32,
            _day: NaiveDate,
        ) -> Result<QuotaDecision, RepositoryError> {
            Ok(self.0)
        }
    }

    struct FailingQuota;

    #[async_trait]
    impl QuotaRepository for FailingQuota {
        async fn check_and_consume(
            &self,
            _user_id: &str,
            _daily_limit: u32,
            _day: NaiveDate,
        ) -> Result<QuotaDecision, RepositoryError> {
            Err(RepositoryError::Decode("database is locked".to_string()))
        }
    }

    fn app(llm: Arc<CountingLlm>, quota: Arc<dyn QuotaRepository>) -> Router {
        let runtime = AgentRuntime::new(
            llm,
            ToolRegistry::new(Arc::new(InMemoryTripItemRepository::default()), Duration::from_secs(5)),
            PromptEngine::new().expect("prompt engine"),
            RuntimeSettings::default(),
        );
        router(ChatState {
            runtime: Arc::new(runtime),
            auth: Arc::new(StaticTokenVerifier::new(vec![
                StaticToken::parse("test-token=user-1").expect("token")
            ])),
            quota,
            daily_request_limit: 10,
        })
    }

    fn paris_body() -> Value {
        json!({
            "message": "Plan 3 days in Paris, budget mid-range, arriving June 1 9am, leaving June 3 6pm",
            "history": [],
            "trip_id": "trip-paris",
            "name": "Ana",
            "gender": "female",
            "birth_date": "1994-03-12",
            "interests": ["art", "food"]
        })
    }

    fn post(authorization: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn missing_authorization_is_rejected_with_no_auth() {
        let llm = CountingLlm::new("unused");
        let response = app(llm.clone(), Arc::new(InMemoryQuotaRepository::default()))
            .oneshot(post(None, &paris_body()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(|v| v.as_bytes()),
            Some(&b"*"[..])
        );
        assert_eq!(read_json(response).await, json!({"error": "No auth"}));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let llm = CountingLlm::new("unused");
        let response = app(llm.clone(), Arc::new(InMemoryQuotaRepository::default()))
            .oneshot(post(Some("Bearer nope"), &paris_body()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await, json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn body_without_message_is_a_bad_request() {
        let llm = CountingLlm::new("unused");
        let quota = Arc::new(InMemoryQuotaRepository::default());
        let mut body = paris_body();
        body.as_object_mut().expect("object").remove("message");

        let response = app(llm.clone(), quota.clone())
            .oneshot(post(Some("Bearer test-token"), &body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"error": "Invalid request"}));
        assert_eq!(llm.calls(), 0);
        let day = chrono::Utc::now().date_naive();
        assert_eq!(
            quota.check_and_consume("user-1", 10, day).await.expect("quota"),
            QuotaDecision::Remaining(9),
            "rejected bodies must not consume quota"
        );
    }

    #[tokio::test]
    async fn future_birth_date_is_a_bad_request() {
        let llm = CountingLlm::new("unused");
        let mut body = paris_body();
        body["birth_date"] = json!("2999-01-01");

        let response = app(llm.clone(), Arc::new(InMemoryQuotaRepository::default()))
            .oneshot(post(Some("Bearer test-token"), &body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_quota_stops_before_the_model() {
        let llm = CountingLlm::new("unused");
        let response = app(llm.clone(), Arc::new(FixedQuota(QuotaDecision::from_sentinel(-1))))
            .oneshot(post(Some("Bearer test-token"), &paris_body()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(read_json(response).await, json!({"error": "Limit hit"}));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn quota_lookup_failure_is_a_limit_hit() {
        let llm = CountingLlm::new("unused");
        let response = app(llm.clone(), Arc::new(FailingQuota))
            .oneshot(post(Some("Bearer test-token"), &paris_body()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(read_json(response).await, json!({"error": "Limit hit"}));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_quota_is_checked() {
        let llm = CountingLlm::new("unused");
        let mut body = paris_body();
        body["trip_id"] = json!("   ");

        let response = app(llm.clone(), Arc::new(FixedQuota(QuotaDecision::Exhausted)))
            .oneshot(post(Some("Bearer test-token"), &body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"error": "Invalid request"}));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn paris_request_returns_content_and_remaining_quota() {
        let llm = CountingLlm::new(
            "Paris in early June sounds wonderful! Shall I draft a mid-range itinerary for this trip?",
        );
        let response = app(llm.clone(), Arc::new(FixedQuota(QuotaDecision::Remaining(7))))
            .oneshot(post(Some("Bearer test-token"), &paris_body()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert!(body["content"].as_str().is_some_and(|content| !content.is_empty()));
        assert_eq!(body["remaining_requests"], 7);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn model_failure_is_an_internal_error_with_its_message() {
        struct BrokenLlm;

        #[async_trait]
        impl LlmClient for BrokenLlm {
            async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
                Err(LlmError::Api { status: 503, message: "overloaded".to_string() })
            }
        }

        let runtime = AgentRuntime::new(
            Arc::new(BrokenLlm),
            ToolRegistry::new(Arc::new(InMemoryTripItemRepository::default()), Duration::from_secs(5)),
            PromptEngine::new().expect("prompt engine"),
            RuntimeSettings::default(),
        );
        let app = router(ChatState {
            runtime: Arc::new(runtime),
            auth: Arc::new(StaticTokenVerifier::new(vec![
                StaticToken::parse("test-token=user-1").expect("token")
            ])),
            quota: Arc::new(InMemoryQuotaRepository::default()),
            daily_request_limit: 10,
        });

        let response =
            app.oneshot(post(Some("Bearer test-token"), &paris_body())).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            json!({"error": "model request failed: model API error 503: overloaded"})
        );
    }

    #[tokio::test]
    async fn preflight_is_answered_without_auth() {
        let llm = CountingLlm::new("unused");
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/chat")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
            .body(Body::empty())
            .expect("request");

        let response = app(llm.clone(), Arc::new(InMemoryQuotaRepository::default()))
            .oneshot(request)
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(|v| v.as_bytes()),
            Some(&b"*"[..])
        );
        let allowed_headers = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allowed_headers.contains("authorization"));
        assert!(allowed_headers.contains("apikey"));
        assert_eq!(llm.calls(), 0);
    }
}
