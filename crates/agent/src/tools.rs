use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use itinera_core::domain::trip::TripId;
use itinera_db::repositories::{RepositoryError, TripItemRepository};

use crate::guardrails::{AdmittedCall, GuardrailPolicy, GuardrailViolation};
use crate::llm::{ToolCall, ToolDefinition};

pub const CREATE_TRIP_ITEM: &str = "create_trip_item";
pub const GET_TRIP_ITEMS: &str = "get_trip_items";

static TOOL_DEFINITIONS: LazyLock<Vec<ToolDefinition>> = LazyLock::new(|| {
    vec![
        ToolDefinition {
            name: CREATE_TRIP_ITEM.to_string(),
            description: "Save one approved itinerary entry (an activity or a meal) to the current trip."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Short title of the entry."},
                    "item_type": {"type": "string", "enum": ["activity", "restaurant"]},
                    "start_datetime": {"type": "string", "description": "ISO-8601 start timestamp."},
                    "end_datetime": {"type": "string", "description": "ISO-8601 end timestamp."},
                    "metadata": {"type": "object", "description": "Always an empty object."},
                    "locations": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "sequence": {"type": "integer"},
                                "name": {"type": "string"},
                                "address": {"type": ["string", "null"]},
                                "latitude": {"type": "number"},
                                "longitude": {"type": "number"}
                            },
                            "required": ["sequence", "name", "address", "latitude", "longitude"]
                        }
                    }
                },
                "required": ["name", "item_type", "start_datetime", "end_datetime", "metadata", "locations"]
            }),
        },
        ToolDefinition {
            name: GET_TRIP_ITEMS.to_string(),
            description: "List every item already saved for the current trip.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "trip_id": {"type": "string", "description": "Identifier of the current trip."}
                },
                "required": ["trip_id"]
            }),
        },
    ]
});

/// The process-wide tool table offered to the model.
pub fn tool_definitions() -> &'static [ToolDefinition] {
    &TOOL_DEFINITIONS
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
    #[error("{0}")]
    Rejected(#[from] GuardrailViolation),
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    #[error("could not encode tool output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LocationArgs {
    pub sequence: i32,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreateTripItemArgs {
    pub name: String,
    pub item_type: String,
    pub start_datetime: String,
    pub end_datetime: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub locations: Vec<LocationArgs>,
    #[serde(default)]
    pub trip_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GetTripItemsArgs {
    #[serde(default)]
    pub trip_id: Option<String>,
}

/// Model-issued arguments decoded per tool name.
#[derive(Clone, Debug, PartialEq)]
pub enum PlannerToolCall {
    CreateTripItem(CreateTripItemArgs),
    GetTripItems(GetTripItemsArgs),
}

impl PlannerToolCall {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        match name {
            CREATE_TRIP_ITEM => decode(CREATE_TRIP_ITEM, arguments).map(Self::CreateTripItem),
            GET_TRIP_ITEMS if arguments.is_null() => Ok(Self::GetTripItems(GetTripItemsArgs::default())),
            GET_TRIP_ITEMS => decode(GET_TRIP_ITEMS, arguments).map(Self::GetTripItems),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn decode<T>(tool: &'static str, arguments: &Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(arguments.clone())
        .map_err(|error| ToolError::InvalidArguments { tool, reason: error.to_string() })
}

/// Outcome of one tool call, tagged so the model can match it to its request.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub outcome: Result<Value, String>,
}

impl ToolResult {
    pub fn ok(call: &ToolCall, payload: Value) -> Self {
        Self { call_id: call.id.clone(), name: call.name.clone(), outcome: Ok(payload) }
    }

    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self { call_id: call.id.clone(), name: call.name.clone(), outcome: Err(message.into()) }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// What the model sees in the tool message.
    pub fn payload(&self) -> Value {
        match &self.outcome {
            Ok(payload) => payload.clone(),
            Err(message) => json!({ "error": message }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ToolContext {
    pub trip_id: TripId,
    pub correlation_id: String,
}

pub struct ToolRegistry {
    trips: Arc<dyn TripItemRepository>,
    guardrails: GuardrailPolicy,
    call_timeout: Duration,
}

impl ToolRegistry {
    pub fn new(trips: Arc<dyn TripItemRepository>, call_timeout: Duration) -> Self {
        Self { trips, guardrails: GuardrailPolicy::default(), call_timeout }
    }

    pub fn definitions(&self) -> &'static [ToolDefinition] {
        tool_definitions()
    }

    /// Runs every call of a model turn concurrently; results keep call order.
    pub async fn dispatch_all(&self, calls: &[ToolCall], context: &ToolContext) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.dispatch(call, context))).await
    }

    pub async fn dispatch(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let outcome = match tokio::time::timeout(self.call_timeout, self.execute(call, context)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                Err(ToolError::Timeout { tool: call.name.clone(), timeout: self.call_timeout })
            }
        };

        match outcome {
            Ok(payload) => {
                info!(
                    event_name = "agent.tool.completed",
                    correlation_id = %context.correlation_id,
                    tool = %call.name,
                    call_id = %call.id,
                    "tool call succeeded"
                );
                ToolResult::ok(call, payload)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    correlation_id = %context.correlation_id,
                    tool = %call.name,
                    call_id = %call.id,
                    error = %error,
                    "tool call failed"
                );
                ToolResult::error(call, error.to_string())
            }
        }
    }

    async fn execute(&self, call: &ToolCall, context: &ToolContext) -> Result<Value, ToolError> {
        let parsed = PlannerToolCall::parse(&call.name, &call.arguments)?;

        match self.guardrails.admit(parsed, &context.trip_id)? {
            AdmittedCall::CreateTripItem(item) => {
                let created = self.trips.create_trip_item(item).await?;
                Ok(serde_json::to_value(created)?)
            }
            AdmittedCall::ListTripItems(trip_id) => {
                let items = self.trips.list_trip_items(&trip_id).await?;
                Ok(serde_json::to_value(items)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use itinera_core::domain::trip::{NewTripItem, TripId, TripItem};
    use itinera_db::repositories::{
        InMemoryTripItemRepository, RepositoryError, TripItemRepository,
    };

    use super::{
        tool_definitions, PlannerToolCall, ToolContext, ToolError, ToolRegistry, CREATE_TRIP_ITEM,
        GET_TRIP_ITEMS,
    };
    use crate::llm::ToolCall;

    fn context() -> ToolContext {
        ToolContext { trip_id: TripId("trip-1".to_string()), correlation_id: "req-1".to_string() }
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments }
    }

    fn breakfast_args() -> Value {
        json!({
            "name": "Breakfast at Café de Flore",
            "item_type": "restaurant",
            "start_datetime": "2025-06-01T09:30:00Z",
            "end_datetime": "2025-06-01T10:30:00Z",
            "metadata": {},
            "locations": [{
                "sequence": 1,
                "name": "Café de Flore",
                "address": "172 Boulevard Saint-Germain, Paris",
                "latitude": 48.8541,
                "longitude": 2.3326
            }]
        })
    }

    #[test]
    fn definitions_are_unique_and_complete() {
        let names: Vec<&str> = tool_definitions().iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec![CREATE_TRIP_ITEM, GET_TRIP_ITEMS]);
        assert_eq!(
            tool_definitions()[0].parameters["properties"]["item_type"]["enum"],
            json!(["activity", "restaurant"])
        );
    }

    #[test]
    fn parse_maps_names_to_typed_calls() {
        assert!(matches!(
            PlannerToolCall::parse(CREATE_TRIP_ITEM, &breakfast_args()),
            Ok(PlannerToolCall::CreateTripItem(args)) if args.locations.len() == 1
        ));
        assert!(matches!(
            PlannerToolCall::parse(GET_TRIP_ITEMS, &Value::Null),
            Ok(PlannerToolCall::GetTripItems(args)) if args.trip_id.is_none()
        ));
        assert!(matches!(
            PlannerToolCall::parse("book_flight", &json!({})),
            Err(ToolError::UnknownTool(name)) if name == "book_flight"
        ));
        assert!(matches!(
            PlannerToolCall::parse(CREATE_TRIP_ITEM, &json!("{broken")),
            Err(ToolError::InvalidArguments { tool: CREATE_TRIP_ITEM, .. })
        ));
    }

    #[tokio::test]
    async fn batch_results_keep_call_order_and_tags() {
        let repo = Arc::new(InMemoryTripItemRepository::default());
        let registry = ToolRegistry::new(repo.clone(), Duration::from_secs(5));
        let calls = vec![
            call("c1", CREATE_TRIP_ITEM, breakfast_args()),
            call("c2", "teleport", json!({})),
            call("c3", GET_TRIP_ITEMS, json!({"trip_id": "trip-1"})),
        ];

        let results = registry.dispatch_all(&calls, &context()).await;

        assert_eq!(results.len(), 3);
        let tags: Vec<(&str, &str)> =
            results.iter().map(|r| (r.call_id.as_str(), r.name.as_str())).collect();
        assert_eq!(tags, vec![("c1", CREATE_TRIP_ITEM), ("c2", "teleport"), ("c3", GET_TRIP_ITEMS)]);
        assert!(results[0].is_ok());
        assert_eq!(results[0].payload()["trip_id"], "trip-1");
        assert_eq!(results[0].payload()["metadata"], json!({}));
        assert_eq!(results[1].payload(), json!({"error": "unknown tool: teleport"}));
        assert!(results[2].is_ok());
        assert_eq!(repo.stored_count().await, 1);
    }

    #[tokio::test]
    async fn cross_trip_reads_are_rejected() {
        let registry = ToolRegistry::new(
            Arc::new(InMemoryTripItemRepository::default()),
            Duration::from_secs(5),
        );

        let result = registry
            .dispatch(&call("c1", GET_TRIP_ITEMS, json!({"trip_id": "someone-else"})), &context())
            .await;

        let message = result.outcome.expect_err("rejected");
        assert!(message.contains("current trip"), "unexpected message: {message}");
    }

    struct FailingRepository;

    #[async_trait]
    impl TripItemRepository for FailingRepository {
        async fn create_trip_item(&self, _item: NewTripItem) -> Result<TripItem, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn list_trip_items(&self, _trip_id: &TripId) -> Result<Vec<TripItem>, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn storage_failures_become_error_results() {
        let registry = ToolRegistry::new(Arc::new(FailingRepository), Duration::from_secs(5));

        let result = registry.dispatch(&call("c1", CREATE_TRIP_ITEM, breakfast_args()), &context()).await;

        assert_eq!(result.payload(), json!({"error": "storage error: decode error: disk full"}));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tools_time_out_as_error_results() {
        let registry = ToolRegistry::new(Arc::new(FailingRepository), Duration::from_secs(2));

        let result = registry.dispatch(&call("c1", GET_TRIP_ITEMS, json!({})), &context()).await;

        let message = result.outcome.expect_err("timeout");
        assert!(message.starts_with("get_trip_items timed out"), "unexpected message: {message}");
    }
}
