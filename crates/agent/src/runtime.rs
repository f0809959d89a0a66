use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use itinera_core::config::{ChatConfig, LlmConfig};
use itinera_core::domain::conversation::ConversationTurn;
use itinera_core::domain::profile::ProfileContext;
use itinera_core::domain::trip::TripId;

use crate::llm::{ChatSession, LlmClient, LlmError};
use crate::prompt::{PromptEngine, PromptError};
use crate::tools::{ToolContext, ToolRegistry};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Model(LlmError),
    #[error("model did not answer within {0:?}")]
    ModelTimeout(Duration),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("too many tool iterations (limit {limit})")]
    TooManyToolIterations { limit: u32 },
}

impl From<LlmError> for AgentError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Timeout(timeout) => Self::ModelTimeout(timeout),
            other => Self::Model(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub max_tool_rounds: u32,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_tokens: u32,
}

impl RuntimeSettings {
    pub fn from_config(chat: &ChatConfig, llm: &LlmConfig) -> Self {
        Self {
            max_tool_rounds: chat.max_tool_rounds,
            model_timeout: Duration::from_secs(chat.model_timeout_secs),
            tool_timeout: Duration::from_secs(chat.tool_timeout_secs),
            max_tokens: llm.max_tokens,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(15),
            max_tokens: 4096,
        }
    }
}

/// Everything one chat request brings; nothing outlives the request.
#[derive(Clone, Debug)]
pub struct PlanningSession {
    pub trip_id: TripId,
    pub profile: ProfileContext,
    pub history: Vec<ConversationTurn>,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanningReply {
    pub content: String,
    pub tool_rounds: u32,
    pub tool_calls_executed: usize,
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    prompts: PromptEngine,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        prompts: PromptEngine,
        settings: RuntimeSettings,
    ) -> Self {
        Self { llm, tools, prompts, settings }
    }

    /// Runs the conversation until the model answers without requesting tools.
    ///
    /// Every tool call of a model turn is dispatched and answered before the
    /// model is called again. Tool side effects stay committed when a later
    /// round fails.
    pub async fn plan(&self, session: PlanningSession) -> Result<PlanningReply, AgentError> {
        let correlation_id = session.correlation_id.as_str();
        let system_prompt =
            self.prompts.render_system_instructions(&session.trip_id, &session.profile)?;

        let mut chat = ChatSession::start(
            Arc::clone(&self.llm),
            system_prompt,
            &session.history,
            self.tools.definitions().to_vec(),
            self.settings.max_tokens,
            self.settings.model_timeout,
        );
        let tool_context =
            ToolContext { trip_id: session.trip_id.clone(), correlation_id: correlation_id.to_string() };

        info!(
            event_name = "agent.plan.start",
            correlation_id = %correlation_id,
            history_len = session.history.len(),
            "planning turn started"
        );

        let mut response = chat.send_message(&session.message).await.inspect_err(|error| {
            warn!(event_name = "agent.plan.model_failed", correlation_id = %correlation_id, error = %error, "model call failed");
        })?;
        let mut tool_rounds = 0_u32;
        let mut tool_calls_executed = 0_usize;

        while !response.tool_calls.is_empty() {
            if tool_rounds >= self.settings.max_tool_rounds {
                warn!(
                    event_name = "agent.plan.iteration_cap",
                    correlation_id = %correlation_id,
                    limit = self.settings.max_tool_rounds,
                    "tool loop exceeded its round limit"
                );
                return Err(AgentError::TooManyToolIterations {
                    limit: self.settings.max_tool_rounds,
                });
            }
            tool_rounds += 1;

            info!(
                event_name = "agent.plan.tool_round",
                correlation_id = %correlation_id,
                round = tool_rounds,
                tool_calls = response.tool_calls.len(),
                "dispatching tool calls"
            );
            let results = self.tools.dispatch_all(&response.tool_calls, &tool_context).await;
            tool_calls_executed += results.len();

            response = chat.send_tool_results(&results).await.inspect_err(|error| {
                warn!(event_name = "agent.plan.model_failed", correlation_id = %correlation_id, error = %error, "model call failed");
            })?;
        }

        info!(
            event_name = "agent.plan.completed",
            correlation_id = %correlation_id,
            tool_rounds,
            tool_calls_executed,
            "planning turn completed"
        );

        Ok(PlanningReply {
            content: response.text.unwrap_or_default(),
            tool_rounds,
            tool_calls_executed,
        })
    }
}
