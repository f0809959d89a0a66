//! Chat-completions abstraction shared by every model backend.
//!
//! A [`ChatSession`] owns the message stream of one planning request. Each
//! model call sends the full stream, so the backend itself stays stateless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use itinera_core::domain::conversation::{ConversationTurn, TurnRole};

use crate::tools::ToolResult;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model client misconfigured: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn to_openai_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A function call requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    User { content: String },
    Assistant { content: Option<String>, tool_calls: Vec<ToolCall> },
    Tool { call_id: String, name: String, content: String },
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => Self::User { content: turn.content.clone() },
            TurnRole::Assistant => {
                Self::Assistant { content: Some(turn.content.clone()), tool_calls: Vec::new() }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), tool_calls: Vec::new() }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self { text: None, tool_calls }
    }
}

/// Stateless chat-completions backend. Every call carries the whole context.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

pub struct ChatSession {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
    messages: Vec<ChatMessage>,
    tools: Vec<ToolDefinition>,
    max_tokens: u32,
    call_timeout: Duration,
}

impl ChatSession {
    pub fn start(
        client: Arc<dyn LlmClient>,
        system_prompt: String,
        history: &[ConversationTurn],
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            system_prompt,
            messages: history.iter().map(ChatMessage::from).collect(),
            tools,
            max_tokens,
            call_timeout,
        }
    }

    pub async fn send_message(&mut self, content: &str) -> Result<ChatResponse, LlmError> {
        self.messages.push(ChatMessage::User { content: content.to_string() });
        self.round_trip().await
    }

    /// Appends one tool message per result, in call order, then asks the model again.
    pub async fn send_tool_results(
        &mut self,
        results: &[ToolResult],
    ) -> Result<ChatResponse, LlmError> {
        for result in results {
            self.messages.push(ChatMessage::Tool {
                call_id: result.call_id.clone(),
                name: result.name.clone(),
                content: result.payload().to_string(),
            });
        }
        self.round_trip().await
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    async fn round_trip(&mut self) -> Result<ChatResponse, LlmError> {
        let request = ChatRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
            max_tokens: self.max_tokens,
        };
        debug!(message_count = request.messages.len(), "chat session round trip");

        let response = tokio::time::timeout(self.call_timeout, self.client.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(self.call_timeout))??;

        self.messages.push(ChatMessage::Assistant {
            content: response.text.clone(),
            tool_calls: response.tool_calls.clone(),
        });
        Ok(response)
    }
}
