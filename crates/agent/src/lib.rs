//! Agent Runtime - conversational itinerary planning
//!
//! This crate drives one planning request from user message to final answer:
//! - Renders the system instructions for the traveller and trip (`prompt`)
//! - Talks to a chat-completions model through a pluggable client (`llm`, `openai`)
//! - Validates model-issued tool arguments before they reach storage (`guardrails`)
//! - Executes trip tools and reports their results back (`tools`)
//!
//! # Architecture
//!
//! The agent follows a constrained loop:
//! 1. **Instructions** - profile, trip and planning protocol rendered once per request
//! 2. **Model turn** - the model answers or requests tool calls
//! 3. **Tool round** - every requested call is dispatched and answered in one follow-up
//! 4. **Final answer** - the first turn without tool calls ends the request
//!
//! The loop is bounded by a configurable number of tool rounds.
//!
//! # Safety Principle
//!
//! The model never writes to storage directly. Every call is decoded into a
//! typed tool request, checked against the guardrail policy and bound to the
//! trip of the current session.

pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use llm::{ChatResponse, ChatSession, LlmClient, LlmError, ToolCall, ToolDefinition};
pub use openai::OpenAiCompatibleClient;
pub use prompt::{PromptEngine, PromptError, ERROR_TEMPLATE, SUCCESS_TEMPLATE};
pub use runtime::{AgentError, AgentRuntime, PlanningReply, PlanningSession, RuntimeSettings};
pub use tools::{tool_definitions, ToolRegistry, ToolResult};
