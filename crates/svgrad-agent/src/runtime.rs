// ABOUTME: Defines the AgentRuntime trait that all LLM provider adapters must implement.
// ABOUTME: Also defines AgentAction (what agents produce) and AgentError (what can go wrong).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::AgentContext;
use crate::tools::ToolCall;

/// The action an agent takes from a single reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentAction {
    /// Invoke a tool. `call_id` ties the eventual result back to this call.
    UseTool { call_id: String, call: ToolCall },

    /// Final answer for the current task.
    Respond(String),
}

/// Errors that can occur during agent execution.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Context too large")]
    ContextTooLarge,
}

/// Trait that all LLM provider adapters must implement. Each provider
/// translates AgentContext into API calls and parses responses into
/// AgentActions.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Execute one step of agent reasoning given the current context.
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError>;

    /// Provider name for logging and display (e.g. "openai", "direct").
    fn provider_name(&self) -> &str;

    /// Model identifier being used (e.g. "gpt-4o-mini").
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_action_round_trips_through_json() {
        let actions = vec![
            AgentAction::UseTool {
                call_id: "call_1".to_string(),
                call: ToolCall::ParseGradientDetails {
                    prompt: "radial circle".to_string(),
                },
            },
            AgentAction::Respond("<svg/>".to_string()),
        ];

        for action in &actions {
            let json = serde_json::to_string(action).expect("serialize action");
            let back: AgentAction = serde_json::from_str(&json).expect("deserialize action");
            assert_eq!(&back, action);
        }
    }

    #[test]
    fn agent_error_display() {
        let errors = vec![
            AgentError::ProviderError("connection timeout".to_string()),
            AgentError::InvalidResponse("missing choices".to_string()),
            AgentError::RateLimited,
            AgentError::ContextTooLarge,
        ];

        for err in &errors {
            assert!(!err.to_string().is_empty());
        }

        assert!(
            AgentError::ProviderError("test".to_string())
                .to_string()
                .contains("test")
        );
    }
}
