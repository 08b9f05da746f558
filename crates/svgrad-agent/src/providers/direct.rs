// ABOUTME: Deterministic, offline AgentRuntime that calls each role's tool with the task inputs.
// ABOUTME: Lets the crew run without an LLM; answers with the tool result once it has one.

use async_trait::async_trait;

use crate::context::{AgentContext, AgentRole, Turn};
use crate::runtime::{AgentAction, AgentError, AgentRuntime};
use crate::tools::ToolCall;

/// Runtime that never talks to a model. The first step of every task calls
/// the role's tool with the matching kickoff input; the next step returns
/// the tool's output as the answer.
#[derive(Debug, Clone, Default)]
pub struct DirectRuntime;

impl DirectRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn required_input<'a>(context: &'a AgentContext, key: &str) -> Result<&'a str, AgentError> {
    context.inputs.get(key).map(String::as_str).ok_or_else(|| {
        AgentError::InvalidResponse(format!("direct runtime needs the '{}' input", key))
    })
}

#[async_trait]
impl AgentRuntime for DirectRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        if let Some(Turn::ToolResult {
            content, is_error, ..
        }) = context.last_tool_result()
        {
            if *is_error {
                return Err(AgentError::ProviderError(format!(
                    "{} tool failed: {}",
                    context.agent_role.tool_name(),
                    content
                )));
            }
            return Ok(AgentAction::Respond(content.clone()));
        }

        let call = match context.agent_role {
            AgentRole::GradientParser => ToolCall::ParseGradientDetails {
                prompt: required_input(context, "user_prompt")?.to_string(),
            },
            AgentRole::SvgModifier => ToolCall::ModifySvg {
                svg_content: required_input(context, "svg_content")?.to_string(),
            },
        };

        Ok(AgentAction::UseTool {
            call_id: format!("direct-{}", context.tool_calls_made() + 1),
            call,
        })
    }

    fn provider_name(&self) -> &str {
        "direct"
    }

    fn model_name(&self) -> &str {
        "none"
    }
}
