// ABOUTME: Anthropic Claude API adapter implementing the AgentRuntime trait.
// ABOUTME: Translates AgentContext into Anthropic Messages API calls and parses tool_use responses.

use async_trait::async_trait;
use serde_json::{Value, json};
use ulid::Ulid;

use crate::context::{AgentContext, Turn, truncate_for_prompt};
use crate::providers::role_prompt;
use crate::runtime::{AgentAction, AgentError, AgentRuntime};
use crate::tools::{ToolCall, tool_definitions_for};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Claude runtime adapter. Calls the Messages API with tool definitions
/// and maps tool_use responses back to AgentActions.
pub struct AnthropicRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicRuntime {
    /// Create a new AnthropicRuntime reading configuration from environment variables.
    /// Required: `ANTHROPIC_API_KEY`
    /// Optional: `ANTHROPIC_BASE_URL` (defaults to https://api.anthropic.com)
    /// Optional: `ANTHROPIC_MODEL` (defaults to claude-sonnet-4-5-20250929)
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AgentError::ProviderError("ANTHROPIC_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new AnthropicRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the Anthropic Messages API.
    pub fn build_request_body(&self, context: &AgentContext) -> Value {
        let tools = build_anthropic_tools(context);

        let mut messages = vec![json!({
            "role": "user",
            "content": [{ "type": "text", "text": context.task_prompt() }]
        })];

        for turn in &context.turns {
            messages.push(match turn {
                Turn::User(text) => json!({
                    "role": "user",
                    "content": [{ "type": "text", "text": text }]
                }),
                Turn::Assistant(text) => json!({
                    "role": "assistant",
                    "content": [{ "type": "text", "text": text }]
                }),
                Turn::ToolCall {
                    call_id,
                    name,
                    input,
                } => json!({
                    "role": "assistant",
                    "content": [{
                        "type": "tool_use",
                        "id": call_id,
                        "name": name,
                        "input": input
                    }]
                }),
                Turn::ToolResult {
                    call_id,
                    content,
                    is_error,
                    ..
                } => json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": call_id,
                        "content": truncate_for_prompt(content),
                        "is_error": is_error
                    }]
                }),
            });
        }

        // Ensure messages alternate roles (Anthropic API requirement)
        let messages = coalesce_messages(messages);

        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": role_prompt(&context.agent_role),
            "messages": messages,
            "tools": tools
        })
    }

    /// Parse an Anthropic Messages API response into an AgentAction.
    pub fn parse_response(response_body: &Value) -> Result<AgentAction, AgentError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                AgentError::InvalidResponse("missing content array in response".to_string())
            })?;

        // Look for tool_use blocks first, they take priority
        for block in content {
            if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                return parse_tool_use(block);
            }
        }

        let text: Vec<&str> = content
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .filter(|t| !t.is_empty())
            .collect();

        if !text.is_empty() {
            return Ok(AgentAction::Respond(text.join("\n")));
        }

        let stop_reason = response_body
            .get("stop_reason")
            .and_then(|s| s.as_str())
            .unwrap_or("");

        if stop_reason == "end_turn" {
            return Ok(AgentAction::Respond(String::new()));
        }

        Err(AgentError::InvalidResponse(
            "no actionable content in response".to_string(),
        ))
    }
}

/// Convert the role's tool definitions to Anthropic's tool format.
fn build_anthropic_tools(context: &AgentContext) -> Vec<Value> {
    tool_definitions_for(context.agent_role)
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.get("name").cloned().unwrap_or(Value::Null),
                "description": tool.get("description").cloned().unwrap_or(Value::Null),
                "input_schema": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
            })
        })
        .collect()
}

/// Parse a single tool_use block from the Anthropic response into an AgentAction.
fn parse_tool_use(block: &Value) -> Result<AgentAction, AgentError> {
    let tool_name = block
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| AgentError::InvalidResponse("tool_use block missing name".to_string()))?;

    let input = block.get("input").cloned().unwrap_or(json!({}));

    let call_id = block
        .get("id")
        .and_then(|i| i.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("toolu_{}", Ulid::new()));

    Ok(AgentAction::UseTool {
        call_id,
        call: ToolCall::from_name_and_input(tool_name, &input)?,
    })
}

/// Coalesce consecutive messages with the same role into single messages by
/// concatenating their content blocks. The Anthropic API requires
/// alternating user/assistant messages.
fn coalesce_messages(messages: Vec<Value>) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();

    for msg in messages {
        let role = msg
            .get("role")
            .and_then(|r| r.as_str())
            .unwrap_or("user")
            .to_string();
        let blocks = msg
            .get("content")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();

        if let Some(last) = result.last_mut()
            && last.get("role").and_then(|r| r.as_str()) == Some(role.as_str())
            && let Some(existing) = last.get_mut("content").and_then(|c| c.as_array_mut())
        {
            existing.extend(blocks);
            continue;
        }

        result.push(json!({
            "role": role,
            "content": blocks
        }));
    }

    result
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::RateLimited;
    }

    if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE
        || body.contains("prompt is too long")
    {
        return AgentError::ContextTooLarge;
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AgentError::ProviderError("Unauthorized: check ANTHROPIC_API_KEY".to_string());
    }

    if status.is_server_error() {
        return AgentError::ProviderError(format!("Server error: {}", status));
    }

    AgentError::ProviderError(format!("API error {}: {}", status, body))
}

#[async_trait]
impl AgentRuntime for AnthropicRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        let body = self.build_request_body(context);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ProviderError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &error_body));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
