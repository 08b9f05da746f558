// ABOUTME: OpenAI API adapter implementing the AgentRuntime trait.
// ABOUTME: Translates AgentContext into OpenAI Chat Completions API calls with function calling.

use async_trait::async_trait;
use serde_json::{Value, json};
use ulid::Ulid;

use crate::context::{AgentContext, Turn, truncate_for_prompt};
use crate::providers::role_prompt;
use crate::runtime::{AgentAction, AgentError, AgentRuntime};
use crate::tools::{ToolCall, tool_definitions_for};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 4096;

/// OpenAI runtime adapter. Calls the Chat Completions API with function
/// definitions and maps tool_calls responses back to AgentActions.
pub struct OpenAIRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIRuntime {
    /// Create a new OpenAIRuntime reading configuration from environment variables.
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL` (defaults to https://api.openai.com)
    /// Optional: `OPENAI_MODEL` (defaults to gpt-4o-mini)
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::ProviderError("OPENAI_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new OpenAIRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the OpenAI Chat Completions API.
    pub fn build_request_body(&self, context: &AgentContext) -> Value {
        let tools = build_openai_tools(context);

        let mut messages = vec![
            json!({
                "role": "system",
                "content": role_prompt(&context.agent_role)
            }),
            json!({
                "role": "user",
                "content": context.task_prompt()
            }),
        ];

        for turn in &context.turns {
            messages.push(match turn {
                Turn::User(text) => json!({ "role": "user", "content": text }),
                Turn::Assistant(text) => json!({ "role": "assistant", "content": text }),
                Turn::ToolCall {
                    call_id,
                    name,
                    input,
                } => json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": call_id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string()
                        }
                    }]
                }),
                Turn::ToolResult {
                    call_id, content, ..
                } => json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": truncate_for_prompt(content)
                }),
            });
        }

        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto"
        })
    }

    /// Parse an OpenAI Chat Completions response into an AgentAction.
    pub fn parse_response(response_body: &Value) -> Result<AgentAction, AgentError> {
        let choices = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                AgentError::InvalidResponse("missing choices array in response".to_string())
            })?;

        let choice = choices
            .first()
            .ok_or_else(|| AgentError::InvalidResponse("empty choices array".to_string()))?;

        let message = choice.get("message").ok_or_else(|| {
            AgentError::InvalidResponse("missing message in choice".to_string())
        })?;

        // Check for tool_calls first
        if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array())
            && let Some(tool_call) = tool_calls.first()
        {
            return parse_openai_tool_call(tool_call);
        }

        // Fall back to text content
        if let Some(content) = message.get("content").and_then(|c| c.as_str())
            && !content.is_empty()
        {
            return Ok(AgentAction::Respond(content.to_string()));
        }

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .unwrap_or("");

        if finish_reason == "stop" {
            return Ok(AgentAction::Respond(String::new()));
        }

        Err(AgentError::InvalidResponse(
            "no actionable content in response".to_string(),
        ))
    }
}

/// Convert the role's tool definitions to OpenAI's function calling format.
fn build_openai_tools(context: &AgentContext) -> Vec<Value> {
    tool_definitions_for(context.agent_role)
        .into_iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.get("name").cloned().unwrap_or(Value::Null),
                    "description": tool.get("description").cloned().unwrap_or(Value::Null),
                    "parameters": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
                }
            })
        })
        .collect()
}

/// Parse a single tool_call from the OpenAI response into an AgentAction.
fn parse_openai_tool_call(tool_call: &Value) -> Result<AgentAction, AgentError> {
    let function = tool_call.get("function").ok_or_else(|| {
        AgentError::InvalidResponse("tool_call missing function".to_string())
    })?;

    let tool_name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| AgentError::InvalidResponse("function missing name".to_string()))?;

    let arguments_str = function
        .get("arguments")
        .and_then(|a| a.as_str())
        .unwrap_or("{}");

    let input: Value = serde_json::from_str(arguments_str).map_err(|e| {
        AgentError::InvalidResponse(format!("failed to parse function arguments: {}", e))
    })?;

    let call_id = tool_call
        .get("id")
        .and_then(|i| i.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("call_{}", Ulid::new()));

    Ok(AgentAction::UseTool {
        call_id,
        call: ToolCall::from_name_and_input(tool_name, &input)?,
    })
}

/// Map a non-success HTTP status and body to the matching AgentError.
fn classify_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::RateLimited;
    }

    if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE || body.contains("context_length_exceeded")
    {
        return AgentError::ContextTooLarge;
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AgentError::ProviderError("Unauthorized: check OPENAI_API_KEY".to_string());
    }

    if status.is_server_error() {
        return AgentError::ProviderError(format!("Server error: {}", status));
    }

    AgentError::ProviderError(format!("API error {}: {}", status, body))
}

#[async_trait]
impl AgentRuntime for OpenAIRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        let body = self.build_request_body(context);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentRole;

    fn runtime() -> OpenAIRuntime {
        OpenAIRuntime::new(
            "test-key".to_string(),
            "https://api.openai.com".to_string(),
            "gpt-4o-mini".to_string(),
        )
    }

    fn context(role: AgentRole) -> AgentContext {
        AgentContext::new(
            Ulid::new(),
            format!("{}-1", role.label()),
            role,
            "Analyze this user prompt".to_string(),
            "Gradient configuration details".to_string(),
        )
    }

    #[test]
    fn openai_runtime_creation() {
        let runtime = runtime();
        assert_eq!(runtime.provider_name(), "openai");
        assert_eq!(runtime.model_name(), "gpt-4o-mini");
        assert_eq!(runtime.api_key, "test-key");
        assert_eq!(runtime.base_url, "https://api.openai.com");
    }

    #[test]
    fn openai_builds_request_body() {
        let body = runtime().build_request_body(&context(AgentRole::GradientParser));

        assert_eq!(body["model"], "gpt-4o-mini");

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "parse_gradient_details");

        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn openai_replays_tool_turns() {
        let mut ctx = context(AgentRole::SvgModifier);
        ctx.push_turn(Turn::ToolCall {
            call_id: "call_1".to_string(),
            name: "modify_svg".to_string(),
            input: json!({"svg_content": "<svg/>"}),
        });
        ctx.push_turn(Turn::ToolResult {
            call_id: "call_1".to_string(),
            name: "modify_svg".to_string(),
            content: "<svg><defs/></svg>".to_string(),
            is_error: false,
        });

        let body = runtime().build_request_body(&ctx);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);

        let call = &messages[2];
        assert_eq!(call["role"], "assistant");
        assert_eq!(call["tool_calls"][0]["id"], "call_1");
        let args: Value =
            serde_json::from_str(call["tool_calls"][0]["function"]["arguments"].as_str().unwrap())
                .unwrap();
        assert_eq!(args["svg_content"], "<svg/>");

        let result = &messages[3];
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_1");
        assert_eq!(result["content"], "<svg><defs/></svg>");
    }

    #[test]
    fn openai_parses_tool_call_response() {
        let response = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {
                                "id": "call_abc",
                                "type": "function",
                                "function": {
                                    "name": "parse_gradient_details",
                                    "arguments": "{\"prompt\": \"radial circle\"}"
                                }
                            }
                        ]
                    },
                    "finish_reason": "tool_calls"
                }
            ]
        });

        let action = OpenAIRuntime::parse_response(&response).unwrap();
        assert_eq!(
            action,
            AgentAction::UseTool {
                call_id: "call_abc".to_string(),
                call: ToolCall::ParseGradientDetails {
                    prompt: "radial circle".to_string()
                },
            }
        );
    }

    #[test]
    fn openai_parses_text_response() {
        let response = json!({
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "<svg></svg>"
                    },
                    "finish_reason": "stop"
                }
            ]
        });

        let action = OpenAIRuntime::parse_response(&response).unwrap();
        assert_eq!(action, AgentAction::Respond("<svg></svg>".to_string()));
    }

    #[test]
    fn openai_parses_empty_stop_as_blank_answer() {
        let response = json!({
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": "" },
                    "finish_reason": "stop"
                }
            ]
        });

        let action = OpenAIRuntime::parse_response(&response).unwrap();
        assert_eq!(action, AgentAction::Respond(String::new()));
    }

    #[test]
    fn openai_rejects_unknown_tool() {
        let response = json!({
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {
                                "id": "call_unk",
                                "type": "function",
                                "function": { "name": "fake_tool", "arguments": "{}" }
                            }
                        ]
                    },
                    "finish_reason": "tool_calls"
                }
            ]
        });

        let result = OpenAIRuntime::parse_response(&response);
        assert!(result.unwrap_err().to_string().contains("unknown tool"));
    }

    #[test]
    fn openai_rejects_missing_choices() {
        assert!(matches!(
            OpenAIRuntime::parse_response(&json!({"error": "nope"})),
            Err(AgentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn openai_classifies_http_errors() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited
        ));
        assert!(matches!(
            classify_error(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"code":"context_length_exceeded"}}"#
            ),
            AgentError::ContextTooLarge
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, ""),
            AgentError::ProviderError(msg) if msg.contains("OPENAI_API_KEY")
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, ""),
            AgentError::ProviderError(msg) if msg.contains("Server error")
        ));
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn openai_adapter_basic() {
        let runtime = OpenAIRuntime::from_env().expect("OPENAI_API_KEY must be set");
        let ctx = context(AgentRole::GradientParser);
        let result = runtime.run_step(&ctx).await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
    }
}
