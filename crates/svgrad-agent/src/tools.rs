// ABOUTME: Tool definitions for LLM function calling plus the typed calls and their executor.
// ABOUTME: Tools read and write WorkflowState, the typed store shared between crew tasks.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use svgrad_core::{GradientConfig, SvgError, apply_gradient, parse_gradient_prompt};

use crate::context::AgentRole;
use crate::runtime::AgentError;

/// Return the complete set of tool definitions that agents can use.
/// These are provider-agnostic JSON schemas; each provider adapter
/// reformats them to match its API's tool specification.
pub fn all_tool_definitions() -> Vec<Value> {
    vec![parse_gradient_details(), modify_svg()]
}

/// Tool definitions a given role is allowed to call.
pub fn tool_definitions_for(role: AgentRole) -> Vec<Value> {
    all_tool_definitions()
        .into_iter()
        .filter(|tool| tool.get("name").and_then(|n| n.as_str()) == Some(role.tool_name()))
        .collect()
}

/// Tool: turn a design prompt into a gradient configuration.
fn parse_gradient_details() -> Value {
    json!({
        "name": "parse_gradient_details",
        "description": "Parse a user prompt for gradient details (linear or radial, vertical or horizontal, start and end hex colors, target shape) and store the configuration for the SVG modifier.",
        "parameters": {
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The user's prompt, verbatim."
                }
            },
            "required": ["prompt"]
        }
    })
}

/// Tool: apply the stored gradient configuration to an SVG document.
fn modify_svg() -> Value {
    json!({
        "name": "modify_svg",
        "description": "Insert the previously parsed gradient into the SVG's <defs> and point the target shapes' fill at it. Returns the complete modified SVG.",
        "parameters": {
            "type": "object",
            "properties": {
                "svg_content": {
                    "type": "string",
                    "description": "The complete SVG document to modify."
                }
            },
            "required": ["svg_content"]
        }
    })
}

/// A parsed, typed tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    ParseGradientDetails { prompt: String },
    ModifySvg { svg_content: String },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ParseGradientDetails { .. } => "parse_gradient_details",
            ToolCall::ModifySvg { .. } => "modify_svg",
        }
    }

    /// The call's arguments as a JSON object, for replaying to providers.
    pub fn input(&self) -> Value {
        match self {
            ToolCall::ParseGradientDetails { prompt } => json!({ "prompt": prompt }),
            ToolCall::ModifySvg { svg_content } => json!({ "svg_content": svg_content }),
        }
    }

    /// Build a typed call from a provider's tool name and JSON arguments.
    pub fn from_name_and_input(name: &str, input: &Value) -> Result<Self, AgentError> {
        let string_arg = |key: &str| {
            input
                .get(key)
                .and_then(|v| v.as_str())
                .map(String::from)
                .ok_or_else(|| {
                    AgentError::InvalidResponse(format!("{} call missing '{}' argument", name, key))
                })
        };

        match name {
            "parse_gradient_details" => Ok(ToolCall::ParseGradientDetails {
                prompt: string_arg("prompt")?,
            }),
            "modify_svg" => Ok(ToolCall::ModifySvg {
                svg_content: string_arg("svg_content")?,
            }),
            other => Err(AgentError::InvalidResponse(format!(
                "unknown tool: {}",
                other
            ))),
        }
    }
}

/// Typed state handed from task to task within one crew run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub gradient_config: Option<GradientConfig>,
    pub final_svg: Option<String>,
    pub shapes_updated: Option<usize>,
}

/// Errors a tool reports back to the agent that called it.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no gradient configuration has been parsed yet; call parse_gradient_details first")]
    MissingConfig,

    #[error(transparent)]
    Svg(#[from] SvgError),
}

/// Run a tool against the shared workflow state and return its textual result.
pub fn execute_tool(
    call: &ToolCall,
    state: &mut WorkflowState,
    gradient_id: &str,
) -> Result<String, ToolError> {
    match call {
        ToolCall::ParseGradientDetails { prompt } => {
            let config = parse_gradient_prompt(prompt);
            let rendered = serde_json::to_string(&config).unwrap_or_default();
            state.gradient_config = Some(config);
            Ok(format!("Parsed gradient config: {}", rendered))
        }
        ToolCall::ModifySvg { svg_content } => {
            let config = state
                .gradient_config
                .as_ref()
                .ok_or(ToolError::MissingConfig)?;

            let applied = apply_gradient(svg_content, config, gradient_id)?;
            if applied.shapes_updated == 0 {
                tracing::warn!(
                    target_shape = %config.target_shape,
                    "no matching shapes found; gradient defined but unused"
                );
            }

            state.final_svg = Some(applied.svg.clone());
            state.shapes_updated = Some(applied.shapes_updated);
            Ok(applied.svg)
        }
    }
}
