// ABOUTME: Provides AgentContext, the per-task conversation handed to an AgentRuntime each step.
// ABOUTME: Defines AgentRole (gradient parser, SVG modifier) and the Turn history entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Tool results longer than this are truncated when rendered into a prompt.
pub const TOOL_RESULT_PROMPT_CAP: usize = 16 * 1024;

/// Identifies the functional role an agent plays within the crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentRole {
    GradientParser,
    SvgModifier,
}

impl AgentRole {
    /// Return a human-readable label for this role.
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::GradientParser => "gradient_parser",
            AgentRole::SvgModifier => "svg_modifier",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AgentRole::GradientParser => "Gradient Parser",
            AgentRole::SvgModifier => "SVG Modifier",
        }
    }

    pub fn goal(&self) -> &'static str {
        match self {
            AgentRole::GradientParser => "Extract gradient details from the user prompt",
            AgentRole::SvgModifier => "Apply the parsed gradient to the SVG elements",
        }
    }

    pub fn backstory(&self) -> &'static str {
        match self {
            AgentRole::GradientParser => {
                "You are an expert at analyzing design prompts and extracting gradient specifications."
            }
            AgentRole::SvgModifier => {
                "You are an SVG expert who specializes in adding gradients to SVG elements."
            }
        }
    }

    /// The single tool this role may call.
    pub fn tool_name(&self) -> &'static str {
        match self {
            AgentRole::GradientParser => "parse_gradient_details",
            AgentRole::SvgModifier => "modify_svg",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in an agent's conversation for the current task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Turn {
    User(String),
    Assistant(String),
    ToolCall {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
}

/// Everything an agent sees when deciding its next action on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub run_id: Ulid,
    pub agent_id: String,
    pub agent_role: AgentRole,
    pub task_description: String,
    pub expected_output: String,
    /// Raw kickoff inputs (`user_prompt`, `svg_content`).
    pub inputs: BTreeMap<String, String>,
    /// Outputs of earlier tasks this task depends on.
    pub prior_outputs: Vec<String>,
    pub turns: Vec<Turn>,
}

impl AgentContext {
    /// Create a fresh context with no turns. Providers open every request
    /// with `task_prompt()` and then replay `turns`.
    pub fn new(
        run_id: Ulid,
        agent_id: String,
        agent_role: AgentRole,
        task_description: String,
        expected_output: String,
    ) -> Self {
        Self {
            run_id,
            agent_id,
            agent_role,
            task_description,
            expected_output,
            inputs: BTreeMap::new(),
            prior_outputs: Vec::new(),
            turns: Vec::new(),
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The most recent tool result, successful or not.
    pub fn last_tool_result(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|t| matches!(t, Turn::ToolResult { .. }))
    }

    /// Number of tool calls the agent has made on this task so far.
    pub fn tool_calls_made(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t, Turn::ToolCall { .. }))
            .count()
    }

    /// Opening user message for providers: the task plus any context from
    /// earlier tasks and the expected output.
    pub fn task_prompt(&self) -> String {
        let mut prompt = self.task_description.clone();
        if !self.prior_outputs.is_empty() {
            prompt.push_str("\n\n[Context from previous tasks]\n");
            prompt.push_str(&self.prior_outputs.join("\n---\n"));
        }
        prompt.push_str("\n\n[Expected output] ");
        prompt.push_str(&self.expected_output);
        prompt
    }
}

/// Shorten `content` to the prompt cap on a char boundary, marking the cut.
pub fn truncate_for_prompt(content: &str) -> String {
    if content.len() <= TOOL_RESULT_PROMPT_CAP {
        return content.to_string();
    }
    let mut end = TOOL_RESULT_PROMPT_CAP;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n[truncated {} bytes]",
        &content[..end],
        content.len() - end
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AgentContext {
        AgentContext::new(
            Ulid::new(),
            "gradient_parser-1".to_string(),
            AgentRole::GradientParser,
            "Analyze this prompt".to_string(),
            "Gradient configuration details".to_string(),
        )
    }

    #[test]
    fn new_context_has_no_turns() {
        let ctx = ctx();
        assert!(ctx.turns.is_empty());
        assert_eq!(ctx.tool_calls_made(), 0);
        assert!(ctx.last_tool_result().is_none());
    }

    #[test]
    fn tracks_tool_calls_and_latest_result() {
        let mut ctx = ctx();
        for (i, content) in ["first", "second"].iter().enumerate() {
            let call_id = format!("call-{}", i);
            ctx.push_turn(Turn::ToolCall {
                call_id: call_id.clone(),
                name: "parse_gradient_details".to_string(),
                input: serde_json::json!({"prompt": "x"}),
            });
            ctx.push_turn(Turn::ToolResult {
                call_id,
                name: "parse_gradient_details".to_string(),
                content: content.to_string(),
                is_error: false,
            });
        }

        assert_eq!(ctx.tool_calls_made(), 2);
        match ctx.last_tool_result() {
            Some(Turn::ToolResult { content, .. }) => assert_eq!(content, "second"),
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[test]
    fn task_prompt_includes_prior_outputs() {
        let mut ctx = ctx();
        assert!(!ctx.task_prompt().contains("previous tasks"));

        ctx.prior_outputs.push("Parsed gradient config: {}".to_string());
        let prompt = ctx.task_prompt();
        assert!(prompt.starts_with("Analyze this prompt"));
        assert!(prompt.contains("Parsed gradient config"));
        assert!(prompt.contains("Gradient configuration details"));
    }

    #[test]
    fn truncation_respects_cap_and_char_boundaries() {
        let short = "hello";
        assert_eq!(truncate_for_prompt(short), short);

        let long = "é".repeat(TOOL_RESULT_PROMPT_CAP);
        let truncated = truncate_for_prompt(&long);
        assert!(truncated.contains("[truncated"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn role_metadata_is_distinct() {
        assert_ne!(
            AgentRole::GradientParser.tool_name(),
            AgentRole::SvgModifier.tool_name()
        );
        assert_eq!(AgentRole::SvgModifier.to_string(), "svg_modifier");
        assert!(AgentRole::GradientParser.backstory().contains("gradient"));
    }
}
