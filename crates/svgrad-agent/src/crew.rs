// ABOUTME: Sequential crew: runs each task with its agent, looping runtime steps and tool calls.
// ABOUTME: Tasks share a WorkflowState; later tasks see earlier outputs as context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use svgrad_core::DEFAULT_GRADIENT_ID;

use crate::context::{AgentContext, AgentRole, Turn};
use crate::runtime::{AgentAction, AgentError, AgentRuntime};
use crate::tools::{ToolCall, WorkflowState, execute_tool};

/// Default cap on reasoning steps per task.
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// Attempts per step when the provider reports rate limiting.
const RATE_LIMIT_ATTEMPTS: u32 = 3;

const PARSE_TASK_TEMPLATE: &str = "Analyze this user prompt and extract gradient details: {user_prompt}\n\n\
    Use the parse_gradient_details tool to identify:\n\
    - Gradient type (linear or radial)\n\
    - Direction (horizontal or vertical)\n\
    - Start and end colors\n\
    - Target shape to modify\n\n\
    Return the parsed configuration.";

const MODIFY_TASK_TEMPLATE: &str = "Modify the SVG to apply the gradient that was parsed in the previous task.\n\n\
    Input SVG: {svg_content}\n\n\
    Use the modify_svg tool to apply the gradient configuration to the SVG.\n\
    Return the complete modified SVG with the gradient applied.";

/// Errors that abort a crew run.
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("missing kickoff input '{0}'")]
    MissingInput(String),

    #[error("no agent in the crew has role {0}")]
    NoAgent(AgentRole),

    #[error("agent {agent_id} failed: {source}")]
    Agent {
        agent_id: String,
        #[source]
        source: AgentError,
    },

    #[error("agent {agent_id} produced no result within {iterations} iterations")]
    IterationLimit { agent_id: String, iterations: usize },
}

/// A crew member: a role plus a unique id used in logs and provider turns.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub agent_id: String,
}

impl AgentSpec {
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            agent_id: format!("{}-{}", role.label(), Ulid::new()),
        }
    }
}

/// A unit of work assigned to the agent with `role`.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Description with `{input_name}` placeholders filled from kickoff inputs.
    pub description: String,
    pub expected_output: String,
    pub role: AgentRole,
    /// Whether the outputs of earlier tasks are passed along as context.
    pub uses_prior_context: bool,
}

impl TaskSpec {
    pub fn parse_gradient() -> Self {
        Self {
            description: PARSE_TASK_TEMPLATE.to_string(),
            expected_output: "Gradient configuration details".to_string(),
            role: AgentRole::GradientParser,
            uses_prior_context: false,
        }
    }

    pub fn modify_svg() -> Self {
        Self {
            description: MODIFY_TASK_TEMPLATE.to_string(),
            expected_output: "Complete SVG with gradient applied".to_string(),
            role: AgentRole::SvgModifier,
            uses_prior_context: true,
        }
    }
}

/// Tunables for a crew run.
#[derive(Debug, Clone)]
pub struct CrewOptions {
    pub max_iterations: usize,
    pub gradient_id: String,
    /// First delay after a rate-limited step; doubles on each retry.
    pub rate_limit_backoff: Duration,
}

impl Default for CrewOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gradient_id: DEFAULT_GRADIENT_ID.to_string(),
            rate_limit_backoff: Duration::from_millis(500),
        }
    }
}

/// What one task produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub agent_id: String,
    pub role: AgentRole,
    pub raw: String,
    pub tool_calls: usize,
}

/// Result of a full crew run, serializable as a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    pub run_id: Ulid,
    pub provider: String,
    pub model: String,
    /// Output of the last task.
    pub raw: String,
    pub task_outputs: Vec<TaskOutput>,
    pub state: WorkflowState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs tasks in order, each with the agent whose role matches.
pub struct Crew {
    runtime: Arc<dyn AgentRuntime>,
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    options: CrewOptions,
}

impl Crew {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        agents: Vec<AgentSpec>,
        tasks: Vec<TaskSpec>,
        options: CrewOptions,
    ) -> Self {
        Self {
            runtime,
            agents,
            tasks,
            options,
        }
    }

    /// The two-agent crew: parse the prompt, then modify the SVG.
    pub fn gradient_crew(runtime: Arc<dyn AgentRuntime>, options: CrewOptions) -> Self {
        Self::new(
            runtime,
            vec![
                AgentSpec::new(AgentRole::GradientParser),
                AgentSpec::new(AgentRole::SvgModifier),
            ],
            vec![TaskSpec::parse_gradient(), TaskSpec::modify_svg()],
            options,
        )
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Run every task in order and collect the results.
    pub async fn kickoff(
        &self,
        inputs: BTreeMap<String, String>,
    ) -> Result<CrewOutput, CrewError> {
        let run_id = Ulid::new();
        let started_at = Utc::now();
        let mut state = WorkflowState::default();
        let mut task_outputs: Vec<TaskOutput> = Vec::new();

        tracing::info!(
            run_id = %run_id,
            provider = self.runtime.provider_name(),
            model = self.runtime.model_name(),
            tasks = self.tasks.len(),
            "crew kickoff"
        );

        for task in &self.tasks {
            let agent = self
                .agents
                .iter()
                .find(|a| a.role == task.role)
                .ok_or(CrewError::NoAgent(task.role))?;

            let description = render_template(&task.description, &inputs)?;
            let mut context = AgentContext::new(
                run_id,
                agent.agent_id.clone(),
                task.role,
                description,
                task.expected_output.clone(),
            );
            context.inputs = inputs.clone();
            if task.uses_prior_context {
                context.prior_outputs = task_outputs.iter().map(|o| o.raw.clone()).collect();
            }

            let raw = self.run_task(&mut context, &mut state).await?;

            tracing::info!(
                run_id = %run_id,
                agent = %agent.agent_id,
                tool_calls = context.tool_calls_made(),
                output_len = raw.len(),
                "task completed"
            );

            task_outputs.push(TaskOutput {
                agent_id: agent.agent_id.clone(),
                role: task.role,
                raw,
                tool_calls: context.tool_calls_made(),
            });
        }

        let raw = task_outputs
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();

        Ok(CrewOutput {
            run_id,
            provider: self.runtime.provider_name().to_string(),
            model: self.runtime.model_name().to_string(),
            raw,
            task_outputs,
            state,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Drive one task to a final answer. Falls back to the last successful
    /// tool result if the agent never answers within the iteration cap.
    async fn run_task(
        &self,
        context: &mut AgentContext,
        state: &mut WorkflowState,
    ) -> Result<String, CrewError> {
        let mut last_success: Option<String> = None;

        for iteration in 1..=self.options.max_iterations {
            let action = self.step_with_retry(context).await?;

            match action {
                AgentAction::UseTool { call_id, mut call } => {
                    if let ToolCall::ModifySvg { svg_content } = &mut call
                        && svg_content.trim().is_empty()
                        && let Some(input_svg) = context.inputs.get("svg_content")
                    {
                        *svg_content = input_svg.clone();
                    }

                    context.push_turn(Turn::ToolCall {
                        call_id: call_id.clone(),
                        name: call.name().to_string(),
                        input: call.input(),
                    });

                    let (content, is_error) = if call.name() != context.agent_role.tool_name() {
                        (
                            format!(
                                "tool {} is not available to the {}; use {}",
                                call.name(),
                                context.agent_role.title(),
                                context.agent_role.tool_name()
                            ),
                            true,
                        )
                    } else {
                        match execute_tool(&call, state, &self.options.gradient_id) {
                            Ok(output) => {
                                last_success = Some(output.clone());
                                (output, false)
                            }
                            Err(e) => (e.to_string(), true),
                        }
                    };

                    if is_error {
                        tracing::warn!(
                            agent = %context.agent_id,
                            tool = call.name(),
                            iteration,
                            error = %content,
                            "tool call failed"
                        );
                    } else {
                        tracing::debug!(
                            agent = %context.agent_id,
                            tool = call.name(),
                            iteration,
                            "tool call succeeded"
                        );
                    }

                    context.push_turn(Turn::ToolResult {
                        call_id,
                        name: call.name().to_string(),
                        content,
                        is_error,
                    });
                }

                AgentAction::Respond(text) => {
                    if !text.trim().is_empty() {
                        context.push_turn(Turn::Assistant(text.clone()));
                        return Ok(text);
                    }
                    if let Some(output) = last_success {
                        return Ok(output);
                    }
                    context.push_turn(Turn::User(format!(
                        "You have not produced a result yet. Call {} and then reply with its output.",
                        context.agent_role.tool_name()
                    )));
                }
            }
        }

        match last_success {
            Some(output) => {
                tracing::warn!(
                    agent = %context.agent_id,
                    iterations = self.options.max_iterations,
                    "iteration limit reached; using last tool result"
                );
                Ok(output)
            }
            None => Err(CrewError::IterationLimit {
                agent_id: context.agent_id.clone(),
                iterations: self.options.max_iterations,
            }),
        }
    }

    async fn step_with_retry(&self, context: &AgentContext) -> Result<AgentAction, CrewError> {
        let mut attempt = 1;
        let mut delay = self.options.rate_limit_backoff;

        loop {
            match self.runtime.run_step(context).await {
                Ok(action) => return Ok(action),
                Err(AgentError::RateLimited) if attempt < RATE_LIMIT_ATTEMPTS => {
                    tracing::warn!(
                        agent = %context.agent_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(source) => {
                    tracing::error!(
                        agent = %context.agent_id,
                        error = %source,
                        "agent step failed"
                    );
                    return Err(CrewError::Agent {
                        agent_id: context.agent_id.clone(),
                        source,
                    });
                }
            }
        }
    }
}

/// Fill `{name}` placeholders from `inputs`. Braces that do not wrap a
/// plain identifier are left alone.
pub fn render_template(
    template: &str,
    inputs: &BTreeMap<String, String>,
) -> Result<String, CrewError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close)
                if close > 0
                    && after[..close]
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                let name = &after[..close];
                let value = inputs
                    .get(name)
                    .ok_or_else(|| CrewError::MissingInput(name.to_string()))?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::direct::DirectRuntime;
    use crate::testing::ScriptedRuntime;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10" fill="red"/></svg>"#;

    fn inputs() -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "user_prompt".to_string(),
                "horizontal gradient from #112233 to #445566 on the rect".to_string(),
            ),
            ("svg_content".to_string(), SVG.to_string()),
        ])
    }

    fn fast_options() -> CrewOptions {
        CrewOptions {
            rate_limit_backoff: Duration::from_millis(1),
            ..CrewOptions::default()
        }
    }

    fn parse_call() -> AgentAction {
        AgentAction::UseTool {
            call_id: "c1".to_string(),
            call: ToolCall::ParseGradientDetails {
                prompt: "radial gradient #000000 #ffffff".to_string(),
            },
        }
    }

    fn modify_call(svg: &str) -> AgentAction {
        AgentAction::UseTool {
            call_id: "c2".to_string(),
            call: ToolCall::ModifySvg {
                svg_content: svg.to_string(),
            },
        }
    }

    #[test]
    fn render_template_fills_placeholders() {
        let rendered = render_template("a {user_prompt} b {svg_content}", &inputs()).unwrap();
        assert!(rendered.starts_with("a horizontal gradient"));
        assert!(rendered.ends_with(SVG));
    }

    #[test]
    fn render_template_leaves_non_identifier_braces() {
        let rendered = render_template("{ \"a\": 1 } {}", &BTreeMap::new()).unwrap();
        assert_eq!(rendered, "{ \"a\": 1 } {}");
    }

    #[test]
    fn render_template_reports_missing_input() {
        let err = render_template("{user_prompt}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CrewError::MissingInput(name) if name == "user_prompt"));
    }

    #[tokio::test]
    async fn direct_runtime_completes_gradient_crew() {
        let crew = Crew::gradient_crew(Arc::new(DirectRuntime::new()), fast_options());
        let output = crew.kickoff(inputs()).await.unwrap();

        assert_eq!(output.task_outputs.len(), 2);
        assert!(output.task_outputs[0].raw.starts_with("Parsed gradient config"));
        assert_eq!(output.task_outputs[1].tool_calls, 1);

        let config = output.state.gradient_config.as_ref().unwrap();
        assert_eq!(config.start_color.as_str(), "#112233");

        assert!(output.raw.contains(r#"x2="100%""#));
        assert!(output.raw.contains(r#"fill="url(#grad1)""#));
        assert_eq!(output.state.final_svg.as_deref(), Some(output.raw.as_str()));
        assert_eq!(output.provider, "direct");
        assert!(output.finished_at >= output.started_at);
    }

    #[tokio::test]
    async fn scripted_agents_pass_context_between_tasks() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            parse_call(),
            AgentAction::Respond("Parsed a radial gradient.".to_string()),
            modify_call(SVG),
            AgentAction::Respond("Here you go:\n<svg>done</svg>".to_string()),
        ]));
        let crew = Crew::gradient_crew(runtime.clone(), fast_options());
        let output = crew.kickoff(inputs()).await.unwrap();

        assert_eq!(output.raw, "Here you go:\n<svg>done</svg>");
        assert!(output.state.final_svg.as_deref().unwrap().contains("radialGradient"));

        let seen = runtime.seen_contexts();
        assert_eq!(seen.len(), 4);
        // Modifier task carries the parser's answer as prior context.
        assert_eq!(seen[2].prior_outputs, vec!["Parsed a radial gradient.".to_string()]);
        assert!(seen[0].prior_outputs.is_empty());
    }

    #[tokio::test]
    async fn disallowed_tool_is_reported_back_to_agent() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            modify_call(SVG),
            parse_call(),
            AgentAction::Respond("ok".to_string()),
            modify_call(SVG),
            AgentAction::Respond("<svg/>".to_string()),
        ]));
        let crew = Crew::gradient_crew(runtime.clone(), fast_options());
        crew.kickoff(inputs()).await.unwrap();

        let seen = runtime.seen_contexts();
        match &seen[1].turns[1] {
            Turn::ToolResult {
                content, is_error, ..
            } => {
                assert!(*is_error);
                assert!(content.contains("not available"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_svg_argument_uses_kickoff_svg() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            parse_call(),
            AgentAction::Respond("ok".to_string()),
            modify_call("  "),
            AgentAction::Respond(String::new()),
        ]));
        let crew = Crew::gradient_crew(runtime, fast_options());
        let output = crew.kickoff(inputs()).await.unwrap();

        // Blank answer falls back to the tool output.
        assert!(output.raw.contains("radialGradient"));
        assert!(output.raw.contains(r#"fill="url(#grad1)""#));
    }

    #[tokio::test]
    async fn iteration_limit_without_result_is_an_error() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            AgentAction::Respond(String::new()),
            AgentAction::Respond(String::new()),
        ]));
        let options = CrewOptions {
            max_iterations: 2,
            ..fast_options()
        };
        let crew = Crew::gradient_crew(runtime, options);
        let err = crew.kickoff(inputs()).await.unwrap_err();
        assert!(matches!(err, CrewError::IterationLimit { iterations: 2, .. }));
    }

    #[tokio::test]
    async fn iteration_limit_after_tool_success_uses_tool_output() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            parse_call(),
            parse_call(),
            modify_call(SVG),
            modify_call(SVG),
        ]));
        let options = CrewOptions {
            max_iterations: 2,
            ..fast_options()
        };
        let crew = Crew::gradient_crew(runtime, options);
        let output = crew.kickoff(inputs()).await.unwrap();
        assert!(output.task_outputs[0].raw.starts_with("Parsed gradient config"));
        assert!(output.raw.contains("radialGradient"));
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let runtime = Arc::new(
            ScriptedRuntime::new(vec![
                parse_call(),
                AgentAction::Respond("ok".to_string()),
                modify_call(SVG),
                AgentAction::Respond("<svg/>".to_string()),
            ])
            .with_rate_limits(2),
        );
        let crew = Crew::gradient_crew(runtime, fast_options());
        let output = crew.kickoff(inputs()).await.unwrap();
        assert_eq!(output.raw, "<svg/>");
    }

    #[tokio::test]
    async fn persistent_rate_limit_gives_up() {
        let runtime = Arc::new(ScriptedRuntime::new(vec![parse_call()]).with_rate_limits(3));
        let crew = Crew::gradient_crew(runtime, fast_options());
        let err = crew.kickoff(inputs()).await.unwrap_err();
        assert!(matches!(
            err,
            CrewError::Agent {
                source: AgentError::RateLimited,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_agent_for_task_is_an_error() {
        let crew = Crew::new(
            Arc::new(DirectRuntime::new()),
            vec![AgentSpec::new(AgentRole::GradientParser)],
            vec![TaskSpec::modify_svg()],
            fast_options(),
        );
        let err = crew.kickoff(inputs()).await.unwrap_err();
        assert!(matches!(err, CrewError::NoAgent(AgentRole::SvgModifier)));
    }
}
