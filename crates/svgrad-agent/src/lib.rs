// ABOUTME: Agent system for svgrad, turning a prompt into an SVG gradient edit with a two-agent crew.
// ABOUTME: Defines the runtime trait, provider adapters, tools, the sequential crew, and the file pipeline.

pub mod client;
pub mod context;
pub mod crew;
pub mod pipeline;
pub mod providers;
pub mod runtime;
pub mod testing;
pub mod tools;

pub use client::{SUPPORTED_PROVIDERS, create_runtime};
pub use context::{AgentContext, AgentRole, Turn};
pub use crew::{Crew, CrewError, CrewOptions, CrewOutput, DEFAULT_MAX_ITERATIONS};
pub use pipeline::{
    DEMO_PROMPT, DEMO_SVG, PipelineError, PipelineOutcome, PipelineRequest, SvgSource,
    run_pipeline, write_demo_svg, write_file,
};
pub use runtime::{AgentAction, AgentError, AgentRuntime};
pub use tools::{ToolCall, WorkflowState, all_tool_definitions};
