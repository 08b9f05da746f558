// ABOUTME: Provider module aggregating all agent runtime adapters.
// ABOUTME: Each sub-module implements AgentRuntime for a specific LLM API, or none at all (direct).

pub mod anthropic;
pub mod direct;
pub mod openai;

use crate::context::AgentRole;

/// Build a system prompt for the given agent role.
/// Shared across providers so all adapters produce consistent agent behavior.
pub fn role_prompt(role: &AgentRole) -> String {
    format!(
        "You are the {title}. {backstory}\n\
         Your goal: {goal}.\n\
         You have exactly one tool, `{tool}`. Call it to do the work rather than \
         answering from memory. Once the tool has succeeded, reply with the final \
         answer only.",
        title = role.title(),
        backstory = role.backstory(),
        goal = role.goal(),
        tool = role.tool_name(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prompt_names_role_and_tool() {
        for role in [AgentRole::GradientParser, AgentRole::SvgModifier] {
            let prompt = role_prompt(&role);
            assert!(
                prompt.contains(role.title()),
                "prompt for {:?} should contain its title",
                role
            );
            assert!(
                prompt.contains(role.tool_name()),
                "prompt for {:?} should name its tool",
                role
            );
        }
    }
}
