// ABOUTME: Factory function for creating agent runtimes by provider name.
// ABOUTME: Resolves provider + optional model into a configured Arc<dyn AgentRuntime>.

use std::env;
use std::sync::Arc;

use crate::providers::anthropic::{self, AnthropicRuntime};
use crate::providers::direct::DirectRuntime;
use crate::providers::openai::{self, OpenAIRuntime};
use crate::runtime::AgentRuntime;

/// Providers accepted by `create_runtime`.
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "anthropic", "direct"];

/// Create an agent runtime for the given provider name.
///
/// The model is resolved from:
/// 1. The explicit `model` parameter (if Some)
/// 2. A provider-specific environment variable (e.g. OPENAI_MODEL)
/// 3. A sensible default for that provider
pub fn create_runtime(
    provider: &str,
    model: Option<&str>,
) -> Result<Arc<dyn AgentRuntime>, anyhow::Error> {
    match provider {
        "openai" => {
            let api_key = env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            let resolved_model = resolve_model(model, "OPENAI_MODEL", openai::DEFAULT_MODEL);
            let base_url = env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string());
            Ok(Arc::new(OpenAIRuntime::new(api_key, base_url, resolved_model)))
        }
        "anthropic" => {
            let api_key = env::var("ANTHROPIC_API_KEY")
                .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
            let resolved_model = resolve_model(model, "ANTHROPIC_MODEL", anthropic::DEFAULT_MODEL);
            let base_url = env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
            Ok(Arc::new(AnthropicRuntime::new(
                api_key,
                base_url,
                resolved_model,
            )))
        }
        "direct" => {
            if model.is_some() {
                tracing::warn!("direct runtime ignores the model setting");
            }
            Ok(Arc::new(DirectRuntime::new()))
        }
        unknown => Err(anyhow::anyhow!(
            "unsupported provider: {} (expected one of {})",
            unknown,
            SUPPORTED_PROVIDERS.join(", ")
        )),
    }
}

fn resolve_model(explicit: Option<&str>, env_var: &str, default: &str) -> String {
    explicit
        .map(String::from)
        .or_else(|| env::var(env_var).ok().filter(|m| !m.is_empty()))
        .unwrap_or_else(|| default.to_string())
}
