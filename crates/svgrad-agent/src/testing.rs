// ABOUTME: Test utilities for svgrad-agent, including a scripted AgentRuntime.
// ABOUTME: Used in tests to drive the crew loop without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::runtime::{AgentAction, AgentError, AgentRuntime};

/// A runtime that replays a fixed list of actions, one per step, and records
/// every context it was shown.
///
/// Optionally reports `RateLimited` for the first N steps so retry handling
/// can be exercised.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    actions: Mutex<VecDeque<AgentAction>>,
    rate_limits_left: Mutex<usize>,
    seen: Mutex<Vec<AgentContext>>,
}

impl ScriptedRuntime {
    /// Create a runtime that returns `actions` in order.
    pub fn new(actions: Vec<AgentAction>) -> Self {
        Self {
            actions: Mutex::new(actions.into()),
            rate_limits_left: Mutex::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `count` steps with `AgentError::RateLimited`.
    pub fn with_rate_limits(self, count: usize) -> Self {
        if let Ok(mut left) = self.rate_limits_left.lock() {
            *left = count;
        }
        self
    }

    /// Contexts passed to every step that was not rate limited.
    pub fn seen_contexts(&self) -> Vec<AgentContext> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of scripted actions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.actions.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        {
            let mut left = self
                .rate_limits_left
                .lock()
                .map_err(|_| AgentError::ProviderError("poisoned lock".to_string()))?;
            if *left > 0 {
                *left -= 1;
                return Err(AgentError::RateLimited);
            }
        }

        if let Ok(mut seen) = self.seen.lock() {
            seen.push(context.clone());
        }

        self.actions
            .lock()
            .map_err(|_| AgentError::ProviderError("poisoned lock".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::InvalidResponse("script exhausted".to_string()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "script"
    }
}
