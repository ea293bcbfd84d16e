//! Agent contract shared by leaf and composite agents.

use crate::context::RunContext;
use crate::error::AgentError;
use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Conversation handed to an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub messages: Vec<Message>,
}

impl AgentInput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(text)],
        }
    }
}

/// Result of one completed agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutcome {
    /// Final message, if the agent produced one.
    pub message: Option<Message>,
    /// Asks an enclosing loop to stop.
    pub exit: bool,
}

impl AgentOutcome {
    pub fn message(message: Message) -> Self {
        Self {
            message: Some(message),
            exit: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn exit() -> Self {
        Self {
            message: None,
            exit: true,
        }
    }
}

/// A node in the agent tree.
///
/// `ctx` is already scoped to this agent: callers pass
/// `ctx.for_agent(child.name())`. On resume the agent is re-entered with the
/// same input and must reach its suspension points again, consulting the
/// interrupt controller on `ctx` before repeating any side effect.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError>;
}
