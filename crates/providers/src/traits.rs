use async_trait::async_trait;
use interlude_core::{AgentError, Message, ToolInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Script error: {0}")]
    Script(String),
}

impl From<ModelError> for AgentError {
    fn from(e: ModelError) -> Self {
        AgentError::Model(e.to_string())
    }
}

/// Chat-completion backend. Returns one whole assistant message, which may
/// carry tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[Message], tools: &[ToolInfo]) -> Result<Message, ModelError>;

    fn name(&self) -> &str;
}
