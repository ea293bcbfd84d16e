use async_trait::async_trait;
use interlude_core::{AgentError, RunContext, ToolInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Execution error: {0}")]
    Execution(String),
    /// Suspensions and protocol errors raised inside a tool. These are not
    /// tool failures and travel up the agent tree unchanged.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Validation(e.to_string())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> serde_json::Value;

    /// Run with raw JSON arguments. `ctx` is scoped to this tool call.
    async fn invoke(&self, ctx: &RunContext, arguments: &str) -> Result<String, ToolError>;

    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema(),
        }
    }
}
