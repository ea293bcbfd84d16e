use crate::traits::{Tool, ToolError};
use async_trait::async_trait;
use interlude_core::RunContext;
use serde_json::json;

type Handler = dyn Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync;

/// Tool backed by a plain closure over parsed JSON arguments.
pub struct FunctionTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: Box<Handler>,
}

impl FunctionTool {
    pub fn new<F>(name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema: json!({ "type": "object", "properties": {} }),
            handler: Box::new(handler),
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn invoke(&self, _ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        let args = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)?
        };
        (self.handler)(args)
    }
}
