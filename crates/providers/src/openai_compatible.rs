use crate::traits::*;
use async_trait::async_trait;
use interlude_core::{Message, Role, ToolCall, ToolInfo};
use reqwest::Client;
use serde_json::json;

pub struct OpenAICompatibleModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAICompatibleModel {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

/// Tool calls of a response message. A call without a function name is a
/// parse error; a missing ID is left empty for the agent to assign.
fn parse_tool_calls(message: &serde_json::Value) -> Result<Vec<ToolCall>, ModelError> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Ok(Vec::new());
    };
    calls
        .iter()
        .enumerate()
        .map(|(index, call)| {
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| ModelError::Parse(format!("tool call {} has no function name", index)))?;
            let arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
            let id = call["id"].as_str().unwrap_or_default();
            Ok(ToolCall::new(id, name, arguments))
        })
        .collect()
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn wire_message(message: &Message) -> serde_json::Value {
    let mut out = json!({
        "role": role_name(message.role),
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        out["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments }
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        out["tool_call_id"] = json!(id);
    }
    out
}

fn wire_tool(tool: &ToolInfo) -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters
        }
    })
}

#[async_trait]
impl ChatModel for OpenAICompatibleModel {
    async fn generate(&self, messages: &[Message], tools: &[ToolInfo]) -> Result<Message, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });

        if !tools.is_empty() {
            body["tools"] = tools.iter().map(wire_tool).collect();
        }

        let mut request = self.client.post(&url).json(&body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| ModelError::Parse("No choices in response".to_string()))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();

        let tool_calls = parse_tool_calls(message)?;

        tracing::debug!("{} returned {} tool call(s)", self.model, tool_calls.len());
        Ok(Message::assistant_with_tools(content, tool_calls))
    }

    fn name(&self) -> &str {
        "OpenAI Compatible"
    }
}
