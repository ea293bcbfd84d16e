//! Supervisor: a controller model that delegates turns to named sub-agents.

use async_trait::async_trait;
use interlude_core::{
    Agent, AgentAction, AgentError, AgentInput, AgentOutcome, EventKind, Message, Role, RunContext, ToolCall, ToolInfo,
};
use interlude_providers::ChatModel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TRANSFER_TOOL: &str = "transfer_to_agent";

#[derive(Debug, Serialize, Deserialize)]
struct SupervisorState {
    turn: usize,
    messages: Vec<Message>,
    delegate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferArgs {
    agent_name: String,
}

/// Each turn the controller model either answers or transfers control to one
/// sub-agent via the `transfer_to_agent` tool. The sub-agent's answer is
/// appended to the controller's conversation and control returns to the
/// controller.
pub struct SupervisorAgent {
    name: String,
    description: String,
    instruction: String,
    model: Arc<dyn ChatModel>,
    agents: Vec<Arc<dyn Agent>>,
    max_turns: usize,
}

impl SupervisorAgent {
    pub fn new(name: &str, description: &str, model: Arc<dyn ChatModel>, agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instruction: String::new(),
            model,
            agents,
            max_turns: 8,
        }
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = instruction.to_string();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    fn transfer_tool(&self) -> ToolInfo {
        let names: Vec<&str> = self.agents.iter().map(|a| a.name()).collect();
        let roster: Vec<String> = self
            .agents
            .iter()
            .map(|a| format!("{}: {}", a.name(), a.description()))
            .collect();
        ToolInfo {
            name: TRANSFER_TOOL.to_string(),
            description: format!("Transfer the question to another agent. Available agents:\n{}", roster.join("\n")),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": { "type": "string", "enum": names }
                },
                "required": ["agent_name"]
            }),
        }
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// Answer every tool call of `reply`; returns the accepted destination.
    fn route(&self, reply: &Message, messages: &mut Vec<Message>) -> Option<String> {
        let mut dest = None;
        for call in &reply.tool_calls {
            let text = match self.resolve(call) {
                Ok(name) if dest.is_none() => {
                    let text = format!("successfully transferred to agent [{}]", name);
                    dest = Some(name);
                    text
                }
                Ok(_) => "only one transfer per turn is allowed".to_string(),
                Err(text) => {
                    warn!("{}: {}", self.name, text);
                    text
                }
            };
            messages.push(Message::tool(call, text));
        }
        dest
    }

    fn resolve(&self, call: &ToolCall) -> Result<String, String> {
        if call.name != TRANSFER_TOOL {
            return Err(format!("tool '{}' not found", call.name));
        }
        let args: TransferArgs = serde_json::from_str(&call.arguments)
            .map_err(|e| format!("invalid transfer arguments: {}", e))?;
        match self.find(&args.agent_name) {
            Some(agent) => Ok(agent.name().to_string()),
            None => Err(format!("agent '{}' not found", args.agent_name)),
        }
    }
}

/// Conversation handed to a delegate: everything except the controller's
/// own system prompt and tool plumbing.
fn delegate_input(messages: &[Message]) -> AgentInput {
    AgentInput::new(
        messages
            .iter()
            .filter(|m| m.role != Role::System && m.role != Role::Tool && !m.has_tool_calls())
            .cloned()
            .collect(),
    )
}

#[async_trait]
impl Agent for SupervisorAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let mut state = match ctx.node_state::<SupervisorState>()? {
            Some(state) => state,
            None => {
                let mut messages = Vec::new();
                if !self.instruction.is_empty() {
                    messages.push(Message::system(self.instruction.clone()));
                }
                messages.extend(input.messages.iter().cloned());
                SupervisorState {
                    turn: 0,
                    messages,
                    delegate: None,
                }
            }
        };
        let tools = [self.transfer_tool()];

        while state.turn < self.max_turns {
            let dest = match state.delegate.clone() {
                Some(dest) => dest,
                None => {
                    let mut reply = self.model.generate(&state.messages, &tools).await?;
                    reply.ensure_unique_call_ids();
                    ctx.emit(EventKind::Output {
                        message: reply.clone().named(self.name.clone()),
                    })
                    .await;
                    state.messages.push(reply.clone());

                    if !reply.has_tool_calls() {
                        return Ok(AgentOutcome::message(reply.named(self.name.clone())));
                    }
                    match self.route(&reply, &mut state.messages) {
                        Some(dest) => {
                            info!("{} transferring to {}", self.name, dest);
                            ctx.emit(EventKind::Action {
                                action: AgentAction::TransferToAgent { dest: dest.clone() },
                            })
                            .await;
                            dest
                        }
                        None => {
                            state.turn += 1;
                            continue;
                        }
                    }
                }
            };

            let Some(agent) = self.find(&dest) else {
                return Err(AgentError::Protocol(format!("delegate '{}' no longer exists", dest)));
            };

            debug!("{} turn {} delegated to {}", self.name, state.turn, dest);
            let child_ctx = ctx.for_iteration(state.turn).for_agent(agent.name());
            let outcome = match agent.run(&child_ctx, &delegate_input(&state.messages)).await {
                Ok(outcome) => outcome,
                Err(AgentError::Interrupted(mut suspension)) => {
                    state.delegate = Some(dest);
                    suspension.record_node(ctx.address(), &state)?;
                    return Err(AgentError::Interrupted(suspension));
                }
                Err(e) => return Err(e),
            };

            if let Some(message) = outcome.message {
                state.messages.push(Message::assistant(message.content).named(dest.clone()));
            }
            child_ctx
                .emit(EventKind::Action {
                    action: AgentAction::TransferToAgent { dest: self.name.clone() },
                })
                .await;

            state.delegate = None;
            state.turn += 1;
        }

        Err(AgentError::MaxIterations(self.max_turns))
    }
}
