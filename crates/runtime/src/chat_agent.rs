//! Chat-model agent: the model/tool loop.

use async_trait::async_trait;
use interlude_core::{Agent, AgentError, AgentInput, AgentOutcome, EventKind, Message, RunContext, Suspension};
use interlude_providers::ChatModel;
use interlude_tools::{ToolError, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ChatModelAgentConfig {
    pub name: String,
    pub description: String,
    /// System prompt prepended to the conversation.
    pub instruction: String,
    pub model: Arc<dyn ChatModel>,
    pub tools: ToolRegistry,
    pub max_iterations: usize,
    /// Session key that receives the final answer.
    pub output_key: Option<String>,
}

impl ChatModelAgentConfig {
    pub fn new(name: &str, description: &str, model: Arc<dyn ChatModel>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instruction: String::new(),
            model,
            tools: ToolRegistry::new(),
            max_iterations: 10,
            output_key: None,
        }
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = instruction.to_string();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_output_key(mut self, key: &str) -> Self {
        self.output_key = Some(key.to_string());
        self
    }
}

/// Position of a suspended agent: the conversation up to and including the
/// assistant turn whose tool calls are being executed, plus the results of
/// the calls that already finished.
#[derive(Debug, Serialize, Deserialize)]
struct ChatState {
    messages: Vec<Message>,
    iteration: usize,
    #[serde(default)]
    completed: BTreeMap<String, String>,
}

/// Calls the model, executes the tool calls it asks for, and repeats until the
/// model answers without tools.
///
/// Every tool call of one model turn is executed even if an earlier call
/// suspends; all suspensions of that turn are surfaced together. Finished
/// results are kept in the agent's checkpointed state so a resume never runs
/// them again.
pub struct ChatModelAgent {
    config: ChatModelAgentConfig,
}

impl ChatModelAgent {
    pub fn new(config: ChatModelAgentConfig) -> Self {
        Self { config }
    }

    fn initial_messages(&self, input: &AgentInput) -> Vec<Message> {
        let mut messages = Vec::with_capacity(input.messages.len() + 1);
        if !self.config.instruction.is_empty() {
            messages.push(Message::system(self.config.instruction.clone()));
        }
        messages.extend(input.messages.iter().cloned());
        messages
    }

    async fn finish(&self, ctx: &RunContext, reply: Message) -> Result<AgentOutcome, AgentError> {
        if let Some(key) = &self.config.output_key {
            ctx.append_context_params([(key.clone(), reply.content.clone())])?;
        }
        Ok(AgentOutcome::message(reply.named(self.config.name.clone())))
    }

    /// Run every unfinished call of `reply`. Returns the merged suspension of
    /// the calls that paused, if any.
    async fn run_tools(
        &self,
        ctx: &RunContext,
        iteration: usize,
        reply: &Message,
        completed: &mut BTreeMap<String, String>,
    ) -> Result<Option<Suspension>, AgentError> {
        let mut suspended: Option<Suspension> = None;

        for call in &reply.tool_calls {
            if completed.contains_key(&call.id) {
                continue;
            }

            let Some(tool) = self.config.tools.get(&call.name) else {
                warn!("Model requested unknown tool: {}", call.name);
                let text = format!("tool '{}' not found", call.name);
                ctx.emit(EventKind::Output {
                    message: Message::tool(call, text.clone()),
                })
                .await;
                completed.insert(call.id.clone(), text);
                continue;
            };

            debug!("Invoking tool {} ({})", call.name, call.id);
            let tool_ctx = ctx.for_iteration(iteration).for_tool(&call.name, &call.id);
            let text = match tool.invoke(&tool_ctx, &call.arguments).await {
                Ok(text) => text,
                Err(ToolError::Agent(AgentError::Interrupted(s))) => {
                    match suspended.as_mut() {
                        Some(all) => all.merge(*s),
                        None => suspended = Some(*s),
                    }
                    continue;
                }
                Err(ToolError::Agent(e)) => return Err(e),
                Err(e) => {
                    warn!("Tool {} failed: {}", call.name, e);
                    format!("tool '{}' failed: {}", call.name, e)
                }
            };

            ctx.emit(EventKind::Output {
                message: Message::tool(call, text.clone()),
            })
            .await;
            completed.insert(call.id.clone(), text);
        }

        Ok(suspended)
    }
}

#[async_trait]
impl Agent for ChatModelAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let (mut messages, start, mut completed, mut pending) = match ctx.node_state::<ChatState>()? {
            Some(state) => {
                debug!("{} re-entering at iteration {}", self.config.name, state.iteration);
                let pending = state.messages.last().filter(|m| m.has_tool_calls()).cloned();
                (state.messages, state.iteration, state.completed, pending)
            }
            None => (self.initial_messages(input), 0, BTreeMap::new(), None),
        };
        let tools = self.config.tools.infos();

        for iteration in start..self.config.max_iterations {
            let reply = match pending.take() {
                Some(reply) => reply,
                None => {
                    let mut reply = self.config.model.generate(&messages, &tools).await?;
                    let renamed = reply.ensure_unique_call_ids();
                    if renamed > 0 {
                        warn!("{} rewrote {} missing or repeated tool call id(s)", self.config.name, renamed);
                    }
                    ctx.emit(EventKind::Output {
                        message: reply.clone().named(self.config.name.clone()),
                    })
                    .await;
                    messages.push(reply.clone());
                    reply
                }
            };

            if !reply.has_tool_calls() {
                info!("{} answered after {} iteration(s)", self.config.name, iteration + 1);
                return self.finish(ctx, reply).await;
            }

            if let Some(mut suspension) = self.run_tools(ctx, iteration, &reply, &mut completed).await? {
                let state = ChatState {
                    messages,
                    iteration,
                    completed,
                };
                suspension.record_node(ctx.address(), &state)?;
                return Err(suspension.into());
            }

            for call in &reply.tool_calls {
                let text = completed.remove(&call.id).unwrap_or_default();
                messages.push(Message::tool(call, text));
            }
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use interlude_core::{ResumeFrame, Role, SessionKv, ToolCall};
    use interlude_providers::{last_tool_result, ScriptedModel};
    use interlude_tools::{ApprovalResult, ApprovalWrapper, FunctionTool, Tool};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(frame: ResumeFrame) -> RunContext {
        RunContext::new("chat-test", SessionKv::init(), Arc::new(frame)).for_agent("assistant")
    }

    fn two_call_model() -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new("two-calls", |messages, _| {
            match (last_tool_result(messages, "pay"), last_tool_result(messages, "lookup")) {
                (Some(paid), Some(found)) => Ok(Message::assistant(format!("{} / {}", found, paid))),
                _ => Ok(Message::assistant_with_tools(
                    "",
                    vec![ToolCall::new("c1", "lookup", "{}"), ToolCall::new("c2", "pay", "{}")],
                )),
            }
        }))
    }

    fn agent(model: Arc<ScriptedModel>, lookups: Arc<AtomicUsize>) -> ChatModelAgent {
        let lookup = FunctionTool::new("lookup", "Look up", move |_| {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok("found".to_string())
        });
        let pay: Arc<dyn Tool> = Arc::new(FunctionTool::new("pay", "Pay", |_| Ok("paid".to_string())));
        let tools = ToolRegistry::new()
            .with(Arc::new(lookup))
            .with(Arc::new(ApprovalWrapper::new(pay)));
        ChatModelAgent::new(
            ChatModelAgentConfig::new("assistant", "test agent", model)
                .with_tools(tools)
                .with_output_key("answer"),
        )
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let model = Arc::new(ScriptedModel::constant("m", "hello"));
        let agent = ChatModelAgent::new(ChatModelAgentConfig::new("assistant", "", model.clone()));
        let outcome = agent.run(&ctx(ResumeFrame::fresh()), &AgentInput::from_user("hi")).await.unwrap();

        let message = outcome.message.unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_finished_calls_do_not_rerun_on_resume() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let model = two_call_model();
        let agent = agent(model.clone(), lookups.clone());
        let input = AgentInput::from_user("pay my bill");

        let err = agent.run(&ctx(ResumeFrame::fresh()), &input).await.unwrap_err();
        let suspension = err.suspension().unwrap().clone();
        assert_eq!(suspension.points.len(), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);

        let id = suspension.points[0].id.clone();
        let target = serde_json::to_value(ApprovalResult::approve()).unwrap();
        let frame = ResumeFrame::new(suspension, HashMap::from([(id, target)])).unwrap();
        let resumed_ctx = ctx(frame);
        let outcome = agent.run(&resumed_ctx, &input).await.unwrap();

        assert_eq!(outcome.message.unwrap().content, "found / paid");
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls(), 2);
        assert_eq!(
            resumed_ctx.get_typed_context_params::<String>("answer").as_deref(),
            Some("found / paid")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_folded_into_conversation() {
        let model = Arc::new(ScriptedModel::new("m", |messages, _| {
            match messages.iter().find(|m| m.role == Role::Tool) {
                Some(tool) => Ok(Message::assistant(tool.content.clone())),
                None => Ok(Message::assistant_with_tools("", vec![ToolCall::new("x", "missing", "{}")])),
            }
        }));
        let agent = ChatModelAgent::new(ChatModelAgentConfig::new("assistant", "", model));
        let outcome = agent.run(&ctx(ResumeFrame::fresh()), &AgentInput::from_user("go")).await.unwrap();
        assert_eq!(outcome.message.unwrap().content, "tool 'missing' not found");
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let model = Arc::new(ScriptedModel::new("looping", |_, _| {
            Ok(Message::assistant_with_tools("", vec![ToolCall::new("x", "missing", "{}")]))
        }));
        let agent = ChatModelAgent::new(ChatModelAgentConfig::new("assistant", "", model).with_max_iterations(3));
        let err = agent.run(&ctx(ResumeFrame::fresh()), &AgentInput::from_user("go")).await.unwrap_err();
        assert_eq!(err, AgentError::MaxIterations(3));
    }
}
