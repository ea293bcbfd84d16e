//! Approval gate in front of a side-effecting tool.

use crate::traits::{Tool, ToolError};
use async_trait::async_trait;
use interlude_core::{AgentError, InterruptPayload, RunContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalInfo {
    pub tool_name: String,
    pub arguments_in_json: String,
    pub tool_call_id: String,
}

impl InterruptPayload for ApprovalInfo {
    const TAG: &'static str = "approval_info";

    fn describe(&self) -> String {
        format!(
            "tool '{}' interrupted with arguments '{}', waiting for your approval, please answer with Y/N",
            self.tool_name, self.arguments_in_json
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub approved: bool,
    #[serde(default, alias = "disapprove_reason", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalResult {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn reject(reason: Option<String>) -> Self {
        Self {
            approved: false,
            reason,
        }
    }
}

pub(crate) fn disapproved(tool_name: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("tool '{}' disapproved, reason: {}", tool_name, reason),
        None => format!("tool '{}' disapproved", tool_name),
    }
}

/// Decision recorded on the wrapper while the wrapped tool itself is
/// suspended, so re-entry goes straight back into the wrapped tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Decided {
    pub arguments: String,
    #[serde(default)]
    pub edited: bool,
}

/// Protocol error for a wrapper point that came back without the arguments
/// captured at its first call.
pub(crate) fn missing_arguments(tool: &str) -> AgentError {
    AgentError::Protocol(format!("tool '{}' resumed without its stored arguments", tool))
}

/// Run the wrapped tool one level below the wrapper's own address.
pub(crate) async fn invoke_wrapped(
    inner: &dyn Tool,
    ctx: &RunContext,
    decided: &Decided,
) -> Result<String, ToolError> {
    let call_id = ctx.tool_call_id().unwrap_or_default().to_string();
    let inner_ctx = ctx.for_tool(inner.name(), &call_id);

    match inner.invoke(&inner_ctx, &decided.arguments).await {
        Err(ToolError::Agent(AgentError::Interrupted(mut suspension))) => {
            suspension.record_node(ctx.address(), decided)?;
            Err(AgentError::Interrupted(suspension).into())
        }
        other => other,
    }
}

/// Suspends before every call of the wrapped tool until a human approves.
///
/// The arguments are captured at the first call and stored with the
/// suspension; on approval the tool runs with exactly those arguments.
/// Disapproval yields a normal text result so the calling model can react.
pub struct ApprovalWrapper {
    inner: Arc<dyn Tool>,
}

impl ApprovalWrapper {
    pub fn new(inner: Arc<dyn Tool>) -> Self {
        Self { inner }
    }

    fn info(&self, ctx: &RunContext, arguments: &str) -> ApprovalInfo {
        ApprovalInfo {
            tool_name: self.inner.name().to_string(),
            arguments_in_json: arguments.to_string(),
            tool_call_id: ctx.tool_call_id().unwrap_or_default().to_string(),
        }
    }
}

#[async_trait]
impl Tool for ApprovalWrapper {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn schema(&self) -> serde_json::Value {
        self.inner.schema()
    }

    async fn invoke(&self, ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        if let Some(decided) = ctx.node_state::<Decided>()? {
            return invoke_wrapped(self.inner.as_ref(), ctx, &decided).await;
        }

        let state = ctx.interrupt_state::<String>()?;
        if !state.was_interrupted {
            tracing::info!("Tool '{}' awaiting approval", self.name());
            return Err(ctx.stateful_interrupt(&self.info(ctx, arguments), &arguments).into());
        }
        let stored = state.state.ok_or_else(|| missing_arguments(self.name()))?;

        let resume = ctx.resume_context::<ApprovalResult>()?;
        if !resume.is_resume_target {
            return Err(ctx.stateful_interrupt(&self.info(ctx, &stored), &stored).into());
        }
        let Some(result) = resume.data else {
            return Err(AgentError::Protocol(format!("tool '{}' resumed with no data", self.name())).into());
        };

        if !result.approved {
            tracing::info!("Tool '{}' disapproved", self.name());
            return Ok(disapproved(self.name(), result.reason.as_deref()));
        }

        let decided = Decided {
            arguments: stored,
            edited: false,
        };
        invoke_wrapped(self.inner.as_ref(), ctx, &decided).await
    }
}
