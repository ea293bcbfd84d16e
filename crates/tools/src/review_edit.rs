//! Human review of tool arguments before execution, with the option to edit.

use crate::approval::{disapproved, invoke_wrapped, missing_arguments, Decided};
use crate::traits::{Tool, ToolError};
use async_trait::async_trait;
use interlude_core::{AgentError, InterruptPayload, RunContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEditInfo {
    pub tool_name: String,
    pub arguments_in_json: String,
    pub tool_call_id: String,
}

impl InterruptPayload for ReviewEditInfo {
    const TAG: &'static str = "review_edit_info";

    fn describe(&self) -> String {
        format!(
            "Tool '{}' is about to be called with the following arguments:\n`\n{}\n`\n\n\
             Please review and either provide edited arguments in JSON format, \
             reply with 'no need to edit', or reply with 'N' to disapprove the tool call.",
            self.tool_name, self.arguments_in_json
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewEditResult {
    NoNeedToEdit,
    Disapproved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    EditedArguments {
        arguments_in_json: String,
    },
}

/// Suspends so a human can run, reject or rewrite the call's arguments.
pub struct ReviewEditWrapper {
    inner: Arc<dyn Tool>,
}

impl ReviewEditWrapper {
    pub fn new(inner: Arc<dyn Tool>) -> Self {
        Self { inner }
    }

    fn info(&self, ctx: &RunContext, arguments: &str) -> ReviewEditInfo {
        ReviewEditInfo {
            tool_name: self.inner.name().to_string(),
            arguments_in_json: arguments.to_string(),
            tool_call_id: ctx.tool_call_id().unwrap_or_default().to_string(),
        }
    }

    async fn run(&self, ctx: &RunContext, decided: Decided) -> Result<String, ToolError> {
        let result = invoke_wrapped(self.inner.as_ref(), ctx, &decided).await?;
        if !decided.edited {
            return Ok(result);
        }
        Ok(format!(
            "after presenting the tool call info to the user, the user explicitly changed tool call arguments to {}. Tool called, final result: {}",
            decided.arguments, result
        ))
    }
}

#[async_trait]
impl Tool for ReviewEditWrapper {
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
            return self.run(ctx, decided).await;
        }

        let state = ctx.interrupt_state::<String>()?;
        if !state.was_interrupted {
            tracing::info!("Tool '{}' awaiting review", self.name());
            return Err(ctx.stateful_interrupt(&self.info(ctx, arguments), &arguments).into());
        }
        let stored = state.state.ok_or_else(|| missing_arguments(self.name()))?;

        let resume = ctx.resume_context::<ReviewEditResult>()?;
        if !resume.is_resume_target {
            return Err(ctx.stateful_interrupt(&self.info(ctx, &stored), &stored).into());
        }
        let Some(result) = resume.data else {
            return Err(AgentError::Protocol(format!(
                "tool '{}' resumed with no review data",
                self.name()
            ))
            .into());
        };

        match result {
            ReviewEditResult::Disapproved { reason } => Ok(disapproved(self.name(), reason.as_deref())),
            ReviewEditResult::NoNeedToEdit => {
                self.run(
                    ctx,
                    Decided {
                        arguments: stored,
                        edited: false,
                    },
                )
                .await
            }
            ReviewEditResult::EditedArguments { arguments_in_json } => {
                serde_json::from_str::<serde_json::Value>(&arguments_in_json).map_err(|e| {
                    ToolError::Validation(format!(
                        "edited arguments for tool '{}' are not valid JSON: {}",
                        self.name(),
                        e
                    ))
                })?;
                self.run(
                    ctx,
                    Decided {
                        arguments: arguments_in_json,
                        edited: true,
                    },
                )
                .await
            }
        }
    }
}
