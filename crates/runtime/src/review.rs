//! Human reviewer step for writer/reviewer loops.

use async_trait::async_trait;
use interlude_core::{Agent, AgentError, AgentInput, AgentOutcome, EventKind, InterruptPayload, Message, RunContext};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackInfo {
    pub original_content: String,
}

impl InterruptPayload for FeedbackInfo {
    const TAG: &'static str = "feedback_info";

    fn describe(&self) -> String {
        format!(
            "Original content to review: \n`\n{}\n`. \n\nIf you think the content is good as it is, \
             please reply with \"No need to edit\". \nOtherwise, please provide your feedback.",
            self.original_content
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FeedbackDecision {
    NoNeedToEdit,
    Feedback { text: String },
}

/// Shows the content stored under `input_key` to a human. Approval exits the
/// enclosing loop; feedback becomes this agent's answer so the writer sees it
/// on the next iteration.
pub struct HumanReviewAgent {
    name: String,
    description: String,
    input_key: String,
}

impl HumanReviewAgent {
    pub fn new(name: &str, description: &str, input_key: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_key: input_key.to_string(),
        }
    }
}

#[async_trait]
impl Agent for HumanReviewAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &RunContext, _input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let state = ctx.interrupt_state::<String>()?;

        if !state.was_interrupted {
            let content = ctx
                .get_typed_context_params::<String>(&self.input_key)
                .ok_or_else(|| AgentError::Protocol(format!("{} not found in session", self.input_key)))?;
            let info = FeedbackInfo {
                original_content: content.clone(),
            };
            return Err(ctx.stateful_interrupt(&info, &content));
        }

        let content = state.state.unwrap_or_default();
        let resume = ctx.resume_context::<FeedbackDecision>()?;
        if !resume.is_resume_target {
            return Err(ctx.stateful_interrupt(
                &FeedbackInfo {
                    original_content: content.clone(),
                },
                &content,
            ));
        }

        match resume.data {
            None => Err(AgentError::Protocol(format!("{} received no review decision", self.name))),
            Some(FeedbackDecision::NoNeedToEdit) => {
                info!("{} accepted the content", self.name);
                Ok(AgentOutcome::exit())
            }
            Some(FeedbackDecision::Feedback { text }) => {
                let message = Message::assistant(text).named(self.name.clone());
                ctx.emit(EventKind::Output {
                    message: message.clone(),
                })
                .await;
                Ok(AgentOutcome::message(message))
            }
        }
    }
}
