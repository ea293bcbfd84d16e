//! Tool that lets a chat model ask the human clarifying questions.

use crate::traits::{Tool, ToolError};
use async_trait::async_trait;
use interlude_core::{AgentError, InterruptPayload, RunContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

const ROUNDS_KEY: &str = "follow_up_rounds";

/// Session key counting rounds asked by the agent invocation that owns `ctx`.
fn rounds_key(ctx: &RunContext) -> String {
    format!("{}:{}", ROUNDS_KEY, ctx.address().owning_agent())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpInfo {
    pub questions: Vec<String>,
}

impl InterruptPayload for FollowUpInfo {
    const TAG: &'static str = "follow_up_info";

    fn describe(&self) -> String {
        let mut out = String::from("We need more information. Please answer the following questions:\n");
        for (i, q) in self.questions.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, q));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpState {
    pub questions: Vec<String>,
}

/// Resume payload: free text, or one answer per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FollowUpAnswer {
    Text(String),
    Answers { answers: Vec<String> },
}

impl FollowUpAnswer {
    fn into_text(self) -> String {
        match self {
            FollowUpAnswer::Text(text) => text,
            FollowUpAnswer::Answers { answers } => answers.join("\n"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FollowUpArgs {
    questions: Vec<String>,
}

/// Suspends with a list of questions; the human's answer becomes the tool
/// result. Rounds are counted in the session so the surrounding agent cannot
/// ask forever.
pub struct FollowUpTool {
    max_rounds: usize,
}

impl FollowUpTool {
    pub fn new() -> Self {
        Self { max_rounds: 5 }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

impl Default for FollowUpTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FollowUpTool {
    fn name(&self) -> &str {
        "FollowUpTool"
    }

    fn description(&self) -> &str {
        "Asks the user for more information by providing a list of questions."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Questions to ask the user"
                }
            },
            "required": ["questions"]
        })
    }

    async fn invoke(&self, ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        let state = ctx.interrupt_state::<FollowUpState>()?;

        if !state.was_interrupted {
            let args: FollowUpArgs = serde_json::from_str(arguments)?;
            if args.questions.is_empty() {
                return Err(ToolError::Validation("no questions given".to_string()));
            }

            let key = rounds_key(ctx);
            let rounds = ctx.get_typed_context_params::<usize>(&key).unwrap_or(0);
            if rounds >= self.max_rounds {
                tracing::warn!("Follow-up limit of {} rounds reached", self.max_rounds);
                return Ok(format!(
                    "the user has already been asked {} rounds of questions; continue with the information available",
                    rounds
                ));
            }
            ctx.append_context_params([(key, rounds + 1)])?;

            let info = FollowUpInfo {
                questions: args.questions.clone(),
            };
            let stored = FollowUpState {
                questions: args.questions,
            };
            return Err(ctx.stateful_interrupt(&info, &stored).into());
        }

        let stored = state
            .state
            .ok_or_else(|| AgentError::Protocol("follow-up resumed without stored questions".to_string()))?;

        let resume = ctx.resume_context::<FollowUpAnswer>()?;
        if !resume.is_resume_target {
            let info = FollowUpInfo {
                questions: stored.questions.clone(),
            };
            return Err(ctx.stateful_interrupt(&info, &stored).into());
        }

        match resume.data.map(FollowUpAnswer::into_text) {
            Some(answer) if !answer.trim().is_empty() => Ok(answer),
            _ => Err(AgentError::Protocol("tool resumed without a user answer".to_string()).into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use interlude_core::{ResumeFrame, SessionKv, Suspension};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx(session: &SessionKv, frame: ResumeFrame) -> RunContext {
        RunContext::new("run-3", session.clone(), Arc::new(frame))
            .for_agent("planner")
            .for_tool("FollowUpTool", "call_q")
    }

    async fn ask(tool: &FollowUpTool, session: &SessionKv) -> Result<Suspension, ToolError> {
        match tool
            .invoke(&ctx(session, ResumeFrame::fresh()), r#"{"questions":["Budget?","Dates?"]}"#)
            .await
        {
            Err(ToolError::Agent(AgentError::Interrupted(s))) => Ok(*s),
            Err(e) => Err(e),
            Ok(text) => Err(ToolError::Execution(text)),
        }
    }

    #[tokio::test]
    async fn test_questions_rendered() {
        let s = ask(&FollowUpTool::new(), &SessionKv::init()).await.unwrap();
        let info = s.points[0].info.decode::<FollowUpInfo>().unwrap();
        assert_eq!(
            info.describe(),
            "We need more information. Please answer the following questions:\n1. Budget?\n2. Dates?\n"
        );
    }

    #[tokio::test]
    async fn test_answer_becomes_result() {
        let session = SessionKv::init();
        let tool = FollowUpTool::new();
        let s = ask(&tool, &session).await.unwrap();
        let id = s.points[0].id.clone();

        let frame = ResumeFrame::new(s, HashMap::from([(id, serde_json::json!({"answers": ["500", "May"]}))])).unwrap();
        let out = tool.invoke(&ctx(&session, frame), "{}").await.unwrap();
        assert_eq!(out, "500\nMay");
    }

    #[tokio::test]
    async fn test_empty_answer_is_protocol_error() {
        let session = SessionKv::init();
        let tool = FollowUpTool::new();
        let s = ask(&tool, &session).await.unwrap();
        let id = s.points[0].id.clone();

        let frame = ResumeFrame::new(s, HashMap::from([(id, serde_json::json!(""))])).unwrap();
        let err = tool.invoke(&ctx(&session, frame), "{}").await.unwrap_err();
        assert!(matches!(err, ToolError::Agent(AgentError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let session = SessionKv::init();
        let tool = FollowUpTool::new().with_max_rounds(1);
        ask(&tool, &session).await.unwrap();

        let err = ask(&tool, &session).await.unwrap_err();
        match err {
            ToolError::Execution(text) => assert!(text.contains("continue with the information available")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_round_budget_is_per_agent_invocation() {
        let session = SessionKv::init();
        let tool = FollowUpTool::new().with_max_rounds(1);
        let args = r#"{"questions":["Budget?"]}"#;
        let root = RunContext::new("run-3", session.clone(), Arc::new(ResumeFrame::fresh())).for_agent("trip_loop");

        let first = root.for_iteration(0).for_agent("planner").for_tool("FollowUpTool", "q1");
        let err = tool.invoke(&first, args).await.unwrap_err();
        assert!(matches!(err, ToolError::Agent(AgentError::Interrupted(_))));

        // Same invocation again: budget spent.
        let text = tool.invoke(&first, args).await.unwrap();
        assert!(text.contains("continue with the information available"));

        // Next loop iteration and a sibling agent each start with a fresh budget.
        for ctx in [
            root.for_iteration(1).for_agent("planner").for_tool("FollowUpTool", "q1"),
            root.for_iteration(0).for_agent("booker").for_tool("FollowUpTool", "q1"),
        ] {
            let err = tool.invoke(&ctx, args).await.unwrap_err();
            assert!(matches!(err, ToolError::Agent(AgentError::Interrupted(_))));
        }
    }
}

