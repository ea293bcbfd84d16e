//! Sequential and loop composition of sub-agents.
//!
//! Both composites pass a descendant's suspension upward untouched apart
//! from recording their own position, so a resume continues at the child
//! that paused instead of starting over.

use async_trait::async_trait;
use interlude_core::{Agent, AgentAction, AgentError, AgentInput, AgentOutcome, EventKind, Message, RunContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Input for the next child: the original input followed by what earlier
/// children produced.
fn child_input(input: &AgentInput, history: &[Message]) -> AgentInput {
    let mut messages = input.messages.clone();
    messages.extend(history.iter().cloned());
    AgentInput::new(messages)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequentialState {
    index: usize,
    history: Vec<Message>,
}

/// Runs sub-agents in order, feeding each the outputs of the previous ones.
pub struct SequentialAgent {
    name: String,
    description: String,
    children: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    pub fn new(name: &str, description: &str, children: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            children,
        }
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let mut state = ctx.node_state::<SequentialState>()?.unwrap_or_default();
        let mut last = None;

        while let Some(child) = self.children.get(state.index) {
            debug!("{} running step {} ({})", self.name, state.index, child.name());
            let child_ctx = ctx.for_agent(child.name());

            let outcome = match child.run(&child_ctx, &child_input(input, &state.history)).await {
                Ok(outcome) => outcome,
                Err(AgentError::Interrupted(mut suspension)) => {
                    suspension.record_node(ctx.address(), &state)?;
                    return Err(AgentError::Interrupted(suspension));
                }
                Err(e) => return Err(e),
            };

            if let Some(message) = &outcome.message {
                state.history.push(message.clone());
            }
            if outcome.exit {
                return Ok(outcome);
            }
            last = outcome.message;
            state.index += 1;
        }

        Ok(AgentOutcome {
            message: last,
            exit: false,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LoopState {
    iteration: usize,
    index: usize,
    history: Vec<Message>,
}

/// Repeats its sub-agents until one of them exits or the iteration bound is
/// reached. Reaching the bound ends the loop normally.
pub struct LoopAgent {
    name: String,
    description: String,
    children: Vec<Arc<dyn Agent>>,
    max_iterations: usize,
}

impl LoopAgent {
    pub fn new(name: &str, description: &str, children: Vec<Arc<dyn Agent>>, max_iterations: usize) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            children,
            max_iterations,
        }
    }
}

#[async_trait]
impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let mut state = ctx.node_state::<LoopState>()?.unwrap_or_default();
        let mut last = state.history.last().cloned();

        while state.iteration < self.max_iterations {
            while let Some(child) = self.children.get(state.index) {
                let child_ctx = ctx.for_iteration(state.iteration).for_agent(child.name());

                let outcome = match child.run(&child_ctx, &child_input(input, &state.history)).await {
                    Ok(outcome) => outcome,
                    Err(AgentError::Interrupted(mut suspension)) => {
                        suspension.record_node(ctx.address(), &state)?;
                        return Err(AgentError::Interrupted(suspension));
                    }
                    Err(e) => return Err(e),
                };

                if outcome.exit {
                    info!("{} exited by {} in iteration {}", self.name, child.name(), state.iteration);
                    child_ctx
                        .emit(EventKind::Action {
                            action: AgentAction::Exit,
                        })
                        .await;
                    return Ok(AgentOutcome {
                        message: last,
                        exit: false,
                    });
                }

                if let Some(message) = outcome.message {
                    state.history.push(message.clone());
                    last = Some(message);
                }
                state.index += 1;
            }

            state.index = 0;
            state.iteration += 1;
        }

        info!("{} stopped after {} iteration(s)", self.name, self.max_iterations);
        Ok(AgentOutcome {
            message: last,
            exit: false,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use interlude_core::{ResumeFrame, SessionKv, TextPrompt};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts runs and answers with a fixed text.
    struct Step {
        name: String,
        runs: AtomicUsize,
    }

    impl Step {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for Step {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            ""
        }

        async fn run(&self, _ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(AgentOutcome::message(Message::assistant(format!(
                "{} saw {}",
                self.name,
                input.messages.len()
            ))))
        }
    }

    /// Asks once, then exits when told "stop".
    struct Gate;

    #[async_trait]
    impl Agent for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        fn description(&self) -> &str {
            ""
        }

        async fn run(&self, ctx: &RunContext, _input: &AgentInput) -> Result<AgentOutcome, AgentError> {
            if !ctx.interrupt_state::<()>()?.was_interrupted {
                return Err(ctx.interrupt(&TextPrompt("continue?".into())));
            }
            let resume = ctx.resume_context::<String>()?;
            if !resume.is_resume_target {
                return Err(ctx.interrupt(&TextPrompt("continue?".into())));
            }
            match resume.data.as_deref() {
                Some("stop") => Ok(AgentOutcome::exit()),
                _ => Ok(AgentOutcome::message(Message::assistant("again"))),
            }
        }
    }

    fn root_ctx(frame: ResumeFrame) -> RunContext {
        RunContext::new("wf", SessionKv::init(), Arc::new(frame)).for_agent("root")
    }

    #[tokio::test]
    async fn test_sequential_feeds_history() {
        let a = Step::new("a");
        let b = Step::new("b");
        let seq = SequentialAgent::new("root", "", vec![a.clone(), b.clone()]);

        let outcome = seq.run(&root_ctx(ResumeFrame::fresh()), &AgentInput::from_user("go")).await.unwrap();
        assert_eq!(outcome.message.unwrap().content, "b saw 2");
    }

    #[tokio::test]
    async fn test_sequential_resumes_at_paused_step() {
        let a = Step::new("a");
        let b = Step::new("b");
        let seq = SequentialAgent::new("root", "", vec![a.clone(), Arc::new(Gate), b.clone()]);
        let input = AgentInput::from_user("go");

        let err = seq.run(&root_ctx(ResumeFrame::fresh()), &input).await.unwrap_err();
        let suspension = err.suspension().unwrap().clone();
        assert_eq!(suspension.points[0].address.to_string(), "agent:root/agent:gate");

        let id = suspension.points[0].id.clone();
        let frame = ResumeFrame::new(suspension, HashMap::from([(id, json!("go on"))])).unwrap();
        let outcome = seq.run(&root_ctx(frame), &input).await.unwrap();

        assert_eq!(a.runs.load(Ordering::SeqCst), 1);
        assert_eq!(b.runs.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.message.unwrap().content, "b saw 3");
    }

    #[tokio::test]
    async fn test_loop_resumes_in_same_iteration_and_exits() {
        let writer = Step::new("writer");
        let lp = LoopAgent::new("root", "", vec![writer.clone(), Arc::new(Gate)], 5);
        let input = AgentInput::from_user("draft");

        let err = lp.run(&root_ctx(ResumeFrame::fresh()), &input).await.unwrap_err();
        let suspension = err.suspension().unwrap().clone();
        assert_eq!(
            suspension.points[0].address.to_string(),
            "agent:root/iteration:0/agent:gate"
        );

        let id = suspension.points[0].id.clone();
        let frame = ResumeFrame::new(suspension, HashMap::from([(id, json!("again"))])).unwrap();
        let err = lp.run(&root_ctx(frame), &input).await.unwrap_err();
        let suspension = err.suspension().unwrap().clone();
        assert_eq!(
            suspension.points[0].address.to_string(),
            "agent:root/iteration:1/agent:gate"
        );
        assert_eq!(writer.runs.load(Ordering::SeqCst), 2);

        let id = suspension.points[0].id.clone();
        let frame = ResumeFrame::new(suspension, HashMap::from([(id, json!("stop"))])).unwrap();
        let outcome = lp.run(&root_ctx(frame), &input).await.unwrap();
        assert!(!outcome.exit);
        assert_eq!(outcome.message.unwrap().content, "writer saw 3");
        assert_eq!(writer.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loop_bound_ends_normally() {
        let step = Step::new("step");
        let lp = LoopAgent::new("root", "", vec![step.clone()], 3);
        let outcome = lp.run(&root_ctx(ResumeFrame::fresh()), &AgentInput::from_user("x")).await.unwrap();
        assert_eq!(step.runs.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.message.unwrap().content, "step saw 3");
    }
}
