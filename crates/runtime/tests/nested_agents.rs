#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Suspension raised three composites deep: Supervisor -> Sequential -> Loop -> tool.

mod common;

use common::*;
use interlude_core::{Agent, AgentAction, EventKind, Message, ToolCall};
use interlude_memory::InMemoryCheckpointStore;
use interlude_providers::{last_tool_result, ScriptedModel};
use interlude_runtime::{
    ChatModelAgent, ChatModelAgentConfig, LoopAgent, ResumeParams, Runner, RunnerConfig, SequentialAgent,
    SupervisorAgent, TRANSFER_TOOL,
};
use interlude_tools::{ApprovalInfo, ApprovalResult, ApprovalWrapper, FunctionTool, Tool, ToolRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Fixture {
    runner: Runner,
    transfers: Arc<AtomicUsize>,
    precheck: Arc<ScriptedModel>,
    controller: Arc<ScriptedModel>,
}

fn fixture() -> Fixture {
    let transfers = Arc::new(AtomicUsize::new(0));
    let counter = transfers.clone();
    let transfer_funds: Arc<dyn Tool> = Arc::new(FunctionTool::new("transfer_funds", "Move money", move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("transferred {} to {}", args["amount"], args["to"].as_str().unwrap_or("?")))
    }));

    let leaf_model = Arc::new(ScriptedModel::new("leaf", |messages, _| {
        match last_tool_result(messages, "transfer_funds") {
            Some(result) => Ok(Message::assistant(format!("Transfer result: {}", result))),
            None => Ok(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_t", "transfer_funds", r#"{"to":"savings","amount":100}"#)],
            )),
        }
    }));
    let leaf: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("TransferAgent", "Moves money", leaf_model)
            .with_tools(ToolRegistry::new().with(Arc::new(ApprovalWrapper::new(transfer_funds)))),
    ));

    let precheck = Arc::new(ScriptedModel::constant("precheck", "precheck ok"));
    let precheck_agent: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(ChatModelAgentConfig::new(
        "PrecheckAgent",
        "Validates the request",
        precheck.clone(),
    )));

    let retry_loop: Arc<dyn Agent> = Arc::new(LoopAgent::new("retry_loop", "", vec![leaf], 1));
    let pipeline: Arc<dyn Agent> = Arc::new(SequentialAgent::new(
        "transaction_pipeline",
        "Handles money transfers",
        vec![precheck_agent, retry_loop],
    ));

    let controller = Arc::new(ScriptedModel::new("controller", |messages, _| {
        match messages
            .iter()
            .rev()
            .find(|m| m.name.as_deref() == Some("transaction_pipeline"))
        {
            Some(answer) => Ok(Message::assistant(format!("All done: {}", answer.content))),
            None => Ok(Message::assistant_with_tools(
                "",
                vec![ToolCall::new(
                    "route_1",
                    TRANSFER_TOOL,
                    r#"{"agent_name":"transaction_pipeline"}"#,
                )],
            )),
        }
    }));
    let supervisor = SupervisorAgent::new("financial_supervisor", "", controller.clone(), vec![pipeline]);

    Fixture {
        runner: Runner::new(RunnerConfig::new(Arc::new(supervisor), Arc::new(InMemoryCheckpointStore::new()))),
        transfers,
        precheck,
        controller,
    }
}

#[tokio::test]
async fn test_deep_suspension_addressable_by_id() {
    let f = fixture();

    let (events, contexts) = expect_suspended(f.runner.query("move 100 to savings", "deep")).await;
    assert_eq!(contexts.len(), 1);
    assert_eq!(
        contexts[0].address,
        "agent:financial_supervisor/iteration:0/agent:transaction_pipeline/agent:retry_loop/\
         iteration:0/agent:TransferAgent/iteration:0/tool:transfer_funds#call_t"
    );
    assert_eq!(contexts[0].agent_name, "TransferAgent");
    assert!(contexts[0].info.is::<ApprovalInfo>());

    let pause = events.last().unwrap();
    assert_eq!(
        pause.run_path,
        vec!["financial_supervisor", "transaction_pipeline", "retry_loop", "TransferAgent"]
    );

    let transfer = events.iter().find_map(|e| match &e.kind {
        EventKind::Action {
            action: AgentAction::TransferToAgent { dest },
        } => Some((e.agent_name.clone(), dest.clone())),
        _ => None,
    });
    assert_eq!(
        transfer,
        Some(("financial_supervisor".to_string(), "transaction_pipeline".to_string()))
    );

    // The caller only knows the ID.
    let params = ResumeParams::new()
        .with_target(&contexts[0].id, &ApprovalResult::approve())
        .unwrap();
    let events = expect_completed(f.runner.resume("deep", params).await.unwrap()).await;

    assert_eq!(f.transfers.load(Ordering::SeqCst), 1);
    assert_eq!(f.precheck.calls(), 1);
    assert_eq!(f.controller.calls(), 2);
    assert_eq!(tool_outputs(&events), vec!["transferred 100 to savings"]);
    assert_eq!(final_answer(&events), "All done: Transfer result: transferred 100 to savings");

    let hand_back = events.iter().any(|e| {
        e.agent_name == "transaction_pipeline"
            && matches!(
                &e.kind,
                EventKind::Action {
                    action: AgentAction::TransferToAgent { dest }
                } if dest == "financial_supervisor"
            )
    });
    assert!(hand_back);
}

#[tokio::test]
async fn test_deep_reask_keeps_id() {
    let f = fixture();
    let (_, first) = expect_suspended(f.runner.query("move 100 to savings", "deep2")).await;
    let (_, second) = expect_suspended(f.runner.resume("deep2", ResumeParams::new()).await.unwrap()).await;
    let (_, third) = expect_suspended(f.runner.resume("deep2", ResumeParams::new()).await.unwrap()).await;

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(f.precheck.calls(), 1);
    assert_eq!(f.controller.calls(), 1);
    assert_eq!(f.transfers.load(Ordering::SeqCst), 0);
}
