#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Shared fixtures for runtime integration tests.

use interlude_core::{Agent, AgentEvent, InterruptContext, Message, Role, ToolCall};
use interlude_providers::{last_tool_result, ScriptedModel};
use interlude_runtime::{ChatModelAgent, ChatModelAgentConfig, EventIterator, RunState};
use interlude_tools::{FunctionTool, Tool, ToolRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BOOKING_ARGS: &str =
    r#"{"location":"Beijing","passenger_name":"Martin","passenger_phone_number":"1234567"}"#;

/// Ticket booking tool that counts executions.
pub fn book_tool(calls: Arc<AtomicUsize>) -> Arc<dyn Tool> {
    Arc::new(FunctionTool::new("book_ticket", "Book a ticket", move |args| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "success! ticket booked to {} for {}",
            args["location"].as_str().unwrap_or("?"),
            args["passenger_name"].as_str().unwrap_or("?")
        ))
    }))
}

/// Calls `book_ticket` once, then reports its result.
pub fn booking_model() -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::new("booking-model", |messages, _| {
        match last_tool_result(messages, "book_ticket") {
            Some(result) => Ok(Message::assistant(format!("Booking result: {}", result))),
            None => Ok(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_1", "book_ticket", BOOKING_ARGS)],
            )),
        }
    }))
}

pub fn booking_agent(tool: Arc<dyn Tool>) -> Arc<dyn Agent> {
    Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("TicketBooker", "An agent that can book tickets", booking_model())
            .with_instruction("You are an expert ticket booker.")
            .with_tools(ToolRegistry::new().with(tool)),
    ))
}

pub async fn expect_suspended(iter: EventIterator) -> (Vec<AgentEvent>, Vec<InterruptContext>) {
    match iter.collect().await {
        (events, RunState::Suspended(contexts)) => (events, contexts),
        (events, other) => panic!("expected suspension, got {other:?} after {events:?}"),
    }
}

pub async fn expect_completed(iter: EventIterator) -> Vec<AgentEvent> {
    match iter.collect().await {
        (events, RunState::Completed) => events,
        (events, other) => panic!("expected completion, got {other:?} after {events:?}"),
    }
}

/// Contents of tool responses among the output events.
pub fn tool_outputs(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e.message())
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.clone())
        .collect()
}

/// Content of the last output message.
pub fn final_answer(events: &[AgentEvent]) -> String {
    events
        .iter()
        .rev()
        .find_map(|e| e.message())
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
