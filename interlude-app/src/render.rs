//! Terminal rendering of run events.

use interlude_core::{AgentAction, AgentEvent, EventKind, Role};
use std::fmt::Write;

pub fn event(event: &AgentEvent) -> String {
    let mut out = format!("name: {}\npath: [{}]", event.agent_name, event.run_path.join(" -> "));

    match &event.kind {
        EventKind::Output { message } => {
            if !message.content.is_empty() {
                let label = if message.role == Role::Tool {
                    "tool response"
                } else {
                    "answer"
                };
                let _ = write!(out, "\n{}: {}", label, message.content);
            }
            for call in &message.tool_calls {
                let _ = write!(out, "\ntool name: {}\narguments: {}", call.name, call.arguments);
            }
        }
        EventKind::Action { action } => match action {
            AgentAction::TransferToAgent { dest } => {
                let _ = write!(out, "\naction: transfer to {}", dest);
            }
            AgentAction::Interrupted(interrupted) => {
                for context in &interrupted.contexts {
                    let _ = write!(out, "\n{}", context.info.describe());
                }
            }
            AgentAction::Exit => out.push_str("\naction: exit"),
        },
        EventKind::Error { error } => {
            let _ = write!(out, "\nerror: {}", error);
        }
    }

    out.push('\n');
    out
}
