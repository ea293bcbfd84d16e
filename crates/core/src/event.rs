//! Events streamed to the caller while a run executes.

use crate::error::AgentError;
use crate::interrupt::InterruptPoint;
use crate::payload::PayloadEnvelope;
use crate::types::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    pub agent_name: String,
    /// Agent names from the root to the emitter.
    pub run_path: Vec<String>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Output { message: Message },
    Action { action: AgentAction },
    Error { error: AgentError },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    TransferToAgent { dest: String },
    Interrupted(InterruptedAction),
    Exit,
}

/// Terminal action of a suspended run: every pending point, flat.
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptedAction {
    pub contexts: Vec<InterruptContext>,
}

/// Caller-facing description of one pending interrupt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptContext {
    /// Stable ID; pass it back as a resume target.
    pub id: String,
    /// Human-readable node address.
    pub address: String,
    pub agent_name: String,
    pub info: PayloadEnvelope,
}

impl From<&InterruptPoint> for InterruptContext {
    fn from(point: &InterruptPoint) -> Self {
        Self {
            id: point.id.clone(),
            address: point.address.to_string(),
            agent_name: point.agent_name.clone(),
            info: point.info.clone(),
        }
    }
}

impl AgentEvent {
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            EventKind::Output { message } => Some(message),
            _ => None,
        }
    }

    pub fn interrupts(&self) -> Option<&[InterruptContext]> {
        match &self.kind {
            EventKind::Action {
                action: AgentAction::Interrupted(action),
            } => Some(&action.contexts),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AgentError> {
        match &self.kind {
            EventKind::Error { error } => Some(error),
            _ => None,
        }
    }
}
