//! Per-node execution context.

use crate::address::Address;
use crate::error::AgentError;
use crate::event::{AgentEvent, EventKind};
use crate::interrupt::ResumeFrame;
use crate::session::SessionKv;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound event channel of one run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops everything. Used by tests and nested helpers.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub async fn send(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                debug!("Event receiver dropped; discarding event");
            }
        }
    }
}

/// What a node sees while it runs: where it sits in the tree, the run's
/// session, the snapshot being resumed (if any) and the event sink.
///
/// Contexts are cheap to clone; children get their own via
/// [`for_agent`](Self::for_agent), [`for_tool`](Self::for_tool) and
/// [`for_iteration`](Self::for_iteration).
#[derive(Debug, Clone)]
pub struct RunContext {
    checkpoint_id: Arc<str>,
    address: Address,
    agent_name: String,
    session: SessionKv,
    frame: Arc<ResumeFrame>,
    events: EventSink,
}

impl RunContext {
    pub fn new(checkpoint_id: &str, session: SessionKv, frame: Arc<ResumeFrame>) -> Self {
        Self {
            checkpoint_id: Arc::from(checkpoint_id),
            address: Address::root(),
            agent_name: String::new(),
            session,
            frame,
            events: EventSink::discard(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn for_agent(&self, name: &str) -> Self {
        let mut child = self.clone();
        child.address = self.address.agent(name);
        child.agent_name = name.to_string();
        child
    }

    pub fn for_tool(&self, name: &str, call_id: &str) -> Self {
        let mut child = self.clone();
        child.address = self.address.tool(name, call_id);
        child
    }

    pub fn for_iteration(&self, index: usize) -> Self {
        let mut child = self.clone();
        child.address = self.address.iteration(index);
        child
    }

    pub fn checkpoint_id(&self) -> &str {
        &self.checkpoint_id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Name of the innermost enclosing agent.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn session(&self) -> &SessionKv {
        &self.session
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.address.tool_call_id()
    }

    pub(crate) fn frame(&self) -> &ResumeFrame {
        &self.frame
    }

    /// True when this run re-enters a previously suspended tree.
    pub fn is_resuming(&self) -> bool {
        self.frame.is_resuming()
    }

    /// Emit an event attributed to the current agent.
    pub async fn emit(&self, kind: EventKind) {
        let event = AgentEvent {
            agent_name: self.agent_name.clone(),
            run_path: self.address.agent_path(),
            kind,
        };
        self.events.send(event).await;
    }

    /// Merge entries into the run's session.
    pub fn append_context_params<I, K, V>(&self, entries: I) -> Result<(), AgentError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        self.session.append(entries)
    }

    /// Typed session read; `None` when absent or of another shape.
    pub fn get_typed_context_params<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.session.get_typed(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_child_contexts_extend_address() {
        let ctx = RunContext::new("c", SessionKv::init(), Arc::new(ResumeFrame::fresh()));
        let child = ctx.for_agent("outer").for_iteration(1).for_agent("inner").for_tool("t", "id9");

        assert_eq!(child.agent_name(), "inner");
        assert_eq!(child.tool_call_id(), Some("id9"));
        assert_eq!(child.address().agent_path(), vec!["outer", "inner"]);
        assert!(!child.is_resuming());
    }

    #[test]
    fn test_children_share_session() {
        let ctx = RunContext::new("c", SessionKv::init(), Arc::new(ResumeFrame::fresh()));
        let child = ctx.for_agent("a");
        child.append_context_params([("k", 1)]).unwrap();
        assert_eq!(ctx.get_typed_context_params::<i32>("k"), Some(1));
    }

    #[tokio::test]
    async fn test_emit_attributes_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = RunContext::new("c", SessionKv::init(), Arc::new(ResumeFrame::fresh()))
            .with_events(EventSink::new(tx))
            .for_agent("root")
            .for_agent("leaf");

        ctx.emit(EventKind::Output {
            message: Message::assistant("hi"),
        })
        .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.agent_name, "leaf");
        assert_eq!(event.run_path, vec!["root", "leaf"]);
    }

    #[tokio::test]
    async fn test_emit_without_receiver_is_silent() {
        let ctx = RunContext::new("c", SessionKv::init(), Arc::new(ResumeFrame::fresh()));
        ctx.emit(EventKind::Output {
            message: Message::assistant("dropped"),
        })
        .await;
    }
}
