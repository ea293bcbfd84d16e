//! Deterministic, rule-driven model for demos and tests.
//!
//! The reply is a pure function of the conversation so far, which keeps runs
//! reproducible across process restarts: a resumed run that reaches the same
//! conversation gets the same answer.

use crate::traits::*;
use async_trait::async_trait;
use interlude_core::{Message, Role, ToolInfo};
use std::sync::atomic::{AtomicUsize, Ordering};

type Rule = dyn Fn(&[Message], &[ToolInfo]) -> Result<Message, ModelError> + Send + Sync;

pub struct ScriptedModel {
    name: String,
    rule: Box<Rule>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<F>(name: &str, rule: F) -> Self
    where
        F: Fn(&[Message], &[ToolInfo]) -> Result<Message, ModelError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            rule: Box::new(rule),
            calls: AtomicUsize::new(0),
        }
    }

    /// Model that always answers with the same text.
    pub fn constant(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(Message::assistant(text.clone())))
    }

    /// Number of `generate` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Content of the most recent tool message answering a call to `tool`.
pub fn last_tool_result<'a>(messages: &'a [Message], tool: &str) -> Option<&'a str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool && m.name.as_deref() == Some(tool))
        .map(|m| m.content.as_str())
}

/// Content of the most recent user message.
pub fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, messages: &[Message], tools: &[ToolInfo]) -> Result<Message, ModelError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("{} serving call #{} over {} message(s)", self.name, n + 1, messages.len());
        (self.rule)(messages, tools)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
