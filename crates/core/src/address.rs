//! Node addresses inside an agent tree.
//!
//! An address is the path from the root agent to a node. It is the key under
//! which suspension points and composite state are stored in a checkpoint, so
//! a node re-entered on resume finds exactly what it left behind.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Agent,
    Tool,
    Iteration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub name: String,
    /// Tool call ID for tool segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Vec<Segment>);

impl Address {
    pub fn root() -> Self {
        Self::default()
    }

    fn push(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn agent(&self, name: &str) -> Self {
        self.push(Segment {
            kind: SegmentKind::Agent,
            name: name.to_string(),
            call_id: None,
        })
    }

    pub fn tool(&self, name: &str, call_id: &str) -> Self {
        self.push(Segment {
            kind: SegmentKind::Tool,
            name: name.to_string(),
            call_id: Some(call_id.to_string()),
        })
    }

    pub fn iteration(&self, index: usize) -> Self {
        self.push(Segment {
            kind: SegmentKind::Iteration,
            name: index.to_string(),
            call_id: None,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Agent names from the root to this node, used as an event run path.
    pub fn agent_path(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|s| s.kind == SegmentKind::Agent)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Prefix ending at the innermost agent segment: the agent invocation
    /// this node runs in. Root if there is no agent segment.
    pub fn owning_agent(&self) -> Self {
        match self.0.iter().rposition(|s| s.kind == SegmentKind::Agent) {
            Some(index) => Self(self.0[..=index].to_vec()),
            None => Self::root(),
        }
    }

    /// Call ID of the innermost tool segment, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|s| s.kind == SegmentKind::Tool)
            .and_then(|s| s.call_id.as_deref())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.call_id) {
            (SegmentKind::Agent, _) => write!(f, "agent:{}", self.name),
            (SegmentKind::Tool, Some(call_id)) => write!(f, "tool:{}#{}", self.name, call_id),
            (SegmentKind::Tool, None) => write!(f, "tool:{}", self.name),
            (SegmentKind::Iteration, _) => write!(f, "iteration:{}", self.name),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
