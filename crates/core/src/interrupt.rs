//! Interrupt controller: suspend a branch, remember continuation state, and
//! tell a re-entered call site whether it is fresh, resumed, or the target of
//! the current resume.
//!
//! Every call site follows the same protocol before doing side effects:
//!
//! 1. [`RunContext::interrupt_state`]: not interrupted means a fresh call.
//! 2. [`RunContext::resume_context`]: not the target means re-suspend with
//!    the stored state; target without data is a protocol error.
//! 3. Otherwise consume the resume data and continue.

use crate::address::Address;
use crate::context::RunContext;
use crate::error::AgentError;
use crate::event::InterruptContext;
use crate::payload::{InterruptPayload, PayloadEnvelope};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// One leaf suspension: where it happened, what it asks, and the opaque
/// state the call site wants back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPoint {
    pub id: String,
    pub address: Address,
    pub agent_name: String,
    pub info: PayloadEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

/// Continuation state a composite node recorded while a descendant suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub address: Address,
    pub state: serde_json::Value,
}

/// Everything needed to re-enter a suspended tree: the leaf points plus the
/// positions of every composite above them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub points: Vec<InterruptPoint>,
    #[serde(default)]
    pub nodes: Vec<NodeState>,
}

impl Suspension {
    pub fn single(point: InterruptPoint) -> Self {
        Self {
            points: vec![point],
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Absorb a sibling suspension raised in the same turn.
    pub fn merge(&mut self, other: Suspension) {
        self.points.extend(other.points);
        self.nodes.extend(other.nodes);
    }

    /// Record (or replace) the state of the composite at `address`.
    pub fn record_node<S: Serialize>(&mut self, address: &Address, state: &S) -> Result<(), AgentError> {
        let state = serde_json::to_value(state)?;
        self.nodes.retain(|n| &n.address != address);
        self.nodes.push(NodeState {
            address: address.clone(),
            state,
        });
        Ok(())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.id.as_str()).collect()
    }

    /// Caller-facing view; continuation state is not exposed.
    pub fn contexts(&self) -> Vec<InterruptContext> {
        self.points.iter().map(InterruptContext::from).collect()
    }
}

/// Snapshot being resumed plus the caller's resume targets.
#[derive(Debug, Default)]
pub struct ResumeFrame {
    points: HashMap<Address, InterruptPoint>,
    nodes: HashMap<Address, serde_json::Value>,
    targets: HashMap<String, serde_json::Value>,
}

impl ResumeFrame {
    /// Frame for a brand-new run: nothing was interrupted.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Build a frame from a persisted suspension. Every target ID must name a
    /// pending point, and no two points may share an ID or an address.
    pub fn new(
        suspension: Suspension,
        targets: HashMap<String, serde_json::Value>,
    ) -> Result<Self, AgentError> {
        let mut ids = HashSet::new();
        let mut addresses = HashSet::new();
        for point in &suspension.points {
            if !ids.insert(point.id.as_str()) {
                return Err(AgentError::Protocol(format!("interrupt id {} is pending twice", point.id)));
            }
            if !addresses.insert(&point.address) {
                return Err(AgentError::Protocol(format!(
                    "two pending interrupts share the address {}",
                    point.address
                )));
            }
        }

        for id in targets.keys() {
            if !suspension.points.iter().any(|p| &p.id == id) {
                return Err(AgentError::Protocol(format!(
                    "resume target '{}' is not a pending interrupt",
                    id
                )));
            }
        }

        Ok(Self {
            points: suspension
                .points
                .into_iter()
                .map(|p| (p.address.clone(), p))
                .collect(),
            nodes: suspension
                .nodes
                .into_iter()
                .map(|n| (n.address, n.state))
                .collect(),
            targets,
        })
    }

    pub fn is_resuming(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn point_at(&self, address: &Address) -> Option<&InterruptPoint> {
        self.points.get(address)
    }

    pub fn node_state_at(&self, address: &Address) -> Option<&serde_json::Value> {
        self.nodes.get(address)
    }

    pub fn target(&self, id: &str) -> Option<&serde_json::Value> {
        self.targets.get(id)
    }

    pub fn is_target(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }
}

/// Result of [`RunContext::interrupt_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptState<T> {
    pub was_interrupted: bool,
    pub state: Option<T>,
}

impl<T> InterruptState<T> {
    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }
}

/// Result of [`RunContext::resume_context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeContext<T> {
    pub is_resume_target: bool,
    pub data: Option<T>,
}

impl<T> ResumeContext<T> {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

fn derive_id(seed: &str, address: &Address) -> String {
    let name = format!("{}|{}", seed, address);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl RunContext {
    /// Whether this call site was suspended in the run being resumed, and the
    /// state it stored at the time.
    pub fn interrupt_state<T: DeserializeOwned>(&self) -> Result<InterruptState<T>, AgentError> {
        let Some(point) = self.frame().point_at(self.address()) else {
            return Ok(InterruptState {
                was_interrupted: false,
                state: None,
            });
        };

        let state = match &point.state {
            Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
                AgentError::Serialization(format!(
                    "stored state for interrupt {} does not decode: {}",
                    point.id, e
                ))
            })?),
            None => None,
        };

        Ok(InterruptState {
            was_interrupted: true,
            state,
        })
    }

    /// Whether the current resume addresses this call site, and its data.
    ///
    /// Data that does not decode as `T` is a protocol error: the caller sent
    /// the wrong shape and must issue a corrected resume.
    pub fn resume_context<T: DeserializeOwned>(&self) -> Result<ResumeContext<T>, AgentError> {
        let frame = self.frame();
        let Some(point) = frame.point_at(self.address()) else {
            return Ok(ResumeContext {
                is_resume_target: false,
                data: None,
            });
        };
        let Some(value) = frame.target(&point.id) else {
            return Ok(ResumeContext {
                is_resume_target: false,
                data: None,
            });
        };

        if value.is_null() {
            return Ok(ResumeContext {
                is_resume_target: true,
                data: None,
            });
        }

        let data = serde_json::from_value(value.clone()).map_err(|e| {
            AgentError::Protocol(format!("invalid resume data for interrupt {}: {}", point.id, e))
        })?;

        Ok(ResumeContext {
            is_resume_target: true,
            data: Some(data),
        })
    }

    /// Stateless, single-shot suspension.
    pub fn interrupt<P: InterruptPayload>(&self, info: &P) -> AgentError {
        self.suspend(info, None)
    }

    /// Suspension that keeps `state` for this exact call site. The state is
    /// handed back verbatim by [`RunContext::interrupt_state`] on re-entry.
    pub fn stateful_interrupt<P: InterruptPayload, S: Serialize>(&self, info: &P, state: &S) -> AgentError {
        match serde_json::to_value(state) {
            Ok(state) => self.suspend(info, Some(state)),
            Err(e) => e.into(),
        }
    }

    fn suspend<P: InterruptPayload>(&self, info: &P, state: Option<serde_json::Value>) -> AgentError {
        let envelope = match PayloadEnvelope::wrap(info) {
            Ok(envelope) => envelope,
            Err(e) => return e,
        };

        // Re-asking an unresolved point keeps its ID; a point that was just
        // resolved and suspends again is a new pause and gets a new one.
        let frame = self.frame();
        let id = match frame.point_at(self.address()) {
            Some(prev) if !frame.is_target(&prev.id) => prev.id.clone(),
            Some(prev) => derive_id(&prev.id, self.address()),
            None => derive_id(self.checkpoint_id(), self.address()),
        };

        debug!("Suspending at {} with interrupt {}", self.address(), id);

        Suspension::single(InterruptPoint {
            id,
            address: self.address().clone(),
            agent_name: self.agent_name().to_string(),
            info: envelope,
            state,
        })
        .into()
    }

    /// Composite-node state recorded when a descendant last suspended.
    pub fn node_state<T: DeserializeOwned>(&self) -> Result<Option<T>, AgentError> {
        match self.frame().node_state_at(self.address()) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}
