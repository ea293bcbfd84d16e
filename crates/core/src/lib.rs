pub mod address;
pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod payload;
pub mod session;
pub mod types;

pub use address::{Address, Segment, SegmentKind};
pub use agent::{Agent, AgentInput, AgentOutcome};
pub use context::{EventSink, RunContext};
pub use error::AgentError;
pub use event::{AgentAction, AgentEvent, EventKind, InterruptContext, InterruptedAction};
pub use interrupt::{
    InterruptPoint, InterruptState, NodeState, ResumeContext, ResumeFrame, Suspension,
};
pub use payload::{ErasedPayload, InterruptPayload, PayloadEnvelope, PayloadRegistry, TextPrompt};
pub use session::SessionKv;
pub use types::{Message, Role, ToolCall, ToolInfo};
