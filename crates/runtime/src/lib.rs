//! Agent execution runtime: chat-model agents, composite agents and the
//! runner that checkpoints suspended runs and resumes them.

pub mod chat_agent;
pub mod config;
pub mod metrics;
pub mod observer;
pub mod review;
pub mod runner;
pub mod supervisor;
pub mod workflow;

pub use chat_agent::{ChatModelAgent, ChatModelAgentConfig};
pub use config::{load_runtime_config, ConfigError, RuntimeConfig};
pub use observer::{RunObserver, TracingObserver};
pub use review::{FeedbackDecision, FeedbackInfo, HumanReviewAgent};
pub use runner::{default_payloads, EventIterator, ResumeParams, RunState, Runner, RunnerConfig};
pub use supervisor::{SupervisorAgent, TRANSFER_TOOL};
pub use workflow::{LoopAgent, SequentialAgent};
