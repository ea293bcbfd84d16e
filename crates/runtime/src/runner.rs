//! Runner - entry point for starting and resuming runs.

use crate::config::RuntimeConfig;
use crate::metrics::{self, RunTimer};
use crate::observer::RunObserver;
use crate::review::FeedbackInfo;
use interlude_core::{
    Agent, AgentAction, AgentError, AgentEvent, AgentInput, EventKind, EventSink, InterruptContext, InterruptedAction,
    PayloadRegistry, ResumeFrame, RunContext, SessionKv, Suspension,
};
use interlude_memory::{CheckpointRecord, CheckpointStore, WriteCondition};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Payload registry knowing every payload type shipped with the workspace.
pub fn default_payloads() -> PayloadRegistry {
    let mut registry = PayloadRegistry::new();
    interlude_tools::register_payloads(&mut registry);
    registry.register::<FeedbackInfo>();
    registry
}

pub struct RunnerConfig {
    pub agent: Arc<dyn Agent>,
    pub store: Arc<dyn CheckpointStore>,
    pub observers: Vec<Arc<dyn RunObserver>>,
    pub event_buffer: usize,
    /// Payload types a checkpoint may contain. Resuming a checkpoint with an
    /// unknown tag fails before any node runs.
    pub payloads: Arc<PayloadRegistry>,
}

impl RunnerConfig {
    pub fn new(agent: Arc<dyn Agent>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            agent,
            store,
            observers: Vec::new(),
            event_buffer: 64,
            payloads: Arc::new(default_payloads()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Apply validated runtime settings.
    pub fn with_settings(self, settings: &RuntimeConfig) -> Result<Self, AgentError> {
        settings.validate()?;
        Ok(self.with_event_buffer(settings.event_buffer))
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    pub fn with_payloads(mut self, payloads: PayloadRegistry) -> Self {
        self.payloads = Arc::new(payloads);
        self
    }
}

/// Resume data keyed by interrupt ID.
#[derive(Debug, Clone, Default)]
pub struct ResumeParams {
    pub targets: HashMap<String, serde_json::Value>,
}

impl ResumeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target<T: Serialize>(mut self, id: &str, data: &T) -> Result<Self, AgentError> {
        self.targets.insert(id.to_string(), serde_json::to_value(data)?);
        Ok(self)
    }
}

/// How a run ended, as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Completed,
    Suspended(Vec<InterruptContext>),
    Failed(AgentError),
    Cancelled,
}

impl RunState {
    /// State implied by the final event of a run that ended on its own.
    pub fn after(last: Option<&AgentEvent>) -> Self {
        match last.map(|e| &e.kind) {
            Some(EventKind::Action {
                action: AgentAction::Interrupted(action),
            }) => RunState::Suspended(action.contexts.clone()),
            Some(EventKind::Error { error }) => RunState::Failed(error.clone()),
            _ => RunState::Completed,
        }
    }
}

/// Pull side of a run. Events arrive in production order; the run keeps going
/// in the background if the iterator is dropped.
pub struct EventIterator {
    rx: mpsc::Receiver<AgentEvent>,
    handle: JoinHandle<()>,
}

impl EventIterator {
    /// Next event, or `None` once the run has ended.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    /// Abort the run. No checkpoint is written for the aborted attempt.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Drain every remaining event and report how the run ended.
    pub async fn collect(mut self) -> (Vec<AgentEvent>, RunState) {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }

        if let Err(e) = self.handle.await {
            if e.is_cancelled() {
                return (events, RunState::Cancelled);
            }
            return (events, RunState::Failed(AgentError::Protocol(format!("run task failed: {}", e))));
        }

        let state = RunState::after(events.last());
        (events, state)
    }
}

/// Starts runs under a checkpoint ID and resumes them from the store.
pub struct Runner {
    config: RunnerConfig,
}

struct Launch {
    checkpoint_id: String,
    input: AgentInput,
    frame: ResumeFrame,
    session: SessionKv,
    condition: WriteCondition,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Start a new run with a single user message.
    pub fn query(&self, text: &str, checkpoint_id: &str) -> EventIterator {
        self.run(AgentInput::from_user(text), checkpoint_id)
    }

    /// Start a new run. Any earlier record under `checkpoint_id` is replaced
    /// when this run suspends or completes.
    pub fn run(&self, input: AgentInput, checkpoint_id: &str) -> EventIterator {
        info!("Starting run under checkpoint {}", checkpoint_id);
        self.launch(
            Launch {
                checkpoint_id: checkpoint_id.to_string(),
                input,
                frame: ResumeFrame::fresh(),
                session: SessionKv::init(),
                condition: WriteCondition::Unconditional,
            },
            false,
        )
    }

    /// Resume the run suspended under `checkpoint_id`.
    ///
    /// Fails before any node runs if the checkpoint is missing, unreadable,
    /// already completed, contains an unregistered payload type, or if a
    /// target names an interrupt that is not pending.
    pub async fn resume(&self, checkpoint_id: &str, params: ResumeParams) -> Result<EventIterator, AgentError> {
        let stored = self
            .config
            .store
            .get(checkpoint_id)
            .await?
            .ok_or_else(|| AgentError::Protocol(format!("no checkpoint found for '{}'", checkpoint_id)))?;
        let record = CheckpointRecord::decode(&stored.bytes)?;

        if !record.is_suspended() {
            return Err(AgentError::Protocol(format!(
                "checkpoint '{}' belongs to a completed run",
                checkpoint_id
            )));
        }
        for point in &record.suspension.points {
            self.config.payloads.decode(&point.info)?;
        }

        let frame = ResumeFrame::new(record.suspension, params.targets)?;
        info!(
            "Resuming checkpoint {} at version {}",
            checkpoint_id, stored.version
        );
        metrics::increment_resumes();

        Ok(self.launch(
            Launch {
                checkpoint_id: checkpoint_id.to_string(),
                input: record.input,
                frame,
                session: SessionKv::from_snapshot(record.session),
                condition: WriteCondition::IfVersion(stored.version),
            },
            true,
        ))
    }

    fn launch(&self, launch: Launch, resumed: bool) -> EventIterator {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let agent = self.config.agent.clone();
        let store = self.config.store.clone();
        let observers = self.config.observers.clone();

        for observer in &observers {
            observer.on_start(&launch.checkpoint_id, resumed);
        }

        let handle = tokio::spawn(async move {
            let _timer = RunTimer::start();
            drive(agent, store, observers, launch, tx).await;
        });

        EventIterator { rx, handle }
    }
}

async fn drive(
    agent: Arc<dyn Agent>,
    store: Arc<dyn CheckpointStore>,
    observers: Vec<Arc<dyn RunObserver>>,
    launch: Launch,
    tx: mpsc::Sender<AgentEvent>,
) {
    let Launch {
        checkpoint_id,
        input,
        frame,
        session,
        condition,
    } = launch;

    let sink = EventSink::new(tx);
    let root = RunContext::new(&checkpoint_id, session.clone(), Arc::new(frame)).with_events(sink.clone());
    let ctx = root.for_agent(agent.name());

    let result = agent.run(&ctx, &input).await;
    match result {
        Ok(_) => {
            let record = CheckpointRecord::completed(&checkpoint_id, input, session.snapshot());
            if let Err(e) = persist(store.as_ref(), &record, condition).await {
                fail(&sink, &observers, &checkpoint_id, agent.name(), e).await;
                return;
            }
            for observer in &observers {
                observer.on_complete(&checkpoint_id);
            }
        }
        Err(AgentError::Interrupted(suspension)) => {
            let suspension: Suspension = *suspension;
            let contexts = suspension.contexts();
            let (agent_name, run_path) = match suspension.points.first() {
                Some(point) => (point.agent_name.clone(), point.address.agent_path()),
                None => (agent.name().to_string(), vec![agent.name().to_string()]),
            };

            let record = CheckpointRecord::suspended(&checkpoint_id, input, suspension, session.snapshot());
            if let Err(e) = persist(store.as_ref(), &record, condition).await {
                fail(&sink, &observers, &checkpoint_id, agent.name(), e).await;
                return;
            }

            metrics::record_interrupts(contexts.len());
            info!("Run {} suspended at {} point(s)", checkpoint_id, contexts.len());
            for observer in &observers {
                observer.on_suspend(&checkpoint_id, &contexts);
            }
            sink.send(AgentEvent {
                agent_name,
                run_path,
                kind: EventKind::Action {
                    action: AgentAction::Interrupted(InterruptedAction { contexts }),
                },
            })
            .await;
        }
        Err(e) => fail(&sink, &observers, &checkpoint_id, agent.name(), e).await,
    }
}

async fn persist(
    store: &dyn CheckpointStore,
    record: &CheckpointRecord,
    condition: WriteCondition,
) -> Result<(), AgentError> {
    let bytes = record.encode()?;
    match store.set(&record.checkpoint_id, bytes, condition).await {
        Ok(version) => {
            metrics::increment_checkpoint_writes();
            debug!("Checkpoint {} written at version {}", record.checkpoint_id, version);
            Ok(())
        }
        Err(e) => {
            warn!("Checkpoint {} not written: {}", record.checkpoint_id, e);
            Err(e.into())
        }
    }
}

async fn fail(
    sink: &EventSink,
    observers: &[Arc<dyn RunObserver>],
    checkpoint_id: &str,
    agent_name: &str,
    error: AgentError,
) {
    error!("Run {} failed: {}", checkpoint_id, error);
    for observer in observers {
        observer.on_error(checkpoint_id, &error);
    }
    sink.send(AgentEvent {
        agent_name: agent_name.to_string(),
        run_path: vec![agent_name.to_string()],
        kind: EventKind::Error { error },
    })
    .await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use interlude_core::{AgentOutcome, Message, TextPrompt};
    use interlude_memory::InMemoryCheckpointStore;
    use serde_json::json;

    /// Asks for a name, then greets.
    struct Greeter;

    #[async_trait]
    impl Agent for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn description(&self) -> &str {
            ""
        }

        async fn run(&self, ctx: &RunContext, _input: &AgentInput) -> Result<AgentOutcome, AgentError> {
            if !ctx.interrupt_state::<()>()?.was_interrupted {
                return Err(ctx.interrupt(&TextPrompt("name?".into())));
            }
            let resume = ctx.resume_context::<String>()?;
            if !resume.is_resume_target {
                return Err(ctx.interrupt(&TextPrompt("name?".into())));
            }
            let name = resume
                .data
                .ok_or_else(|| AgentError::Protocol("greeter resumed with no data".into()))?;
            let message = Message::assistant(format!("hello {}", name));
            ctx.emit(EventKind::Output {
                message: message.clone(),
            })
            .await;
            Ok(AgentOutcome::message(message))
        }
    }

    fn runner(store: Arc<InMemoryCheckpointStore>) -> Runner {
        Runner::new(RunnerConfig::new(Arc::new(Greeter), store))
    }

    async fn pending_id(runner: &Runner) -> String {
        let (_, state) = runner.query("hi", "g1").collect().await;
        match state {
            RunState::Suspended(contexts) => contexts[0].id.clone(),
            other => panic!("expected suspension, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_then_resume() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runner = runner(store.clone());
        let id = pending_id(&runner).await;

        let params = ResumeParams::new().with_target(&id, &"Ada").unwrap();
        let (events, state) = runner.resume("g1", params).await.unwrap().collect().await;
        assert_eq!(state, RunState::Completed);
        assert_eq!(events.last().unwrap().message().unwrap().content, "hello Ada");

        let err = runner.resume("g1", ResumeParams::new()).await.err().unwrap();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_resume_unknown_checkpoint() {
        let runner = runner(Arc::new(InMemoryCheckpointStore::new()));
        let err = runner.resume("nope", ResumeParams::new()).await.err().unwrap();
        assert_eq!(err, AgentError::Protocol("no checkpoint found for 'nope'".into()));
    }

    #[tokio::test]
    async fn test_unknown_target_rejected_before_running() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runner = runner(store.clone());
        pending_id(&runner).await;

        let params = ResumeParams::new().with_target("bogus", &json!(1)).unwrap();
        assert!(matches!(runner.resume("g1", params).await, Err(AgentError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_protocol_error_keeps_checkpoint() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runner = runner(store.clone());
        let id = pending_id(&runner).await;
        let before = store.get("g1").await.unwrap().unwrap();

        let params = ResumeParams::new().with_target(&id, &serde_json::Value::Null).unwrap();
        let (_, state) = runner.resume("g1", params).await.unwrap().collect().await;
        assert!(matches!(state, RunState::Failed(AgentError::Protocol(_))));
        assert_eq!(store.get("g1").await.unwrap().unwrap(), before);

        let params = ResumeParams::new().with_target(&id, &"Grace").unwrap();
        let (_, state) = runner.resume("g1", params).await.unwrap().collect().await;
        assert_eq!(state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_unregistered_payload_rejected() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runner = runner(store.clone());
        pending_id(&runner).await;

        let strict = Runner::new(RunnerConfig::new(Arc::new(Greeter), store).with_payloads(PayloadRegistry::empty()));
        let err = strict.resume("g1", ResumeParams::new()).await.err().unwrap();
        assert!(matches!(err, AgentError::Serialization(_)));
    }

    /// Suspends once; on resume reports progress and then never finishes.
    struct Stalled;

    #[async_trait]
    impl Agent for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn description(&self) -> &str {
            ""
        }

        async fn run(&self, ctx: &RunContext, _input: &AgentInput) -> Result<AgentOutcome, AgentError> {
            if !ctx.interrupt_state::<()>()?.was_interrupted {
                return Err(ctx.interrupt(&TextPrompt("go?".into())));
            }
            ctx.emit(EventKind::Output {
                message: Message::assistant("working"),
            })
            .await;
            std::future::pending::<Result<AgentOutcome, AgentError>>().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_resume_leaves_checkpoint_untouched() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runner = Runner::new(RunnerConfig::new(Arc::new(Stalled), store.clone()));
        let (_, state) = runner.query("hi", "s1").collect().await;
        let RunState::Suspended(contexts) = state else {
            panic!("expected suspension, got {state:?}");
        };
        let before = store.get("s1").await.unwrap().unwrap();

        let params = ResumeParams::new().with_target(&contexts[0].id, &"go").unwrap();
        let mut events = runner.resume("s1", params).await.unwrap();
        let first = events.next().await.unwrap();
        assert_eq!(first.message().unwrap().content, "working");

        events.cancel();
        let (rest, state) = events.collect().await;
        assert!(rest.is_empty());
        assert_eq!(state, RunState::Cancelled);
        assert_eq!(store.get("s1").await.unwrap().unwrap(), before);
    }

    #[test]
    fn test_invalid_settings_are_config_errors() {
        let settings = RuntimeConfig {
            event_buffer: 0,
            ..RuntimeConfig::default()
        };
        let err = RunnerConfig::new(Arc::new(Greeter), Arc::new(InMemoryCheckpointStore::new()))
            .with_settings(&settings)
            .err()
            .unwrap();
        assert_eq!(
            err,
            AgentError::Config("Invalid value for event_buffer: must be greater than zero".into())
        );
    }
}

