mod prompt;
mod render;
mod scenarios;

use anyhow::{bail, Context, Result};
use interlude_core::AgentEvent;
use interlude_memory::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
use interlude_runtime::{
    load_runtime_config, EventIterator, ResumeParams, RunState, Runner, RunnerConfig, RuntimeConfig, TracingObserver,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "interlude.yaml";

fn print_usage() {
    println!("Usage: interlude <scenario> [--resume <checkpoint-id>]");
    println!();
    println!("Scenarios:");
    for scenario in scenarios::SCENARIOS {
        println!("  {:<12} {}", scenario.name, scenario.summary);
    }
    println!();
    println!("Set checkpoint_dir in {} to resume runs from a later process.", CONFIG_FILE);
}

fn load_config() -> Result<RuntimeConfig> {
    if Path::new(CONFIG_FILE).exists() {
        load_runtime_config(CONFIG_FILE).with_context(|| format!("Failed to load {}", CONFIG_FILE))
    } else {
        Ok(RuntimeConfig::default())
    }
}

async fn open_store(config: &RuntimeConfig) -> Result<Arc<dyn CheckpointStore>> {
    match &config.checkpoint_dir {
        Some(dir) => {
            let store = FileCheckpointStore::new(dir);
            store
                .initialize()
                .await
                .with_context(|| format!("Failed to initialize checkpoint dir {}", dir.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryCheckpointStore::new())),
    }
}

/// Print events as they arrive and report how the run ended.
async fn drain(mut events: EventIterator) -> RunState {
    let mut last: Option<AgentEvent> = None;
    while let Some(event) = events.next().await {
        println!("{}", render::event(&event));
        last = Some(event);
    }
    RunState::after(last.as_ref())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("INTERLUDE_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(name) = args.first() else {
        print_usage();
        return Ok(());
    };
    if name == "help" || name == "--help" || name == "-h" {
        print_usage();
        return Ok(());
    }
    let Some(scenario) = scenarios::find(name) else {
        print_usage();
        bail!("unknown scenario '{}'", name);
    };
    let resume_id = match args.get(1).map(String::as_str) {
        Some("--resume") => Some(args.get(2).context("--resume needs a checkpoint id")?.clone()),
        Some(other) => bail!("unexpected argument '{}'", other),
        None => None,
    };

    let config = load_config()?;
    let store = open_store(&config).await?;
    let runner = Runner::new(
        RunnerConfig::new(scenario.agent(&config), store)
            .with_observer(Arc::new(TracingObserver))
            .with_settings(&config)?,
    );

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              Interlude: {:<41}║", scenario.name);
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let (checkpoint_id, mut events) = match resume_id {
        // Untargeted resume re-raises every pending interrupt.
        Some(id) => {
            let events = runner.resume(&id, ResumeParams::new()).await?;
            (id, events)
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            println!("checkpoint: {}", id);
            println!("query: {}\n", scenario.query);
            let events = runner.query(scenario.query, &id);
            (id, events)
        }
    };

    let mut terminal = prompt::Terminal;
    loop {
        match drain(events).await {
            RunState::Completed => {
                println!("✅ Run {} completed", checkpoint_id);
                return Ok(());
            }
            RunState::Suspended(pending) => {
                let mut params = ResumeParams::new();
                for context in &pending {
                    params = prompt::resolve(&mut terminal, params, context)?;
                }
                println!();
                events = runner.resume(&checkpoint_id, params).await?;
            }
            RunState::Failed(e) => bail!("run {} failed: {}", checkpoint_id, e),
            RunState::Cancelled => bail!("run {} was cancelled", checkpoint_id),
        }
    }
}
