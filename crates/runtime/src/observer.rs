//! Run lifecycle observers.

use interlude_core::{AgentError, InterruptContext};
use tracing::{error, info};

/// Hooks called by the runner at run boundaries. Observers are passed to the
/// runner explicitly; there is no global registry.
pub trait RunObserver: Send + Sync {
    fn on_start(&self, _checkpoint_id: &str, _resumed: bool) {}

    fn on_suspend(&self, _checkpoint_id: &str, _pending: &[InterruptContext]) {}

    fn on_complete(&self, _checkpoint_id: &str) {}

    fn on_error(&self, _checkpoint_id: &str, _error: &AgentError) {}
}

/// Logs every lifecycle hook through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_start(&self, checkpoint_id: &str, resumed: bool) {
        if resumed {
            info!(checkpoint_id, "Run resumed");
        } else {
            info!(checkpoint_id, "Run started");
        }
    }

    fn on_suspend(&self, checkpoint_id: &str, pending: &[InterruptContext]) {
        for ctx in pending {
            info!(checkpoint_id, interrupt_id = %ctx.id, address = %ctx.address, "Run suspended");
        }
    }

    fn on_complete(&self, checkpoint_id: &str) {
        info!(checkpoint_id, "Run completed");
    }

    fn on_error(&self, checkpoint_id: &str, error: &AgentError) {
        error!(checkpoint_id, %error, "Run failed");
    }
}
