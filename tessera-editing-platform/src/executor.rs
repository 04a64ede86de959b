//! Delayed task execution on a tokio runtime.
//!
//! ## Usage
//!
//! Caret blinking posts a task every half period. [`TokioTaskExecutor`]
//! sleeps on the runtime and runs the task afterwards; tasks hold only weak
//! references to their field, so a task that outlives its field does nothing.

use std::time::Duration;

use tessera_editing::services::{Task, TaskExecutor};
use tokio::runtime::Handle;
use tracing::trace;

/// Task executor that runs delayed tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTaskExecutor {
    handle: Handle,
}

impl TokioTaskExecutor {
    /// Executor on the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor on the runtime the caller runs in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TaskExecutor for TokioTaskExecutor {
    fn post_delayed(&self, delay: Duration, task: Task) {
        trace!(delay_ms = delay.as_millis() as u64, "scheduling delayed task");
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
