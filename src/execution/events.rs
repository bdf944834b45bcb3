//! Events emitted while a pipeline runs

use crate::core::{JobResult, JobSpec, PipelineStatus, StepOutcome};
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        group: String,
        total_jobs: usize,
    },
    JobStarted {
        job: JobSpec,
    },
    StepFinished {
        job: JobSpec,
        outcome: StepOutcome,
    },
    JobFinished {
        result: JobResult,
    },
    JobCancelled {
        job: JobSpec,
    },
    CoverageUploaded {
        job: JobSpec,
        report: String,
    },
    CoverageUploadFailed {
        job: JobSpec,
        error: String,
        fatal: bool,
    },
    PipelineCompleted {
        run_id: Uuid,
        group: String,
        status: PipelineStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Fans events out to registered handlers.
///
/// Handlers are fixed once the sink is built; clones share them.
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.handlers).push(Arc::new(handler));
        self
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(&event);
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
